//! Handlers for `/ads` endpoints.
//!
//! | Method  | Path | Notes |
//! |---------|------|-------|
//! | `GET`   | `/ads` | The caller's own ads, newest first |
//! | `POST`  | `/ads` | Body: [`NewAd`]; 201 |
//! | `GET`   | `/ads/{id}` | Non-owners only see active ads |
//! | `PATCH` | `/ads/{id}` | 200 when edited in place, 201 when forked |
//! | `POST`  | `/ads/{id}/photos` | Body: `{"file_ref":"..."}`; 201 |
//! | `GET`   | `/ads/{id}/photos` | |
//! | `POST`  | `/ads/{id}/publish` | |
//! | `POST`  | `/ads/{id}/stop` | |
//! | `POST`  | `/ads/{id}/restart` | Optional `?expected_stopped_at=<rfc3339>` |
//! | `GET`   | `/ads/{id}/versions` | The lineage timeline |
//! | `GET`   | `/ads/{id}/snapshots` | Owner only |

use std::sync::Arc;

use axum::{
  Json,
  extract::{Path, Query, State, rejection::JsonRejection},
  http::StatusCode,
  response::{IntoResponse, Response},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use souk_core::{
  Error as CoreError,
  ad::{Ad, AdPatch, AdPhoto, NewAd},
  lifecycle::{AdVersionSnapshot, Edited, ExpectStoppedAt, ForkNotice},
  store::{AdStore, RestartOptions},
  timeline::Timeline,
};
use uuid::Uuid;

use crate::{
  actor::{Actor, Viewer},
  error::ApiError,
};

type Body<T> = Result<Json<T>, JsonRejection>;

// ─── Own ads ─────────────────────────────────────────────────────────────────

/// `GET /ads`
pub async fn list<S>(
  State(store): State<Arc<S>>,
  Actor(owner): Actor,
) -> Result<Json<Vec<Ad>>, ApiError>
where
  S: AdStore,
{
  let ads = store.list_ads(owner).await.map_err(ApiError::engine)?;
  Ok(Json(ads))
}

/// `POST /ads`
pub async fn create<S>(
  State(store): State<Arc<S>>,
  Actor(owner): Actor,
  body: Body<NewAd>,
) -> Result<impl IntoResponse, ApiError>
where
  S: AdStore,
{
  let Json(input) = body?;
  let ad = store
    .create_draft(owner, input)
    .await
    .map_err(ApiError::engine)?;
  Ok((StatusCode::CREATED, Json(ad)))
}

// ─── Single ad ───────────────────────────────────────────────────────────────

/// `GET /ads/{id}`
pub async fn get_one<S>(
  State(store): State<Arc<S>>,
  Viewer(viewer): Viewer,
  Path(id): Path<Uuid>,
) -> Result<Json<Ad>, ApiError>
where
  S: AdStore,
{
  let ad = store
    .get_ad(viewer, id)
    .await
    .map_err(ApiError::engine)?
    .ok_or_else(|| ApiError::engine(CoreError::AdNotFound(id)))?;
  Ok(Json(ad))
}

#[derive(Debug, Serialize)]
pub struct NoticeBody {
  pub kind:    ForkNotice,
  pub message: &'static str,
}

#[derive(Debug, Serialize)]
pub struct EditResponse {
  pub ad:           Ad,
  pub forked:       bool,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub source_ad_id: Option<Uuid>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub notice:       Option<NoticeBody>,
}

impl From<Edited> for EditResponse {
  fn from(edited: Edited) -> Self {
    match edited {
      Edited::Updated(ad) => {
        Self { ad, forked: false, source_ad_id: None, notice: None }
      }
      Edited::Forked(f) => Self {
        ad:           f.ad,
        forked:       true,
        source_ad_id: Some(f.source_ad_id),
        notice:       Some(NoticeBody {
          kind:    f.notice,
          message: f.notice.message(),
        }),
      },
    }
  }
}

/// `PATCH /ads/{id}`: edits a draft in place, forks anything else.
pub async fn edit<S>(
  State(store): State<Arc<S>>,
  Actor(owner): Actor,
  Path(id): Path<Uuid>,
  body: Body<AdPatch>,
) -> Result<Response, ApiError>
where
  S: AdStore,
{
  let Json(patch) = body?;
  let edited = store
    .edit(owner, id, patch)
    .await
    .map_err(ApiError::engine)?;
  let status = match edited {
    Edited::Updated(_) => StatusCode::OK,
    Edited::Forked(_) => StatusCode::CREATED,
  };
  Ok((status, Json(EditResponse::from(edited))).into_response())
}

// ─── Photos ──────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct PhotoBody {
  pub file_ref: String,
}

/// `POST /ads/{id}/photos`
pub async fn attach_photo<S>(
  State(store): State<Arc<S>>,
  Actor(owner): Actor,
  Path(id): Path<Uuid>,
  body: Body<PhotoBody>,
) -> Result<impl IntoResponse, ApiError>
where
  S: AdStore,
{
  let Json(PhotoBody { file_ref }) = body?;
  let photo = store
    .attach_photo(owner, id, file_ref)
    .await
    .map_err(ApiError::engine)?;
  Ok((StatusCode::CREATED, Json(photo)))
}

/// `GET /ads/{id}/photos`
pub async fn list_photos<S>(
  State(store): State<Arc<S>>,
  Viewer(viewer): Viewer,
  Path(id): Path<Uuid>,
) -> Result<Json<Vec<AdPhoto>>, ApiError>
where
  S: AdStore,
{
  let photos = store
    .list_photos(viewer, id)
    .await
    .map_err(ApiError::engine)?;
  Ok(Json(photos))
}

// ─── Transitions ─────────────────────────────────────────────────────────────

/// `POST /ads/{id}/publish`
pub async fn publish<S>(
  State(store): State<Arc<S>>,
  Actor(owner): Actor,
  Path(id): Path<Uuid>,
) -> Result<Json<Ad>, ApiError>
where
  S: AdStore,
{
  let ad = store.publish(owner, id).await.map_err(ApiError::engine)?;
  Ok(Json(ad))
}

/// `POST /ads/{id}/stop`
pub async fn stop<S>(
  State(store): State<Arc<S>>,
  Actor(owner): Actor,
  Path(id): Path<Uuid>,
) -> Result<Json<Ad>, ApiError>
where
  S: AdStore,
{
  let ad = store.stop(owner, id).await.map_err(ApiError::engine)?;
  Ok(Json(ad))
}

#[derive(Debug, Deserialize)]
pub struct RestartParams {
  /// The `stopped_at` the client last saw; a mismatch is a `CONFLICT`.
  pub expected_stopped_at: Option<DateTime<Utc>>,
}

/// `POST /ads/{id}/restart[?expected_stopped_at=<rfc3339>]`
pub async fn restart<S>(
  State(store): State<Arc<S>>,
  Actor(owner): Actor,
  Path(id): Path<Uuid>,
  Query(params): Query<RestartParams>,
) -> Result<Json<Ad>, ApiError>
where
  S: AdStore,
{
  let options = match params.expected_stopped_at {
    Some(at) => RestartOptions::with_check(ExpectStoppedAt(at)),
    None => RestartOptions::default(),
  };
  let ad = store
    .restart(owner, id, options)
    .await
    .map_err(ApiError::engine)?;
  Ok(Json(ad))
}

// ─── History ─────────────────────────────────────────────────────────────────

/// `GET /ads/{id}/versions`
pub async fn versions<S>(
  State(store): State<Arc<S>>,
  Viewer(viewer): Viewer,
  Path(id): Path<Uuid>,
) -> Result<Json<Timeline>, ApiError>
where
  S: AdStore,
{
  let timeline = store.timeline(viewer, id).await.map_err(ApiError::engine)?;
  Ok(Json(timeline))
}

/// `GET /ads/{id}/snapshots`
pub async fn snapshots<S>(
  State(store): State<Arc<S>>,
  Actor(owner): Actor,
  Path(id): Path<Uuid>,
) -> Result<Json<Vec<AdVersionSnapshot>>, ApiError>
where
  S: AdStore,
{
  let snapshots = store
    .snapshots(owner, id)
    .await
    .map_err(ApiError::engine)?;
  Ok(Json(snapshots))
}
