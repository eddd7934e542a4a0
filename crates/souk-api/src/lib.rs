//! JSON REST API for Souk.
//!
//! Exposes an axum [`Router`] backed by any [`souk_core::store::AdStore`].
//! Authentication and TLS are the caller's responsibility; the acting user
//! arrives in the `x-user-id` header.
//!
//! # Mounting
//!
//! ```rust,ignore
//! .nest("/api", souk_api::api_router(store.clone()))
//! ```

pub mod actor;
pub mod ads;
pub mod error;
pub mod locations;

use std::sync::Arc;

use axum::{
  Router,
  routing::{get, post},
};
use souk_core::store::AdStore;

pub use error::ApiError;

/// Build a fully-materialised API router for `store`.
///
/// The returned `Router<()>` can be nested into any parent router regardless
/// of its own state type.
pub fn api_router<S>(store: Arc<S>) -> Router<()>
where
  S: AdStore + 'static,
{
  Router::new()
    // Locations
    .route("/locations", get(locations::list::<S>))
    // Ads
    .route("/ads", get(ads::list::<S>).post(ads::create::<S>))
    .route("/ads/{id}", get(ads::get_one::<S>).patch(ads::edit::<S>))
    .route(
      "/ads/{id}/photos",
      get(ads::list_photos::<S>).post(ads::attach_photo::<S>),
    )
    .route("/ads/{id}/publish", post(ads::publish::<S>))
    .route("/ads/{id}/stop", post(ads::stop::<S>))
    .route("/ads/{id}/restart", post(ads::restart::<S>))
    // History
    .route("/ads/{id}/versions", get(ads::versions::<S>))
    .route("/ads/{id}/snapshots", get(ads::snapshots::<S>))
    .with_state(store)
}

#[cfg(test)]
mod tests {
  use super::*;

  use axum::{
    body::Body,
    http::{Request, StatusCode},
  };
  use serde_json::{Value, json};
  use souk_store_sqlite::SqliteStore;
  use tower::ServiceExt as _;
  use uuid::Uuid;

  use crate::actor::USER_ID_HEADER;

  struct Harness {
    store:    Arc<SqliteStore>,
    location: Uuid,
  }

  async fn harness() -> Harness {
    let store = SqliteStore::open_in_memory().await.unwrap();
    let location = store
      .ensure_location("Lisbon".into())
      .await
      .unwrap()
      .location_id;
    Harness { store: Arc::new(store), location }
  }

  impl Harness {
    async fn call(
      &self,
      method: &str,
      uri: &str,
      user: Option<Uuid>,
      body: Option<Value>,
    ) -> (StatusCode, Value) {
      let mut builder = Request::builder().method(method).uri(uri);
      if let Some(user) = user {
        builder = builder.header(USER_ID_HEADER, user.to_string());
      }
      let req = match body {
        Some(body) => builder
          .header("content-type", "application/json")
          .body(Body::from(body.to_string()))
          .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
      };

      let res = api_router(self.store.clone()).oneshot(req).await.unwrap();
      let status = res.status();
      let bytes = axum::body::to_bytes(res.into_body(), usize::MAX)
        .await
        .unwrap();
      let value = if bytes.is_empty() {
        Value::Null
      } else {
        serde_json::from_slice(&bytes).unwrap()
      };
      (status, value)
    }

    async fn draft(&self, owner: Uuid) -> String {
      let (status, ad) = self
        .call(
          "POST",
          "/ads",
          Some(owner),
          Some(json!({
            "location_id": self.location,
            "title": "Smoke A",
            "description": "A listing used by the API tests.",
            "price_cents": 1000,
          })),
        )
        .await;
      assert_eq!(status, StatusCode::CREATED);
      ad["ad_id"].as_str().unwrap().to_string()
    }

    async fn published(&self, owner: Uuid) -> String {
      let id = self.draft(owner).await;
      let (status, _) = self
        .call(
          "POST",
          &format!("/ads/{id}/photos"),
          Some(owner),
          Some(json!({ "file_ref": "photos/1.jpg" })),
        )
        .await;
      assert_eq!(status, StatusCode::CREATED);
      let (status, _) = self
        .call("POST", &format!("/ads/{id}/publish"), Some(owner), None)
        .await;
      assert_eq!(status, StatusCode::OK);
      id
    }
  }

  fn code(body: &Value) -> &str { body["error"]["code"].as_str().unwrap() }

  #[tokio::test]
  async fn mutations_require_a_user() {
    let h = harness().await;
    let (status, body) = h
      .call("POST", "/ads", None, Some(json!({ "title": "x" })))
      .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(code(&body), "UNAUTHORIZED");
  }

  #[tokio::test]
  async fn locations_are_listed() {
    let h = harness().await;
    let (status, body) = h.call("GET", "/locations", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body[0]["name"], "Lisbon");
  }

  #[tokio::test]
  async fn invalid_draft_is_bad_request() {
    let h = harness().await;
    let owner = Uuid::new_v4();
    let (status, body) = h
      .call(
        "POST",
        "/ads",
        Some(owner),
        Some(json!({
          "location_id": h.location,
          "title": "ab",
          "description": "A listing used by the API tests.",
        })),
      )
      .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(code(&body), "BAD_REQUEST");

    let (status, body) = h
      .call("POST", "/ads", Some(owner), Some(json!({ "title": 7 })))
      .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(code(&body), "BAD_REQUEST");
  }

  #[tokio::test]
  async fn publish_without_photos_is_not_allowed() {
    let h = harness().await;
    let owner = Uuid::new_v4();
    let id = h.draft(owner).await;
    let (status, body) = h
      .call("POST", &format!("/ads/{id}/publish"), Some(owner), None)
      .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(code(&body), "NOT_ALLOWED");
  }

  #[tokio::test]
  async fn drafts_are_hidden_from_other_users() {
    let h = harness().await;
    let owner = Uuid::new_v4();
    let id = h.draft(owner).await;

    let (status, _) = h.call("GET", &format!("/ads/{id}"), Some(owner), None).await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = h
      .call("GET", &format!("/ads/{id}"), Some(Uuid::new_v4()), None)
      .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(code(&body), "NOT_FOUND");

    let (status, _) = h
      .call("POST", &format!("/ads/{id}/stop"), Some(Uuid::new_v4()), None)
      .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
  }

  #[tokio::test]
  async fn editing_a_published_ad_forks_it() {
    let h = harness().await;
    let owner = Uuid::new_v4();
    let id = h.published(owner).await;

    let (status, body) = h
      .call(
        "PATCH",
        &format!("/ads/{id}"),
        Some(owner),
        Some(json!({ "title": "Smoke A, cheaper", "price_cents": null })),
      )
      .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["forked"], true);
    assert_eq!(body["source_ad_id"], id.as_str());
    assert_eq!(body["ad"]["status"], "active");
    assert_eq!(body["ad"]["price_cents"], Value::Null);
    assert_eq!(body["notice"]["kind"], "forked_from_active");
    assert!(body["notice"]["message"].is_string());

    let (_, old) = h.call("GET", &format!("/ads/{id}"), Some(owner), None).await;
    assert_eq!(old["status"], "stopped");
    assert_eq!(old["replaced_by_ad_id"], body["ad"]["ad_id"]);

    let (status, err) = h
      .call(
        "PATCH",
        &format!("/ads/{id}"),
        Some(owner),
        Some(json!({ "title": "Again" })),
      )
      .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(code(&err), "NOT_ALLOWED");
    assert!(err["error"]["message"].as_str().unwrap().contains("already replaced"));
  }

  #[tokio::test]
  async fn editing_a_draft_stays_in_place() {
    let h = harness().await;
    let owner = Uuid::new_v4();
    let id = h.draft(owner).await;

    let (status, body) = h
      .call(
        "PATCH",
        &format!("/ads/{id}"),
        Some(owner),
        Some(json!({ "description": "Rewritten description text." })),
      )
      .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["forked"], false);
    assert_eq!(body["ad"]["ad_id"], id.as_str());
    assert!(body.get("notice").is_none());
  }

  #[tokio::test]
  async fn stale_restart_is_a_conflict() {
    let h = harness().await;
    let owner = Uuid::new_v4();
    let id = h.published(owner).await;
    let (status, _) = h
      .call("POST", &format!("/ads/{id}/stop"), Some(owner), None)
      .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = h
      .call(
        "POST",
        &format!("/ads/{id}/restart?expected_stopped_at=2000-01-01T00:00:00Z"),
        Some(owner),
        None,
      )
      .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(code(&body), "CONFLICT");

    let (status, body) = h
      .call("POST", &format!("/ads/{id}/restart"), Some(owner), None)
      .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "active");
    assert_eq!(body["stopped_at"], Value::Null);
  }

  #[tokio::test]
  async fn versions_and_snapshots() {
    let h = harness().await;
    let owner = Uuid::new_v4();
    let id = h.published(owner).await;
    h.call(
      "PATCH",
      &format!("/ads/{id}"),
      Some(owner),
      Some(json!({ "title": "Second version" })),
    )
    .await;

    let (status, timeline) = h
      .call("GET", &format!("/ads/{id}/versions"), Some(owner), None)
      .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(timeline["is_owner"], true);
    assert_eq!(timeline["timeline"].as_array().unwrap().len(), 2);

    let (status, public) = h
      .call("GET", &format!("/ads/{id}/versions"), None, None)
      .await;
    assert_eq!(status, StatusCode::NOT_FOUND, "{public}");

    let (status, snaps) = h
      .call("GET", &format!("/ads/{id}/snapshots"), Some(owner), None)
      .await;
    assert_eq!(status, StatusCode::OK);
    let actions: Vec<_> = snaps
      .as_array()
      .unwrap()
      .iter()
      .map(|s| s["action"].as_str().unwrap().to_string())
      .collect();
    assert_eq!(actions, ["draft_create", "publish"]);
  }
}
