//! Handlers for `/locations`.

use std::sync::Arc;

use axum::{Json, extract::State};
use souk_core::{location::Location, store::AdStore};

use crate::error::ApiError;

/// `GET /locations`
pub async fn list<S>(
  State(store): State<Arc<S>>,
) -> Result<Json<Vec<Location>>, ApiError>
where
  S: AdStore,
{
  let locations = store.list_locations().await.map_err(ApiError::engine)?;
  Ok(Json(locations))
}
