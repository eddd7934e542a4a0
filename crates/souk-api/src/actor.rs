//! Request identity extractors.
//!
//! Authentication happens upstream; the proxy forwards the authenticated
//! user as a UUID in the `x-user-id` header.

use axum::{
  extract::FromRequestParts,
  http::{HeaderMap, request::Parts},
};
use uuid::Uuid;

use crate::error::ApiError;

pub const USER_ID_HEADER: &str = "x-user-id";

/// The authenticated user performing a mutation. Rejects with 401 when the
/// header is absent.
pub struct Actor(pub Uuid);

/// The user reading a resource, if any. Anonymous reads are allowed.
pub struct Viewer(pub Option<Uuid>);

/// Read the user id from `headers`. A present but malformed header is
/// rejected rather than treated as anonymous.
pub fn user_id(headers: &HeaderMap) -> Result<Option<Uuid>, ApiError> {
  let Some(value) = headers.get(USER_ID_HEADER) else {
    return Ok(None);
  };
  let id = value
    .to_str()
    .ok()
    .and_then(|s| Uuid::parse_str(s.trim()).ok())
    .ok_or(ApiError::Unauthorized)?;
  Ok(Some(id))
}

impl<S: Send + Sync> FromRequestParts<S> for Actor {
  type Rejection = ApiError;

  async fn from_request_parts(
    parts: &mut Parts,
    _state: &S,
  ) -> Result<Self, Self::Rejection> {
    user_id(&parts.headers)?
      .map(Actor)
      .ok_or(ApiError::Unauthorized)
  }
}

impl<S: Send + Sync> FromRequestParts<S> for Viewer {
  type Rejection = ApiError;

  async fn from_request_parts(
    parts: &mut Parts,
    _state: &S,
  ) -> Result<Self, Self::Rejection> {
    Ok(Viewer(user_id(&parts.headers)?))
  }
}
