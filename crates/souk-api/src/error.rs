//! API error type and [`axum::response::IntoResponse`] implementation.

use axum::{
  Json,
  extract::rejection::JsonRejection,
  http::StatusCode,
  response::{IntoResponse, Response},
};
use serde_json::json;
use souk_core::{Classify, ErrorKind};
use thiserror::Error;

/// An error returned by an API handler.
#[derive(Debug, Error)]
pub enum ApiError {
  #[error("missing or malformed x-user-id header")]
  Unauthorized,

  #[error("bad request: {0}")]
  BadRequest(String),

  /// A classified engine or store failure.
  #[error("{source}")]
  Engine {
    kind:   ErrorKind,
    #[source]
    source: Box<dyn std::error::Error + Send + Sync>,
  },
}

impl ApiError {
  pub fn engine<E>(err: E) -> Self
  where
    E: std::error::Error + Classify + Send + Sync + 'static,
  {
    Self::Engine { kind: err.kind(), source: Box::new(err) }
  }
}

impl From<JsonRejection> for ApiError {
  fn from(rejection: JsonRejection) -> Self {
    Self::BadRequest(rejection.body_text())
  }
}

fn status_for(kind: ErrorKind) -> StatusCode {
  match kind {
    ErrorKind::BadRequest => StatusCode::BAD_REQUEST,
    ErrorKind::NotFound => StatusCode::NOT_FOUND,
    ErrorKind::NotAllowed | ErrorKind::Conflict => StatusCode::CONFLICT,
    ErrorKind::DbError => StatusCode::INTERNAL_SERVER_ERROR,
  }
}

impl IntoResponse for ApiError {
  fn into_response(self) -> Response {
    let (status, code, message) = match &self {
      ApiError::Unauthorized => {
        (StatusCode::UNAUTHORIZED, "UNAUTHORIZED".to_string(), self.to_string())
      }
      ApiError::BadRequest(m) => {
        (StatusCode::BAD_REQUEST, ErrorKind::BadRequest.to_string(), m.clone())
      }
      ApiError::Engine { kind: ErrorKind::DbError, source } => {
        tracing::error!(error = %source, "store failure");
        (
          StatusCode::INTERNAL_SERVER_ERROR,
          ErrorKind::DbError.to_string(),
          "internal store error".to_string(),
        )
      }
      ApiError::Engine { kind, source } => {
        (status_for(*kind), kind.to_string(), source.to_string())
      }
    };
    let body = json!({ "error": { "code": code, "message": message } });
    (status, Json(body)).into_response()
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use uuid::Uuid;

  #[test]
  fn not_allowed_and_conflict_share_a_status() {
    assert_eq!(status_for(ErrorKind::NotAllowed), StatusCode::CONFLICT);
    assert_eq!(status_for(ErrorKind::Conflict), StatusCode::CONFLICT);
  }

  #[test]
  fn engine_errors_keep_their_kind() {
    let err = ApiError::engine(souk_core::Error::AdNotFound(Uuid::nil()));
    assert!(matches!(err, ApiError::Engine { kind: ErrorKind::NotFound, .. }));
    assert_eq!(err.into_response().status(), StatusCode::NOT_FOUND);
  }
}
