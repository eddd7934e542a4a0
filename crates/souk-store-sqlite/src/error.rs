//! Error type for `souk-store-sqlite`.

use souk_core::{Classify, ErrorKind};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("{0}")]
  Core(#[from] souk_core::Error),

  #[error("database error: {0}")]
  Database(#[from] tokio_rusqlite::Error),

  #[error("sqlite error: {0}")]
  Sqlite(#[from] rusqlite::Error),

  #[error("json error: {0}")]
  Json(#[from] serde_json::Error),

  #[error("uuid parse error: {0}")]
  Uuid(#[from] uuid::Error),

  #[error("date/time parse error: {0}")]
  DateParse(String),

  #[error("decode error: {0}")]
  Decode(String),

  /// An UPDATE reached a non-draft ad without the transaction's bypass
  /// engaged. Always a bug in the engine, never a user error.
  #[error("guard rejected update of non-draft ad {0}")]
  GuardViolation(uuid::Uuid),
}

impl Classify for Error {
  fn kind(&self) -> ErrorKind {
    match self {
      Self::Core(e) => e.kind(),
      _ => ErrorKind::DbError,
    }
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
