//! Error types for `souk-core`.
//!
//! Every failure the engine can report is classified into an [`ErrorKind`].
//! Only the kind is a stable contract; message texts may change.

use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

use crate::ad::AdStatus;

// ─── Taxonomy ────────────────────────────────────────────────────────────────

/// The machine-readable class of an engine failure.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Serialize, strum::Display, strum::AsRefStr,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
  /// Malformed or referentially invalid input.
  BadRequest,
  /// The ad does not exist, or the caller does not own it.
  NotFound,
  /// A state-machine precondition was violated.
  NotAllowed,
  /// A caller-supplied conflict check rejected the transition.
  Conflict,
  /// Unclassified store failure.
  DbError,
}

/// Anything that can be mapped onto the [`ErrorKind`] taxonomy.
pub trait Classify {
  fn kind(&self) -> ErrorKind;
}

// ─── Error ───────────────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum Error {
  #[error("invalid input: {0}")]
  Invalid(String),

  #[error("unknown location: {0}")]
  UnknownLocation(Uuid),

  /// Deliberately the same for "missing" and "owned by someone else".
  #[error("ad not found: {0}")]
  AdNotFound(Uuid),

  #[error("cannot {action} ad {ad_id} while it is {status}")]
  WrongStatus {
    ad_id:  Uuid,
    /// The attempted operation, as a verb ("publish", "stop", ...).
    action: &'static str,
    status: AdStatus,
  },

  #[error("ad {0} needs at least one photo")]
  NoPhotos(Uuid),

  #[error("ad {ad_id} cannot be published: {reason}")]
  NotPublishable { ad_id: Uuid, reason: String },

  #[error("ad {0} is already replaced")]
  AlreadyReplaced(Uuid),

  /// The conditional link UPDATE matched no row: a concurrent writer won.
  #[error("cannot replace this ad: {0}")]
  ReplaceRaced(Uuid),

  #[error("conflict: {0}")]
  Conflict(String),

  #[error("serialization error: {0}")]
  Serialization(#[from] serde_json::Error),
}

impl Classify for Error {
  fn kind(&self) -> ErrorKind {
    match self {
      Self::Invalid(_) | Self::UnknownLocation(_) => ErrorKind::BadRequest,
      Self::AdNotFound(_) => ErrorKind::NotFound,
      Self::WrongStatus { .. }
      | Self::NoPhotos(_)
      | Self::NotPublishable { .. }
      | Self::AlreadyReplaced(_)
      | Self::ReplaceRaced(_) => ErrorKind::NotAllowed,
      Self::Conflict(_) => ErrorKind::Conflict,
      Self::Serialization(_) => ErrorKind::DbError,
    }
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
