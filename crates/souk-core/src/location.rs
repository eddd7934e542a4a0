//! Location: where an ad is listed. Plain reference data.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Location {
  pub location_id: Uuid,
  /// Unique, human-readable name (e.g. "Berlin").
  pub name:        String,
  pub created_at:  DateTime<Utc>,
}
