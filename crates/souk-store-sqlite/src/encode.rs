//! Encoding and decoding helpers between Rust domain types and the plain-text
//! representations stored in SQLite columns.
//!
//! All timestamps are stored as RFC 3339 strings. UUIDs are stored as
//! hyphenated lowercase strings. Status and action enums use their
//! `snake_case` names.

use chrono::{DateTime, Utc};
use souk_core::{
  ad::{Ad, AdPhoto, AdStatus},
  lifecycle::{AdVersionSnapshot, SnapshotAction},
  location::Location,
};
use uuid::Uuid;

use crate::{Error, Result};

// ─── Uuid ─────────────────────────────────────────────────────────────────────

pub fn encode_uuid(id: Uuid) -> String { id.hyphenated().to_string() }

pub fn decode_uuid(s: &str) -> Result<Uuid> { Ok(Uuid::parse_str(s)?) }

fn decode_opt_uuid(s: Option<String>) -> Result<Option<Uuid>> {
  s.as_deref().map(decode_uuid).transpose()
}

// ─── DateTime<Utc> ───────────────────────────────────────────────────────────

pub fn encode_dt(dt: DateTime<Utc>) -> String { dt.to_rfc3339() }

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(e.to_string()))
}

fn decode_opt_dt(s: Option<String>) -> Result<Option<DateTime<Utc>>> {
  s.as_deref().map(decode_dt).transpose()
}

// ─── Enums ───────────────────────────────────────────────────────────────────

pub fn decode_status(s: &str) -> Result<AdStatus> {
  s.parse()
    .map_err(|_| Error::Decode(format!("unknown ad status: {s:?}")))
}

pub fn decode_action(s: &str) -> Result<SnapshotAction> {
  s.parse()
    .map_err(|_| Error::Decode(format!("unknown snapshot action: {s:?}")))
}

// ─── Row types ───────────────────────────────────────────────────────────────

/// Column list matching [`RawAd::from_row`].
pub const AD_COLUMNS: &str = "ad_id, user_id, location_id, title, description, \
   price_cents, status, created_at, published_at, stopped_at, parent_ad_id, \
   replaced_by_ad_id";

/// Raw values read directly from an `ads` row.
pub struct RawAd {
  pub ad_id:             String,
  pub user_id:           String,
  pub location_id:       String,
  pub title:             String,
  pub description:       String,
  pub price_cents:       Option<i64>,
  pub status:            String,
  pub created_at:        String,
  pub published_at:      Option<String>,
  pub stopped_at:        Option<String>,
  pub parent_ad_id:      Option<String>,
  pub replaced_by_ad_id: Option<String>,
}

impl RawAd {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      ad_id:             row.get(0)?,
      user_id:           row.get(1)?,
      location_id:       row.get(2)?,
      title:             row.get(3)?,
      description:       row.get(4)?,
      price_cents:       row.get(5)?,
      status:            row.get(6)?,
      created_at:        row.get(7)?,
      published_at:      row.get(8)?,
      stopped_at:        row.get(9)?,
      parent_ad_id:      row.get(10)?,
      replaced_by_ad_id: row.get(11)?,
    })
  }

  pub fn into_ad(self) -> Result<Ad> {
    Ok(Ad {
      ad_id:             decode_uuid(&self.ad_id)?,
      user_id:           decode_uuid(&self.user_id)?,
      location_id:       decode_uuid(&self.location_id)?,
      title:             self.title,
      description:       self.description,
      price_cents:       self.price_cents,
      status:            decode_status(&self.status)?,
      created_at:        decode_dt(&self.created_at)?,
      published_at:      decode_opt_dt(self.published_at)?,
      stopped_at:        decode_opt_dt(self.stopped_at)?,
      parent_ad_id:      decode_opt_uuid(self.parent_ad_id)?,
      replaced_by_ad_id: decode_opt_uuid(self.replaced_by_ad_id)?,
    })
  }
}

pub const PHOTO_COLUMNS: &str =
  "photo_id, ad_id, file_ref, sort_order, created_at";

/// Raw values read directly from an `ad_photos` row.
pub struct RawPhoto {
  pub photo_id:   String,
  pub ad_id:      String,
  pub file_ref:   String,
  pub sort_order: u32,
  pub created_at: String,
}

impl RawPhoto {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      photo_id:   row.get(0)?,
      ad_id:      row.get(1)?,
      file_ref:   row.get(2)?,
      sort_order: row.get(3)?,
      created_at: row.get(4)?,
    })
  }

  pub fn into_photo(self) -> Result<AdPhoto> {
    Ok(AdPhoto {
      photo_id:   decode_uuid(&self.photo_id)?,
      ad_id:      decode_uuid(&self.ad_id)?,
      file_ref:   self.file_ref,
      sort_order: self.sort_order,
      created_at: decode_dt(&self.created_at)?,
    })
  }
}

pub const SNAPSHOT_COLUMNS: &str = "snapshot_id, ad_id, status, snapshot_json, \
   action, actor_user_id, created_at";

/// Raw values read directly from an `ad_version_snapshots` row.
pub struct RawSnapshot {
  pub snapshot_id:   String,
  pub ad_id:         String,
  pub status:        String,
  pub snapshot_json: String,
  pub action:        String,
  pub actor_user_id: String,
  pub created_at:    String,
}

impl RawSnapshot {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      snapshot_id:   row.get(0)?,
      ad_id:         row.get(1)?,
      status:        row.get(2)?,
      snapshot_json: row.get(3)?,
      action:        row.get(4)?,
      actor_user_id: row.get(5)?,
      created_at:    row.get(6)?,
    })
  }

  pub fn into_snapshot(self) -> Result<AdVersionSnapshot> {
    Ok(AdVersionSnapshot {
      snapshot_id:   decode_uuid(&self.snapshot_id)?,
      ad_id:         decode_uuid(&self.ad_id)?,
      status:        decode_status(&self.status)?,
      snapshot:      serde_json::from_str(&self.snapshot_json)?,
      action:        decode_action(&self.action)?,
      actor_user_id: decode_uuid(&self.actor_user_id)?,
      created_at:    decode_dt(&self.created_at)?,
    })
  }
}

/// Raw values read directly from a `locations` row.
pub struct RawLocation {
  pub location_id: String,
  pub name:        String,
  pub created_at:  String,
}

impl RawLocation {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      location_id: row.get(0)?,
      name:        row.get(1)?,
      created_at:  row.get(2)?,
    })
  }

  pub fn into_location(self) -> Result<Location> {
    Ok(Location {
      location_id: decode_uuid(&self.location_id)?,
      name:        self.name,
      created_at:  decode_dt(&self.created_at)?,
    })
  }
}
