//! Parameterized reads and writes against the ad tables.
//!
//! No validation and no transaction control happens here. Conditional writes
//! report a precondition miss as `None` (or an affected-row count of 0),
//! never as an error; the engine decides what that means. Every UPDATE of
//! `ads` passes through [`guard::check_update`] first.

use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension as _, params};
use souk_core::{
  ad::{Ad, AdPatch, AdPhoto, AdStatus, NewAd},
  lifecycle::{AdVersionSnapshot, SnapshotAction, StatusTransition},
  location::Location,
};
use uuid::Uuid;

use crate::{
  Result,
  encode::{
    AD_COLUMNS, PHOTO_COLUMNS, RawAd, RawLocation, RawPhoto, RawSnapshot,
    SNAPSHOT_COLUMNS, encode_dt, encode_uuid,
  },
  guard::{self, AdTx},
};

/// Whether `err` is SQLite refusing a dangling foreign key.
pub fn is_foreign_key_violation(err: &crate::Error) -> bool {
  matches!(
    err,
    crate::Error::Sqlite(rusqlite::Error::SqliteFailure(e, _))
      if e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_FOREIGNKEY
  )
}

/// Whether `err` is a UNIQUE index refusing a row: for `ads`, a second
/// successor of the same parent.
pub fn is_unique_violation(err: &crate::Error) -> bool {
  matches!(
    err,
    crate::Error::Sqlite(rusqlite::Error::SqliteFailure(e, _))
      if e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
  )
}

// ─── Ads: reads ──────────────────────────────────────────────────────────────

pub fn get_ad(conn: &Connection, ad_id: Uuid) -> Result<Option<Ad>> {
  conn
    .query_row(
      &format!("SELECT {AD_COLUMNS} FROM ads WHERE ad_id = ?1"),
      params![encode_uuid(ad_id)],
      RawAd::from_row,
    )
    .optional()?
    .map(RawAd::into_ad)
    .transpose()
}

/// Read an owned ad inside a write transaction. The transaction already
/// holds the write lock, so the row stays as read until commit.
pub fn lock_ad_by_id(tx: &AdTx<'_>, ad_id: Uuid, owner: Uuid) -> Result<Option<Ad>> {
  tx.query_row(
    &format!("SELECT {AD_COLUMNS} FROM ads WHERE ad_id = ?1 AND user_id = ?2"),
    params![encode_uuid(ad_id), encode_uuid(owner)],
    RawAd::from_row,
  )
  .optional()?
  .map(RawAd::into_ad)
  .transpose()
}

pub fn list_ads_by_owner(conn: &Connection, owner: Uuid) -> Result<Vec<Ad>> {
  let mut stmt = conn.prepare(&format!(
    "SELECT {AD_COLUMNS} FROM ads WHERE user_id = ?1
     ORDER BY created_at DESC, rowid DESC"
  ))?;
  let raws = stmt
    .query_map(params![encode_uuid(owner)], RawAd::from_row)?
    .collect::<rusqlite::Result<Vec<_>>>()?;
  raws.into_iter().map(RawAd::into_ad).collect()
}

// ─── Ads: inserts ────────────────────────────────────────────────────────────

fn insert_ad(tx: &AdTx<'_>, ad: &Ad) -> Result<()> {
  tx.execute(
    &format!(
      "INSERT INTO ads ({AD_COLUMNS})
       VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)"
    ),
    params![
      encode_uuid(ad.ad_id),
      encode_uuid(ad.user_id),
      encode_uuid(ad.location_id),
      ad.title,
      ad.description,
      ad.price_cents,
      ad.status.as_ref(),
      encode_dt(ad.created_at),
      ad.published_at.map(encode_dt),
      ad.stopped_at.map(encode_dt),
      ad.parent_ad_id.map(encode_uuid),
      ad.replaced_by_ad_id.map(encode_uuid),
    ],
  )?;
  Ok(())
}

pub fn insert_draft_ad(
  tx: &AdTx<'_>,
  owner: Uuid,
  input: &NewAd,
  now: DateTime<Utc>,
) -> Result<Ad> {
  let ad = Ad {
    ad_id:             Uuid::new_v4(),
    user_id:           owner,
    location_id:       input.location_id,
    title:             input.title.clone(),
    description:       input.description.clone(),
    price_cents:       input.price_cents,
    status:            AdStatus::Draft,
    created_at:        now,
    published_at:      None,
    stopped_at:        None,
    parent_ad_id:      None,
    replaced_by_ad_id: None,
  };
  insert_ad(tx, &ad)?;
  Ok(ad)
}

/// Insert the successor of `source`: patch fields where given, the source's
/// otherwise, and `parent_ad_id` pointing back at the source.
pub fn fork_ad_from_source(
  tx: &AdTx<'_>,
  source: &Ad,
  patch: &AdPatch,
  target_status: AdStatus,
  now: DateTime<Utc>,
) -> Result<Ad> {
  let content = patch.merged_over(source);
  let ad = Ad {
    ad_id:             Uuid::new_v4(),
    user_id:           source.user_id,
    location_id:       content.location_id,
    title:             content.title,
    description:       content.description,
    price_cents:       content.price_cents,
    status:            target_status,
    created_at:        now,
    published_at:      (target_status == AdStatus::Active).then_some(now),
    stopped_at:        None,
    parent_ad_id:      Some(source.ad_id),
    replaced_by_ad_id: None,
  };
  insert_ad(tx, &ad)?;
  Ok(ad)
}

// ─── Ads: updates ────────────────────────────────────────────────────────────

/// In-place edit; matches only an owned draft.
pub fn update_draft_ad(
  tx: &AdTx<'_>,
  ad_id: Uuid,
  owner: Uuid,
  patch: &AdPatch,
) -> Result<Option<Ad>> {
  guard::check_update(tx, ad_id)?;

  let (set_price, price) = match patch.price_cents {
    Some(price) => (true, price),
    None => (false, None),
  };

  tx.query_row(
    &format!(
      "UPDATE ads SET
         location_id = COALESCE(?3, location_id),
         title       = COALESCE(?4, title),
         description = COALESCE(?5, description),
         price_cents = CASE WHEN ?6 THEN ?7 ELSE price_cents END
       WHERE ad_id = ?1 AND user_id = ?2 AND status = 'draft'
       RETURNING {AD_COLUMNS}"
    ),
    params![
      encode_uuid(ad_id),
      encode_uuid(owner),
      patch.location_id.map(encode_uuid),
      patch.title,
      patch.description,
      set_price,
      price,
    ],
    RawAd::from_row,
  )
  .optional()?
  .map(RawAd::into_ad)
  .transpose()
}

/// Apply a status transition. The expected `from` status is part of the
/// WHERE clause; a restart additionally requires the ad to be unreplaced.
pub fn set_ad_status(
  tx: &AdTx<'_>,
  ad_id: Uuid,
  transition: StatusTransition,
  now: DateTime<Utc>,
) -> Result<Option<Ad>> {
  guard::check_update(tx, ad_id)?;

  let id = encode_uuid(ad_id);
  let raw = match transition {
    StatusTransition::Publish => tx.query_row(
      &format!(
        "UPDATE ads SET status = 'active', published_at = ?2, stopped_at = NULL
         WHERE ad_id = ?1 AND status = 'draft'
         RETURNING {AD_COLUMNS}"
      ),
      params![id, encode_dt(now)],
      RawAd::from_row,
    ),
    StatusTransition::Stop => tx.query_row(
      &format!(
        "UPDATE ads SET status = 'stopped', stopped_at = ?2
         WHERE ad_id = ?1 AND status = 'active'
         RETURNING {AD_COLUMNS}"
      ),
      params![id, encode_dt(now)],
      RawAd::from_row,
    ),
    StatusTransition::Restart => tx.query_row(
      &format!(
        "UPDATE ads SET status = 'active', stopped_at = NULL
         WHERE ad_id = ?1 AND status = 'stopped' AND replaced_by_ad_id IS NULL
         RETURNING {AD_COLUMNS}"
      ),
      params![id],
      RawAd::from_row,
    ),
  };

  raw.optional()?.map(RawAd::into_ad).transpose()
}

/// Link `source` to its successor. An active source is stopped in the same
/// statement; a stopped one keeps its status. Both are conditional on the
/// source still being unreplaced in the status it was read with; the
/// returned count is 0 when a concurrent writer got there first.
pub fn mark_replaced(
  tx: &AdTx<'_>,
  source: &Ad,
  new_ad_id: Uuid,
  now: DateTime<Utc>,
) -> Result<usize> {
  guard::check_update(tx, source.ad_id)?;

  let source_id = encode_uuid(source.ad_id);
  let new_id = encode_uuid(new_ad_id);
  let affected = match source.status {
    AdStatus::Active => tx.execute(
      "UPDATE ads SET status = 'stopped', stopped_at = ?3, replaced_by_ad_id = ?2
       WHERE ad_id = ?1 AND status = 'active' AND replaced_by_ad_id IS NULL",
      params![source_id, new_id, encode_dt(now)],
    )?,
    AdStatus::Stopped => tx.execute(
      "UPDATE ads SET replaced_by_ad_id = ?2
       WHERE ad_id = ?1 AND status = 'stopped' AND replaced_by_ad_id IS NULL",
      params![source_id, new_id],
    )?,
    AdStatus::Draft => 0,
  };
  Ok(affected)
}

// ─── Photos ──────────────────────────────────────────────────────────────────

pub fn count_photos(conn: &Connection, ad_id: Uuid) -> Result<usize> {
  let count: i64 = conn.query_row(
    "SELECT COUNT(*) FROM ad_photos WHERE ad_id = ?1",
    params![encode_uuid(ad_id)],
    |row| row.get(0),
  )?;
  Ok(count as usize)
}

pub fn list_photos(conn: &Connection, ad_id: Uuid) -> Result<Vec<AdPhoto>> {
  let mut stmt = conn.prepare(&format!(
    "SELECT {PHOTO_COLUMNS} FROM ad_photos WHERE ad_id = ?1 ORDER BY sort_order"
  ))?;
  let raws = stmt
    .query_map(params![encode_uuid(ad_id)], RawPhoto::from_row)?
    .collect::<rusqlite::Result<Vec<_>>>()?;
  raws.into_iter().map(RawPhoto::into_photo).collect()
}

fn insert_photo_at(
  tx: &AdTx<'_>,
  ad_id: Uuid,
  file_ref: &str,
  sort_order: u32,
  now: DateTime<Utc>,
) -> Result<AdPhoto> {
  let photo = AdPhoto {
    photo_id: Uuid::new_v4(),
    ad_id,
    file_ref: file_ref.to_owned(),
    sort_order,
    created_at: now,
  };
  tx.execute(
    &format!("INSERT INTO ad_photos ({PHOTO_COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5)"),
    params![
      encode_uuid(photo.photo_id),
      encode_uuid(ad_id),
      photo.file_ref,
      photo.sort_order,
      encode_dt(now),
    ],
  )?;
  Ok(photo)
}

/// Append a photo after the ad's current last one.
pub fn insert_photo(
  tx: &AdTx<'_>,
  ad_id: Uuid,
  file_ref: &str,
  now: DateTime<Utc>,
) -> Result<AdPhoto> {
  let next: u32 = tx.query_row(
    "SELECT COALESCE(MAX(sort_order) + 1, 0) FROM ad_photos WHERE ad_id = ?1",
    params![encode_uuid(ad_id)],
    |row| row.get(0),
  )?;
  insert_photo_at(tx, ad_id, file_ref, next, now)
}

/// Copy every photo of `from` onto `to`, same file references, renumbered
/// from 0 in the original order.
pub fn copy_photos(
  tx: &AdTx<'_>,
  from: Uuid,
  to: Uuid,
  now: DateTime<Utc>,
) -> Result<usize> {
  let photos = list_photos(tx, from)?;
  for (order, photo) in photos.iter().enumerate() {
    insert_photo_at(tx, to, &photo.file_ref, order as u32, now)?;
  }
  Ok(photos.len())
}

// ─── Snapshots ───────────────────────────────────────────────────────────────

pub fn insert_snapshot(
  tx: &AdTx<'_>,
  ad: &Ad,
  action: SnapshotAction,
  actor: Uuid,
  now: DateTime<Utc>,
) -> Result<AdVersionSnapshot> {
  let snapshot = AdVersionSnapshot::capture(ad, action, actor, now)?;
  tx.execute(
    &format!(
      "INSERT INTO ad_version_snapshots ({SNAPSHOT_COLUMNS})
       VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)"
    ),
    params![
      encode_uuid(snapshot.snapshot_id),
      encode_uuid(snapshot.ad_id),
      snapshot.status.as_ref(),
      snapshot.snapshot.to_string(),
      snapshot.action.as_ref(),
      encode_uuid(actor),
      encode_dt(now),
    ],
  )?;
  Ok(snapshot)
}

pub fn list_snapshots(conn: &Connection, ad_id: Uuid) -> Result<Vec<AdVersionSnapshot>> {
  let mut stmt = conn.prepare(&format!(
    "SELECT {SNAPSHOT_COLUMNS} FROM ad_version_snapshots
     WHERE ad_id = ?1 ORDER BY created_at, rowid"
  ))?;
  let raws = stmt
    .query_map(params![encode_uuid(ad_id)], RawSnapshot::from_row)?
    .collect::<rusqlite::Result<Vec<_>>>()?;
  raws.into_iter().map(RawSnapshot::into_snapshot).collect()
}

// ─── Locations ───────────────────────────────────────────────────────────────

pub fn ensure_location(
  conn: &Connection,
  name: &str,
  now: DateTime<Utc>,
) -> Result<Location> {
  conn.execute(
    "INSERT INTO locations (location_id, name, created_at) VALUES (?1, ?2, ?3)
     ON CONFLICT (name) DO NOTHING",
    params![encode_uuid(Uuid::new_v4()), name, encode_dt(now)],
  )?;
  let raw = conn.query_row(
    "SELECT location_id, name, created_at FROM locations WHERE name = ?1",
    params![name],
    RawLocation::from_row,
  )?;
  raw.into_location()
}

pub fn list_locations(conn: &Connection) -> Result<Vec<Location>> {
  let mut stmt =
    conn.prepare("SELECT location_id, name, created_at FROM locations ORDER BY name")?;
  let raws = stmt
    .query_map([], RawLocation::from_row)?
    .collect::<rusqlite::Result<Vec<_>>>()?;
  raws.into_iter().map(RawLocation::into_location).collect()
}
