//! The lifecycle engine: every ad mutation as one atomic transaction.
//!
//! Each operation opens an [`AdTx`], reads the target row under the write
//! lock, checks the transition against `souk_core::lifecycle`, writes through
//! the query layer, records one version snapshot and commits. Any early
//! return drops the handle, which rolls the whole transaction back.

use chrono::{DateTime, Utc};
use rusqlite::Connection;
use souk_core::{
  Error as CoreError,
  ad::{Ad, AdPatch, AdPhoto, AdStatus, NewAd},
  lifecycle::{
    self, AdVersionSnapshot, ConflictCheck, Edited, ForkPlan, Forked,
    SnapshotAction, StatusTransition,
  },
  location::Location,
  timeline::{Timeline, walk_lineage},
};
use tracing::{info, warn};
use uuid::Uuid;

use crate::{
  Error, Result,
  guard::AdTx,
  query::{self, is_foreign_key_violation},
};

// ─── Helpers ─────────────────────────────────────────────────────────────────

/// Lock an ad owned by `owner`. Someone else's ad is reported as missing.
fn locked(tx: &AdTx<'_>, ad_id: Uuid, owner: Uuid) -> Result<Ad> {
  query::lock_ad_by_id(tx, ad_id, owner)?
    .ok_or(Error::Core(CoreError::AdNotFound(ad_id)))
}

/// Translate a dangling `location_id` into a caller error.
fn unknown_location(err: Error, location_id: Uuid) -> Error {
  if is_foreign_key_violation(&err) {
    CoreError::UnknownLocation(location_id).into()
  } else {
    err
  }
}

// ─── Drafts ──────────────────────────────────────────────────────────────────

pub fn create_draft(conn: &mut Connection, owner: Uuid, input: NewAd) -> Result<Ad> {
  let input = input.normalized()?;
  let now = Utc::now();
  let tx = AdTx::begin(conn)?;

  let ad = query::insert_draft_ad(&tx, owner, &input, now)
    .map_err(|e| unknown_location(e, input.location_id))?;
  query::insert_snapshot(&tx, &ad, SnapshotAction::DraftCreate, owner, now)?;
  tx.commit()?;

  info!(ad_id = %ad.ad_id, %owner, "draft created");
  Ok(ad)
}

fn update_locked(
  tx: &AdTx<'_>,
  ad: &Ad,
  patch: &AdPatch,
  actor: Uuid,
  now: DateTime<Utc>,
) -> Result<Ad> {
  lifecycle::check_draft_edit(ad)?;

  let updated = query::update_draft_ad(tx, ad.ad_id, actor, patch)
    .map_err(|e| unknown_location(e, patch.location_id.unwrap_or(ad.location_id)))?
    .ok_or(CoreError::WrongStatus {
      ad_id:  ad.ad_id,
      action: "update",
      status: ad.status,
    })?;
  query::insert_snapshot(tx, &updated, SnapshotAction::DraftUpdate, actor, now)?;
  Ok(updated)
}

pub fn update_draft(
  conn: &mut Connection,
  owner: Uuid,
  ad_id: Uuid,
  patch: AdPatch,
) -> Result<Ad> {
  let patch = patch.normalized()?;
  let now = Utc::now();
  let tx = AdTx::begin(conn)?;

  let ad = locked(&tx, ad_id, owner)?;
  let updated = update_locked(&tx, &ad, &patch, owner, now)?;
  tx.commit()?;

  info!(%ad_id, %owner, "draft updated");
  Ok(updated)
}

pub fn attach_photo(
  conn: &mut Connection,
  owner: Uuid,
  ad_id: Uuid,
  file_ref: String,
) -> Result<AdPhoto> {
  let file_ref = file_ref.trim();
  if file_ref.is_empty() {
    return Err(CoreError::Invalid("file_ref must not be empty".into()).into());
  }
  let now = Utc::now();
  let tx = AdTx::begin(conn)?;

  let ad = locked(&tx, ad_id, owner)?;
  lifecycle::check_draft_edit(&ad)?;
  let photo = query::insert_photo(&tx, ad_id, file_ref, now)?;
  tx.commit()?;

  info!(%ad_id, sort_order = photo.sort_order, "photo attached");
  Ok(photo)
}

// ─── Status transitions ──────────────────────────────────────────────────────

fn transition(
  conn: &mut Connection,
  owner: Uuid,
  ad_id: Uuid,
  transition: StatusTransition,
  conflict: Option<Box<dyn ConflictCheck>>,
) -> Result<Ad> {
  let now = Utc::now();
  let mut tx = AdTx::begin(conn)?;
  let ad = locked(&tx, ad_id, owner)?;

  match transition {
    StatusTransition::Publish => {
      let photos = query::count_photos(&tx, ad_id)?;
      lifecycle::check_publish(&ad, photos)?;
    }
    StatusTransition::Stop => lifecycle::check_stop(&ad)?,
    StatusTransition::Restart => lifecycle::check_restart(&ad, conflict.as_deref())?,
  }

  if transition.touches_published_row() {
    tx.engage_bypass();
  }

  let updated = query::set_ad_status(&tx, ad_id, transition, now)?.ok_or(
    CoreError::WrongStatus {
      ad_id,
      action: "change the status of",
      status: ad.status,
    },
  )?;
  query::insert_snapshot(&tx, &updated, transition.action(), owner, now)?;
  tx.commit()?;

  info!(
    %ad_id,
    %owner,
    from = %transition.from(),
    to = %transition.to(),
    "ad status changed"
  );
  Ok(updated)
}

pub fn publish(conn: &mut Connection, owner: Uuid, ad_id: Uuid) -> Result<Ad> {
  transition(conn, owner, ad_id, StatusTransition::Publish, None)
}

pub fn stop(conn: &mut Connection, owner: Uuid, ad_id: Uuid) -> Result<Ad> {
  transition(conn, owner, ad_id, StatusTransition::Stop, None)
}

pub fn restart(
  conn: &mut Connection,
  owner: Uuid,
  ad_id: Uuid,
  conflict: Option<Box<dyn ConflictCheck>>,
) -> Result<Ad> {
  transition(conn, owner, ad_id, StatusTransition::Restart, conflict)
}

// ─── Fork ────────────────────────────────────────────────────────────────────

pub(crate) fn fork_locked(
  tx: &mut AdTx<'_>,
  source: &Ad,
  patch: &AdPatch,
  actor: Uuid,
  now: DateTime<Utc>,
) -> Result<Forked> {
  let plan = ForkPlan::for_source(source).inspect_err(|e| {
    warn!(source_ad_id = %source.ad_id, error = %e, "fork refused");
  })?;

  let photos = query::count_photos(tx, source.ad_id)?;
  plan.check_photos(source.ad_id, photos)?;

  // The source row is non-draft and gets linked below.
  tx.engage_bypass();

  let ad = query::fork_ad_from_source(tx, source, patch, plan.target_status, now)
    .map_err(|e| {
      if query::is_unique_violation(&e) {
        CoreError::ReplaceRaced(source.ad_id).into()
      } else {
        unknown_location(e, patch.location_id.unwrap_or(source.location_id))
      }
    })?;
  let copied = query::copy_photos(tx, source.ad_id, ad.ad_id, now)?;

  if query::mark_replaced(tx, source, ad.ad_id, now)? == 0 {
    warn!(source_ad_id = %source.ad_id, "source changed underneath fork; rolling back");
    return Err(CoreError::ReplaceRaced(source.ad_id).into());
  }

  query::insert_snapshot(tx, &ad, SnapshotAction::Fork, actor, now)?;

  info!(
    source_ad_id = %source.ad_id,
    ad_id = %ad.ad_id,
    status = %ad.status,
    photos = copied,
    "ad forked"
  );
  Ok(Forked { ad, source_ad_id: source.ad_id, notice: plan.notice })
}

pub fn fork(
  conn: &mut Connection,
  owner: Uuid,
  ad_id: Uuid,
  patch: AdPatch,
) -> Result<Forked> {
  let patch = patch.normalized()?;
  let now = Utc::now();
  let mut tx = AdTx::begin(conn)?;

  let source = locked(&tx, ad_id, owner)?;
  let forked = fork_locked(&mut tx, &source, &patch, owner, now)?;
  tx.commit()?;
  Ok(forked)
}

/// Drafts are edited in place; anything else is forked. The status is read
/// under the same lock as the write, so the choice cannot go stale.
pub fn edit(
  conn: &mut Connection,
  owner: Uuid,
  ad_id: Uuid,
  patch: AdPatch,
) -> Result<Edited> {
  let patch = patch.normalized()?;
  let now = Utc::now();
  let mut tx = AdTx::begin(conn)?;

  let ad = locked(&tx, ad_id, owner)?;
  let edited = match ad.status {
    AdStatus::Draft => Edited::Updated(update_locked(&tx, &ad, &patch, owner, now)?),
    AdStatus::Active | AdStatus::Stopped => {
      Edited::Forked(fork_locked(&mut tx, &ad, &patch, owner, now)?)
    }
  };
  tx.commit()?;
  Ok(edited)
}

// ─── Reads ───────────────────────────────────────────────────────────────────

pub fn get_ad(
  conn: &Connection,
  requester: Option<Uuid>,
  ad_id: Uuid,
) -> Result<Option<Ad>> {
  Ok(query::get_ad(conn, ad_id)?.filter(|ad| ad.is_visible_to(requester)))
}

pub fn list_ads(conn: &Connection, owner: Uuid) -> Result<Vec<Ad>> {
  query::list_ads_by_owner(conn, owner)
}

pub fn list_photos(
  conn: &mut Connection,
  requester: Option<Uuid>,
  ad_id: Uuid,
) -> Result<Vec<AdPhoto>> {
  let tx = conn.transaction()?;
  if get_ad(&tx, requester, ad_id)?.is_none() {
    return Err(CoreError::AdNotFound(ad_id).into());
  }
  query::list_photos(&tx, ad_id)
}

/// Walk the lineage of `ad_id` within one read transaction so the chain is
/// a consistent snapshot.
pub fn timeline(
  conn: &mut Connection,
  requester: Option<Uuid>,
  ad_id: Uuid,
) -> Result<Timeline> {
  let tx = conn.transaction()?;
  let start = query::get_ad(&tx, ad_id)?.ok_or(CoreError::AdNotFound(ad_id))?;
  let chain = walk_lineage(start, |id| query::get_ad(&tx, id))?;
  Ok(Timeline::build(requester, ad_id, chain)?)
}

pub fn snapshots(
  conn: &mut Connection,
  owner: Uuid,
  ad_id: Uuid,
) -> Result<Vec<AdVersionSnapshot>> {
  let tx = conn.transaction()?;
  match query::get_ad(&tx, ad_id)? {
    Some(ad) if ad.is_owned_by(owner) => query::list_snapshots(&tx, ad_id),
    _ => Err(CoreError::AdNotFound(ad_id).into()),
  }
}

// ─── Locations ───────────────────────────────────────────────────────────────

pub fn ensure_location(conn: &Connection, name: String) -> Result<Location> {
  let name = name.trim();
  if name.is_empty() {
    return Err(CoreError::Invalid("location name must not be empty".into()).into());
  }
  query::ensure_location(conn, name, Utc::now())
}

pub fn list_locations(conn: &Connection) -> Result<Vec<Location>> {
  query::list_locations(conn)
}
