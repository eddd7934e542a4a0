//! The `AdStore` trait: the lifecycle engine's public surface.
//!
//! The trait is implemented by storage backends (e.g. `souk-store-sqlite`).
//! Every mutating method is one atomic transaction: it either commits in
//! full, including its version snapshot, or leaves no trace.

use std::future::Future;

use uuid::Uuid;

use crate::{
  Classify,
  ad::{Ad, AdPatch, AdPhoto, NewAd},
  lifecycle::{AdVersionSnapshot, ConflictCheck, Edited, Forked},
  location::Location,
  timeline::Timeline,
};

// ─── Options ─────────────────────────────────────────────────────────────────

/// Parameters for [`AdStore::restart`].
#[derive(Default)]
pub struct RestartOptions {
  /// Evaluated against the locked row; a veto aborts with `CONFLICT`.
  pub conflict_check: Option<Box<dyn ConflictCheck>>,
}

impl RestartOptions {
  pub fn with_check(check: impl ConflictCheck) -> Self {
    Self { conflict_check: Some(Box::new(check)) }
  }
}

// ─── Trait ───────────────────────────────────────────────────────────────────

/// Abstraction over a Souk ad store backend.
///
/// `owner` arguments are the acting user. An ad owned by somebody else is
/// reported exactly like a missing one.
///
/// All methods return `Send` futures so the trait can be used in
/// multi-threaded async runtimes (e.g. tokio with `axum`).
pub trait AdStore: Send + Sync {
  type Error: std::error::Error + Classify + Send + Sync + 'static;

  // ── Locations ─────────────────────────────────────────────────────────

  /// Return the location called `name`, creating it if needed.
  fn ensure_location(
    &self,
    name: String,
  ) -> impl Future<Output = Result<Location, Self::Error>> + Send + '_;

  fn list_locations(
    &self,
  ) -> impl Future<Output = Result<Vec<Location>, Self::Error>> + Send + '_;

  // ── Drafts ────────────────────────────────────────────────────────────

  /// Insert a new draft owned by `owner`.
  fn create_draft(
    &self,
    owner: Uuid,
    input: NewAd,
  ) -> impl Future<Output = Result<Ad, Self::Error>> + Send + '_;

  /// Edit a draft in place. Fails with `NOT_ALLOWED` for any other status.
  fn update_draft(
    &self,
    owner: Uuid,
    ad_id: Uuid,
    patch: AdPatch,
  ) -> impl Future<Output = Result<Ad, Self::Error>> + Send + '_;

  /// Append a photo reference to a draft.
  fn attach_photo(
    &self,
    owner: Uuid,
    ad_id: Uuid,
    file_ref: String,
  ) -> impl Future<Output = Result<AdPhoto, Self::Error>> + Send + '_;

  // ── Transitions ───────────────────────────────────────────────────────

  /// `draft → active`. Requires at least one photo.
  fn publish(
    &self,
    owner: Uuid,
    ad_id: Uuid,
  ) -> impl Future<Output = Result<Ad, Self::Error>> + Send + '_;

  /// `active → stopped`.
  fn stop(
    &self,
    owner: Uuid,
    ad_id: Uuid,
  ) -> impl Future<Output = Result<Ad, Self::Error>> + Send + '_;

  /// `stopped → active`, unless the ad has been replaced.
  fn restart(
    &self,
    owner: Uuid,
    ad_id: Uuid,
    options: RestartOptions,
  ) -> impl Future<Output = Result<Ad, Self::Error>> + Send + '_;

  /// Supersede a published or stopped ad with a new version carrying
  /// `patch`. At most one fork per source ever succeeds.
  fn fork(
    &self,
    owner: Uuid,
    ad_id: Uuid,
    patch: AdPatch,
  ) -> impl Future<Output = Result<Forked, Self::Error>> + Send + '_;

  /// Apply `patch` the only way the ad's current status permits: in place
  /// for a draft, by forking otherwise. The choice is made under the same
  /// lock as the write.
  fn edit(
    &self,
    owner: Uuid,
    ad_id: Uuid,
    patch: AdPatch,
  ) -> impl Future<Output = Result<Edited, Self::Error>> + Send + '_;

  // ── Reads ─────────────────────────────────────────────────────────────

  /// Fetch an ad as seen by `requester`. Returns `None` when it does not
  /// exist or is not visible to them.
  fn get_ad(
    &self,
    requester: Option<Uuid>,
    ad_id: Uuid,
  ) -> impl Future<Output = Result<Option<Ad>, Self::Error>> + Send + '_;

  /// All ads owned by `owner`, newest first.
  fn list_ads(
    &self,
    owner: Uuid,
  ) -> impl Future<Output = Result<Vec<Ad>, Self::Error>> + Send + '_;

  /// Photos of an ad in display order, with the visibility of [`Self::get_ad`].
  fn list_photos(
    &self,
    requester: Option<Uuid>,
    ad_id: Uuid,
  ) -> impl Future<Output = Result<Vec<AdPhoto>, Self::Error>> + Send + '_;

  /// The version lineage containing `ad_id`.
  fn timeline(
    &self,
    requester: Option<Uuid>,
    ad_id: Uuid,
  ) -> impl Future<Output = Result<Timeline, Self::Error>> + Send + '_;

  /// The audit trail of one ad, oldest first. Owner only.
  fn snapshots(
    &self,
    owner: Uuid,
    ad_id: Uuid,
  ) -> impl Future<Output = Result<Vec<AdVersionSnapshot>, Self::Error>> + Send + '_;
}
