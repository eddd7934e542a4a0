//! The ad state machine and the audit records it leaves behind.
//!
//! Status only ever walks `draft → active → stopped → active → …`. Content
//! changes to a published or stopped ad never happen in place: the engine
//! forks a new ad and links the two through `parent_ad_id` and
//! `replaced_by_ad_id`. The functions here are the pure precondition checks;
//! backends call them against the row they hold locked.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
  Error, Result,
  ad::{Ad, AdStatus, description_in_bounds, title_in_bounds},
};

// ─── Audit ───────────────────────────────────────────────────────────────────

/// The lifecycle action recorded in a version snapshot.
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Serialize,
  Deserialize,
  strum::Display,
  strum::EnumString,
  strum::AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum SnapshotAction {
  DraftCreate,
  DraftUpdate,
  Publish,
  Stop,
  Restart,
  Fork,
}

/// An append-only record of an ad's full state at the moment of an action.
/// Never updated or deleted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdVersionSnapshot {
  pub snapshot_id:   Uuid,
  pub ad_id:         Uuid,
  /// Status of the ad right after the action.
  pub status:        AdStatus,
  /// The whole [`Ad`] as a JSON document.
  pub snapshot:      serde_json::Value,
  pub action:        SnapshotAction,
  pub actor_user_id: Uuid,
  pub created_at:    DateTime<Utc>,
}

impl AdVersionSnapshot {
  pub fn capture(
    ad: &Ad,
    action: SnapshotAction,
    actor_user_id: Uuid,
    at: DateTime<Utc>,
  ) -> Result<Self> {
    Ok(Self {
      snapshot_id: Uuid::new_v4(),
      ad_id: ad.ad_id,
      status: ad.status,
      snapshot: serde_json::to_value(ad)?,
      action,
      actor_user_id,
      created_at: at,
    })
  }
}

// ─── Transitions ─────────────────────────────────────────────────────────────

impl AdStatus {
  /// The edges of the state machine. `draft` has no incoming edge.
  pub fn can_transition_to(self, next: AdStatus) -> bool {
    matches!(
      (self, next),
      (AdStatus::Draft, AdStatus::Active)
        | (AdStatus::Active, AdStatus::Stopped)
        | (AdStatus::Stopped, AdStatus::Active)
    )
  }
}

/// A status change performed on an existing row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusTransition {
  /// `draft → active`; sets `published_at`, clears `stopped_at`.
  Publish,
  /// `active → stopped`; sets `stopped_at`.
  Stop,
  /// `stopped → active`; clears `stopped_at`. Only for unreplaced ads.
  Restart,
}

impl StatusTransition {
  pub fn from(self) -> AdStatus {
    match self {
      Self::Publish => AdStatus::Draft,
      Self::Stop => AdStatus::Active,
      Self::Restart => AdStatus::Stopped,
    }
  }

  pub fn to(self) -> AdStatus {
    match self {
      Self::Publish | Self::Restart => AdStatus::Active,
      Self::Stop => AdStatus::Stopped,
    }
  }

  pub fn action(self) -> SnapshotAction {
    match self {
      Self::Publish => SnapshotAction::Publish,
      Self::Stop => SnapshotAction::Stop,
      Self::Restart => SnapshotAction::Restart,
    }
  }

  /// Whether the row is non-draft when the UPDATE runs, so the guard must be
  /// bypassed. A publish still sees a draft row.
  pub fn touches_published_row(self) -> bool { self.from() != AdStatus::Draft }

  fn verb(self) -> &'static str {
    match self {
      Self::Publish => "publish",
      Self::Stop => "stop",
      Self::Restart => "restart",
    }
  }
}

// ─── Preconditions ───────────────────────────────────────────────────────────

fn require_status(ad: &Ad, expected: AdStatus, action: &'static str) -> Result<()> {
  if ad.status == expected {
    Ok(())
  } else {
    Err(Error::WrongStatus { ad_id: ad.ad_id, action, status: ad.status })
  }
}

/// In-place edits (fields or photos) are only for drafts.
pub fn check_draft_edit(ad: &Ad) -> Result<()> {
  require_status(ad, AdStatus::Draft, "update")
}

pub fn check_publish(ad: &Ad, photo_count: usize) -> Result<()> {
  require_status(ad, StatusTransition::Publish.from(), "publish")?;
  if !title_in_bounds(&ad.title) {
    return Err(Error::NotPublishable {
      ad_id:  ad.ad_id,
      reason: "title out of bounds".into(),
    });
  }
  if !description_in_bounds(&ad.description) {
    return Err(Error::NotPublishable {
      ad_id:  ad.ad_id,
      reason: "description out of bounds".into(),
    });
  }
  if photo_count == 0 {
    return Err(Error::NoPhotos(ad.ad_id));
  }
  Ok(())
}

pub fn check_stop(ad: &Ad) -> Result<()> {
  require_status(ad, StatusTransition::Stop.from(), StatusTransition::Stop.verb())
}

/// A replaced ad stays stopped for good; its successor carries the lineage.
pub fn check_restart(ad: &Ad, conflict: Option<&dyn ConflictCheck>) -> Result<()> {
  require_status(
    ad,
    StatusTransition::Restart.from(),
    StatusTransition::Restart.verb(),
  )?;
  if ad.is_replaced() {
    return Err(Error::AlreadyReplaced(ad.ad_id));
  }
  if let Some(check) = conflict {
    check.check(ad).map_err(Error::Conflict)?;
  }
  Ok(())
}

// ─── Conflict checks ─────────────────────────────────────────────────────────

/// A caller-supplied veto evaluated against the locked row during a restart.
/// Returning `Err(reason)` aborts the transition with `CONFLICT`.
pub trait ConflictCheck: Send + 'static {
  fn check(&self, ad: &Ad) -> std::result::Result<(), String>;
}

impl<F> ConflictCheck for F
where
  F: Fn(&Ad) -> std::result::Result<(), String> + Send + 'static,
{
  fn check(&self, ad: &Ad) -> std::result::Result<(), String> { self(ad) }
}

/// Optimistic check: the ad must still carry the `stopped_at` the caller
/// last observed.
#[derive(Debug, Clone, Copy)]
pub struct ExpectStoppedAt(pub DateTime<Utc>);

impl ConflictCheck for ExpectStoppedAt {
  fn check(&self, ad: &Ad) -> std::result::Result<(), String> {
    match ad.stopped_at {
      Some(at) if at == self.0 => Ok(()),
      Some(at) => Err(format!("ad was stopped again at {}", at.to_rfc3339())),
      None => Err("ad is no longer stopped".into()),
    }
  }
}

// ─── Fork ────────────────────────────────────────────────────────────────────

/// User-facing distinction between the two kinds of fork.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ForkNotice {
  /// The new version went live immediately; the old one was stopped.
  ForkedFromActive,
  /// The new version is a draft; the stopped original is untouched.
  ForkedFromStopped,
}

impl ForkNotice {
  pub fn message(self) -> &'static str {
    match self {
      Self::ForkedFromActive => {
        "Your changes were published as a new version of the ad; the previous \
         version has been stopped."
      }
      Self::ForkedFromStopped => {
        "Your changes were saved as a new draft; publish it when you are ready."
      }
    }
  }
}

/// What a fork of a given source will produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ForkPlan {
  pub source_status: AdStatus,
  pub target_status: AdStatus,
  pub notice:        ForkNotice,
}

impl ForkPlan {
  /// Fork preconditions: the source is published or stopped and has not been
  /// replaced yet.
  pub fn for_source(source: &Ad) -> Result<Self> {
    let (target_status, notice) = match source.status {
      AdStatus::Active => (AdStatus::Active, ForkNotice::ForkedFromActive),
      AdStatus::Stopped => (AdStatus::Draft, ForkNotice::ForkedFromStopped),
      AdStatus::Draft => {
        return Err(Error::WrongStatus {
          ad_id:  source.ad_id,
          action: "fork",
          status: source.status,
        });
      }
    };
    if source.is_replaced() {
      return Err(Error::AlreadyReplaced(source.ad_id));
    }
    Ok(Self { source_status: source.status, target_status, notice })
  }

  /// An active target inherits the source's photos and must have at least
  /// one, exactly as a publish would require.
  pub fn check_photos(&self, source_id: Uuid, photo_count: usize) -> Result<()> {
    if self.target_status == AdStatus::Active && photo_count == 0 {
      return Err(Error::NoPhotos(source_id));
    }
    Ok(())
  }
}

/// The outcome of a fork.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Forked {
  pub ad:           Ad,
  pub source_ad_id: Uuid,
  pub notice:       ForkNotice,
}

/// The outcome of an edit: in place for drafts, a fork otherwise.
#[derive(Debug, Clone)]
pub enum Edited {
  Updated(Ad),
  Forked(Forked),
}

impl Edited {
  pub fn ad(&self) -> &Ad {
    match self {
      Self::Updated(ad) => ad,
      Self::Forked(f) => &f.ad,
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::ErrorKind;
  use crate::Classify as _;

  fn ad(status: AdStatus) -> Ad {
    Ad {
      ad_id: Uuid::new_v4(),
      user_id: Uuid::new_v4(),
      location_id: Uuid::new_v4(),
      title: "Smoke A".into(),
      description: "a perfectly fine description".into(),
      price_cents: Some(1000),
      status,
      created_at: Utc::now(),
      published_at: None,
      stopped_at: None,
      parent_ad_id: None,
      replaced_by_ad_id: None,
    }
  }

  #[test]
  fn draft_is_never_reentered() {
    for from in [AdStatus::Draft, AdStatus::Active, AdStatus::Stopped] {
      assert!(!from.can_transition_to(AdStatus::Draft));
    }
    assert!(AdStatus::Draft.can_transition_to(AdStatus::Active));
    assert!(AdStatus::Stopped.can_transition_to(AdStatus::Active));
    assert!(!AdStatus::Draft.can_transition_to(AdStatus::Stopped));
  }

  #[test]
  fn transitions_follow_the_state_machine() {
    for t in [
      StatusTransition::Publish,
      StatusTransition::Stop,
      StatusTransition::Restart,
    ] {
      assert!(t.from().can_transition_to(t.to()), "{t:?}");
    }
    assert!(!StatusTransition::Publish.touches_published_row());
    assert!(StatusTransition::Stop.touches_published_row());
  }

  #[test]
  fn publish_needs_a_photo() {
    let draft = ad(AdStatus::Draft);
    let err = check_publish(&draft, 0).unwrap_err();
    assert!(matches!(err, Error::NoPhotos(_)));
    assert_eq!(err.kind(), ErrorKind::NotAllowed);
    assert!(check_publish(&draft, 1).is_ok());
  }

  #[test]
  fn publish_rechecks_bounds() {
    let mut draft = ad(AdStatus::Draft);
    draft.title = "ab".into();
    assert!(matches!(
      check_publish(&draft, 1),
      Err(Error::NotPublishable { .. })
    ));
  }

  #[test]
  fn publish_of_active_ad_is_not_allowed() {
    let err = check_publish(&ad(AdStatus::Active), 1).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotAllowed);
  }

  #[test]
  fn restart_only_from_stopped_and_unreplaced() {
    assert!(check_restart(&ad(AdStatus::Draft), None).is_err());
    assert!(check_restart(&ad(AdStatus::Active), None).is_err());
    assert!(check_restart(&ad(AdStatus::Stopped), None).is_ok());

    let mut replaced = ad(AdStatus::Stopped);
    replaced.replaced_by_ad_id = Some(Uuid::new_v4());
    assert!(matches!(
      check_restart(&replaced, None),
      Err(Error::AlreadyReplaced(_))
    ));
  }

  #[test]
  fn restart_conflict_check_maps_to_conflict() {
    let mut stopped = ad(AdStatus::Stopped);
    let seen = Utc::now();
    stopped.stopped_at = Some(seen);

    assert!(check_restart(&stopped, Some(&ExpectStoppedAt(seen))).is_ok());

    let stale = ExpectStoppedAt(seen - chrono::Duration::seconds(5));
    let err = check_restart(&stopped, Some(&stale)).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Conflict);

    let veto = |_: &Ad| Err::<(), _>("blocked".to_string());
    assert!(matches!(
      check_restart(&stopped, Some(&veto)),
      Err(Error::Conflict(m)) if m == "blocked"
    ));
  }

  #[test]
  fn fork_plan_depends_on_source_status() {
    let from_active = ForkPlan::for_source(&ad(AdStatus::Active)).unwrap();
    assert_eq!(from_active.target_status, AdStatus::Active);
    assert_eq!(from_active.notice, ForkNotice::ForkedFromActive);

    let from_stopped = ForkPlan::for_source(&ad(AdStatus::Stopped)).unwrap();
    assert_eq!(from_stopped.target_status, AdStatus::Draft);
    assert_eq!(from_stopped.notice, ForkNotice::ForkedFromStopped);

    assert!(ForkPlan::for_source(&ad(AdStatus::Draft)).is_err());
  }

  #[test]
  fn fork_of_replaced_source_is_refused() {
    let mut source = ad(AdStatus::Stopped);
    source.replaced_by_ad_id = Some(Uuid::new_v4());
    let err = ForkPlan::for_source(&source).unwrap_err();
    assert!(err.to_string().contains("already replaced"));
  }

  #[test]
  fn only_active_targets_need_photos() {
    let source = ad(AdStatus::Stopped);
    let plan = ForkPlan::for_source(&source).unwrap();
    assert!(plan.check_photos(source.ad_id, 0).is_ok());

    let source = ad(AdStatus::Active);
    let plan = ForkPlan::for_source(&source).unwrap();
    assert!(matches!(
      plan.check_photos(source.ad_id, 0),
      Err(Error::NoPhotos(_))
    ));
  }

  #[test]
  fn snapshot_captures_the_whole_ad() {
    let a = ad(AdStatus::Active);
    let actor = a.user_id;
    let snap =
      AdVersionSnapshot::capture(&a, SnapshotAction::Publish, actor, Utc::now())
        .unwrap();
    assert_eq!(snap.ad_id, a.ad_id);
    assert_eq!(snap.status, AdStatus::Active);
    assert_eq!(snap.snapshot["title"], "Smoke A");
    assert_eq!(SnapshotAction::DraftCreate.to_string(), "draft_create");
  }
}
