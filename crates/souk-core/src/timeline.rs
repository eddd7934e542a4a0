//! The versions timeline: a read model derived from an ad lineage.
//!
//! A lineage is the doubly-linked list formed by `parent_ad_id` and
//! `replaced_by_ad_id`. The timeline is never stored; it is rebuilt on read
//! by walking both directions from any member.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
  Error, Result,
  ad::{Ad, AdStatus},
};

/// One version of an ad in its lineage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimelineEntry {
  pub ad_id:               Uuid,
  pub status:              AdStatus,
  pub title:               String,
  pub price_cents:         Option<i64>,
  pub location_id:         Uuid,
  pub created_at:          DateTime<Utc>,
  pub published_at:        Option<DateTime<Utc>>,
  pub stopped_at:          Option<DateTime<Utc>>,
  pub parent_ad_id:        Option<Uuid>,
  pub replaced_by_ad_id:   Option<Uuid>,
  /// This is the version the request asked about.
  pub is_current:          bool,
  /// This is the most recent version that is live.
  pub is_latest_published: bool,
}

/// The materialised lineage of an ad, oldest version first.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Timeline {
  pub current_ad_id:          Uuid,
  pub latest_published_ad_id: Option<Uuid>,
  pub is_owner:               bool,
  pub timeline:               Vec<TimelineEntry>,
}

impl Timeline {
  /// Build the timeline for `requested` as seen by `requester`.
  ///
  /// `chain` must be ordered oldest → newest. Non-owners only ever see
  /// active versions; asking about a version they cannot see is
  /// indistinguishable from asking about one that does not exist.
  pub fn build(
    requester: Option<Uuid>,
    requested: Uuid,
    chain: Vec<Ad>,
  ) -> Result<Self> {
    let current = chain
      .iter()
      .find(|ad| ad.ad_id == requested)
      .ok_or(Error::AdNotFound(requested))?;

    if !current.is_visible_to(requester) {
      return Err(Error::AdNotFound(requested));
    }
    let is_owner = requester.is_some_and(|id| current.is_owned_by(id));

    let visible: Vec<Ad> = chain
      .into_iter()
      .filter(|ad| is_owner || ad.status == AdStatus::Active)
      .collect();

    let latest_published_ad_id = visible
      .iter()
      .rev()
      .find(|ad| ad.status == AdStatus::Active)
      .map(|ad| ad.ad_id);

    let timeline = visible
      .into_iter()
      .map(|ad| TimelineEntry {
        is_current: ad.ad_id == requested,
        is_latest_published: Some(ad.ad_id) == latest_published_ad_id,
        ad_id: ad.ad_id,
        status: ad.status,
        title: ad.title,
        price_cents: ad.price_cents,
        location_id: ad.location_id,
        created_at: ad.created_at,
        published_at: ad.published_at,
        stopped_at: ad.stopped_at,
        parent_ad_id: ad.parent_ad_id,
        replaced_by_ad_id: ad.replaced_by_ad_id,
      })
      .collect();

    Ok(Self {
      current_ad_id: requested,
      latest_published_ad_id,
      is_owner,
      timeline,
    })
  }
}

/// Collect the whole lineage containing `start`, oldest first.
///
/// `fetch` loads an ad by id. Dangling links end the walk in that direction,
/// and an id is never visited twice, so a corrupted chain cannot loop.
pub fn walk_lineage<E>(
  start: Ad,
  mut fetch: impl FnMut(Uuid) -> std::result::Result<Option<Ad>, E>,
) -> std::result::Result<Vec<Ad>, E> {
  let mut seen = HashSet::from([start.ad_id]);

  let mut ancestors = Vec::new();
  let mut cursor = start.parent_ad_id;
  while let Some(id) = cursor {
    if !seen.insert(id) {
      break;
    }
    let Some(ad) = fetch(id)? else { break };
    cursor = ad.parent_ad_id;
    ancestors.push(ad);
  }
  ancestors.reverse();

  let mut cursor = start.replaced_by_ad_id;
  let mut chain = ancestors;
  chain.push(start);
  while let Some(id) = cursor {
    if !seen.insert(id) {
      break;
    }
    let Some(ad) = fetch(id)? else { break };
    cursor = ad.replaced_by_ad_id;
    chain.push(ad);
  }

  Ok(chain)
}

#[cfg(test)]
mod tests {
  use std::collections::HashMap;
  use std::convert::Infallible;

  use super::*;

  fn ad(owner: Uuid, status: AdStatus) -> Ad {
    Ad {
      ad_id: Uuid::new_v4(),
      user_id: owner,
      location_id: Uuid::nil(),
      title: "Bike".into(),
      description: "a perfectly fine bike".into(),
      price_cents: None,
      status,
      created_at: Utc::now(),
      published_at: None,
      stopped_at: None,
      parent_ad_id: None,
      replaced_by_ad_id: None,
    }
  }

  /// v1 (stopped) → v2 (stopped) → v3 (active) → v4 (draft)
  fn lineage(owner: Uuid) -> Vec<Ad> {
    let mut v = vec![
      ad(owner, AdStatus::Stopped),
      ad(owner, AdStatus::Stopped),
      ad(owner, AdStatus::Active),
      ad(owner, AdStatus::Draft),
    ];
    for i in 0..v.len() - 1 {
      let next = v[i + 1].ad_id;
      let prev = v[i].ad_id;
      v[i].replaced_by_ad_id = Some(next);
      v[i + 1].parent_ad_id = Some(prev);
    }
    v
  }

  fn fetcher(
    chain: &[Ad],
  ) -> impl FnMut(Uuid) -> std::result::Result<Option<Ad>, Infallible> + '_ {
    let by_id: HashMap<Uuid, &Ad> = chain.iter().map(|a| (a.ad_id, a)).collect();
    move |id| Ok(by_id.get(&id).map(|a| (*a).clone()))
  }

  #[test]
  fn walk_from_the_middle_finds_both_ends() {
    let chain = lineage(Uuid::new_v4());
    let walked = walk_lineage(chain[2].clone(), fetcher(&chain)).unwrap();
    let ids: Vec<_> = walked.iter().map(|a| a.ad_id).collect();
    let expected: Vec<_> = chain.iter().map(|a| a.ad_id).collect();
    assert_eq!(ids, expected);
  }

  #[test]
  fn walk_stops_on_cycles() {
    let mut chain = lineage(Uuid::new_v4());
    let first = chain[0].ad_id;
    chain[3].replaced_by_ad_id = Some(first);
    let walked = walk_lineage(chain[0].clone(), fetcher(&chain)).unwrap();
    assert_eq!(walked.len(), 4);
  }

  #[test]
  fn owner_sees_the_full_chain() {
    let owner = Uuid::new_v4();
    let chain = lineage(owner);
    let requested = chain[1].ad_id;
    let latest = chain[2].ad_id;

    let t = Timeline::build(Some(owner), requested, chain).unwrap();
    assert!(t.is_owner);
    assert_eq!(t.timeline.len(), 4);
    assert_eq!(t.current_ad_id, requested);
    assert_eq!(t.latest_published_ad_id, Some(latest));
    assert!(t.timeline[1].is_current);
    assert!(t.timeline[2].is_latest_published);
    assert_eq!(t.timeline.iter().filter(|e| e.is_current).count(), 1);
  }

  #[test]
  fn strangers_only_see_active_versions() {
    let chain = lineage(Uuid::new_v4());
    let active = chain[2].ad_id;

    let t = Timeline::build(Some(Uuid::new_v4()), active, chain.clone()).unwrap();
    assert!(!t.is_owner);
    assert!(t.timeline.iter().all(|e| e.status == AdStatus::Active));
    assert_eq!(t.timeline.len(), 1);

    let anonymous = Timeline::build(None, active, chain).unwrap();
    assert_eq!(anonymous.timeline.len(), 1);
  }

  #[test]
  fn strangers_cannot_open_hidden_versions() {
    let chain = lineage(Uuid::new_v4());
    let stopped = chain[0].ad_id;
    assert!(matches!(
      Timeline::build(Some(Uuid::new_v4()), stopped, chain),
      Err(Error::AdNotFound(id)) if id == stopped
    ));
  }
}
