//! Ad types: the listing record, its photos, and the inputs that create or
//! change it.
//!
//! An ad is editable in place only while it is a draft. Once published, its
//! content is frozen; edits produce a new ad linked into the same lineage
//! (see [`crate::lifecycle`]).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;

use crate::{Error, Result};

// ─── Bounds ──────────────────────────────────────────────────────────────────

pub const TITLE_MIN: usize = 3;
pub const TITLE_MAX: usize = 120;
pub const DESCRIPTION_MIN: usize = 10;
pub const DESCRIPTION_MAX: usize = 5000;

// ─── Status ──────────────────────────────────────────────────────────────────

/// Where an ad sits in its lifecycle.
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Hash,
  Serialize,
  Deserialize,
  strum::Display,
  strum::EnumString,
  strum::AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum AdStatus {
  /// Not yet public; freely editable by its owner.
  Draft,
  /// Published and visible to everyone.
  Active,
  /// Taken down by its owner; may be restarted.
  Stopped,
}

// ─── Ad ──────────────────────────────────────────────────────────────────────

/// A listing as persisted by the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ad {
  pub ad_id:             Uuid,
  /// The owning user.
  pub user_id:           Uuid,
  pub location_id:       Uuid,
  pub title:             String,
  pub description:       String,
  /// Price in minor currency units; `None` means "price on request".
  pub price_cents:       Option<i64>,
  pub status:            AdStatus,
  pub created_at:        DateTime<Utc>,
  pub published_at:      Option<DateTime<Utc>>,
  pub stopped_at:        Option<DateTime<Utc>>,
  /// The ad this one was forked from.
  pub parent_ad_id:      Option<Uuid>,
  /// The ad that superseded this one. Written at most once.
  pub replaced_by_ad_id: Option<Uuid>,
}

impl Ad {
  pub fn is_owned_by(&self, user_id: Uuid) -> bool { self.user_id == user_id }

  pub fn is_replaced(&self) -> bool { self.replaced_by_ad_id.is_some() }

  /// Whether `requester` may see this ad at all. Owners see every status,
  /// everyone else only active ads.
  pub fn is_visible_to(&self, requester: Option<Uuid>) -> bool {
    self.status == AdStatus::Active
      || requester.is_some_and(|id| self.is_owned_by(id))
  }
}

// ─── Photos ──────────────────────────────────────────────────────────────────

/// An ordered photo attachment. The bytes live in external file storage;
/// only the reference is kept here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdPhoto {
  pub photo_id:   Uuid,
  pub ad_id:      Uuid,
  pub file_ref:   String,
  /// 0-based position within the ad.
  pub sort_order: u32,
  pub created_at: DateTime<Utc>,
}

// ─── NewAd ───────────────────────────────────────────────────────────────────

/// Input to [`crate::store::AdStore::create_draft`].
#[derive(Debug, Clone, Deserialize)]
pub struct NewAd {
  pub location_id: Uuid,
  pub title:       String,
  pub description: String,
  #[serde(default)]
  pub price_cents: Option<i64>,
}

impl NewAd {
  /// Trim the text fields and check every bound.
  pub fn normalized(self) -> Result<Self> {
    let title = check_title(&self.title)?;
    let description = check_description(&self.description)?;
    check_price(self.price_cents)?;
    Ok(Self { title, description, ..self })
  }
}

// ─── AdPatch ─────────────────────────────────────────────────────────────────

/// A partial edit. Absent fields are left alone; for `price_cents`, an
/// explicit `null` clears the price while an absent key keeps it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct AdPatch {
  #[serde(default)]
  pub location_id: Option<Uuid>,
  #[serde(default)]
  pub title:       Option<String>,
  #[serde(default)]
  pub description: Option<String>,
  #[serde(default, deserialize_with = "present")]
  pub price_cents: Option<Option<i64>>,
}

/// Distinguishes `"key": null` (`Some(None)`) from a missing key (`None`).
fn present<'de, D, T>(de: D) -> std::result::Result<Option<Option<T>>, D::Error>
where
  D: Deserializer<'de>,
  T: Deserialize<'de>,
{
  Option::<T>::deserialize(de).map(Some)
}

impl AdPatch {
  pub fn is_empty(&self) -> bool {
    self.location_id.is_none()
      && self.title.is_none()
      && self.description.is_none()
      && self.price_cents.is_none()
  }

  /// Trim the supplied text fields and check the bounds of everything
  /// present. An empty patch is rejected.
  pub fn normalized(self) -> Result<Self> {
    if self.is_empty() {
      return Err(Error::Invalid("patch contains no fields".into()));
    }
    let title = self.title.as_deref().map(check_title).transpose()?;
    let description =
      self.description.as_deref().map(check_description).transpose()?;
    if let Some(price) = self.price_cents {
      check_price(price)?;
    }
    Ok(Self { title, description, ..self })
  }

  /// The content a fork of `source` carries: patch fields where given,
  /// otherwise the source's.
  pub fn merged_over(&self, source: &Ad) -> AdContent {
    AdContent {
      location_id: self.location_id.unwrap_or(source.location_id),
      title:       self.title.clone().unwrap_or_else(|| source.title.clone()),
      description: self
        .description
        .clone()
        .unwrap_or_else(|| source.description.clone()),
      price_cents: self.price_cents.unwrap_or(source.price_cents),
    }
  }
}

/// The editable content of an ad, fully resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdContent {
  pub location_id: Uuid,
  pub title:       String,
  pub description: String,
  pub price_cents: Option<i64>,
}

// ─── Validation ──────────────────────────────────────────────────────────────

fn check_title(raw: &str) -> Result<String> {
  let title = raw.trim();
  if !title_in_bounds(title) {
    return Err(Error::Invalid(format!(
      "title must be {TITLE_MIN}-{TITLE_MAX} characters"
    )));
  }
  Ok(title.to_owned())
}

fn check_description(raw: &str) -> Result<String> {
  let description = raw.trim();
  if !description_in_bounds(description) {
    return Err(Error::Invalid(format!(
      "description must be {DESCRIPTION_MIN}-{DESCRIPTION_MAX} characters"
    )));
  }
  Ok(description.to_owned())
}

fn check_price(price: Option<i64>) -> Result<()> {
  match price {
    Some(p) if p < 0 => Err(Error::Invalid("price must not be negative".into())),
    _ => Ok(()),
  }
}

pub fn title_in_bounds(title: &str) -> bool {
  (TITLE_MIN..=TITLE_MAX).contains(&title.chars().count())
}

pub fn description_in_bounds(description: &str) -> bool {
  (DESCRIPTION_MIN..=DESCRIPTION_MAX).contains(&description.chars().count())
}

#[cfg(test)]
mod tests {
  use super::*;

  fn new_ad(title: &str, description: &str, price: Option<i64>) -> NewAd {
    NewAd {
      location_id: Uuid::new_v4(),
      title:       title.into(),
      description: description.into(),
      price_cents: price,
    }
  }

  #[test]
  fn new_ad_is_trimmed() {
    let ad = new_ad("  Bike  ", "  a fine red bicycle ", Some(1000))
      .normalized()
      .unwrap();
    assert_eq!(ad.title, "Bike");
    assert_eq!(ad.description, "a fine red bicycle");
  }

  #[test]
  fn title_bounds_count_characters_not_bytes() {
    assert!(new_ad("ab", "long enough text", None).normalized().is_err());
    assert!(new_ad("äöü", "long enough text", None).normalized().is_ok());
    let long = "x".repeat(TITLE_MAX + 1);
    assert!(new_ad(&long, "long enough text", None).normalized().is_err());
  }

  #[test]
  fn description_and_price_bounds() {
    assert!(new_ad("Bike", "too short", None).normalized().is_err());
    assert!(new_ad("Bike", "long enough text", Some(-1)).normalized().is_err());
    assert!(new_ad("Bike", "long enough text", Some(0)).normalized().is_ok());
  }

  #[test]
  fn empty_patch_is_invalid() {
    assert!(matches!(
      AdPatch::default().normalized(),
      Err(Error::Invalid(_))
    ));
  }

  #[test]
  fn patch_distinguishes_null_price_from_absent_price() {
    let cleared: AdPatch =
      serde_json::from_str(r#"{"price_cents": null}"#).unwrap();
    assert_eq!(cleared.price_cents, Some(None));

    let untouched: AdPatch =
      serde_json::from_str(r#"{"title": "New title"}"#).unwrap();
    assert_eq!(untouched.price_cents, None);
  }

  #[test]
  fn merged_over_falls_back_to_source() {
    let source = Ad {
      ad_id:             Uuid::new_v4(),
      user_id:           Uuid::new_v4(),
      location_id:       Uuid::new_v4(),
      title:             "Old title".into(),
      description:       "old description".into(),
      price_cents:       Some(500),
      status:            AdStatus::Active,
      created_at:        Utc::now(),
      published_at:      Some(Utc::now()),
      stopped_at:        None,
      parent_ad_id:      None,
      replaced_by_ad_id: None,
    };
    let patch = AdPatch {
      title: Some("New title".into()),
      price_cents: Some(None),
      ..Default::default()
    };

    let merged = patch.merged_over(&source);
    assert_eq!(merged.title, "New title");
    assert_eq!(merged.description, "old description");
    assert_eq!(merged.location_id, source.location_id);
    assert_eq!(merged.price_cents, None);
  }
}
