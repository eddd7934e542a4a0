//! The non-draft update guard and the transaction handle that carries its
//! bypass.
//!
//! Published and stopped ads are immutable: any UPDATE that reaches one is
//! refused unless the transaction has explicitly engaged its bypass. The
//! bypass lives on [`AdTx`] itself, starts disengaged, and dies with the
//! handle on commit or rollback, so it cannot leak into another transaction.

use std::ops::Deref;

use rusqlite::{Connection, OptionalExtension as _, Transaction, TransactionBehavior};
use souk_core::ad::AdStatus;
use uuid::Uuid;

use crate::{Error, Result, encode::encode_uuid};

/// Whether the current transaction may update non-draft ads.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum GuardBypass {
  #[default]
  Off,
  Engaged,
}

/// A write transaction on the ad tables.
///
/// Opened with `BEGIN IMMEDIATE`, so the database write lock is held from the
/// first read: a row read through the handle cannot change underneath it
/// until commit. Dropping the handle without [`AdTx::commit`] rolls back.
pub struct AdTx<'c> {
  tx:     Transaction<'c>,
  bypass: GuardBypass,
}

impl<'c> AdTx<'c> {
  pub fn begin(conn: &'c mut Connection) -> Result<Self> {
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
    Ok(Self { tx, bypass: GuardBypass::Off })
  }

  /// Allow updates of non-draft ads for the rest of this transaction.
  pub fn engage_bypass(&mut self) { self.bypass = GuardBypass::Engaged; }

  pub fn bypass(&self) -> GuardBypass { self.bypass }

  pub fn commit(self) -> Result<()> {
    self.tx.commit()?;
    Ok(())
  }
}

impl Deref for AdTx<'_> {
  type Target = Connection;

  fn deref(&self) -> &Connection { &self.tx }
}

/// Run before every UPDATE of `ads`. Passes for drafts, for missing rows (the
/// UPDATE will simply match nothing), and for any row once the bypass is
/// engaged.
pub fn check_update(tx: &AdTx<'_>, ad_id: Uuid) -> Result<()> {
  if tx.bypass() == GuardBypass::Engaged {
    return Ok(());
  }

  let status: Option<String> = tx
    .query_row(
      "SELECT status FROM ads WHERE ad_id = ?1",
      rusqlite::params![encode_uuid(ad_id)],
      |row| row.get(0),
    )
    .optional()?;

  match status {
    Some(s) if s != AdStatus::Draft.as_ref() => {
      tracing::error!(%ad_id, status = %s, "update of non-draft ad without bypass");
      Err(Error::GuardViolation(ad_id))
    }
    _ => Ok(()),
  }
}

#[cfg(test)]
mod tests {
  use chrono::Utc;

  use super::*;
  use crate::schema::SCHEMA;

  fn conn_with_ad(status: AdStatus) -> (Connection, Uuid) {
    let conn = Connection::open_in_memory().unwrap();
    conn.execute_batch(SCHEMA).unwrap();
    let location = Uuid::new_v4();
    let ad = Uuid::new_v4();
    let now = Utc::now().to_rfc3339();
    conn
      .execute(
        "INSERT INTO locations (location_id, name, created_at) VALUES (?1, 'Oslo', ?2)",
        rusqlite::params![encode_uuid(location), now],
      )
      .unwrap();
    conn
      .execute(
        "INSERT INTO ads (ad_id, user_id, location_id, title, description, status, created_at)
         VALUES (?1, ?2, ?3, 'Bike', 'a fine red bicycle', ?4, ?5)",
        rusqlite::params![
          encode_uuid(ad),
          encode_uuid(Uuid::new_v4()),
          encode_uuid(location),
          status.as_ref(),
          now,
        ],
      )
      .unwrap();
    (conn, ad)
  }

  #[test]
  fn drafts_pass_without_bypass() {
    let (mut conn, ad) = conn_with_ad(AdStatus::Draft);
    let tx = AdTx::begin(&mut conn).unwrap();
    assert!(check_update(&tx, ad).is_ok());
  }

  #[test]
  fn non_drafts_are_blocked_without_bypass() {
    for status in [AdStatus::Active, AdStatus::Stopped] {
      let (mut conn, ad) = conn_with_ad(status);
      let tx = AdTx::begin(&mut conn).unwrap();
      assert!(matches!(
        check_update(&tx, ad),
        Err(Error::GuardViolation(id)) if id == ad
      ));
    }
  }

  #[test]
  fn bypass_is_scoped_to_one_transaction() {
    let (mut conn, ad) = conn_with_ad(AdStatus::Active);
    {
      let mut tx = AdTx::begin(&mut conn).unwrap();
      tx.engage_bypass();
      assert!(check_update(&tx, ad).is_ok());
      tx.commit().unwrap();
    }
    let tx = AdTx::begin(&mut conn).unwrap();
    assert_eq!(tx.bypass(), GuardBypass::Off);
    assert!(check_update(&tx, ad).is_err());
  }

  #[test]
  fn missing_rows_pass() {
    let (mut conn, _) = conn_with_ad(AdStatus::Active);
    let tx = AdTx::begin(&mut conn).unwrap();
    assert!(check_update(&tx, Uuid::new_v4()).is_ok());
  }
}
