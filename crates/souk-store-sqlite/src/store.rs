//! [`SqliteStore`]: the SQLite implementation of [`AdStore`].

use std::path::Path;

use rusqlite::Connection;
use uuid::Uuid;

use souk_core::{
  ad::{Ad, AdPatch, AdPhoto, NewAd},
  lifecycle::{AdVersionSnapshot, Edited, Forked},
  location::Location,
  store::{AdStore, RestartOptions},
  timeline::Timeline,
};

use crate::{Result, engine, schema::SCHEMA};

// ─── Store ───────────────────────────────────────────────────────────────────

/// A Souk ad store backed by a single SQLite file.
///
/// Cloning is cheap; the inner connection is reference-counted. All clones
/// share one connection thread, which is what serializes transactions.
#[derive(Clone)]
pub struct SqliteStore {
  conn: tokio_rusqlite::Connection,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory store: useful for testing.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  /// Run `f` on the connection thread and hand back its result.
  pub(crate) async fn run<T, F>(&self, f: F) -> Result<T>
  where
    F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
    T: Send + 'static,
  {
    self.conn.call(move |conn| Ok(f(conn))).await?
  }
}

// ─── AdStore impl ────────────────────────────────────────────────────────────

impl AdStore for SqliteStore {
  type Error = crate::Error;

  // ── Locations ─────────────────────────────────────────────────────────────

  async fn ensure_location(&self, name: String) -> Result<Location> {
    self.run(move |conn| engine::ensure_location(conn, name)).await
  }

  async fn list_locations(&self) -> Result<Vec<Location>> {
    self.run(|conn| engine::list_locations(conn)).await
  }

  // ── Drafts ────────────────────────────────────────────────────────────────

  async fn create_draft(&self, owner: Uuid, input: NewAd) -> Result<Ad> {
    self
      .run(move |conn| engine::create_draft(conn, owner, input))
      .await
  }

  async fn update_draft(
    &self,
    owner: Uuid,
    ad_id: Uuid,
    patch: AdPatch,
  ) -> Result<Ad> {
    self
      .run(move |conn| engine::update_draft(conn, owner, ad_id, patch))
      .await
  }

  async fn attach_photo(
    &self,
    owner: Uuid,
    ad_id: Uuid,
    file_ref: String,
  ) -> Result<AdPhoto> {
    self
      .run(move |conn| engine::attach_photo(conn, owner, ad_id, file_ref))
      .await
  }

  // ── Transitions ───────────────────────────────────────────────────────────

  async fn publish(&self, owner: Uuid, ad_id: Uuid) -> Result<Ad> {
    self.run(move |conn| engine::publish(conn, owner, ad_id)).await
  }

  async fn stop(&self, owner: Uuid, ad_id: Uuid) -> Result<Ad> {
    self.run(move |conn| engine::stop(conn, owner, ad_id)).await
  }

  async fn restart(
    &self,
    owner: Uuid,
    ad_id: Uuid,
    options: RestartOptions,
  ) -> Result<Ad> {
    self
      .run(move |conn| engine::restart(conn, owner, ad_id, options.conflict_check))
      .await
  }

  async fn fork(&self, owner: Uuid, ad_id: Uuid, patch: AdPatch) -> Result<Forked> {
    self
      .run(move |conn| engine::fork(conn, owner, ad_id, patch))
      .await
  }

  async fn edit(&self, owner: Uuid, ad_id: Uuid, patch: AdPatch) -> Result<Edited> {
    self
      .run(move |conn| engine::edit(conn, owner, ad_id, patch))
      .await
  }

  // ── Reads ─────────────────────────────────────────────────────────────────

  async fn get_ad(&self, requester: Option<Uuid>, ad_id: Uuid) -> Result<Option<Ad>> {
    self
      .run(move |conn| engine::get_ad(conn, requester, ad_id))
      .await
  }

  async fn list_ads(&self, owner: Uuid) -> Result<Vec<Ad>> {
    self.run(move |conn| engine::list_ads(conn, owner)).await
  }

  async fn list_photos(
    &self,
    requester: Option<Uuid>,
    ad_id: Uuid,
  ) -> Result<Vec<AdPhoto>> {
    self
      .run(move |conn| engine::list_photos(conn, requester, ad_id))
      .await
  }

  async fn timeline(&self, requester: Option<Uuid>, ad_id: Uuid) -> Result<Timeline> {
    self
      .run(move |conn| engine::timeline(conn, requester, ad_id))
      .await
  }

  async fn snapshots(&self, owner: Uuid, ad_id: Uuid) -> Result<Vec<AdVersionSnapshot>> {
    self
      .run(move |conn| engine::snapshots(conn, owner, ad_id))
      .await
  }
}
