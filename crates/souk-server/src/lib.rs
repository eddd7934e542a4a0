//! HTTP server assembly for Souk.
//!
//! Mounts the JSON API under `/api` and wraps it in request tracing. The
//! binary in `main.rs` supplies configuration and the store.

use std::{path::PathBuf, sync::Arc};

use axum::Router;
use serde::Deserialize;
use souk_core::store::AdStore;
use tower_http::trace::TraceLayer;

// ─── Configuration ────────────────────────────────────────────────────────────

/// Runtime server configuration, deserialised from `config.toml` and
/// `SOUK_*` environment variables.
#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
  pub host:           String,
  pub port:           u16,
  pub store_path:     PathBuf,
  /// Location names ensured at startup.
  #[serde(default)]
  pub seed_locations: Vec<String>,
}

// ─── Router ───────────────────────────────────────────────────────────────────

/// Build the top-level axum [`Router`] for `store`.
pub fn router<S>(store: Arc<S>) -> Router
where
  S: AdStore + 'static,
{
  Router::new()
    .nest("/api", souk_api::api_router(store))
    .layer(TraceLayer::new_for_http())
}

/// Ensure every configured location exists. Safe to run on every start.
pub async fn seed_locations<S: AdStore>(
  store: &S,
  names: &[String],
) -> Result<(), S::Error> {
  for name in names {
    let location = store.ensure_location(name.clone()).await?;
    tracing::debug!(location_id = %location.location_id, name = %location.name, "location ready");
  }
  Ok(())
}
