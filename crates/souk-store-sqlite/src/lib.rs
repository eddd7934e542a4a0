//! SQLite backend for the Souk ad lifecycle engine.
//!
//! Wraps [`tokio_rusqlite`] so all database access runs on a dedicated
//! thread without blocking the async runtime. Each lifecycle operation is a
//! single closure on that thread holding one `BEGIN IMMEDIATE` transaction.

mod encode;
mod engine;
mod guard;
mod query;
mod schema;
mod store;

pub mod error;

pub use error::{Error, Result};
pub use store::SqliteStore;
