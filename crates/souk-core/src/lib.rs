//! Core types and trait definitions for the Souk classifieds engine.
//!
//! This crate is deliberately free of HTTP and database dependencies. It
//! holds the ad model, the lifecycle rules every backend must enforce, the
//! version timeline builder, and the [`store::AdStore`] trait.

// We intentionally use native `async fn` in traits (stabilised in Rust 1.75).
// Suppress the advisory lint about `Send` bounds on the returned futures.
#![allow(async_fn_in_trait)]

pub mod ad;
pub mod error;
pub mod lifecycle;
pub mod location;
pub mod store;
pub mod timeline;

pub use error::{Classify, Error, ErrorKind, Result};
