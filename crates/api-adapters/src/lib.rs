//! rusty-bio/crates/api-adapters/src/lib.rs
//!
//! Inbound adapters. The HTTP surface is compiled with `web-axum`.

pub mod metrics;
#[cfg(feature = "web-axum")]
pub mod web;

pub use metrics::Metrics;
#[cfg(feature = "web-axum")]
pub use web::{router, AppState};
