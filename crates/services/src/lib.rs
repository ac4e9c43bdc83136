//! rusty-bio/crates/services/src/lib.rs
//!
//! Application services for Rusty-Bio: page authoring, block sequencing,
//! analytics ingestion and aggregation. Everything here talks to storage
//! through the `domains` ports only.

mod access;
mod bounded;

pub mod analytics;
pub mod blocks;
pub mod device;
pub mod ingestion;
pub mod pages;
pub mod rate_limit;
pub mod templates;
pub mod utm;

pub use analytics::AnalyticsService;
pub use blocks::{BlockPatch, BlockService};
pub use ingestion::{IngestionQuotas, IngestionService};
pub use pages::{NewPage, PagePatch, PageService, PublicPage};
pub use rate_limit::{Quota, RateLimitDecision, RateLimiter};
