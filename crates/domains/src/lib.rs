//! rusty-bio/crates/domains/src/lib.rs
//!
//! The central domain types and interface definitions for Rusty-Bio.

pub mod clock;
pub mod content;
pub mod context;
pub mod error;
pub mod models;
pub mod traits;

// Re-exporting for easier access in other crates
pub use clock::*;
pub use content::*;
pub use context::*;
pub use error::*;
pub use models::*;
pub use traits::*;
