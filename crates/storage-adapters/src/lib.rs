//! rusty-bio/crates/storage-adapters/src/lib.rs
//!
//! Implementations of the `domains` storage ports.

pub mod memory;
#[cfg(feature = "db-postgres")]
pub mod postgres;

pub use memory::MemoryStore;
#[cfg(feature = "db-postgres")]
pub use postgres::PgStore;
