//! # Core Traits (Ports)
//!
//! Any storage adapter must implement these traits to be used by the services.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::models::{Block, DailyCount, Event, EventKind, Page};

/// Persistence contract for pages and their blocks.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait PageRepo: Send + Sync {
    // Page Operations
    async fn get_page(&self, id: Uuid) -> anyhow::Result<Option<Page>>;
    /// `handle` must already be lowercase.
    async fn get_page_by_handle(&self, handle: &str) -> anyhow::Result<Option<Page>>;
    async fn list_pages_by_owner(&self, owner_id: &str) -> anyhow::Result<Vec<Page>>;
    /// Inserts the page and its initial blocks in one transaction.
    async fn insert_page(&self, page: Page, blocks: Vec<Block>) -> anyhow::Result<()>;
    async fn update_page(&self, page: Page) -> anyhow::Result<()>;
    /// Cascades to the page's blocks and events.
    async fn delete_page(&self, id: Uuid) -> anyhow::Result<()>;

    // Block Operations
    async fn get_block(&self, id: Uuid) -> anyhow::Result<Option<Block>>;
    /// Blocks of one page, ascending by `order`.
    async fn list_blocks(&self, page_id: Uuid) -> anyhow::Result<Vec<Block>>;
    /// Inserts `block` after the page's current last block and returns it
    /// with the assigned `order`.
    async fn append_block(&self, block: Block) -> anyhow::Result<Block>;
    async fn update_block(&self, block: Block) -> anyhow::Result<()>;
    /// Removes the block and nulls `block_id` on events that referenced it.
    async fn delete_block(&self, id: Uuid) -> anyhow::Result<()>;
    /// Sets `order = index` for every id, all or nothing.
    async fn reorder_blocks(&self, page_id: Uuid, ordered_ids: &[Uuid]) -> anyhow::Result<()>;
}

/// Append-only event log plus the grouped reads the dashboard needs.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait EventStore: Send + Sync {
    async fn append(&self, event: Event) -> anyhow::Result<()>;

    async fn count_by_kind(&self, page_ids: &[Uuid], kind: EventKind) -> anyhow::Result<u64>;

    /// View counts grouped by UTC calendar day, for views at or after `since`.
    /// Days without views are simply absent.
    async fn views_by_day(&self, page_ids: &[Uuid], since: DateTime<Utc>) -> anyhow::Result<Vec<DailyCount>>;

    /// Click counts grouped by block. Clicks with no block reference are skipped.
    async fn clicks_by_block(&self, page_ids: &[Uuid]) -> anyhow::Result<Vec<(Uuid, u64)>>;

    /// Raw events of one page, oldest first.
    async fn list_events(&self, page_id: Uuid) -> anyhow::Result<Vec<Event>>;
}
