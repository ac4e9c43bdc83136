//! # Block Sequencer & Content Validator
//!
//! Authoring operations on the ordered block list of a page. Content is
//! decoded into the `BlockContent` variant for the block's type and checked
//! before it is stored, so nothing an anonymous visitor is shown can carry a
//! non-http(s) link.
//!
//! Order values are contiguous (`0..n`) right after `reorder`. `append` and
//! `remove` do not renumber, so readers must sort rather than index.

use chrono::Utc;
use domains::{AppError, Block, BlockContent, BlockKind, BlockStyle, Clock, PageRepo};
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

use crate::access::{owned_block, owned_page};
use crate::bounded::bounded;

/// Any subset of content, style and visibility. Content and style are each
/// replaced whole.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct BlockPatch {
    #[serde(default)]
    pub content: Option<Value>,
    #[serde(default)]
    pub style: Option<Value>,
    #[serde(default)]
    pub visible: Option<bool>,
}

impl BlockPatch {
    fn is_empty(&self) -> bool {
        self.content.is_none() && self.style.is_none() && self.visible.is_none()
    }
}

pub struct BlockService {
    pages: Arc<dyn PageRepo>,
    clock: Arc<dyn Clock>,
    timeout: Duration,
}

impl BlockService {
    pub fn new(pages: Arc<dyn PageRepo>, clock: Arc<dyn Clock>, timeout: Duration) -> Self {
        Self { pages, clock, timeout }
    }

    /// Blocks of an owned page in display order.
    pub async fn list(&self, owner_id: &str, page_id: Uuid) -> domains::Result<Vec<Block>> {
        owned_page(self.pages.as_ref(), owner_id, page_id, self.timeout).await?;
        bounded(self.timeout, self.pages.list_blocks(page_id)).await
    }

    /// Adds an empty, visible block after the page's last block.
    pub async fn append(&self, owner_id: &str, page_id: Uuid, kind: BlockKind) -> domains::Result<Uuid> {
        owned_page(self.pages.as_ref(), owner_id, page_id, self.timeout).await?;
        let block = Block::new(page_id, kind, self.now());
        let block = bounded(self.timeout, self.pages.append_block(block)).await?;
        tracing::info!(%page_id, block_id = %block.id, kind = %kind, order = block.order, "block appended");
        Ok(block.id)
    }

    /// Applies every field of `patch` with a single write. All fields are
    /// checked first; a rejected field leaves the stored block untouched.
    pub async fn patch(&self, owner_id: &str, block_id: Uuid, patch: &BlockPatch) -> domains::Result<Block> {
        if patch.is_empty() {
            return Err(AppError::validation("nothing to update"));
        }
        let mut block = owned_block(self.pages.as_ref(), owner_id, block_id, self.timeout).await?;

        if let Some(content) = &patch.content {
            let parsed = BlockContent::parse(block.kind, content).inspect_err(|err| {
                tracing::warn!(%block_id, error = %err, "rejected block content");
            })?;
            block.content = parsed.to_value();
        }
        if let Some(style) = &patch.style {
            let parsed = BlockStyle::parse(style)?;
            block.style = serde_json::to_value(parsed).map_err(|e| AppError::Storage(e.into()))?;
        }
        if let Some(visible) = patch.visible {
            block.visible = visible;
        }

        block.updated_at = self.now();
        bounded(self.timeout, self.pages.update_block(block.clone())).await?;
        tracing::info!(
            %block_id,
            content = patch.content.is_some(),
            style = patch.style.is_some(),
            visible = ?patch.visible,
            "block updated"
        );
        Ok(block)
    }

    /// Replaces the whole content payload. No partial merges.
    pub async fn update_content(&self, owner_id: &str, block_id: Uuid, content: &Value) -> domains::Result<Block> {
        let patch = BlockPatch { content: Some(content.clone()), ..Default::default() };
        self.patch(owner_id, block_id, &patch).await
    }

    pub async fn update_style(&self, owner_id: &str, block_id: Uuid, style: &Value) -> domains::Result<Block> {
        let patch = BlockPatch { style: Some(style.clone()), ..Default::default() };
        self.patch(owner_id, block_id, &patch).await
    }

    pub async fn set_visible(&self, owner_id: &str, block_id: Uuid, visible: bool) -> domains::Result<Block> {
        self.patch(owner_id, block_id, &BlockPatch { visible: Some(visible), ..Default::default() }).await
    }

    /// Assigns `order = index` to every block of the page.
    ///
    /// `ordered_ids` must name each of the page's blocks exactly once. Any
    /// missing, extra or repeated id rejects the whole request and leaves the
    /// stored order untouched.
    pub async fn reorder(&self, owner_id: &str, page_id: Uuid, ordered_ids: &[Uuid]) -> domains::Result<()> {
        owned_page(self.pages.as_ref(), owner_id, page_id, self.timeout).await?;
        let current = bounded(self.timeout, self.pages.list_blocks(page_id)).await?;

        let supplied: HashSet<Uuid> = ordered_ids.iter().copied().collect();
        if supplied.len() != ordered_ids.len() {
            return Err(AppError::validation("block order lists the same block twice"));
        }
        let existing: HashSet<Uuid> = current.iter().map(|b| b.id).collect();
        if supplied != existing {
            let missing = existing.difference(&supplied).count();
            let unknown = supplied.difference(&existing).count();
            tracing::warn!(%page_id, missing, unknown, "rejected block reorder");
            return Err(AppError::validation(format!(
                "block order must list every block of the page exactly once ({missing} missing, {unknown} unknown)"
            )));
        }

        bounded(self.timeout, self.pages.reorder_blocks(page_id, ordered_ids)).await?;
        tracing::info!(%page_id, blocks = ordered_ids.len(), "blocks reordered");
        Ok(())
    }

    /// Deletes the block. Siblings keep their order values.
    pub async fn remove(&self, owner_id: &str, block_id: Uuid) -> domains::Result<()> {
        let block = owned_block(self.pages.as_ref(), owner_id, block_id, self.timeout).await?;
        bounded(self.timeout, self.pages.delete_block(block.id)).await?;
        tracing::info!(%block_id, page_id = %block.page_id, "block removed");
        Ok(())
    }

    fn now(&self) -> chrono::DateTime<Utc> {
        self.clock.now()
    }
}
