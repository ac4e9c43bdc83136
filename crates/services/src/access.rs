//! Ownership checks shared by every authoring operation.
//!
//! A missing id is `NotFound`; an id that exists under another owner is
//! `Forbidden`. The transport may map both to one status, but the core keeps
//! them apart.

use domains::{AppError, Block, Page, PageRepo};
use std::time::Duration;
use uuid::Uuid;

use crate::bounded::bounded;

pub(crate) async fn owned_page(
    repo: &dyn PageRepo,
    owner_id: &str,
    page_id: Uuid,
    timeout: Duration,
) -> domains::Result<Page> {
    let page = bounded(timeout, repo.get_page(page_id))
        .await?
        .ok_or_else(|| AppError::not_found("Page", page_id))?;
    if page.owner_id != owner_id {
        tracing::warn!(%page_id, "page access denied");
        return Err(AppError::Forbidden("not authorized for this page".into()));
    }
    Ok(page)
}

/// Resolves a block and checks ownership of the page that holds it.
pub(crate) async fn owned_block(
    repo: &dyn PageRepo,
    owner_id: &str,
    block_id: Uuid,
    timeout: Duration,
) -> domains::Result<Block> {
    let block = bounded(timeout, repo.get_block(block_id))
        .await?
        .ok_or_else(|| AppError::not_found("Block", block_id))?;
    match owned_page(repo, owner_id, block.page_id, timeout).await {
        Ok(_) => Ok(block),
        // An orphaned block is indistinguishable from a missing one.
        Err(AppError::NotFound(..)) => Err(AppError::not_found("Block", block_id)),
        Err(err) => Err(err),
    }
}
