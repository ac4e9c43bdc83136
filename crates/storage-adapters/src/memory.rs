//! # In-Memory Store
//!
//! Process-local implementation of both ports, used by the default binary
//! and by tests. One `RwLock` guards all tables so multi-row operations
//! (insert with blocks, reorder, cascading deletes) are atomic.
//!
//! Referential rules mirror the Postgres schema: events must point at an
//! existing page (and block, when set), deleting a block nulls `block_id` on
//! its events, deleting a page removes its blocks and events.

use anyhow::bail;
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use domains::{Block, DailyCount, Event, EventKind, EventStore, Page, PageRepo, StoreRejection};
use std::collections::{BTreeMap, HashMap, HashSet};
use tokio::sync::RwLock;
use uuid::Uuid;

#[derive(Default)]
struct Tables {
    pages: HashMap<Uuid, Page>,
    handles: HashMap<String, Uuid>,
    blocks: HashMap<Uuid, Block>,
    events: Vec<Event>,
}

impl Tables {
    fn blocks_of(&self, page_id: Uuid) -> Vec<Block> {
        let mut blocks: Vec<Block> = self.blocks.values().filter(|b| b.page_id == page_id).cloned().collect();
        blocks.sort_by_key(|b| (b.order, b.id));
        blocks
    }

    fn events_of<'a>(&'a self, page_ids: &'a [Uuid]) -> impl Iterator<Item = &'a Event> + 'a {
        let wanted: HashSet<&Uuid> = page_ids.iter().collect();
        self.events.iter().filter(move |e| wanted.contains(&e.page_id))
    }
}

#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PageRepo for MemoryStore {
    async fn get_page(&self, id: Uuid) -> anyhow::Result<Option<Page>> {
        Ok(self.tables.read().await.pages.get(&id).cloned())
    }

    async fn get_page_by_handle(&self, handle: &str) -> anyhow::Result<Option<Page>> {
        let tables = self.tables.read().await;
        Ok(tables.handles.get(handle).and_then(|id| tables.pages.get(id)).cloned())
    }

    async fn list_pages_by_owner(&self, owner_id: &str) -> anyhow::Result<Vec<Page>> {
        let tables = self.tables.read().await;
        let mut pages: Vec<Page> = tables.pages.values().filter(|p| p.owner_id == owner_id).cloned().collect();
        pages.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| b.id.cmp(&a.id)));
        Ok(pages)
    }

    async fn insert_page(&self, page: Page, blocks: Vec<Block>) -> anyhow::Result<()> {
        let mut tables = self.tables.write().await;
        if tables.handles.contains_key(&page.handle) {
            bail!("duplicate page handle '{}'", page.handle);
        }
        if tables.pages.contains_key(&page.id) {
            bail!("duplicate page id {}", page.id);
        }
        if let Some(stray) = blocks.iter().find(|b| b.page_id != page.id) {
            bail!("block {} does not belong to page {}", stray.id, page.id);
        }
        tables.handles.insert(page.handle.clone(), page.id);
        for block in blocks {
            tables.blocks.insert(block.id, block);
        }
        tables.pages.insert(page.id, page);
        Ok(())
    }

    async fn update_page(&self, page: Page) -> anyhow::Result<()> {
        let mut tables = self.tables.write().await;
        let old_handle = tables
            .pages
            .get(&page.id)
            .map(|p| p.handle.clone())
            .ok_or(StoreRejection::MissingReference { kind: "Page", id: page.id })?;
        if old_handle != page.handle {
            if tables.handles.contains_key(&page.handle) {
                bail!("duplicate page handle '{}'", page.handle);
            }
            tables.handles.remove(&old_handle);
            tables.handles.insert(page.handle.clone(), page.id);
        }
        tables.pages.insert(page.id, page);
        Ok(())
    }

    async fn delete_page(&self, id: Uuid) -> anyhow::Result<()> {
        let mut tables = self.tables.write().await;
        if let Some(page) = tables.pages.remove(&id) {
            tables.handles.remove(&page.handle);
            tables.blocks.retain(|_, b| b.page_id != id);
            tables.events.retain(|e| e.page_id != id);
        }
        Ok(())
    }

    async fn get_block(&self, id: Uuid) -> anyhow::Result<Option<Block>> {
        Ok(self.tables.read().await.blocks.get(&id).cloned())
    }

    async fn list_blocks(&self, page_id: Uuid) -> anyhow::Result<Vec<Block>> {
        Ok(self.tables.read().await.blocks_of(page_id))
    }

    async fn append_block(&self, mut block: Block) -> anyhow::Result<Block> {
        let mut tables = self.tables.write().await;
        if !tables.pages.contains_key(&block.page_id) {
            return Err(StoreRejection::MissingReference { kind: "Page", id: block.page_id }.into());
        }
        block.order = tables
            .blocks
            .values()
            .filter(|b| b.page_id == block.page_id)
            .map(|b| b.order + 1)
            .max()
            .unwrap_or(0);
        tables.blocks.insert(block.id, block.clone());
        Ok(block)
    }

    async fn update_block(&self, block: Block) -> anyhow::Result<()> {
        let mut tables = self.tables.write().await;
        match tables.blocks.get_mut(&block.id) {
            Some(slot) if slot.page_id == block.page_id => {
                *slot = block;
                Ok(())
            }
            Some(_) => bail!("block {} cannot move between pages", block.id),
            None => Err(StoreRejection::MissingReference { kind: "Block", id: block.id }.into()),
        }
    }

    async fn delete_block(&self, id: Uuid) -> anyhow::Result<()> {
        let mut tables = self.tables.write().await;
        if tables.blocks.remove(&id).is_some() {
            for event in tables.events.iter_mut().filter(|e| e.block_id == Some(id)) {
                event.block_id = None;
            }
        }
        Ok(())
    }

    async fn reorder_blocks(&self, page_id: Uuid, ordered_ids: &[Uuid]) -> anyhow::Result<()> {
        let mut tables = self.tables.write().await;
        // Re-checked under the write lock: the page may have changed since
        // the caller validated the list.
        let existing: HashSet<Uuid> = tables.blocks_of(page_id).iter().map(|b| b.id).collect();
        let supplied: HashSet<Uuid> = ordered_ids.iter().copied().collect();
        if supplied.len() != ordered_ids.len() || supplied != existing {
            return Err(StoreRejection::StaleBlockSet { page_id }.into());
        }
        for (index, id) in ordered_ids.iter().enumerate() {
            if let Some(block) = tables.blocks.get_mut(id) {
                block.order = index as u32;
            }
        }
        Ok(())
    }
}

#[async_trait]
impl EventStore for MemoryStore {
    async fn append(&self, event: Event) -> anyhow::Result<()> {
        let mut tables = self.tables.write().await;
        if !tables.pages.contains_key(&event.page_id) {
            return Err(StoreRejection::MissingReference { kind: "Page", id: event.page_id }.into());
        }
        if let Some(block_id) = event.block_id {
            match tables.blocks.get(&block_id) {
                Some(block) if block.page_id == event.page_id => {}
                _ => return Err(StoreRejection::MissingReference { kind: "Block", id: block_id }.into()),
            }
        }
        tables.events.push(event);
        Ok(())
    }

    async fn count_by_kind(&self, page_ids: &[Uuid], kind: EventKind) -> anyhow::Result<u64> {
        let tables = self.tables.read().await;
        Ok(tables.events_of(page_ids).filter(|e| e.kind == kind).count() as u64)
    }

    async fn views_by_day(&self, page_ids: &[Uuid], since: DateTime<Utc>) -> anyhow::Result<Vec<DailyCount>> {
        let tables = self.tables.read().await;
        let mut by_day: BTreeMap<NaiveDate, u64> = BTreeMap::new();
        for event in tables.events_of(page_ids).filter(|e| e.kind == EventKind::View && e.created_at >= since) {
            *by_day.entry(event.created_at.date_naive()).or_insert(0) += 1;
        }
        Ok(by_day.into_iter().map(|(date, count)| DailyCount { date, count }).collect())
    }

    async fn clicks_by_block(&self, page_ids: &[Uuid]) -> anyhow::Result<Vec<(Uuid, u64)>> {
        let tables = self.tables.read().await;
        let mut by_block: HashMap<Uuid, u64> = HashMap::new();
        for event in tables.events_of(page_ids).filter(|e| e.kind == EventKind::Click) {
            if let Some(block_id) = event.block_id {
                *by_block.entry(block_id).or_insert(0) += 1;
            }
        }
        Ok(by_block.into_iter().collect())
    }

    async fn list_events(&self, page_id: Uuid) -> anyhow::Result<Vec<Event>> {
        let tables = self.tables.read().await;
        let mut events: Vec<Event> = tables.events.iter().filter(|e| e.page_id == page_id).cloned().collect();
        events.sort_by_key(|e| (e.created_at, e.id));
        Ok(events)
    }
}
