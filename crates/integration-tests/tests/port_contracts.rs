//! Behaviour every `PageRepo`/`EventStore` adapter must share, run against
//! the in-memory store. A new adapter only needs another `#[tokio::test]`
//! calling these functions.

use chrono::{DateTime, TimeDelta, TimeZone, Utc};
use domains::{Block, BlockKind, DeviceInfo, Event, EventKind, EventStore, Page, PageKind, PageRepo, Theme};
use std::sync::Arc;
use storage_adapters::MemoryStore;
use tokio_test::{assert_err, assert_ok};
use uuid::Uuid;

fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 10, 12, 0, 0).unwrap()
}

fn page(handle: &str) -> Page {
    Page {
        id: Uuid::now_v7(),
        owner_id: "owner".into(),
        handle: handle.into(),
        kind: PageKind::Bio,
        title: "Page".into(),
        description: None,
        theme: Theme::Neon,
        is_published: false,
        created_at: now(),
        updated_at: now(),
    }
}

fn event(page_id: Uuid, block_id: Option<Uuid>, kind: EventKind, at: DateTime<Utc>) -> Event {
    Event {
        id: Uuid::now_v7(),
        page_id,
        block_id,
        kind,
        referrer: None,
        utm: None,
        device: DeviceInfo::default(),
        user_agent: None,
        created_at: at,
    }
}

async fn pages_round_trip(repo: Arc<dyn PageRepo>) {
    let p = page("contract");
    let mut seeded = Block::new(p.id, BlockKind::Header, now());
    seeded.order = 0;
    assert_ok!(repo.insert_page(p.clone(), vec![seeded.clone()]).await);

    assert_eq!(repo.get_page(p.id).await.unwrap(), Some(p.clone()));
    assert_eq!(repo.get_page_by_handle("contract").await.unwrap(), Some(p.clone()));
    assert_eq!(repo.list_blocks(p.id).await.unwrap(), vec![seeded]);

    assert_err!(repo.insert_page(page("contract"), Vec::new()).await);

    let mut renamed = p.clone();
    renamed.handle = "renamed".into();
    renamed.is_published = true;
    assert_ok!(repo.update_page(renamed.clone()).await);
    assert_eq!(repo.get_page_by_handle("contract").await.unwrap(), None);
    assert_eq!(repo.get_page_by_handle("renamed").await.unwrap(), Some(renamed));
}

async fn blocks_append_and_reorder(repo: Arc<dyn PageRepo>) {
    let p = page("blocks");
    repo.insert_page(p.clone(), Vec::new()).await.unwrap();

    let mut ids = Vec::new();
    for kind in [BlockKind::Link, BlockKind::Cta, BlockKind::Text] {
        let stored = repo.append_block(Block::new(p.id, kind, now())).await.unwrap();
        assert_eq!(stored.order as usize, ids.len());
        ids.push(stored.id);
    }

    ids.rotate_left(1);
    assert_ok!(repo.reorder_blocks(p.id, &ids).await);
    let listed: Vec<Uuid> = repo.list_blocks(p.id).await.unwrap().iter().map(|b| b.id).collect();
    assert_eq!(listed, ids);

    // A stale id list is rejected as a whole.
    let stale = vec![ids[0], ids[1], Uuid::now_v7()];
    assert_err!(repo.reorder_blocks(p.id, &stale).await);
    let after: Vec<Uuid> = repo.list_blocks(p.id).await.unwrap().iter().map(|b| b.id).collect();
    assert_eq!(after, ids);

    let mut hidden = repo.get_block(ids[0]).await.unwrap().unwrap();
    hidden.visible = false;
    assert_ok!(repo.update_block(hidden).await);
    assert!(!repo.get_block(ids[0]).await.unwrap().unwrap().visible);
}

async fn events_group_and_cascade(pages: Arc<dyn PageRepo>, events: Arc<dyn EventStore>) {
    let p = page("events");
    pages.insert_page(p.clone(), Vec::new()).await.unwrap();
    let block = pages.append_block(Block::new(p.id, BlockKind::Link, now())).await.unwrap();

    let yesterday = now() - TimeDelta::days(1);
    for e in [
        event(p.id, None, EventKind::View, yesterday),
        event(p.id, None, EventKind::View, now()),
        event(p.id, None, EventKind::View, now()),
        event(p.id, Some(block.id), EventKind::Click, now()),
    ] {
        assert_ok!(events.append(e).await);
    }
    assert_err!(events.append(event(Uuid::now_v7(), None, EventKind::View, now())).await);
    assert_err!(events.append(event(p.id, Some(Uuid::now_v7()), EventKind::Click, now())).await);

    assert_eq!(events.count_by_kind(&[p.id], EventKind::View).await.unwrap(), 3);
    assert_eq!(events.count_by_kind(&[p.id], EventKind::Click).await.unwrap(), 1);
    assert_eq!(events.clicks_by_block(&[p.id]).await.unwrap(), vec![(block.id, 1)]);

    let by_day = events.views_by_day(&[p.id], now() - TimeDelta::hours(1)).await.unwrap();
    assert_eq!(by_day.len(), 1);
    assert_eq!(by_day[0].count, 2);

    let log = events.list_events(p.id).await.unwrap();
    assert_eq!(log.first().map(|e| e.created_at), Some(yesterday));

    assert_ok!(pages.delete_page(p.id).await);
    assert_eq!(pages.get_page(p.id).await.unwrap(), None);
    assert_eq!(pages.get_block(block.id).await.unwrap(), None);
    assert_eq!(events.count_by_kind(&[p.id], EventKind::View).await.unwrap(), 0);
}

#[tokio::test]
async fn memory_store_honours_page_contract() {
    pages_round_trip(Arc::new(MemoryStore::new())).await;
}

#[tokio::test]
async fn memory_store_honours_block_contract() {
    blocks_append_and_reorder(Arc::new(MemoryStore::new())).await;
}

#[tokio::test]
async fn memory_store_honours_event_contract() {
    let store = Arc::new(MemoryStore::new());
    events_group_and_cascade(store.clone(), store).await;
}
