use chrono::TimeDelta;
use domains::{AppError, BlockKind, Browser, Clock, DeviceType, EventKind, EventStore, OperatingSystem};
use integration_tests::{visitor, Harness, OWNER};
use services::{IngestionQuotas, Quota};
use std::sync::Arc;
use std::time::Duration;
use tokio_test::assert_ok;

#[tokio::test]
async fn limiter_window_sequence() {
    let h = Harness::new();
    let window = Duration::from_secs(1);

    let remaining: Vec<(bool, u32)> = (0..4)
        .map(|_| {
            let d = h.limiter.check("k", 3, window);
            (d.allowed, d.remaining)
        })
        .collect();
    assert_eq!(remaining, vec![(true, 2), (true, 1), (true, 0), (false, 0)]);

    h.clock.advance(TimeDelta::milliseconds(1100));
    let d = h.limiter.check("k", 3, window);
    assert!(d.allowed);
    assert_eq!(d.remaining, 2);
}

#[tokio::test]
async fn views_are_enriched_from_the_request() {
    let h = Harness::new();
    let page = h.published_page("alice", None).await;
    let ctx = visitor("203.0.113.5", "https://bio.test/alice?utm_source=newsletter&utm_campaign=spring&ref=x")
        .with_header("Referer", "https://mail.example.com/");

    h.pages.load_public("alice", None, &ctx).await.unwrap();

    let events = h.store.list_events(page.id).await.unwrap();
    assert_eq!(events.len(), 1);
    let view = &events[0];
    assert_eq!(view.kind, EventKind::View);
    assert_eq!(view.referrer.as_deref(), Some("https://mail.example.com/"));
    let utm = view.utm.as_ref().unwrap();
    assert_eq!(utm.len(), 2);
    assert_eq!(utm.get("utm_campaign").map(String::as_str), Some("spring"));
    assert_eq!(view.device.device_type, DeviceType::Desktop);
    assert_eq!(view.device.os, OperatingSystem::Windows);
    assert_eq!(view.device.browser, Browser::Chrome);
    assert_eq!(view.created_at, h.clock.now());
}

#[tokio::test]
async fn rate_limited_views_still_render() {
    let quota = Quota { max_requests: 1, window: Duration::from_secs(60) };
    let h = Harness::with_quotas(IngestionQuotas { views: quota, clicks: quota });
    let page = h.published_page("alice", None).await;
    let ctx = visitor("203.0.113.5", "https://bio.test/alice");

    for _ in 0..3 {
        assert_ok!(h.pages.load_public("alice", None, &ctx).await);
    }
    assert_eq!(h.store.list_events(page.id).await.unwrap().len(), 1);
}

#[tokio::test]
async fn drafts_record_no_views() {
    let h = Harness::new();
    let page = h.published_page("alice", None).await;
    h.pages.set_published(OWNER, page.id, false).await.unwrap();

    let ctx = visitor("203.0.113.5", "https://bio.test/alice");
    assert!(matches!(h.pages.load_public("alice", None, &ctx).await, Err(AppError::NotFound(..))));
    assert!(h.pages.load_public("alice", Some(OWNER), &ctx).await.is_ok());
    assert!(h.store.list_events(page.id).await.unwrap().is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_clicks_at_quota_one_store_exactly_one_event() {
    let quota = Quota { max_requests: 1, window: Duration::from_secs(60) };
    let h = Arc::new(Harness::with_quotas(IngestionQuotas { views: quota, clicks: quota }));
    let page = h.published_page("alice", None).await;
    let block = h.blocks.append(OWNER, page.id, BlockKind::Link).await.unwrap();

    let tasks: Vec<_> = (0..8)
        .map(|_| {
            let h = h.clone();
            tokio::spawn(async move {
                h.ingestion.record_click(page.id, block, &visitor("203.0.113.9", "https://bio.test/alice")).await
            })
        })
        .collect();

    let mut allowed = 0;
    let mut limited = 0;
    for task in tasks {
        match task.await.unwrap() {
            Ok(()) => allowed += 1,
            Err(AppError::RateLimited { .. }) => limited += 1,
            Err(other) => panic!("unexpected error: {other}"),
        }
    }
    assert_eq!((allowed, limited), (1, 7));
    assert_eq!(h.store.count_by_kind(&[page.id], EventKind::Click).await.unwrap(), 1);
}

#[tokio::test]
async fn different_visitors_have_separate_budgets() {
    let quota = Quota { max_requests: 1, window: Duration::from_secs(60) };
    let h = Harness::with_quotas(IngestionQuotas { views: quota, clicks: quota });
    let page = h.published_page("alice", None).await;
    let block = h.blocks.append(OWNER, page.id, BlockKind::Cta).await.unwrap();

    for ip in ["203.0.113.1", "203.0.113.2"] {
        assert_ok!(h.ingestion.record_click(page.id, block, &visitor(ip, "https://bio.test/alice")).await);
    }
    let again = h.ingestion.record_click(page.id, block, &visitor("203.0.113.1", "https://bio.test/alice")).await;
    match again {
        Err(AppError::RateLimited { reset_at }) => assert_eq!(reset_at, h.clock.now() + TimeDelta::seconds(60)),
        other => panic!("expected RateLimited, got {other:?}"),
    }
}

#[tokio::test]
async fn clicks_on_unknown_blocks_are_not_stored() {
    let h = Harness::new();
    let page = h.published_page("alice", None).await;
    let err = h
        .ingestion
        .record_click(page.id, uuid::Uuid::now_v7(), &visitor("203.0.113.1", "https://bio.test/alice"))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound(ref kind, _) if kind == "Block"));
    assert!(h.store.list_events(page.id).await.unwrap().is_empty());

    let stray_page = uuid::Uuid::now_v7();
    let err = h
        .ingestion
        .record_click(stray_page, uuid::Uuid::now_v7(), &visitor("203.0.113.2", "https://bio.test/alice"))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound(ref kind, _) if kind == "Page"));
}
