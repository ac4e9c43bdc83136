//! Shared fixtures: the full service graph wired onto the in-memory store
//! with a manual clock.

use chrono::{DateTime, TimeZone, Utc};
use domains::{ManualClock, Page, RequestContext};
use services::{
    AnalyticsService, BlockService, IngestionQuotas, IngestionService, NewPage, PageService, RateLimiter,
};
use std::sync::Arc;
use std::time::Duration;
use storage_adapters::MemoryStore;

pub const OWNER: &str = "owner_1";
pub const TIMEOUT: Duration = Duration::from_secs(2);

pub struct Harness {
    pub store: Arc<MemoryStore>,
    pub clock: Arc<ManualClock>,
    pub limiter: Arc<RateLimiter>,
    pub pages: Arc<PageService>,
    pub blocks: Arc<BlockService>,
    pub ingestion: Arc<IngestionService>,
    pub analytics: Arc<AnalyticsService>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_quotas(IngestionQuotas::default())
    }

    pub fn with_quotas(quotas: IngestionQuotas) -> Self {
        Self::at(Utc.with_ymd_and_hms(2024, 3, 10, 12, 0, 0).unwrap(), quotas)
    }

    pub fn at(start: DateTime<Utc>, quotas: IngestionQuotas) -> Self {
        let store = Arc::new(MemoryStore::new());
        let clock = Arc::new(ManualClock::new(start));
        let limiter = Arc::new(RateLimiter::new(clock.clone()));
        let ingestion = Arc::new(IngestionService::new(store.clone(), limiter.clone(), clock.clone(), quotas));
        let pages = Arc::new(PageService::new(store.clone(), ingestion.clone(), clock.clone(), TIMEOUT));
        let blocks = Arc::new(BlockService::new(store.clone(), clock.clone(), TIMEOUT));
        let analytics = Arc::new(AnalyticsService::new(store.clone(), store.clone(), clock.clone(), TIMEOUT));
        Self { store, clock, limiter, pages, blocks, ingestion, analytics }
    }

    /// A published page for `OWNER`, optionally seeded from a template.
    pub async fn published_page(&self, handle: &str, template: Option<&str>) -> Page {
        let input = NewPage {
            handle: handle.into(),
            title: "Test Page".into(),
            template_id: template.map(str::to_owned),
            ..Default::default()
        };
        let page = self.pages.create_page(OWNER, input).await.unwrap();
        self.pages.set_published(OWNER, page.id, true).await.unwrap()
    }
}

impl Default for Harness {
    fn default() -> Self {
        Self::new()
    }
}

/// Visitor request from `ip` to `url`.
pub fn visitor(ip: &str, url: &str) -> RequestContext {
    RequestContext::new(url)
        .with_header("X-Forwarded-For", ip)
        .with_header("User-Agent", "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 Chrome/120.0 Safari/537.36")
        .with_timeout(TIMEOUT)
}

#[cfg(feature = "web-axum")]
pub fn app_state(h: &Harness) -> api_adapters::AppState {
    api_adapters::AppState {
        pages: h.pages.clone(),
        blocks: h.blocks.clone(),
        analytics: h.analytics.clone(),
        ingestion: h.ingestion.clone(),
        metrics: Arc::new(api_adapters::Metrics::new()),
        storage_timeout: TIMEOUT,
    }
}
