//! # Aggregation Engine
//!
//! Read-only statistics over the event log for a set of pages the caller
//! owns. No query here fails for lack of data: missing events produce zeros
//! and missing days are synthesized.
//!
//! Day boundaries are UTC.

use chrono::{NaiveTime, TimeDelta};
use domains::{
    AppError, Block, BlockClicks, BlockContent, Clock, DailyCount, DashboardStats, EventKind, EventStore,
    EventTotals, PageRepo,
};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

use crate::bounded::bounded;

pub const DEFAULT_SERIES_DAYS: u32 = 7;
pub const DEFAULT_TOP_BLOCKS: usize = 10;

pub struct AnalyticsService {
    events: Arc<dyn EventStore>,
    pages: Arc<dyn PageRepo>,
    clock: Arc<dyn Clock>,
    timeout: Duration,
}

impl AnalyticsService {
    pub fn new(
        events: Arc<dyn EventStore>,
        pages: Arc<dyn PageRepo>,
        clock: Arc<dyn Clock>,
        timeout: Duration,
    ) -> Self {
        Self { events, pages, clock, timeout }
    }

    pub async fn total_counts(&self, page_ids: &[Uuid]) -> domains::Result<EventTotals> {
        if page_ids.is_empty() {
            return Ok(EventTotals::default());
        }
        let views = bounded(self.timeout, self.events.count_by_kind(page_ids, EventKind::View)).await?;
        let clicks = bounded(self.timeout, self.events.count_by_kind(page_ids, EventKind::Click)).await?;
        Ok(EventTotals { views, clicks })
    }

    /// Clicks per view as a percentage with one decimal. Zero views gives 0.
    pub async fn click_through_rate(&self, page_ids: &[Uuid]) -> domains::Result<f64> {
        Ok(click_through_rate(self.total_counts(page_ids).await?))
    }

    /// One entry per UTC day for the trailing `days` days, oldest first,
    /// ending today. Days without views are present with a count of 0. A
    /// window reaching past the calendar's range is a validation error.
    pub async fn daily_view_series(&self, page_ids: &[Uuid], days: u32) -> domains::Result<Vec<DailyCount>> {
        if days == 0 {
            return Ok(Vec::new());
        }
        let today = self.clock.now().date_naive();
        let first_day = TimeDelta::try_days(i64::from(days) - 1)
            .and_then(|back| today.checked_sub_signed(back))
            .ok_or_else(|| AppError::validation(format!("a {days}-day series reaches before the earliest date")))?;

        let grouped = if page_ids.is_empty() {
            Vec::new()
        } else {
            let since = first_day.and_time(NaiveTime::MIN).and_utc();
            bounded(self.timeout, self.events.views_by_day(page_ids, since)).await?
        };

        let mut by_day = HashMap::with_capacity(grouped.len());
        for row in grouped {
            *by_day.entry(row.date).or_insert(0) += row.count;
        }

        Ok(first_day
            .iter_days()
            .take(days as usize)
            .map(|date| DailyCount { date, count: by_day.get(&date).copied().unwrap_or(0) })
            .collect())
    }

    /// Blocks ranked by click count, most clicked first, zero-click blocks
    /// left out. Ties are broken by block id so the ranking is stable.
    pub async fn top_blocks_by_clicks(&self, page_ids: &[Uuid], limit: usize) -> domains::Result<Vec<BlockClicks>> {
        if page_ids.is_empty() || limit == 0 {
            return Ok(Vec::new());
        }
        let grouped = bounded(self.timeout, self.events.clicks_by_block(page_ids)).await?;
        if grouped.is_empty() {
            return Ok(Vec::new());
        }

        let mut blocks: HashMap<Uuid, Block> = HashMap::new();
        for page_id in page_ids {
            for block in bounded(self.timeout, self.pages.list_blocks(*page_id)).await? {
                blocks.insert(block.id, block);
            }
        }

        let mut ranking: Vec<BlockClicks> = grouped
            .into_iter()
            .filter(|(_, clicks)| *clicks > 0)
            .filter_map(|(block_id, clicks)| {
                let block = blocks.get(&block_id)?;
                Some(BlockClicks { block_id, kind: block.kind, label: block_label(block), clicks })
            })
            .collect();

        ranking.sort_by(|a, b| b.clicks.cmp(&a.clicks).then_with(|| a.block_id.cmp(&b.block_id)));
        ranking.truncate(limit);
        Ok(ranking)
    }

    /// Dashboard summary across every page `owner_id` owns.
    pub async fn dashboard(&self, owner_id: &str) -> domains::Result<DashboardStats> {
        let pages = bounded(self.timeout, self.pages.list_pages_by_owner(owner_id)).await?;
        let page_ids: Vec<Uuid> = pages.iter().map(|p| p.id).collect();

        let totals = self.total_counts(&page_ids).await?;
        Ok(DashboardStats {
            total_views: totals.views,
            total_clicks: totals.clicks,
            ctr: click_through_rate(totals),
            views_by_day: self.daily_view_series(&page_ids, DEFAULT_SERIES_DAYS).await?,
            blocks_by_clicks: self.top_blocks_by_clicks(&page_ids, DEFAULT_TOP_BLOCKS).await?,
        })
    }
}

pub fn click_through_rate(totals: EventTotals) -> f64 {
    if totals.views == 0 {
        return 0.0;
    }
    let pct = totals.clicks as f64 / totals.views as f64 * 100.0;
    (pct * 10.0).round() / 10.0
}

/// Label projection:
///
/// | type        | label                  |
/// |-------------|------------------------|
/// | link, cta   | `content.title`        |
/// | header      | `content.title`        |
/// | social      | `"Social Icons"`       |
/// | embed, text | type name              |
///
/// A payload that no longer decodes, or an empty projected field, falls back
/// to the type name.
fn block_label(block: &Block) -> String {
    match BlockContent::decode(block.kind, &block.content) {
        Ok(content) => content.label().unwrap_or(block.kind.as_str()).to_string(),
        Err(err) => {
            tracing::debug!(block_id = %block.id, error = %err, "unreadable block content, labelling by type");
            block.kind.as_str().to_string()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, TimeZone, Utc};
    use domains::{BlockKind, ManualClock, MockEventStore, MockPageRepo, Page, PageKind, Theme};
    use serde_json::json;

    fn clock() -> Arc<ManualClock> {
        Arc::new(ManualClock::new(Utc.with_ymd_and_hms(2024, 3, 10, 15, 30, 0).unwrap()))
    }

    fn service(events: MockEventStore, pages: MockPageRepo) -> AnalyticsService {
        AnalyticsService::new(Arc::new(events), Arc::new(pages), clock(), Duration::from_secs(1))
    }

    fn block(page_id: Uuid, kind: BlockKind, content: serde_json::Value) -> Block {
        let mut block = Block::new(page_id, kind, Utc::now());
        block.content = content;
        block
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn ctr_rounds_to_one_decimal() {
        assert_eq!(click_through_rate(EventTotals { views: 3, clicks: 1 }), 33.3);
        assert_eq!(click_through_rate(EventTotals { views: 8, clicks: 1 }), 12.5);
        assert_eq!(click_through_rate(EventTotals { views: 0, clicks: 5 }), 0.0);
    }

    #[tokio::test]
    async fn no_pages_means_zeroes_without_touching_storage() {
        let svc = service(MockEventStore::new(), MockPageRepo::new());
        assert_eq!(svc.total_counts(&[]).await.unwrap(), EventTotals::default());
        assert_eq!(svc.click_through_rate(&[]).await.unwrap(), 0.0);
        assert!(svc.top_blocks_by_clicks(&[], 10).await.unwrap().is_empty());

        let series = svc.daily_view_series(&[], 7).await.unwrap();
        assert_eq!(series.len(), 7);
        assert!(series.iter().all(|d| d.count == 0));
    }

    #[tokio::test]
    async fn series_fills_gaps_and_ends_today() {
        let mut events = MockEventStore::new();
        events
            .expect_views_by_day()
            .withf(|_, since| *since == Utc.with_ymd_and_hms(2024, 3, 4, 0, 0, 0).unwrap())
            .returning(|_, _| {
                Ok(vec![
                    DailyCount { date: NaiveDate::from_ymd_opt(2024, 3, 5).unwrap(), count: 4 },
                    DailyCount { date: NaiveDate::from_ymd_opt(2024, 3, 10).unwrap(), count: 2 },
                ])
            });
        let svc = service(events, MockPageRepo::new());

        let series = svc.daily_view_series(&[Uuid::now_v7()], 7).await.unwrap();
        let dates: Vec<_> = series.iter().map(|d| d.date).collect();
        assert_eq!(dates.first(), Some(&date(2024, 3, 4)));
        assert_eq!(dates.last(), Some(&date(2024, 3, 10)));
        assert!(dates.windows(2).all(|w| w[1] == w[0].succ_opt().unwrap()));
        let counts: Vec<_> = series.iter().map(|d| d.count).collect();
        assert_eq!(counts, vec![0, 4, 0, 0, 0, 0, 2]);
    }

    #[tokio::test]
    async fn oversized_window_is_rejected_before_storage() {
        let svc = service(MockEventStore::new(), MockPageRepo::new());
        let err = svc.daily_view_series(&[Uuid::now_v7()], u32::MAX).await.unwrap_err();
        assert!(matches!(err, AppError::ValidationError(_)));

        let year = svc.daily_view_series(&[], 366).await.unwrap();
        assert_eq!(year.first().map(|d| d.date), Some(date(2023, 3, 11)));
    }

    #[tokio::test]
    async fn top_blocks_rank_label_and_truncate() {
        let page_id = Uuid::now_v7();
        let link = block(page_id, BlockKind::Link, json!({ "title": "Shop", "url": "https://shop.test" }));
        let social = block(page_id, BlockKind::Social, json!({ "platforms": [] }));
        let broken = block(page_id, BlockKind::Cta, json!({ "title": 42 }));
        let text = block(page_id, BlockKind::Text, json!({ "title": "About" }));

        let grouped = vec![(link.id, 3), (social.id, 9), (broken.id, 5), (text.id, 1), (Uuid::now_v7(), 7)];
        let mut events = MockEventStore::new();
        events.expect_clicks_by_block().returning(move |_| Ok(grouped.clone()));

        let listed = vec![link.clone(), social.clone(), broken.clone(), text.clone()];
        let mut pages = MockPageRepo::new();
        pages.expect_list_blocks().returning(move |_| Ok(listed.clone()));

        let svc = service(events, pages);
        let top = svc.top_blocks_by_clicks(&[page_id], 3).await.unwrap();

        let rows: Vec<(&str, u64)> = top.iter().map(|b| (b.label.as_str(), b.clicks)).collect();
        // Unknown block ids (deleted since) drop out; broken content falls back to the type.
        assert_eq!(rows, vec![("Social Icons", 9), ("cta", 5), ("Shop", 3)]);
    }

    #[tokio::test]
    async fn dashboard_scopes_to_owner_pages() {
        let now = Utc::now();
        let page = Page {
            id: Uuid::now_v7(),
            owner_id: "owner".into(),
            handle: "alice".into(),
            kind: PageKind::Bio,
            title: "Alice".into(),
            description: None,
            theme: Theme::Luxury,
            is_published: true,
            created_at: now,
            updated_at: now,
        };
        let page_id = page.id;

        let mut pages = MockPageRepo::new();
        pages.expect_list_pages_by_owner().returning(move |owner| {
            assert_eq!(owner, "owner");
            Ok(vec![page.clone()])
        });

        let mut events = MockEventStore::new();
        events
            .expect_count_by_kind()
            .withf(move |ids, _| ids.len() == 1 && ids[0] == page_id)
            .returning(|_, kind| Ok(if kind == EventKind::View { 40 } else { 3 }));
        events.expect_views_by_day().returning(|_, _| Ok(Vec::new()));
        events.expect_clicks_by_block().returning(|_| Ok(Vec::new()));

        let stats = service(events, pages).dashboard("owner").await.unwrap();
        assert_eq!((stats.total_views, stats.total_clicks), (40, 3));
        assert_eq!(stats.ctr, 7.5);
        assert_eq!(stats.views_by_day.len(), 7);
        assert!(stats.blocks_by_clicks.is_empty());
    }
}
