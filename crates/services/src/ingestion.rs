//! # Event Ingestion Pipeline
//!
//! Turns anonymous page views and block clicks into immutable `Event` rows.
//!
//! Every call runs the same steps in order: rate-limit the caller, read
//! referrer and user agent, extract UTM tags, classify the device, append.
//! A denied caller stops at step one, so nothing is written for it.

use domains::{AppError, Clock, Event, EventKind, EventStore, RequestContext};
use std::sync::Arc;
use uuid::Uuid;

use crate::bounded::bounded;
use crate::rate_limit::{Quota, RateLimiter};
use crate::{device, utm};

/// Quota classes applied by the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IngestionQuotas {
    pub views: Quota,
    pub clicks: Quota,
}

impl Default for IngestionQuotas {
    fn default() -> Self {
        Self { views: Quota::VIEWS, clicks: Quota::CLICKS }
    }
}

pub struct IngestionService {
    events: Arc<dyn EventStore>,
    limiter: Arc<RateLimiter>,
    clock: Arc<dyn Clock>,
    quotas: IngestionQuotas,
}

impl IngestionService {
    pub fn new(
        events: Arc<dyn EventStore>,
        limiter: Arc<RateLimiter>,
        clock: Arc<dyn Clock>,
        quotas: IngestionQuotas,
    ) -> Self {
        Self { events, limiter, clock, quotas }
    }

    /// Records one page view.
    pub async fn record_view(&self, page_id: Uuid, ctx: &RequestContext) -> domains::Result<()> {
        let key = format!("view:{}:{}", ctx.client_identity(), page_id);
        self.admit(&key, self.quotas.views)?;

        let event = self.enrich(page_id, None, EventKind::View, ctx);
        bounded(ctx.timeout, self.events.append(event)).await?;
        tracing::debug!(%page_id, "view recorded");
        Ok(())
    }

    /// Records one click on a block of a page.
    pub async fn record_click(
        &self,
        page_id: Uuid,
        block_id: Uuid,
        ctx: &RequestContext,
    ) -> domains::Result<()> {
        let key = format!("click:{}:{}:{}", ctx.client_identity(), page_id, block_id);
        self.admit(&key, self.quotas.clicks)?;

        let event = self.enrich(page_id, Some(block_id), EventKind::Click, ctx);
        bounded(ctx.timeout, self.events.append(event)).await?;
        tracing::debug!(%page_id, %block_id, "click recorded");
        Ok(())
    }

    fn admit(&self, key: &str, quota: Quota) -> domains::Result<()> {
        let decision = self.limiter.check_quota(key, quota);
        if decision.allowed {
            return Ok(());
        }
        tracing::warn!(key, reset_at = %decision.reset_at, "rate limit exceeded");
        Err(AppError::RateLimited { reset_at: decision.reset_at })
    }

    fn enrich(
        &self,
        page_id: Uuid,
        block_id: Option<Uuid>,
        kind: EventKind,
        ctx: &RequestContext,
    ) -> Event {
        let user_agent = ctx.user_agent().map(str::to_owned);
        Event {
            id: Uuid::now_v7(),
            page_id,
            block_id,
            kind,
            referrer: ctx.referrer().map(str::to_owned),
            utm: utm::extract(&ctx.url),
            device: device::classify(user_agent.as_deref()),
            user_agent,
            created_at: self.clock.now(),
        }
    }
}
