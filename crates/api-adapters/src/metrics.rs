//! Prometheus metrics exposed on `/metrics`.

use domains::AppError;
use prometheus_client::encoding::text::encode;
use prometheus_client::encoding::EncodeLabelSet;
use prometheus_client::metrics::counter::Counter;
use prometheus_client::metrics::family::Family;
use prometheus_client::registry::Registry;

#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct ClickLabels {
    pub outcome: &'static str,
}

#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct ErrorLabels {
    pub kind: &'static str,
}

pub struct Metrics {
    registry: Registry,
    page_renders: Counter,
    clicks: Family<ClickLabels, Counter>,
    errors: Family<ErrorLabels, Counter>,
}

impl Metrics {
    pub fn new() -> Self {
        let mut registry = Registry::with_prefix("rusty_bio");
        let page_renders = Counter::default();
        let clicks = Family::<ClickLabels, Counter>::default();
        let errors = Family::<ErrorLabels, Counter>::default();

        registry.register("page_renders", "Public pages served", page_renders.clone());
        registry.register("clicks", "Click tracking requests by outcome", clicks.clone());
        registry.register("errors", "Failed requests by error kind", errors.clone());

        Self { registry, page_renders, clicks, errors }
    }

    pub fn page_rendered(&self) {
        self.page_renders.inc();
    }

    pub fn click(&self, result: &domains::Result<()>) {
        let outcome = match result {
            Ok(()) => "recorded",
            Err(AppError::RateLimited { .. }) => "rate_limited",
            Err(_) => "failed",
        };
        self.clicks.get_or_create(&ClickLabels { outcome }).inc();
    }

    pub fn error(&self, err: &AppError) {
        let kind = match err {
            AppError::NotFound(..) => "not_found",
            AppError::ValidationError(_) => "validation",
            AppError::Forbidden(_) => "forbidden",
            AppError::Conflict(_) => "conflict",
            AppError::RateLimited { .. } => "rate_limited",
            AppError::Storage(_) => "storage",
        };
        self.errors.get_or_create(&ErrorLabels { kind }).inc();
    }

    /// OpenMetrics text exposition.
    pub fn render(&self) -> Result<String, std::fmt::Error> {
        let mut body = String::new();
        encode(&mut body, &self.registry)?;
        Ok(body)
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}
