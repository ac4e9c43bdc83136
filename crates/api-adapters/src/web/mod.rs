//! Axum router for the public render path, click tracking and the owner
//! authoring API.

pub mod error;
pub mod extract;
pub mod handlers;

use axum::routing::{get, patch, post, put};
use axum::Router;
use domains::AppError;
use services::{AnalyticsService, BlockService, IngestionService, PageService};
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::CorsLayer;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::trace::TraceLayer;

use crate::metrics::Metrics;
use error::ApiError;

/// State shared by every handler.
#[derive(Clone)]
pub struct AppState {
    pub pages: Arc<PageService>,
    pub blocks: Arc<BlockService>,
    pub analytics: Arc<AnalyticsService>,
    pub ingestion: Arc<IngestionService>,
    pub metrics: Arc<Metrics>,
    /// Deadline handed to the ingestion pipeline per request.
    pub storage_timeout: Duration,
}

impl AppState {
    /// Counts the failure, then hands it to the response mapping.
    pub(crate) fn fail(&self, err: AppError) -> ApiError {
        self.metrics.error(&err);
        ApiError::App(err)
    }
}

pub fn router(state: AppState) -> Router {
    let api = Router::new()
        .route("/analytics", get(handlers::analytics))
        .route("/templates", get(handlers::list_templates))
        .route("/pages", get(handlers::list_pages).post(handlers::create_page))
        .route("/pages/{page_id}", patch(handlers::update_page).delete(handlers::delete_page))
        .route("/pages/{page_id}/blocks", get(handlers::list_blocks).post(handlers::append_block))
        .route("/pages/{page_id}/blocks/order", put(handlers::reorder_blocks))
        .route("/blocks/{block_id}", patch(handlers::update_block).delete(handlers::delete_block));

    Router::new()
        .route("/healthz", get(handlers::healthz))
        .route("/metrics", get(handlers::metrics))
        .route("/p/{page_id}/click/{block_id}", post(handlers::track_click))
        .route("/{handle}", get(handlers::public_page))
        .nest("/api", api)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
        .with_state(state)
}
