//! # HTTP Handlers
//!
//! Thin translation between HTTP and the services. No business rules live
//! here beyond parsing ids and bodies.

use axum::extract::{Path, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::Json;
use domains::{Block, BlockKind, DashboardStats, Page};
use serde::Deserialize;
use serde_json::{json, Value};
use services::{templates, BlockPatch, NewPage, PagePatch, PublicPage};
use uuid::Uuid;

use super::error::ApiError;
use super::extract::{owner_from, parse_id, Owner, Visitor};
use super::AppState;

type ApiResult<T> = Result<T, ApiError>;

pub async fn healthz() -> &'static str {
    "ok"
}

pub async fn metrics(State(state): State<AppState>) -> impl IntoResponse {
    match state.metrics.render() {
        Ok(body) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "application/openmetrics-text; version=1.0.0; charset=utf-8")],
            body,
        )
            .into_response(),
        Err(_) => StatusCode::INTERNAL_SERVER_ERROR.into_response(),
    }
}

/// Public page render. Counts a view for published pages.
pub async fn public_page(
    State(state): State<AppState>,
    Path(handle): Path<String>,
    headers: HeaderMap,
    Visitor(ctx): Visitor,
) -> ApiResult<Json<PublicPage>> {
    let viewer = owner_from(&headers);
    let page = state
        .pages
        .load_public(&handle, viewer.as_deref(), &ctx)
        .await
        .map_err(|e| state.fail(e))?;
    state.metrics.page_rendered();
    Ok(Json(page))
}

pub async fn track_click(
    State(state): State<AppState>,
    Path((page_id, block_id)): Path<(String, String)>,
    Visitor(ctx): Visitor,
) -> ApiResult<StatusCode> {
    let page_id = parse_id("Page", &page_id)?;
    let block_id = parse_id("Block", &block_id)?;
    let result = state.ingestion.record_click(page_id, block_id, &ctx).await;
    state.metrics.click(&result);
    result.map_err(|e| state.fail(e))?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn analytics(State(state): State<AppState>, Owner(owner): Owner) -> ApiResult<Json<DashboardStats>> {
    Ok(Json(state.analytics.dashboard(&owner).await.map_err(|e| state.fail(e))?))
}

pub async fn list_templates() -> Json<&'static [templates::Template]> {
    Json(templates::catalog())
}

pub async fn list_pages(State(state): State<AppState>, Owner(owner): Owner) -> ApiResult<Json<Vec<Page>>> {
    Ok(Json(state.pages.list_pages(&owner).await.map_err(|e| state.fail(e))?))
}

pub async fn create_page(
    State(state): State<AppState>,
    Owner(owner): Owner,
    Json(input): Json<NewPage>,
) -> ApiResult<(StatusCode, Json<Page>)> {
    let page = state.pages.create_page(&owner, input).await.map_err(|e| state.fail(e))?;
    Ok((StatusCode::CREATED, Json(page)))
}

pub async fn update_page(
    State(state): State<AppState>,
    Owner(owner): Owner,
    Path(page_id): Path<String>,
    Json(patch): Json<PagePatch>,
) -> ApiResult<Json<Page>> {
    let page_id = parse_id("Page", &page_id)?;
    Ok(Json(state.pages.update(&owner, page_id, &patch).await.map_err(|e| state.fail(e))?))
}

pub async fn delete_page(
    State(state): State<AppState>,
    Owner(owner): Owner,
    Path(page_id): Path<String>,
) -> ApiResult<StatusCode> {
    let page_id = parse_id("Page", &page_id)?;
    state.pages.delete_page(&owner, page_id).await.map_err(|e| state.fail(e))?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn list_blocks(
    State(state): State<AppState>,
    Owner(owner): Owner,
    Path(page_id): Path<String>,
) -> ApiResult<Json<Vec<Block>>> {
    let page_id = parse_id("Page", &page_id)?;
    Ok(Json(state.blocks.list(&owner, page_id).await.map_err(|e| state.fail(e))?))
}

#[derive(Debug, Deserialize)]
pub struct NewBlock {
    #[serde(rename = "type")]
    pub kind: BlockKind,
}

pub async fn append_block(
    State(state): State<AppState>,
    Owner(owner): Owner,
    Path(page_id): Path<String>,
    Json(body): Json<NewBlock>,
) -> ApiResult<(StatusCode, Json<Value>)> {
    let page_id = parse_id("Page", &page_id)?;
    let id = state.blocks.append(&owner, page_id, body.kind).await.map_err(|e| state.fail(e))?;
    Ok((StatusCode::CREATED, Json(json!({ "id": id }))))
}

#[derive(Debug, Deserialize)]
pub struct BlockOrder {
    pub block_ids: Vec<Uuid>,
}

pub async fn reorder_blocks(
    State(state): State<AppState>,
    Owner(owner): Owner,
    Path(page_id): Path<String>,
    Json(body): Json<BlockOrder>,
) -> ApiResult<StatusCode> {
    let page_id = parse_id("Page", &page_id)?;
    state
        .blocks
        .reorder(&owner, page_id, &body.block_ids)
        .await
        .map_err(|e| state.fail(e))?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn update_block(
    State(state): State<AppState>,
    Owner(owner): Owner,
    Path(block_id): Path<String>,
    Json(patch): Json<BlockPatch>,
) -> ApiResult<Json<Block>> {
    let block_id = parse_id("Block", &block_id)?;
    Ok(Json(state.blocks.patch(&owner, block_id, &patch).await.map_err(|e| state.fail(e))?))
}

pub async fn delete_block(
    State(state): State<AppState>,
    Owner(owner): Owner,
    Path(block_id): Path<String>,
) -> ApiResult<StatusCode> {
    let block_id = parse_id("Block", &block_id)?;
    state.blocks.remove(&owner, block_id).await.map_err(|e| state.fail(e))?;
    Ok(StatusCode::NO_CONTENT)
}
