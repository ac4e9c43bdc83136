//! Request extractors.
//!
//! Owner identity arrives in `X-Owner-Id`, set by the auth layer in front of
//! this service. Nothing here verifies it.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum::http::{header, HeaderMap};
use domains::{AppError, RequestContext};
use std::time::Duration;
use uuid::Uuid;

use super::error::ApiError;
use super::AppState;

pub const OWNER_HEADER: &str = "x-owner-id";

/// Authenticated page owner. Rejects with 401 when the header is missing.
#[derive(Debug, Clone)]
pub struct Owner(pub String);

impl<S: Send + Sync> FromRequestParts<S> for Owner {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        owner_from(&parts.headers).map(Owner).ok_or(ApiError::Unauthorized)
    }
}

pub fn owner_from(headers: &HeaderMap) -> Option<String> {
    headers
        .get(OWNER_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_owned)
}

/// Anonymous-visitor context for the ingestion pipeline.
#[derive(Debug, Clone)]
pub struct Visitor(pub RequestContext);

impl FromRequestParts<AppState> for Visitor {
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        Ok(Visitor(request_context(parts, state.storage_timeout)))
    }
}

/// Rebuilds the absolute request URL (for UTM tags) and copies the headers
/// the pipeline reads.
pub fn request_context(parts: &Parts, timeout: Duration) -> RequestContext {
    let host = parts
        .headers
        .get(header::HOST)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("localhost");
    let path = parts.uri.path_and_query().map(|pq| pq.as_str()).unwrap_or("/");

    let mut ctx = RequestContext::new(format!("http://{host}{path}")).with_timeout(timeout);
    for name in [header::REFERER, header::USER_AGENT] {
        if let Some(value) = parts.headers.get(&name).and_then(|v| v.to_str().ok()) {
            ctx = ctx.with_header(name.as_str(), value);
        }
    }
    for name in ["x-forwarded-for", "x-real-ip"] {
        if let Some(value) = parts.headers.get(name).and_then(|v| v.to_str().ok()) {
            ctx = ctx.with_header(name, value);
        }
    }
    ctx
}

/// Path ids are opaque strings to clients; anything that is not a UUID
/// cannot name an existing record.
pub fn parse_id(kind: &str, raw: &str) -> Result<Uuid, ApiError> {
    Uuid::parse_str(raw).map_err(|_| ApiError::App(AppError::not_found(kind, raw)))
}
