//! Maps core errors onto HTTP responses.

use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::Utc;
use domains::AppError;
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    /// No `X-Owner-Id` on an authoring route.
    #[error("missing owner identity")]
    Unauthorized,

    #[error(transparent)]
    App(#[from] AppError),
}

#[derive(Serialize)]
struct ErrorBody {
    error: &'static str,
    message: String,
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::App(err) => match err {
                AppError::NotFound(..) => StatusCode::NOT_FOUND,
                AppError::ValidationError(_) => StatusCode::BAD_REQUEST,
                AppError::Forbidden(_) => StatusCode::FORBIDDEN,
                AppError::Conflict(_) => StatusCode::CONFLICT,
                AppError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
                AppError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
        }
    }

    fn code(&self) -> &'static str {
        match self {
            Self::Unauthorized => "unauthorized",
            Self::App(AppError::NotFound(..)) => "not_found",
            Self::App(AppError::ValidationError(_)) => "validation_error",
            Self::App(AppError::Forbidden(_)) => "forbidden",
            Self::App(AppError::Conflict(_)) => "conflict",
            Self::App(AppError::RateLimited { .. }) => "rate_limited",
            Self::App(AppError::Storage(_)) => "internal",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match &self {
            // Storage details stay in the logs.
            Self::App(AppError::Storage(err)) => {
                tracing::error!(error = %err, "storage failure");
                "internal server error".to_string()
            }
            other => other.to_string(),
        };

        let retry_after = match &self {
            Self::App(err) => err.retry_after(Utc::now()),
            Self::Unauthorized => None,
        };

        let mut response = (status, Json(ErrorBody { error: self.code(), message })).into_response();
        if let Some(wait) = retry_after {
            // Whole seconds, rounded up so clients never retry early.
            let secs = wait.as_millis().div_ceil(1000).max(1);
            if let Ok(value) = HeaderValue::from_str(&secs.to_string()) {
                response.headers_mut().insert(header::RETRY_AFTER, value);
            }
        }
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeDelta;

    #[test]
    fn rate_limited_carries_retry_after() {
        let err = ApiError::from(AppError::RateLimited { reset_at: Utc::now() + TimeDelta::seconds(30) });
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        let secs: u64 = response.headers()[header::RETRY_AFTER].to_str().unwrap().parse().unwrap();
        assert!((29..=30).contains(&secs));
    }

    #[test]
    fn core_errors_map_to_distinct_statuses() {
        let cases = [
            (AppError::not_found("Page", "x"), StatusCode::NOT_FOUND),
            (AppError::validation("bad"), StatusCode::BAD_REQUEST),
            (AppError::Forbidden("no".into()), StatusCode::FORBIDDEN),
            (AppError::Conflict("taken".into()), StatusCode::CONFLICT),
        ];
        for (err, status) in cases {
            assert_eq!(ApiError::from(err).into_response().status(), status);
        }
        assert_eq!(ApiError::Unauthorized.into_response().status(), StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn storage_errors_hide_details() {
        let err = ApiError::from(AppError::Storage(anyhow::anyhow!("password=hunter2")));
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(err.into_response().headers().get(header::RETRY_AFTER).is_none());
    }
}
