//! # AppError
//!
//! Centralized error handling for the Rusty-Bio core.
//! Maps domain-specific failures to actionable error types.

use chrono::{DateTime, Utc};
use std::time::Duration;
use thiserror::Error;
use uuid::Uuid;

/// The primary error type for all core operations.
#[derive(Error, Debug)]
pub enum AppError {
    /// Resource not found (e.g., Page, Block)
    #[error("{0} not found with ID {1}")]
    NotFound(String, String),

    /// Validation failure (e.g., unsafe link scheme, incomplete reorder list)
    #[error("validation error: {0}")]
    ValidationError(String),

    /// The resource exists but belongs to another owner.
    #[error("forbidden: {0}")]
    Forbidden(String),

    /// Resource already exists (e.g., duplicate page handle)
    #[error("conflict: {0}")]
    Conflict(String),

    /// Quota exhausted for the current window. Never retried internally.
    #[error("too many requests, window resets at {reset_at}")]
    RateLimited { reset_at: DateTime<Utc> },

    /// Persistence failure or an elapsed storage timeout, surfaced as-is.
    #[error("storage error: {0}")]
    Storage(#[from] anyhow::Error),
}

impl AppError {
    pub fn not_found(kind: &str, id: impl ToString) -> Self {
        Self::NotFound(kind.to_string(), id.to_string())
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::ValidationError(msg.into())
    }

    /// How long a rate-limited caller should wait, measured from `now`.
    /// `None` for every other error kind.
    pub fn retry_after(&self, now: DateTime<Utc>) -> Option<Duration> {
        match self {
            Self::RateLimited { reset_at } => {
                Some((*reset_at - now).to_std().unwrap_or(Duration::ZERO))
            }
            _ => None,
        }
    }
}

/// Rejections a storage adapter reports inside its `anyhow::Error` so the
/// services can tell a bad caller input from an I/O failure.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreRejection {
    /// A referenced row (page or block) is absent.
    #[error("{kind} {id} does not exist")]
    MissingReference { kind: &'static str, id: Uuid },

    /// The page's block set changed under a reorder.
    #[error("reorder list does not match the blocks of page {page_id}")]
    StaleBlockSet { page_id: Uuid },
}

impl AppError {
    /// Classifies an adapter error. Typed rejections become `NotFound` or
    /// `ValidationError`; everything else stays a storage failure.
    pub fn from_store(err: anyhow::Error) -> Self {
        let rejected = err.downcast_ref::<StoreRejection>().map(|rejection| match rejection {
            StoreRejection::MissingReference { kind, id } => Self::not_found(*kind, id),
            StoreRejection::StaleBlockSet { .. } => Self::validation(rejection.to_string()),
        });
        rejected.unwrap_or_else(|| Self::Storage(err))
    }
}

/// A specialized Result type for Rusty-Bio logic.
pub type Result<T> = std::result::Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeDelta;

    #[test]
    fn retry_after_counts_down_to_reset() {
        let now = Utc::now();
        let err = AppError::RateLimited { reset_at: now + TimeDelta::seconds(30) };
        assert_eq!(err.retry_after(now), Some(Duration::from_secs(30)));
        // A reset time already in the past means "retry now".
        assert_eq!(err.retry_after(now + TimeDelta::seconds(60)), Some(Duration::ZERO));
        assert_eq!(AppError::not_found("Block", "x").retry_after(now), None);
    }

    #[test]
    fn store_rejections_keep_their_kind() {
        let id = Uuid::now_v7();
        let missing = AppError::from_store(StoreRejection::MissingReference { kind: "Block", id }.into());
        assert!(matches!(missing, AppError::NotFound(ref kind, ref raw) if kind == "Block" && *raw == id.to_string()));

        let stale = AppError::from_store(StoreRejection::StaleBlockSet { page_id: id }.into());
        assert!(matches!(stale, AppError::ValidationError(_)));

        let io = AppError::from_store(anyhow::anyhow!("connection reset"));
        assert!(matches!(io, AppError::Storage(_)));
    }

    #[test]
    fn storage_errors_wrap_anyhow() {
        let err: AppError = anyhow::anyhow!("connection reset").into();
        assert!(matches!(err, AppError::Storage(_)));
        assert_eq!(err.to_string(), "storage error: connection reset");
    }
}
