//! Deadline wrapper for storage calls.

use domains::AppError;
use std::future::Future;
use std::time::Duration;

/// Runs a storage future under `timeout`. Adapter rejections keep their
/// meaning through [`AppError::from_store`]; an elapsed deadline is reported
/// as a storage failure, the same as any other I/O error.
pub(crate) async fn bounded<T, F>(timeout: Duration, call: F) -> domains::Result<T>
where
    F: Future<Output = anyhow::Result<T>>,
{
    match tokio::time::timeout(timeout, call).await {
        Ok(result) => result.map_err(AppError::from_store),
        Err(_) => Err(AppError::Storage(anyhow::anyhow!(
            "storage call timed out after {} ms",
            timeout.as_millis()
        ))),
    }
}
