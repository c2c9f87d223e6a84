//! Time-boxed external lookups.
//!
//! Image/GIF providers live outside this crate; whatever future performs
//! the lookup is wrapped here so a slow or failing third party can never
//! stall or fail the surrounding command. It degrades to a static
//! fallback instead.

use std::future::Future;
use std::time::Duration;
use tracing::warn;

pub const DEFAULT_LOOKUP_TIMEOUT: Duration = Duration::from_secs(3);

/// Run `lookup` under a timeout; on expiry or error, return `fallback`.
pub async fn with_fallback<T, F>(lookup: F, limit: Duration, fallback: T) -> T
where
    F: Future<Output = anyhow::Result<T>>,
{
    match tokio::time::timeout(limit, lookup).await {
        Ok(Ok(value)) => value,
        Ok(Err(reason)) => {
            warn!(%reason, "external lookup failed, using fallback");
            fallback
        }
        Err(_) => {
            warn!(timeout_ms = limit.as_millis() as u64, "external lookup timed out");
            fallback
        }
    }
}
