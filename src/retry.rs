//! Fixed-delay retry for idempotent connect operations.
//!
//! Used when opening a vector store: the operation is attempted up to
//! `max_attempts` times with a flat `delay` between attempts. There is no
//! backoff or jitter. When every attempt fails, the last error is returned
//! inside a [`RagError::Connect`]. Configuration errors (see
//! [`RagError::is_config`]) are returned immediately.

use anyhow::Result;
use std::future::Future;
use std::time::Duration;
use tracing::{info, warn};

use crate::error::{find_rag_error, RagError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first.
    pub max_attempts: u32,
    /// Pause between a failed attempt and the next one.
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            delay: Duration::from_secs(2),
        }
    }
}

/// Run `op` until it succeeds or `policy.max_attempts` attempts have failed.
///
/// `target` names the service in logs and in the final error.
pub async fn retry_connect<T, F, Fut>(policy: RetryPolicy, target: &str, mut op: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let attempts = policy.max_attempts.max(1);
    let mut attempt = 1;

    loop {
        match op().await {
            Ok(value) => {
                info!(service = target, attempt, "connection established");
                return Ok(value);
            }
            Err(e) if find_rag_error(&e).is_some_and(RagError::is_config) => {
                return Err(e);
            }
            Err(e) if attempt >= attempts => {
                warn!(service = target, attempt, error = %e, "connection failed, giving up");
                return Err(RagError::Connect {
                    target: target.to_string(),
                    attempts,
                    source: e,
                }
                .into());
            }
            Err(e) => {
                warn!(
                    service = target,
                    attempt,
                    delay_ms = policy.delay.as_millis() as u64,
                    error = %e,
                    "connection failed, retrying"
                );
                tokio::time::sleep(policy.delay).await;
                attempt += 1;
            }
        }
    }
}
