//! Transparent retries for side-effect-free reads.
//!
//! Writes never go through here: a resubmitted wager or vote is not idempotent.

use crate::{Error, Result};
use std::{future::Future, time::Duration};
use tokio::time::sleep;
use tracing::debug;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first.
    pub max_attempts: usize,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff: Duration::from_millis(250),
            max_backoff: Duration::from_secs(2),
        }
    }
}

impl RetryPolicy {
    /// A policy that tries once.
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            initial_backoff: Duration::ZERO,
            max_backoff: Duration::ZERO,
        }
    }

    /// Run the read `op`, retrying transport failures with exponential backoff.
    pub async fn read<T, F, Fut>(&self, name: &'static str, mut op: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let attempts = self.max_attempts.max(1);
        let mut backoff = self.initial_backoff;
        let mut attempt = 1;
        loop {
            match op().await {
                Err(err) if err.is_transport() && attempt < attempts => {
                    debug!(read = name, attempt, error = %err, ?backoff, "retrying read");
                    sleep(backoff).await;
                    backoff = backoff.saturating_mul(2).min(self.max_backoff);
                    attempt += 1;
                }
                result => return result,
            }
        }
    }
}

/// Fail with [Error::Timeout] if `future` does not finish within `limit`.
pub async fn within<T>(limit: Duration, future: impl Future<Output = Result<T>>) -> Result<T> {
    tokio::time::timeout(limit, future)
        .await
        .map_err(|_| Error::Timeout(limit))?
}
