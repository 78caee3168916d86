//! Bounded retry around an [`Embedder`].
//!
//! Linear backoff: after the n-th failed attempt the wrapper sleeps
//! `n × unit` before trying again, so with the default three attempts the
//! delays are `1 × unit` and `2 × unit`. An empty vector counts as a
//! failed attempt.

use std::sync::Arc;
use std::time::Duration;

use repo_help_core::embedding::Embedder;

use crate::config::EmbeddingConfig;
use crate::error::EmbeddingFailure;

/// Attempt budget and backoff unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub unit: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            unit: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    pub fn from_config(config: &EmbeddingConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            unit: Duration::from_millis(config.backoff_ms),
        }
    }

    /// Delay after failed attempt `attempt` (1-based).
    pub fn delay_after(&self, attempt: u32) -> Duration {
        self.unit * attempt
    }
}

/// Text → vector service with retries.
///
/// Knows nothing about files or chunks; cloning shares the provider.
#[derive(Clone)]
pub struct RetryingEmbedder {
    inner: Arc<dyn Embedder>,
    policy: RetryPolicy,
}

impl RetryingEmbedder {
    pub fn new(inner: Arc<dyn Embedder>, policy: RetryPolicy) -> Self {
        Self { inner, policy }
    }

    pub fn model_name(&self) -> &str {
        self.inner.model_name()
    }

    /// Embed `text`, retrying transient failures.
    ///
    /// # Errors
    ///
    /// [`EmbeddingFailure`] carrying the attempt count and the last
    /// provider error once every attempt has failed.
    pub async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingFailure> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            let err = match self.inner.embed(text).await {
                Ok(vector) if !vector.is_empty() => return Ok(vector),
                Ok(_) => anyhow::anyhow!("provider returned an empty embedding"),
                Err(e) => e,
            };

            if attempt >= self.policy.max_attempts {
                tracing::warn!(attempt, error = %err, "embedding failed, giving up");
                return Err(EmbeddingFailure {
                    attempts: attempt,
                    last: err.into(),
                });
            }

            let delay = self.policy.delay_after(attempt);
            tracing::warn!(
                attempt,
                max_attempts = self.policy.max_attempts,
                delay_ms = delay.as_millis() as u64,
                error = %err,
                "embedding failed, retrying"
            );
            tokio::time::sleep(delay).await;
        }
    }
}
