use backon::{ExponentialBuilder, Retryable};
use serde::{Deserialize, Serialize};
use std::{future::Future, time::Duration};

use crate::error::DispatchError;

/*
 * Retry policy shared by every outbound call of the dispatch client.
 *
 * The backoff itself comes from the backon crate. This file decides what is
 * retried: transient transport failures only. `ALREADY_EXISTS` is turned into
 * a deduplication error before the policy sees it, so a conflicting trigger
 * or schedule is never sent twice.
 */

#[derive(Debug, Deserialize, Copy, Clone, PartialEq, Serialize)]
pub struct RetryConfig {
    #[serde(default = "default_num_retries")]
    pub num_retries: usize,
    #[serde(default = "default_min_delay_ms")]
    pub min_delay_ms: u64,
    #[serde(default = "default_max_delay_s")]
    pub max_delay_s: f32,
}

impl std::fmt::Display for RetryConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let json = serde_json::to_string_pretty(self).map_err(|_| std::fmt::Error)?;
        write!(f, "{json}")
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        RetryConfig {
            num_retries: default_num_retries(),
            min_delay_ms: default_min_delay_ms(),
            max_delay_s: default_max_delay_s(),
        }
    }
}

// Five attempts in total.
fn default_num_retries() -> usize {
    4
}

fn default_min_delay_ms() -> u64 {
    100
}

fn default_max_delay_s() -> f32 {
    10.0
}

impl RetryConfig {
    /// A policy that makes exactly one attempt.
    pub fn none() -> Self {
        RetryConfig {
            num_retries: 0,
            ..Default::default()
        }
    }

    /// Issues `call` under the retry policy.
    ///
    /// Transport statuses are classified with [`DispatchError::from_status`];
    /// only errors for which [`DispatchError::is_retryable`] holds are
    /// attempted again. After the last attempt the error is returned as is.
    pub async fn call<R, F, Fut>(&self, operation: &'static str, mut call: F) -> Result<R, DispatchError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<R, tonic::Status>>,
    {
        let attempt = || {
            let fut = call();
            async move { fut.await.map_err(DispatchError::from_status) }
        };
        attempt
            .retry(self.get_backoff())
            .when(DispatchError::is_retryable)
            .notify(|err: &DispatchError, delay: Duration| {
                tracing::warn!(
                    operation,
                    error = %err,
                    delay_ms = delay.as_millis() as u64,
                    "Retrying workflow service call"
                );
            })
            .await
    }

    fn get_backoff(&self) -> ExponentialBuilder {
        ExponentialBuilder::default()
            .with_jitter()
            .with_min_delay(Duration::from_millis(self.min_delay_ms))
            .with_max_delay(Duration::from_secs_f32(self.max_delay_s))
            .with_max_times(self.num_retries)
    }
}
