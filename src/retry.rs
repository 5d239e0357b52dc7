//! Bounded retry with a fixed, interruptible delay.

use std::future::Future;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::client::ClientError;

/// Retry budget for one operation.
///
/// `max_retries` counts retries after the first attempt, so an operation
/// runs at most `max_retries + 1` times. The policy holds no state between
/// runs and can be shared freely.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    max_retries: u32,
    delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_retries: u32, delay: Duration) -> Self {
        Self { max_retries, delay }
    }

    /// A single attempt, no delay.
    pub fn none() -> Self {
        Self::new(0, Duration::ZERO)
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Run `operation`, retrying every failure.
    pub async fn execute<T, F, Fut>(
        &self,
        operation: F,
        cancel: &CancellationToken,
    ) -> Result<T, ClientError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, ClientError>>,
    {
        self.execute_if(operation, cancel, |_| true).await
    }

    /// Run `operation`, retrying only failures accepted by `should_retry`.
    ///
    /// The last failure is returned once the budget is spent. Cancelling
    /// `cancel` while waiting between attempts aborts with
    /// [`ClientError::Cancelled`].
    pub async fn execute_if<T, F, Fut, P>(
        &self,
        mut operation: F,
        cancel: &CancellationToken,
        should_retry: P,
    ) -> Result<T, ClientError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, ClientError>>,
        P: Fn(&ClientError) -> bool,
    {
        let mut attempt: u32 = 0;
        loop {
            let err = match operation().await {
                Ok(value) => return Ok(value),
                Err(err) => err,
            };

            attempt += 1;
            if attempt > self.max_retries || !should_retry(&err) {
                return Err(err);
            }

            warn!(
                attempt,
                max_retries = self.max_retries,
                delay_ms = self.delay.as_millis() as u64,
                error = %err,
                "attempt failed, retrying"
            );
            self.pause(cancel).await?;
        }
    }

    async fn pause(&self, cancel: &CancellationToken) -> Result<(), ClientError> {
        if self.delay.is_zero() {
            return if cancel.is_cancelled() {
                Err(ClientError::Cancelled)
            } else {
                Ok(())
            };
        }
        tokio::select! {
            _ = cancel.cancelled() => Err(ClientError::Cancelled),
            _ = tokio::time::sleep(self.delay) => Ok(()),
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::none()
    }
}
