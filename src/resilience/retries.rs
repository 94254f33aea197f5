//! Bounded retry loop with a per-attempt deadline.
//!
//! # Responsibilities
//! - Run an operation at most `retries + 1` times
//! - Give every attempt a fresh timeout window
//! - Sleep the configured backoff between attempts
//!
//! # Design Decisions
//! - Explicit loop, no recursion: worst-case latency is
//!   `attempts × (timeout + backoff)`
//! - A timeout cancels the in-flight attempt by dropping its future
//! - The caller decides which errors exist; every error is retried here

use std::future::Future;
use std::time::Duration;

use crate::resilience::backoff::calculate_backoff;

/// Why a single attempt failed.
#[derive(Debug)]
pub enum AttemptError<E> {
    TimedOut,
    Failed(E),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    retries: u32,
    timeout: Duration,
    backoff: Duration,
}

impl RetryPolicy {
    pub fn new(retries: u32, timeout: Duration) -> Self {
        Self {
            retries,
            timeout,
            backoff: Duration::ZERO,
        }
    }

    pub fn with_backoff(mut self, backoff: Duration) -> Self {
        self.backoff = backoff;
        self
    }

    pub fn attempts(&self) -> u32 {
        self.retries.saturating_add(1)
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Run `op` until it succeeds or the attempts are exhausted.
    ///
    /// `op` receives the 1-based attempt number; `on_failure` is told about
    /// every failed attempt before the next one starts. The last failure is
    /// returned together with the number of attempts made.
    pub async fn run<T, E, F, Fut, L>(
        &self,
        mut op: F,
        mut on_failure: L,
    ) -> Result<T, (AttemptError<E>, u32)>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        L: FnMut(u32, &AttemptError<E>),
    {
        let attempts = self.attempts();
        let mut attempt = 1;

        loop {
            let error = match tokio::time::timeout(self.timeout, op(attempt)).await {
                Ok(Ok(value)) => return Ok(value),
                Ok(Err(err)) => AttemptError::Failed(err),
                Err(_) => AttemptError::TimedOut,
            };

            on_failure(attempt, &error);

            if attempt >= attempts {
                return Err((error, attempt));
            }

            let delay = calculate_backoff(attempt, self.backoff);
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            attempt += 1;
        }
    }
}
