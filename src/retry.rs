//! Bounded retry of a boolean condition.
//!
//! Polls an async predicate at a fixed interval until it holds or the
//! attempt budget runs out. Running out is a normal outcome reported through
//! [`WaitOutcome::Exhausted`], not an error. The only error a wait produces
//! on its own is [`Error::Cancelled`], raised when the waiter's cancellation
//! token fires during a sleep.

use crate::error::{Error, Result};
use std::future::Future;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Fixed-interval retry policy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Pause once before the first attempt.
    pub initial_delay: Duration,
    /// Pause between attempts.
    pub interval: Duration,
    /// Maximum number of predicate invocations.
    pub max_attempts: u32,
    /// Treat a predicate error like a `false` result instead of failing.
    pub retry_on_error: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(10),
            interval: Duration::from_secs(3),
            max_attempts: 40,
            retry_on_error: true,
        }
    }
}

impl RetryPolicy {
    /// Create a policy with no initial delay.
    pub fn new(interval: Duration, max_attempts: u32) -> Self {
        Self {
            initial_delay: Duration::ZERO,
            interval,
            max_attempts,
            retry_on_error: true,
        }
    }

    /// Set the initial delay.
    pub fn with_initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    /// Set the interval between attempts.
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Set the attempt budget.
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    /// Set whether predicate errors are retried.
    pub fn with_retry_on_error(mut self, retry: bool) -> Self {
        self.retry_on_error = retry;
        self
    }

    /// Upper bound on time spent waiting, ignoring predicate latency.
    pub fn max_wait(&self) -> Duration {
        self.initial_delay + self.interval * self.max_attempts.saturating_sub(1)
    }
}

/// Result of a bounded wait.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitOutcome {
    /// The predicate held on attempt `attempts`.
    Succeeded { attempts: u32 },
    /// The predicate never held within the budget.
    Exhausted { attempts: u32 },
}

impl WaitOutcome {
    /// Whether the condition was met.
    pub fn is_success(&self) -> bool {
        matches!(self, WaitOutcome::Succeeded { .. })
    }

    /// Number of predicate invocations made.
    pub fn attempts(&self) -> u32 {
        match self {
            WaitOutcome::Succeeded { attempts } | WaitOutcome::Exhausted { attempts } => *attempts,
        }
    }
}

/// Executes a [`RetryPolicy`] against a predicate.
#[derive(Debug, Clone)]
pub struct RetryingWaiter {
    policy: RetryPolicy,
    cancellation: CancellationToken,
}

impl RetryingWaiter {
    /// Create a waiter with its own cancellation token.
    pub fn new(policy: RetryPolicy) -> Self {
        Self::with_cancellation(policy, CancellationToken::new())
    }

    /// Create a waiter bound to an existing cancellation token.
    pub fn with_cancellation(policy: RetryPolicy, cancellation: CancellationToken) -> Self {
        Self {
            policy,
            cancellation,
        }
    }

    /// The policy in use.
    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Token that interrupts this waiter.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancellation.clone()
    }

    /// Poll `predicate` until it returns `Ok(true)` or the budget runs out.
    pub async fn wait_until<F, Fut>(&self, mut predicate: F) -> Result<WaitOutcome>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<bool>>,
    {
        if !self.policy.initial_delay.is_zero() {
            self.sleep(self.policy.initial_delay).await?;
        }

        let mut attempts = 0;
        while attempts < self.policy.max_attempts {
            if self.cancellation.is_cancelled() {
                return Err(Error::Cancelled);
            }

            attempts += 1;
            match predicate().await {
                Ok(true) => {
                    tracing::debug!(attempts, "Wait condition met");
                    return Ok(WaitOutcome::Succeeded { attempts });
                }
                Ok(false) => {
                    tracing::trace!(attempts, "Wait condition not met yet");
                }
                Err(Error::Cancelled) => return Err(Error::Cancelled),
                Err(e) if self.policy.retry_on_error => {
                    tracing::debug!(attempts, error = %e, "Wait condition errored, retrying");
                }
                Err(e) => return Err(e),
            }

            if attempts < self.policy.max_attempts {
                self.sleep(self.policy.interval).await?;
            }
        }

        tracing::warn!(
            attempts,
            max_wait_secs = self.policy.max_wait().as_secs(),
            "Wait condition not met within retry budget"
        );
        Ok(WaitOutcome::Exhausted { attempts })
    }

    async fn sleep(&self, duration: Duration) -> Result<()> {
        tokio::select! {
            biased;
            _ = self.cancellation.cancelled() => Err(Error::Cancelled),
            _ = tokio::time::sleep(duration) => Ok(()),
        }
    }
}
