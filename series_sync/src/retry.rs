//! Bounded retry with fixed or exponential backoff.
//!
//! Every call that can hit a transient I/O failure (cell reads, range writes)
//! goes through one [`RetryPolicy`] so attempt counts and delays come from
//! configuration instead of ad-hoc sleep loops.

use std::{fmt::Display, future::Future, time::Duration};

use serde::{Deserialize, Serialize};
use tracing::warn;

/// How the delay grows between attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Backoff {
    /// Same delay after every failed attempt.
    #[default]
    Fixed,
    /// Delay doubles after every failed attempt, capped by `max_delay_ms`.
    Exponential,
}

/// Retry settings for one class of operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RetryPolicy {
    /// Total attempts including the first one. Zero behaves like one.
    pub max_attempts: u32,
    /// Delay after the first failure, in milliseconds.
    pub delay_ms: u64,
    /// Growth of the delay between attempts.
    #[serde(default)]
    pub backoff: Backoff,
    /// Upper bound for exponential delays; ignored for fixed backoff.
    #[serde(default)]
    pub max_delay_ms: Option<u64>,
}

impl RetryPolicy {
    /// Same delay between every attempt.
    pub fn fixed(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts,
            delay_ms: delay.as_millis() as u64,
            backoff: Backoff::Fixed,
            max_delay_ms: None,
        }
    }

    /// Doubling delay starting at `base`, never above `max`.
    pub fn exponential(max_attempts: u32, base: Duration, max: Duration) -> Self {
        Self {
            max_attempts,
            delay_ms: base.as_millis() as u64,
            backoff: Backoff::Exponential,
            max_delay_ms: Some(max.as_millis() as u64),
        }
    }

    /// Attempts actually made, never less than one.
    pub fn attempts(&self) -> u32 {
        self.max_attempts.max(1)
    }

    /// Delay to wait after failed attempt number `failed` (0-based).
    pub fn delay_after(&self, failed: u32) -> Duration {
        let ms = match self.backoff {
            Backoff::Fixed => self.delay_ms,
            Backoff::Exponential => {
                let grown = self
                    .delay_ms
                    .saturating_mul(2_u64.saturating_pow(failed.min(63)));
                match self.max_delay_ms {
                    Some(cap) => grown.min(cap),
                    None => grown,
                }
            }
        };
        Duration::from_millis(ms)
    }

    /// Runs `op` until it succeeds or the attempt budget is spent, returning
    /// the last error in the latter case. `op` receives the 0-based attempt.
    pub async fn retry<F, Fut, T, E>(&self, what: &str, mut op: F) -> Result<T, E>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Display,
    {
        let attempts = self.attempts();
        let mut attempt = 0;
        loop {
            match op(attempt).await {
                Ok(value) => return Ok(value),
                Err(err) => {
                    if attempt + 1 >= attempts {
                        warn!(what, attempts, error = %err, "giving up");
                        return Err(err);
                    }
                    let delay = self.delay_after(attempt);
                    warn!(
                        what,
                        attempt = attempt + 1,
                        attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "attempt failed, retrying"
                    );
                    if !delay.is_zero() {
                        tokio::time::sleep(delay).await;
                    }
                    attempt += 1;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;

    use super::*;

    #[test]
    fn exponential_doubles_and_caps() {
        let policy =
            RetryPolicy::exponential(5, Duration::from_millis(100), Duration::from_millis(500));
        let delays: Vec<_> = (0..5).map(|a| policy.delay_after(a)).collect();
        assert_eq!(delays[0], Duration::from_millis(100));
        assert_eq!(delays[1], Duration::from_millis(200));
        assert_eq!(delays[2], Duration::from_millis(400));
        assert_eq!(delays[3], Duration::from_millis(500));
        assert_eq!(delays[4], Duration::from_millis(500));
    }

    #[test]
    fn fixed_stays_flat() {
        let policy = RetryPolicy::fixed(5, Duration::from_secs(10));
        assert_eq!(policy.delay_after(0), Duration::from_secs(10));
        assert_eq!(policy.delay_after(4), Duration::from_secs(10));
    }

    #[test]
    fn zero_attempts_still_tries_once() {
        assert_eq!(RetryPolicy::fixed(0, Duration::ZERO).attempts(), 1);
    }

    #[tokio::test]
    async fn retries_until_success() {
        let policy = RetryPolicy::fixed(3, Duration::ZERO);
        let calls = Cell::new(0);
        let result: Result<&str, String> = policy
            .retry("flaky", |attempt| {
                calls.set(calls.get() + 1);
                async move {
                    if attempt < 2 {
                        Err(format!("boom {attempt}"))
                    } else {
                        Ok("ok")
                    }
                }
            })
            .await;
        assert_eq!(result.unwrap(), "ok");
        assert_eq!(calls.get(), 3);
    }

    #[tokio::test]
    async fn returns_last_error_after_budget() {
        let policy = RetryPolicy::fixed(2, Duration::ZERO);
        let calls = Cell::new(0);
        let result: Result<(), String> = policy
            .retry("broken", |attempt| {
                calls.set(calls.get() + 1);
                async move { Err(format!("nope {attempt}")) }
            })
            .await;
        assert_eq!(result.unwrap_err(), "nope 1");
        assert_eq!(calls.get(), 2);
    }

    #[test]
    fn deserializes_from_toml() {
        let policy: RetryPolicy = toml::from_str(
            r#"
            max_attempts = 4
            delay_ms = 250
            backoff = "exponential"
            max_delay_ms = 2000
            "#,
        )
        .unwrap();
        assert_eq!(
            policy,
            RetryPolicy::exponential(4, Duration::from_millis(250), Duration::from_secs(2))
        );
    }
}
