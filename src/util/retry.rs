//! Caller-side retry with exponential backoff and jitter.
//!
//! The agent loop never retries on its own; wrap calls in a [`RetryPolicy`]
//! when backoff is wanted.

use std::future::Future;
use std::time::Duration;

use crate::error::{ChofeshError, Result};

/// Retry policy configuration.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Maximum number of attempts (including the first).
    pub max_attempts: u32,
    /// Initial backoff duration.
    pub initial_backoff: Duration,
    /// Maximum backoff duration.
    pub max_backoff: Duration,
    /// Backoff multiplier.
    pub multiplier: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff: Duration::from_millis(500),
            max_backoff: Duration::from_secs(30),
            multiplier: 2.0,
        }
    }
}

impl RetryPolicy {
    /// Execute an async operation, retrying errors that report themselves retryable.
    ///
    /// Rate-limit errors wait at least the server's `retry_after_secs`.
    pub async fn execute<F, Fut, T>(&self, mut operation: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut backoff = self.initial_backoff;
        let mut attempt = 0;

        loop {
            attempt += 1;
            let err = match operation().await {
                Ok(value) => return Ok(value),
                Err(e) => e,
            };
            if !err.is_retryable() || attempt >= self.max_attempts.max(1) {
                return Err(err);
            }

            let delay = self.delay_for(&err, backoff);
            tracing::warn!(
                attempt,
                max_attempts = self.max_attempts,
                delay_ms = delay.as_millis() as u64,
                error = %err,
                "retrying after error"
            );
            tokio::time::sleep(delay).await;

            backoff = Duration::from_secs_f64(
                (backoff.as_secs_f64() * self.multiplier).min(self.max_backoff.as_secs_f64()),
            );
        }
    }

    fn delay_for(&self, err: &ChofeshError, backoff: Duration) -> Duration {
        // Jitter: 75%-125% of backoff
        let jittered = Duration::from_secs_f64(backoff.as_secs_f64() * (0.75 + rand_factor() * 0.5));
        match err.retry_after_secs() {
            Some(secs) => jittered.max(Duration::from_secs(secs)),
            None => jittered,
        }
    }
}

/// Pseudo-random factor in [0, 1) without pulling in a rand crate.
fn rand_factor() -> f64 {
    use std::collections::hash_map::DefaultHasher;
    use std::hash::{Hash, Hasher};

    let mut hasher = DefaultHasher::new();
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos()
        .hash(&mut hasher);
    std::thread::current().id().hash(&mut hasher);

    (hasher.finish() % 10_000) as f64 / 10_000.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test(start_paused = true)]
    async fn retries_until_success() {
        let calls = &AtomicU32::new(0);
        let policy = RetryPolicy::default();
        let value = policy
            .execute(move || async move {
                if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                    Err(ChofeshError::api(502, "bad gateway"))
                } else {
                    Ok("ok")
                }
            })
            .await
            .unwrap();
        assert_eq!(value, "ok");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn does_not_retry_client_errors() {
        let calls = &AtomicU32::new(0);
        let err = RetryPolicy::default()
            .execute(move || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err::<(), _>(ChofeshError::Authentication("bad key".into()))
            })
            .await
            .unwrap_err();
        assert!(matches!(err, ChofeshError::Authentication(_)));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn rate_limit_waits_for_retry_after() {
        let calls = &AtomicU32::new(0);
        let start = tokio::time::Instant::now();
        RetryPolicy::default()
            .execute(move || async move {
                if calls.fetch_add(1, Ordering::SeqCst) == 0 {
                    Err(ChofeshError::RateLimited { retry_after_secs: Some(60) })
                } else {
                    Ok(())
                }
            })
            .await
            .unwrap();
        assert!(start.elapsed() >= Duration::from_secs(60));
    }

    #[tokio::test(start_paused = true)]
    async fn gives_up_after_max_attempts() {
        let calls = &AtomicU32::new(0);
        let policy = RetryPolicy { max_attempts: 2, ..RetryPolicy::default() };
        let err = policy
            .execute(move || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err::<(), _>(ChofeshError::Timeout(10))
            })
            .await
            .unwrap_err();
        assert!(matches!(err, ChofeshError::Timeout(10)));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}
