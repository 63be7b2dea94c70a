//! Bounded retry combinator.
//!
//! The database may come up after this service does, so pool creation is
//! retried on a fixed interval until a deadline instead of crash-looping.
//! The same policy drives the eager startup path and the lazy path taken
//! when a request arrives before startup finished.

use std::fmt;
use std::future::Future;

use casemon_core::RetryPolicy;
use tokio::time::{sleep, Instant};

/// Every attempt inside the window failed.
#[derive(Debug)]
pub struct Exhausted<E> {
    pub attempts: u32,
    pub last_error: E,
}

/// Run `attempt` until it succeeds or `policy.window` has elapsed.
///
/// At least one attempt is always made. Between failures the task sleeps for
/// `policy.interval`; no sleep is taken when the next attempt would start at
/// or past the deadline.
pub async fn retry_until_deadline<T, E, F, Fut>(
    policy: RetryPolicy,
    what: &str,
    mut attempt: F,
) -> Result<T, Exhausted<E>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: fmt::Display,
{
    // `None` means the window reaches past anything the clock can represent.
    let deadline = Instant::now().checked_add(policy.window);
    let mut attempts = 0u32;

    loop {
        attempts += 1;
        match attempt().await {
            Ok(value) => {
                if attempts > 1 {
                    tracing::info!(attempts, "{} succeeded after retrying", what);
                }
                return Ok(value);
            }
            Err(error) => {
                let next_attempt = Instant::now().checked_add(policy.interval);
                let exhausted = match (next_attempt, deadline) {
                    (_, None) => false,
                    (None, Some(_)) => true,
                    (Some(next), Some(deadline)) => next >= deadline,
                };
                if exhausted {
                    tracing::error!(attempts, error = %error, "{} failed; retry window exhausted", what);
                    return Err(Exhausted {
                        attempts,
                        last_error: error,
                    });
                }
                tracing::warn!(
                    attempts,
                    error = %error,
                    retry_in_ms = policy.interval.as_millis() as u64,
                    "{} failed; retrying",
                    what
                );
                sleep(policy.interval).await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::time::Duration;

    fn policy(window_secs: u64, interval_secs: u64) -> RetryPolicy {
        RetryPolicy {
            window: Duration::from_secs(window_secs),
            interval: Duration::from_secs(interval_secs),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn succeeds_after_transient_failures() {
        let calls = Cell::new(0u32);
        let started = Instant::now();

        let result = retry_until_deadline(policy(60, 2), "pool startup", || {
            calls.set(calls.get() + 1);
            let n = calls.get();
            async move {
                if n <= 3 {
                    Err(format!("connection refused (attempt {n})"))
                } else {
                    Ok(n)
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), 4);
        assert_eq!(calls.get(), 4);
        assert_eq!(started.elapsed(), Duration::from_secs(6));
    }

    #[tokio::test(start_paused = true)]
    async fn gives_up_at_deadline_with_last_error() {
        let calls = Cell::new(0u32);
        let started = Instant::now();

        let err = retry_until_deadline(policy(10, 2), "pool startup", || {
            calls.set(calls.get() + 1);
            let n = calls.get();
            async move { Err::<(), _>(format!("attempt {n} refused")) }
        })
        .await
        .unwrap_err();

        // attempts at t = 0, 2, 4, 6, 8
        assert_eq!(err.attempts, 5);
        assert_eq!(err.last_error, "attempt 5 refused");
        assert_eq!(started.elapsed(), Duration::from_secs(8));
    }

    #[tokio::test(start_paused = true)]
    async fn zero_window_still_attempts_once() {
        let calls = Cell::new(0u32);

        let err = retry_until_deadline(policy(0, 2), "pool startup", || {
            calls.set(calls.get() + 1);
            async { Err::<(), _>("down") }
        })
        .await
        .unwrap_err();

        assert_eq!(err.attempts, 1);
        assert_eq!(calls.get(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn unrepresentable_window_keeps_retrying() {
        let calls = Cell::new(0u32);
        let policy = RetryPolicy {
            window: Duration::MAX,
            interval: Duration::from_secs(2),
        };

        let result = retry_until_deadline(policy, "pool startup", || {
            calls.set(calls.get() + 1);
            let n = calls.get();
            async move { if n < 3 { Err("refused") } else { Ok(n) } }
        })
        .await;

        assert_eq!(result.unwrap(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn first_success_does_not_sleep() {
        let started = Instant::now();
        let value = retry_until_deadline(policy(60, 2), "probe", || async { Ok::<_, String>(7) })
            .await
            .unwrap();

        assert_eq!(value, 7);
        assert_eq!(started.elapsed(), Duration::ZERO);
    }
}
