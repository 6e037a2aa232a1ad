//! Retry with staged backoff for provider HTTP calls.

use std::fmt::Display;
use std::time::Duration;
use tokio::time::sleep;
use tracing::warn;

/// Retry an async operation with staged backoff.
///
/// The first attempts wait `base_delays` seconds between them; after the
/// schedule is exhausted, `final_retries` more attempts run at 10 s apart.
/// Returns the first success or the last error.
pub async fn retry_with_backoff<F, Fut, T, E>(
    mut operation: F,
    base_delays: &[u64],
    final_retries: usize,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T, E>>,
    E: Display,
{
    const FINAL_DELAY_SECS: u64 = 10;

    let total = base_delays.len() + final_retries;
    let mut last_error = None;

    for attempt in 1..=total {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(e) => {
                if attempt < total {
                    let delay = base_delays
                        .get(attempt - 1)
                        .copied()
                        .unwrap_or(FINAL_DELAY_SECS);
                    warn!("Request failed (attempt {attempt}/{total}): {e}. Retrying after {delay}s...");
                    sleep(Duration::from_secs(delay)).await;
                }
                last_error = Some(e);
            }
        }
    }

    match last_error {
        Some(e) => Err(e),
        // Empty schedule: run the operation once.
        None => operation().await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test(start_paused = true)]
    async fn succeeds_on_first_attempt() {
        let attempts = Arc::new(AtomicUsize::new(0));
        let result = retry_with_backoff(
            || {
                let attempts = Arc::clone(&attempts);
                async move {
                    attempts.fetch_add(1, Ordering::SeqCst);
                    Ok::<(), String>(())
                }
            },
            &[1, 2],
            2,
        )
        .await;
        assert!(result.is_ok());
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn succeeds_after_failures() {
        let attempts = Arc::new(AtomicUsize::new(0));
        let result: Result<(), String> = retry_with_backoff(
            || {
                let attempts = Arc::clone(&attempts);
                async move {
                    let count = attempts.fetch_add(1, Ordering::SeqCst) + 1;
                    if count < 3 { Err(String::from("fail")) } else { Ok(()) }
                }
            },
            &[1, 2],
            2,
        )
        .await;
        assert!(result.is_ok());
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn fails_after_all_attempts() {
        let attempts = Arc::new(AtomicUsize::new(0));
        let result: Result<(), String> = retry_with_backoff(
            || {
                let attempts = Arc::clone(&attempts);
                async move {
                    attempts.fetch_add(1, Ordering::SeqCst);
                    Err::<(), _>(String::from("fail"))
                }
            },
            &[1, 2],
            2,
        )
        .await;
        assert!(result.is_err());
        assert_eq!(attempts.load(Ordering::SeqCst), 4); // 2 base + 2 final
    }
}
