use std::future::Future;
use std::time::Duration;

use tracing::warn;

use crate::error::SyncError;

/// Attempts per transfer, full payload each time (no partial resume).
pub const MAX_ATTEMPTS: u32 = 3;

/// Fixed delay between attempts.
const RETRY_DELAY: Duration = Duration::from_secs(2);

/// Run `op` up to [`MAX_ATTEMPTS`] times, logging each failed attempt.
/// Interrupted or timed-out transfers are just failed attempts here; the
/// caller decides whether exhaustion is fatal (bootstrap) or reported
/// (steady-state watch).
pub async fn with_retry<T, F, Fut>(what: &str, mut op: F) -> Result<T, SyncError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, SyncError>>,
{
    let mut last_err = None;
    for attempt in 1..=MAX_ATTEMPTS {
        match op().await {
            Ok(value) => return Ok(value),
            Err(err) => {
                warn!(attempt, max = MAX_ATTEMPTS, "{what} failed: {err}");
                last_err = Some(err);
                if attempt < MAX_ATTEMPTS {
                    tokio::time::sleep(RETRY_DELAY).await;
                }
            }
        }
    }
    Err(last_err
        .unwrap_or_else(|| SyncError::Transfer(format!("{what}: retries exhausted"))))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test(start_paused = true)]
    async fn succeeds_on_third_attempt() {
        let calls = AtomicU32::new(0);
        let result = with_retry("upload", || {
            let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
            async move {
                if n < 3 {
                    Err(SyncError::Transfer(format!("attempt {n} broke")))
                } else {
                    Ok(n)
                }
            }
        })
        .await;
        assert_eq!(result.unwrap(), 3);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn gives_up_after_three_attempts() {
        let calls = AtomicU32::new(0);
        let result: Result<(), _> = with_retry("upload", || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(SyncError::Transfer("still broken".into())) }
        })
        .await;
        assert!(matches!(result, Err(SyncError::Transfer(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn first_success_needs_no_retry() {
        let calls = AtomicU32::new(0);
        let result = with_retry("upload", || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Ok(42u32) }
        })
        .await;
        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
