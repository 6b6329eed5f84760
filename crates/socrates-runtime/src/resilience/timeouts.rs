//! Deadline enforcement for provider calls.
//!
//! A call races its deadline and the caller's cancellation token. Whichever
//! loses, the call's future is dropped, which aborts any HTTP request it
//! still has in flight.

use std::future::Future;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Why a bounded call did not produce a value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interrupted {
    /// The deadline passed first
    TimedOut(Duration),

    /// The caller cancelled the request
    Cancelled,
}

/// Run `future` until it completes, `limit` elapses, or `cancel` fires.
pub async fn run_with_timeout<F, T>(
    limit: Duration,
    cancel: &CancellationToken,
    future: F,
) -> Result<T, Interrupted>
where
    F: Future<Output = T>,
{
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(Interrupted::Cancelled),
        outcome = tokio::time::timeout(limit, future) => {
            outcome.map_err(|_| Interrupted::TimedOut(limit))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    #[tokio::test(start_paused = true)]
    async fn test_completes_within_limit() {
        let token = CancellationToken::new();
        let value = run_with_timeout(Duration::from_secs(5), &token, async { 7 }).await;
        assert_eq!(value, Ok(7));
    }

    #[tokio::test(start_paused = true)]
    async fn test_times_out() {
        let token = CancellationToken::new();
        let outcome = run_with_timeout(Duration::from_secs(5), &token, async {
            tokio::time::sleep(Duration::from_secs(60)).await;
        })
        .await;
        assert_eq!(outcome, Err(Interrupted::TimedOut(Duration::from_secs(5))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancellation_wins() {
        let token = CancellationToken::new();
        token.cancel();
        let outcome = run_with_timeout(Duration::from_secs(5), &token, async { 1 }).await;
        assert_eq!(outcome, Err(Interrupted::Cancelled));
    }

    #[tokio::test(start_paused = true)]
    async fn test_losing_future_is_dropped() {
        struct DropFlag(Arc<AtomicBool>);
        impl Drop for DropFlag {
            fn drop(&mut self) {
                self.0.store(true, Ordering::SeqCst);
            }
        }

        let dropped = Arc::new(AtomicBool::new(false));
        let flag = DropFlag(dropped.clone());
        let token = CancellationToken::new();

        let outcome = run_with_timeout(Duration::from_millis(10), &token, async move {
            let _flag = flag;
            tokio::time::sleep(Duration::from_secs(60)).await;
        })
        .await;

        assert!(outcome.is_err());
        assert!(dropped.load(Ordering::SeqCst));
    }
}
