//! Abortable waits
//!
//! Every timed hold in a run races the run's cancellation token, so an abort
//! lands as soon as it is raised instead of after the hold elapses.

use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// How a hold ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Hold {
    Elapsed,
    Aborted,
}

impl Hold {
    pub fn is_aborted(self) -> bool {
        matches!(self, Hold::Aborted)
    }
}

/// Sleep for `duration` unless `token` is cancelled first
pub async fn hold(duration: Duration, token: &CancellationToken) -> Hold {
    if token.is_cancelled() {
        return Hold::Aborted;
    }
    tokio::select! {
        biased;
        _ = token.cancelled() => Hold::Aborted,
        _ = tokio::time::sleep(duration) => Hold::Elapsed,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::Instant;

    #[tokio::test(start_paused = true)]
    async fn test_hold_elapses() {
        let token = CancellationToken::new();
        let start = Instant::now();
        assert_eq!(hold(Duration::from_secs(3), &token).await, Hold::Elapsed);
        assert_eq!(start.elapsed(), Duration::from_secs(3));
    }

    #[tokio::test(start_paused = true)]
    async fn test_precancelled_returns_immediately() {
        let token = CancellationToken::new();
        token.cancel();
        let start = Instant::now();
        assert_eq!(hold(Duration::from_secs(30), &token).await, Hold::Aborted);
        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_interrupts_long_hold() {
        let token = CancellationToken::new();
        let canceller = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(2_500)).await;
            canceller.cancel();
        });

        let start = Instant::now();
        assert_eq!(hold(Duration::from_secs(30), &token).await, Hold::Aborted);
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_millis(2_500));
        assert!(elapsed < Duration::from_millis(2_600), "took {:?}", elapsed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_wakes_pending_hold() {
        let token = CancellationToken::new();
        let mut task = tokio_test::task::spawn(hold(Duration::from_secs(30), &token));
        tokio_test::assert_pending!(task.poll());

        token.cancel();
        assert!(task.is_woken());
        assert_eq!(tokio_test::assert_ready!(task.poll()), Hold::Aborted);
    }
}
