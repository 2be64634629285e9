use std::{fmt::Display, future::Future, time::Duration};

use tokio::time::{Instant, sleep};
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Why [`poll_until`] gave up.
#[derive(Debug)]
pub enum PollError<E> {
    /// The shutdown token fired.
    Cancelled,
    /// The deadline passed after a failed attempt.
    TimedOut {
        /// Attempts made, including the last one.
        attempts: u32,
        /// Error of the last attempt.
        last_error: E,
    },
}

/// Calls `attempt` until it succeeds, sleeping `interval` between failures.
///
/// The first attempt is always made. After each failure the deadline
/// (`timeout` from the call) is checked before sleeping, so an attempt that by
/// itself outlasts the budget is not repeated. Cancellation is observed both
/// during an attempt and during the sleep.
pub async fn poll_until<T, E, F, Fut>(
    what: &str,
    shutdown: &CancellationToken,
    timeout: Duration,
    interval: Duration,
    mut attempt: F,
) -> Result<T, PollError<E>>
where
    E: Display,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let deadline = Instant::now() + timeout;
    let mut attempts = 0;

    loop {
        attempts += 1;

        let outcome = tokio::select! {
            biased;
            _ = shutdown.cancelled() => return Err(PollError::Cancelled),
            outcome = attempt() => outcome,
        };

        let last_error = match outcome {
            Ok(value) => return Ok(value),
            Err(e) => e,
        };

        if Instant::now() >= deadline {
            return Err(PollError::TimedOut {
                attempts,
                last_error,
            });
        }

        debug!(what, attempts, error = %last_error, "Not ready yet, retrying");

        tokio::select! {
            biased;
            _ = shutdown.cancelled() => return Err(PollError::Cancelled),
            _ = sleep(interval) => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use super::*;

    #[tokio::test(start_paused = true)]
    async fn returns_first_success() {
        let calls = AtomicU32::new(0);
        let counter = &calls;
        let result: Result<u32, PollError<String>> = poll_until(
            "test",
            &CancellationToken::new(),
            Duration::from_secs(1),
            Duration::from_millis(100),
            move || async move {
                let n = counter.fetch_add(1, Ordering::SeqCst) + 1;
                if n == 3 { Ok(n) } else { Err("pending".to_string()) }
            },
        )
        .await;
        assert_eq!(result.unwrap(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn slow_attempt_is_not_repeated_past_deadline() {
        let calls = AtomicU32::new(0);
        let counter = &calls;
        let result: Result<(), _> = poll_until(
            "test",
            &CancellationToken::new(),
            Duration::from_secs(1),
            Duration::from_millis(500),
            move || async move {
                counter.fetch_add(1, Ordering::SeqCst);
                sleep(Duration::from_secs(2)).await;
                Err::<(), _>("unavailable")
            },
        )
        .await;
        assert!(matches!(
            result,
            Err(PollError::TimedOut {
                attempts: 1,
                last_error: "unavailable"
            })
        ));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_interrupts_sleep() {
        let shutdown = CancellationToken::new();
        let canceller = shutdown.clone();
        tokio::spawn(async move {
            sleep(Duration::from_millis(250)).await;
            canceller.cancel();
        });

        let started = Instant::now();
        let result: Result<(), _> = poll_until(
            "test",
            &shutdown,
            Duration::from_secs(60),
            Duration::from_secs(10),
            || async { Err::<(), _>("pending") },
        )
        .await;
        assert!(matches!(result, Err(PollError::Cancelled)));
        assert!(started.elapsed() < Duration::from_secs(1));
    }
}
