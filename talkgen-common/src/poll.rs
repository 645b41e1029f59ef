//! Poll a readiness probe until it succeeds, a deadline passes, or shutdown
//! is requested.
//!
//! The deadline is computed once from the monotonic clock. Between attempts
//! the loop sleeps for a fixed interval (shortened so it never oversleeps the
//! deadline) and wakes early if the cancellation token fires. A timeout too
//! large to represent as an instant means no deadline.

use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Interval and overall timeout for a polling loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    pub interval: Duration,
    pub timeout: Duration,
}

impl PollPolicy {
    pub fn new(interval: Duration, timeout: Duration) -> Self {
        Self { interval, timeout }
    }
}

/// What a single probe attempt observed
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Probe<E> {
    /// Target is ready, stop polling
    Ready,
    /// Not ready yet, try again after the interval
    NotReady,
    /// Unrecoverable condition, stop polling immediately
    Abort(E),
}

/// How a polling loop ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollOutcome<E> {
    Ready { attempts: u32, elapsed: Duration },
    TimedOut { attempts: u32, elapsed: Duration },
    Cancelled { attempts: u32 },
    Aborted { attempts: u32, reason: E },
}

impl<E> PollOutcome<E> {
    pub fn is_ready(&self) -> bool {
        matches!(self, PollOutcome::Ready { .. })
    }

    pub fn attempts(&self) -> u32 {
        match self {
            PollOutcome::Ready { attempts, .. }
            | PollOutcome::TimedOut { attempts, .. }
            | PollOutcome::Cancelled { attempts }
            | PollOutcome::Aborted { attempts, .. } => *attempts,
        }
    }
}

/// Run `probe` until it reports ready, aborts, the policy's timeout elapses,
/// or `cancel` fires
///
/// The first attempt runs immediately. Cancellation is checked before every
/// attempt and during every sleep.
pub async fn poll_until_ready<E, F, Fut>(
    policy: PollPolicy,
    cancel: &CancellationToken,
    mut probe: F,
) -> PollOutcome<E>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Probe<E>>,
{
    let started = Instant::now();
    let deadline = started.checked_add(policy.timeout);
    let mut attempts = 0u32;

    loop {
        if cancel.is_cancelled() {
            return PollOutcome::Cancelled { attempts };
        }

        attempts += 1;
        match probe(attempts).await {
            Probe::Ready => {
                return PollOutcome::Ready {
                    attempts,
                    elapsed: started.elapsed(),
                }
            }
            Probe::Abort(reason) => return PollOutcome::Aborted { attempts, reason },
            Probe::NotReady => {}
        }

        let nap = match deadline {
            Some(deadline) => {
                let now = Instant::now();
                if now >= deadline {
                    return PollOutcome::TimedOut {
                        attempts,
                        elapsed: started.elapsed(),
                    };
                }
                policy.interval.min(deadline - now)
            }
            None => policy.interval,
        };
        tokio::select! {
            _ = cancel.cancelled() => return PollOutcome::Cancelled { attempts },
            _ = tokio::time::sleep(nap) => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::convert::Infallible;

    fn fast_policy(timeout_ms: u64) -> PollPolicy {
        PollPolicy::new(Duration::from_millis(20), Duration::from_millis(timeout_ms))
    }

    #[tokio::test]
    async fn test_ready_on_third_attempt() {
        let cancel = CancellationToken::new();
        let outcome = poll_until_ready::<Infallible, _, _>(fast_policy(1000), &cancel, |n| async move {
            if n >= 3 {
                Probe::Ready
            } else {
                Probe::NotReady
            }
        })
        .await;

        assert!(outcome.is_ready());
        assert_eq!(outcome.attempts(), 3);
    }

    #[tokio::test]
    async fn test_times_out_when_never_ready() {
        let cancel = CancellationToken::new();
        let started = std::time::Instant::now();
        let outcome =
            poll_until_ready::<Infallible, _, _>(fast_policy(150), &cancel, |_| async { Probe::NotReady })
                .await;

        assert!(matches!(outcome, PollOutcome::TimedOut { .. }));
        assert!(started.elapsed() >= Duration::from_millis(150));
        assert!(started.elapsed() < Duration::from_secs(2));
        assert!(outcome.attempts() > 1);
    }

    #[tokio::test]
    async fn test_cancelled_before_first_attempt() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let outcome =
            poll_until_ready::<Infallible, _, _>(fast_policy(1000), &cancel, |_| async { Probe::Ready })
                .await;

        assert_eq!(outcome, PollOutcome::Cancelled { attempts: 0 });
    }

    #[tokio::test]
    async fn test_cancel_interrupts_sleep() {
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            trigger.cancel();
        });

        let policy = PollPolicy::new(Duration::from_secs(10), Duration::from_secs(30));
        let started = std::time::Instant::now();
        let outcome =
            poll_until_ready::<Infallible, _, _>(policy, &cancel, |_| async { Probe::NotReady }).await;

        assert_eq!(outcome, PollOutcome::Cancelled { attempts: 1 });
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_unrepresentable_timeout_has_no_deadline() {
        let cancel = CancellationToken::new();
        let policy = PollPolicy::new(Duration::from_millis(10), Duration::from_secs(u64::MAX));
        let outcome = poll_until_ready::<Infallible, _, _>(policy, &cancel, |n| async move {
            if n >= 2 {
                Probe::Ready
            } else {
                Probe::NotReady
            }
        })
        .await;

        assert!(outcome.is_ready());
        assert_eq!(outcome.attempts(), 2);
    }

    #[tokio::test]
    async fn test_unrepresentable_timeout_still_cancels() {
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            trigger.cancel();
        });

        let policy = PollPolicy::new(Duration::from_millis(10), Duration::MAX);
        let outcome =
            poll_until_ready::<Infallible, _, _>(policy, &cancel, |_| async { Probe::NotReady }).await;

        assert!(matches!(outcome, PollOutcome::Cancelled { .. }));
    }

    #[tokio::test]
    async fn test_abort_stops_polling() {
        let cancel = CancellationToken::new();
        let outcome = poll_until_ready(fast_policy(1000), &cancel, |n| async move {
            if n == 2 {
                Probe::Abort("exited")
            } else {
                Probe::NotReady
            }
        })
        .await;

        assert_eq!(
            outcome,
            PollOutcome::Aborted {
                attempts: 2,
                reason: "exited"
            }
        );
    }
}
