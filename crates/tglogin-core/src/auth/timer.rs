//! Single-slot deferred renewal.

use std::future::Future;
use std::time::Duration;

use tokio::task::JoinHandle;

/// Renewal never fires sooner than this after being scheduled.
pub const MIN_RENEWAL_DELAY: Duration = Duration::from_millis(1000);

/// Delay before renewing a credential that expires in `expires_in_secs`,
/// firing `margin_secs` early but never sooner than [`MIN_RENEWAL_DELAY`].
///
/// ```
/// use std::time::Duration;
/// use tglogin_core::auth::renewal_delay;
///
/// assert_eq!(renewal_delay(3600, 60), Duration::from_millis(3_540_000));
/// assert_eq!(renewal_delay(30, 60), Duration::from_millis(1_000));
/// ```
pub fn renewal_delay(expires_in_secs: u64, margin_secs: u64) -> Duration {
    let secs = expires_in_secs.saturating_sub(margin_secs);
    Duration::from_millis(secs.saturating_mul(1000)).max(MIN_RENEWAL_DELAY)
}

struct Armed {
    generation: u64,
    delay: Duration,
    handle: JoinHandle<()>,
}

/// Holds at most one pending renewal task.
///
/// Arming aborts whatever was pending; dropping the timer aborts it too, so
/// a renewal can never fire against torn-down state.
#[derive(Default)]
pub struct RenewalTimer {
    armed: Option<Armed>,
    generation: u64,
}

impl RenewalTimer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cancel any pending task, then run `task` after `delay`.
    ///
    /// `task` receives its generation number; it should pass it to
    /// [`release`](Self::release) once it starts running so that re-arming
    /// from inside the task does not abort the task itself.
    pub fn arm<F, Fut>(&mut self, delay: Duration, task: F) -> u64
    where
        F: FnOnce(u64) -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.cancel();
        self.generation += 1;
        let generation = self.generation;
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            task(generation).await;
        });
        self.armed = Some(Armed {
            generation,
            delay,
            handle,
        });
        generation
    }

    /// Abort the pending task, if any. Returns whether one was pending.
    pub fn cancel(&mut self) -> bool {
        match self.armed.take() {
            Some(armed) => {
                armed.handle.abort();
                true
            }
            None => false,
        }
    }

    /// Forget a task that has started firing, without aborting it.
    ///
    /// Ignored if a newer task has been armed since.
    pub fn release(&mut self, generation: u64) -> bool {
        if self.armed.as_ref().map(|a| a.generation) == Some(generation) {
            self.armed = None;
            true
        } else {
            false
        }
    }

    /// Delay the pending task was scheduled with
    pub fn scheduled_delay(&self) -> Option<Duration> {
        self.armed.as_ref().map(|a| a.delay)
    }
}

impl Drop for RenewalTimer {
    fn drop(&mut self) {
        self.cancel();
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use super::*;

    #[test]
    fn test_renewal_delay() {
        assert_eq!(renewal_delay(3600, 60), Duration::from_millis(3_540_000));
        assert_eq!(renewal_delay(120, 60), Duration::from_millis(60_000));
        assert_eq!(renewal_delay(61, 60), Duration::from_millis(1_000));
        assert_eq!(renewal_delay(60, 60), Duration::from_millis(1_000));
        assert_eq!(renewal_delay(30, 60), Duration::from_millis(1_000));
        assert_eq!(renewal_delay(0, 0), Duration::from_millis(1_000));
        assert_eq!(renewal_delay(900, 0), Duration::from_secs(900));
        assert_eq!(
            renewal_delay(u64::MAX, 0),
            Duration::from_millis(u64::MAX)
        );
    }

    fn counting_task(counter: &Arc<AtomicUsize>) -> impl FnOnce(u64) -> futures::future::Ready<()> {
        let counter = Arc::clone(counter);
        move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            futures::future::ready(())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_fires_after_delay() {
        let fired = Arc::new(AtomicUsize::new(0));
        let mut timer = RenewalTimer::new();
        timer.arm(Duration::from_secs(10), counting_task(&fired));
        assert_eq!(timer.scheduled_delay(), Some(Duration::from_secs(10)));

        tokio::time::sleep(Duration::from_secs(9)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 0);

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_rearm_replaces_pending_task() {
        let first = Arc::new(AtomicUsize::new(0));
        let second = Arc::new(AtomicUsize::new(0));
        let mut timer = RenewalTimer::new();

        timer.arm(Duration::from_secs(5), counting_task(&first));
        timer.arm(Duration::from_secs(20), counting_task(&second));
        assert_eq!(timer.scheduled_delay(), Some(Duration::from_secs(20)));

        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(first.load(Ordering::SeqCst), 0);
        assert_eq!(second.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_and_drop_abort() {
        let fired = Arc::new(AtomicUsize::new(0));

        let mut timer = RenewalTimer::new();
        timer.arm(Duration::from_secs(1), counting_task(&fired));
        assert!(timer.cancel());
        assert!(!timer.cancel());
        assert_eq!(timer.scheduled_delay(), None);

        let mut dropped = RenewalTimer::new();
        dropped.arm(Duration::from_secs(1), counting_task(&fired));
        drop(dropped);

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_release_only_matches_current_generation() {
        let fired = Arc::new(AtomicUsize::new(0));
        let mut timer = RenewalTimer::new();

        let old = timer.arm(Duration::from_secs(1), counting_task(&fired));
        let current = timer.arm(Duration::from_secs(1), counting_task(&fired));

        assert!(!timer.release(old));
        assert_eq!(timer.scheduled_delay(), Some(Duration::from_secs(1)));
        assert!(timer.release(current));
        assert_eq!(timer.scheduled_delay(), None);
    }
}
