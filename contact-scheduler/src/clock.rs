use crate::cancellation::CancellationToken;
use futures::{FutureExt, select_biased};
use parking_lot::Mutex;
use std::cmp;
use std::sync::Arc;
use tokio::time::Instant;

/// The source of time the scheduler waits on
pub trait Clock {
    fn now(&self) -> Instant;

    /// Resolves once the clock has reached `deadline` (immediately if it is in the past)
    fn sleep_until(&self, deadline: Instant) -> impl Future<Output = ()>;
}

/// Tokio's clock, which follows the wall clock (or tokio's virtual time, when paused in tests)
#[derive(Copy, Clone, Debug, Default)]
pub struct TokioClock;

impl Clock for TokioClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    async fn sleep_until(&self, deadline: Instant) {
        tokio::time::sleep_until(deadline).await
    }
}

/// A clock that jumps straight to the deadline of every sleep
///
/// Used for dry runs, where a whole plan should be replayed without waiting for it.
#[derive(Clone, Debug)]
pub struct VirtualClock {
    now: Arc<Mutex<Instant>>,
}

impl VirtualClock {
    pub fn new(start: Instant) -> Self {
        Self {
            now: Arc::new(Mutex::new(start)),
        }
    }
}

impl Clock for VirtualClock {
    fn now(&self) -> Instant {
        *self.now.lock()
    }

    async fn sleep_until(&self, deadline: Instant) {
        {
            // Refuse to go back in time
            let mut now = self.now.lock();
            *now = cmp::max(*now, deadline);
        }

        // Give other tasks (e.g. the shutdown listener) a chance to run
        tokio::task::yield_now().await;
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Wake {
    Elapsed,
    Cancelled,
}

/// Sleeps until `deadline`, or until cancellation is requested, whichever comes first
///
/// A pending cancellation wins over an elapsed deadline.
pub async fn sleep_until_or_cancelled(
    clock: &impl Clock,
    deadline: Instant,
    cancellation: &CancellationToken,
) -> Wake {
    select_biased! {
        _ = cancellation.cancelled().fuse() => Wake::Cancelled,
        _ = clock.sleep_until(deadline).fuse() => Wake::Elapsed,
    }
}
