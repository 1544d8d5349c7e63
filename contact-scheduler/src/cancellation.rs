use std::fmt;
use tokio::sync::watch;

/// Why a run was asked to stop before running out of passes
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum StopReason {
    /// Ctrl-C
    Interrupted,
    /// SIGTERM
    Terminated,
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StopReason::Interrupted => write!(f, "interrupted"),
            StopReason::Terminated => write!(f, "terminated"),
        }
    }
}

/// Observes whether a run has been asked to stop, and why
///
/// All clones observe the same [`CancellationSignal`]. Once a stop is requested it cannot be
/// withdrawn.
#[derive(Clone)]
pub struct CancellationToken {
    stop: watch::Receiver<Option<StopReason>>,
}

impl CancellationToken {
    pub fn new() -> (Self, CancellationSignal) {
        let (tx, rx) = watch::channel(None);
        (Self { stop: rx }, CancellationSignal { tx })
    }

    /// A token that is never cancelled
    pub fn never() -> Self {
        Self::new().0
    }

    pub fn stop_reason(&self) -> Option<StopReason> {
        *self.stop.borrow()
    }

    pub fn is_cancelled(&self) -> bool {
        self.stop_reason().is_some()
    }

    /// Resolves once a stop is requested (never, if the signal is dropped without being used)
    pub async fn cancelled(&self) -> StopReason {
        let mut stop = self.stop.clone();
        loop {
            if let Some(reason) = *stop.borrow_and_update() {
                return reason;
            }

            if stop.changed().await.is_err() {
                futures::future::pending::<()>().await;
            }
        }
    }
}

/// Requests a stop from every [`CancellationToken`] created alongside it
pub struct CancellationSignal {
    tx: watch::Sender<Option<StopReason>>,
}

impl CancellationSignal {
    /// Requests a stop; only the first reason is kept if this races with another request
    pub fn cancel(self, reason: StopReason) {
        self.tx.send_if_modified(|stop| {
            if stop.is_some() {
                return false;
            }

            *stop = Some(reason);
            true
        });
    }
}
