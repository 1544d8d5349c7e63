use crate::cancellation::CancellationToken;
use crate::clock::{Clock, Wake, sleep_until_or_cancelled};
use crate::plan::{LinkKey, LinkParams, Offset};
use crate::port::{ConfigError, LinkConfigurator};
use crate::replay::{LinkChange, ScheduleStep, ScheduleStepKind, ScheduleTracer};
use crate::timeline::{Action, LinkEvent, Timeline};
use std::sync::Arc;
use tokio::time::Instant;
use tracing::{info, warn};

/// Walks the events of a timeline, waiting for each one and applying it to its link
///
/// Events are applied one at a time, in timeline order. A failure to configure a link is reported
/// and does not stop the pass.
pub struct Scheduler<C, P> {
    clock: C,
    port: P,
    cancellation: CancellationToken,
    clear_params: LinkParams,
    tracer: Arc<ScheduleTracer>,
}

#[derive(Debug)]
pub enum PassOutcome {
    Completed(PassReport),
    /// A stop was requested before the pass finished
    Cancelled(PassReport),
}

impl PassOutcome {
    pub fn report(&self) -> &PassReport {
        match self {
            PassOutcome::Completed(report) | PassOutcome::Cancelled(report) => report,
        }
    }
}

#[derive(Debug, Default)]
pub struct PassReport {
    /// The number of successful link configurations
    pub applied: usize,
    pub failures: Vec<EventFailure>,
}

#[derive(Debug)]
pub struct EventFailure {
    pub time: Offset,
    pub link: LinkKey,
    pub error: ConfigError,
}

impl<C: Clock, P: LinkConfigurator> Scheduler<C, P> {
    pub fn new(clock: C, port: P, cancellation: CancellationToken) -> Self {
        Self {
            clock,
            port,
            cancellation,
            clear_params: LinkParams::BASELINE,
            tracer: Arc::new(ScheduleTracer::new()),
        }
    }

    /// Sets the parameters applied by clear events (the unimpaired baseline by default)
    pub fn with_clear_params(mut self, params: LinkParams) -> Self {
        self.clear_params = params;
        self
    }

    pub fn with_tracer(mut self, tracer: Arc<ScheduleTracer>) -> Self {
        self.tracer = tracer;
        self
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    pub fn port(&self) -> &P {
        &self.port
    }

    pub fn tracer(&self) -> &Arc<ScheduleTracer> {
        &self.tracer
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancellation.is_cancelled()
    }

    /// Runs the events of `timeline`, with their offsets measured from `epoch`
    pub async fn run_pass(&mut self, timeline: &Timeline, epoch: Instant, pass: u64) -> PassOutcome {
        let mut report = PassReport::default();

        for event in timeline.events() {
            let due = event.time.after(epoch);
            let wake = sleep_until_or_cancelled(&self.clock, due, &self.cancellation).await;
            if wake == Wake::Cancelled {
                return PassOutcome::Cancelled(report);
            }

            let params = match event.action {
                Action::Apply => event.params,
                Action::Clear => self.clear_params,
            };

            let result = self.configure(&event.link, &params).await;
            let kind = step_kind(event, params, result.as_ref().err());
            self.tracer.record(ScheduleStep {
                pass,
                time_ms: event.time.as_millis(),
                kind,
            });

            match result {
                Ok(()) => {
                    report.applied += 1;
                    info!(
                        pass,
                        at = %event.time,
                        link = %event.link,
                        action = ?event.action,
                        %params,
                        "link configured"
                    );
                }
                Err(error) => {
                    warn!(
                        pass,
                        at = %event.time,
                        link = %event.link,
                        action = ?event.action,
                        %error,
                        "failed to configure link, moving on to the next event"
                    );
                    report.failures.push(EventFailure {
                        time: event.time,
                        link: event.link.clone(),
                        error,
                    });
                }
            }
        }

        PassOutcome::Completed(report)
    }

    /// Applies the clear parameters to the provided links right away
    pub async fn reset_links(&mut self, links: &[LinkKey]) -> PassOutcome {
        let mut report = PassReport::default();

        for link in links {
            if self.cancellation.is_cancelled() {
                return PassOutcome::Cancelled(report);
            }

            let params = self.clear_params;
            let result = self.configure(link, &params).await;
            self.tracer.record(ScheduleStep {
                pass: 0,
                time_ms: 0,
                kind: ScheduleStepKind::Reset(LinkChange {
                    link: Arc::from(link.to_string()),
                    params,
                    contact: None,
                    error: result.as_ref().err().map(|e| e.to_string()),
                }),
            });

            match result {
                Ok(()) => {
                    report.applied += 1;
                    info!(%link, %params, "idle link reset");
                }
                Err(error) => {
                    warn!(%link, %error, "failed to reset idle link");
                    report.failures.push(EventFailure {
                        time: Offset::ZERO,
                        link: link.clone(),
                        error,
                    });
                }
            }
        }

        PassOutcome::Completed(report)
    }

    async fn configure(&mut self, link: &LinkKey, params: &LinkParams) -> Result<(), ConfigError> {
        let (a, b) = link.endpoints();
        self.port.set_link_parameters(a, b, params).await
    }
}

fn step_kind(event: &LinkEvent, params: LinkParams, error: Option<&ConfigError>) -> ScheduleStepKind {
    let change = LinkChange {
        link: Arc::from(event.link.to_string()),
        params,
        contact: event.contact,
        error: error.map(|e| e.to_string()),
    };

    match event.action {
        Action::Apply => ScheduleStepKind::Apply(change),
        Action::Clear => ScheduleStepKind::Clear(change),
    }
}
