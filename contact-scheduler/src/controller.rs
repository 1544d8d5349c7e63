use crate::clock::Clock;
use crate::plan::Plan;
use crate::port::LinkConfigurator;
use crate::scheduler::{PassOutcome, PassReport, Scheduler};
use crate::timeline::Timeline;
use tracing::{info, warn};

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Mode {
    /// Run the plan once and stop
    SinglePass,
    /// Run the plan over and over, until cancelled
    Looping,
}

impl Mode {
    pub fn for_plan(plan: &Plan, force_loop: bool) -> Self {
        if plan.looping() || force_loop {
            Mode::Looping
        } else {
            Mode::SinglePass
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub completed_passes: u64,
    pub applied: usize,
    pub failed: usize,
    pub cancelled: bool,
}

impl RunSummary {
    fn track(&mut self, report: &PassReport) {
        self.applied += report.applied;
        self.failed += report.failures.len();
    }
}

/// Runs the timeline of a plan once or repeatedly, depending on the mode
///
/// Every pass is anchored to the end of the previous one (`epoch + duration`), rather than to the
/// time at which the previous pass happened to finish, so time spent configuring links does not
/// accumulate across passes.
pub struct LoopController<C, P> {
    scheduler: Scheduler<C, P>,
    max_passes: Option<u64>,
    reset_idle_links: bool,
}

impl<C: Clock, P: LinkConfigurator> LoopController<C, P> {
    pub fn new(scheduler: Scheduler<C, P>) -> Self {
        Self {
            scheduler,
            max_passes: None,
            reset_idle_links: false,
        }
    }

    /// Stops looping after the provided number of passes
    pub fn with_max_passes(mut self, max_passes: Option<u64>) -> Self {
        self.max_passes = max_passes;
        self
    }

    /// Before the first pass, clears the links that no contact covers at the epoch
    pub fn with_reset_idle_links(mut self, reset_idle_links: bool) -> Self {
        self.reset_idle_links = reset_idle_links;
        self
    }

    pub fn scheduler(&self) -> &Scheduler<C, P> {
        &self.scheduler
    }

    pub async fn run(&mut self, plan: &Plan, mode: Mode) -> RunSummary {
        let mut summary = RunSummary::default();

        // The timeline only holds offsets, so a single build serves every pass
        let timeline = Timeline::build(plan);
        if timeline.is_empty() {
            warn!("the plan has no contacts, nothing to do");
            return summary;
        }

        let mode = if mode == Mode::Looping && timeline.duration().is_zero() {
            warn!("the plan ends at its epoch, so it will only run once instead of looping");
            Mode::SinglePass
        } else {
            mode
        };

        let mut epoch = self.scheduler.clock().now();

        if self.reset_idle_links {
            let idle_links = timeline.idle_links_at_epoch();
            let outcome = self.scheduler.reset_links(&idle_links).await;
            summary.track(outcome.report());
            if let PassOutcome::Cancelled(_) = outcome {
                summary.cancelled = true;
                return summary;
            }
        }

        loop {
            let pass = summary.completed_passes + 1;
            info!(pass, ?mode, "starting pass");

            let outcome = self.scheduler.run_pass(&timeline, epoch, pass).await;
            summary.track(outcome.report());
            if let PassOutcome::Cancelled(_) = outcome {
                info!(pass, "stop requested, no further events will be applied");
                summary.cancelled = true;
                break;
            }

            summary.completed_passes += 1;
            if mode == Mode::SinglePass || self.max_passes == Some(summary.completed_passes) {
                break;
            }

            epoch += timeline.duration();
        }

        summary
    }
}
