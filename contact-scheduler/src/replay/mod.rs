//! A record of every link configuration the scheduler performed, which can be stored as a JSON
//! replay log and summarized per link

mod step;

pub use step::{LinkChange, ScheduleStep, ScheduleStepKind};
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::sync::Arc;

#[derive(Default)]
pub struct ScheduleTracer {
    recorded_steps: Mutex<Vec<ScheduleStep>>,
}

impl ScheduleTracer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, step: ScheduleStep) {
        self.recorded_steps.lock().push(step);
    }

    pub fn steps(&self) -> Vec<ScheduleStep> {
        self.recorded_steps.lock().clone()
    }

    pub fn to_json(&self) -> serde_json::Result<Vec<u8>> {
        serde_json::to_vec_pretty(&*self.recorded_steps.lock())
    }

    pub fn stats(&self) -> BTreeMap<Arc<str>, LinkStats> {
        let mut stats: BTreeMap<Arc<str>, LinkStats> = BTreeMap::new();
        for step in self.recorded_steps.lock().iter() {
            let change = step.kind.change();
            let link_stats = stats.entry(change.link.clone()).or_default();

            if change.error.is_some() {
                link_stats.failed += 1;
                continue;
            }

            match step.kind {
                ScheduleStepKind::Apply(_) => link_stats.applied += 1,
                ScheduleStepKind::Clear(_) | ScheduleStepKind::Reset(_) => link_stats.cleared += 1,
            }
        }

        stats
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct LinkStats {
    pub applied: usize,
    pub cleared: usize,
    pub failed: usize,
}
