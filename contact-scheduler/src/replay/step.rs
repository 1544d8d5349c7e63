use crate::plan::LinkParams;
use serde::Serialize;
use std::sync::Arc;

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ScheduleStep {
    /// The pass the step belongs to, starting at 1 (steps taken before the first pass use 0)
    pub pass: u64,
    /// The offset of the step within its pass
    pub time_ms: i64,
    #[serde(flatten)]
    pub kind: ScheduleStepKind,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase", tag = "type", content = "data")]
pub enum ScheduleStepKind {
    /// The parameters of a contact were applied to a link
    Apply(LinkChange),
    /// The link went back to its baseline because no contact covers it anymore
    Clear(LinkChange),
    /// The link was cleared before the first pass, because no contact covers it at the epoch
    Reset(LinkChange),
}

impl ScheduleStepKind {
    pub fn change(&self) -> &LinkChange {
        match self {
            ScheduleStepKind::Apply(change)
            | ScheduleStepKind::Clear(change)
            | ScheduleStepKind::Reset(change) => change,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct LinkChange {
    #[serde(with = "crate::util::serde_arc_str")]
    pub link: Arc<str>,
    pub params: LinkParams,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub contact: Option<usize>,
    /// Why the link configuration failed, if it did
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}
