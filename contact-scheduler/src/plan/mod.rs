//! The contact plan: a loop flag and a list of validated contacts
//!
//! Plans are immutable once constructed. They are usually parsed from the line-oriented plan file
//! format (see [`parser`]), but can also be built programmatically through [`Plan::new`].

mod link;
mod offset;
pub mod parser;

pub use link::{InvalidNodeId, LinkKey, LinkParams, NodeId};
pub use offset::Offset;
use std::time::Duration;
use thiserror::Error;

/// A planned change of the link between two nodes, lasting from `start` until `end`
#[derive(Clone, Debug, PartialEq)]
pub struct Contact {
    pub start: Offset,
    pub end: Offset,
    pub endpoint_a: NodeId,
    pub endpoint_b: NodeId,
    pub params: LinkParams,
}

impl Contact {
    pub fn link(&self) -> LinkKey {
        LinkKey::new(self.endpoint_a.clone(), self.endpoint_b.clone())
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.end <= self.start {
            return Err(ValidationError::EmptyWindow {
                start: self.start,
                end: self.end,
            });
        }

        if self.endpoint_a == self.endpoint_b {
            return Err(ValidationError::SelfContact(self.endpoint_a.clone()));
        }

        if self.params.bandwidth_bps == 0 {
            return Err(ValidationError::NonPositiveBandwidth);
        }

        let loss = self.params.loss_percent;
        if !(0.0..=100.0).contains(&loss) {
            return Err(ValidationError::LossOutOfRange(loss));
        }

        Ok(())
    }
}

#[derive(Clone, Debug, PartialEq, Error)]
pub enum ValidationError {
    #[error("unknown directive `{0}`")]
    UnknownDirective(String),
    #[error("expected between 5 and 8 contact fields, found {0}")]
    FieldCount(usize),
    #[error("the loop flag must be `0` or `1`, found `{0}`")]
    InvalidLoopFlag(String),
    #[error("malformed {field} time offset `{value}`")]
    MalformedOffset { field: &'static str, value: String },
    #[error("malformed {field} `{value}`")]
    MalformedNumber { field: &'static str, value: String },
    #[error("invalid node identifier `{0}`")]
    InvalidNode(String),
    #[error("contact ends at {end}, which is not after its start at {start}")]
    EmptyWindow { start: Offset, end: Offset },
    #[error("node {0} cannot be in contact with itself")]
    SelfContact(NodeId),
    #[error("bandwidth must be positive")]
    NonPositiveBandwidth,
    #[error("loss must be between 0 and 100 percent, found {0}")]
    LossOutOfRange(f64),
}

#[derive(Clone, Debug, PartialEq, Error)]
pub enum PlanError {
    #[error("line {line}: {source}")]
    Line {
        line: usize,
        #[source]
        source: ValidationError,
    },
    #[error("contact #{index}: {source}")]
    Contact {
        index: usize,
        #[source]
        source: ValidationError,
    },
}

#[derive(Clone, Debug, Default)]
pub struct Plan {
    looping: bool,
    contacts: Vec<Contact>,
}

impl Plan {
    /// Creates a plan, rejecting it if any of the contacts is invalid
    pub fn new(looping: bool, contacts: Vec<Contact>) -> Result<Self, PlanError> {
        for (index, contact) in contacts.iter().enumerate() {
            contact
                .validate()
                .map_err(|source| PlanError::Contact { index, source })?;
        }

        Ok(Self { looping, contacts })
    }

    pub fn looping(&self) -> bool {
        self.looping
    }

    /// The contacts, in the order in which they were defined
    pub fn contacts(&self) -> &[Contact] {
        &self.contacts
    }

    /// The length of one pass over the plan, i.e. the time until the last contact ends
    pub fn duration(&self) -> Duration {
        self.contacts
            .iter()
            .map(|c| c.end)
            .max()
            .unwrap_or_default()
            .as_duration()
    }
}
