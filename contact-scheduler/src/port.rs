use crate::plan::{LinkParams, NodeId};
use std::time::Duration;
use thiserror::Error;

/// Applies link parameters on the emulation platform
///
/// The scheduler calls this once per event and never concurrently. A failed call is reported and
/// the schedule moves on, so implementations that want retries or timeouts must handle them
/// themselves.
pub trait LinkConfigurator {
    fn set_link_parameters(
        &mut self,
        a: &NodeId,
        b: &NodeId,
        params: &LinkParams,
    ) -> impl Future<Output = Result<(), ConfigError>>;
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("node {0} not found")]
    NodeNotFound(NodeId),
    #[error("no link found between {0} and {1}")]
    LinkNotFound(NodeId, NodeId),
    #[error("configuration rejected: {0}")]
    Rejected(String),
    #[error("configuration timed out after {0:?}")]
    TimedOut(Duration),
    #[error("platform failure: {0}")]
    Platform(#[source] std::io::Error),
}
