use serde::Serialize;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// A node of the emulated network, referenced either by its numeric id or by its name
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum NodeId {
    Numeric(u32),
    Named(Arc<str>),
}

#[derive(Clone, Debug, PartialEq, Eq, Error)]
#[error("`{0}` is neither a numeric node id nor a valid node name")]
pub struct InvalidNodeId(String);

impl FromStr for NodeId {
    type Err = InvalidNodeId;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || InvalidNodeId(s.to_string());
        if s.is_empty() {
            return Err(invalid());
        }

        if s.bytes().all(|b| b.is_ascii_digit()) {
            return s.parse().map(NodeId::Numeric).map_err(|_| invalid());
        }

        let valid_name = s
            .chars()
            .all(|c| c.is_alphanumeric() || matches!(c, '-' | '_' | '.'));
        if !valid_name {
            return Err(invalid());
        }

        Ok(NodeId::Named(Arc::from(s)))
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeId::Numeric(id) => write!(f, "{id}"),
            NodeId::Named(name) => write!(f, "{name}"),
        }
    }
}

/// The unordered pair of nodes a link connects
///
/// `LinkKey::new(a, b)` and `LinkKey::new(b, a)` are the same key.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct LinkKey {
    a: NodeId,
    b: NodeId,
}

impl LinkKey {
    pub fn new(x: NodeId, y: NodeId) -> Self {
        if x <= y {
            Self { a: x, b: y }
        } else {
            Self { a: y, b: x }
        }
    }

    pub fn endpoints(&self) -> (&NodeId, &NodeId) {
        (&self.a, &self.b)
    }
}

impl fmt::Display for LinkKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.a, self.b)
    }
}

/// The quality of a link, using the units of the CORE emulator's link options
#[derive(Copy, Clone, Debug, PartialEq, Serialize)]
pub struct LinkParams {
    /// Capacity in bits per second (0 means unlimited)
    pub bandwidth_bps: u64,
    /// Packet loss, in percent (between 0 and 100)
    pub loss_percent: f64,
    /// One-way delay, in microseconds
    pub delay_us: u64,
    /// Delay variation, in microseconds
    pub jitter_us: u64,
}

impl LinkParams {
    /// No impairment at all
    pub const BASELINE: LinkParams = LinkParams {
        bandwidth_bps: 0,
        loss_percent: 0.0,
        delay_us: 0,
        jitter_us: 0,
    };

    /// Every packet is lost, as if the nodes were out of contact
    pub const DISCONNECTED: LinkParams = LinkParams {
        bandwidth_bps: 0,
        loss_percent: 100.0,
        delay_us: 0,
        jitter_us: 0,
    };

    pub fn is_unimpaired(&self) -> bool {
        *self == Self::BASELINE
    }

    pub fn delay(&self) -> Duration {
        Duration::from_micros(self.delay_us)
    }

    pub fn jitter(&self) -> Duration {
        Duration::from_micros(self.jitter_us)
    }
}

impl fmt::Display for LinkParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "bandwidth={}bps loss={}% delay={}us jitter={}us",
            self.bandwidth_bps, self.loss_percent, self.delay_us, self.jitter_us
        )
    }
}
