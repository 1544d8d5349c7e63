use crate::plan::{Contact, LinkKey, LinkParams, NodeId, Offset};
use crate::port::{ConfigError, LinkConfigurator};
use bon::builder;
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::time::Instant;

pub const DEFAULT_BANDWIDTH_BPS: u64 = 100_000;

#[builder]
pub fn contact(
    start: i64,
    end: i64,
    a: u32,
    b: u32,
    bandwidth_bps: Option<u64>,
    loss_percent: Option<f64>,
    delay_us: Option<u64>,
    jitter_us: Option<u64>,
) -> Contact {
    Contact {
        start: Offset::from_secs(start),
        end: Offset::from_secs(end),
        endpoint_a: NodeId::Numeric(a),
        endpoint_b: NodeId::Numeric(b),
        params: LinkParams {
            bandwidth_bps: bandwidth_bps.unwrap_or(DEFAULT_BANDWIDTH_BPS),
            loss_percent: loss_percent.unwrap_or_default(),
            delay_us: delay_us.unwrap_or_default(),
            jitter_us: jitter_us.unwrap_or_default(),
        },
    }
}

pub fn link(a: u32, b: u32) -> LinkKey {
    LinkKey::new(NodeId::Numeric(a), NodeId::Numeric(b))
}

/// A port call, as observed by [`RecordingConfigurator`]
#[derive(Clone, Debug, PartialEq)]
pub struct RecordedCall {
    pub at: Instant,
    pub link: LinkKey,
    pub params: LinkParams,
}

/// Records every call and fails the ones targeting `failing_links`
#[derive(Clone, Default)]
pub struct RecordingConfigurator {
    pub calls: Arc<Mutex<Vec<RecordedCall>>>,
    pub failing_links: Vec<LinkKey>,
}

impl RecordingConfigurator {
    pub fn failing_on(links: Vec<LinkKey>) -> Self {
        Self {
            calls: Default::default(),
            failing_links: links,
        }
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().clone()
    }
}

impl LinkConfigurator for RecordingConfigurator {
    async fn set_link_parameters(
        &mut self,
        a: &NodeId,
        b: &NodeId,
        params: &LinkParams,
    ) -> Result<(), ConfigError> {
        let link = LinkKey::new(a.clone(), b.clone());
        self.calls.lock().push(RecordedCall {
            at: Instant::now(),
            link: link.clone(),
            params: *params,
        });

        if self.failing_links.contains(&link) {
            Err(ConfigError::LinkNotFound(a.clone(), b.clone()))
        } else {
            Ok(())
        }
    }
}
