//! Time-scheduled link impairments for network emulation
//!
//! A [`Plan`](plan::Plan) lists contacts: time windows during which a link between two nodes gets
//! a given bandwidth, loss, delay and jitter. The [`Timeline`](timeline::Timeline) turns those
//! windows into an ordered list of apply/clear events, which the
//! [`LoopController`](controller::LoopController) replays against a
//! [`LinkConfigurator`](port::LinkConfigurator), once or in a loop.

pub mod cancellation;
pub mod clock;
pub mod controller;
pub mod plan;
pub mod port;
pub mod replay;
pub mod scheduler;
pub mod timeline;
mod util;

#[cfg(test)]
mod test_util;
