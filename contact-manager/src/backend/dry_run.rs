use contact_scheduler::clock::{Clock, VirtualClock};
use contact_scheduler::plan::{LinkKey, LinkParams, NodeId};
use contact_scheduler::port::{ConfigError, LinkConfigurator};
use tokio::time::Instant;

/// Prints every link configuration to stdout, stamped with the time elapsed on a virtual clock
pub struct DryRunConfigurator {
    clock: VirtualClock,
    start: Instant,
}

impl DryRunConfigurator {
    pub fn new(clock: VirtualClock) -> Self {
        let start = clock.now();
        Self { clock, start }
    }

    fn line(&self, a: &NodeId, b: &NodeId, params: &LinkParams) -> String {
        let elapsed = self.clock.now() - self.start;
        let link = LinkKey::new(a.clone(), b.clone());
        format!("{:.2}s SET {link} {params}", elapsed.as_secs_f64())
    }
}

impl LinkConfigurator for DryRunConfigurator {
    async fn set_link_parameters(
        &mut self,
        a: &NodeId,
        b: &NodeId,
        params: &LinkParams,
    ) -> Result<(), ConfigError> {
        println!("{}", self.line(a, b, params));
        Ok(())
    }
}
