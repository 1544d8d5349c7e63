use crate::config::topology::{DeviceRef, Topology};
use contact_scheduler::plan::{LinkParams, NodeId};
use contact_scheduler::port::{ConfigError, LinkConfigurator};
use std::time::Duration;
use tokio::process::Command;
use tracing::debug;

/// Configures links by installing a `tc netem` root qdisc on the devices at both of their ends
///
/// Every device gets the full link parameters, so traffic is shaped in both directions. The two
/// devices are configured one after the other: if the second one fails, the first one keeps the
/// new parameters, and the error names the device that is left behind.
pub struct NetemConfigurator {
    topology: Topology,
    command_timeout: Duration,
}

impl NetemConfigurator {
    pub fn new(topology: Topology, command_timeout: Duration) -> Self {
        Self {
            topology,
            command_timeout,
        }
    }

    /// Runs a `tc` command, returning its stderr if it exits with a failure status
    async fn run(&self, argv: &[String]) -> Result<Result<(), TcFailure>, ConfigError> {
        let Some((program, args)) = argv.split_first() else {
            return Ok(Ok(()));
        };

        debug!(command = %argv.join(" "), "running tc");
        let mut command = Command::new(program);
        command.args(args).kill_on_drop(true);

        let output = tokio::time::timeout(self.command_timeout, command.output())
            .await
            .map_err(|_| ConfigError::TimedOut(self.command_timeout))?
            .map_err(ConfigError::Platform)?;

        if output.status.success() {
            Ok(Ok(()))
        } else {
            Ok(Err(TcFailure {
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            }))
        }
    }

    async fn clear(&self, device: &DeviceRef) -> Result<(), ConfigError> {
        let argv = clear_command(device);
        match self.run(&argv).await? {
            Ok(()) => Ok(()),
            Err(failure) if failure.nothing_to_delete() => {
                debug!(device = %device, "no qdisc to delete, the device is already unimpaired");
                Ok(())
            }
            Err(failure) => Err(failure.into_error(device, &argv)),
        }
    }

    async fn impair(&self, device: &DeviceRef, params: &LinkParams) -> Result<(), ConfigError> {
        let argv = netem_command(device, params);
        self.run(&argv)
            .await?
            .map_err(|failure| failure.into_error(device, &argv))
    }
}

impl LinkConfigurator for NetemConfigurator {
    async fn set_link_parameters(
        &mut self,
        a: &NodeId,
        b: &NodeId,
        params: &LinkParams,
    ) -> Result<(), ConfigError> {
        let devices = self.topology.link_devices(a, b)?.clone();

        for device in &devices {
            if params.is_unimpaired() {
                self.clear(device).await?;
            } else {
                self.impair(device, params).await?;
            }
        }

        Ok(())
    }
}

/// A `tc` invocation that ran, but exited with a failure status
#[derive(Debug)]
struct TcFailure {
    status: String,
    stderr: String,
}

impl TcFailure {
    /// Whether `tc qdisc del` failed only because the device has no root qdisc to delete
    fn nothing_to_delete(&self) -> bool {
        // Recent iproute2 releases report the first message, older ones the second
        self.stderr.contains("Cannot delete qdisc with handle of zero")
            || self
                .stderr
                .starts_with("RTNETLINK answers: No such file or directory")
    }

    fn into_error(self, device: &DeviceRef, argv: &[String]) -> ConfigError {
        ConfigError::Rejected(format!(
            "device {device}: `{}` failed with {}: {}",
            argv.join(" "),
            self.status,
            self.stderr
        ))
    }
}

fn tc_prefix(device: &DeviceRef) -> Vec<String> {
    match &device.namespace {
        Some(namespace) => vec![
            "ip".into(),
            "netns".into(),
            "exec".into(),
            namespace.clone(),
            "tc".into(),
        ],
        None => vec!["tc".into()],
    }
}

fn clear_command(device: &DeviceRef) -> Vec<String> {
    let mut argv = tc_prefix(device);
    argv.extend(["qdisc", "del", "dev", device.device.as_str(), "root"].map(String::from));
    argv
}

fn netem_command(device: &DeviceRef, params: &LinkParams) -> Vec<String> {
    let mut argv = tc_prefix(device);
    argv.extend(["qdisc", "replace", "dev", device.device.as_str(), "root", "netem"].map(String::from));
    argv.extend(netem_args(params));
    argv
}

/// The `netem` parameters matching `params` (a bandwidth of zero means no rate limit)
fn netem_args(params: &LinkParams) -> Vec<String> {
    let mut args = vec!["delay".to_string(), format!("{}us", params.delay_us)];
    if params.jitter_us > 0 {
        args.push(format!("{}us", params.jitter_us));
    }

    args.extend(["loss".to_string(), format!("{}%", params.loss_percent)]);

    if params.bandwidth_bps > 0 {
        args.extend(["rate".to_string(), format!("{}bit", params.bandwidth_bps)]);
    }

    args
}
