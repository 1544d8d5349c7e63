use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug, Clone)]
#[command(name = "ccm", about = "Applies a time-scheduled contact plan to the links of an emulated network")]
pub struct CliOpt {
    /// Path to the contact plan
    pub plan: PathBuf,

    /// Run the plan in a loop, even if the plan itself does not ask for it
    #[arg(long = "loop")]
    pub force_loop: bool,

    /// Stop after the provided number of passes over the plan
    ///
    /// When looping without this option, a dry run stops after a single pass and a real run goes
    /// on until interrupted
    #[arg(long, value_parser = clap::value_parser!(u64).range(1..))]
    pub passes: Option<u64>,

    /// When a contact ends, drop every packet on its link (100% loss) instead of restoring an
    /// unimpaired link
    #[arg(long)]
    pub disconnect_on_clear: bool,

    /// Before the first pass, clear the links that no contact covers at the start of the plan
    #[arg(long)]
    pub reset_idle_links: bool,

    /// Path to which the JSON replay log should be written, after the run
    #[arg(long)]
    pub replay_log: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Configure the links of network namespaces through `tc netem`
    Netem(NetemOpt),
    /// Print the link configurations instead of applying them, without waiting between events
    DryRun,
}

impl Command {
    pub fn name(&self) -> &'static str {
        match self {
            Command::Netem(_) => "netem",
            Command::DryRun => "dry-run",
        }
    }
}

#[derive(Parser, Debug, Clone)]
pub struct NetemOpt {
    /// Path to the JSON file describing the nodes and links of the emulated network
    #[arg(long)]
    pub topology: PathBuf,

    /// The deadline for a single `tc` invocation, after which the link configuration is
    /// considered failed
    #[arg(long, default_value_t = 5_000)]
    pub command_timeout_ms: u64,
}
