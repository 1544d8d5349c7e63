mod dry_run;
mod netem;

pub use dry_run::DryRunConfigurator;
pub use netem::NetemConfigurator;
