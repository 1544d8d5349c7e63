use anyhow::Context;
use contact_scheduler::plan::Plan;
use std::path::Path;

pub mod cli;
pub mod topology;

pub fn load_plan(path: &Path) -> anyhow::Result<Plan> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read contact plan at `{}`", path.display()))?;
    text.parse()
        .with_context(|| format!("invalid contact plan at `{}`", path.display()))
}
