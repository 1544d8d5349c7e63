use crate::backend::{DryRunConfigurator, NetemConfigurator};
use crate::config::cli::{CliOpt, Command};
use crate::config::topology::Topology;
use anyhow::Context;
use clap::Parser;
use contact_scheduler::cancellation::{CancellationSignal, CancellationToken, StopReason};
use contact_scheduler::clock::{Clock, TokioClock, VirtualClock};
use contact_scheduler::controller::{LoopController, Mode, RunSummary};
use contact_scheduler::plan::{LinkParams, Plan};
use contact_scheduler::port::LinkConfigurator;
use contact_scheduler::replay::ScheduleTracer;
use contact_scheduler::scheduler::Scheduler;
use contact_scheduler::timeline::Timeline;
use futures::{FutureExt, select_biased};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

mod backend;
mod config;
mod util;

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    let options = CliOpt::parse();

    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("failed to initialize tokio")?;

    rt.block_on(run(options))
}

/// How the loop controller should run, as derived from the command line
struct RunSettings {
    mode: Mode,
    max_passes: Option<u64>,
    clear_params: LinkParams,
    reset_idle_links: bool,
}

async fn run(options: CliOpt) -> anyhow::Result<()> {
    let plan = config::load_plan(&options.plan)?;
    let topology = match &options.command {
        Command::Netem(netem_options) => Some(Topology::load(&netem_options.topology)?),
        Command::DryRun => None,
    };

    let mode = Mode::for_plan(&plan, options.force_loop);
    let max_passes = match (options.passes, mode, &options.command) {
        (Some(passes), _, _) => Some(passes),
        // Without real time passing, an unbounded dry run would never end
        (None, Mode::Looping, Command::DryRun) => Some(1),
        (None, _, _) => None,
    };
    let settings = RunSettings {
        mode,
        max_passes,
        clear_params: if options.disconnect_on_clear {
            LinkParams::DISCONNECTED
        } else {
            LinkParams::BASELINE
        },
        reset_idle_links: options.reset_idle_links,
    };

    println!("--- Params ---");
    println!("* Plan path: {}", options.plan.display());
    println!("* Backend: {}", options.command.name());
    if let (Command::Netem(netem_options), Some(topology)) = (&options.command, &topology) {
        println!(
            "* Topology path: {} ({} nodes, {} links)",
            netem_options.topology.display(),
            topology.node_count(),
            topology.link_count()
        );
        println!("* Command timeout: {} ms", netem_options.command_timeout_ms);
    }
    match (mode, max_passes) {
        (Mode::SinglePass, _) => println!("* Mode: single pass"),
        (Mode::Looping, Some(passes)) => println!("* Mode: looping (at most {passes} passes)"),
        (Mode::Looping, None) => println!("* Mode: looping (until interrupted)"),
    }
    println!("* Clear params: {}", settings.clear_params);
    println!("* Reset idle links: {}", settings.reset_idle_links);

    util::print_plan(&plan, &Timeline::build(&plan));

    let tracer = Arc::new(ScheduleTracer::new());
    let (cancellation, signal) = CancellationToken::new();
    tokio::spawn(listen_for_shutdown(signal));

    let summary = match (&options.command, topology) {
        (Command::Netem(netem_options), Some(topology)) => {
            let timeout = Duration::from_millis(netem_options.command_timeout_ms);
            let port = NetemConfigurator::new(topology, timeout);
            execute(TokioClock, port, &plan, &settings, cancellation.clone(), tracer.clone()).await
        }
        _ => {
            let clock = VirtualClock::new(Instant::now());
            let port = DryRunConfigurator::new(clock.clone());
            execute(clock, port, &plan, &settings, cancellation.clone(), tracer.clone()).await
        }
    };

    util::print_summary(&summary, cancellation.stop_reason());
    util::print_link_stats(&tracer);

    if let Some(path) = &options.replay_log {
        let json = tracer.to_json().context("failed to serialize replay log")?;
        std::fs::write(path, json)
            .with_context(|| format!("failed to write replay log to `{}`", path.display()))?;
    }

    Ok(())
}

async fn execute<C: Clock, P: LinkConfigurator>(
    clock: C,
    port: P,
    plan: &Plan,
    settings: &RunSettings,
    cancellation: CancellationToken,
    tracer: Arc<ScheduleTracer>,
) -> RunSummary {
    let scheduler = Scheduler::new(clock, port, cancellation)
        .with_clear_params(settings.clear_params)
        .with_tracer(tracer);
    let mut controller = LoopController::new(scheduler)
        .with_max_passes(settings.max_passes)
        .with_reset_idle_links(settings.reset_idle_links);

    println!("--- Schedule ---");
    controller.run(plan, settings.mode).await
}

async fn listen_for_shutdown(signal: CancellationSignal) {
    let interrupted = async {
        if let Err(error) = tokio::signal::ctrl_c().await {
            warn!(%error, "unable to listen for ctrl-c, the run can only be stopped by SIGTERM");
            futures::future::pending::<()>().await;
        }
    };

    let reason = select_biased! {
        _ = interrupted.fuse() => StopReason::Interrupted,
        _ = terminated().fuse() => StopReason::Terminated,
    };

    info!(%reason, "stopping before the next link configuration");
    signal.cancel(reason);
}

cfg_if::cfg_if! {
    if #[cfg(unix)] {
        async fn terminated() {
            use tokio::signal::unix::{SignalKind, signal};

            match signal(SignalKind::terminate()) {
                Ok(mut terminate) => {
                    terminate.recv().await;
                }
                Err(error) => {
                    warn!(%error, "unable to listen for SIGTERM");
                    futures::future::pending::<()>().await;
                }
            }
        }
    } else {
        async fn terminated() {
            futures::future::pending::<()>().await;
        }
    }
}
