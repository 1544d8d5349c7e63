use contact_scheduler::cancellation::StopReason;
use contact_scheduler::controller::RunSummary;
use contact_scheduler::plan::Plan;
use contact_scheduler::replay::ScheduleTracer;
use contact_scheduler::timeline::Timeline;
use std::collections::BTreeSet;

pub fn print_plan(plan: &Plan, timeline: &Timeline) {
    println!("--- Plan ---");
    let links: BTreeSet<_> = plan.contacts().iter().map(|c| c.link()).collect();
    println!("* Contacts: {}", plan.contacts().len());
    println!("* Links: {}", links.len());
    println!("* Events per pass: {}", timeline.events().len());
    println!("* Pass duration: {:.3}s", timeline.duration().as_secs_f64());

    let idle_links = timeline.idle_links_at_epoch();
    if !idle_links.is_empty() {
        let idle_links: Vec<_> = idle_links.iter().map(|l| l.to_string()).collect();
        println!("* Idle at start: {}", idle_links.join(", "));
    }
}

pub fn print_summary(summary: &RunSummary, stop_reason: Option<StopReason>) {
    println!("* Completed passes: {}", summary.completed_passes);
    println!("* Applied link configurations: {}", summary.applied);
    println!("* Failed link configurations: {}", summary.failed);
    match (summary.cancelled, stop_reason) {
        (true, Some(reason)) => println!("* Stopped early: {reason}"),
        (true, None) => println!("* Stopped early on request"),
        (false, _) => {}
    }
}

pub fn print_link_stats(tracer: &ScheduleTracer) {
    let stats = tracer.stats();
    if !stats.is_empty() {
        println!("--- Link stats ---");
    }
    for (link, stats) in stats {
        println!("* {link}:");
        println!("|-> Applied {} contact configurations", stats.applied);
        println!("|-> Cleared {} times", stats.cleared);
        if stats.failed > 0 {
            println!("|-> Failed {} configurations", stats.failed);
        }
    }
}
