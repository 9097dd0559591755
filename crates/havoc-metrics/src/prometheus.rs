//! Prometheus text exposition format.

use crate::collector::MetricsSnapshot;

fn counter(out: &mut String, name: &str, help: &str, value: u64) {
    out.push_str(&format!("# HELP {name} {help}\n"));
    out.push_str(&format!("# TYPE {name} counter\n"));
    out.push_str(&format!("{name} {value}\n"));
}

fn gauge(out: &mut String, name: &str, help: &str, value: u64) {
    out.push_str(&format!("# HELP {name} {help}\n"));
    out.push_str(&format!("# TYPE {name} gauge\n"));
    out.push_str(&format!("{name} {value}\n"));
}

/// Render a snapshot into Prometheus text format.
///
/// Terminations carry a `namespace` label; everything else is unlabelled.
pub fn render_prometheus(snapshot: &MetricsSnapshot) -> String {
    let mut out = String::new();

    counter(&mut out, "havoc_cycles_total", "Chaos cycles run.", snapshot.cycles);
    counter(
        &mut out,
        "havoc_cycle_errors_total",
        "Chaos cycles that returned an error.",
        snapshot.cycle_errors,
    );

    out.push_str("# HELP havoc_terminations_total Instances terminated, by namespace.\n");
    out.push_str("# TYPE havoc_terminations_total counter\n");
    for (namespace, count) in &snapshot.terminations {
        out.push_str(&format!(
            "havoc_terminations_total{{namespace=\"{namespace}\"}} {count}\n"
        ));
    }

    counter(
        &mut out,
        "havoc_dry_run_victims_total",
        "Victims selected while dry-run was on; nothing was deleted.",
        snapshot.dry_runs,
    );
    counter(
        &mut out,
        "havoc_termination_failures_total",
        "Delete requests that failed.",
        snapshot.termination_failures,
    );
    counter(
        &mut out,
        "havoc_notify_failures_total",
        "Notifications that failed.",
        snapshot.notify_failures,
    );
    gauge(
        &mut out,
        "havoc_interval_seconds",
        "Current wait between cycles.",
        snapshot.interval_seconds,
    );
    gauge(
        &mut out,
        "havoc_eligible_instances",
        "Eligible instances at the last interval calculation.",
        snapshot.eligible,
    );

    out
}
