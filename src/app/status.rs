//! Plain-text rendering of task snapshots for the CLI.

use crate::steering::{TaskOverview, TaskStatus};
use std::collections::BTreeMap;
use std::fmt::Write as _;

/// Render a status overview of every task: totals first, then one block per
/// task with its route and counters.
pub fn render_overview(overview: &BTreeMap<String, TaskOverview>) -> String {
    let running = overview
        .values()
        .filter(|task| task.status == TaskStatus::Running)
        .count();

    let mut out = String::new();
    let _ = writeln!(
        out,
        "Steering tasks: {} ({} running)",
        overview.len(),
        running
    );

    for (task_id, task) in overview {
        let _ = writeln!(out);
        let _ = writeln!(out, "{} [{}] — {}", task.name, task.status.as_str(), task_id);
        let _ = writeln!(out, "  route: {} -> {}", task.source_chat, task.target_chat);
        if let Some(stats) = &task.stats {
            let _ = writeln!(
                out,
                "  processed: {}  forwarded: {}  failed: {}",
                stats.messages_processed, stats.messages_forwarded, stats.messages_failed
            );
            if let Some(last) = stats.last_activity {
                let _ = writeln!(out, "  last activity: {}", last.to_rfc3339());
            }
            if let Some(error) = stats.errors.back() {
                let _ = writeln!(out, "  last error: {error}");
            }
        }
    }

    out
}
