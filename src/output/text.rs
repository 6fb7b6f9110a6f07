//! Plain-text call-tree rendering for terminal output.

use crate::output::schema::Profile;
use std::fmt::Write;

const STATEMENT_COLUMN_WIDTH: usize = 60;

/// Render a profile as an indented call-tree table.
///
/// **Public** - what the analyze command prints when no JSON output is
/// requested
pub fn render_profile(profile: &Profile) -> String {
    let mut out = String::new();

    let _ = writeln!(
        out,
        "Call tree ({} session{}, {:.1} ms captured, threshold {:.1} ms)",
        profile.session_count,
        if profile.session_count == 1 { "" } else { "s" },
        profile.max_relative_timestamp_msec,
        profile.threshold_msec,
    );
    let _ = writeln!(
        out,
        "{:<width$} {:>10} {:>10} {:>10} {:>7} {:>12}",
        "Statement",
        "Total ms",
        "Min ms",
        "Max ms",
        "Hits",
        "Last act ms",
        width = STATEMENT_COLUMN_WIDTH,
    );
    let _ = writeln!(out, "{}", "-".repeat(STATEMENT_COLUMN_WIDTH + 54));

    for node in &profile.nodes {
        let indented = indent_statement(&node.statement, node.depth);

        let _ = writeln!(
            out,
            "{:<width$} {:>10.1} {:>10.1} {:>10.1} {:>7} {:>12.1}",
            indented,
            node.duration_msec,
            node.min_duration_msec,
            node.max_duration_msec,
            node.hit_count,
            node.last_active_msec,
            width = STATEMENT_COLUMN_WIDTH,
        );
    }

    out
}

/// Indent by depth and clip to the statement column.
///
/// **Private** - keeps rows aligned no matter how long the statement is
fn indent_statement(statement: &str, depth: u32) -> String {
    let indented = format!("{}{}", "  ".repeat(depth as usize), statement);

    if indented.chars().count() <= STATEMENT_COLUMN_WIDTH {
        return indented;
    }

    let clipped: String = indented
        .chars()
        .take(STATEMENT_COLUMN_WIDTH - 3)
        .collect();
    format!("{clipped}...")
}
