//! Report rendering: one table row and one structured record per entry.
//!
//! Both views are regenerated wholesale on every run. Every non-excluded
//! entry appears exactly once, including entries that failed every probe
//! step; failures show up as flags and notes, never as omissions.

use arcadescan_classifier::HealthResult;
use serde_json::Value;

const HEADERS: [&str; 9] = [
    "id",
    "ready",
    "fps",
    "errors",
    "stalled",
    "no-motion",
    "no-response",
    "status",
    "note",
];

fn flag(value: bool) -> &'static str {
    if value {
        "yes"
    } else {
        "no"
    }
}

fn row(result: &HealthResult) -> [String; 9] {
    [
        result.id.to_string(),
        flag(result.ready).to_string(),
        format!("{:.1}", result.avg_fps),
        result.error_count.to_string(),
        flag(result.stalled).to_string(),
        flag(result.no_motion).to_string(),
        match result.no_response {
            Some(value) => flag(value).to_string(),
            None => "-".to_string(),
        },
        result.status.to_string(),
        result.note.clone(),
    ]
}

/// Human-readable table, columns sized to the widest cell.
pub fn render_table(results: &[HealthResult]) -> String {
    let rows: Vec<[String; 9]> = results.iter().map(row).collect();

    let mut widths: Vec<usize> = HEADERS.iter().map(|h| h.len()).collect();
    for row in &rows {
        for (i, cell) in row.iter().enumerate() {
            widths[i] = widths[i].max(cell.len());
        }
    }

    let mut out = String::new();
    let render_line = |cells: &[String]| -> String {
        let mut line = String::new();
        for (i, cell) in cells.iter().enumerate() {
            if i > 0 {
                line.push_str("  ");
            }
            line.push_str(&format!("{:<width$}", cell, width = widths[i]));
        }
        line.trim_end().to_string()
    };

    let headers: Vec<String> = HEADERS.iter().map(|h| h.to_string()).collect();
    out.push_str(&render_line(&headers));
    out.push('\n');
    let rule_len = widths.iter().sum::<usize>() + 2 * (HEADERS.len() - 1);
    out.push_str(&"-".repeat(rule_len));
    out.push('\n');

    for row in &rows {
        out.push_str(&render_line(row));
        out.push('\n');
    }
    out
}

/// Machine-readable record set, same content as the table.
pub fn render_json(results: &[HealthResult]) -> Value {
    serde_json::to_value(results).unwrap_or(Value::Array(Vec::new()))
}
