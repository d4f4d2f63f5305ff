//! Output formatting for CLI

use onair_core::{LifecycleStats, LivenessReport};
use tabled::{settings::Style, Table, Tabled};

/// Output format options
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Text,
    Json,
    Table,
}

impl From<&str> for OutputFormat {
    fn from(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "json" => OutputFormat::Json,
            "table" => OutputFormat::Table,
            _ => OutputFormat::Text,
        }
    }
}

#[derive(Tabled)]
struct Row {
    #[tabled(rename = "Field")]
    field: &'static str,
    #[tabled(rename = "Value")]
    value: String,
}

fn optional(value: Option<u32>) -> String {
    value.map(|v| v.to_string()).unwrap_or_else(|| "-".to_string())
}

/// Render a liveness report in the chosen format
pub fn format_report(report: &LivenessReport, format: OutputFormat) -> anyhow::Result<String> {
    Ok(match format {
        OutputFormat::Json => serde_json::to_string_pretty(report)?,
        OutputFormat::Table => {
            let rows = vec![
                Row { field: "Live", value: report.live.to_string() },
                Row { field: "Viewers", value: optional(report.viewers) },
                Row { field: "Streams", value: optional(report.stream_count) },
            ];
            Table::new(rows).with(Style::rounded()).to_string()
        }
        OutputFormat::Text => format!(
            "Live: {}\nViewers: {}\nStreams: {}",
            if report.live { "yes" } else { "no" },
            optional(report.viewers),
            optional(report.stream_count),
        ),
    })
}

/// Summary printed when a watch ends
pub fn stats_table(stats: &LifecycleStats) -> String {
    let rows = vec![
        Row { field: "Start attempts", value: stats.start_attempts.to_string() },
        Row { field: "Fatal errors", value: stats.fatal_errors.to_string() },
        Row { field: "Retries fired", value: stats.retries_fired.to_string() },
        Row { field: "Liveness restarts", value: stats.liveness_preemptions.to_string() },
        Row { field: "Stale events", value: stats.stale_events.to_string() },
    ];
    Table::new(rows).with(Style::rounded()).to_string()
}
