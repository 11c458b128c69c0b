use std::io::IsTerminal;
use std::path::Path;
use std::time::Duration;

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use serde::Serialize;
use serde_json::Value;

#[derive(Clone, Debug, Copy, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Pretty,
}

impl OutputFormat {
    pub fn default_for_stdout() -> Self {
        if std::io::stdout().is_terminal() {
            Self::Table
        } else {
            Self::Json
        }
    }
}

#[derive(Serialize)]
struct ReplyOutput<'a> {
    path: String,
    id: Option<u64>,
    elapsed_ms: u64,
    result: &'a Value,
}

pub fn print_reply(path: &Path, id: Option<u64>, result: &Value, elapsed: Duration, format: OutputFormat) {
    let elapsed_ms = elapsed.as_millis() as u64;
    match format {
        OutputFormat::Json => {
            let out = ReplyOutput {
                path: path.display().to_string(),
                id,
                elapsed_ms,
                result,
            };
            println!(
                "{}",
                serde_json::to_string(&out).unwrap_or_else(|_| "{}".to_string())
            );
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["ID", "ELAPSED", "RESULT"])
                .add_row(vec![
                    id.map(|id| id.to_string()).unwrap_or_else(|| "-".to_string()),
                    format!("{elapsed_ms}ms"),
                    result.to_string(),
                ]);
            println!("{table}");
        }
        OutputFormat::Pretty => {
            println!(
                "{}",
                serde_json::to_string_pretty(result).unwrap_or_else(|_| result.to_string())
            );
        }
    }
}

#[derive(Serialize)]
struct NotifyOutput {
    path: String,
    sent: bool,
}

pub fn print_notified(path: &Path, format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            let out = NotifyOutput {
                path: path.display().to_string(),
                sent: true,
            };
            println!(
                "{}",
                serde_json::to_string(&out).unwrap_or_else(|_| "{}".to_string())
            );
        }
        OutputFormat::Table | OutputFormat::Pretty => {
            println!("notification sent to {}", path.display());
        }
    }
}

/// One line of the `demo` report.
#[derive(Debug, Serialize)]
pub struct DemoRow {
    pub scenario: &'static str,
    pub request: Value,
    pub outcome: String,
    pub passed: bool,
}

pub fn print_demo(rows: &[DemoRow], format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            println!(
                "{}",
                serde_json::to_string(rows).unwrap_or_else(|_| "[]".to_string())
            );
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["SCENARIO", "REQUEST", "OUTCOME", "STATUS"]);
            for row in rows {
                table.add_row(vec![
                    row.scenario.to_string(),
                    row.request.to_string(),
                    row.outcome.clone(),
                    status(row.passed).to_string(),
                ]);
            }
            println!("{table}");
        }
        OutputFormat::Pretty => {
            for row in rows {
                println!(
                    "[{}] {}: {} -> {}",
                    status(row.passed),
                    row.scenario,
                    row.request,
                    row.outcome
                );
            }
        }
    }
}

fn status(passed: bool) -> &'static str {
    if passed {
        "ok"
    } else {
        "FAILED"
    }
}
