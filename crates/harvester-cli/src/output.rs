//! Output formatting for the CLI.

use crate::config::OutputFormat;
use crate::error::Result;
use colored::*;
use harvester_pipeline::{HarvestConfig, RunPlan, RunReport};
use tabled::{
    builder::Builder,
    settings::{object::Columns, Alignment, Modify, Style},
};

/// Output formatter.
pub struct Formatter {
    format: OutputFormat,
    color_enabled: bool,
}

impl Formatter {
    /// Create a new formatter.
    pub fn new(format: OutputFormat, color_enabled: bool) -> Self {
        Self {
            format,
            color_enabled,
        }
    }

    /// Format the outcome of a run.
    pub fn format_report(&self, report: &RunReport) -> Result<String> {
        match self.format {
            OutputFormat::Json => {
                let fields: serde_json::Map<String, serde_json::Value> = report
                    .metrics
                    .fields
                    .iter()
                    .map(|(name, count)| (name.clone(), (*count).into()))
                    .collect();
                let value = serde_json::json!({
                    "run_id": report.run_id,
                    "pending": report.pending,
                    "succeeded": report.metrics.succeeded,
                    "failed": report.metrics.failed,
                    "skipped": report.metrics.skipped,
                    "empty": report.metrics.empty,
                    "attempts": report.metrics.attempts,
                    "fields": fields,
                    "output_rows": report.output_rows,
                    "checkpointed": report.checkpointed,
                    "unclaimed": report.unclaimed,
                    "interrupted": report.interrupted,
                    "runtime_secs": report.metrics.runtime.as_secs_f64(),
                });
                Ok(serde_json::to_string_pretty(&value)?)
            }
            OutputFormat::Quiet => Ok(format!(
                "{} {} {}",
                report.metrics.succeeded, report.metrics.failed, report.unclaimed
            )),
            OutputFormat::Table => {
                let mut rows = vec![
                    ("Run", report.run_id.clone()),
                    ("Pending at start", report.pending.to_string()),
                    ("Succeeded", report.metrics.succeeded.to_string()),
                    ("Failed", report.metrics.failed.to_string()),
                    ("Skipped", report.metrics.skipped.to_string()),
                    ("Empty pages", report.metrics.empty.to_string()),
                    ("Attempts", report.metrics.attempts.to_string()),
                    ("Output rows", report.output_rows.to_string()),
                    ("Checkpointed", report.checkpointed.to_string()),
                    ("Runtime", format!("{}s", report.metrics.runtime.as_secs())),
                ];
                if report.unclaimed > 0 {
                    rows.push(("Not started", report.unclaimed.to_string()));
                }
                let mut out = key_value_table(&rows);

                if !report.metrics.fields.is_empty() {
                    let mut builder = Builder::default();
                    builder.push_record(["Field", "Items"]);
                    for (name, count) in &report.metrics.fields {
                        builder.push_record([name.clone(), count.to_string()]);
                    }
                    let mut table = builder.build();
                    table.with(Style::rounded());
                    out.push('\n');
                    out.push_str(&table.to_string());
                }

                out.push('\n');
                out.push_str(&if report.interrupted {
                    self.warning("Interrupted; rerun to continue where this run stopped")
                } else if report.metrics.failed > 0 {
                    self.warning(&format!(
                        "{} item(s) failed; rerun to retry them",
                        report.metrics.failed
                    ))
                } else {
                    self.success("All pending items processed")
                });
                Ok(out)
            }
        }
    }

    /// Format a plan (status and dry runs).
    pub fn format_plan(&self, plan: &RunPlan, config: &HarvestConfig) -> Result<String> {
        match self.format {
            OutputFormat::Json => {
                let value = serde_json::json!({
                    "input": config.input.path.display().to_string(),
                    "output": config.output.path.display().to_string(),
                    "checkpoint": config.output.checkpoint.display().to_string(),
                    "checkpoint_kind": plan.checkpoint_kind,
                    "total": plan.total,
                    "completed": plan.completed,
                    "pending": plan.pending.len(),
                    "output_rows": plan.output_rows,
                    "checkpointed": plan.checkpointed,
                    "concurrency": config.concurrency,
                    "profile_version": config.target.version,
                });
                Ok(serde_json::to_string_pretty(&value)?)
            }
            OutputFormat::Quiet => Ok(plan.pending.len().to_string()),
            OutputFormat::Table => {
                let rows = vec![
                    ("Input", config.input.path.display().to_string()),
                    ("Output", config.output.path.display().to_string()),
                    (
                        "Checkpoint",
                        format!(
                            "{} ({})",
                            config.output.checkpoint.display(),
                            plan.checkpoint_kind
                        ),
                    ),
                    ("Catalog items", plan.total.to_string()),
                    ("Completed", plan.completed.to_string()),
                    ("Pending", plan.pending.len().to_string()),
                    ("Output rows", plan.output_rows.to_string()),
                    ("Checkpoint keys", plan.checkpointed.to_string()),
                    ("Sessions", config.concurrency.to_string()),
                    ("Profile", format!("v{}", config.target.version)),
                ];
                Ok(key_value_table(&rows))
            }
        }
    }

    /// Format a success message.
    pub fn success(&self, message: &str) -> String {
        self.colorize(&format!("✓ {}", message), "green")
    }

    /// Format an error message.
    pub fn error(&self, message: &str) -> String {
        self.colorize(&format!("✗ {}", message), "red")
    }

    /// Format an info message.
    pub fn info(&self, message: &str) -> String {
        self.colorize(&format!("ℹ {}", message), "blue")
    }

    /// Format a warning message.
    pub fn warning(&self, message: &str) -> String {
        self.colorize(&format!("⚠ {}", message), "yellow")
    }

    /// Whether output is meant for scripts rather than people.
    pub fn is_quiet(&self) -> bool {
        self.format == OutputFormat::Quiet
    }

    /// Colorize text if color is enabled.
    fn colorize(&self, text: &str, color: &str) -> String {
        if !self.color_enabled {
            return text.to_string();
        }

        match color {
            "red" => text.red().to_string(),
            "green" => text.green().to_string(),
            "blue" => text.blue().to_string(),
            "yellow" => text.yellow().to_string(),
            _ => text.to_string(),
        }
    }
}

fn key_value_table(rows: &[(&str, String)]) -> String {
    let mut builder = Builder::default();
    for (label, value) in rows {
        builder.push_record([label.to_string(), value.clone()]);
    }
    let mut table = builder.build();
    table
        .with(Style::rounded())
        .with(Modify::new(Columns::first()).with(Alignment::right()));
    table.to_string()
}
