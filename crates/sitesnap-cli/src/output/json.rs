//! JSON output formatter for machine-readable results.

use super::formatter::JsonOutput;
use super::formatter::OutputFormatter;
use anyhow::Result;
use serde::Serialize;
use sitesnap_core::ExportStats;
use std::io;
use std::io::Write;

pub struct JsonFormatter {
    to_stderr: bool,
}

impl JsonFormatter {
    pub const fn new(to_stderr: bool) -> Self {
        Self { to_stderr }
    }

    fn output<T: Serialize>(&self, value: &T) -> Result<()> {
        let json = serde_json::to_string_pretty(value)?;
        if self.to_stderr {
            writeln!(io::stderr(), "{json}")?;
        } else {
            writeln!(io::stdout(), "{json}")?;
        }
        Ok(())
    }
}

#[derive(Serialize)]
struct ExportOutput {
    output_path: String,
    entries_written: usize,
    synthetic_entries: usize,
    entries_skipped: usize,
    bytes_read: u64,
    bytes_written: u64,
    compression_percentage: f64,
    duration_ms: u128,
    warnings: Vec<String>,
}

impl ExportOutput {
    fn new(destination: &str, stats: &ExportStats) -> Self {
        Self {
            output_path: destination.to_string(),
            entries_written: stats.entries_written,
            synthetic_entries: stats.synthetic_entries,
            entries_skipped: stats.entries_skipped,
            bytes_read: stats.bytes_read,
            bytes_written: stats.bytes_written,
            compression_percentage: stats.compression_percentage(),
            duration_ms: stats.duration.as_millis(),
            warnings: stats.warnings.iter().map(ToString::to_string).collect(),
        }
    }
}

impl OutputFormatter for JsonFormatter {
    fn format_export_result(&self, destination: &str, stats: &ExportStats) -> Result<()> {
        let output = JsonOutput::success("export", ExportOutput::new(destination, stats));
        self.output(&output)
    }

    fn format_error(&self, error: &anyhow::Error) {
        let output = JsonOutput::error("export", format!("{error:?}"));
        let _ = self.output(&output);
    }

    fn format_warning(&self, message: &str) {
        #[derive(Serialize)]
        struct WarningData {
            message: String,
        }

        let output = JsonOutput::success(
            "warning",
            WarningData {
                message: message.to_string(),
            },
        );
        let _ = self.output(&output);
    }
}
