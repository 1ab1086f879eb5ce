//! Human-readable output formatter with colors and styling.

use super::formatter::OutputFormatter;
use anyhow::Result;
use console::Term;
use console::style;
use sitesnap_core::ExportStats;

pub struct HumanFormatter {
    verbose: bool,
    quiet: bool,
    use_colors: bool,
    term: Term,
}

impl HumanFormatter {
    pub fn new(verbose: bool, quiet: bool, to_stderr: bool) -> Self {
        let (term, use_colors) = if to_stderr {
            (Term::stderr(), console::colors_enabled_stderr())
        } else {
            (Term::stdout(), console::colors_enabled())
        };
        Self {
            verbose,
            quiet,
            use_colors,
            term,
        }
    }

    #[allow(clippy::cast_precision_loss)]
    fn format_size(bytes: u64) -> String {
        const KB: u64 = 1024;
        const MB: u64 = KB * 1024;
        const GB: u64 = MB * 1024;

        if bytes >= GB {
            format!("{:.1} GB", bytes as f64 / GB as f64)
        } else if bytes >= MB {
            format!("{:.1} MB", bytes as f64 / MB as f64)
        } else if bytes >= KB {
            format!("{:.1} KB", bytes as f64 / KB as f64)
        } else {
            format!("{bytes} B")
        }
    }

    fn format_number(n: usize) -> String {
        let digits = n.to_string();
        let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
        for (i, c) in digits.chars().enumerate() {
            if i > 0 && (digits.len() - i) % 3 == 0 {
                grouped.push(',');
            }
            grouped.push(c);
        }
        grouped
    }

    /// Summary lines below the headline.
    fn summary_lines(&self, stats: &ExportStats) -> Vec<String> {
        let mut lines = vec![
            format!(
                "  Files:            {}",
                Self::format_number(stats.entries_written)
            ),
            format!("  Content read:     {}", Self::format_size(stats.bytes_read)),
            format!(
                "  Archive size:     {}",
                Self::format_size(stats.bytes_written)
            ),
        ];

        if stats.entries_skipped > 0 {
            lines.push(format!(
                "  Files skipped:    {}",
                Self::format_number(stats.entries_skipped)
            ));
        }

        if self.verbose {
            lines.push(format!(
                "  Generated files:  {}",
                stats.synthetic_entries
            ));
            lines.push(format!(
                "  Compression:      {:.1}%",
                stats.compression_percentage()
            ));
            lines.push(format!("  Duration:         {:?}", stats.duration));
        }

        lines
    }

    fn headline(&self, text: &str) -> String {
        if self.use_colors {
            format!("{} {text}", style("✓").green().bold())
        } else {
            text.to_string()
        }
    }
}

impl OutputFormatter for HumanFormatter {
    fn format_export_result(&self, destination: &str, stats: &ExportStats) -> Result<()> {
        if self.quiet {
            return Ok(());
        }

        let _ = self
            .term
            .write_line(&self.headline(&format!("Site exported: {destination}")));
        let _ = self.term.write_line("");
        for line in self.summary_lines(stats) {
            let _ = self.term.write_line(&line);
        }

        if stats.has_warnings() {
            let _ = self.term.write_line("");
            if self.use_colors {
                let _ = self
                    .term
                    .write_line(&format!("{}", style("Skipped:").yellow().bold()));
            } else {
                let _ = self.term.write_line("Skipped:");
            }
            for warning in &stats.warnings {
                let _ = self.term.write_line(&format!("  - {warning}"));
            }
        }

        Ok(())
    }

    fn format_error(&self, error: &anyhow::Error) {
        // Shown even in quiet mode, always on stderr
        let term = Term::stderr();
        if console::colors_enabled_stderr() {
            let _ = term.write_line(&format!("{} {error:?}", style("ERROR:").red().bold()));
        } else {
            let _ = term.write_line(&format!("ERROR: {error:?}"));
        }
    }

    fn format_warning(&self, message: &str) {
        if self.quiet {
            return;
        }

        if self.use_colors {
            let _ = self
                .term
                .write_line(&format!("{} {message}", style("⚠").yellow().bold()));
        } else {
            let _ = self.term.write_line(&format!("WARNING: {message}"));
        }
    }
}
