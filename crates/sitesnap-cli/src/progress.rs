//! Progress spinner for CLI exports.

use console::Term;
use indicatif::ProgressBar;
use indicatif::ProgressStyle;
use sitesnap_core::ExportObserver;
use sitesnap_core::ExportWarning;
use std::time::Duration;

/// CLI spinner implementing `ExportObserver`.
///
/// The tree is enumerated lazily, so there is no total to draw a bar
/// against: the spinner shows files done and bytes copied. Cleans up on drop.
pub struct CliProgress {
    bar: ProgressBar,
    bytes_written: u64,
}

impl CliProgress {
    #[must_use]
    pub fn new(message: &str) -> Self {
        let bar = ProgressBar::new_spinner();

        // "⠋ Exporting 42 files (15.2 MB, 3s)"
        bar.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.cyan} {prefix} {pos} files ({msg}, {elapsed})")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        bar.set_prefix(message.to_string());
        bar.set_message(humanize_bytes(0));
        bar.enable_steady_tick(Duration::from_millis(100));

        Self {
            bar,
            bytes_written: 0,
        }
    }

    /// Progress is drawn on stderr, so only show it when that is a TTY.
    #[must_use]
    pub fn should_show() -> bool {
        Term::stderr().is_term()
    }
}

impl Drop for CliProgress {
    fn drop(&mut self) {
        self.bar.finish_and_clear();
    }
}

impl ExportObserver for CliProgress {
    fn on_entry_start(&mut self, _path: &str, _index: usize) {}

    fn on_bytes_written(&mut self, bytes: u64) {
        self.bytes_written += bytes;
        self.bar.set_message(humanize_bytes(self.bytes_written));
    }

    fn on_entry_complete(&mut self, _path: &str) {
        self.bar.inc(1);
    }

    fn on_warning(&mut self, warning: &ExportWarning) {
        self.bar.println(format!("skipped {warning}"));
    }

    fn on_complete(&mut self) {
        self.bar.finish_and_clear();
    }
}

/// Converts bytes to human-readable format (KB, MB, GB, TB).
#[allow(clippy::cast_precision_loss)]
fn humanize_bytes(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;
    const TB: u64 = GB * 1024;

    if bytes >= TB {
        format!("{:.1} TB", bytes as f64 / TB as f64)
    } else if bytes >= GB {
        format!("{:.1} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.1} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.1} KB", bytes as f64 / KB as f64)
    } else {
        format!("{bytes} B")
    }
}
