//! Export statistics, warnings and progress reporting.

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

/// Summary of one export operation.
///
/// Returned on success, and attached to [`crate::ExportFailure`] with the
/// counts reached before the failure.
///
/// # Examples
///
/// ```
/// use sitesnap_core::ExportStats;
///
/// let mut stats = ExportStats::default();
/// stats.bytes_read = 1000;
/// stats.bytes_written = 400;
///
/// assert_eq!(stats.compression_percentage(), 60.0);
/// ```
#[derive(Debug, Clone, Default)]
pub struct ExportStats {
    /// Entries fully written to the archive, synthetic ones included.
    pub entries_written: usize,

    /// Of `entries_written`, how many were synthetic.
    pub synthetic_entries: usize,

    /// Entries skipped with a warning.
    pub entries_skipped: usize,

    /// Uncompressed content bytes copied into the archive.
    pub bytes_read: u64,

    /// Archive bytes accepted by the sink.
    pub bytes_written: u64,

    /// Wall-clock time spent on the export.
    pub duration: Duration,

    /// Recoverable problems encountered along the way.
    pub warnings: Vec<ExportWarning>,
}

impl ExportStats {
    /// Records a warning and counts the entry as skipped.
    pub fn add_warning(&mut self, warning: ExportWarning) {
        self.entries_skipped += 1;
        self.warnings.push(warning);
    }

    /// Returns whether any warnings were recorded.
    #[must_use]
    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }

    /// Returns the space saved by compression, in percent.
    ///
    /// Returns 0.0 when nothing was read.
    #[must_use]
    pub fn compression_percentage(&self) -> f64 {
        if self.bytes_read == 0 {
            return 0.0;
        }
        let saved = self.bytes_read.saturating_sub(self.bytes_written);
        saved as f64 / self.bytes_read as f64 * 100.0
    }
}

/// A recoverable problem with one path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportWarning {
    /// Filesystem path the warning refers to.
    pub path: PathBuf,

    /// Human-readable description.
    pub message: String,
}

impl ExportWarning {
    /// Creates a new warning.
    pub fn new(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ExportWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.path.display(), self.message)
    }
}

/// Callback trait for observing an export as it streams.
///
/// The total entry count is never known up front because the tree is
/// enumerated lazily.
///
/// # Examples
///
/// ```
/// use sitesnap_core::ExportObserver;
/// use sitesnap_core::ExportWarning;
///
/// struct Printer;
///
/// impl ExportObserver for Printer {
///     fn on_entry_start(&mut self, path: &str, index: usize) {
///         println!("[{index}] {path}");
///     }
///
///     fn on_bytes_written(&mut self, _bytes: u64) {}
///
///     fn on_entry_complete(&mut self, _path: &str) {}
///
///     fn on_warning(&mut self, warning: &ExportWarning) {
///         eprintln!("skipped {warning}");
///     }
///
///     fn on_complete(&mut self) {}
/// }
/// ```
pub trait ExportObserver: Send {
    /// Called before an entry's content is copied.
    ///
    /// `index` is 1-based.
    fn on_entry_start(&mut self, path: &str, index: usize);

    /// Called for each chunk of content copied into the archive.
    fn on_bytes_written(&mut self, bytes: u64);

    /// Called after an entry has been copied completely.
    fn on_entry_complete(&mut self, path: &str);

    /// Called when an entry is skipped.
    fn on_warning(&mut self, warning: &ExportWarning);

    /// Called once after the archive has been finalized.
    fn on_complete(&mut self);
}

/// Observer that ignores every event.
#[derive(Debug, Default)]
pub struct NoopObserver;

impl ExportObserver for NoopObserver {
    fn on_entry_start(&mut self, _path: &str, _index: usize) {}

    fn on_bytes_written(&mut self, _bytes: u64) {}

    fn on_entry_complete(&mut self, _path: &str) {}

    fn on_warning(&mut self, _warning: &ExportWarning) {}

    fn on_complete(&mut self) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_stats() {
        let stats = ExportStats::default();
        assert_eq!(stats.entries_written, 0);
        assert_eq!(stats.bytes_written, 0);
        assert!(!stats.has_warnings());
    }

    #[test]
    fn test_add_warning_counts_skip() {
        let mut stats = ExportStats::default();
        stats.add_warning(ExportWarning::new("/srv/site/a.txt", "permission denied"));
        assert!(stats.has_warnings());
        assert_eq!(stats.entries_skipped, 1);
        assert_eq!(
            stats.warnings[0].to_string(),
            "/srv/site/a.txt: permission denied"
        );
    }

    #[test]
    fn test_compression_percentage_edges() {
        let mut stats = ExportStats::default();
        assert!(stats.compression_percentage().abs() < f64::EPSILON);

        stats.bytes_read = 100;
        stats.bytes_written = 150;
        assert!(stats.compression_percentage().abs() < f64::EPSILON);

        stats.bytes_written = 25;
        assert!((stats.compression_percentage() - 75.0).abs() < f64::EPSILON);
    }
}
