//! Error conversion utilities for CLI.
//!
//! Converts sitesnap-core's typed errors (thiserror) into user-friendly
//! contextual errors (anyhow) with actionable guidance.

use anyhow::anyhow;
use sitesnap_core::ExportError;
use std::path::Path;

/// Converts `ExportError` to user-friendly anyhow error with context
pub fn convert_export_error(err: ExportError, site: &Path) -> anyhow::Error {
    match err {
        ExportError::RootUnreadable { path, source } => {
            anyhow!(
                "Cannot read site root '{}': {}\n\
                 HINT: Check that the directory exists and is readable. Nothing was written.",
                path.display(),
                source
            )
        }
        ExportError::SinkWriteFailure(io_err) => {
            anyhow!(
                "Failed to write archive for '{}': {}\n\
                 HINT: The output is incomplete and was discarded. Check free disk space.",
                site.display(),
                io_err
            )
        }
        ExportError::EncodingFailure { reason } => {
            anyhow!(
                "Archive encoding failed for '{}': {}\n\
                 HINT: A file may have changed during export. Retry, or exclude it with --exclude-path.",
                site.display(),
                reason
            )
        }
        ExportError::InvalidConfig { reason } => {
            anyhow!(
                "Invalid export options: {reason}\n\
                 HINT: Run 'sitesnap export --help' for valid values."
            )
        }
        ExportError::EntryReadFailure { .. } => {
            anyhow::Error::from(err).context(format!("Error exporting '{}'", site.display()))
        }
    }
}
