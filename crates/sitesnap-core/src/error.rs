//! Error types for site export operations.

use crate::report::ExportStats;
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias using `ExportError`.
pub type Result<T> = std::result::Result<T, ExportError>;

/// Errors that can occur while exporting a site snapshot.
#[derive(Error, Debug)]
pub enum ExportError {
    /// A declared root does not exist or cannot be opened.
    #[error("root directory unreadable: {}: {source}", path.display())]
    RootUnreadable {
        /// The root that could not be read.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// A single file could not be read.
    #[error("cannot read {}: {source}", path.display())]
    EntryReadFailure {
        /// Filesystem path of the file.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The destination sink rejected a write.
    #[error("sink write failed: {0}")]
    SinkWriteFailure(#[source] std::io::Error),

    /// An archive-format invariant was violated.
    #[error("archive encoding failed: {reason}")]
    EncodingFailure {
        /// What went wrong.
        reason: String,
    },

    /// Export configuration is invalid.
    #[error("invalid export configuration: {reason}")]
    InvalidConfig {
        /// What is wrong with the configuration.
        reason: String,
    },
}

impl ExportError {
    /// Returns `true` if the export can continue after this error.
    ///
    /// Only per-file read failures are recoverable; they are recorded as
    /// warnings and the entry is skipped.
    ///
    /// # Examples
    ///
    /// ```
    /// use sitesnap_core::ExportError;
    /// use std::path::PathBuf;
    ///
    /// let err = ExportError::EntryReadFailure {
    ///     path: PathBuf::from("wp-content/uploads/photo.jpg"),
    ///     source: std::io::Error::from(std::io::ErrorKind::PermissionDenied),
    /// };
    /// assert!(err.is_recoverable());
    ///
    /// let err = ExportError::SinkWriteFailure(std::io::Error::from(
    ///     std::io::ErrorKind::BrokenPipe,
    /// ));
    /// assert!(!err.is_recoverable());
    /// ```
    #[must_use]
    pub const fn is_recoverable(&self) -> bool {
        matches!(self, Self::EntryReadFailure { .. })
    }

    /// Returns `true` if this error aborts the whole export.
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        !self.is_recoverable()
    }

    /// Returns `true` if the error was raised before the sink was opened.
    ///
    /// When this holds the sink never received a byte.
    #[must_use]
    pub const fn is_preflight(&self) -> bool {
        matches!(
            self,
            Self::RootUnreadable { .. } | Self::InvalidConfig { .. }
        )
    }

    pub(crate) fn invalid_config(reason: impl Into<String>) -> Self {
        Self::InvalidConfig {
            reason: reason.into(),
        }
    }

    pub(crate) fn encoding(reason: impl Into<String>) -> Self {
        Self::EncodingFailure {
            reason: reason.into(),
        }
    }
}

/// A failed export, with everything accumulated up to the failure.
///
/// The archive bytes already delivered to the sink are incomplete and must
/// not be presented as a valid download.
#[derive(Error, Debug)]
#[error("{error}")]
pub struct ExportFailure {
    /// The fatal error that stopped the export.
    #[source]
    pub error: ExportError,

    /// Counters and warnings gathered before the failure.
    pub stats: ExportStats,
}

impl ExportFailure {
    pub(crate) fn new(error: ExportError, stats: ExportStats) -> Self {
        Self { error, stats }
    }
}

impl From<ExportError> for ExportFailure {
    fn from(error: ExportError) -> Self {
        Self::new(error, ExportStats::default())
    }
}
