//! Archive entry descriptors and their content sources.

use std::fmt;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::SystemTime;

/// Opens a fresh reader over some generated content.
///
/// Implementations are called at most once per export, when the writer
/// reaches the entry.
pub trait ContentProvider: Send + Sync {
    /// Opens a reader positioned at the start of the content.
    fn open(&self) -> std::io::Result<Box<dyn Read + Send>>;
}

/// Where an entry's bytes come from.
#[derive(Clone)]
pub enum ContentSource {
    /// A file on disk, opened when the entry is written.
    Disk(PathBuf),

    /// Bytes generated in memory, such as a rewritten configuration file.
    Bytes(Arc<[u8]>),

    /// A provider that produces the bytes on demand.
    Provider(Arc<dyn ContentProvider>),
}

impl ContentSource {
    /// Opens the content for reading.
    pub fn open(&self) -> std::io::Result<Box<dyn Read + Send>> {
        match self {
            Self::Disk(path) => Ok(Box::new(File::open(path)?)),
            Self::Bytes(bytes) => Ok(Box::new(std::io::Cursor::new(Arc::clone(bytes)))),
            Self::Provider(provider) => provider.open(),
        }
    }

    /// Returns the filesystem path for disk-backed content.
    #[must_use]
    pub fn disk_path(&self) -> Option<&Path> {
        match self {
            Self::Disk(path) => Some(path),
            Self::Bytes(_) | Self::Provider(_) => None,
        }
    }
}

impl fmt::Debug for ContentSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Disk(path) => f.debug_tuple("Disk").field(path).finish(),
            Self::Bytes(bytes) => write!(f, "Bytes({} bytes)", bytes.len()),
            Self::Provider(_) => f.write_str("Provider"),
        }
    }
}

/// One file destined for the archive.
///
/// `relative_path` always uses `/` separators and is unique within an
/// export.
#[derive(Debug, Clone)]
pub struct FileEntry {
    /// Path inside the archive.
    pub relative_path: String,

    /// Size in bytes as observed when the entry was enumerated.
    pub size: u64,

    /// Last modification time.
    pub modified_at: SystemTime,

    /// Where the content is read from.
    pub source: ContentSource,
}

impl FileEntry {
    /// Creates a synthetic entry whose content lives in memory.
    ///
    /// # Examples
    ///
    /// ```
    /// use sitesnap_core::FileEntry;
    ///
    /// let entry = FileEntry::synthetic("wp-config.php", b"<?php // sandbox".to_vec());
    /// assert!(entry.is_synthetic());
    /// assert_eq!(entry.size, 16);
    /// ```
    pub fn synthetic(relative_path: impl Into<String>, content: impl Into<Vec<u8>>) -> Self {
        let content: Vec<u8> = content.into();
        Self {
            relative_path: relative_path.into(),
            size: content.len() as u64,
            modified_at: SystemTime::now(),
            source: ContentSource::Bytes(content.into()),
        }
    }

    /// Sets the modification time.
    #[must_use]
    pub fn with_modified_at(mut self, modified_at: SystemTime) -> Self {
        self.modified_at = modified_at;
        self
    }

    /// Returns `true` if the content is generated rather than read from disk.
    #[must_use]
    pub fn is_synthetic(&self) -> bool {
        !matches!(self.source, ContentSource::Disk(_))
    }

    /// Path to report in warnings: the disk path when there is one.
    #[must_use]
    pub fn display_path(&self) -> PathBuf {
        self.source
            .disk_path()
            .map_or_else(|| PathBuf::from(&self.relative_path), Path::to_path_buf)
    }
}

/// Checks that a path is usable as an archive entry name.
///
/// Valid names are non-empty, relative, `/`-separated and contain no empty,
/// `.` or `..` components.
///
/// # Examples
///
/// ```
/// use sitesnap_core::entry::is_valid_archive_path;
///
/// assert!(is_valid_archive_path("wp-content/themes/style.css"));
/// assert!(!is_valid_archive_path("/etc/passwd"));
/// assert!(!is_valid_archive_path("wp-content/../wp-config.php"));
/// assert!(!is_valid_archive_path("dir\\file.txt"));
/// ```
#[must_use]
pub fn is_valid_archive_path(path: &str) -> bool {
    !path.is_empty()
        && !path.contains('\\')
        && path
            .split('/')
            .all(|component| !component.is_empty() && component != "." && component != "..")
}
