//! Streaming ZIP writer.
//!
//! Entries are written one at a time, in order, straight into the sink.
//! Nothing is seeked: every record carries a data descriptor and the
//! central directory is appended by [`ArchiveWriter::finish`].

use crate::ExportError;
use crate::Result;
use crate::config::ExportConfig;
use crate::entry::FileEntry;
use crate::entry::is_valid_archive_path;
use crate::io::SinkTally;
use crate::io::SinkWriter;
use crate::report::ExportObserver;
use crate::report::ExportWarning;
use chrono::Datelike;
use chrono::Timelike;
use chrono::Utc;
use std::io;
use std::io::Read;
use std::io::Write;
use std::time::SystemTime;
use tracing::debug;
use zip::CompressionMethod;
use zip::DateTime;
use zip::ZipWriter;
use zip::result::ZipError;
use zip::write::SimpleFileOptions;
use zip::write::StreamWriter;

/// Entries at or above this size are written with ZIP64 extensions.
pub const LARGE_FILE_THRESHOLD: u64 = 0xFFFF_FFFF;

/// Permissions recorded for every file entry.
const FILE_MODE: u32 = 0o644;

/// What happened to one entry passed to [`ArchiveWriter::write_entry`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntryOutcome {
    /// The entry is in the archive.
    Written {
        /// Uncompressed content bytes copied.
        bytes: u64,
    },

    /// The content could not be opened; nothing was written for it.
    Skipped(ExportWarning),
}

/// Writes a ZIP archive entry by entry into a sink.
///
/// Dropping the writer without calling [`finish`](Self::finish) abandons
/// the archive: the sink receives no further bytes. The encoder's own
/// finalization on drop still runs, against a writer that discards
/// everything, so it neither reaches the sink nor reports an error.
///
/// # Examples
///
/// ```
/// use sitesnap_core::ArchiveWriter;
/// use sitesnap_core::ExportConfig;
/// use sitesnap_core::FileEntry;
/// use sitesnap_core::NoopObserver;
/// use sitesnap_core::io::SinkTally;
///
/// let tally = SinkTally::new();
/// let mut out = Vec::new();
/// let mut writer = ArchiveWriter::new(&mut out, &tally, &ExportConfig::default());
///
/// let entry = FileEntry::synthetic("index.php", b"<?php".to_vec());
/// writer.write_entry(&entry, &mut NoopObserver)?;
/// let total = writer.finish()?;
///
/// assert_eq!(total, out.len() as u64);
/// # Ok::<(), sitesnap_core::ExportError>(())
/// ```
pub struct ArchiveWriter<'a> {
    zip: Option<ZipWriter<StreamWriter<SinkWriter<'a>>>>,
    tally: &'a SinkTally,
    options: SimpleFileOptions,
    buffer: Vec<u8>,
    entries_written: usize,
}

impl<'a> ArchiveWriter<'a> {
    /// Creates a writer over `sink`. Byte counts go to `tally`.
    pub fn new(sink: &'a mut dyn Write, tally: &'a SinkTally, config: &ExportConfig) -> Self {
        let zip = ZipWriter::new_stream(SinkWriter::new(sink, tally));
        Self {
            zip: Some(zip),
            tally,
            options: file_options(config.compression_level),
            buffer: vec![0u8; config.chunk_size.max(1)],
            entries_written: 0,
        }
    }

    /// Number of entries written so far.
    #[must_use]
    pub fn entries_written(&self) -> usize {
        self.entries_written
    }

    /// Writes one entry.
    ///
    /// The content source is opened first; if that fails the entry is
    /// skipped and the archive is untouched.
    ///
    /// # Errors
    ///
    /// Returns `SinkWriteFailure` if the sink rejects a write and
    /// `EncodingFailure` for anything else that leaves the record
    /// unfinishable, including a read error midway through the content.
    /// The archive is unusable after any error.
    pub fn write_entry(
        &mut self,
        entry: &FileEntry,
        observer: &mut dyn ExportObserver,
    ) -> Result<EntryOutcome> {
        if !is_valid_archive_path(&entry.relative_path) {
            return Err(ExportError::encoding(format!(
                "invalid entry name '{}'",
                entry.relative_path
            )));
        }

        let mut reader = match entry.source.open() {
            Ok(reader) => reader,
            Err(source) => {
                let error = ExportError::EntryReadFailure {
                    path: entry.display_path(),
                    source,
                };
                return Ok(EntryOutcome::Skipped(ExportWarning::new(
                    entry.display_path(),
                    error.to_string(),
                )));
            }
        };

        let tally = self.tally;
        let zip = self
            .zip
            .as_mut()
            .ok_or_else(|| ExportError::encoding("archive already finalized"))?;

        let options = self
            .options
            .last_modified_time(zip_datetime(entry.modified_at))
            .large_file(entry.size >= LARGE_FILE_THRESHOLD);

        observer.on_entry_start(&entry.relative_path, self.entries_written + 1);
        zip.start_file(entry.relative_path.as_str(), options)
            .map_err(|e| zip_failure(tally, "cannot start entry", e))?;

        let mut copied = 0u64;
        loop {
            let n = match reader.read(&mut self.buffer) {
                Ok(0) => break,
                Ok(n) => n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    return Err(ExportError::encoding(format!(
                        "read of {} failed after its record started: {e}",
                        entry.display_path().display()
                    )));
                }
            };
            zip.write_all(&self.buffer[..n])
                .map_err(|e| io_failure(tally, "cannot write entry data", e))?;
            copied += n as u64;
            observer.on_bytes_written(n as u64);
        }

        self.entries_written += 1;
        observer.on_entry_complete(&entry.relative_path);
        debug!(path = %entry.relative_path, bytes = copied, "entry written");

        Ok(EntryOutcome::Written { bytes: copied })
    }

    /// Writes the central directory and flushes the sink.
    ///
    /// Returns the total number of bytes the sink accepted.
    ///
    /// # Errors
    ///
    /// Returns `SinkWriteFailure` or `EncodingFailure` as for
    /// [`write_entry`](Self::write_entry).
    pub fn finish(mut self) -> Result<u64> {
        let tally = self.tally;
        let zip = self
            .zip
            .take()
            .ok_or_else(|| ExportError::encoding("archive already finalized"))?;
        let mut inner = zip
            .finish()
            .map_err(|e| zip_failure(tally, "cannot write central directory", e))?;
        inner
            .flush()
            .map_err(|e| io_failure(tally, "cannot flush archive", e))?;
        Ok(tally.total_bytes())
    }

    /// Stops writing without finalizing. The sink receives nothing more.
    pub fn abandon(self) {
        drop(self);
    }
}

impl Drop for ArchiveWriter<'_> {
    fn drop(&mut self) {
        if self.zip.is_some() {
            self.tally.abandon();
        }
    }
}

fn file_options(level: u8) -> SimpleFileOptions {
    let options = SimpleFileOptions::default().unix_permissions(FILE_MODE);
    if level == 0 {
        options.compression_method(CompressionMethod::Stored)
    } else {
        options
            .compression_method(CompressionMethod::Deflated)
            .compression_level(Some(i64::from(level)))
    }
}

fn io_failure(tally: &SinkTally, context: &str, error: io::Error) -> ExportError {
    if tally.sink_failed() {
        ExportError::SinkWriteFailure(error)
    } else {
        ExportError::encoding(format!("{context}: {error}"))
    }
}

fn zip_failure(tally: &SinkTally, context: &str, error: ZipError) -> ExportError {
    match error {
        ZipError::Io(error) => io_failure(tally, context, error),
        other => ExportError::encoding(format!("{context}: {other}")),
    }
}

/// Converts a modification time to a ZIP timestamp in UTC.
///
/// ZIP timestamps cover 1980 through 2107; times outside are clamped.
#[must_use]
pub fn zip_datetime(modified_at: SystemTime) -> DateTime {
    let utc = chrono::DateTime::<Utc>::from(modified_at);
    match utc.year() {
        ..=1979 => DateTime::default(),
        2108.. => DateTime::from_date_and_time(2107, 12, 31, 23, 59, 58).unwrap_or_default(),
        _ => to_dos_fields(&utc).unwrap_or_default(),
    }
}

fn to_dos_fields(utc: &chrono::DateTime<Utc>) -> Option<DateTime> {
    DateTime::from_date_and_time(
        u16::try_from(utc.year()).ok()?,
        u8::try_from(utc.month()).ok()?,
        u8::try_from(utc.day()).ok()?,
        u8::try_from(utc.hour()).ok()?,
        u8::try_from(utc.minute()).ok()?,
        u8::try_from(utc.second()).ok()?,
    )
    .ok()
}
