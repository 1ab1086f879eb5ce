//! Destinations for the archive byte stream.
//!
//! A sink is opened once with the transport metadata, receives the archive
//! bytes in order and is closed exactly once with the export outcome.

use std::io;
use std::io::BufWriter;
use std::io::Write;
use std::path::Path;
use std::path::PathBuf;
use tempfile::NamedTempFile;

/// MIME type of the produced archive.
pub const ZIP_CONTENT_TYPE: &str = "application/zip";

/// Response metadata set before any archive byte is written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportMetadata {
    /// MIME type of the body.
    pub content_type: String,

    /// File name suggested to the client.
    pub filename: String,

    /// Body length, when known in advance. Streamed exports leave it unset.
    pub content_length: Option<u64>,
}

impl TransportMetadata {
    /// Metadata for a streamed ZIP download.
    pub fn zip(filename: impl Into<String>) -> Self {
        Self {
            content_type: ZIP_CONTENT_TYPE.to_string(),
            filename: filename.into(),
            content_length: None,
        }
    }

    /// Value for a `Content-Disposition` header.
    ///
    /// # Examples
    ///
    /// ```
    /// use sitesnap_core::TransportMetadata;
    ///
    /// let meta = TransportMetadata::zip("sandbox-site.zip");
    /// assert_eq!(
    ///     meta.content_disposition(),
    ///     "attachment; filename=\"sandbox-site.zip\""
    /// );
    /// ```
    #[must_use]
    pub fn content_disposition(&self) -> String {
        let escaped: String = self
            .filename
            .chars()
            .filter(|c| !c.is_control())
            .map(|c| if c == '"' { '\'' } else { c })
            .collect();
        format!("attachment; filename=\"{escaped}\"")
    }
}

/// How an export ended, passed to [`ArchiveSink::close`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SinkOutcome {
    /// The archive is complete and valid.
    Complete,

    /// The export failed; the bytes written so far are not a valid archive.
    Aborted,
}

/// A writable destination for one archive.
///
/// Call order is always `open`, any number of writes, then `close`.
pub trait ArchiveSink: Write {
    /// Receives the transport metadata before the first byte.
    fn open(&mut self, metadata: &TransportMetadata) -> io::Result<()>;

    /// Flushes and releases the destination.
    ///
    /// On [`SinkOutcome::Aborted`] the sink should make sure the partial
    /// bytes are not mistaken for a finished archive.
    fn close(&mut self, outcome: SinkOutcome) -> io::Result<()>;
}

/// Writes the archive to a file, replacing it only on success.
///
/// Bytes go to a temporary file next to the destination, which is renamed
/// into place on [`SinkOutcome::Complete`] and deleted otherwise.
///
/// # Examples
///
/// ```no_run
/// use sitesnap_core::ArchiveSink;
/// use sitesnap_core::FileSink;
/// use sitesnap_core::SinkOutcome;
/// use sitesnap_core::TransportMetadata;
/// use std::io::Write;
///
/// let mut sink = FileSink::new("site.zip");
/// sink.open(&TransportMetadata::zip("site.zip"))?;
/// sink.write_all(b"...")?;
/// sink.close(SinkOutcome::Complete)?;
/// # Ok::<(), std::io::Error>(())
/// ```
#[derive(Debug)]
pub struct FileSink {
    destination: PathBuf,
    staging: Option<BufWriter<NamedTempFile>>,
}

impl FileSink {
    /// Creates a sink for `destination`. Nothing touches the disk until
    /// `open`.
    pub fn new(destination: impl Into<PathBuf>) -> Self {
        Self {
            destination: destination.into(),
            staging: None,
        }
    }

    /// Final path of the archive.
    #[must_use]
    pub fn destination(&self) -> &Path {
        &self.destination
    }

    fn staging(&mut self) -> io::Result<&mut BufWriter<NamedTempFile>> {
        self.staging
            .as_mut()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotConnected, "file sink is not open"))
    }
}

impl Write for FileSink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.staging()?.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.staging()?.flush()
    }
}

impl ArchiveSink for FileSink {
    fn open(&mut self, _metadata: &TransportMetadata) -> io::Result<()> {
        let dir = match self.destination.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        let staging = NamedTempFile::new_in(dir)?;
        self.staging = Some(BufWriter::new(staging));
        Ok(())
    }

    fn close(&mut self, outcome: SinkOutcome) -> io::Result<()> {
        let Some(staging) = self.staging.take() else {
            return Ok(());
        };
        match outcome {
            SinkOutcome::Complete => {
                let staging = staging.into_inner().map_err(io::IntoInnerError::into_error)?;
                staging.as_file().sync_all()?;
                staging
                    .persist(&self.destination)
                    .map_err(|e| e.error)?;
                Ok(())
            }
            // Dropping the temp file deletes it.
            SinkOutcome::Aborted => Ok(()),
        }
    }
}

/// Streams the archive into any writer, such as a response body or stdout.
///
/// The metadata is recorded for the caller to forward as headers.
#[derive(Debug)]
pub struct WriterSink<W: Write> {
    inner: W,
    metadata: Option<TransportMetadata>,
    outcome: Option<SinkOutcome>,
}

impl<W: Write> WriterSink<W> {
    /// Wraps a writer.
    pub fn new(inner: W) -> Self {
        Self {
            inner,
            metadata: None,
            outcome: None,
        }
    }

    /// Metadata received in `open`.
    #[must_use]
    pub fn metadata(&self) -> Option<&TransportMetadata> {
        self.metadata.as_ref()
    }

    /// Outcome received in `close`.
    #[must_use]
    pub fn outcome(&self) -> Option<SinkOutcome> {
        self.outcome
    }

    /// Returns the wrapped writer.
    pub fn into_inner(self) -> W {
        self.inner
    }
}

impl<W: Write> Write for WriterSink<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.inner.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

impl<W: Write> ArchiveSink for WriterSink<W> {
    fn open(&mut self, metadata: &TransportMetadata) -> io::Result<()> {
        self.metadata = Some(metadata.clone());
        Ok(())
    }

    fn close(&mut self, outcome: SinkOutcome) -> io::Result<()> {
        self.outcome = Some(outcome);
        self.inner.flush()
    }
}

/// In-memory sink that records every call.
///
/// # Examples
///
/// ```
/// use sitesnap_core::ArchiveSink;
/// use sitesnap_core::MemorySink;
/// use sitesnap_core::SinkOutcome;
/// use sitesnap_core::TransportMetadata;
/// use std::io::Write;
///
/// let mut sink = MemorySink::new();
/// sink.open(&TransportMetadata::zip("a.zip"))?;
/// sink.write_all(b"bytes")?;
/// sink.close(SinkOutcome::Complete)?;
///
/// assert_eq!(sink.bytes(), b"bytes");
/// assert_eq!(sink.close_count(), 1);
/// # Ok::<(), std::io::Error>(())
/// ```
#[derive(Debug, Default)]
pub struct MemorySink {
    bytes: Vec<u8>,
    metadata: Option<TransportMetadata>,
    bytes_before_open: usize,
    outcome: Option<SinkOutcome>,
    close_count: usize,
}

impl MemorySink {
    /// Creates an empty sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Bytes received so far.
    #[must_use]
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Consumes the sink, returning the bytes.
    #[must_use]
    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }

    /// Metadata received in `open`.
    #[must_use]
    pub fn metadata(&self) -> Option<&TransportMetadata> {
        self.metadata.as_ref()
    }

    /// Bytes written before `open` was called; always 0 for a well-behaved
    /// pipeline.
    #[must_use]
    pub fn bytes_before_open(&self) -> usize {
        self.bytes_before_open
    }

    /// Outcome of the last `close`.
    #[must_use]
    pub fn outcome(&self) -> Option<SinkOutcome> {
        self.outcome
    }

    /// Number of times `close` was called.
    #[must_use]
    pub fn close_count(&self) -> usize {
        self.close_count
    }
}

impl Write for MemorySink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if self.metadata.is_none() {
            self.bytes_before_open += buf.len();
        }
        self.bytes.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl ArchiveSink for MemorySink {
    fn open(&mut self, metadata: &TransportMetadata) -> io::Result<()> {
        self.metadata = Some(metadata.clone());
        Ok(())
    }

    fn close(&mut self, outcome: SinkOutcome) -> io::Result<()> {
        self.outcome = Some(outcome);
        self.close_count += 1;
        Ok(())
    }
}
