//! Counting, fail-latching writer in front of an archive sink.
//!
//! The archive encoder may try to write again after a failure (for example
//! when it is dropped and attempts to finalize). `SinkWriter` makes sure the
//! sink sees nothing after the first rejected write or after the export has
//! been abandoned. Once abandoned, writes are accepted and discarded so the
//! encoder's drop-time finalization completes quietly.

use std::cell::Cell;
use std::io;
use std::io::Write;

/// Shared counters for a [`SinkWriter`].
///
/// Lives outside the writer so it stays readable while the encoder owns the
/// writer.
#[derive(Debug, Default)]
pub struct SinkTally {
    bytes_written: Cell<u64>,
    failed: Cell<bool>,
    abandoned: Cell<bool>,
}

impl SinkTally {
    /// Creates a fresh tally.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Total bytes the sink accepted.
    #[must_use]
    pub fn total_bytes(&self) -> u64 {
        self.bytes_written.get()
    }

    /// Returns `true` once the sink has rejected a write.
    #[must_use]
    pub fn sink_failed(&self) -> bool {
        self.failed.get()
    }

    /// Blocks every later write.
    pub fn abandon(&self) {
        self.abandoned.set(true);
    }

    /// Returns `true` if writes are blocked.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.failed.get() || self.abandoned.get()
    }
}

/// Writer that counts accepted bytes and latches the first failure.
///
/// # Examples
///
/// ```
/// use sitesnap_core::io::SinkTally;
/// use sitesnap_core::io::SinkWriter;
/// use std::io::Write;
///
/// let tally = SinkTally::new();
/// let mut buffer = Vec::new();
/// let mut writer = SinkWriter::new(&mut buffer, &tally);
///
/// writer.write_all(b"PK")?;
/// tally.abandon();
/// writer.write_all(b"discarded")?;
///
/// assert_eq!(tally.total_bytes(), 2);
/// assert_eq!(buffer, b"PK");
/// # Ok::<(), std::io::Error>(())
/// ```
pub struct SinkWriter<'a> {
    inner: &'a mut dyn Write,
    tally: &'a SinkTally,
}

impl<'a> SinkWriter<'a> {
    /// Wraps `inner`, recording into `tally`.
    pub fn new(inner: &'a mut dyn Write, tally: &'a SinkTally) -> Self {
        Self { inner, tally }
    }

    fn check_failed(&self) -> io::Result<()> {
        if self.tally.sink_failed() {
            return Err(io::Error::new(
                io::ErrorKind::BrokenPipe,
                "archive sink is closed",
            ));
        }
        Ok(())
    }
}

impl Write for SinkWriter<'_> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if self.tally.abandoned.get() {
            return Ok(buf.len());
        }
        self.check_failed()?;
        match self.inner.write(buf) {
            Ok(n) => {
                self.tally
                    .bytes_written
                    .set(self.tally.bytes_written.get() + n as u64);
                Ok(n)
            }
            Err(e) if e.kind() == io::ErrorKind::Interrupted => Err(e),
            Err(e) => {
                self.tally.failed.set(true);
                Err(e)
            }
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        if self.tally.abandoned.get() {
            return Ok(());
        }
        self.check_failed()?;
        self.inner.flush().inspect_err(|_| self.tally.failed.set(true))
    }
}
