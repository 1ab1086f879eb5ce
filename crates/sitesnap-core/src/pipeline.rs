//! End-to-end export: enumerate, encode, stream.

use crate::ExportError;
use crate::ExportFailure;
use crate::Result;
use crate::config::ExportConfig;
use crate::config::SandboxSettings;
use crate::io::SinkTally;
use crate::report::ExportObserver;
use crate::report::ExportStats;
use crate::report::ExportWarning;
use crate::report::NoopObserver;
use crate::sink::ArchiveSink;
use crate::sink::SinkOutcome;
use crate::sink::TransportMetadata;
use crate::snapshot::ExclusionPolicy;
use crate::snapshot::SiteEnumerator;
use crate::snapshot::SiteRoots;
use crate::snapshot::Walked;
use crate::synthetic;
use crate::synthetic::ConfigTemplate;
use crate::writer::ArchiveWriter;
use crate::writer::EntryOutcome;
use std::io::Write;
use std::time::Instant;
use tracing::debug;
use tracing::error;
use tracing::info;
use tracing::warn;

/// Exports a site installation as a ZIP archive into a sink.
///
/// The pipeline is immutable while exporting; one instance can serve
/// concurrent exports, each with its own sink.
///
/// # Examples
///
/// ```no_run
/// use sitesnap_core::ExportPipeline;
/// use sitesnap_core::FileSink;
/// use sitesnap_core::SandboxSettings;
/// use sitesnap_core::SiteRoots;
///
/// let pipeline = ExportPipeline::new(SiteRoots::site("/var/www/html", None::<&str>))
///     .exclude_path("wp-content/plugins/sitesnap")
///     .settings(SandboxSettings::new().with_site_version("6.4.2"))
///     .compression_level(9);
///
/// let mut sink = FileSink::new("sandbox-site.zip");
/// let stats = pipeline.export(&mut sink)?;
/// println!("{} entries, {} bytes", stats.entries_written, stats.bytes_written);
/// # Ok::<(), sitesnap_core::ExportFailure>(())
/// ```
#[derive(Debug, Clone, Default)]
pub struct ExportPipeline {
    roots: SiteRoots,
    policy: ExclusionPolicy,
    config: ExportConfig,
    settings: SandboxSettings,
    template: Option<ConfigTemplate>,
}

impl ExportPipeline {
    /// Creates a pipeline over `roots` with default settings.
    #[must_use]
    pub fn new(roots: SiteRoots) -> Self {
        Self {
            roots,
            ..Self::default()
        }
    }

    /// Sets the exclusion policy.
    #[must_use]
    pub fn policy(mut self, policy: ExclusionPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Excludes a subtree, given relative to the archive root.
    #[must_use]
    pub fn exclude_path(mut self, path: impl AsRef<str>) -> Self {
        self.policy = self.policy.with_excluded_path(path);
        self
    }

    /// Sets the writer configuration.
    #[must_use]
    pub fn config(mut self, config: ExportConfig) -> Self {
        self.config = config;
        self
    }

    /// Sets the compression level (0 stores, 1-9 deflates).
    #[must_use]
    pub fn compression_level(mut self, level: u8) -> Self {
        self.config.compression_level = level;
        self
    }

    /// Sets the download file name.
    #[must_use]
    pub fn archive_name(mut self, name: impl Into<String>) -> Self {
        self.config.archive_name = name.into();
        self
    }

    /// Sets the values passed to the sandbox runtime.
    #[must_use]
    pub fn settings(mut self, settings: SandboxSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Sets the configuration template rendered into the archive.
    #[must_use]
    pub fn template(mut self, template: ConfigTemplate) -> Self {
        self.template = Some(template);
        self
    }

    /// Returns the writer configuration.
    #[must_use]
    pub fn export_config(&self) -> &ExportConfig {
        &self.config
    }

    /// Returns the exclusion policy.
    #[must_use]
    pub fn exclusion_policy(&self) -> &ExclusionPolicy {
        &self.policy
    }

    /// Runs an export into `sink`.
    ///
    /// # Errors
    ///
    /// Returns an [`ExportFailure`] carrying the fatal error and the stats
    /// reached so far. Configuration and root errors are raised before the
    /// sink is opened. Any later error closes the sink as
    /// [`SinkOutcome::Aborted`].
    pub fn export(
        &self,
        sink: &mut dyn ArchiveSink,
    ) -> std::result::Result<ExportStats, ExportFailure> {
        self.export_with_observer(sink, &mut NoopObserver)
    }

    /// Runs an export, reporting progress to `observer`.
    ///
    /// # Errors
    ///
    /// See [`export`](Self::export).
    pub fn export_with_observer(
        &self,
        sink: &mut dyn ArchiveSink,
        observer: &mut dyn ExportObserver,
    ) -> std::result::Result<ExportStats, ExportFailure> {
        self.run(&self.config.archive_name, sink, observer)
    }

    pub(crate) fn run(
        &self,
        archive_name: &str,
        sink: &mut dyn ArchiveSink,
        observer: &mut dyn ExportObserver,
    ) -> std::result::Result<ExportStats, ExportFailure> {
        let start = Instant::now();

        self.config.validate()?;
        let synthetic = synthetic::build_entries(&self.settings, self.template.as_ref())?;
        let enumerator = SiteEnumerator::new(&self.roots, &self.policy, synthetic)?;

        let metadata = TransportMetadata::zip(archive_name);
        sink.open(&metadata).map_err(ExportError::SinkWriteFailure)?;
        debug!(filename = %metadata.filename, "sink opened");

        let tally = SinkTally::new();
        let mut stats = ExportStats::default();
        let result = self.stream(enumerator, &mut *sink, &tally, &mut stats, observer);
        stats.bytes_written = tally.total_bytes();
        stats.duration = start.elapsed();

        match result {
            Ok(()) => {
                if let Err(e) = sink.close(SinkOutcome::Complete) {
                    error!(error = %e, "closing sink failed");
                    return Err(ExportFailure::new(ExportError::SinkWriteFailure(e), stats));
                }
                observer.on_complete();
                info!(
                    entries = stats.entries_written,
                    synthetic = stats.synthetic_entries,
                    skipped = stats.entries_skipped,
                    bytes = stats.bytes_written,
                    duration = ?stats.duration,
                    "export complete"
                );
                Ok(stats)
            }
            Err(e) => {
                error!(
                    error = %e,
                    entries = stats.entries_written,
                    "export aborted"
                );
                if let Err(close_err) = sink.close(SinkOutcome::Aborted) {
                    warn!(error = %close_err, "closing aborted sink failed");
                }
                Err(ExportFailure::new(e, stats))
            }
        }
    }

    fn stream(
        &self,
        enumerator: SiteEnumerator,
        sink: &mut dyn Write,
        tally: &SinkTally,
        stats: &mut ExportStats,
        observer: &mut dyn ExportObserver,
    ) -> Result<()> {
        let mut writer = ArchiveWriter::new(sink, tally, &self.config);

        for step in enumerator {
            match step? {
                Walked::Skipped(warning) => record_warning(stats, observer, warning),
                Walked::Entry(entry) => match writer.write_entry(&entry, observer)? {
                    EntryOutcome::Written { bytes } => {
                        stats.entries_written += 1;
                        stats.bytes_read += bytes;
                        if entry.is_synthetic() {
                            stats.synthetic_entries += 1;
                        }
                    }
                    EntryOutcome::Skipped(warning) => record_warning(stats, observer, warning),
                },
            }
        }

        writer.finish()?;
        Ok(())
    }
}

fn record_warning(
    stats: &mut ExportStats,
    observer: &mut dyn ExportObserver,
    warning: ExportWarning,
) {
    debug!(path = %warning.path.display(), reason = %warning.message, "entry skipped");
    observer.on_warning(&warning);
    stats.add_warning(warning);
}

/// Exports `roots` with `policy` and default settings.
///
/// # Errors
///
/// See [`ExportPipeline::export`].
pub fn export(
    roots: &SiteRoots,
    policy: &ExclusionPolicy,
    sink: &mut dyn ArchiveSink,
) -> std::result::Result<ExportStats, ExportFailure> {
    ExportPipeline::new(roots.clone())
        .policy(policy.clone())
        .export(sink)
}
