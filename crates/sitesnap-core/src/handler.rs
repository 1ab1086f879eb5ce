//! Entry point for a host's "export requested" route.
//!
//! The host authenticates the caller, then hands the request and a response
//! sink to [`ExportHandler::handle`].

use crate::ExportFailure;
use crate::pipeline::ExportPipeline;
use crate::report::ExportObserver;
use crate::report::ExportStats;
use crate::report::NoopObserver;
use crate::sink::ArchiveSink;

const MAX_TARGET_LEN: usize = 64;

/// Proof that the host has checked the caller may export the site.
///
/// The library performs no permission check of its own.
#[derive(Debug)]
pub struct Authorization {
    _private: (),
}

impl Authorization {
    /// Asserts that the host's own authorization check passed.
    #[must_use]
    pub fn asserted_by_host() -> Self {
        Self { _private: () }
    }
}

/// An export request as received from the host.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExportRequest {
    /// What is being exported, used only to name the download.
    pub target: Option<String>,
}

impl ExportRequest {
    /// A request for the whole site.
    #[must_use]
    pub fn site() -> Self {
        Self::default()
    }

    /// A request naming a target, such as a plugin slug.
    pub fn for_target(target: impl Into<String>) -> Self {
        Self {
            target: Some(target.into()),
        }
    }

    /// Download file name for this request.
    ///
    /// # Examples
    ///
    /// ```
    /// use sitesnap_core::ExportRequest;
    ///
    /// assert_eq!(ExportRequest::site().archive_name(), "sandbox-site.zip");
    /// assert_eq!(
    ///     ExportRequest::for_target("My Plugin/../x").archive_name(),
    ///     "sandbox-my-plugin-x.zip"
    /// );
    /// ```
    #[must_use]
    pub fn archive_name(&self) -> String {
        let target = self
            .target
            .as_deref()
            .map(sanitize_target)
            .filter(|t| !t.is_empty())
            .unwrap_or_else(|| "site".to_string());
        format!("sandbox-{target}.zip")
    }
}

/// Reduces a target to lowercase ASCII letters, digits, `-` and `_`.
fn sanitize_target(target: &str) -> String {
    let mut out = String::with_capacity(target.len().min(MAX_TARGET_LEN));
    let mut pending_dash = false;
    for c in target.chars() {
        if !(c.is_ascii_alphanumeric() || c == '_') {
            pending_dash = !out.is_empty();
            continue;
        }
        let needed = if pending_dash { 2 } else { 1 };
        if out.len() + needed > MAX_TARGET_LEN {
            break;
        }
        if pending_dash {
            out.push('-');
            pending_dash = false;
        }
        out.push(c.to_ascii_lowercase());
    }
    out
}

/// Serves export requests with a fixed pipeline.
///
/// # Examples
///
/// ```no_run
/// use sitesnap_core::Authorization;
/// use sitesnap_core::ExportHandler;
/// use sitesnap_core::ExportPipeline;
/// use sitesnap_core::ExportRequest;
/// use sitesnap_core::SiteRoots;
/// use sitesnap_core::WriterSink;
///
/// let handler = ExportHandler::new(ExportPipeline::new(SiteRoots::site(
///     "/var/www/html",
///     None::<&str>,
/// )));
///
/// // After the host verified the caller:
/// let mut body = WriterSink::new(std::io::stdout().lock());
/// let stats = handler.handle(
///     Authorization::asserted_by_host(),
///     &ExportRequest::site(),
///     &mut body,
/// )?;
/// # Ok::<(), sitesnap_core::ExportFailure>(())
/// ```
#[derive(Debug, Clone)]
pub struct ExportHandler {
    pipeline: ExportPipeline,
}

impl ExportHandler {
    /// Creates a handler.
    #[must_use]
    pub fn new(pipeline: ExportPipeline) -> Self {
        Self { pipeline }
    }

    /// The pipeline requests are served with.
    #[must_use]
    pub fn pipeline(&self) -> &ExportPipeline {
        &self.pipeline
    }

    /// Streams the export for `request` into `sink`.
    ///
    /// # Errors
    ///
    /// See [`ExportPipeline::export`]. On failure the caller must abort the
    /// response rather than deliver the partial body.
    pub fn handle(
        &self,
        authorization: Authorization,
        request: &ExportRequest,
        sink: &mut dyn ArchiveSink,
    ) -> Result<ExportStats, ExportFailure> {
        self.handle_with_observer(authorization, request, sink, &mut NoopObserver)
    }

    /// Like [`handle`](Self::handle), reporting progress to `observer`.
    ///
    /// # Errors
    ///
    /// See [`ExportPipeline::export`].
    #[allow(clippy::needless_pass_by_value)]
    pub fn handle_with_observer(
        &self,
        _authorization: Authorization,
        request: &ExportRequest,
        sink: &mut dyn ArchiveSink,
        observer: &mut dyn ExportObserver,
    ) -> Result<ExportStats, ExportFailure> {
        tracing::info!(export_target = ?request.target, "export requested");
        self.pipeline.run(&request.archive_name(), sink, observer)
    }
}
