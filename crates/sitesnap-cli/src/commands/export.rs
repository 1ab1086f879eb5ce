//! Site export command.

use crate::cli::ExportArgs;
use crate::error::convert_export_error;
use crate::output::OutputFormatter;
use crate::progress::CliProgress;
use anyhow::Result;
use anyhow::bail;
use sitesnap_core::ArchiveSink;
use sitesnap_core::Authorization;
use sitesnap_core::ConfigTemplate;
use sitesnap_core::ExclusionPolicy;
use sitesnap_core::ExportHandler;
use sitesnap_core::ExportObserver;
use sitesnap_core::ExportPipeline;
use sitesnap_core::ExportRequest;
use sitesnap_core::FileSink;
use sitesnap_core::NoopObserver;
use sitesnap_core::SandboxSettings;
use sitesnap_core::SiteRoots;
use sitesnap_core::WriterSink;
use std::io;
use std::io::BufWriter;
use std::path::Path;
use std::path::PathBuf;

/// Where the archive bytes go.
#[derive(Debug, PartialEq, Eq)]
pub enum Destination {
    Stdout,
    File(PathBuf),
}

impl Destination {
    /// Resolves `--output`, falling back to the download name.
    pub fn resolve(output: Option<&Path>, request: &ExportRequest) -> Self {
        match output {
            Some(path) if path == Path::new("-") => Self::Stdout,
            Some(path) => Self::File(path.to_path_buf()),
            None => Self::File(PathBuf::from(request.archive_name())),
        }
    }

    pub fn display(&self) -> String {
        match self {
            Self::Stdout => "<stdout>".to_string(),
            Self::File(path) => path.display().to_string(),
        }
    }
}

pub fn execute(args: &ExportArgs, formatter: &dyn OutputFormatter, show_progress: bool) -> Result<()> {
    let request = ExportRequest {
        target: args.target.clone(),
    };
    let destination = Destination::resolve(args.output.as_deref(), &request);

    if let Destination::File(path) = &destination
        && path.exists()
    {
        if !args.force {
            bail!(
                "Output file '{}' already exists\n\
                 HINT: Use --force to overwrite.",
                path.display()
            );
        }
        formatter.format_warning(&format!("Overwriting '{}'", path.display()));
    }

    let pipeline = build_pipeline(args).map_err(|e| convert_export_error(e, &args.core))?;
    let handler = ExportHandler::new(pipeline);

    let mut observer: Box<dyn ExportObserver> = if show_progress {
        Box::new(CliProgress::new("Exporting"))
    } else {
        Box::new(NoopObserver)
    };

    let result = match &destination {
        Destination::Stdout => {
            let mut sink = WriterSink::new(BufWriter::new(io::stdout().lock()));
            run(&handler, &request, &mut sink, observer.as_mut())
        }
        Destination::File(path) => {
            let mut sink = FileSink::new(path);
            run(&handler, &request, &mut sink, observer.as_mut())
        }
    };
    drop(observer);

    match result {
        Ok(stats) => formatter.format_export_result(&destination.display(), &stats),
        Err(failure) => {
            tracing::debug!(
                entries_written = failure.stats.entries_written,
                "export aborted"
            );
            Err(convert_export_error(failure.error, &args.core))
        }
    }
}

fn run(
    handler: &ExportHandler,
    request: &ExportRequest,
    sink: &mut dyn ArchiveSink,
    observer: &mut dyn ExportObserver,
) -> Result<sitesnap_core::ExportStats, sitesnap_core::ExportFailure> {
    handler.handle_with_observer(Authorization::asserted_by_host(), request, sink, observer)
}

/// Translates command-line flags into a configured pipeline.
fn build_pipeline(args: &ExportArgs) -> sitesnap_core::Result<ExportPipeline> {
    let roots = SiteRoots::site(&args.core, args.content.as_ref());

    let mut patterns = ExclusionPolicy::default().exclude_patterns;
    patterns.extend(args.exclude.iter().cloned());
    let policy = args.exclude_paths.iter().fold(
        ExclusionPolicy::new()
            .with_skip_vcs(!args.include_vcs)
            .with_include_hidden(!args.skip_hidden)
            .with_max_file_size(args.max_file_size)
            .with_exclude_patterns(patterns),
        |policy, path| policy.with_excluded_path(path),
    );

    let mut settings = SandboxSettings::new()
        .with_site_version(&args.site_version)
        .with_runtime_version(&args.runtime_version);
    if let Some(url) = &args.client_url {
        settings = settings.with_client_url(url);
    }
    if let Some(url) = &args.remote_url {
        settings = settings.with_remote_url(url);
    }
    if args.no_manifest {
        settings = settings.with_manifest_path(None);
    }
    for (name, value) in &args.vars {
        settings = settings.with_var(name, value);
    }

    let mut pipeline = ExportPipeline::new(roots)
        .policy(policy)
        .compression_level(args.compression_level)
        .settings(settings);
    if let Some(file) = &args.config_template {
        pipeline = pipeline.template(ConfigTemplate::from_file(args.config_path.clone(), file)?);
    }
    Ok(pipeline)
}
