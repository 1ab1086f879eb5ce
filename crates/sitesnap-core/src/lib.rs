//! Streaming site snapshot export.
//!
//! `sitesnap-core` walks a site installation (core files and content
//! directory), adds generated files for a sandbox runtime, and streams
//! everything as a ZIP archive into a sink without holding the site in
//! memory.
//!
//! # Examples
//!
//! ```no_run
//! use sitesnap_core::ExportPipeline;
//! use sitesnap_core::FileSink;
//! use sitesnap_core::SiteRoots;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let roots = SiteRoots::site("/var/www/html", Some("/var/www/html/wp-content"));
//! let pipeline = ExportPipeline::new(roots).exclude_path("wp-content/plugins/sitesnap");
//!
//! let mut sink = FileSink::new("sandbox-site.zip");
//! let stats = pipeline.export(&mut sink)?;
//! println!("Exported {} files", stats.entries_written);
//! # Ok(())
//! # }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod config;
pub mod entry;
pub mod error;
pub mod handler;
pub mod io;
pub mod pipeline;
pub mod report;
pub mod sink;
pub mod snapshot;
pub mod synthetic;
pub mod writer;

// Re-export main API types
pub use config::ExportConfig;
pub use config::SandboxSettings;
pub use entry::ContentProvider;
pub use entry::ContentSource;
pub use entry::FileEntry;
pub use error::ExportError;
pub use error::ExportFailure;
pub use error::Result;
pub use handler::Authorization;
pub use handler::ExportHandler;
pub use handler::ExportRequest;
pub use pipeline::ExportPipeline;
pub use pipeline::export;
pub use report::ExportObserver;
pub use report::ExportStats;
pub use report::ExportWarning;
pub use report::NoopObserver;
pub use sink::ArchiveSink;
pub use sink::FileSink;
pub use sink::MemorySink;
pub use sink::SinkOutcome;
pub use sink::TransportMetadata;
pub use sink::WriterSink;
pub use snapshot::ExclusionPolicy;
pub use snapshot::SiteRoot;
pub use snapshot::SiteRoots;
pub use synthetic::ConfigTemplate;
pub use writer::ArchiveWriter;
pub use writer::EntryOutcome;
