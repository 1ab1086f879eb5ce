//! End-to-end export tests against real directory trees.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use sitesnap_core::ArchiveSink;
use sitesnap_core::ArchiveWriter;
use sitesnap_core::ConfigTemplate;
use sitesnap_core::ContentProvider;
use sitesnap_core::ContentSource;
use sitesnap_core::ExportConfig;
use sitesnap_core::ExportError;
use sitesnap_core::ExportPipeline;
use sitesnap_core::FileEntry;
use sitesnap_core::MemorySink;
use sitesnap_core::NoopObserver;
use sitesnap_core::SandboxSettings;
use sitesnap_core::SinkOutcome;
use sitesnap_core::SiteRoots;
use sitesnap_core::TransportMetadata;
use sitesnap_core::io::SinkTally;
use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::io::Cursor;
use std::io::Read;
use std::io::Write;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;
use std::time::SystemTime;
use tempfile::TempDir;

const LOCAL_HEADER: &[u8] = b"PK\x03\x04";

/// Builds a small installation: core files, content and a VCS directory.
fn create_site(root: &Path) {
    fs::write(root.join("index.php"), "<?php require 'wp-blog-header.php';").unwrap();
    fs::write(root.join("wp-config.php"), "<?php define('DB_PASSWORD', 'hunter2');").unwrap();
    fs::create_dir_all(root.join("wp-includes")).unwrap();
    fs::write(root.join("wp-includes/version.php"), "<?php $wp_version = '6.4.2';").unwrap();
    fs::create_dir_all(root.join("wp-content/plugins/akismet")).unwrap();
    fs::write(root.join("wp-content/plugins/akismet/akismet.php"), "<?php // akismet").unwrap();
    fs::create_dir_all(root.join("wp-content/plugins/sitesnap")).unwrap();
    fs::write(root.join("wp-content/plugins/sitesnap/sitesnap.php"), "<?php // self").unwrap();
    fs::create_dir_all(root.join("wp-content/uploads/2024/01")).unwrap();
    fs::write(root.join("wp-content/uploads/2024/01/photo.jpg"), vec![0xFFu8; 4096]).unwrap();
    fs::create_dir_all(root.join(".git/objects")).unwrap();
    fs::write(root.join(".git/HEAD"), "ref: refs/heads/main").unwrap();
}

fn create_flat_site(root: &Path, files: usize) {
    for i in 0..files {
        fs::write(root.join(format!("file{i:02}.txt")), format!("content of file {i}")).unwrap();
    }
}

fn read_archive(bytes: &[u8]) -> BTreeMap<String, Vec<u8>> {
    let mut archive = zip::ZipArchive::new(Cursor::new(bytes.to_vec())).unwrap();
    let mut entries = BTreeMap::new();
    for i in 0..archive.len() {
        let mut file = archive.by_index(i).unwrap();
        let mut content = Vec::new();
        file.read_to_end(&mut content).unwrap();
        entries.insert(file.name().to_string(), content);
    }
    entries
}

fn archive_order(bytes: &[u8]) -> Vec<String> {
    let mut archive = zip::ZipArchive::new(Cursor::new(bytes.to_vec())).unwrap();
    (0..archive.len())
        .map(|i| archive.by_index(i).unwrap().name().to_string())
        .collect()
}

fn no_manifest() -> SandboxSettings {
    SandboxSettings::new().with_manifest_path(None)
}

/// Sink that rejects the write carrying the n-th local file header.
#[derive(Default)]
struct FailingSink {
    fail_on_header: usize,
    headers_seen: usize,
    failed: bool,
    writes_after_failure: usize,
    opened: bool,
    closes: Vec<SinkOutcome>,
}

impl Write for FailingSink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if self.failed {
            self.writes_after_failure += 1;
            return Err(io::Error::new(io::ErrorKind::BrokenPipe, "already failed"));
        }
        let headers = buf.windows(LOCAL_HEADER.len()).filter(|w| *w == LOCAL_HEADER).count();
        if self.headers_seen + headers >= self.fail_on_header {
            self.failed = true;
            return Err(io::Error::new(io::ErrorKind::ConnectionReset, "client went away"));
        }
        self.headers_seen += headers;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl ArchiveSink for FailingSink {
    fn open(&mut self, _metadata: &TransportMetadata) -> io::Result<()> {
        self.opened = true;
        Ok(())
    }

    fn close(&mut self, outcome: SinkOutcome) -> io::Result<()> {
        self.closes.push(outcome);
        Ok(())
    }
}

#[test]
fn test_export_reproduces_tree() {
    let temp = TempDir::new().unwrap();
    create_site(temp.path());

    let pipeline = ExportPipeline::new(SiteRoots::site(temp.path(), None::<&str>))
        .settings(no_manifest());
    let mut sink = MemorySink::new();
    let stats = pipeline.export(&mut sink).unwrap();

    let entries = read_archive(sink.bytes());
    assert_eq!(
        entries.keys().map(String::as_str).collect::<Vec<_>>(),
        vec![
            "index.php",
            "wp-config.php",
            "wp-content/plugins/akismet/akismet.php",
            "wp-content/plugins/sitesnap/sitesnap.php",
            "wp-content/uploads/2024/01/photo.jpg",
            "wp-includes/version.php",
        ]
    );
    for (name, content) in &entries {
        assert_eq!(content, &fs::read(temp.path().join(name)).unwrap(), "{name}");
    }
    assert_eq!(stats.entries_written, 6);
    assert_eq!(stats.synthetic_entries, 0);
    assert!(!stats.has_warnings());
    assert_eq!(stats.bytes_written, sink.bytes().len() as u64);
}

#[test]
fn test_entries_sorted_and_synthetic_last() {
    let temp = TempDir::new().unwrap();
    create_site(temp.path());

    let pipeline = ExportPipeline::new(SiteRoots::site(temp.path(), None::<&str>));
    let mut sink = MemorySink::new();
    pipeline.export(&mut sink).unwrap();

    let order = archive_order(sink.bytes());
    assert_eq!(order.first().map(String::as_str), Some("index.php"));
    assert_eq!(order.last().map(String::as_str), Some("sandbox.json"));
    let wp_config = order.iter().position(|n| n == "wp-config.php").unwrap();
    let content = order.iter().position(|n| n.starts_with("wp-content/")).unwrap();
    let includes = order.iter().position(|n| n.starts_with("wp-includes/")).unwrap();
    assert!(wp_config < content && content < includes);
}

#[test]
fn test_vcs_and_excluded_plugin_absent() {
    let temp = TempDir::new().unwrap();
    create_site(temp.path());

    let pipeline = ExportPipeline::new(SiteRoots::site(temp.path(), None::<&str>))
        .exclude_path("wp-content/plugins/sitesnap")
        .settings(no_manifest());
    let mut sink = MemorySink::new();
    pipeline.export(&mut sink).unwrap();

    let entries = read_archive(sink.bytes());
    assert!(entries.contains_key("wp-content/plugins/akismet/akismet.php"));
    assert!(!entries.keys().any(|n| n.starts_with("wp-content/plugins/sitesnap")));
    assert!(!entries.keys().any(|n| n.starts_with(".git")));
}

#[test]
fn test_nested_content_root_emitted_once() {
    let temp = TempDir::new().unwrap();
    create_site(temp.path());

    let roots = SiteRoots::site(temp.path(), Some(temp.path().join("wp-content")));
    let pipeline = ExportPipeline::new(roots).settings(no_manifest());
    let mut sink = MemorySink::new();
    let stats = pipeline.export(&mut sink).unwrap();

    let order = archive_order(sink.bytes());
    let photos = order
        .iter()
        .filter(|n| *n == "wp-content/uploads/2024/01/photo.jpg")
        .count();
    assert_eq!(photos, 1);
    assert_eq!(stats.entries_written, 6);
    assert!(!stats.has_warnings());
}

#[test]
fn test_separate_content_root_mounted() {
    let core = TempDir::new().unwrap();
    let content = TempDir::new().unwrap();
    fs::write(core.path().join("index.php"), "<?php").unwrap();
    fs::create_dir_all(content.path().join("themes/twentytwenty")).unwrap();
    fs::write(content.path().join("themes/twentytwenty/style.css"), "body{}").unwrap();

    let pipeline = ExportPipeline::new(SiteRoots::site(core.path(), Some(content.path())))
        .settings(no_manifest());
    let mut sink = MemorySink::new();
    pipeline.export(&mut sink).unwrap();

    assert_eq!(
        archive_order(sink.bytes()),
        vec!["index.php", "wp-content/themes/twentytwenty/style.css"]
    );
}

#[test]
fn test_synthetic_config_replaces_real() {
    let temp = TempDir::new().unwrap();
    create_site(temp.path());

    let pipeline = ExportPipeline::new(SiteRoots::site(temp.path(), None::<&str>))
        .settings(SandboxSettings::new().with_site_version("6.4.2"))
        .template(ConfigTemplate::new(
            "wp-config.php",
            "<?php define('WP_SANDBOX', '{{ site_version }}');",
        ));
    let mut sink = MemorySink::new();
    let stats = pipeline.export(&mut sink).unwrap();

    let order = archive_order(sink.bytes());
    assert_eq!(order.iter().filter(|n| *n == "wp-config.php").count(), 1);

    let entries = read_archive(sink.bytes());
    assert_eq!(
        entries["wp-config.php"],
        b"<?php define('WP_SANDBOX', '6.4.2');".to_vec()
    );
    assert_eq!(stats.synthetic_entries, 2);

    let manifest: serde_json::Value = serde_json::from_slice(&entries["sandbox.json"]).unwrap();
    assert_eq!(manifest["site_version"], "6.4.2");
}

#[test]
fn test_missing_root_touches_nothing() {
    let temp = TempDir::new().unwrap();
    let pipeline = ExportPipeline::new(SiteRoots::site(temp.path().join("missing"), None::<&str>));
    let mut sink = MemorySink::new();

    let failure = pipeline.export(&mut sink).unwrap_err();

    assert!(matches!(failure.error, ExportError::RootUnreadable { .. }));
    assert!(failure.error.is_preflight());
    assert!(sink.bytes().is_empty());
    assert!(sink.metadata().is_none());
    assert_eq!(sink.close_count(), 0);
}

#[test]
fn test_invalid_template_touches_nothing() {
    let temp = TempDir::new().unwrap();
    create_flat_site(temp.path(), 2);

    let pipeline = ExportPipeline::new(SiteRoots::site(temp.path(), None::<&str>))
        .template(ConfigTemplate::new("wp-config.php", "{{ db_password }}"));
    let mut sink = MemorySink::new();

    let failure = pipeline.export(&mut sink).unwrap_err();
    assert!(matches!(failure.error, ExportError::InvalidConfig { .. }));
    assert!(sink.metadata().is_none());
}

#[test]
fn test_sink_failure_after_three_entries() {
    let temp = TempDir::new().unwrap();
    create_flat_site(temp.path(), 10);

    let pipeline = ExportPipeline::new(SiteRoots::site(temp.path(), None::<&str>))
        .settings(no_manifest())
        .compression_level(0);
    let mut sink = FailingSink {
        fail_on_header: 4,
        ..FailingSink::default()
    };

    let failure = pipeline.export(&mut sink).unwrap_err();

    assert!(matches!(failure.error, ExportError::SinkWriteFailure(_)));
    assert_eq!(failure.stats.entries_written, 3);
    assert_eq!(sink.headers_seen, 3);
    assert_eq!(sink.writes_after_failure, 0);
    assert!(sink.opened);
    assert_eq!(sink.closes, vec![SinkOutcome::Aborted]);
}

#[test]
fn test_transport_metadata_before_first_byte() {
    let temp = TempDir::new().unwrap();
    create_flat_site(temp.path(), 3);

    let pipeline = ExportPipeline::new(SiteRoots::site(temp.path(), None::<&str>))
        .archive_name("sandbox-demo.zip");
    let mut sink = MemorySink::new();
    pipeline.export(&mut sink).unwrap();

    let metadata = sink.metadata().unwrap();
    assert_eq!(metadata.content_type, "application/zip");
    assert_eq!(metadata.filename, "sandbox-demo.zip");
    assert_eq!(metadata.content_length, None);
    assert_eq!(sink.bytes_before_open(), 0);
    assert_eq!(sink.outcome(), Some(SinkOutcome::Complete));
    assert_eq!(sink.close_count(), 1);
}

#[test]
fn test_export_is_idempotent() {
    let temp = TempDir::new().unwrap();
    create_site(temp.path());

    let pipeline = ExportPipeline::new(SiteRoots::site(temp.path(), None::<&str>));
    let mut first = MemorySink::new();
    let mut second = MemorySink::new();
    pipeline.export(&mut first).unwrap();
    pipeline.export(&mut second).unwrap();

    assert_eq!(read_archive(first.bytes()), read_archive(second.bytes()));
    assert_eq!(archive_order(first.bytes()), archive_order(second.bytes()));
}

#[test]
fn test_concurrent_exports_are_independent() {
    let temp = TempDir::new().unwrap();
    create_site(temp.path());

    let pipeline = ExportPipeline::new(SiteRoots::site(temp.path(), None::<&str>));
    let archives: Vec<Vec<u8>> = std::thread::scope(|scope| {
        let handles: Vec<_> = (0..4)
            .map(|_| {
                scope.spawn(|| {
                    let mut sink = MemorySink::new();
                    pipeline.export(&mut sink).unwrap();
                    sink.into_bytes()
                })
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    let expected = read_archive(&archives[0]);
    assert_eq!(expected.len(), 7);
    for archive in &archives[1..] {
        assert_eq!(read_archive(archive), expected);
    }
}

#[cfg(unix)]
#[test]
fn test_unreadable_file_skipped_with_warning() {
    let temp = TempDir::new().unwrap();
    create_flat_site(temp.path(), 9);
    std::os::unix::fs::symlink(temp.path().join("vanished.txt"), temp.path().join("file09.txt"))
        .unwrap();

    let pipeline = ExportPipeline::new(SiteRoots::site(temp.path(), None::<&str>))
        .settings(no_manifest());
    let mut sink = MemorySink::new();
    let stats = pipeline.export(&mut sink).unwrap();

    assert_eq!(stats.entries_written, 9);
    assert_eq!(stats.warnings.len(), 1);
    assert!(stats.warnings[0].path.ends_with("file09.txt"));
    assert_eq!(read_archive(sink.bytes()).len(), 9);
}

#[cfg(unix)]
#[test]
fn test_escaping_symlink_skipped() {
    let outside = TempDir::new().unwrap();
    fs::write(outside.path().join("secret.txt"), "outside").unwrap();
    let temp = TempDir::new().unwrap();
    fs::write(temp.path().join("index.php"), "<?php").unwrap();
    fs::write(temp.path().join("inside.txt"), "inside").unwrap();
    std::os::unix::fs::symlink(outside.path().join("secret.txt"), temp.path().join("leak.txt"))
        .unwrap();
    std::os::unix::fs::symlink(temp.path().join("inside.txt"), temp.path().join("alias.txt"))
        .unwrap();

    let pipeline = ExportPipeline::new(SiteRoots::site(temp.path(), None::<&str>))
        .settings(no_manifest());
    let mut sink = MemorySink::new();
    let stats = pipeline.export(&mut sink).unwrap();

    let entries = read_archive(sink.bytes());
    assert!(!entries.contains_key("leak.txt"));
    assert_eq!(entries["alias.txt"], b"inside".to_vec());
    assert_eq!(stats.warnings.len(), 1);
    assert!(stats.warnings[0].path.ends_with("leak.txt"));
}

struct Endless {
    len: usize,
    largest_read: Arc<AtomicUsize>,
}

struct EndlessReader {
    remaining: usize,
    largest_read: Arc<AtomicUsize>,
}

impl ContentProvider for Endless {
    fn open(&self) -> io::Result<Box<dyn Read + Send>> {
        Ok(Box::new(EndlessReader {
            remaining: self.len,
            largest_read: Arc::clone(&self.largest_read),
        }))
    }
}

impl Read for EndlessReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.largest_read.fetch_max(buf.len(), Ordering::Relaxed);
        let n = buf.len().min(self.remaining);
        buf[..n].fill(0x5A);
        self.remaining -= n;
        Ok(n)
    }
}

#[test]
fn test_large_entry_streams_in_chunks() {
    const LEN: usize = 32 * 1024 * 1024;
    let largest_read = Arc::new(AtomicUsize::new(0));
    let entry = FileEntry {
        relative_path: "wp-content/uploads/backup.sql".into(),
        size: LEN as u64,
        modified_at: SystemTime::now(),
        source: ContentSource::Provider(Arc::new(Endless {
            len: LEN,
            largest_read: Arc::clone(&largest_read),
        })),
    };
    let config = ExportConfig::default().with_chunk_size(64 * 1024);

    let tally = SinkTally::new();
    let mut out = io::sink();
    let mut writer = ArchiveWriter::new(&mut out, &tally, &config);
    writer.write_entry(&entry, &mut NoopObserver).unwrap();
    let total = writer.finish().unwrap();

    assert_eq!(largest_read.load(Ordering::Relaxed), 64 * 1024);
    assert!(total > 0);
}
