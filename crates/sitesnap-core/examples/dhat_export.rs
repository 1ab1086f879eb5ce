//! Heap profiling for site export.
//!
//! Uses dhat to track heap allocations while a site with one large file is
//! exported. Peak heap should stay near the copy buffer size, independent
//! of the file size. After running, open the generated `dhat-heap.json` in
//! the dhat viewer:
//! <https://nnethercote.github.io/dh_view/dh_view.html>
//!
//! Usage:
//! ```sh
//! cargo run --example dhat_export --release
//! cargo run --example dhat_export --release -- 512
//! ```

#![allow(unsafe_code, clippy::unwrap_used)]

#[global_allocator]
static ALLOC: dhat::Alloc = dhat::Alloc;

use sitesnap_core::ExportPipeline;
use sitesnap_core::SiteRoots;
use sitesnap_core::WriterSink;
use std::fs;
use std::io::Write;

fn main() {
    let megabytes: usize = std::env::args()
        .nth(1)
        .and_then(|arg| arg.parse().ok())
        .unwrap_or(128);

    let temp = tempfile::tempdir().unwrap();
    let site = temp.path().join("site");
    fs::create_dir_all(site.join("wp-content/uploads")).unwrap();
    fs::write(site.join("index.php"), "<?php").unwrap();

    let mut large = fs::File::create(site.join("wp-content/uploads/backup.sql")).unwrap();
    let block = vec![0x5A_u8; 1024 * 1024];
    for _ in 0..megabytes {
        large.write_all(&block).unwrap();
    }
    drop(large);

    eprintln!("Profiling export of a {megabytes} MiB file");

    let pipeline = ExportPipeline::new(SiteRoots::site(&site, None::<&str>));
    let mut sink = WriterSink::new(std::io::sink());

    let _profiler = dhat::Profiler::new_heap();

    let stats = pipeline.export(&mut sink).unwrap();
    eprintln!(
        "Exported {} entries, {} bytes",
        stats.entries_written, stats.bytes_written
    );
}
