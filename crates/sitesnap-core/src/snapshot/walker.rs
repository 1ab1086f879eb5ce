//! Lazy enumeration of a site installation.
//!
//! The enumerator walks each root depth-first with children sorted by name,
//! yields one entry at a time and never follows symlinked directories.
//! Synthetic entries come last and replace real files at the same path.

use crate::ExportError;
use crate::Result;
use crate::entry::ContentSource;
use crate::entry::FileEntry;
use crate::entry::is_valid_archive_path;
use crate::report::ExportWarning;
use crate::snapshot::policy::ExclusionPolicy;
use crate::snapshot::roots::SiteRoot;
use crate::snapshot::roots::SiteRoots;
use std::collections::HashSet;
use std::fs::Metadata;
use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::SystemTime;
use tracing::debug;
use walkdir::DirEntry;
use walkdir::WalkDir;

/// One step of the enumeration.
#[derive(Debug)]
pub enum Walked {
    /// A file to add to the archive.
    Entry(FileEntry),

    /// A file that was left out, with the reason.
    Skipped(ExportWarning),
}

type DirWalk = Box<dyn Iterator<Item = walkdir::Result<DirEntry>>>;

/// Lazily enumerates the files of a site snapshot.
///
/// Yields `Ok(Walked)` for entries and per-file warnings, and `Err` only for
/// fatal problems (a root that became unreadable mid-export). After an
/// `Err` the iterator is exhausted.
///
/// # Examples
///
/// ```no_run
/// use sitesnap_core::ExclusionPolicy;
/// use sitesnap_core::SiteRoots;
/// use sitesnap_core::snapshot::SiteEnumerator;
/// use sitesnap_core::snapshot::Walked;
///
/// let roots = SiteRoots::site("/var/www/html", None::<&str>);
/// let policy = ExclusionPolicy::default();
/// let enumerator = SiteEnumerator::new(&roots, &policy, Vec::new())?;
///
/// for step in enumerator {
///     match step? {
///         Walked::Entry(entry) => println!("{}", entry.relative_path),
///         Walked::Skipped(warning) => eprintln!("skipped {warning}"),
///     }
/// }
/// # Ok::<(), sitesnap_core::ExportError>(())
/// ```
pub struct SiteEnumerator {
    roots: Vec<SiteRoot>,
    policy: Arc<ExclusionPolicy>,
    next_root: usize,
    current: Option<(usize, DirWalk)>,
    synthetic: std::vec::IntoIter<FileEntry>,
    synthetic_paths: HashSet<String>,
    emitted: HashSet<String>,
    finished: bool,
}

impl SiteEnumerator {
    /// Opens every root and prepares the walk.
    ///
    /// Nothing is read beyond the root directories until the iterator is
    /// advanced.
    ///
    /// # Errors
    ///
    /// - `RootUnreadable` if a root cannot be opened
    /// - `InvalidConfig` if the policy is invalid, or a synthetic path is
    ///   malformed or registered twice
    pub fn new(
        roots: &SiteRoots,
        policy: &ExclusionPolicy,
        synthetic: Vec<FileEntry>,
    ) -> Result<Self> {
        policy.validate()?;

        let mut synthetic_paths = HashSet::with_capacity(synthetic.len());
        for entry in &synthetic {
            if !is_valid_archive_path(&entry.relative_path) {
                return Err(ExportError::invalid_config(format!(
                    "synthetic entry has invalid path '{}'",
                    entry.relative_path
                )));
            }
            if !synthetic_paths.insert(entry.relative_path.clone()) {
                return Err(ExportError::invalid_config(format!(
                    "synthetic entry '{}' registered twice",
                    entry.relative_path
                )));
            }
        }

        let roots = roots.resolve()?;

        Ok(Self {
            roots,
            policy: Arc::new(policy.clone()),
            next_root: 0,
            current: None,
            synthetic: synthetic.into_iter(),
            synthetic_paths,
            emitted: HashSet::new(),
            finished: false,
        })
    }

    /// Starts walking the root at `index`.
    fn open_walk(&self, index: usize) -> DirWalk {
        let root = self.roots[index].clone();
        let policy = Arc::clone(&self.policy);

        // Other roots mounted inside this one, or at a path this one would
        // also produce, are left to their own walk.
        let nested = self.nested_roots(index);
        let mounted = self.mounted_prefixes(index);

        let walk = WalkDir::new(&root.path)
            .follow_links(false)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(move |entry| {
                if entry.depth() == 0 || !entry.file_type().is_dir() {
                    return true;
                }
                if nested.iter().any(|n| n == entry.path()) {
                    return false;
                }
                let Some(relative) = relative_path(entry.path(), &root.path) else {
                    return true;
                };
                let archive_path = root.archive_path(&relative);
                if mounted.contains(&archive_path) || policy.excludes_dir(&archive_path) {
                    debug!(path = %archive_path, "pruned directory");
                    return false;
                }
                true
            });

        Box::new(walk)
    }

    /// Directories of the other roots that lie inside root `index`.
    fn nested_roots(&self, index: usize) -> Vec<PathBuf> {
        let root = &self.roots[index].path;
        self.roots
            .iter()
            .enumerate()
            .filter(|(i, other)| *i != index && other.path.starts_with(root))
            .map(|(_, other)| other.path.clone())
            .collect()
    }

    /// Archive prefixes owned by roots other than `index`.
    fn mounted_prefixes(&self, index: usize) -> Vec<String> {
        self.roots
            .iter()
            .enumerate()
            .filter(|(i, other)| *i != index && !other.archive_prefix.is_empty())
            .map(|(_, other)| other.archive_prefix.clone())
            .collect()
    }

    /// Why a symlink's canonical `target` must not be exported, if it would
    /// have been pruned by the walk itself.
    fn excluded_target(&self, root_index: usize, target: &Path) -> Option<String> {
        let root = &self.roots[root_index];
        if self
            .nested_roots(root_index)
            .iter()
            .any(|nested| target.starts_with(nested))
        {
            return Some(format!(
                "symlink target {} belongs to another root",
                target.display()
            ));
        }
        let Some(relative) = relative_path(target, &root.path) else {
            return Some("symlink target name is not valid UTF-8".to_string());
        };

        let mounted = self.mounted_prefixes(root_index);
        let mut ancestor = String::new();
        if let Some((dirs, _)) = relative.rsplit_once('/') {
            for part in dirs.split('/') {
                if !ancestor.is_empty() {
                    ancestor.push('/');
                }
                ancestor.push_str(part);
                let dir = root.archive_path(&ancestor);
                if mounted.contains(&dir) || self.policy.excludes_dir(&dir) {
                    return Some(format!("symlink target is inside excluded {dir}/"));
                }
            }
        }

        let archive_path = root.archive_path(&relative);
        if self.policy.excludes_file(&archive_path) {
            return Some(format!("symlink target {archive_path} is excluded"));
        }
        None
    }

    /// Turns one directory entry into an enumeration step.
    fn visit(&mut self, root_index: usize, entry: &DirEntry) -> Option<Walked> {
        if entry.depth() == 0 || entry.file_type().is_dir() {
            return None;
        }

        let root = &self.roots[root_index];
        let path = entry.path();

        let Some(relative) = relative_path(path, &root.path) else {
            return Some(skip(path, "file name is not valid UTF-8"));
        };
        let archive_path = root.archive_path(&relative);

        if self.policy.excludes_file(&archive_path) {
            debug!(path = %archive_path, "excluded by policy");
            return None;
        }

        if self.synthetic_paths.contains(&archive_path) {
            debug!(path = %archive_path, "replaced by synthetic entry");
            return None;
        }

        let (source_path, metadata) = if entry.path_is_symlink() {
            if self.mounted_prefixes(root_index).contains(&archive_path) {
                debug!(path = %archive_path, "symlink at a mounted root skipped");
                return None;
            }
            let (target, metadata) = match resolve_symlink(path, &root.path) {
                Ok(resolved) => resolved,
                Err(reason) => return Some(skip(path, reason)),
            };
            if let Some(reason) = self.excluded_target(root_index, &target) {
                return Some(skip(path, reason));
            }
            (target, metadata)
        } else if entry.file_type().is_file() {
            match entry.metadata() {
                Ok(metadata) => (path.to_path_buf(), metadata),
                Err(e) => return Some(skip(path, format!("cannot read metadata: {e}"))),
            }
        } else {
            return Some(skip(path, "not a regular file"));
        };

        let size = metadata.len();
        if self.policy.exceeds_size(size) {
            return Some(skip(path, format!("file too large ({size} bytes)")));
        }

        if !self.emitted.insert(archive_path.clone()) {
            return Some(skip(
                path,
                format!("duplicate archive path '{archive_path}'"),
            ));
        }

        Some(Walked::Entry(FileEntry {
            relative_path: archive_path,
            size,
            modified_at: metadata.modified().unwrap_or(SystemTime::UNIX_EPOCH),
            source: ContentSource::Disk(source_path),
        }))
    }
}

impl Iterator for SiteEnumerator {
    type Item = Result<Walked>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }

        loop {
            let Some((root_index, walk)) = self.current.as_mut() else {
                if self.next_root < self.roots.len() {
                    let index = self.next_root;
                    self.next_root += 1;
                    debug!(root = %self.roots[index].path.display(), "walking root");
                    self.current = Some((index, self.open_walk(index)));
                    continue;
                }
                return self.synthetic.next().map(|entry| Ok(Walked::Entry(entry)));
            };
            let root_index = *root_index;

            match walk.next() {
                Some(Ok(entry)) => {
                    if let Some(step) = self.visit(root_index, &entry) {
                        return Some(Ok(step));
                    }
                }
                Some(Err(err)) if err.depth() == 0 => {
                    self.finished = true;
                    let path = self.roots[root_index].path.clone();
                    let source = err
                        .into_io_error()
                        .unwrap_or_else(|| std::io::Error::other("root walk failed"));
                    return Some(Err(ExportError::RootUnreadable { path, source }));
                }
                Some(Err(err)) => {
                    let path = err.path().map(Path::to_path_buf).unwrap_or_default();
                    return Some(Ok(skip(&path, format!("cannot read: {err}"))));
                }
                None => self.current = None,
            }
        }
    }
}

fn skip(path: &Path, reason: impl Into<String>) -> Walked {
    Walked::Skipped(ExportWarning::new(path, reason))
}

/// Computes the `/`-separated path of `path` below `root`.
///
/// Returns `None` if `path` is outside `root` or a component is not UTF-8.
fn relative_path(path: &Path, root: &Path) -> Option<String> {
    let relative = path.strip_prefix(root).ok()?;
    let mut parts = Vec::new();
    for component in relative.components() {
        parts.push(component.as_os_str().to_str()?);
    }
    Some(parts.join("/"))
}

/// Resolves a symlinked file that stays inside `root`.
fn resolve_symlink(
    link: &Path,
    root: &Path,
) -> std::result::Result<(PathBuf, Metadata), String> {
    let target = link
        .canonicalize()
        .map_err(|e| format!("broken symlink: {e}"))?;
    if !target.starts_with(root) {
        return Err(format!(
            "symlink target {} is outside the root",
            target.display()
        ));
    }
    let metadata =
        std::fs::metadata(&target).map_err(|e| format!("cannot read symlink target: {e}"))?;
    if metadata.is_dir() {
        return Err("symlinked directory not followed".to_string());
    }
    if !metadata.is_file() {
        return Err("symlink target is not a regular file".to_string());
    }
    Ok((target, metadata))
}
