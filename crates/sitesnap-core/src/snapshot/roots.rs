//! Named filesystem roots mounted into the archive.

use crate::ExportError;
use crate::Result;
use crate::entry::is_valid_archive_path;
use std::path::Path;
use std::path::PathBuf;

/// Archive prefix of the content directory in a site installation.
pub const CONTENT_PREFIX: &str = "wp-content";

/// One directory tree and where it lands in the archive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SiteRoot {
    /// Directory on disk.
    pub path: PathBuf,

    /// Archive directory the root is mounted at; empty for the archive root.
    pub archive_prefix: String,
}

impl SiteRoot {
    /// Creates a root mounted at `archive_prefix`.
    pub fn new(path: impl Into<PathBuf>, archive_prefix: impl AsRef<str>) -> Self {
        Self {
            path: path.into(),
            archive_prefix: archive_prefix.as_ref().trim_matches('/').to_string(),
        }
    }

    /// Joins a `/`-separated path relative to this root onto the prefix.
    #[must_use]
    pub fn archive_path(&self, relative: &str) -> String {
        if self.archive_prefix.is_empty() {
            relative.to_string()
        } else if relative.is_empty() {
            self.archive_prefix.clone()
        } else {
            format!("{}/{relative}", self.archive_prefix)
        }
    }
}

/// The ordered set of roots making up one site installation.
///
/// # Examples
///
/// ```
/// use sitesnap_core::SiteRoots;
///
/// let roots = SiteRoots::site("/var/www/html", Some("/var/www/html/wp-content"));
/// assert_eq!(roots.len(), 2);
/// assert_eq!(roots.iter().nth(1).unwrap().archive_prefix, "wp-content");
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SiteRoots {
    roots: Vec<SiteRoot>,
}

impl SiteRoots {
    /// Creates an empty set of roots.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A core distribution root at the archive root and, optionally, a
    /// content directory mounted at `wp-content/`.
    ///
    /// The content directory may live inside the core root; it is then
    /// exported once, under its own mount.
    pub fn site(core: impl Into<PathBuf>, content: Option<impl Into<PathBuf>>) -> Self {
        let mut roots = Self::new().with_root(SiteRoot::new(core, ""));
        if let Some(content) = content {
            roots = roots.with_root(SiteRoot::new(content, CONTENT_PREFIX));
        }
        roots
    }

    /// Adds a root.
    #[must_use]
    pub fn with_root(mut self, root: SiteRoot) -> Self {
        self.roots.push(root);
        self
    }

    /// Number of roots.
    #[must_use]
    pub fn len(&self) -> usize {
        self.roots.len()
    }

    /// Returns `true` if there are no roots.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.roots.is_empty()
    }

    /// Iterates over the roots in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = &SiteRoot> {
        self.roots.iter()
    }

    /// Checks prefixes and opens every root.
    ///
    /// Returns the roots with canonical paths.
    ///
    /// # Errors
    ///
    /// - `InvalidConfig` if there are no roots, a prefix is malformed, or two
    ///   roots share a prefix.
    /// - `RootUnreadable` if a root does not exist, is not a directory, or
    ///   cannot be listed.
    pub fn resolve(&self) -> Result<Vec<SiteRoot>> {
        if self.roots.is_empty() {
            return Err(ExportError::invalid_config("no roots to export"));
        }

        let mut resolved: Vec<SiteRoot> = Vec::with_capacity(self.roots.len());
        for root in &self.roots {
            if !root.archive_prefix.is_empty() && !is_valid_archive_path(&root.archive_prefix) {
                return Err(ExportError::invalid_config(format!(
                    "invalid archive prefix '{}'",
                    root.archive_prefix
                )));
            }
            if resolved
                .iter()
                .any(|r| r.archive_prefix == root.archive_prefix)
            {
                return Err(ExportError::invalid_config(format!(
                    "two roots mounted at '{}'",
                    root.archive_prefix
                )));
            }

            let canonical = open_root(&root.path)?;
            resolved.push(SiteRoot {
                path: canonical,
                archive_prefix: root.archive_prefix.clone(),
            });
        }
        Ok(resolved)
    }
}

fn open_root(path: &Path) -> Result<PathBuf> {
    let unreadable = |source| ExportError::RootUnreadable {
        path: path.to_path_buf(),
        source,
    };

    let canonical = path.canonicalize().map_err(unreadable)?;
    if !canonical.is_dir() {
        return Err(unreadable(std::io::Error::other("not a directory")));
    }
    std::fs::read_dir(&canonical).map_err(unreadable)?;
    Ok(canonical)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_archive_path_join() {
        let core = SiteRoot::new("/srv", "");
        assert_eq!(core.archive_path("index.php"), "index.php");

        let content = SiteRoot::new("/srv/content", "/wp-content/");
        assert_eq!(content.archive_prefix, "wp-content");
        assert_eq!(content.archive_path("themes/a.css"), "wp-content/themes/a.css");
        assert_eq!(content.archive_path(""), "wp-content");
    }

    #[test]
    fn test_site_without_content() {
        let roots = SiteRoots::site("/srv", None::<PathBuf>);
        assert_eq!(roots.len(), 1);
        assert!(!roots.is_empty());
    }

    #[test]
    fn test_resolve_canonicalizes() {
        let temp = TempDir::new().unwrap();
        fs::create_dir(temp.path().join("content")).unwrap();

        let roots = SiteRoots::site(temp.path(), Some(temp.path().join("content")));
        let resolved = roots.resolve().unwrap();

        assert_eq!(resolved.len(), 2);
        assert_eq!(resolved[0].path, temp.path().canonicalize().unwrap());
        assert_eq!(resolved[1].archive_prefix, "wp-content");
    }

    #[test]
    fn test_resolve_missing_root() {
        let roots = SiteRoots::site("/nonexistent/sitesnap/root", None::<PathBuf>);
        let err = roots.resolve().unwrap_err();
        assert!(matches!(err, ExportError::RootUnreadable { .. }));
    }

    #[test]
    fn test_resolve_file_as_root() {
        let temp = TempDir::new().unwrap();
        let file = temp.path().join("file.txt");
        fs::write(&file, "x").unwrap();

        let err = SiteRoots::site(&file, None::<PathBuf>).resolve().unwrap_err();
        assert!(matches!(err, ExportError::RootUnreadable { .. }));
    }

    #[test]
    fn test_resolve_rejects_empty_and_duplicates() {
        assert!(matches!(
            SiteRoots::new().resolve(),
            Err(ExportError::InvalidConfig { .. })
        ));

        let temp = TempDir::new().unwrap();
        let roots = SiteRoots::new()
            .with_root(SiteRoot::new(temp.path(), "a"))
            .with_root(SiteRoot::new(temp.path(), "a"));
        assert!(matches!(
            roots.resolve(),
            Err(ExportError::InvalidConfig { .. })
        ));

        let roots = SiteRoots::new().with_root(SiteRoot::new(temp.path(), "a/../b"));
        assert!(roots.resolve().is_err());
    }
}
