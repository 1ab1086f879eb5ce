//! Exclusion policy for the tree enumerator.
//!
//! Decides which directories are pruned and which files are left out of a
//! snapshot. Paths are matched against archive-relative names (`/`
//! separated), so the same policy works for every root.

use crate::ExportError;
use crate::Result;
use crate::entry::is_valid_archive_path;

/// Directory names holding version-control metadata.
pub const VCS_DIRECTORIES: &[&str] = &[".git", ".svn", ".hg", ".bzr"];

/// Rules for leaving paths out of an export.
///
/// # Examples
///
/// ```
/// use sitesnap_core::ExclusionPolicy;
///
/// let policy = ExclusionPolicy::default()
///     .with_excluded_path("wp-content/plugins/sitesnap")
///     .with_max_file_size(Some(64 * 1024 * 1024));
///
/// assert!(policy.excludes_dir("wp-content/plugins/sitesnap"));
/// assert!(policy.excludes_dir("wp-content/.git"));
/// assert!(!policy.excludes_dir("wp-content/plugins/akismet"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExclusionPolicy {
    /// Archive-relative paths whose whole subtree is skipped.
    ///
    /// Typically the exporter's own plugin directory.
    ///
    /// Default: empty.
    pub excluded_paths: Vec<String>,

    /// Skip VCS metadata directories (see [`VCS_DIRECTORIES`]).
    ///
    /// Default: `true`.
    pub skip_vcs: bool,

    /// Include dot-files such as `.htaccess`.
    ///
    /// Default: `true`.
    pub include_hidden: bool,

    /// Files larger than this many bytes are skipped with a warning.
    ///
    /// Default: `None` (no limit).
    pub max_file_size: Option<u64>,

    /// Glob-style patterns matched against every path component.
    ///
    /// Supports exact names, `*.ext` and `prefix*`.
    ///
    /// Default: `[".DS_Store"]`.
    pub exclude_patterns: Vec<String>,
}

impl Default for ExclusionPolicy {
    fn default() -> Self {
        Self {
            excluded_paths: Vec::new(),
            skip_vcs: true,
            include_hidden: true,
            max_file_size: None,
            exclude_patterns: vec![".DS_Store".to_string()],
        }
    }
}

impl ExclusionPolicy {
    /// Creates a policy with default settings.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a policy that excludes nothing.
    #[must_use]
    pub fn permissive() -> Self {
        Self {
            excluded_paths: Vec::new(),
            skip_vcs: false,
            include_hidden: true,
            max_file_size: None,
            exclude_patterns: Vec::new(),
        }
    }

    /// Adds a subtree to skip. Leading and trailing slashes are ignored.
    #[must_use]
    pub fn with_excluded_path(mut self, path: impl AsRef<str>) -> Self {
        self.excluded_paths
            .push(path.as_ref().trim_matches('/').to_string());
        self
    }

    /// Sets whether VCS metadata directories are skipped.
    #[must_use]
    pub fn with_skip_vcs(mut self, skip: bool) -> Self {
        self.skip_vcs = skip;
        self
    }

    /// Sets whether hidden files are included.
    #[must_use]
    pub fn with_include_hidden(mut self, include: bool) -> Self {
        self.include_hidden = include;
        self
    }

    /// Sets the maximum file size.
    #[must_use]
    pub fn with_max_file_size(mut self, max_size: Option<u64>) -> Self {
        self.max_file_size = max_size;
        self
    }

    /// Replaces the exclude patterns.
    #[must_use]
    pub fn with_exclude_patterns(mut self, patterns: Vec<String>) -> Self {
        self.exclude_patterns = patterns;
        self
    }

    /// Validates the policy.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` if an excluded path is not a clean relative
    /// path or a pattern is empty.
    pub fn validate(&self) -> Result<()> {
        if let Some(bad) = self
            .excluded_paths
            .iter()
            .find(|p| !is_valid_archive_path(p))
        {
            return Err(ExportError::invalid_config(format!(
                "excluded path '{bad}' must be a relative path without '.' or '..'"
            )));
        }
        if self.exclude_patterns.iter().any(String::is_empty) {
            return Err(ExportError::invalid_config("exclude pattern is empty"));
        }
        Ok(())
    }

    /// Returns `true` if the directory at `relative` is pruned.
    #[must_use]
    pub fn excludes_dir(&self, relative: &str) -> bool {
        if self.is_excluded_subtree(relative) {
            return true;
        }
        let name = file_name(relative);
        if self.skip_vcs && VCS_DIRECTORIES.contains(&name) {
            return true;
        }
        self.excludes_name(name)
    }

    /// Returns `true` if the file at `relative` is left out.
    ///
    /// Size limits are checked separately with [`Self::exceeds_size`].
    #[must_use]
    pub fn excludes_file(&self, relative: &str) -> bool {
        self.is_excluded_subtree(relative) || self.excludes_name(file_name(relative))
    }

    /// Returns `true` if a file of `size` bytes is over the limit.
    #[must_use]
    pub fn exceeds_size(&self, size: u64) -> bool {
        self.max_file_size.is_some_and(|max| size > max)
    }

    fn is_excluded_subtree(&self, relative: &str) -> bool {
        self.excluded_paths.iter().any(|excluded| {
            relative == excluded
                || relative
                    .strip_prefix(excluded.as_str())
                    .is_some_and(|rest| rest.starts_with('/'))
        })
    }

    fn excludes_name(&self, name: &str) -> bool {
        if !self.include_hidden && name.starts_with('.') {
            return true;
        }
        self.exclude_patterns
            .iter()
            .any(|pattern| pattern_matches(name, pattern))
    }
}

fn file_name(relative: &str) -> &str {
    relative.rsplit('/').next().unwrap_or(relative)
}

/// Matches a name against a simple glob pattern.
///
/// # Examples
///
/// ```
/// use sitesnap_core::snapshot::policy::pattern_matches;
///
/// assert!(pattern_matches("debug.log", "*.log"));
/// assert!(pattern_matches("cache-123", "cache*"));
/// assert!(pattern_matches(".DS_Store", ".DS_Store"));
/// assert!(!pattern_matches("catalog", "*.log"));
/// ```
#[must_use]
pub fn pattern_matches(name: &str, pattern: &str) -> bool {
    if pattern == name {
        return true;
    }
    if let Some(prefix) = pattern.strip_suffix('*') {
        return name.starts_with(prefix);
    }
    if let Some(suffix) = pattern.strip_prefix('*') {
        return name.ends_with(suffix);
    }
    false
}
