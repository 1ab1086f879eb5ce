//! Configuration for export operations.

use crate::ExportError;
use crate::Result;
use crate::entry::is_valid_archive_path;
use std::collections::BTreeMap;

/// Default size of the buffer content is copied through.
pub const DEFAULT_CHUNK_SIZE: usize = 64 * 1024;

/// Largest accepted chunk size.
pub const MAX_CHUNK_SIZE: usize = 16 * 1024 * 1024;

/// Default sandbox client script URL.
pub const DEFAULT_CLIENT_URL: &str = "https://playground.wordpress.net/client/index.js";

/// Default sandbox remote page URL.
pub const DEFAULT_REMOTE_URL: &str = "https://playground.wordpress.net/remote.html";

/// Settings for the archive writer.
///
/// # Examples
///
/// ```
/// use sitesnap_core::ExportConfig;
///
/// let config = ExportConfig::default()
///     .with_compression_level(9)
///     .with_chunk_size(32 * 1024);
///
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportConfig {
    /// Compression level: 0 stores entries, 1-9 deflates them.
    ///
    /// Default: `6`.
    pub compression_level: u8,

    /// Bytes copied per read when streaming entry content.
    ///
    /// Default: 64 KiB.
    pub chunk_size: usize,

    /// File name offered to the downloader.
    ///
    /// Default: `sandbox-site.zip`.
    pub archive_name: String,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            compression_level: 6,
            chunk_size: DEFAULT_CHUNK_SIZE,
            archive_name: "sandbox-site.zip".to_string(),
        }
    }
}

impl ExportConfig {
    /// Creates a configuration with default settings.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the compression level (0-9).
    #[must_use]
    pub fn with_compression_level(mut self, level: u8) -> Self {
        self.compression_level = level;
        self
    }

    /// Sets the copy chunk size.
    #[must_use]
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size;
        self
    }

    /// Sets the download file name.
    #[must_use]
    pub fn with_archive_name(mut self, name: impl Into<String>) -> Self {
        self.archive_name = name.into();
        self
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` if the compression level is above 9, the chunk
    /// size is zero or above [`MAX_CHUNK_SIZE`], or the archive name is empty.
    pub fn validate(&self) -> Result<()> {
        if self.compression_level > 9 {
            return Err(ExportError::invalid_config(format!(
                "compression level must be 0-9, got {}",
                self.compression_level
            )));
        }
        if self.chunk_size == 0 || self.chunk_size > MAX_CHUNK_SIZE {
            return Err(ExportError::invalid_config(format!(
                "chunk size must be between 1 and {MAX_CHUNK_SIZE} bytes, got {}",
                self.chunk_size
            )));
        }
        if self.archive_name.trim().is_empty() {
            return Err(ExportError::invalid_config("archive name is empty"));
        }
        Ok(())
    }
}

/// Values handed through to the sandbox runtime.
///
/// They are treated as opaque strings and end up in the `sandbox.json`
/// manifest and in configuration template placeholders.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SandboxSettings {
    /// Version of the exported site software.
    pub site_version: String,

    /// Version of the runtime the site should run on.
    pub runtime_version: String,

    /// URL of the sandbox client script.
    pub client_url: String,

    /// URL of the sandbox remote page.
    pub remote_url: String,

    /// Archive path of the manifest; `None` disables it.
    ///
    /// Default: `Some("sandbox.json")`.
    pub manifest_path: Option<String>,

    /// Extra template variables.
    pub extra_vars: BTreeMap<String, String>,
}

impl Default for SandboxSettings {
    fn default() -> Self {
        Self {
            site_version: String::new(),
            runtime_version: String::new(),
            client_url: DEFAULT_CLIENT_URL.to_string(),
            remote_url: DEFAULT_REMOTE_URL.to_string(),
            manifest_path: Some("sandbox.json".to_string()),
            extra_vars: BTreeMap::new(),
        }
    }
}

impl SandboxSettings {
    /// Creates settings with default URLs and empty versions.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the site version.
    #[must_use]
    pub fn with_site_version(mut self, version: impl Into<String>) -> Self {
        self.site_version = version.into();
        self
    }

    /// Sets the runtime version.
    #[must_use]
    pub fn with_runtime_version(mut self, version: impl Into<String>) -> Self {
        self.runtime_version = version.into();
        self
    }

    /// Sets the sandbox client URL.
    #[must_use]
    pub fn with_client_url(mut self, url: impl Into<String>) -> Self {
        self.client_url = url.into();
        self
    }

    /// Sets the sandbox remote page URL.
    #[must_use]
    pub fn with_remote_url(mut self, url: impl Into<String>) -> Self {
        self.remote_url = url.into();
        self
    }

    /// Sets or disables the manifest path.
    #[must_use]
    pub fn with_manifest_path(mut self, path: Option<String>) -> Self {
        self.manifest_path = path;
        self
    }

    /// Adds an extra template variable.
    #[must_use]
    pub fn with_var(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.extra_vars.insert(name.into(), value.into());
        self
    }

    /// Validates the settings.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` if the manifest path is malformed.
    pub fn validate(&self) -> Result<()> {
        if let Some(path) = &self.manifest_path
            && !is_valid_archive_path(path)
        {
            return Err(ExportError::invalid_config(format!(
                "invalid manifest path '{path}'"
            )));
        }
        Ok(())
    }

    /// Returns every variable available to configuration templates.
    ///
    /// Built-in names are `site_version`, `runtime_version`, `client_url`
    /// and `remote_url`; extra variables with the same name take precedence.
    #[must_use]
    pub fn template_vars(&self) -> BTreeMap<String, String> {
        let mut vars = BTreeMap::from([
            ("site_version".to_string(), self.site_version.clone()),
            ("runtime_version".to_string(), self.runtime_version.clone()),
            ("client_url".to_string(), self.client_url.clone()),
            ("remote_url".to_string(), self.remote_url.clone()),
        ]);
        vars.extend(self.extra_vars.clone());
        vars
    }
}
