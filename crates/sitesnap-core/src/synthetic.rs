//! Synthetic entries generated for the sandbox runtime.
//!
//! Two kinds of content are produced in memory: a configuration file
//! rendered from a template, and a JSON manifest carrying the sandbox
//! settings. Both override real files at the same archive path.

use crate::ExportError;
use crate::Result;
use crate::config::SandboxSettings;
use crate::entry::FileEntry;
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::Path;

/// Archive path of the site configuration file.
pub const CONFIG_PATH: &str = "wp-config.php";

/// A configuration file rendered with `{{name}}` placeholders.
///
/// # Examples
///
/// ```
/// use sitesnap_core::ConfigTemplate;
/// use sitesnap_core::SandboxSettings;
///
/// let template = ConfigTemplate::new(
///     "wp-config.php",
///     "<?php define('WP_VERSION', '{{ site_version }}');",
/// );
/// let settings = SandboxSettings::new().with_site_version("6.4");
///
/// let rendered = template.render(&settings.template_vars())?;
/// assert_eq!(rendered, "<?php define('WP_VERSION', '6.4');");
/// # Ok::<(), sitesnap_core::ExportError>(())
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigTemplate {
    path: String,
    template: String,
}

impl ConfigTemplate {
    /// Creates a template rendered to `path` inside the archive.
    pub fn new(path: impl Into<String>, template: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            template: template.into(),
        }
    }

    /// Loads the template text from a file.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` if the file cannot be read as UTF-8.
    pub fn from_file(path: impl Into<String>, file: &Path) -> Result<Self> {
        let template = std::fs::read_to_string(file).map_err(|e| {
            ExportError::invalid_config(format!(
                "cannot read config template {}: {e}",
                file.display()
            ))
        })?;
        Ok(Self::new(path, template))
    }

    /// Archive path the rendered file is written to.
    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Renders the template.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` on an unterminated `{{` or a placeholder with
    /// no matching variable.
    pub fn render(&self, vars: &BTreeMap<String, String>) -> Result<String> {
        let mut out = String::with_capacity(self.template.len());
        let mut rest = self.template.as_str();

        while let Some(start) = rest.find("{{") {
            out.push_str(&rest[..start]);
            let after = &rest[start + 2..];
            let end = after.find("}}").ok_or_else(|| {
                ExportError::invalid_config(format!(
                    "unterminated placeholder in template for {}",
                    self.path
                ))
            })?;
            let name = after[..end].trim();
            let value = vars.get(name).ok_or_else(|| {
                ExportError::invalid_config(format!(
                    "unknown placeholder '{name}' in template for {}",
                    self.path
                ))
            })?;
            out.push_str(value);
            rest = &after[end + 2..];
        }
        out.push_str(rest);

        Ok(out)
    }

    /// Renders the template into a synthetic entry.
    ///
    /// # Errors
    ///
    /// See [`Self::render`].
    pub fn to_entry(&self, vars: &BTreeMap<String, String>) -> Result<FileEntry> {
        Ok(FileEntry::synthetic(self.path.clone(), self.render(vars)?))
    }
}

#[derive(Serialize)]
struct SandboxManifest<'a> {
    generator: String,
    site_version: &'a str,
    runtime_version: &'a str,
    client_url: &'a str,
    remote_url: &'a str,
}

/// Serializes the sandbox settings into the manifest document.
///
/// # Errors
///
/// Returns `EncodingFailure` if serialization fails.
pub fn manifest_json(settings: &SandboxSettings) -> Result<String> {
    let manifest = SandboxManifest {
        generator: format!("sitesnap {}", env!("CARGO_PKG_VERSION")),
        site_version: &settings.site_version,
        runtime_version: &settings.runtime_version,
        client_url: &settings.client_url,
        remote_url: &settings.remote_url,
    };
    serde_json::to_string_pretty(&manifest)
        .map_err(|e| ExportError::encoding(format!("cannot serialize manifest: {e}")))
}

/// Builds every synthetic entry for one export.
///
/// The rendered configuration comes first, then the manifest.
///
/// # Errors
///
/// Returns `InvalidConfig` for bad settings or templates.
pub fn build_entries(
    settings: &SandboxSettings,
    template: Option<&ConfigTemplate>,
) -> Result<Vec<FileEntry>> {
    settings.validate()?;

    let mut entries = Vec::with_capacity(2);
    if let Some(template) = template {
        entries.push(template.to_entry(&settings.template_vars())?);
    }
    if let Some(path) = &settings.manifest_path {
        entries.push(FileEntry::synthetic(path.clone(), manifest_json(settings)?));
    }
    Ok(entries)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn vars() -> BTreeMap<String, String> {
        SandboxSettings::new()
            .with_site_version("6.4.2")
            .with_runtime_version("8.2")
            .template_vars()
    }

    #[test]
    fn test_render_multiple_placeholders() {
        let template = ConfigTemplate::new(
            CONFIG_PATH,
            "v={{site_version}} php={{ runtime_version }} end",
        );
        assert_eq!(template.render(&vars()).unwrap(), "v=6.4.2 php=8.2 end");
    }

    #[test]
    fn test_render_without_placeholders() {
        let template = ConfigTemplate::new(CONFIG_PATH, "<?php // plain");
        assert_eq!(template.render(&vars()).unwrap(), "<?php // plain");
    }

    #[test]
    fn test_render_unknown_placeholder() {
        let template = ConfigTemplate::new(CONFIG_PATH, "{{ db_password }}");
        let err = template.render(&vars()).unwrap_err();
        assert!(matches!(err, ExportError::InvalidConfig { .. }));
        assert!(err.to_string().contains("db_password"));
    }

    #[test]
    fn test_render_unterminated() {
        let template = ConfigTemplate::new(CONFIG_PATH, "broken {{ site_version");
        assert!(template.render(&vars()).is_err());
    }

    #[test]
    fn test_manifest_contains_settings() {
        let settings = SandboxSettings::new()
            .with_site_version("6.4.2")
            .with_runtime_version("8.2");
        let json: serde_json::Value =
            serde_json::from_str(&manifest_json(&settings).unwrap()).unwrap();

        assert_eq!(json["site_version"], "6.4.2");
        assert_eq!(json["runtime_version"], "8.2");
        assert_eq!(json["client_url"], crate::config::DEFAULT_CLIENT_URL);
        assert!(json["generator"].as_str().unwrap().starts_with("sitesnap"));
    }

    #[test]
    fn test_build_entries_order_and_toggle() {
        let settings = SandboxSettings::new();
        let template = ConfigTemplate::new(CONFIG_PATH, "<?php");

        let entries = build_entries(&settings, Some(&template)).unwrap();
        let paths: Vec<_> = entries.iter().map(|e| e.relative_path.as_str()).collect();
        assert_eq!(paths, vec!["wp-config.php", "sandbox.json"]);
        assert!(entries.iter().all(FileEntry::is_synthetic));

        let settings = settings.with_manifest_path(None);
        assert!(build_entries(&settings, None).unwrap().is_empty());
    }

    #[test]
    fn test_from_file() {
        let temp = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(temp.path(), "<?php // {{remote_url}}").unwrap();

        let template = ConfigTemplate::from_file(CONFIG_PATH, temp.path()).unwrap();
        assert_eq!(template.path(), CONFIG_PATH);
        assert!(
            template
                .render(&vars())
                .unwrap()
                .ends_with("remote.html")
        );

        let missing = ConfigTemplate::from_file(CONFIG_PATH, Path::new("/nonexistent/tpl"));
        assert!(missing.is_err());
    }
}
