//! Application service: configuration template engine.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::Utc;
use serde::Serialize;
use serde_json::{Map, Value, json};
use tracing::{info, warn};

use crate::application::ports::{LocalFs, TemplateSource};
use crate::domain::error::TemplateError;
use crate::domain::template::{ConfigFormat, ConfigTemplate, builtin_specs, render, validate_content};
use crate::domain::validate::sanitize_filename;

/// Row of `template list`.
#[derive(Debug, Clone, Serialize)]
pub struct TemplateSummary {
    pub name: String,
    pub format: ConfigFormat,
    pub description: String,
    pub variables: usize,
}

/// Result of `create_config_set`.
#[derive(Debug, Clone, Serialize)]
pub struct ConfigSet {
    pub name: String,
    pub directory: PathBuf,
    pub files: Vec<PathBuf>,
    pub skipped: Vec<String>,
    pub manifest: PathBuf,
}

pub struct TemplateEngine {
    templates: Vec<ConfigTemplate>,
}

impl TemplateEngine {
    /// Engine with the built-in templates, bodies taken from `source`.
    ///
    /// # Errors
    ///
    /// Returns an error if a built-in body is missing from `source`.
    pub fn with_builtins(source: &impl TemplateSource) -> Result<Self> {
        let mut templates = Vec::new();
        for spec in builtin_specs() {
            let body = source
                .body(spec.file)
                .with_context(|| format!("missing template body {}", spec.file))?;
            templates.push(spec.with_body(body));
        }
        Ok(Self { templates })
    }

    /// Add or replace a template.
    pub fn register(&mut self, template: ConfigTemplate) {
        self.templates.retain(|t| t.name != template.name);
        self.templates.push(template);
    }

    /// # Errors
    ///
    /// Returns `TemplateError::NotFound` for unknown names.
    pub fn get(&self, name: &str) -> Result<&ConfigTemplate, TemplateError> {
        self.templates
            .iter()
            .find(|t| t.name == name)
            .ok_or_else(|| TemplateError::NotFound(name.to_string()))
    }

    #[must_use]
    pub fn list_templates(&self) -> Vec<TemplateSummary> {
        self.templates
            .iter()
            .map(|t| TemplateSummary {
                name: t.name.clone(),
                format: t.format,
                description: t.description.clone(),
                variables: t.variables().len(),
            })
            .collect()
    }

    /// # Errors
    ///
    /// Returns a `TemplateError` for unknown templates, failed range
    /// checks or undefined placeholders.
    pub fn render_template(
        &self,
        name: &str,
        vars: &Map<String, Value>,
        validate: bool,
    ) -> Result<String, TemplateError> {
        render(self.get(name)?, vars, validate, Utc::now())
    }

    /// Render to `path`. Sensitive templates (proxmox, environment) are
    /// written with mode 0600.
    ///
    /// # Errors
    ///
    /// Returns an error if rendering or writing fails.
    pub fn render_to_file(
        &self,
        fs: &impl LocalFs,
        name: &str,
        vars: &Map<String, Value>,
        path: &Path,
        validate: bool,
    ) -> Result<()> {
        let template = self.get(name)?;
        let content = render(template, vars, validate, Utc::now())?;
        fs.write_file(path, &content, template.sensitive)
            .with_context(|| format!("writing {}", path.display()))?;
        info!(template = name, path = %path.display(), "template rendered");
        Ok(())
    }

    /// Render each named template into `<root>/<set_name>/` and write a
    /// `manifest.json` describing the set. Unknown names are skipped and the
    /// set name is sanitized into a single path component.
    ///
    /// # Errors
    ///
    /// Returns an error if a known template fails to render or a file
    /// cannot be written.
    pub fn create_config_set(
        &self,
        fs: &impl LocalFs,
        set_name: &str,
        names: &[String],
        vars: &Map<String, Value>,
        root: &Path,
    ) -> Result<ConfigSet> {
        let directory = root.join(sanitize_filename(set_name, 255));
        let mut files = Vec::new();
        let mut skipped = Vec::new();
        let mut rendered = Vec::new();
        let mut manifest_files = Vec::new();

        for name in names {
            let Ok(template) = self.get(name) else {
                warn!(template = %name, "unknown template, skipping");
                skipped.push(name.clone());
                continue;
            };
            let path = directory.join(template.file_name());
            self.render_to_file(fs, name, vars, &path, true)?;
            let sha256 = fs.sha256_file(&path)?;
            manifest_files.push(json!({
                "template": name,
                "path": template.file_name(),
                "sha256": sha256,
            }));
            rendered.push(name.clone());
            files.push(path);
        }

        let manifest = json!({
            "name": set_name,
            "templates": rendered,
            "created_at": Utc::now().to_rfc3339(),
            "files": manifest_files,
        });
        let manifest_path = directory.join("manifest.json");
        let body = serde_json::to_string_pretty(&manifest).context("serializing manifest")?;
        fs.write_file(&manifest_path, &body, false)?;
        info!(set = set_name, files = files.len(), "config set created");

        Ok(ConfigSet {
            name: set_name.to_string(),
            directory,
            files,
            skipped,
            manifest: manifest_path,
        })
    }
}

/// Format implied by a file extension (`.env` files included).
#[must_use]
pub fn format_for_path(path: &Path) -> Option<ConfigFormat> {
    let name = path.file_name()?.to_string_lossy();
    if name == ".env" || name.starts_with(".env.") {
        return Some(ConfigFormat::Env);
    }
    path.extension()?.to_string_lossy().parse().ok()
}

/// Check a config file's syntax. The format defaults to the one implied by
/// the extension.
///
/// # Errors
///
/// Returns an error if the file cannot be read, the format cannot be
/// determined, or the content is malformed.
pub fn validate_config_file(fs: &impl LocalFs, path: &Path, format: Option<ConfigFormat>) -> Result<()> {
    let format = format
        .or_else(|| format_for_path(path))
        .with_context(|| format!("cannot infer format of {}", path.display()))?;
    let content = fs.read_file(path)?;
    validate_content(&content, format).map_err(|e| anyhow::anyhow!("{}: {e}", path.display()))
}
