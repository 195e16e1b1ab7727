use std::{
    collections::BTreeMap,
    fmt,
    path::PathBuf,
    str::FromStr,
};

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use storage::Storage;
use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExportFormat {
    #[default]
    Json,
    Toml,
}

impl ExportFormat {
    pub fn extension(self) -> &'static str {
        match self {
            ExportFormat::Json => "json",
            ExportFormat::Toml => "toml",
        }
    }

    fn render(self, messages: &BTreeMap<String, String>) -> Result<String> {
        match self {
            ExportFormat::Json => {
                let mut rendered = serde_json::to_string_pretty(messages)?;
                rendered.push('\n');
                Ok(rendered)
            }
            ExportFormat::Toml => Ok(toml::to_string(messages)?),
        }
    }
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

impl FromStr for ExportFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "json" => Ok(ExportFormat::Json),
            "toml" => Ok(ExportFormat::Toml),
            other => Err(format!("unsupported export format '{other}'")),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExportReport {
    pub files: Vec<PathBuf>,
    pub messages: usize,
}

/// Regenerates translation resource files from the store.
#[async_trait]
pub trait TranslationExporter: Send + Sync {
    async fn export(&self, locales: &[String]) -> Result<ExportReport>;
}

/// Writes one `<domain>.<locale>.<ext>` file per domain and locale.
#[derive(Clone)]
pub struct FileExporter {
    storage: Storage,
    output_dir: PathBuf,
    format: ExportFormat,
}

impl FileExporter {
    pub fn new(storage: Storage, output_dir: impl Into<PathBuf>, format: ExportFormat) -> Self {
        Self {
            storage,
            output_dir: output_dir.into(),
            format,
        }
    }

    pub fn file_name(&self, domain: &str, locale: &str) -> String {
        format!("{domain}.{locale}.{}", self.format.extension())
    }
}

#[async_trait]
impl TranslationExporter for FileExporter {
    async fn export(&self, locales: &[String]) -> Result<ExportReport> {
        let rows = self
            .storage
            .list_translations_for_locales(locales)
            .await
            .context("failed to read translations for export")?;

        let mut catalogues: BTreeMap<(String, String), BTreeMap<String, String>> = BTreeMap::new();
        for row in rows {
            catalogues
                .entry((row.domain, row.locale))
                .or_default()
                .insert(row.key, row.content);
        }

        tokio::fs::create_dir_all(&self.output_dir)
            .await
            .with_context(|| {
                format!(
                    "failed to create export directory '{}'",
                    self.output_dir.display()
                )
            })?;

        let mut report = ExportReport::default();
        for ((domain, locale), messages) in catalogues {
            if domain.contains(['/', '\\']) || domain.starts_with('.') {
                anyhow::bail!("domain '{domain}' cannot be used as a file name");
            }
            let path = self.output_dir.join(self.file_name(&domain, &locale));
            let rendered = self
                .format
                .render(&messages)
                .with_context(|| format!("failed to render {domain}.{locale}"))?;
            tokio::fs::write(&path, rendered)
                .await
                .with_context(|| format!("failed to write '{}'", path.display()))?;
            report.messages += messages.len();
            report.files.push(path);
        }

        info!(
            files = report.files.len(),
            messages = report.messages,
            format = %self.format,
            "translations exported"
        );
        Ok(report)
    }
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
