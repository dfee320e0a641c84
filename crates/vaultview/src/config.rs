//! Configuration file (vaultview.toml).

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;

use vaultview_markdown::RenderOptions;
use vaultview_preview::BuildConfig;
use vaultview_server::ServerConfig;

/// Config file looked up in the working directory when none is given.
pub const DEFAULT_CONFIG_FILE: &str = "vaultview.toml";

/// Configuration file structure.
#[derive(Debug, Deserialize, Default, PartialEq)]
#[serde(default)]
pub struct ConfigFile {
    pub preview: PreviewSection,
    pub server: ServerSection,
    pub watch: WatchSection,
}

#[derive(Debug, Deserialize, PartialEq)]
#[serde(default)]
pub struct PreviewSection {
    pub output: String,
    pub title: String,
    pub minify: bool,
    pub allow_raw_html: bool,
    /// Extra directory names to skip
    pub exclude: Vec<String>,
}

impl Default for PreviewSection {
    fn default() -> Self {
        Self {
            output: "index.html".to_string(),
            title: "Notes".to_string(),
            minify: true,
            allow_raw_html: false,
            exclude: Vec::new(),
        }
    }
}

#[derive(Debug, Deserialize, PartialEq)]
#[serde(default)]
pub struct ServerSection {
    pub host: String,
    pub port: u16,
    pub open: bool,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 9099,
            open: false,
        }
    }
}

#[derive(Debug, Deserialize, PartialEq)]
#[serde(default)]
pub struct WatchSection {
    pub enabled: bool,
    pub debounce_ms: u64,
}

impl Default for WatchSection {
    fn default() -> Self {
        Self {
            enabled: true,
            debounce_ms: 500,
        }
    }
}

/// Load the config file.
///
/// An explicitly given file must exist. The default file is optional; a
/// file that exists but is malformed is always an error.
pub fn load_config(explicit: Option<&Path>) -> Result<ConfigFile> {
    let path = explicit.unwrap_or_else(|| Path::new(DEFAULT_CONFIG_FILE));

    if explicit.is_none() && !path.exists() {
        return Ok(ConfigFile::default());
    }

    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let config: ConfigFile =
        toml::from_str(&content).with_context(|| format!("Failed to parse {}", path.display()))?;

    tracing::info!("Loaded config from {}", path.display());

    Ok(config)
}

impl ConfigFile {
    /// Build settings for `root`, with an optional output name override.
    pub fn build_config(&self, root: PathBuf, output: Option<String>) -> BuildConfig {
        BuildConfig {
            root,
            output: output.unwrap_or_else(|| self.preview.output.clone()),
            title: self.preview.title.clone(),
            minify: self.preview.minify,
            exclude: self.preview.exclude.clone(),
            render: RenderOptions {
                allow_raw_html: self.preview.allow_raw_html,
                ..Default::default()
            },
        }
    }

    /// Server settings before command-line overrides.
    pub fn server_config(&self) -> ServerConfig {
        ServerConfig {
            host: self.server.host.clone(),
            port: self.server.port,
            open: self.server.open,
            watch: self.watch.enabled,
            debounce: Duration::from_millis(self.watch.debounce_ms),
        }
    }
}
