//! Settings file loading.

use std::path::{Path, PathBuf};

use anyhow::Context;
use postwire_server::ServerConfig;
use serde::Deserialize;

/// Default listen address.
pub const DEFAULT_LISTEN: &str = "127.0.0.1:2525";

/// Daemon settings, read from `settings.json`.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Socket address to accept connections on.
    pub listen: String,
    /// Session configuration.
    pub server: ServerConfig,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            listen: DEFAULT_LISTEN.to_string(),
            server: ServerConfig::default(),
        }
    }
}

/// Path of the settings file in the user's config directory.
pub fn default_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("postwire")
        .join("settings.json")
}

/// Loads settings from `path`, or from [`default_path`] when `None`.
///
/// A missing file at the default location yields the default settings. An
/// explicitly given path must exist.
pub async fn load(path: Option<PathBuf>) -> anyhow::Result<Settings> {
    let explicit = path.is_some();
    let path = path.unwrap_or_else(default_path);

    if !explicit && !path.exists() {
        tracing::debug!(path = %path.display(), "no settings file, using defaults");
        return Ok(Settings::default());
    }

    let contents = tokio::fs::read_to_string(&path)
        .await
        .with_context(|| format!("reading {}", path.display()))?;
    parse(&contents, &path)
}

fn parse(contents: &str, path: &Path) -> anyhow::Result<Settings> {
    serde_json::from_str(contents).with_context(|| format!("parsing {}", path.display()))
}
