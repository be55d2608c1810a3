//! Client settings: where the backend lives and how often to poll it.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

use crate::poll::DEFAULT_POLL_INTERVAL_SECS;
use crate::transport::{DEFAULT_NOTIFICATION_LIMIT, DEFAULT_TIMEOUT_SECS};

/// Backend the CLI talks to when nothing else is configured.
pub const DEFAULT_API_URL: &str = "http://localhost:8085";

/// Settings file name looked up in the working directory.
const SETTINGS_STEM: &str = "relaybell";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Settings {
    /// Base URL of the backend; `/api/...` is appended.
    pub api_url: String,
    pub timeout_secs: u64,
    pub poll_interval_secs: u64,
    pub notification_limit: u32,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            poll_interval_secs: DEFAULT_POLL_INTERVAL_SECS,
            notification_limit: DEFAULT_NOTIFICATION_LIMIT,
        }
    }
}

impl Settings {
    /// Load settings from file, environment, and defaults.
    pub fn load(path: Option<&str>) -> Result<Self> {
        let settings_path = path.map(PathBuf::from).or_else(find_settings_file);

        let mut settings = match settings_path {
            Some(p) if p.exists() => {
                info!("Loading settings from {}", p.display());
                load_settings_file(&p)?
            }
            Some(p) => {
                warn!("Settings file {} not found, using defaults", p.display());
                Settings::default()
            }
            None => Settings::default(),
        };

        settings.apply_env_overrides();
        settings.validate()?;
        Ok(settings)
    }

    /// Write default settings to a file.
    pub fn write_default(path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(&Settings::default())?;
        std::fs::write(path, json)
            .with_context(|| format!("Failed to write settings file '{}'", path.display()))?;
        Ok(())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs.max(1))
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs.max(1))
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(url) = std::env::var("RELAYBELL_API_URL") {
            self.api_url = url;
        }

        if let Ok(secs) = std::env::var("RELAYBELL_POLL_INTERVAL_SECS") {
            match secs.parse() {
                Ok(secs) => self.poll_interval_secs = secs,
                Err(_) => warn!("Ignoring RELAYBELL_POLL_INTERVAL_SECS={}", secs),
            }
        }

        if let Ok(secs) = std::env::var("RELAYBELL_TIMEOUT_SECS") {
            match secs.parse() {
                Ok(secs) => self.timeout_secs = secs,
                Err(_) => warn!("Ignoring RELAYBELL_TIMEOUT_SECS={}", secs),
            }
        }
    }

    fn validate(&self) -> Result<()> {
        let url = url::Url::parse(&self.api_url)
            .with_context(|| format!("Invalid API URL '{}'", self.api_url))?;
        if !matches!(url.scheme(), "http" | "https") {
            anyhow::bail!("API URL '{}' must use http or https", self.api_url);
        }
        Ok(())
    }
}

/// Find the settings file in standard locations.
fn find_settings_file() -> Option<PathBuf> {
    let candidates = ["json", "yaml", "yml", "toml"]
        .map(|ext| PathBuf::from(format!("{SETTINGS_STEM}.{ext}")));

    if let Some(path) = candidates.iter().find(|p| p.exists()) {
        return Some(path.clone());
    }

    dirs::home_dir()
        .map(|home| home.join(".relaybell").join("config.json"))
        .filter(|p| p.exists())
}

/// Load settings from a file path, picking the format by extension.
fn load_settings_file(path: &Path) -> Result<Settings> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read settings file '{}'", path.display()))?;

    let settings = match path.extension().and_then(|e| e.to_str()) {
        Some("yaml") | Some("yml") => serde_yaml::from_str(&content)?,
        Some("toml") => toml::from_str(&content)?,
        _ => json5::from_str(&content)?,
    };

    Ok(settings)
}
