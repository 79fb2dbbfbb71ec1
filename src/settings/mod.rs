//! Runtime settings for ocforge itself (not the opencode document it edits).

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

use crate::config::omo::{default_omo_config_path, OMO_CONFIG_FILE_NAME};
use crate::config::{default_config_path, expand_home};
use crate::models::lister::{DEFAULT_TIMEOUT_SECS, MAX_OUTPUT_BYTES};

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    3001
}

fn default_cors_origin() -> String {
    "*".to_string()
}

fn default_static_dir() -> PathBuf {
    PathBuf::from("dist")
}

fn default_model_list_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

fn default_model_list_max_bytes() -> usize {
    MAX_OUTPUT_BYTES
}

/// Server and storage settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// `*` allows any origin.
    #[serde(default = "default_cors_origin")]
    pub cors_origin: String,
    /// Directory holding the built web UI.
    #[serde(default = "default_static_dir")]
    pub static_dir: PathBuf,
    /// Where the template store lives.
    #[serde(default = "resolve_state_dir")]
    pub state_dir: PathBuf,
    /// opencode.json to edit when a request names none.
    #[serde(default)]
    pub config_path: Option<PathBuf>,
    /// oh-my-opencode.json; defaults to the file next to `config_path`.
    #[serde(default)]
    pub omo_config_path: Option<PathBuf>,
    #[serde(default = "default_model_list_timeout_secs")]
    pub model_list_timeout_secs: u64,
    #[serde(default = "default_model_list_max_bytes")]
    pub model_list_max_bytes: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            cors_origin: default_cors_origin(),
            static_dir: default_static_dir(),
            state_dir: resolve_state_dir(),
            config_path: None,
            omo_config_path: None,
            model_list_timeout_secs: default_model_list_timeout_secs(),
            model_list_max_bytes: default_model_list_max_bytes(),
        }
    }
}

impl Settings {
    /// Load settings from file, environment, and defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let settings_path = path.map(Path::to_path_buf).or_else(find_settings_file);

        let mut settings = match settings_path {
            Some(ref p) if p.exists() => {
                info!("Loading settings from {}", p.display());
                load_settings_file(p)?
            }
            _ => {
                info!("No settings file found, using defaults");
                Settings::default()
            }
        };

        settings.apply_env_overrides();
        Ok(settings)
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(port) = std::env::var("PORT") {
            if let Ok(port) = port.parse() {
                self.port = port;
            }
        }

        if let Ok(host) = std::env::var("OCFORGE_HOST") {
            self.host = host;
        }

        if let Ok(origin) = std::env::var("CORS_ORIGIN") {
            self.cors_origin = origin;
        }

        if let Ok(dir) = std::env::var("OCFORGE_STATIC_DIR") {
            self.static_dir = PathBuf::from(dir);
        }

        if let Ok(dir) = std::env::var("OCFORGE_STATE_DIR") {
            self.state_dir = expand_home(&dir);
        }
    }

    /// The opencode document used when a caller does not name one.
    pub fn document_path(&self) -> PathBuf {
        self.config_path
            .clone()
            .unwrap_or_else(default_config_path)
    }

    /// The oh-my-opencode document used when a caller does not name one.
    pub fn omo_document_path(&self) -> PathBuf {
        match (&self.omo_config_path, &self.config_path) {
            (Some(path), _) => path.clone(),
            (None, Some(config)) => config.with_file_name(OMO_CONFIG_FILE_NAME),
            (None, None) => default_omo_config_path(),
        }
    }

    pub fn model_list_timeout(&self) -> Duration {
        Duration::from_secs(self.model_list_timeout_secs)
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Find the settings file in standard locations.
fn find_settings_file() -> Option<PathBuf> {
    let candidates = [
        PathBuf::from("ocforge.json"),
        PathBuf::from("ocforge.yaml"),
        PathBuf::from("ocforge.yml"),
        PathBuf::from("ocforge.toml"),
    ];

    for path in &candidates {
        if path.exists() {
            return Some(path.clone());
        }
    }

    dirs::home_dir()
        .map(|home| home.join(".ocforge").join("settings.json"))
        .filter(|p| p.exists())
}

/// Resolve the state directory for persistent data.
fn resolve_state_dir() -> PathBuf {
    dirs::home_dir()
        .map(|h| h.join(".ocforge"))
        .unwrap_or_else(|| PathBuf::from(".ocforge"))
}

/// Load settings from a file path.
fn load_settings_file(path: &Path) -> Result<Settings> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read settings file '{}'", path.display()))?;

    let settings = match path.extension().and_then(|e| e.to_str()) {
        Some("yaml") | Some("yml") => serde_yaml::from_str(&content)?,
        Some("toml") => toml::from_str(&content)?,
        _ => json5::from_str(&content)
            .with_context(|| format!("Invalid settings file '{}'", path.display()))?,
    };

    Ok(settings)
}
