use super::defaults::{minimal_document, CONFIG_DIR_NAME, CONFIG_FILE_NAME};
use super::ConfigDocument;
use crate::error::{Error, Result};
use serde::de::DeserializeOwned;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Maximum size for a config file (10 MB).
pub const MAX_CONFIG_FILE_BYTES: u64 = 10 * 1024 * 1024;

/// Expand a leading `~` to the user's home directory.
pub fn expand_home(path: &str) -> PathBuf {
    if path == "~" {
        if let Some(home) = dirs::home_dir() {
            return home;
        }
    }
    if let Some(rest) = path.strip_prefix("~/").or_else(|| path.strip_prefix("~\\")) {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    PathBuf::from(path)
}

/// Platform configuration directory for opencode.
///
/// - Windows: `%LOCALAPPDATA%\opencode`
/// - macOS: `~/.config/opencode`
/// - everything else: `$XDG_CONFIG_HOME/opencode`, falling back to `~/.config/opencode`
pub fn default_config_dir() -> PathBuf {
    let home = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));

    if cfg!(windows) {
        let base = std::env::var_os("LOCALAPPDATA")
            .map(PathBuf::from)
            .unwrap_or_else(|| home.join("AppData").join("Local"));
        return base.join(CONFIG_DIR_NAME);
    }

    if cfg!(target_os = "macos") {
        return home.join(".config").join(CONFIG_DIR_NAME);
    }

    std::env::var_os("XDG_CONFIG_HOME")
        .filter(|v| !v.is_empty())
        .map(PathBuf::from)
        .unwrap_or_else(|| home.join(".config"))
        .join(CONFIG_DIR_NAME)
}

pub fn default_config_path() -> PathBuf {
    default_config_dir().join(CONFIG_FILE_NAME)
}

/// Read the raw text of a configuration document.
///
/// A missing file is not an error: the pretty-printed minimal document is
/// returned so a fresh install can be edited straight away.
pub fn read_document_text(path: &Path) -> Result<String> {
    match read_capped(path)? {
        Some(text) => Ok(text),
        None => {
            debug!(path = %path.display(), "config file missing, using minimal document");
            minimal_document()
                .to_pretty_json()
                .map_err(|e| Error::Internal(e.into()))
        }
    }
}

/// Read a file of at most [`MAX_CONFIG_FILE_BYTES`]. `None` when it does not
/// exist.
pub(crate) fn read_capped(path: &Path) -> Result<Option<String>> {
    let metadata = match std::fs::metadata(path) {
        Ok(m) => m,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(source) => {
            return Err(Error::Io {
                path: path.to_path_buf(),
                source,
            })
        }
    };

    if metadata.len() > MAX_CONFIG_FILE_BYTES {
        return Err(Error::Internal(anyhow::anyhow!(
            "Config file '{}' is {} bytes, exceeds limit of {} bytes",
            path.display(),
            metadata.len(),
            MAX_CONFIG_FILE_BYTES,
        )));
    }

    std::fs::read_to_string(path).map(Some).map_err(|source| Error::Io {
        path: path.to_path_buf(),
        source,
    })
}

/// Parse document text. Strict JSON first, then JSON5 so hand-edited files
/// with comments or trailing commas still load.
pub fn parse_document(text: &str) -> Result<ConfigDocument> {
    parse_lenient(text, "config")
}

/// Strict JSON, then JSON5. Errors read `Invalid <label> JSON: ...`.
pub(crate) fn parse_lenient<T: DeserializeOwned>(text: &str, label: &str) -> Result<T> {
    match serde_json::from_str::<T>(text) {
        Ok(doc) => Ok(doc),
        Err(strict) => {
            let value: serde_json::Value = json5::from_str(text)
                .map_err(|_| Error::format(format!("Invalid {label} JSON: {strict}")))?;
            serde_json::from_value(value).map_err(|e| Error::format(format!("Invalid {label} JSON: {e}")))
        }
    }
}

pub fn read_document(path: &Path) -> Result<ConfigDocument> {
    let text = read_document_text(path)?;
    parse_document(&text)
}

/// Write raw text, creating parent directories as needed.
pub fn write_document_text(path: &Path, text: &str) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|source| Error::Io {
            path: parent.to_path_buf(),
            source,
        })?;
    }
    std::fs::write(path, text).map_err(|source| Error::Io {
        path: path.to_path_buf(),
        source,
    })?;
    info!(path = %path.display(), bytes = text.len(), "config written");
    Ok(())
}

pub fn write_document(path: &Path, doc: &ConfigDocument) -> Result<()> {
    let text = doc.to_pretty_json().map_err(|e| Error::Internal(e.into()))?;
    write_document_text(path, &text)
}

/// Compute a hash of a document value for change detection.
pub fn resolve_document_hash(value: &serde_json::Value) -> String {
    use sha2::{Digest, Sha256};
    let canonical = serde_json::to_string(value).unwrap_or_default();
    let hash = Sha256::digest(canonical.as_bytes());
    hex::encode(hash)
}

// ============================================================================
// Tests
// ============================================================================
