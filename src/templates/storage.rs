//! Persistence for user templates.

use super::UserTemplate;
use anyhow::{Context, Result};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// File name of the persisted store inside the state directory.
pub const STORE_FILE_NAME: &str = "opencode-templates-storage.json";

/// Current on-disk schema version.
pub const STORE_VERSION: u32 = 1;

/// On-disk shape of the template store. Unknown keys are kept so a newer
/// writer's data survives a rewrite by this one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemplateStoreRecord {
    #[serde(default = "default_version")]
    pub version: u32,
    #[serde(rename = "userTemplates", default)]
    pub user_templates: Vec<UserTemplate>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

fn default_version() -> u32 {
    STORE_VERSION
}

impl Default for TemplateStoreRecord {
    fn default() -> Self {
        Self {
            version: STORE_VERSION,
            user_templates: Vec::new(),
            extra: serde_json::Map::new(),
        }
    }
}

/// Where the store record lives.
pub trait TemplateStorage: Send {
    fn load(&self) -> Result<TemplateStoreRecord>;
    fn save(&self, record: &TemplateStoreRecord) -> Result<()>;
}

/// JSON file storage.
pub struct FileTemplateStorage {
    path: PathBuf,
}

impl FileTemplateStorage {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Storage at `<state_dir>/opencode-templates-storage.json`.
    pub fn in_dir(state_dir: &Path) -> Self {
        Self::new(state_dir.join(STORE_FILE_NAME))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl TemplateStorage for FileTemplateStorage {
    fn load(&self) -> Result<TemplateStoreRecord> {
        let text = match std::fs::read_to_string(&self.path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "no template store yet");
                return Ok(TemplateStoreRecord::default());
            }
            Err(e) => {
                return Err(e).with_context(|| {
                    format!("Failed to read template store '{}'", self.path.display())
                })
            }
        };

        let record: TemplateStoreRecord = serde_json::from_str(&text)
            .with_context(|| format!("Template store '{}' is corrupt", self.path.display()))?;
        if record.version > STORE_VERSION {
            warn!(
                version = record.version,
                supported = STORE_VERSION,
                "template store written by a newer version"
            );
        }
        Ok(record)
    }

    fn save(&self, record: &TemplateStoreRecord) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create '{}'", parent.display()))?;
        }
        let text = serde_json::to_string_pretty(record)?;
        // Write to a sibling temp file first so a crash never truncates the store.
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, text)
            .with_context(|| format!("Failed to write '{}'", tmp.display()))?;
        std::fs::rename(&tmp, &self.path)
            .with_context(|| format!("Failed to replace '{}'", self.path.display()))?;
        Ok(())
    }
}

/// In-memory storage for tests and ephemeral sessions.
#[derive(Default)]
pub struct MemoryTemplateStorage {
    record: Mutex<TemplateStoreRecord>,
    fail_writes: Mutex<bool>,
}

impl MemoryTemplateStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_record(record: TemplateStoreRecord) -> Self {
        Self {
            record: Mutex::new(record),
            fail_writes: Mutex::new(false),
        }
    }

    /// Make every subsequent `save` fail.
    pub fn fail_writes(&self, fail: bool) {
        *self.fail_writes.lock() = fail;
    }

    pub fn snapshot(&self) -> TemplateStoreRecord {
        self.record.lock().clone()
    }
}

impl TemplateStorage for MemoryTemplateStorage {
    fn load(&self) -> Result<TemplateStoreRecord> {
        Ok(self.record.lock().clone())
    }

    fn save(&self, record: &TemplateStoreRecord) -> Result<()> {
        if *self.fail_writes.lock() {
            anyhow::bail!("storage is read-only");
        }
        *self.record.lock() = record.clone();
        Ok(())
    }
}

impl<T: TemplateStorage + Sync> TemplateStorage for std::sync::Arc<T> {
    fn load(&self) -> Result<TemplateStoreRecord> {
        (**self).load()
    }

    fn save(&self, record: &TemplateStoreRecord) -> Result<()> {
        (**self).save(record)
    }
}
