//! Editing session over one configuration file.

use crate::config::{self, ConfigDocument, Merge};
use crate::error::{Error, Result};
use serde_json::Value;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Owns the in-memory document for one file and tracks unsaved changes.
///
/// Patches go through [`Merge`], which never deletes. Removing a field is
/// done explicitly with [`ConfigEditor::clear`].
#[derive(Debug, Clone)]
pub struct ConfigEditor {
    path: PathBuf,
    document: ConfigDocument,
    saved_hash: String,
}

impl ConfigEditor {
    /// Load `path` (a missing file opens as the minimal document).
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let document = config::read_document(&path)?;
        let saved_hash = document.content_hash();
        debug!(path = %path.display(), "editor opened");
        Ok(Self {
            path,
            document,
            saved_hash,
        })
    }

    /// Start from an in-memory document. It counts as unsaved.
    pub fn from_document(path: impl Into<PathBuf>, document: ConfigDocument) -> Self {
        Self {
            path: path.into(),
            document,
            saved_hash: String::new(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn document(&self) -> &ConfigDocument {
        &self.document
    }

    pub fn effective(&self) -> ConfigDocument {
        self.document.effective()
    }

    /// Apply a partial document on top of the current one.
    pub fn update(&mut self, patch: &ConfigDocument) {
        self.document = self.document.merge(patch);
    }

    pub fn replace(&mut self, document: ConfigDocument) {
        self.document = document;
    }

    /// Remove the field at `path` (e.g. `["provider", "ollama", "options"]`).
    ///
    /// Parent objects left empty by the removal are pruned too, except the
    /// root. Returns whether anything was removed.
    pub fn clear(&mut self, path: &[&str]) -> Result<bool> {
        let Some((first, rest)) = path.split_first() else {
            return Ok(false);
        };
        let mut value = serde_json::to_value(&self.document).map_err(|e| Error::Internal(e.into()))?;
        let Some(root) = value.as_object_mut() else {
            return Ok(false);
        };

        if !remove_at(root, first, rest) {
            return Ok(false);
        }

        self.document = serde_json::from_value(value).map_err(|e| {
            Error::format(format!("Clearing {} left an invalid document: {e}", path.join(".")))
        })?;
        debug!(path = %path.join("."), "field cleared");
        Ok(true)
    }

    pub fn is_dirty(&self) -> bool {
        self.document.content_hash() != self.saved_hash
    }

    /// Write the document back to its file.
    pub fn save(&mut self) -> Result<()> {
        config::write_document(&self.path, &self.document)?;
        self.saved_hash = self.document.content_hash();
        info!(path = %self.path.display(), "configuration saved");
        Ok(())
    }
}

/// Remove `key` (then `rest`) below `map`, pruning objects emptied on the way.
fn remove_at(map: &mut serde_json::Map<String, Value>, key: &str, rest: &[&str]) -> bool {
    let Some((next, tail)) = rest.split_first() else {
        return map.remove(key).is_some();
    };
    let Some(Value::Object(child)) = map.get_mut(key) else {
        return false;
    };
    let removed = remove_at(child, next, tail);
    if removed && child.is_empty() {
        map.remove(key);
    }
    removed
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use tempfile::TempDir;

    fn doc(value: Value) -> ConfigDocument {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn open_missing_file_is_clean_minimal_document() {
        let dir = TempDir::new().unwrap();
        let editor = ConfigEditor::open(dir.path().join("opencode.json")).unwrap();
        assert_eq!(editor.document(), &config::minimal_document());
        assert!(!editor.is_dirty());
    }

    #[test]
    fn update_merges_and_marks_dirty() {
        let dir = TempDir::new().unwrap();
        let mut editor = ConfigEditor::open(dir.path().join("opencode.json")).unwrap();
        editor.update(&doc(json!({"model": "openai/gpt-4o", "server": {"port": 4000}})));
        editor.update(&doc(json!({"server": {"hostname": "0.0.0.0"}})));

        assert!(editor.is_dirty());
        let server = editor.document().server.clone().unwrap();
        assert_eq!(server.port, Some(4000));
        assert_eq!(server.hostname.as_deref(), Some("0.0.0.0"));
        assert_eq!(editor.document().schema.as_deref(), Some(config::DEFAULT_SCHEMA_URL));
    }

    #[test]
    fn save_round_trips_and_resets_dirty() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("opencode.json");
        let mut editor = ConfigEditor::open(&path).unwrap();
        editor.update(&doc(json!({"theme": "tokyonight", "futureKey": [1, 2]})));
        editor.save().unwrap();
        assert!(!editor.is_dirty());

        let reopened = ConfigEditor::open(&path).unwrap();
        assert_eq!(reopened.document(), editor.document());
        assert_eq!(reopened.document().extra.get("futureKey"), Some(&json!([1, 2])));
    }

    #[test]
    fn clear_removes_field_and_prunes_empty_parents() {
        let mut editor = ConfigEditor::from_document(
            "/tmp/unused.json",
            doc(json!({
                "provider": {"ollama": {"options": {"baseURL": "http://localhost:11434/v1"}}},
                "tui": {"scroll_speed": 2.5, "diff_style": "stacked"}
            })),
        );

        assert!(editor.clear(&["provider", "ollama", "options", "baseURL"]).unwrap());
        assert!(editor.document().provider.is_none());

        assert!(editor.clear(&["tui", "scroll_speed"]).unwrap());
        assert_eq!(
            serde_json::to_value(editor.document()).unwrap(),
            json!({"tui": {"diff_style": "stacked"}})
        );
    }

    #[test]
    fn clear_missing_path_is_noop() {
        let mut editor = ConfigEditor::from_document("/tmp/unused.json", doc(json!({"model": "a/b"})));
        assert!(!editor.clear(&["server", "port"]).unwrap());
        assert!(!editor.clear(&["model", "deeper"]).unwrap());
        assert!(!editor.clear(&[]).unwrap());
        assert_eq!(editor.document().model.as_deref(), Some("a/b"));
    }

    #[test]
    fn clear_then_effective_restores_default() {
        let mut editor = ConfigEditor::from_document("/tmp/unused.json", doc(json!({"snapshot": false})));
        assert_eq!(editor.effective().snapshot, Some(false));
        editor.clear(&["snapshot"]).unwrap();
        assert_eq!(editor.effective().snapshot, Some(true));
    }
}
