//! Configuration templates: built-in presets and the user template store.

mod builtin;
mod storage;

pub use builtin::*;
pub use storage::*;

use crate::config::{ConfigDocument, Extra, Merge};
use crate::error::{Error, Result};
use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info};

/// A configuration snapshot saved by the user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserTemplate {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(rename = "createdAt")]
    pub created_at: String,
    pub config: ConfigDocument,
    /// Keys written by other tools (tags, icons, ...), kept on every rewrite.
    #[serde(flatten)]
    pub extra: Extra,
}

const TEMPLATE_KEYS: &[&str] = &["id", "name", "description", "createdAt", "config"];

/// Partial update for [`TemplateStore::update_template`]. `id` and
/// `createdAt` cannot be changed.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TemplateUpdate {
    pub name: Option<String>,
    pub description: Option<String>,
    pub config: Option<ConfigDocument>,
}

/// How a template is applied to an existing document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApplyMode {
    /// The template becomes the whole document.
    #[default]
    Replace,
    /// The template is merged on top of the document.
    Overlay,
}

/// Produce the document that results from applying `template` to `base`.
pub fn instantiate(base: &ConfigDocument, template: &ConfigDocument, mode: ApplyMode) -> ConfigDocument {
    match mode {
        ApplyMode::Replace => template.clone(),
        ApplyMode::Overlay => base.merge(template),
    }
}

fn now_rfc3339() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

fn is_truthy(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) | Some(Value::Bool(false)) => false,
        Some(Value::String(s)) => !s.is_empty(),
        Some(Value::Number(n)) => n.as_f64() != Some(0.0),
        Some(_) => true,
    }
}

/// Build a fresh template (new id) out of an imported JSON value.
fn template_from_import(value: &Value) -> std::result::Result<UserTemplate, String> {
    let obj = value.as_object();
    let name = obj.and_then(|o| o.get("name"));
    let config = obj.and_then(|o| o.get("config"));
    if !is_truthy(name) || !is_truthy(config) {
        return Err("Invalid template format: missing name or config".to_string());
    }

    let name = match name {
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
        None => String::new(),
    };
    let config: ConfigDocument = serde_json::from_value(config.cloned().unwrap_or_default())
        .map_err(|e| format!("Invalid template config: {e}"))?;
    let text = |key: &str| {
        obj.and_then(|o| o.get(key))
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
    };

    Ok(UserTemplate {
        id: new_id(),
        name,
        description: text("description").unwrap_or_default(),
        created_at: text("createdAt").unwrap_or_else(now_rfc3339),
        config,
        extra: obj
            .map(|o| {
                o.iter()
                    .filter(|(key, _)| !TEMPLATE_KEYS.contains(&key.as_str()))
                    .map(|(key, value)| (key.clone(), value.clone()))
                    .collect()
            })
            .unwrap_or_default(),
    })
}

/// The user's template collection.
///
/// Every mutation is written through the storage backend first and only
/// then becomes visible; a failed write leaves the store unchanged.
pub struct TemplateStore {
    storage: Box<dyn TemplateStorage>,
    record: TemplateStoreRecord,
}

impl TemplateStore {
    /// Load the store from `storage`.
    pub fn open(storage: impl TemplateStorage + 'static) -> Result<Self> {
        let record = storage.load()?;
        debug!(count = record.user_templates.len(), "template store loaded");
        Ok(Self {
            storage: Box::new(storage),
            record,
        })
    }

    pub fn in_memory() -> Self {
        Self {
            storage: Box::new(MemoryTemplateStorage::new()),
            record: TemplateStoreRecord::default(),
        }
    }

    fn commit(&mut self, templates: Vec<UserTemplate>) -> Result<()> {
        let mut next = self.record.clone();
        next.user_templates = templates;
        next.version = next.version.max(STORE_VERSION);
        self.storage.save(&next)?;
        self.record = next;
        Ok(())
    }

    pub fn list(&self) -> &[UserTemplate] {
        &self.record.user_templates
    }

    pub fn get(&self, id: &str) -> Option<&UserTemplate> {
        self.record.user_templates.iter().find(|t| t.id == id)
    }

    pub fn len(&self) -> usize {
        self.record.user_templates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.record.user_templates.is_empty()
    }

    /// Case-insensitive search over name and description. A blank query
    /// returns everything.
    pub fn search(&self, query: &str) -> Vec<&UserTemplate> {
        let query = query.trim().to_lowercase();
        self.record
            .user_templates
            .iter()
            .filter(|t| {
                query.is_empty()
                    || t.name.to_lowercase().contains(&query)
                    || t.description.to_lowercase().contains(&query)
            })
            .collect()
    }

    pub fn save_as_template(
        &mut self,
        name: &str,
        description: &str,
        config: &ConfigDocument,
    ) -> Result<UserTemplate> {
        let template = UserTemplate {
            id: new_id(),
            name: name.to_string(),
            description: description.to_string(),
            created_at: now_rfc3339(),
            config: config.clone(),
            extra: Extra::new(),
        };
        let mut templates = self.record.user_templates.clone();
        templates.push(template.clone());
        self.commit(templates)?;
        info!(id = %template.id, name = %template.name, "template saved");
        Ok(template)
    }

    /// Remove a template. Returns whether one was removed.
    pub fn delete_template(&mut self, id: &str) -> Result<bool> {
        if self.get(id).is_none() {
            return Ok(false);
        }
        let templates = self
            .record
            .user_templates
            .iter()
            .filter(|t| t.id != id)
            .cloned()
            .collect();
        self.commit(templates)?;
        info!(id, "template deleted");
        Ok(true)
    }

    /// Import one template from JSON. The imported template always gets a
    /// fresh id.
    pub fn import_template(&mut self, json: &str) -> Result<UserTemplate> {
        let template = serde_json::from_str::<Value>(json)
            .map_err(|e| e.to_string())
            .and_then(|value| template_from_import(&value))
            .map_err(|msg| Error::format(format!("Failed to import template: {msg}")))?;

        let mut templates = self.record.user_templates.clone();
        templates.push(template.clone());
        self.commit(templates)?;
        info!(id = %template.id, name = %template.name, "template imported");
        Ok(template)
    }

    pub fn export_template(&self, id: &str) -> Result<String> {
        let template = self.get(id).ok_or_else(|| Error::NotFound(id.to_string()))?;
        serde_json::to_string_pretty(template).map_err(|e| Error::Internal(e.into()))
    }

    pub fn export_all_templates(&self) -> Result<String> {
        serde_json::to_string_pretty(&self.record.user_templates).map_err(|e| Error::Internal(e.into()))
    }

    /// Replace the whole collection with the templates in `json`. All
    /// entries are validated before anything changes.
    pub fn import_all_templates(&mut self, json: &str) -> Result<usize> {
        let templates = serde_json::from_str::<Value>(json)
            .map_err(|e| e.to_string())
            .and_then(|value| match value {
                Value::Array(items) => items
                    .iter()
                    .map(template_from_import)
                    .collect::<std::result::Result<Vec<_>, _>>(),
                _ => Err("Invalid format: expected array of templates".to_string()),
            })
            .map_err(|msg: String| Error::format(format!("Failed to import templates: {msg}")))?;

        let count = templates.len();
        self.commit(templates)?;
        info!(count, "templates imported, store replaced");
        Ok(count)
    }

    /// Shallow update of `name`, `description` and `config`. An unknown id
    /// is a no-op and returns `None`.
    pub fn update_template(&mut self, id: &str, updates: TemplateUpdate) -> Result<Option<UserTemplate>> {
        let Some(index) = self.record.user_templates.iter().position(|t| t.id == id) else {
            debug!(id, "update for unknown template ignored");
            return Ok(None);
        };

        let mut templates = self.record.user_templates.clone();
        let template = &mut templates[index];
        if let Some(name) = updates.name {
            template.name = name;
        }
        if let Some(description) = updates.description {
            template.description = description;
        }
        if let Some(config) = updates.config {
            template.config = config;
        }
        let updated = template.clone();
        self.commit(templates)?;
        Ok(Some(updated))
    }

    /// Copy a template under a new id, unknown keys included. The name
    /// defaults to `"<original> (Copy)"`.
    pub fn duplicate_template(&mut self, id: &str, new_name: Option<&str>) -> Result<UserTemplate> {
        let original = self.get(id).ok_or_else(|| Error::NotFound(id.to_string()))?;
        let copy = UserTemplate {
            id: new_id(),
            name: new_name
                .filter(|n| !n.is_empty())
                .map(str::to_string)
                .unwrap_or_else(|| format!("{} (Copy)", original.name)),
            description: original.description.clone(),
            created_at: now_rfc3339(),
            config: original.config.clone(),
            extra: original.extra.clone(),
        };
        let mut templates = self.record.user_templates.clone();
        templates.push(copy.clone());
        self.commit(templates)?;
        info!(from = id, id = %copy.id, "template duplicated");
        Ok(copy)
    }

    pub fn clear_all_templates(&mut self) -> Result<()> {
        self.commit(Vec::new())?;
        info!("all templates cleared");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use std::sync::Arc;

    fn config(model: &str) -> ConfigDocument {
        serde_json::from_value(json!({"model": model})).unwrap()
    }

    #[test]
    fn save_appends_with_fresh_ids() {
        let mut store = TemplateStore::in_memory();
        let a = store.save_as_template("A", "first", &config("a/x")).unwrap();
        let b = store.save_as_template("A", "first", &config("a/x")).unwrap();
        assert_ne!(a.id, b.id);
        assert_eq!(store.len(), 2);
        assert_eq!(store.list()[0].id, a.id);
        assert!(chrono::DateTime::parse_from_rfc3339(&a.created_at).is_ok());
    }

    #[test]
    fn delete_unknown_is_noop() {
        let mut store = TemplateStore::in_memory();
        let t = store.save_as_template("A", "", &config("a/x")).unwrap();
        assert!(!store.delete_template("missing").unwrap());
        assert_eq!(store.len(), 1);
        assert!(store.delete_template(&t.id).unwrap());
        assert!(store.is_empty());
    }

    #[test]
    fn import_requires_name_and_config() {
        let mut store = TemplateStore::in_memory();

        let err = store.import_template(r#"{"name": "x"}"#).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Failed to import template: Invalid template format: missing name or config"
        );
        assert_eq!(err.kind(), "format");

        let err = store.import_template(r#"{"name": "", "config": {}}"#).unwrap_err();
        assert_eq!(err.kind(), "format");

        let err = store.import_template("not json").unwrap_err();
        assert!(err.to_string().starts_with("Failed to import template: "));
        assert!(store.is_empty());
    }

    #[test]
    fn import_assigns_new_id_and_defaults() {
        let mut store = TemplateStore::in_memory();
        let t = store
            .import_template(r#"{"id": "keep-me", "name": "Imported", "config": {"model": "a/b"}}"#)
            .unwrap();
        assert_ne!(t.id, "keep-me");
        assert_eq!(t.description, "");
        assert!(!t.created_at.is_empty());
        assert_eq!(t.config.model.as_deref(), Some("a/b"));

        let dated = store
            .import_template(r#"{"name": "Old", "config": {}, "createdAt": "2024-01-01T00:00:00.000Z"}"#)
            .unwrap();
        assert_eq!(dated.created_at, "2024-01-01T00:00:00.000Z");
    }

    #[test]
    fn export_then_import_preserves_content() {
        let mut store = TemplateStore::in_memory();
        let t = store.save_as_template("Mine", "desc", &config("openai/gpt-4o")).unwrap();
        let json = store.export_template(&t.id).unwrap();
        assert!(json.contains("\n  \"name\": \"Mine\""));

        let back = store.import_template(&json).unwrap();
        assert_ne!(back.id, t.id);
        assert_eq!(back.name, t.name);
        assert_eq!(back.description, t.description);
        assert_eq!(back.config, t.config);

        let err = store.export_template("missing").unwrap_err();
        assert_eq!(err.to_string(), "Template with id \"missing\" not found");
    }

    #[test]
    fn import_all_replaces_store() {
        let mut store = TemplateStore::in_memory();
        store.save_as_template("Old", "", &config("a/x")).unwrap();

        let count = store
            .import_all_templates(r#"[{"name": "N1", "config": {}}, {"name": "N2", "config": {"model": "b/y"}}]"#)
            .unwrap();
        assert_eq!(count, 2);
        let names: Vec<&str> = store.list().iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["N1", "N2"]);
    }

    #[test]
    fn import_all_is_atomic() {
        let mut store = TemplateStore::in_memory();
        store.save_as_template("Keep", "", &config("a/x")).unwrap();
        let before = store.list().to_vec();

        let err = store
            .import_all_templates(r#"[{"name": "ok", "config": {}}, {"name": "broken"}]"#)
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "Failed to import templates: Invalid template format: missing name or config"
        );
        assert_eq!(store.list(), before.as_slice());

        let err = store.import_all_templates(r#"{"name": "x"}"#).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Failed to import templates: Invalid format: expected array of templates"
        );
        assert_eq!(store.list(), before.as_slice());
    }

    #[test]
    fn update_is_shallow_and_keeps_identity() {
        let mut store = TemplateStore::in_memory();
        let t = store.save_as_template("A", "old", &config("a/x")).unwrap();

        let updated = store
            .update_template(
                &t.id,
                TemplateUpdate {
                    name: Some("B".into()),
                    ..Default::default()
                },
            )
            .unwrap()
            .unwrap();
        assert_eq!(updated.id, t.id);
        assert_eq!(updated.created_at, t.created_at);
        assert_eq!(updated.name, "B");
        assert_eq!(updated.description, "old");
        assert_eq!(updated.config, t.config);

        assert!(store.update_template("missing", TemplateUpdate::default()).unwrap().is_none());
    }

    #[test]
    fn duplicate_defaults_name_and_copies_config() {
        let mut store = TemplateStore::in_memory();
        let t = store.save_as_template("Base", "d", &config("a/x")).unwrap();

        let copy = store.duplicate_template(&t.id, None).unwrap();
        assert_eq!(copy.name, "Base (Copy)");
        assert_ne!(copy.id, t.id);
        assert_eq!(copy.config, t.config);
        assert_eq!(copy.description, "d");

        let named = store.duplicate_template(&t.id, Some("Other")).unwrap();
        assert_eq!(named.name, "Other");
        assert_eq!(store.len(), 3);

        assert_eq!(store.duplicate_template("missing", None).unwrap_err().kind(), "not_found");
    }

    #[test]
    fn search_is_case_insensitive() {
        let mut store = TemplateStore::in_memory();
        store.save_as_template("Local Ollama", "offline", &config("a/x")).unwrap();
        store.save_as_template("Work", "Strict OFFLINE policy", &config("a/x")).unwrap();
        store.save_as_template("Cloud", "", &config("a/x")).unwrap();

        assert_eq!(store.search("offline").len(), 2);
        assert_eq!(store.search("OLLAMA").len(), 1);
        assert_eq!(store.search("  ").len(), 3);
    }

    #[test]
    fn failed_write_leaves_store_unchanged() {
        let storage = Arc::new(MemoryTemplateStorage::new());
        let mut store = TemplateStore::open(storage.clone()).unwrap();
        let t = store.save_as_template("A", "", &config("a/x")).unwrap();

        storage.fail_writes(true);
        assert!(store.save_as_template("B", "", &config("a/x")).is_err());
        assert!(store.delete_template(&t.id).is_err());
        assert!(store.clear_all_templates().is_err());
        assert_eq!(store.len(), 1);
        assert_eq!(storage.snapshot().user_templates.len(), 1);
    }

    #[test]
    fn store_keeps_unknown_record_keys_and_newer_version() {
        let mut record = TemplateStoreRecord {
            version: 3,
            ..Default::default()
        };
        record.extra.insert("favorites".into(), json!(["x"]));
        let storage = Arc::new(MemoryTemplateStorage::with_record(record));

        let mut store = TemplateStore::open(storage.clone()).unwrap();
        store.save_as_template("A", "", &config("a/x")).unwrap();

        let saved = storage.snapshot();
        assert_eq!(saved.version, 3);
        assert_eq!(saved.extra.get("favorites"), Some(&json!(["x"])));
    }

    #[test]
    fn unknown_template_keys_survive_rewrites() {
        let record = TemplateStoreRecord {
            user_templates: serde_json::from_value(json!([{
                "id": "a",
                "name": "n",
                "description": "",
                "createdAt": "x",
                "config": {},
                "tags": ["t"]
            }]))
            .unwrap(),
            ..Default::default()
        };
        let storage = Arc::new(MemoryTemplateStorage::with_record(record));
        let mut store = TemplateStore::open(storage.clone()).unwrap();

        store.save_as_template("B", "", &config("a/x")).unwrap();
        let saved = serde_json::to_value(&storage.snapshot().user_templates[0]).unwrap();
        assert_eq!(saved["tags"], json!(["t"]));

        let rename = TemplateUpdate {
            name: Some("m".into()),
            ..Default::default()
        };
        let renamed = store.update_template("a", rename).unwrap().unwrap();
        assert_eq!(renamed.extra.get("tags"), Some(&json!(["t"])));

        let copy = store.duplicate_template("a", None).unwrap();
        assert_eq!(copy.extra.get("tags"), Some(&json!(["t"])));
        assert!(store.save_as_template("C", "", &config("a/x")).unwrap().extra.is_empty());
    }

    #[test]
    fn import_keeps_unknown_keys_but_not_the_id() {
        let mut store = TemplateStore::in_memory();
        let t = store
            .import_template(r#"{"id": "old", "name": "n", "config": {"model": "a/b"}, "icon": "🚀"}"#)
            .unwrap();
        assert_ne!(t.id, "old");
        assert_eq!(t.extra.get("icon"), Some(&json!("🚀")));
        assert!(t.extra.get("id").is_none());
        assert!(t.extra.get("config").is_none());
    }

    #[test]
    fn instantiate_modes() {
        let base: ConfigDocument =
            serde_json::from_value(json!({"model": "a/x", "theme": "dark"})).unwrap();
        let template = config("b/y");

        let replaced = instantiate(&base, &template, ApplyMode::Replace);
        assert_eq!(replaced, template);

        let overlaid = instantiate(&base, &template, ApplyMode::Overlay);
        assert_eq!(overlaid.model.as_deref(), Some("b/y"));
        assert_eq!(overlaid.theme.as_deref(), Some("dark"));
    }
}
