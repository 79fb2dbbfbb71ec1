//! End-to-end flows through the library: open a document, apply presets,
//! ask permission questions, persist templates across restarts.

use ocforge::config::{self, ConfigDocument, PermissionAction};
use ocforge::editor::ConfigEditor;
use ocforge::permission::{Layer, PermissionResolver};
use ocforge::templates::{builtin_template, instantiate, ApplyMode, FileTemplateStorage, TemplateStore};
use pretty_assertions::assert_eq;
use serde_json::json;
use tempfile::TempDir;

fn doc(value: serde_json::Value) -> ConfigDocument {
    serde_json::from_value(value).unwrap()
}

#[test]
fn overlay_preset_then_resolve_and_save() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("opencode.json");
    std::fs::write(&path, r#"{"model": "openai/gpt-4o", "theme": "nord"}"#).unwrap();

    let mut editor = ConfigEditor::open(&path).unwrap();
    assert!(!editor.is_dirty());

    let preset = builtin_template("security-strict").unwrap();
    let next = instantiate(editor.document(), &preset.config, ApplyMode::Overlay);
    editor.replace(next);
    assert!(editor.is_dirty());

    // Overlay keeps untouched keys and takes the preset's model.
    let current = serde_json::to_value(editor.document()).unwrap();
    assert_eq!(current["theme"], "nord");
    assert_eq!(current["model"], "anthropic/claude-sonnet-4-20250514");

    let resolver = PermissionResolver::default();
    let effective = editor.effective();
    let rm = resolver.resolve_in_document(&effective, None, "bash", Some("rm -rf /"));
    assert_eq!(rm.action, PermissionAction::Deny);
    assert_eq!(rm.layer, Layer::Global);
    assert_eq!(rm.pattern.as_deref(), Some("rm *"));

    let env = resolver.resolve_in_document(&effective, None, "read", Some("config/.env"));
    assert_eq!(env.action, PermissionAction::Deny);

    editor.save().unwrap();
    assert!(!editor.is_dirty());

    let reloaded = config::read_document(&path).unwrap();
    assert_eq!(&reloaded, editor.document());
}

#[test]
fn replace_mode_discards_previous_document() {
    let base = doc(json!({"theme": "nord", "model": "a/b"}));
    let preset = builtin_template("local-ollama").unwrap();
    let next = instantiate(&base, &preset.config, ApplyMode::Replace);
    assert_eq!(next, preset.config);
    assert!(next.theme.is_none());
}

#[test]
fn clear_then_save_drops_the_key() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("opencode.json");
    std::fs::write(&path, r#"{"tui": {"scroll_speed": 2}, "share": "manual"}"#).unwrap();

    let mut editor = ConfigEditor::open(&path).unwrap();
    assert!(editor.clear(&["tui", "scroll_speed"]).unwrap());
    assert!(!editor.clear(&["tui", "scroll_speed"]).unwrap());
    editor.save().unwrap();

    let stored: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
    assert_eq!(stored, json!({"share": "manual"}));
}

#[test]
fn agent_rules_shadow_global_rules() {
    let document = doc(json!({
        "permission": {"edit": "allow"},
        "agent": {"plan": {"permission": {"edit": "deny"}}}
    }))
    .effective();
    let resolver = PermissionResolver::default();

    let plan = resolver.resolve_in_document(&document, Some("plan"), "edit", Some("src/main.rs"));
    assert_eq!(plan.action, PermissionAction::Deny);
    assert_eq!(plan.layer, Layer::Agent { id: "plan".into() });

    let build = resolver.resolve_in_document(&document, Some("build"), "edit", Some("src/main.rs"));
    assert_eq!(build.action, PermissionAction::Allow);
    assert_eq!(build.layer, Layer::Global);
}

#[test]
fn template_store_survives_reopen() {
    let dir = TempDir::new().unwrap();

    let id = {
        let mut store = TemplateStore::open(FileTemplateStorage::in_dir(dir.path())).unwrap();
        let t = store
            .save_as_template("Work", "office defaults", &doc(json!({"model": "a/b"})))
            .unwrap();
        store.duplicate_template(&t.id, Some("Home")).unwrap();
        t.id
    };

    let store = TemplateStore::open(FileTemplateStorage::in_dir(dir.path())).unwrap();
    assert_eq!(store.len(), 2);
    assert_eq!(store.get(&id).unwrap().name, "Work");
    assert_eq!(store.list()[1].name, "Home");
    assert_eq!(store.list()[1].config.model.as_deref(), Some("a/b"));
}
