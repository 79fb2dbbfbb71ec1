//! The oh-my-opencode plugin document (`oh-my-opencode.json`).
//!
//! It lives next to `opencode.json` and carries per-agent model overrides,
//! task categories and plugin switches. Only the parts the editor acts on are
//! typed; everything else is kept in `extra` and written back untouched.

use super::io::{parse_lenient, read_capped, write_document_text};
use super::types::{AgentMode, Extra, PermissionAction, PermissionConfig, PermissionRule};
use super::default_config_dir;
use crate::error::{Error, Result};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

pub const OMO_CONFIG_FILE_NAME: &str = "oh-my-opencode.json";

pub fn default_omo_config_path() -> PathBuf {
    default_config_dir().join(OMO_CONFIG_FILE_NAME)
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OmoDocument {
    #[serde(rename = "$schema", skip_serializing_if = "Option::is_none")]
    pub schema: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub agents: Option<IndexMap<String, OmoAgentOverride>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub categories: Option<IndexMap<String, OmoCategory>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub disabled_hooks: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub disabled_agents: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub disabled_mcps: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub disabled_skills: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub disabled_commands: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auto_update: Option<bool>,
    /// `background_task`, `tmux`, `experimental` and the rest.
    #[serde(flatten)]
    pub extra: Extra,
}

/// Model and behaviour override for one agent.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OmoAgentOverride {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub variant: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub skills: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prompt: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prompt_append: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tools: Option<IndexMap<String, bool>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub disable: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mode: Option<AgentMode>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub permission: Option<OmoAgentPermission>,
    #[serde(flatten)]
    pub extra: Extra,
}

/// Per-agent permissions. Only `bash` takes a pattern map.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OmoAgentPermission {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub edit: Option<PermissionAction>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bash: Option<PermissionRule>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub webfetch: Option<PermissionAction>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub doom_loop: Option<PermissionAction>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub external_directory: Option<PermissionAction>,
    #[serde(flatten)]
    pub extra: Extra,
}

impl OmoAgentPermission {
    /// The same rules in the shape of an opencode `permission` field.
    ///
    /// Unknown tool keys are carried over when their value parses as a rule.
    pub fn to_permission_config(&self) -> PermissionConfig {
        let mut tools = IndexMap::new();
        let typed = [
            ("edit", self.edit.map(PermissionRule::Scalar)),
            ("bash", self.bash.clone()),
            ("webfetch", self.webfetch.map(PermissionRule::Scalar)),
            ("doom_loop", self.doom_loop.map(PermissionRule::Scalar)),
            ("external_directory", self.external_directory.map(PermissionRule::Scalar)),
        ];
        for (tool, rule) in typed {
            if let Some(rule) = rule {
                tools.insert(tool.to_string(), rule);
            }
        }
        for (tool, value) in &self.extra {
            if let Ok(rule) = serde_json::from_value::<PermissionRule>(value.clone()) {
                tools.insert(tool.clone(), rule);
            }
        }
        PermissionConfig::Tools(tools)
    }

    pub fn rule_for(&self, tool: &str) -> Option<PermissionRule> {
        self.to_permission_config().rule_for(tool)
    }
}

/// A task category: the model and tuning used when work is delegated to it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OmoCategory {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub variant: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    #[serde(rename = "top_p", skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reasoning_effort: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text_verbosity: Option<String>,
    #[serde(rename = "prompt_append", skip_serializing_if = "Option::is_none")]
    pub prompt_append: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tools: Option<IndexMap<String, bool>>,
    #[serde(rename = "is_unstable_agent", skip_serializing_if = "Option::is_none")]
    pub is_unstable_agent: Option<bool>,
    /// `thinking` and anything newer.
    #[serde(flatten)]
    pub extra: Extra,
}

impl OmoDocument {
    pub fn agent(&self, id: &str) -> Option<&OmoAgentOverride> {
        self.agents.as_ref()?.get(id)
    }

    /// Whether the plugin switches `id` off.
    pub fn agent_disabled(&self, id: &str) -> bool {
        self.disabled_agents
            .as_ref()
            .is_some_and(|list| list.iter().any(|a| a == id))
            || self.agent(id).and_then(|a| a.disable).unwrap_or(false)
    }

    pub fn to_pretty_json(&self) -> serde_json::Result<String> {
        let mut text = serde_json::to_string_pretty(self)?;
        text.push('\n');
        Ok(text)
    }
}

/// Read the raw text of an oh-my-opencode document. A missing file reads as
/// `{}`: the plugin is optional.
pub fn read_omo_text(path: &Path) -> Result<String> {
    match read_capped(path)? {
        Some(text) => Ok(text),
        None => {
            debug!(path = %path.display(), "oh-my-opencode file missing, using empty document");
            Ok("{}\n".to_string())
        }
    }
}

pub fn parse_omo_document(text: &str) -> Result<OmoDocument> {
    parse_lenient(text, "oh-my-opencode")
}

pub fn read_omo_document(path: &Path) -> Result<OmoDocument> {
    parse_omo_document(&read_omo_text(path)?)
}

pub fn write_omo_document(path: &Path, doc: &OmoDocument) -> Result<()> {
    let text = doc.to_pretty_json().map_err(|e| Error::Internal(e.into()))?;
    write_document_text(path, &text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use tempfile::TempDir;

    fn sample() -> serde_json::Value {
        json!({
            "$schema": "https://example.invalid/oh-my-opencode.schema.json",
            "agents": {
                "oracle": {
                    "model": "openai/gpt-5",
                    "variant": "max",
                    "mode": "subagent",
                    "permission": {
                        "edit": "deny",
                        "bash": {"*": "ask", "git *": "allow"},
                        "task": "allow",
                        "max_steps": 3
                    },
                    "fallback_models": ["a/b"]
                },
                "explore": {"model": "x/y", "disable": true}
            },
            "categories": {
                "quick": {
                    "model": "anthropic/claude-haiku",
                    "maxTokens": 4000,
                    "reasoningEffort": "low",
                    "prompt_append": "Be brief.",
                    "thinking": {"type": "enabled", "budgetTokens": 1024}
                }
            },
            "disabled_agents": ["librarian"],
            "auto_update": false,
            "tmux": {"enabled": true, "layout": "tiled"},
            "experimental": {"auto_resume": true}
        })
    }

    #[test]
    fn unknown_keys_round_trip() {
        let input = sample();
        let doc: OmoDocument = serde_json::from_value(input.clone()).unwrap();
        assert_eq!(doc.categories.as_ref().unwrap()["quick"].max_tokens, Some(4000));
        assert!(doc.extra.contains_key("tmux"));
        assert_eq!(serde_json::to_value(&doc).unwrap(), input);
    }

    #[test]
    fn agent_permission_becomes_a_permission_config() {
        let doc: OmoDocument = serde_json::from_value(sample()).unwrap();
        let permission = doc.agent("oracle").unwrap().permission.as_ref().unwrap();

        assert_eq!(
            permission.rule_for("edit"),
            Some(PermissionRule::Scalar(PermissionAction::Deny))
        );
        assert!(matches!(permission.rule_for("bash"), Some(PermissionRule::Patterns(p)) if p.len() == 2));
        // Unknown tools with a rule-shaped value are honoured, others ignored.
        assert_eq!(
            permission.rule_for("task"),
            Some(PermissionRule::Scalar(PermissionAction::Allow))
        );
        assert_eq!(permission.rule_for("max_steps"), None);
        assert_eq!(permission.rule_for("webfetch"), None);
    }

    #[test]
    fn disabled_agents() {
        let doc: OmoDocument = serde_json::from_value(sample()).unwrap();
        assert!(doc.agent_disabled("librarian"));
        assert!(doc.agent_disabled("explore"));
        assert!(!doc.agent_disabled("oracle"));
    }

    #[test]
    fn missing_file_is_an_empty_document() {
        let dir = TempDir::new().unwrap();
        let doc = read_omo_document(&dir.path().join(OMO_CONFIG_FILE_NAME)).unwrap();
        assert_eq!(doc, OmoDocument::default());
    }

    #[test]
    fn write_then_read() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join(OMO_CONFIG_FILE_NAME);
        let doc = parse_omo_document(
            r#"{
                // plugin overrides
                "agents": {"oracle": {"model": "a/b",}},
            }"#,
        )
        .unwrap();

        write_omo_document(&path, &doc).unwrap();
        assert_eq!(read_omo_document(&path).unwrap(), doc);
    }

    #[test]
    fn bad_document_is_a_format_error() {
        let err = parse_omo_document(r#"{"agents": {"oracle": {"permission": {"edit": "sometimes"}}}}"#)
            .unwrap_err();
        assert_eq!(err.kind(), "format");
        assert!(err.to_string().starts_with("Invalid oh-my-opencode JSON"));
    }

    #[test]
    fn default_path_sits_next_to_opencode_json() {
        assert_eq!(
            default_omo_config_path().parent(),
            super::super::default_config_path().parent()
        );
    }
}
