mod defaults;
mod io;
pub mod merge;
pub mod omo;
mod types;
mod validation;

pub use defaults::*;
pub use io::*;
pub use merge::{merge, Merge};
pub use types::*;
pub use validation::*;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// A (partial) opencode configuration document.
///
/// Every field is optional: absent means "use the default". Fields this
/// crate does not model are kept in `extra` and written back untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConfigDocument {
    #[serde(rename = "$schema", skip_serializing_if = "Option::is_none")]
    pub schema: Option<String>,

    // Model settings
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub small_model: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_agent: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider: Option<IndexMap<String, ProviderConfig>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub agent: Option<IndexMap<String, AgentConfig>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub permission: Option<PermissionConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mcp: Option<IndexMap<String, McpConfig>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub command: Option<IndexMap<String, CommandConfig>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub keybinds: Option<IndexMap<String, String>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub tui: Option<TuiConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub server: Option<ServerConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lsp: Option<LspSetting>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub formatter: Option<FormatterSetting>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub compaction: Option<CompactionConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub experimental: Option<ExperimentalConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub watcher: Option<WatcherConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub skills: Option<SkillsConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enterprise: Option<EnterpriseConfig>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub theme: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub plugin: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instructions: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub share: Option<ShareSetting>,
    #[serde(rename = "logLevel", skip_serializing_if = "Option::is_none")]
    pub log_level: Option<LogLevel>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub autoupdate: Option<AutoUpdate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub snapshot: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub disabled_providers: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enabled_providers: Option<Vec<String>>,

    // Deprecated fields, still honoured by the runtime.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub autoshare: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub layout: Option<LayoutMode>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tools: Option<IndexMap<String, bool>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mode: Option<IndexMap<String, AgentConfig>>,

    #[serde(flatten)]
    pub extra: Extra,
}

impl ConfigDocument {
    /// The total configuration: built-in defaults overlaid with this document.
    pub fn effective(&self) -> ConfigDocument {
        DEFAULT_CONFIGURATION.merge(self)
    }

    /// Look up an agent by id, checking the deprecated `mode` map as well.
    pub fn agent(&self, id: &str) -> Option<&AgentConfig> {
        self.agent
            .as_ref()
            .and_then(|agents| agents.get(id))
            .or_else(|| self.mode.as_ref().and_then(|modes| modes.get(id)))
    }

    /// Pretty JSON with a trailing newline, as written to disk.
    pub fn to_pretty_json(&self) -> serde_json::Result<String> {
        let mut text = serde_json::to_string_pretty(self)?;
        text.push('\n');
        Ok(text)
    }

    /// SHA-256 of the canonical JSON form, for change detection.
    pub fn content_hash(&self) -> String {
        let value = serde_json::to_value(self).unwrap_or_default();
        resolve_document_hash(&value)
    }
}
