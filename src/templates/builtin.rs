//! Built-in configuration presets, embedded at compile time.

use crate::config::ConfigDocument;
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use tracing::error;

/// Raw preset catalogue.
pub const BUILTIN_TEMPLATES_JSON: &str = include_str!("builtin.json");

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TemplateCategory {
    General,
    Security,
    Local,
    Enterprise,
    Custom,
}

impl std::str::FromStr for TemplateCategory {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "general" => Ok(Self::General),
            "security" => Ok(Self::Security),
            "local" => Ok(Self::Local),
            "enterprise" => Ok(Self::Enterprise),
            "custom" => Ok(Self::Custom),
            _ => Err(format!("unknown template category: {s}")),
        }
    }
}

/// A preset shipped with the binary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuiltinTemplate {
    pub id: String,
    pub name: String,
    pub description: String,
    pub icon: String,
    pub category: TemplateCategory,
    pub config: ConfigDocument,
}

static BUILTINS: Lazy<Vec<BuiltinTemplate>> =
    Lazy::new(|| match serde_json::from_str(BUILTIN_TEMPLATES_JSON) {
        Ok(templates) => templates,
        Err(e) => {
            error!(error = %e, "embedded template catalogue is invalid");
            Vec::new()
        }
    });

pub fn builtin_templates() -> &'static [BuiltinTemplate] {
    &BUILTINS
}

pub fn builtin_template(id: &str) -> Option<&'static BuiltinTemplate> {
    BUILTINS.iter().find(|t| t.id == id)
}

pub fn builtin_templates_by_category(category: TemplateCategory) -> Vec<&'static BuiltinTemplate> {
    BUILTINS.iter().filter(|t| t.category == category).collect()
}

/// Check if a template id belongs to a built-in preset.
pub fn is_builtin(id: &str) -> bool {
    builtin_template(id).is_some()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{default_keybinds, validate_document_strict};
    use std::collections::HashSet;

    #[test]
    fn catalogue_parses_all_ten_presets() {
        let ids: Vec<&str> = builtin_templates().iter().map(|t| t.id.as_str()).collect();
        assert_eq!(
            ids,
            vec![
                "developer-default",
                "security-strict",
                "local-ollama",
                "local-lmstudio",
                "enterprise",
                "openrouter-multi",
                "custom-provider",
                "advanced-developer",
                "enterprise-security",
                "mcp-integration",
            ]
        );
        let unique: HashSet<&str> = ids.iter().copied().collect();
        assert_eq!(unique.len(), ids.len());
    }

    #[test]
    fn every_preset_is_a_valid_document() {
        for template in builtin_templates() {
            validate_document_strict(&template.config)
                .unwrap_or_else(|e| panic!("{} is invalid: {e}", template.id));
            assert!(template.config.extra.is_empty(), "{} has unknown keys", template.id);
        }
    }

    #[test]
    fn lookup_and_category_filter() {
        assert_eq!(builtin_template("local-ollama").unwrap().category, TemplateCategory::Local);
        assert!(builtin_template("nope").is_none());
        assert!(is_builtin("enterprise"));

        let local: Vec<&str> = builtin_templates_by_category(TemplateCategory::Local)
            .iter()
            .map(|t| t.id.as_str())
            .collect();
        assert_eq!(local, vec!["local-ollama", "local-lmstudio"]);
        assert_eq!(builtin_templates_by_category(TemplateCategory::Custom).len(), 1);
    }

    #[test]
    fn everyday_preset_ships_stock_keybinds() {
        let preset = builtin_template("developer-default").unwrap();
        assert_eq!(preset.config.keybinds, Some(default_keybinds()));
    }

    #[test]
    fn category_parses_from_str() {
        assert_eq!("security".parse::<TemplateCategory>(), Ok(TemplateCategory::Security));
        assert!("misc".parse::<TemplateCategory>().is_err());
    }
}
