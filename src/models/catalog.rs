use indexmap::IndexMap;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// One `provider/model` reference found in model-listing output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelCatalogEntry {
    pub provider_id: String,
    pub model_id: String,
    pub model_name: String,
    pub full_id: String,
}

static MODEL_REF: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[A-Za-z0-9_.-]+/\S+").expect("model reference regex is valid"));

/// Extract `provider/model` entries from free-form text.
///
/// Each non-blank line contributes at most one entry: the first token that
/// looks like `provider/model`. The model id is everything after the first
/// `/`, so `openrouter/anthropic/claude-sonnet-4` has provider `openrouter`
/// and model `anthropic/claude-sonnet-4`. Duplicates keep their first
/// position.
pub fn parse_model_catalog(raw: &str) -> Vec<ModelCatalogEntry> {
    let mut seen = HashSet::new();
    let mut entries = Vec::new();

    for line in raw.lines().map(str::trim).filter(|l| !l.is_empty()) {
        let Some(found) = MODEL_REF.find(line) else {
            continue;
        };
        let full_id = found.as_str();
        let Some((provider, model)) = full_id.split_once('/') else {
            continue;
        };
        if provider.is_empty() || model.is_empty() || !seen.insert(full_id.to_string()) {
            continue;
        }
        entries.push(ModelCatalogEntry {
            provider_id: provider.to_string(),
            model_id: model.to_string(),
            model_name: model.to_string(),
            full_id: full_id.to_string(),
        });
    }

    entries
}

/// Group entries by provider, providers in first-seen order.
pub fn group_by_provider(entries: &[ModelCatalogEntry]) -> IndexMap<String, Vec<ModelCatalogEntry>> {
    let mut groups: IndexMap<String, Vec<ModelCatalogEntry>> = IndexMap::new();
    for entry in entries {
        groups
            .entry(entry.provider_id.clone())
            .or_default()
            .push(entry.clone());
    }
    groups
}
