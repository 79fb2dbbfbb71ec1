//! Merge of a partial document onto a base document.
//!
//! Rules, by field kind:
//! - scalars and lists: the patch value replaces the base value; an absent
//!   patch value leaves the base untouched
//! - records (`tui`, `server`, `permission`, ...): shallow merge, one level
//! - keyed maps of records (`provider`, `agent`, `mcp`, ...): merged by key,
//!   an entry present on both sides is itself shallow-merged
//!
//! Absent never means "delete". Removing a field is the caller's job; see
//! [`crate::editor::ConfigEditor::clear`].

use super::types::*;
use super::ConfigDocument;
use indexmap::IndexMap;

/// Pure, deterministic merge of `patch` onto `self`.
pub trait Merge: Clone {
    fn merge(&self, patch: &Self) -> Self;
}

/// Free-function form of [`Merge::merge`] for documents.
pub fn merge(base: &ConfigDocument, patch: &ConfigDocument) -> ConfigDocument {
    base.merge(patch)
}

fn pick<T: Clone>(base: &Option<T>, patch: &Option<T>) -> Option<T> {
    patch.clone().or_else(|| base.clone())
}

fn merge_record<T: Merge>(base: &Option<T>, patch: &Option<T>) -> Option<T> {
    match (base, patch) {
        (Some(b), Some(p)) => Some(b.merge(p)),
        _ => pick(base, patch),
    }
}

/// Key-wise overwrite: patch keys replace, base-only keys are kept.
fn overlay<V: Clone>(base: &IndexMap<String, V>, patch: &IndexMap<String, V>) -> IndexMap<String, V> {
    let mut out = base.clone();
    for (key, value) in patch {
        out.insert(key.clone(), value.clone());
    }
    out
}

fn overlay_opt<V: Clone>(
    base: &Option<IndexMap<String, V>>,
    patch: &Option<IndexMap<String, V>>,
) -> Option<IndexMap<String, V>> {
    match (base, patch) {
        (Some(b), Some(p)) => Some(overlay(b, p)),
        _ => pick(base, patch),
    }
}

fn merge_extra(base: &Extra, patch: &Extra) -> Extra {
    let mut out = base.clone();
    for (key, value) in patch {
        out.insert(key.clone(), value.clone());
    }
    out
}

/// Map-of-records merge: shared keys shallow-merge, new keys are appended.
fn merge_entries<V: Merge>(base: &IndexMap<String, V>, patch: &IndexMap<String, V>) -> IndexMap<String, V> {
    let mut out = base.clone();
    for (key, value) in patch {
        let merged = match base.get(key) {
            Some(existing) => existing.merge(value),
            None => value.clone(),
        };
        out.insert(key.clone(), merged);
    }
    out
}

fn merge_entries_opt<V: Merge>(
    base: &Option<IndexMap<String, V>>,
    patch: &Option<IndexMap<String, V>>,
) -> Option<IndexMap<String, V>> {
    match (base, patch) {
        (Some(b), Some(p)) => Some(merge_entries(b, p)),
        _ => pick(base, patch),
    }
}

impl Merge for PermissionConfig {
    fn merge(&self, patch: &Self) -> Self {
        match (self, patch) {
            (Self::Tools(base), Self::Tools(p)) => Self::Tools(overlay(base, p)),
            (_, p) => p.clone(),
        }
    }
}

impl Merge for ProviderConfig {
    fn merge(&self, patch: &Self) -> Self {
        Self {
            api: pick(&self.api, &patch.api),
            id: pick(&self.id, &patch.id),
            npm: pick(&self.npm, &patch.npm),
            name: pick(&self.name, &patch.name),
            env: pick(&self.env, &patch.env),
            options: pick(&self.options, &patch.options),
            models: pick(&self.models, &patch.models),
            whitelist: pick(&self.whitelist, &patch.whitelist),
            blacklist: pick(&self.blacklist, &patch.blacklist),
            extra: merge_extra(&self.extra, &patch.extra),
        }
    }
}

impl Merge for AgentConfig {
    fn merge(&self, patch: &Self) -> Self {
        Self {
            name: pick(&self.name, &patch.name),
            description: pick(&self.description, &patch.description),
            mode: pick(&self.mode, &patch.mode),
            model: pick(&self.model, &patch.model),
            variant: pick(&self.variant, &patch.variant),
            prompt: pick(&self.prompt, &patch.prompt),
            temperature: pick(&self.temperature, &patch.temperature),
            top_p: pick(&self.top_p, &patch.top_p),
            steps: pick(&self.steps, &patch.steps),
            max_steps: pick(&self.max_steps, &patch.max_steps),
            color: pick(&self.color, &patch.color),
            hidden: pick(&self.hidden, &patch.hidden),
            disable: pick(&self.disable, &patch.disable),
            tools: pick(&self.tools, &patch.tools),
            options: pick(&self.options, &patch.options),
            permission: pick(&self.permission, &patch.permission),
            extra: merge_extra(&self.extra, &patch.extra),
        }
    }
}

impl Merge for CommandConfig {
    fn merge(&self, patch: &Self) -> Self {
        Self {
            template: patch.template.clone(),
            description: pick(&self.description, &patch.description),
            agent: pick(&self.agent, &patch.agent),
            model: pick(&self.model, &patch.model),
            subtask: pick(&self.subtask, &patch.subtask),
            extra: merge_extra(&self.extra, &patch.extra),
        }
    }
}

impl Merge for McpConfig {
    fn merge(&self, patch: &Self) -> Self {
        match (self, patch) {
            (Self::Local(base), Self::Local(p)) => Self::Local(McpLocalConfig {
                command: p.command.clone(),
                environment: pick(&base.environment, &p.environment),
                enabled: pick(&base.enabled, &p.enabled),
                timeout: pick(&base.timeout, &p.timeout),
                extra: merge_extra(&base.extra, &p.extra),
            }),
            (Self::Remote(base), Self::Remote(p)) => Self::Remote(McpRemoteConfig {
                url: p.url.clone(),
                enabled: pick(&base.enabled, &p.enabled),
                headers: pick(&base.headers, &p.headers),
                oauth: pick(&base.oauth, &p.oauth),
                timeout: pick(&base.timeout, &p.timeout),
                extra: merge_extra(&base.extra, &p.extra),
            }),
            // Same unknown transport: shallow merge of the raw entry.
            (Self::Other(base), Self::Other(p)) if base.get("type") == p.get("type") => {
                Self::Other(merge_extra(base, p))
            }
            // Switching transport replaces the whole entry.
            (_, p) => p.clone(),
        }
    }
}

impl Merge for LspServerConfig {
    fn merge(&self, patch: &Self) -> Self {
        Self {
            command: pick(&self.command, &patch.command),
            extensions: pick(&self.extensions, &patch.extensions),
            disabled: pick(&self.disabled, &patch.disabled),
            env: pick(&self.env, &patch.env),
            initialization: pick(&self.initialization, &patch.initialization),
            extra: merge_extra(&self.extra, &patch.extra),
        }
    }
}

impl Merge for LspSetting {
    fn merge(&self, patch: &Self) -> Self {
        match (self, patch) {
            (Self::Servers(base), Self::Servers(p)) => Self::Servers(merge_entries(base, p)),
            (_, p) => p.clone(),
        }
    }
}

impl Merge for FormatterConfig {
    fn merge(&self, patch: &Self) -> Self {
        Self {
            disabled: pick(&self.disabled, &patch.disabled),
            command: pick(&self.command, &patch.command),
            environment: pick(&self.environment, &patch.environment),
            extensions: pick(&self.extensions, &patch.extensions),
            extra: merge_extra(&self.extra, &patch.extra),
        }
    }
}

impl Merge for FormatterSetting {
    fn merge(&self, patch: &Self) -> Self {
        match (self, patch) {
            (Self::Languages(base), Self::Languages(p)) => Self::Languages(merge_entries(base, p)),
            (_, p) => p.clone(),
        }
    }
}

impl Merge for TuiConfig {
    fn merge(&self, patch: &Self) -> Self {
        Self {
            scroll_speed: pick(&self.scroll_speed, &patch.scroll_speed),
            scroll_acceleration: pick(&self.scroll_acceleration, &patch.scroll_acceleration),
            diff_style: pick(&self.diff_style, &patch.diff_style),
            extra: merge_extra(&self.extra, &patch.extra),
        }
    }
}

impl Merge for ServerConfig {
    fn merge(&self, patch: &Self) -> Self {
        Self {
            port: pick(&self.port, &patch.port),
            hostname: pick(&self.hostname, &patch.hostname),
            mdns: pick(&self.mdns, &patch.mdns),
            mdns_domain: pick(&self.mdns_domain, &patch.mdns_domain),
            cors: pick(&self.cors, &patch.cors),
            extra: merge_extra(&self.extra, &patch.extra),
        }
    }
}

impl Merge for CompactionConfig {
    fn merge(&self, patch: &Self) -> Self {
        Self {
            auto: pick(&self.auto, &patch.auto),
            prune: pick(&self.prune, &patch.prune),
            extra: merge_extra(&self.extra, &patch.extra),
        }
    }
}

impl Merge for ExperimentalConfig {
    fn merge(&self, patch: &Self) -> Self {
        Self {
            batch_tool: pick(&self.batch_tool, &patch.batch_tool),
            open_telemetry: pick(&self.open_telemetry, &patch.open_telemetry),
            primary_tools: pick(&self.primary_tools, &patch.primary_tools),
            continue_loop_on_deny: pick(&self.continue_loop_on_deny, &patch.continue_loop_on_deny),
            mcp_timeout: pick(&self.mcp_timeout, &patch.mcp_timeout),
            disable_paste_summary: pick(&self.disable_paste_summary, &patch.disable_paste_summary),
            extra: merge_extra(&self.extra, &patch.extra),
        }
    }
}

impl Merge for WatcherConfig {
    fn merge(&self, patch: &Self) -> Self {
        Self {
            ignore: pick(&self.ignore, &patch.ignore),
            extra: merge_extra(&self.extra, &patch.extra),
        }
    }
}

impl Merge for SkillsConfig {
    fn merge(&self, patch: &Self) -> Self {
        Self {
            paths: pick(&self.paths, &patch.paths),
            extra: merge_extra(&self.extra, &patch.extra),
        }
    }
}

impl Merge for EnterpriseConfig {
    fn merge(&self, patch: &Self) -> Self {
        Self {
            url: pick(&self.url, &patch.url),
            extra: merge_extra(&self.extra, &patch.extra),
        }
    }
}

impl Merge for ConfigDocument {
    fn merge(&self, patch: &Self) -> Self {
        Self {
            schema: pick(&self.schema, &patch.schema),
            model: pick(&self.model, &patch.model),
            small_model: pick(&self.small_model, &patch.small_model),
            default_agent: pick(&self.default_agent, &patch.default_agent),
            username: pick(&self.username, &patch.username),
            provider: merge_entries_opt(&self.provider, &patch.provider),
            agent: merge_entries_opt(&self.agent, &patch.agent),
            permission: merge_record(&self.permission, &patch.permission),
            mcp: merge_entries_opt(&self.mcp, &patch.mcp),
            command: merge_entries_opt(&self.command, &patch.command),
            keybinds: overlay_opt(&self.keybinds, &patch.keybinds),
            tui: merge_record(&self.tui, &patch.tui),
            server: merge_record(&self.server, &patch.server),
            lsp: merge_record(&self.lsp, &patch.lsp),
            formatter: merge_record(&self.formatter, &patch.formatter),
            compaction: merge_record(&self.compaction, &patch.compaction),
            experimental: merge_record(&self.experimental, &patch.experimental),
            watcher: merge_record(&self.watcher, &patch.watcher),
            skills: merge_record(&self.skills, &patch.skills),
            enterprise: merge_record(&self.enterprise, &patch.enterprise),
            theme: pick(&self.theme, &patch.theme),
            plugin: pick(&self.plugin, &patch.plugin),
            instructions: pick(&self.instructions, &patch.instructions),
            share: pick(&self.share, &patch.share),
            log_level: pick(&self.log_level, &patch.log_level),
            autoupdate: pick(&self.autoupdate, &patch.autoupdate),
            snapshot: pick(&self.snapshot, &patch.snapshot),
            disabled_providers: pick(&self.disabled_providers, &patch.disabled_providers),
            enabled_providers: pick(&self.enabled_providers, &patch.enabled_providers),
            autoshare: pick(&self.autoshare, &patch.autoshare),
            layout: pick(&self.layout, &patch.layout),
            tools: overlay_opt(&self.tools, &patch.tools),
            mode: merge_entries_opt(&self.mode, &patch.mode),
            extra: merge_extra(&self.extra, &patch.extra),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DEFAULT_CONFIGURATION;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn doc(value: serde_json::Value) -> ConfigDocument {
        serde_json::from_value(value).unwrap()
    }

    fn sample_base() -> ConfigDocument {
        doc(json!({
            "$schema": "https://opencode.ai/config.json",
            "model": "anthropic/claude-sonnet-4",
            "instructions": ["a.md", "b.md"],
            "permission": {"bash": {"*": "ask"}, "read": "allow"},
            "server": {"port": 4096, "hostname": "localhost", "cors": ["http://a"]},
            "provider": {
                "ollama": {"name": "Ollama", "options": {"baseURL": "http://localhost:11434/v1"}},
                "openai": {"name": "OpenAI"}
            },
            "mcp": {
                "fs": {"type": "local", "command": ["npx", "fs"], "enabled": true}
            },
            "customTopLevel": 1
        }))
    }

    fn sample_patch() -> ConfigDocument {
        doc(json!({
            "model": "openai/gpt-4o",
            "instructions": ["c.md"],
            "permission": {"bash": {"*": "deny", "git *": "allow"}, "edit": "ask"},
            "server": {"port": 5000},
            "provider": {
                "ollama": {"models": {"llama3": {"name": "Llama 3"}}},
                "groq": {"name": "Groq"}
            },
            "mcp": {"fs": {"type": "remote", "url": "https://fs.example.com"}},
            "customTopLevel": 2
        }))
    }

    #[test]
    fn scalars_replace_and_absent_keeps_base() {
        let merged = merge(&sample_base(), &sample_patch());
        assert_eq!(merged.model.as_deref(), Some("openai/gpt-4o"));
        assert_eq!(merged.schema.as_deref(), Some("https://opencode.ai/config.json"));
    }

    #[test]
    fn lists_are_replaced_wholesale() {
        let merged = merge(&sample_base(), &sample_patch());
        assert_eq!(merged.instructions, Some(vec!["c.md".to_string()]));
    }

    #[test]
    fn records_merge_one_level() {
        let merged = merge(&sample_base(), &sample_patch());
        let server = merged.server.unwrap();
        assert_eq!(server.port, Some(5000));
        assert_eq!(server.hostname.as_deref(), Some("localhost"));
        assert_eq!(server.cors, Some(vec!["http://a".to_string()]));

        let value = serde_json::to_value(merged.permission.unwrap()).unwrap();
        assert_eq!(
            value,
            json!({"bash": {"*": "deny", "git *": "allow"}, "read": "allow", "edit": "ask"})
        );
    }

    #[test]
    fn keyed_maps_merge_by_entry() {
        let merged = merge(&sample_base(), &sample_patch());
        let providers = merged.provider.unwrap();
        let keys: Vec<&str> = providers.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["ollama", "openai", "groq"]);

        let ollama = &providers["ollama"];
        assert_eq!(ollama.name.as_deref(), Some("Ollama"));
        assert!(ollama.options.is_some());
        assert!(ollama.models.as_ref().unwrap().contains_key("llama3"));
    }

    #[test]
    fn mcp_variant_change_replaces_entry() {
        let merged = merge(&sample_base(), &sample_patch());
        match &merged.mcp.unwrap()["fs"] {
            McpConfig::Remote(remote) => {
                assert_eq!(remote.url, "https://fs.example.com");
                assert_eq!(remote.enabled, None);
            }
            other => panic!("expected remote, got {other:?}"),
        }
    }

    #[test]
    fn unknown_fields_are_overlaid() {
        let merged = merge(&sample_base(), &sample_patch());
        assert_eq!(merged.extra.get("customTopLevel"), Some(&json!(2)));

        let untouched = merge(&sample_base(), &ConfigDocument::default());
        assert_eq!(untouched.extra.get("customTopLevel"), Some(&json!(1)));
    }

    #[test]
    fn nested_unknown_fields_survive_merge() {
        let base = doc(json!({
            "compaction": {"auto": true, "reserved": 10000},
            "watcher": {"ignore": ["a"], "poll": true},
            "mcp": {"fs": {"type": "local", "command": ["x"], "cwd": "/srv"}},
            "lsp": {"rust": {"command": ["ra"], "root": "."}},
            "command": {"t": {"template": "x", "future": 1}},
            "enterprise": {"url": "https://e", "sso": true}
        }));
        let patch = doc(json!({
            "compaction": {"prune": true},
            "mcp": {"fs": {"type": "local", "command": ["y"], "shell": "bash"}},
            "command": {"t": {"template": "z"}}
        }));

        let value = serde_json::to_value(merge(&base, &patch)).unwrap();
        assert_eq!(value["compaction"], json!({"auto": true, "prune": true, "reserved": 10000}));
        assert_eq!(value["watcher"]["poll"], true);
        assert_eq!(
            value["mcp"]["fs"],
            json!({"type": "local", "command": ["y"], "cwd": "/srv", "shell": "bash"})
        );
        assert_eq!(value["lsp"]["rust"]["root"], ".");
        assert_eq!(value["command"]["t"], json!({"template": "z", "future": 1}));
        assert_eq!(value["enterprise"]["sso"], true);

        assert_eq!(merge(&base, &ConfigDocument::default()), base);
    }

    #[test]
    fn unknown_mcp_entries_merge_when_types_match() {
        let base = doc(json!({"mcp": {"s": {"type": "sse", "url": "https://a", "retry": 1}}}));
        let same = doc(json!({"mcp": {"s": {"type": "sse", "retry": 2}}}));
        assert_eq!(
            serde_json::to_value(merge(&base, &same)).unwrap()["mcp"]["s"],
            json!({"type": "sse", "url": "https://a", "retry": 2})
        );

        let other = doc(json!({"mcp": {"s": {"type": "ws", "url": "wss://b"}}}));
        assert_eq!(
            serde_json::to_value(merge(&base, &other)).unwrap()["mcp"]["s"],
            json!({"type": "ws", "url": "wss://b"})
        );
    }

    #[test]
    fn scalar_permission_patch_replaces_tool_map() {
        let base = doc(json!({"permission": {"bash": "ask"}}));
        let patch = doc(json!({"permission": "allow"}));
        assert_eq!(merge(&base, &patch).permission, Some(PermissionConfig::All(PermissionAction::Allow)));

        let back = merge(&patch, &base);
        assert_eq!(serde_json::to_value(back.permission).unwrap(), json!({"bash": "ask"}));
    }

    #[test]
    fn lsp_false_replaces_servers() {
        let base = doc(json!({"lsp": {"rust": {"command": ["rust-analyzer"]}}}));
        let patch = doc(json!({"lsp": false}));
        assert_eq!(merge(&base, &patch).lsp, Some(LspSetting::Flag(false)));

        let more = doc(json!({"lsp": {"go": {"command": ["gopls"]}, "rust": {"disabled": true}}}));
        match merge(&base, &more).lsp.unwrap() {
            LspSetting::Servers(servers) => {
                assert_eq!(servers["rust"].command, Some(vec!["rust-analyzer".to_string()]));
                assert_eq!(servers["rust"].disabled, Some(true));
                assert!(servers.contains_key("go"));
            }
            other => panic!("expected servers, got {other:?}"),
        }
    }

    #[test]
    fn merge_is_idempotent() {
        let base = sample_base();
        let patch = sample_patch();
        let once = merge(&base, &patch);
        let twice = merge(&once, &patch);
        assert_eq!(once, twice);

        let with_defaults = merge(&DEFAULT_CONFIGURATION, &base);
        assert_eq!(merge(&with_defaults, &base), with_defaults);
    }

    #[test]
    fn empty_patch_is_identity() {
        let base = sample_base();
        assert_eq!(merge(&base, &ConfigDocument::default()), base);
        assert_eq!(
            merge(&DEFAULT_CONFIGURATION, &ConfigDocument::default()),
            *DEFAULT_CONFIGURATION
        );
    }

    #[test]
    fn inputs_are_not_mutated() {
        let base = sample_base();
        let patch = sample_patch();
        let (base_before, patch_before) = (base.clone(), patch.clone());
        let _ = merge(&base, &patch);
        assert_eq!(base, base_before);
        assert_eq!(patch, patch_before);
    }
}
