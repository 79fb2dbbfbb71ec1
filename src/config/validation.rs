use super::defaults::{
    is_known_keybind, BUILTIN_AGENTS, BUILTIN_LSP_SERVERS, BUILTIN_PROVIDERS, SCALAR_ONLY_TOOLS, TOOL_PERMISSIONS,
};
use super::types::*;
use super::ConfigDocument;
use anyhow::Result;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
}

/// A problem found in a configuration document, addressed by dotted path.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValidationIssue {
    pub path: String,
    pub message: String,
    pub severity: Severity,
}

impl std::fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let tag = match self.severity {
            Severity::Error => "error",
            Severity::Warning => "warning",
        };
        write!(f, "{tag}: {}: {}", self.path, self.message)
    }
}

#[derive(Default)]
struct Issues(Vec<ValidationIssue>);

impl Issues {
    fn error(&mut self, path: impl Into<String>, message: impl Into<String>) {
        self.0.push(ValidationIssue {
            path: path.into(),
            message: message.into(),
            severity: Severity::Error,
        });
    }

    fn warn(&mut self, path: impl Into<String>, message: impl Into<String>) {
        self.0.push(ValidationIssue {
            path: path.into(),
            message: message.into(),
            severity: Severity::Warning,
        });
    }
}

fn is_model_ref(model: &str) -> bool {
    matches!(model.split_once('/'), Some((p, m)) if !p.is_empty() && !m.is_empty())
}

fn is_hex_color(color: &str) -> bool {
    color.len() == 7
        && color.starts_with('#')
        && color[1..].chars().all(|c| c.is_ascii_hexdigit())
}

fn is_http_url(raw: &str) -> bool {
    url::Url::parse(raw)
        .map(|u| matches!(u.scheme(), "http" | "https"))
        .unwrap_or(false)
}

fn check_permission(issues: &mut Issues, prefix: &str, permission: &PermissionConfig) {
    let PermissionConfig::Tools(tools) = permission else {
        return;
    };
    for (tool, rule) in tools {
        let path = format!("{prefix}.{tool}");
        if !TOOL_PERMISSIONS.contains(&tool.as_str()) {
            issues.warn(&path, format!("Unknown tool \"{tool}\""));
        }
        if let PermissionRule::Patterns(patterns) = rule {
            if SCALAR_ONLY_TOOLS.contains(&tool.as_str()) {
                issues.error(&path, "This tool only accepts allow, deny or ask");
            }
            if patterns.keys().any(|p| p.is_empty()) {
                issues.error(&path, "Pattern must not be empty");
            }
        }
    }
}

fn check_model(issues: &mut Issues, path: &str, model: &Option<String>) {
    if let Some(model) = model {
        if !is_model_ref(model) {
            issues.warn(path, format!("Model \"{model}\" should look like provider/model"));
        }
    }
}

/// Validate a configuration document. Never fails; returns every issue found.
pub fn validate_document(doc: &ConfigDocument) -> Vec<ValidationIssue> {
    let mut issues = Issues::default();

    check_model(&mut issues, "model", &doc.model);
    check_model(&mut issues, "small_model", &doc.small_model);

    if let Some(default_agent) = &doc.default_agent {
        if doc.agent(default_agent).is_none() && !BUILTIN_AGENTS.contains(&default_agent.as_str()) {
            issues.warn(
                "default_agent",
                format!("Agent \"{default_agent}\" is not defined"),
            );
        }
    }

    if let Some(permission) = &doc.permission {
        check_permission(&mut issues, "permission", permission);
    }

    for (section, agents) in [("agent", &doc.agent), ("mode", &doc.mode)] {
        for (id, agent) in agents.iter().flatten() {
            let prefix = format!("{section}.{id}");
            check_model(&mut issues, &format!("{prefix}.model"), &agent.model);
            if let Some(color) = &agent.color {
                if !is_hex_color(color) {
                    issues.error(format!("{prefix}.color"), "Color must be #RRGGBB");
                }
            }
            if let Some(t) = agent.temperature {
                if !(0.0..=2.0).contains(&t) {
                    issues.error(format!("{prefix}.temperature"), "Temperature must be between 0 and 2");
                }
            }
            if let Some(p) = agent.top_p {
                if !(0.0..=1.0).contains(&p) {
                    issues.error(format!("{prefix}.top_p"), "top_p must be between 0 and 1");
                }
            }
            if let Some(mode) = agent.mode.as_ref().filter(|m| !m.is_known()) {
                issues.warn(format!("{prefix}.mode"), format!("Unknown agent mode \"{mode}\""));
            }
            if let Some(permission) = &agent.permission {
                check_permission(&mut issues, &format!("{prefix}.permission"), permission);
            }
        }
    }

    for (id, provider) in doc.provider.iter().flatten() {
        if provider.npm.is_none() && !BUILTIN_PROVIDERS.contains(&id.as_str()) {
            issues.warn(
                format!("provider.{id}.npm"),
                "Custom provider should name its SDK package, e.g. @ai-sdk/openai-compatible",
            );
        }
        let Some(options) = &provider.options else {
            continue;
        };
        if let Some(base_url) = &options.base_url {
            if url::Url::parse(base_url).is_err() {
                issues.error(format!("provider.{id}.options.baseURL"), "Invalid URL");
            }
        }
        if options.timeout == Some(ProviderTimeout::Flag(true)) {
            issues.error(
                format!("provider.{id}.options.timeout"),
                "Timeout must be a number of milliseconds or false",
            );
        }
    }

    for (id, server) in doc.mcp.iter().flatten() {
        match server {
            McpConfig::Local(local) if local.command.is_empty() => {
                issues.error(format!("mcp.{id}.command"), "Command must not be empty");
            }
            McpConfig::Remote(remote) if !is_http_url(&remote.url) => {
                issues.error(format!("mcp.{id}.url"), "URL must be http or https");
            }
            McpConfig::Other(_) => match server.unknown_type() {
                Some(kind) => issues.warn(format!("mcp.{id}.type"), format!("Unknown server type \"{kind}\"")),
                None => issues.error(format!("mcp.{id}.type"), "Server type must be local or remote"),
            },
            _ => {}
        }
    }

    if let Some(LspSetting::Servers(servers)) = &doc.lsp {
        for (id, server) in servers {
            let custom = !BUILTIN_LSP_SERVERS.contains(&id.as_str());
            if custom && server.disabled != Some(true) && server.command.as_ref().map_or(true, Vec::is_empty) {
                issues.error(format!("lsp.{id}.command"), "Custom LSP server needs a command");
            }
        }
    }

    for (id, command) in doc.command.iter().flatten() {
        if command.template.trim().is_empty() {
            issues.error(format!("command.{id}.template"), "Template must not be empty");
        }
    }

    for action in doc.keybinds.iter().flat_map(|k| k.keys()) {
        if !is_known_keybind(action) {
            issues.warn(format!("keybinds.{action}"), "Unknown keybind action");
        }
    }

    let enum_values = [
        ("share", doc.share.as_ref().map(|v| (v.is_known(), v.as_str()))),
        ("logLevel", doc.log_level.as_ref().map(|v| (v.is_known(), v.as_str()))),
        ("layout", doc.layout.as_ref().map(|v| (v.is_known(), v.as_str()))),
        (
            "autoupdate",
            match &doc.autoupdate {
                Some(AutoUpdate::Mode(mode)) => Some((mode.is_known(), mode.as_str())),
                _ => None,
            },
        ),
        (
            "tui.diff_style",
            doc.tui
                .as_ref()
                .and_then(|t| t.diff_style.as_ref())
                .map(|v| (v.is_known(), v.as_str())),
        ),
    ];
    for (path, value) in enum_values {
        if let Some((false, raw)) = value {
            issues.warn(path, format!("Unknown value \"{raw}\""));
        }
    }

    if let Some(tui) = &doc.tui {
        if tui.scroll_speed.is_some_and(|s| s <= 0.0) {
            issues.error("tui.scroll_speed", "Scroll speed must be greater than 0");
        }
    }

    if let Some(server) = &doc.server {
        if server.port == Some(0) {
            issues.error("server.port", "Port must be greater than 0");
        }
    }

    if let Some(url) = doc.enterprise.as_ref().and_then(|e| e.url.as_ref()) {
        if !is_http_url(url) {
            issues.error("enterprise.url", "Invalid URL");
        }
    }

    issues.0
}

/// Validate and fail if any error-level issue exists. Warnings pass.
pub fn validate_document_strict(doc: &ConfigDocument) -> Result<()> {
    let errors: Vec<String> = validate_document(doc)
        .into_iter()
        .filter(|i| i.severity == Severity::Error)
        .map(|i| i.to_string())
        .collect();
    if errors.is_empty() {
        Ok(())
    } else {
        anyhow::bail!("Configuration validation failed:\n{}", errors.join("\n"));
    }
}
