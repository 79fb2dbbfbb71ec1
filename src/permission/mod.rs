//! Tool permission resolution.
//!
//! A rule is either a single action or an ordered map of glob → action.
//! Pattern maps are evaluated in insertion order and the **last** matching
//! entry wins, so broad patterns go first and exceptions after them:
//!
//! ```json
//! { "bash": { "*": "ask", "git *": "allow", "git push *": "deny" } }
//! ```
//!
//! Nothing matching falls back to `ask`. Resolution is total; a bad pattern
//! simply never matches.

pub mod glob;

use crate::config::omo::OmoDocument;
use crate::config::{ConfigDocument, PermissionAction, PermissionRule, FALLBACK_ACTION};
use serde::Serialize;
use tracing::debug;

/// Which configuration layer produced a decision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Layer {
    /// The agent's entry in `oh-my-opencode.json`.
    Override { id: String },
    Agent { id: String },
    Global,
    Fallback,
}

/// A decision together with where it came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Resolution {
    pub action: PermissionAction,
    pub layer: Layer,
    /// The pattern that decided, for pattern-map rules.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,
}

#[derive(Debug, Clone, Copy)]
pub struct PermissionResolver {
    fallback: PermissionAction,
}

impl Default for PermissionResolver {
    fn default() -> Self {
        Self {
            fallback: FALLBACK_ACTION,
        }
    }
}

/// Outcome of evaluating a single rule, before a layer is attached.
enum RuleOutcome {
    Decided(PermissionAction, Option<String>),
    NoMatch,
}

impl PermissionResolver {
    pub fn new(fallback: PermissionAction) -> Self {
        Self { fallback }
    }

    pub fn fallback(&self) -> PermissionAction {
        self.fallback
    }

    /// Decide `tool` on `subject` under a single rule.
    pub fn resolve(
        &self,
        tool: &str,
        rule: Option<&PermissionRule>,
        subject: Option<&str>,
    ) -> PermissionAction {
        match rule.map(|r| evaluate(r, subject)) {
            Some(RuleOutcome::Decided(action, pattern)) => {
                debug!(tool, ?subject, ?pattern, %action, "permission resolved");
                action
            }
            _ => {
                debug!(tool, ?subject, action = %self.fallback, "permission fell back");
                self.fallback
            }
        }
    }

    /// Decide `tool` on `subject` against a whole document.
    ///
    /// The named agent's own `permission` is consulted first. If it carries
    /// no rule for the tool, or its pattern map has no match, the global
    /// `permission` applies.
    pub fn resolve_in_document(
        &self,
        doc: &ConfigDocument,
        agent: Option<&str>,
        tool: &str,
        subject: Option<&str>,
    ) -> Resolution {
        self.resolve_with_overrides(doc, None, agent, tool, subject)
    }

    /// [`resolve_in_document`](Self::resolve_in_document) with the
    /// oh-my-opencode agent overrides in front of the agent layer.
    pub fn resolve_with_overrides(
        &self,
        doc: &ConfigDocument,
        overrides: Option<&OmoDocument>,
        agent: Option<&str>,
        tool: &str,
        subject: Option<&str>,
    ) -> Resolution {
        let override_layer = agent.zip(overrides).and_then(|(id, omo)| {
            let rule = omo.agent(id)?.permission.as_ref()?.rule_for(tool)?;
            Some((Layer::Override { id: id.to_string() }, rule))
        });
        let agent_layer = agent.and_then(|id| {
            let rule = doc.agent(id)?.permission.as_ref()?.rule_for(tool)?;
            Some((Layer::Agent { id: id.to_string() }, rule))
        });
        let global_layer = doc
            .permission
            .as_ref()
            .and_then(|p| p.rule_for(tool))
            .map(|rule| (Layer::Global, rule));

        for (layer, rule) in override_layer.into_iter().chain(agent_layer).chain(global_layer) {
            if let RuleOutcome::Decided(action, pattern) = evaluate(&rule, subject) {
                debug!(tool, ?subject, ?layer, %action, "permission resolved");
                return Resolution {
                    action,
                    layer,
                    pattern,
                };
            }
        }

        Resolution {
            action: self.fallback,
            layer: Layer::Fallback,
            pattern: None,
        }
    }
}

fn evaluate(rule: &PermissionRule, subject: Option<&str>) -> RuleOutcome {
    let patterns = match rule {
        PermissionRule::Scalar(action) => return RuleOutcome::Decided(*action, None),
        PermissionRule::Patterns(patterns) => patterns,
    };

    let Some(subject) = subject else {
        return match patterns.get("*") {
            Some(action) => RuleOutcome::Decided(*action, Some("*".to_string())),
            None => RuleOutcome::NoMatch,
        };
    };

    patterns
        .iter()
        .rev()
        .find(|(pattern, _)| glob::matches(pattern, subject))
        .map(|(pattern, action)| RuleOutcome::Decided(*action, Some(pattern.clone())))
        .unwrap_or(RuleOutcome::NoMatch)
}

/// [`PermissionResolver::resolve`] with the default `ask` fallback.
pub fn resolve(tool: &str, rule: Option<&PermissionRule>, subject: Option<&str>) -> PermissionAction {
    PermissionResolver::default().resolve(tool, rule, subject)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
