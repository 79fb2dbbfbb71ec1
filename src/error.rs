use std::path::PathBuf;
use thiserror::Error;

/// Typed error hierarchy for ocforge.
///
/// Merge and permission resolution never produce one of these; they are
/// total over well-typed input. Leaf I/O helpers use `anyhow::Result` and
/// convert through `Internal`.
#[derive(Debug, Error)]
pub enum Error {
    /// Malformed JSON or a template missing `name`/`config`.
    #[error("{0}")]
    Format(String),

    /// Operation referenced a template id that does not exist.
    #[error("Template with id \"{0}\" not found")]
    NotFound(String),

    /// Every candidate model-listing executable was missing.
    #[error("opencode command not found (tried: {})", tried.join(", "))]
    ExternalToolUnavailable { tried: Vec<String> },

    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl Error {
    pub fn format(msg: impl Into<String>) -> Self {
        Self::Format(msg.into())
    }

    /// Short machine-readable kind, used in HTTP error bodies and logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Format(_) => "format",
            Self::NotFound(_) => "not_found",
            Self::ExternalToolUnavailable { .. } => "tool_unavailable",
            Self::Io { .. } => "io",
            Self::Internal(_) => "internal",
        }
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_message_names_the_id() {
        let err = Error::NotFound("abc".into());
        assert_eq!(err.to_string(), "Template with id \"abc\" not found");
        assert_eq!(err.kind(), "not_found");
    }

    #[test]
    fn tool_unavailable_lists_candidates() {
        let err = Error::ExternalToolUnavailable {
            tried: vec!["opencode".into(), "npx".into()],
        };
        assert!(err.to_string().contains("opencode, npx"));
    }

    #[test]
    fn anyhow_converts_to_internal() {
        let err: Error = anyhow::anyhow!("boom").into();
        assert_eq!(err.kind(), "internal");
        assert_eq!(err.to_string(), "boom");
    }
}
