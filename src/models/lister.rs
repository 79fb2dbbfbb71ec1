//! Runs the external `opencode models` command.

use super::catalog::{group_by_provider, parse_model_catalog, ModelCatalogEntry};
use crate::error::{Error, Result};
use async_trait::async_trait;
use indexmap::IndexMap;
use serde::Serialize;
use std::ffi::OsString;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, info, warn};

/// Default time allowed for one listing.
pub const DEFAULT_TIMEOUT_SECS: u64 = 15;

/// Maximum output size accepted from the listing command (1 MB).
pub const MAX_OUTPUT_BYTES: usize = 1024 * 1024;

/// One way of invoking the model-listing executable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandCandidate {
    pub program: String,
    pub args: Vec<String>,
}

impl CommandCandidate {
    pub fn new(program: impl Into<String>, args: &[&str]) -> Self {
        Self {
            program: program.into(),
            args: args.iter().map(|a| a.to_string()).collect(),
        }
    }

    pub fn display(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Candidates tried in order until one exists.
pub fn candidate_commands() -> Vec<CommandCandidate> {
    if cfg!(windows) {
        vec![
            CommandCandidate::new("opencode.exe", &[]),
            CommandCandidate::new("opencode", &[]),
            CommandCandidate::new("opencode.cmd", &[]),
            CommandCandidate::new("npx.cmd", &["opencode"]),
        ]
    } else {
        vec![
            CommandCandidate::new("opencode", &[]),
            CommandCandidate::new("npx", &["opencode"]),
        ]
    }
}

/// `PATH` with the usual opencode install locations appended.
pub fn extended_path() -> Option<OsString> {
    let mut dirs_to_add: Vec<PathBuf> = Vec::new();
    if let Some(home) = dirs::home_dir() {
        dirs_to_add.push(home.join(".opencode").join("bin"));
        if !cfg!(windows) {
            dirs_to_add.push(home.join(".local").join("bin"));
        }
    }
    if cfg!(target_os = "macos") {
        for dir in ["/usr/local/bin", "/opt/homebrew/bin", "/opt/homebrew/sbin"] {
            dirs_to_add.push(PathBuf::from(dir));
        }
    }

    let current = std::env::var_os("PATH").unwrap_or_default();
    let mut paths: Vec<PathBuf> = std::env::split_paths(&current).collect();
    for dir in dirs_to_add {
        if !paths.contains(&dir) {
            paths.push(dir);
        }
    }
    std::env::join_paths(paths).ok()
}

/// Something that can produce raw model-listing output.
#[async_trait]
pub trait ModelSource: Send + Sync {
    async fn list_models(&self, provider: Option<&str>) -> Result<String>;
}

/// Lists models by shelling out to the opencode CLI.
#[derive(Debug, Clone)]
pub struct ModelLister {
    candidates: Vec<CommandCandidate>,
    timeout: Duration,
    max_output_bytes: usize,
}

impl Default for ModelLister {
    fn default() -> Self {
        Self {
            candidates: candidate_commands(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            max_output_bytes: MAX_OUTPUT_BYTES,
        }
    }
}

impl ModelLister {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_candidates(mut self, candidates: Vec<CommandCandidate>) -> Self {
        self.candidates = candidates;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_max_output_bytes(mut self, max: usize) -> Self {
        self.max_output_bytes = max;
        self
    }

    async fn run(&self, candidate: &CommandCandidate, provider: Option<&str>) -> std::io::Result<Result<String>> {
        let mut cmd = Command::new(&candidate.program);
        cmd.args(&candidate.args).arg("models");
        if let Some(provider) = provider {
            cmd.arg(provider);
        }
        if let Some(path) = extended_path() {
            cmd.env("PATH", path);
        }
        cmd.stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let label = candidate.display();
        let output = match tokio::time::timeout(self.timeout, cmd.output()).await {
            Ok(result) => result?,
            Err(_) => {
                return Ok(Err(Error::Internal(anyhow::anyhow!(
                    "'{label} models' timed out after {}s",
                    self.timeout.as_secs_f64()
                ))))
            }
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            warn!(command = %label, status = %output.status, "model listing failed");
            return Ok(Err(Error::Internal(anyhow::anyhow!(
                "'{label} models' exited with status {}: {}",
                output.status,
                stderr.trim()
            ))));
        }

        if output.stdout.len() > self.max_output_bytes {
            return Ok(Err(Error::Internal(anyhow::anyhow!(
                "'{label} models' output exceeds {} bytes",
                self.max_output_bytes
            ))));
        }

        Ok(Ok(String::from_utf8_lossy(&output.stdout).into_owned()))
    }
}

#[async_trait]
impl ModelSource for ModelLister {
    async fn list_models(&self, provider: Option<&str>) -> Result<String> {
        let mut tried = Vec::with_capacity(self.candidates.len());
        for candidate in &self.candidates {
            match self.run(candidate, provider).await {
                Ok(result) => {
                    if result.is_ok() {
                        info!(command = %candidate.display(), ?provider, "models listed");
                    }
                    return result;
                }
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                    debug!(command = %candidate.display(), "not installed, trying next");
                    tried.push(candidate.display());
                }
                Err(e) => {
                    return Err(Error::Internal(anyhow::anyhow!(
                        "Failed to execute '{}': {e}",
                        candidate.display()
                    )))
                }
            }
        }
        warn!(tried = ?tried, "no model-listing command available");
        Err(Error::ExternalToolUnavailable { tried })
    }
}

/// Listing output with its parsed form, as served over HTTP.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelListing {
    pub output: String,
    pub models: Vec<ModelCatalogEntry>,
    pub by_provider: IndexMap<String, Vec<ModelCatalogEntry>>,
}

impl ModelListing {
    pub fn from_output(output: String) -> Self {
        let models = parse_model_catalog(&output);
        let by_provider = group_by_provider(&models);
        Self {
            output,
            models,
            by_provider,
        }
    }
}

/// List and parse in one step.
pub async fn list_catalog(source: &dyn ModelSource, provider: Option<&str>) -> Result<ModelListing> {
    let output = source.list_models(provider).await?;
    Ok(ModelListing::from_output(output))
}
