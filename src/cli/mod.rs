use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "ocforge", version, about = "Edit, check and template opencode.json")]
pub struct Cli {
    /// Emit logs as JSON.
    #[arg(long, global = true)]
    pub log_json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Serve the HTTP API and web UI.
    Serve(ServeOpts),
    /// Print the configuration document as stored.
    Show(DocumentOpts),
    /// Print the document merged over the built-in defaults.
    Effective(DocumentOpts),
    /// Check the document and list problems.
    Validate(DocumentOpts),
    /// Decide a tool permission against the document.
    Resolve(ResolveOpts),
    /// List models reported by the opencode CLI.
    Models(ModelsOpts),
    /// Manage configuration templates.
    Templates(TemplatesOpts),
    Version,
}

#[derive(clap::Args)]
pub struct ServeOpts {
    /// ocforge settings file.
    #[arg(short, long)]
    pub settings: Option<PathBuf>,
    #[arg(short, long)]
    pub port: Option<u16>,
    #[arg(long)]
    pub host: Option<String>,
    #[arg(long)]
    pub static_dir: Option<PathBuf>,
    /// opencode.json to edit by default.
    #[arg(short, long)]
    pub config: Option<String>,
}

#[derive(clap::Args)]
pub struct DocumentOpts {
    /// Path to opencode.json (defaults to the platform location).
    #[arg(short, long, env = "OPENCODE_CONFIG")]
    pub config: Option<String>,
}

#[derive(clap::Args)]
pub struct ResolveOpts {
    #[command(flatten)]
    pub document: DocumentOpts,
    /// Tool name, e.g. `bash` or `edit`.
    pub tool: String,
    /// Command line or path the tool acts on.
    pub subject: Option<String>,
    /// Consult this agent's permissions first.
    #[arg(short, long)]
    pub agent: Option<String>,
    /// oh-my-opencode.json with agent overrides (defaults to the file next
    /// to the config).
    #[arg(long)]
    pub omo: Option<String>,
    /// Ignore oh-my-opencode.json.
    #[arg(long, conflicts_with = "omo")]
    pub no_omo: bool,
}

#[derive(clap::Args)]
pub struct ModelsOpts {
    /// Only list models of this provider.
    pub provider: Option<String>,
    /// Print the parsed catalogue as JSON instead of one id per line.
    #[arg(long)]
    pub json: bool,
    #[arg(long, default_value_t = 15)]
    pub timeout_secs: u64,
}

#[derive(clap::Args)]
pub struct TemplatesOpts {
    /// Directory holding the template store.
    #[arg(long, env = "OCFORGE_STATE_DIR")]
    pub state_dir: Option<String>,
    #[command(subcommand)]
    pub action: TemplatesAction,
}

#[derive(Clone, Copy, ValueEnum)]
pub enum ApplyModeArg {
    Replace,
    Overlay,
}

#[derive(Subcommand)]
pub enum TemplatesAction {
    /// List user templates, optionally filtered.
    List {
        #[arg(short, long)]
        query: Option<String>,
    },
    /// List built-in presets.
    Builtin {
        #[arg(long)]
        category: Option<String>,
    },
    /// Save the current document as a template.
    Save {
        name: String,
        #[arg(short, long, default_value = "")]
        description: String,
        #[command(flatten)]
        document: DocumentOpts,
    },
    /// Import one template from a JSON file (`-` for stdin).
    Import { file: String },
    /// Replace all user templates with those in a JSON array file.
    ImportAll { file: String },
    Export { id: String },
    ExportAll,
    Duplicate {
        id: String,
        #[arg(short, long)]
        name: Option<String>,
    },
    Rename { id: String, name: String },
    Delete { id: String },
    Clear,
    /// Write a template (built-in id or user id) into the document.
    Apply {
        id: String,
        #[arg(long, value_enum, default_value_t = ApplyModeArg::Replace)]
        mode: ApplyModeArg,
        #[command(flatten)]
        document: DocumentOpts,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_takes_plugin_overrides() {
        let cli = Cli::try_parse_from(["ocforge", "resolve", "bash", "git status", "-a", "oracle", "--omo", "~/omo.json"])
            .unwrap();
        let Commands::Resolve(opts) = cli.command else {
            panic!("expected resolve");
        };
        assert_eq!(opts.omo.as_deref(), Some("~/omo.json"));
        assert!(!opts.no_omo);

        assert!(Cli::try_parse_from(["ocforge", "resolve", "bash", "--omo", "x", "--no-omo"]).is_err());
    }
}
