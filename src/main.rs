use anyhow::{bail, Context, Result};
use clap::Parser;
use ocforge::cli::{ApplyModeArg, Cli, Commands, DocumentOpts, TemplatesAction, TemplatesOpts};
use ocforge::config::{self, omo, validate_document, ConfigDocument, Severity};
use ocforge::editor::ConfigEditor;
use ocforge::logging;
use ocforge::models::{list_catalog, ModelLister};
use ocforge::permission::PermissionResolver;
use ocforge::server::Server;
use ocforge::settings::Settings;
use ocforge::templates::{
    builtin_template, builtin_templates, builtin_templates_by_category, instantiate, ApplyMode,
    FileTemplateStorage, TemplateStore, TemplateUpdate,
};
use std::io::Read;
use std::path::PathBuf;
use std::time::Duration;
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    logging::init(cli.log_json);

    match cli.command {
        Commands::Serve(opts) => {
            info!("Starting ocforge server");
            let mut settings = Settings::load(opts.settings.as_deref())?;
            if let Some(port) = opts.port {
                settings.port = port;
            }
            if let Some(host) = opts.host {
                settings.host = host;
            }
            if let Some(dir) = opts.static_dir {
                settings.static_dir = dir;
            }
            if let Some(path) = opts.config {
                settings.config_path = Some(config::expand_home(&path));
            }
            let server = Server::start(settings)?;
            server.run_until_shutdown().await?;
        }
        Commands::Show(opts) => {
            let doc = config::read_document(&document_path(&opts))?;
            print!("{}", doc.to_pretty_json()?);
        }
        Commands::Effective(opts) => {
            let doc = config::read_document(&document_path(&opts))?;
            print!("{}", doc.effective().to_pretty_json()?);
        }
        Commands::Validate(opts) => {
            let path = document_path(&opts);
            let doc = config::read_document(&path)?;
            let issues = validate_document(&doc);
            for issue in &issues {
                println!("{issue}");
            }
            let errors = issues.iter().filter(|i| i.severity == Severity::Error).count();
            if errors > 0 {
                bail!("{} has {errors} error(s)", path.display());
            }
            info!("{} is valid", path.display());
        }
        Commands::Resolve(opts) => {
            let path = document_path(&opts.document);
            let doc = config::read_document(&path)?;
            let overrides = match (opts.no_omo, opts.omo.as_deref()) {
                (true, _) => None,
                (false, Some(omo_path)) => Some(omo::read_omo_document(&config::expand_home(omo_path))?),
                (false, None) => Some(omo::read_omo_document(&path.with_file_name(omo::OMO_CONFIG_FILE_NAME))?),
            };
            let resolution = PermissionResolver::default().resolve_with_overrides(
                &doc.effective(),
                overrides.as_ref(),
                opts.agent.as_deref(),
                &opts.tool,
                opts.subject.as_deref(),
            );
            println!("{}", serde_json::to_string_pretty(&resolution)?);
        }
        Commands::Models(opts) => {
            let lister = ModelLister::new().with_timeout(Duration::from_secs(opts.timeout_secs));
            let listing = list_catalog(&lister, opts.provider.as_deref()).await?;
            if opts.json {
                println!("{}", serde_json::to_string_pretty(&listing)?);
            } else {
                for model in &listing.models {
                    println!("{}", model.full_id);
                }
            }
        }
        Commands::Templates(opts) => run_templates(opts)?,
        Commands::Version => {
            println!("ocforge {}", env!("CARGO_PKG_VERSION"));
        }
    }

    Ok(())
}

fn document_path(opts: &DocumentOpts) -> PathBuf {
    opts.config
        .as_deref()
        .map(config::expand_home)
        .unwrap_or_else(config::default_config_path)
}

fn read_input(file: &str) -> Result<String> {
    if file == "-" {
        let mut text = String::new();
        std::io::stdin().read_to_string(&mut text)?;
        return Ok(text);
    }
    std::fs::read_to_string(config::expand_home(file)).with_context(|| format!("Failed to read '{file}'"))
}

fn run_templates(opts: TemplatesOpts) -> Result<()> {
    let state_dir = match opts.state_dir.as_deref() {
        Some(dir) => config::expand_home(dir),
        None => Settings::default().state_dir,
    };
    let mut store = TemplateStore::open(FileTemplateStorage::in_dir(&state_dir))?;

    match opts.action {
        TemplatesAction::List { query } => {
            for t in store.search(query.as_deref().unwrap_or("")) {
                println!("{}\t{}\t{}", t.id, t.name, t.description);
            }
        }
        TemplatesAction::Builtin { category } => {
            let templates: Vec<_> = match category {
                Some(raw) => builtin_templates_by_category(raw.parse().map_err(anyhow::Error::msg)?),
                None => builtin_templates().iter().collect(),
            };
            for t in templates {
                println!("{}\t{} {}\t{}", t.id, t.icon, t.name, t.description);
            }
        }
        TemplatesAction::Save {
            name,
            description,
            document,
        } => {
            let doc = config::read_document(&document_path(&document))?;
            let t = store.save_as_template(&name, &description, &doc)?;
            println!("{}", t.id);
        }
        TemplatesAction::Import { file } => {
            let t = store.import_template(&read_input(&file)?)?;
            println!("{}", t.id);
        }
        TemplatesAction::ImportAll { file } => {
            let count = store.import_all_templates(&read_input(&file)?)?;
            info!("Imported {count} template(s)");
        }
        TemplatesAction::Export { id } => println!("{}", store.export_template(&id)?),
        TemplatesAction::ExportAll => println!("{}", store.export_all_templates()?),
        TemplatesAction::Duplicate { id, name } => {
            let t = store.duplicate_template(&id, name.as_deref())?;
            println!("{}", t.id);
        }
        TemplatesAction::Rename { id, name } => {
            let update = TemplateUpdate {
                name: Some(name),
                ..Default::default()
            };
            if store.update_template(&id, update)?.is_none() {
                bail!("Template with id \"{id}\" not found");
            }
        }
        TemplatesAction::Delete { id } => {
            if !store.delete_template(&id)? {
                info!("No template with id {id}");
            }
        }
        TemplatesAction::Clear => store.clear_all_templates()?,
        TemplatesAction::Apply { id, mode, document } => {
            let config: ConfigDocument = match builtin_template(&id) {
                Some(t) => t.config.clone(),
                None => store
                    .get(&id)
                    .map(|t| t.config.clone())
                    .with_context(|| format!("Template with id \"{id}\" not found"))?,
            };
            let mode = match mode {
                ApplyModeArg::Replace => ApplyMode::Replace,
                ApplyModeArg::Overlay => ApplyMode::Overlay,
            };
            let mut editor = ConfigEditor::open(document_path(&document))?;
            let next = instantiate(editor.document(), &config, mode);
            editor.replace(next);
            editor.save()?;
            info!("Applied template {id} to {}", editor.path().display());
        }
    }

    Ok(())
}
