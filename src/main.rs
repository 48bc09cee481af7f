mod cmd;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process;

use mmdriver::config::{Config, DEFAULT_CONFIG_FILE};
use mmdriver::utils::logging;

#[derive(Parser)]
#[command(name = "mmdriver")]
#[command(version)]
#[command(about = "Catalog, configuration and registry for local multimodal models", long_about = None)]
struct Cli {
    /// Configuration file (defaults to ./config.yaml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List the known model identities
    #[command(alias = "ls")]
    Models {
        /// Only show one kind: text, vision or audio
        #[arg(short, long)]
        kind: Option<String>,
        #[arg(long)]
        json: bool,
    },
    /// Inspect or edit the configuration file
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Print the effective configuration
    Show {
        #[arg(long)]
        json: bool,
    },
    /// Write the default configuration
    Init {
        #[arg(short, long)]
        force: bool,
    },
    Validate,
    Get {
        section: String,
        key: String,
    },
    Set {
        section: String,
        key: String,
        value: String,
    },
}

fn main() {
    let cli = Cli::parse();
    let config_path = cli.config.as_deref();

    logging::init(&Config::new(config_path).logging_level());

    let result = match cli.command {
        Commands::Models { kind, json } => cmd::models(kind.as_deref(), json),
        Commands::Config { action } => match action {
            ConfigAction::Show { json } => cmd::config_show(config_path, json),
            ConfigAction::Init { force } => {
                let path = cli
                    .config
                    .clone()
                    .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE));
                cmd::config_init(&path, force)
            }
            ConfigAction::Validate => cmd::config_validate(config_path),
            ConfigAction::Get { section, key } => cmd::config_get(config_path, &section, &key),
            ConfigAction::Set {
                section,
                key,
                value,
            } => cmd::config_set(config_path, &section, &key, &value),
        },
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}
