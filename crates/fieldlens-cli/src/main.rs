use clap::Parser;
use tracing_subscriber::EnvFilter;

mod args;
mod commands;

use args::{Cli, Command};
use fieldlens_core::config::{self, FieldLensConfig};
use fieldlens_core::FieldLensError;

#[tokio::main]
async fn main() {
    // Load .env file if present (API keys for LLM providers)
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_target(false)
        .init();

    let result = run(&cli).await;
    if let Err(err) = result {
        eprintln!("Error: {:#}", err);
        let code = err
            .downcast_ref::<FieldLensError>()
            .map(FieldLensError::exit_code)
            .unwrap_or(1);
        std::process::exit(code);
    }
}

async fn run(cli: &Cli) -> anyhow::Result<()> {
    let config = load_config(cli)?;
    match &cli.command {
        Command::Scan(args) => commands::scan::run(args, &config).await,
        Command::Rules(args) => commands::rules::run(args, &config),
        Command::Index(args) => commands::index::run(args, &config).await,
    }
}

fn load_config(cli: &Cli) -> anyhow::Result<FieldLensConfig> {
    let config = match &cli.config {
        Some(path) => config::read_config(path)?,
        None => match config::find_config() {
            Some(path) => config::read_config(path)?,
            None => FieldLensConfig::default(),
        },
    };
    Ok(config)
}
