mod cli;
mod commands;
mod observability;
mod output;

use anyhow::{Context, Result};
use clap::Parser;

use cli::{Cli, Commands};
use output::print_error;

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        print_error(&format!("{e:#}"));
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    // Load .env before clap so OIDC_* variables can feed the arguments
    let dotenv = dotenvy::dotenv().ok();
    let cli = Cli::parse();
    observability::init_tracing_with_level(&cli.log_level);
    if let Some(path) = dotenv {
        tracing::debug!(path = %path.display(), "Loaded environment file");
    }

    let format = cli.format.unwrap_or_default();
    let settings = oidc_link::load_settings(cli.config.as_deref()).with_context(|| match &cli.config {
        Some(path) => format!("Failed to load settings from {}", path.display()),
        None => "Failed to load settings from the environment".to_string(),
    })?;

    match &cli.command {
        Commands::Resolve(args) => {
            commands::resolve::resolve(&settings, &args.document, &args.path, format)?;
        }
        Commands::Extract(args) => {
            commands::extract::extract(settings, &args.claims, &args.token, &args.subject, format)
                .await?;
        }
        Commands::CheckConfig => {
            commands::config::check(&settings, cli.config.as_deref(), format);
        }
    }

    Ok(())
}
