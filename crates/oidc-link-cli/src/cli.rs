use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

#[derive(Parser)]
#[command(name = "oidc-link")]
#[command(about = "Inspect OpenID Connect attribute paths and login settings")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Settings file (TOML); OIDC__* environment variables override it
    #[arg(short, long, global = true, env = "OIDC_CONFIG")]
    pub config: Option<PathBuf>,

    /// Log level filter (RUST_LOG takes precedence)
    #[arg(long, global = true, default_value = "warn")]
    pub log_level: String,

    /// Output format
    #[arg(short, long, global = true)]
    pub format: Option<OutputFormat>,
}

#[derive(Clone, Copy, ValueEnum, Default)]
pub enum OutputFormat {
    #[default]
    Json,
    Table,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Resolve a dotted attribute path against a JSON document
    Resolve(ResolveArgs),
    /// Extract login attributes from a claims document, fetching userinfo if needed
    Extract(ExtractArgs),
    /// Load and validate the settings
    CheckConfig,
}

#[derive(clap::Args)]
pub struct ResolveArgs {
    /// JSON document file
    #[arg(short, long)]
    pub document: PathBuf,
    /// Attribute path (e.g. realm_access.:groups_claim)
    #[arg(short, long)]
    pub path: String,
}

#[derive(clap::Args)]
pub struct ExtractArgs {
    /// JSON file with the token claims
    #[arg(long)]
    pub claims: PathBuf,
    /// Bearer token for the userinfo endpoint
    #[arg(long, env = "OIDC_TOKEN", default_value = "")]
    pub token: String,
    /// External subject id
    #[arg(long, default_value = "")]
    pub subject: String,
}
