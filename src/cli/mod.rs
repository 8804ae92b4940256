pub mod client;
pub mod commands;
pub mod utils;

use clap::{Parser, Subcommand, ValueEnum};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Server used when neither --url nor PORTAL_URL is given
pub const DEFAULT_URL: &str = "http://localhost:3000";

#[derive(Parser)]
#[command(name = "portal")]
#[command(about = "Portal CLI - trees, imports and tenant setup for the Portal API")]
#[command(version)]
pub struct Cli {
    #[arg(long, global = true, help = "Output in human-readable text format")]
    pub text: bool,

    #[arg(long, global = true, help = "Output in JSON format")]
    pub json: bool,

    #[arg(long, global = true, help = "API base URL (default: PORTAL_URL or http://localhost:3000)")]
    pub url: Option<String>,

    #[arg(long, global = true, help = "Bearer token (default: PORTAL_TOKEN)")]
    pub token: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    #[command(about = "Print an entity tree")]
    Tree {
        #[arg(value_enum)]
        entity: EntityKind,
        #[arg(long, help = "Append rows whose parent is missing as extra roots")]
        include_orphans: bool,
    },

    #[command(about = "Create a nested tree from a JSON or YAML file")]
    Import {
        #[arg(value_enum)]
        entity: EntityKind,
        #[arg(help = "File holding one node or an array of nodes (.json, .yaml, .yml)")]
        file: PathBuf,
        #[arg(long, help = "Attach the imported roots under this existing node")]
        parent_id: Option<i32>,
    },

    #[command(about = "Create the tree tables in a tenant database (uses DATABASE_URL)")]
    Migrate {
        #[arg(long, help = "Tenant name; the database name is derived from it")]
        tenant: String,
    },

    #[command(about = "Issue a development bearer token (uses SECURITY_JWT_SECRET)")]
    Token {
        #[arg(long)]
        tenant: String,
        #[arg(long)]
        user: String,
        #[arg(long, default_value = "full")]
        access: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum EntityKind {
    AppSystem,
    CustomerManual,
}

impl EntityKind {
    pub fn path_prefix(&self) -> &'static str {
        match self {
            EntityKind::AppSystem => "/api/app-system",
            EntityKind::CustomerManual => "/api/customer-manual",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum OutputFormat {
    Text,
    Json,
}

impl OutputFormat {
    pub fn from_cli(cli: &Cli) -> Self {
        if cli.json {
            OutputFormat::Json
        } else {
            OutputFormat::Text
        }
    }
}

pub async fn run(cli: Cli) -> anyhow::Result<()> {
    let output_format = OutputFormat::from_cli(&cli);
    let url = cli
        .url
        .or_else(|| std::env::var("PORTAL_URL").ok())
        .unwrap_or_else(|| DEFAULT_URL.to_string());
    let token = cli.token.or_else(|| std::env::var("PORTAL_TOKEN").ok());

    match cli.command {
        Commands::Tree { entity, include_orphans } => {
            let client = client::ApiClient::new(url, token);
            commands::tree::handle(&client, entity, include_orphans, output_format).await
        }
        Commands::Import { entity, file, parent_id } => {
            let client = client::ApiClient::new(url, token);
            commands::import::handle(&client, entity, &file, parent_id, output_format).await
        }
        Commands::Migrate { tenant } => commands::migrate::handle(&tenant, output_format).await,
        Commands::Token { tenant, user, access } => {
            commands::token::handle(tenant, user, access, output_format)
        }
    }
}
