//! serp-driver CLI - SERP extraction service entry point.

use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

use serp_driver::{execute, AppConfig, QueryDescriptor, SearchRequest};

/// serp-driver - headless-browser SERP extraction service
#[derive(Parser)]
#[command(name = "serp-driver")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP search endpoint
    Serve(ServeArgs),

    /// Run a one-shot search and print the JSON result
    Search(SearchArgs),
}

#[derive(Parser)]
struct ServeArgs {
    /// Bind address
    #[arg(long, default_value = "0.0.0.0")]
    host: String,

    /// Bind port
    #[arg(short, long, default_value = "5000")]
    port: u16,
}

#[derive(Parser)]
struct SearchArgs {
    /// Search queries (repeatable)
    #[arg(required = true)]
    queries: Vec<String>,

    /// Country code
    #[arg(long, default_value = "US")]
    cc: String,

    /// Search type: image, web or news (plus their synonyms)
    #[arg(short = 't', long, default_value = "image")]
    search_type: String,

    /// Freshness filter for news searches
    #[arg(long)]
    qft: Option<String>,

    /// Batch identifier echoed back in every envelope
    #[arg(long)]
    batch_id: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging
    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    let subscriber = FmtSubscriber::builder().with_max_level(level).finish();
    tracing::subscriber::set_global_default(subscriber)?;

    match cli.command {
        Commands::Serve(args) => run_serve(args).await,
        Commands::Search(args) => run_search(args).await,
    }
}

async fn run_serve(args: ServeArgs) -> Result<()> {
    let config = Arc::new(AppConfig::from_env());
    serp_driver::serve(config, &format!("{}:{}", args.host, args.port)).await
}

async fn run_search(args: SearchArgs) -> Result<()> {
    let config = AppConfig::from_env();

    let request = SearchRequest {
        queries: args.queries.into_iter().map(QueryDescriptor::Text).collect(),
        cc: args.cc,
        batch_id: args.batch_id.map(serde_json::Value::String),
        search_type: Some(args.search_type),
        qft: args.qft,
    };

    let outcome = execute(&config, &request).await?;
    println!("{}", serde_json::to_string_pretty(&outcome)?);
    Ok(())
}
