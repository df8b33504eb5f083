//! Atlas CLI: stdio MCP server for Jira, Confluence and Opsgenie.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context as _;
use atlas_core::config::Config;
use atlas_core::Context;
use atlas_mcp::{build_registry, LineTransport, McpServer, Services, ToolFilter};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

const HEALTH_CHECK_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Parser)]
#[command(name = "atlas")]
#[command(author, version, about = "Atlas - MCP bridge to Jira, Confluence and Opsgenie", long_about = None)]
struct Cli {
    /// Config file (default: <config dir>/atlas-tools/config.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Hide and refuse every write tool
    #[arg(long, global = true)]
    read_only: bool,

    /// Comma-separated tool allow-list
    #[arg(long, global = true, value_delimiter = ',')]
    enabled_tools: Option<Vec<String>>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Clone, Copy)]
enum Commands {
    /// Serve MCP over stdin/stdout (default)
    Serve,

    /// Check connectivity and credentials of every configured service
    Check,

    /// Print the tools this configuration exposes
    Tools,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // stdout carries the protocol, so logs go to stderr
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(if cli.verbose { "debug" } else { "info" }));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();

    let config = load_config(&cli)?;
    let services = Services::from_config(&config).context("failed to build service clients")?;

    match cli.command.unwrap_or(Commands::Serve) {
        Commands::Serve => serve(&config, &services).await,
        Commands::Check => check(&services).await,
        Commands::Tools => list_tools(&config, &services),
    }
}

/// File, then environment, then command-line flags.
fn load_config(cli: &Cli) -> anyhow::Result<Config> {
    let mut config = match &cli.config {
        Some(path) => Config::load_from(path),
        None => Config::load(),
    }
    .context("failed to load configuration")?;

    config
        .apply_env()
        .context("invalid environment configuration")?;
    if cli.read_only {
        config.read_only = true;
    }
    if let Some(tools) = &cli.enabled_tools {
        config.enabled_tools = tools.clone();
    }

    config.validate().context("invalid configuration")?;
    Ok(config)
}

fn tool_filter(config: &Config) -> ToolFilter {
    ToolFilter::new(config.enabled_tools.iter().cloned(), config.read_only)
}

async fn serve(config: &Config, services: &Services) -> anyhow::Result<()> {
    if services.is_empty() {
        tracing::warn!("No services configured; the server will expose no tools");
    }
    let registry = build_registry(services)?;
    let server = McpServer::new(registry, tool_filter(config));

    let ctx = Context::new();
    let signal_ctx = ctx.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Interrupt received, shutting down");
            signal_ctx.cancel();
        }
    });

    let mut transport = LineTransport::stdio();
    match server.run(&ctx, &mut transport).await {
        Ok(()) => Ok(()),
        Err(e) if e.is_cancelled() => {
            // The blocking stdin reader would otherwise hold up runtime shutdown.
            std::process::exit(0)
        }
        Err(e) => Err(e.into()),
    }
}

async fn check(services: &Services) -> anyhow::Result<()> {
    let providers = services.providers();
    if providers.is_empty() {
        anyhow::bail!("no services configured");
    }

    let ctx = Context::new();
    let mut failed = 0;
    for provider in providers {
        let probe = ctx.with_timeout(HEALTH_CHECK_TIMEOUT);
        match provider.health_check(&probe).await {
            Ok(identity) => println!(
                "{} ({}): ok\n{}",
                provider.name(),
                provider.flavor().as_str(),
                serde_json::to_string_pretty(&identity)?
            ),
            Err(e) => {
                failed += 1;
                println!("{} ({}): {}: {}", provider.name(), provider.flavor().as_str(), e.kind(), e);
            }
        }
    }

    if failed > 0 {
        anyhow::bail!("{} service check(s) failed", failed);
    }
    Ok(())
}

fn list_tools(config: &Config, services: &Services) -> anyhow::Result<()> {
    let registry = build_registry(services)?;
    let filter = tool_filter(config);
    for definition in registry.list(&filter) {
        println!("{}", definition.name);
    }
    Ok(())
}
