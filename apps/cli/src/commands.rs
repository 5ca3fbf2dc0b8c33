//! CLI command definitions, routing, and tracing setup.

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use color_eyre::eyre::Result;
use tracing::info;

use changelogd_loader::{ConfigStore, Loader};
use changelogd_shared::{AppConfig, Pagination, load_config, load_config_from};
use changelogd_transport::build_backend;

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// changelogd — changelog content pipeline tooling.
#[derive(Parser)]
#[command(
    name = "changelogd",
    version,
    about = "Load and inspect changelog content through the resolution pipeline.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Config file path (defaults to ~/.changelogd/changelogd.toml).
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Load a page of articles and print what the renderer would get.
    Load {
        /// Workspace id (requires --changelog; takes priority over --host).
        #[arg(long, requires = "changelog")]
        workspace: Option<String>,

        /// Changelog id (requires --workspace).
        #[arg(long, requires = "workspace")]
        changelog: Option<String>,

        /// Resolve by host instead of the static config descriptor.
        #[arg(long)]
        host: Option<String>,

        /// 1-based page number.
        #[arg(long)]
        page: Option<String>,

        /// Articles per page.
        #[arg(long)]
        page_size: Option<String>,
    },

    /// Show the resolved configuration.
    Config,
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "changelogd=info",
        1 => "changelogd=debug",
        _ => "changelogd=trace",
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt().with_env_filter(env_filter).init();
        }
        LogFormat::Json => {
            fmt().json().with_env_filter(env_filter).init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command routing
// ---------------------------------------------------------------------------

/// Dispatch the parsed CLI to its command handler.
pub(crate) async fn run(cli: Cli) -> Result<()> {
    let config = match &cli.config {
        Some(path) => load_config_from(path)?,
        None => load_config()?,
    };

    match cli.command {
        Command::Load {
            workspace,
            changelog,
            host,
            page,
            page_size,
        } => {
            let page = Pagination::from_query(page.as_deref(), page_size.as_deref());
            run_load(&config, workspace, changelog, host, page).await
        }
        Command::Config => {
            println!("{}", toml::to_string_pretty(&config)?);
            Ok(())
        }
    }
}

async fn run_load(
    config: &AppConfig,
    workspace: Option<String>,
    changelog: Option<String>,
    host: Option<String>,
    page: Pagination,
) -> Result<()> {
    let cache = build_backend(config.cache.as_ref(), &reqwest::Client::new())?;
    let store = Arc::new(ConfigStore::new(config)?);
    let loader = Loader::new(config, store, cache)?;

    // Same precedence the web handlers use: explicit ids beat host.
    let loaded = match (workspace, changelog, host) {
        (Some(workspace), Some(changelog), _) => {
            info!(%workspace, %changelog, "resolving by ids");
            loader.from_workspace(&workspace, &changelog, page).await?
        }
        (_, _, Some(host)) => {
            info!(%host, "resolving by host");
            loader.from_host(&host, page).await?
        }
        _ => loader.from_config(page).await?,
    };

    for article in &loaded.articles {
        println!(
            "{}\t{} bytes",
            article.filename.as_deref().unwrap_or("<inline>"),
            article.content.len()
        );
    }
    println!(
        "has_more: {}  protected: {}",
        loaded.has_more, loaded.protected
    );
    Ok(())
}
