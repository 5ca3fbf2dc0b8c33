//! changelogd CLI — operator tooling for the changelog content pipeline.
//!
//! Loads a changelog through the same resolution path the web handlers
//! use and prints what came back.

mod commands;

use clap::Parser;
use color_eyre::eyre::Result;

use commands::Cli;

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();
    commands::init_tracing(&cli);
    commands::run(cli).await
}
