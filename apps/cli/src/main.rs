//! assetdeploy CLI: externalize embedded media from scenario JSON.
//!
//! Reads a directory of scenario documents, writes every embedded `data:`
//! asset to a content-addressed file, and merges the rewritten documents
//! into one catalog.

mod commands;

use std::process::ExitCode;

use clap::Parser;
use color_eyre::eyre::Result;

use commands::Cli;

#[tokio::main]
async fn main() -> Result<ExitCode> {
    color_eyre::install()?;
    let cli = Cli::parse();
    commands::init_tracing(&cli);
    commands::run(cli).await
}
