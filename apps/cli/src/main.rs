//! boardpress CLI: export boards and slide decks with their includes.
//!
//! Resolves include directives, converts between board and slide syntax and
//! relocates referenced assets into a self-contained output directory.

mod commands;
mod progress;

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
