//! kiln - incremental site builder with a live development server.

mod actor;
mod cli;
mod compiler;
mod config;
mod core;
mod lazy;
mod logger;
mod reload;
mod utils;

use anyhow::Result;
use clap::{ColorChoice, Parser};
use cli::{Cli, Commands};
use config::SiteConfig;
use core::ShutdownHandle;

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Set global color override based on CLI option
    match cli.color {
        ColorChoice::Always => owo_colors::set_override(true),
        ColorChoice::Never => owo_colors::set_override(false),
        ColorChoice::Auto => {} // owo-colors auto-detects TTY
    }
    logger::set_verbose(cli.verbose());

    // Setup global Ctrl+C handler (before any blocking operations)
    let shutdown = ShutdownHandle::new();
    core::setup_shutdown_handler(shutdown.clone())?;

    let config = SiteConfig::load(&cli)?;

    match &cli.command {
        Commands::Build { .. } => cli::build::build_site(&config, &shutdown).map(|_| ()),
        Commands::Serve { .. } => cli::serve::serve(config, shutdown),
    }
}
