//! Command-line interface definitions.

use clap::{ColorChoice, Parser, Subcommand};
use std::path::PathBuf;

/// kiln incremental site builder and live development server
#[derive(Parser, Debug, Clone)]
#[command(version, about, long_about = None, arg_required_else_help = true)]
pub struct Cli {
    /// Control colored output (auto, always, never)
    #[arg(long, global = true, default_value = "auto")]
    pub color: ColorChoice,

    /// Site source directory (default: current directory)
    #[arg(short = 's', long = "source", value_hint = clap::ValueHint::DirPath)]
    pub source: Option<PathBuf>,

    /// Config file path, relative to the source directory
    #[arg(short = 'C', long, default_value = "kiln.toml", value_hint = clap::ValueHint::FilePath)]
    pub config: PathBuf,

    /// Output directory path (relative to the site root)
    #[arg(short = 'd', long = "destination", value_hint = clap::ValueHint::DirPath)]
    pub destination: Option<PathBuf>,

    /// subcommands
    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Build the site once
    #[command(visible_alias = "b")]
    Build {
        /// Enable verbose output for debugging
        #[arg(short = 'V', long)]
        verbose: bool,
    },

    /// Start development server with live rebuild
    #[command(visible_alias = "s")]
    Serve {
        #[command(flatten)]
        args: ServeArgs,
    },
}

/// Arguments of the `serve` subcommand.
#[derive(clap::Args, Debug, Clone, Default)]
pub struct ServeArgs {
    /// Network interface to bind (e.g., 127.0.0.1, 0.0.0.0)
    #[arg(short, long)]
    pub interface: Option<std::net::IpAddr>,

    /// Port number to listen on (0 picks a free port)
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Enable file watching for auto-rebuild
    #[arg(short, long, action = clap::ArgAction::Set, num_args = 0..=1, default_missing_value = "true", require_equals = false)]
    pub watch: Option<bool>,

    /// Base URL to use instead of the derived localhost URL
    #[arg(short = 'b', long = "base-url", value_hint = clap::ValueHint::Url)]
    pub base_url: Option<String>,

    /// Append the serve port to the base URL
    #[arg(long = "append-port", action = clap::ArgAction::Set, num_args = 0..=1, default_missing_value = "true", default_value = "true")]
    pub append_port: bool,

    /// Enable verbose output for debugging
    #[arg(short = 'V', long)]
    pub verbose: bool,
}

impl Cli {
    pub const fn is_serve(&self) -> bool {
        matches!(self.command, Commands::Serve { .. })
    }

    pub const fn verbose(&self) -> bool {
        match &self.command {
            Commands::Build { verbose } => *verbose,
            Commands::Serve { args } => args.verbose,
        }
    }

    /// Serve arguments, if running `serve`.
    pub const fn serve_args(&self) -> Option<&ServeArgs> {
        match &self.command {
            Commands::Serve { args } => Some(args),
            Commands::Build { .. } => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_serve() {
        let cli = Cli::try_parse_from([
            "kiln", "-s", "site", "serve", "-p", "0", "-w", "false", "--base-url", "http://x/",
        ])
        .unwrap();

        assert_eq!(cli.source, Some(PathBuf::from("site")));
        assert_eq!(cli.config, PathBuf::from("kiln.toml"));
        let args = cli.serve_args().unwrap();
        assert_eq!(args.port, Some(0));
        assert_eq!(args.watch, Some(false));
        assert_eq!(args.base_url.as_deref(), Some("http://x/"));
        assert!(args.append_port);
    }

    #[test]
    fn test_parse_build() {
        let cli = Cli::try_parse_from(["kiln", "-d", "dist", "build", "--verbose"]).unwrap();
        assert!(!cli.is_serve());
        assert!(cli.verbose());
        assert_eq!(cli.destination, Some(PathBuf::from("dist")));
    }
}
