//! Site configuration management for `kiln.toml`.
//!
//! # Module Structure
//!
//! ```text
//! config/
//! ├── section/       # Configuration section definitions
//! │   ├── build/     # [build] (+ build mode)
//! │   ├── serve      # [serve] and resolved ServeOptions
//! │   └── site       # [site]
//! ├── types/         # Utility types
//! │   ├── error      # ConfigError, ConfigDiagnostics
//! │   ├── field      # FieldPath
//! │   └── handle     # Reloadable ConfigHandle
//! └── mod.rs         # SiteConfig (this file)
//! ```

pub mod section;
pub mod types;
mod util;

pub use util::serve_base_url;
use util::find_config_file;

pub use section::{BuildMode, BuildSectionConfig, ServeConfig, ServeOptions, SiteSectionConfig};
pub use types::{ConfigDiagnostics, ConfigError, ConfigHandle, FieldPath};

use crate::{
    cli::{Cli, ServeArgs},
    log,
    utils::path::normalize_path,
};
use serde::{Deserialize, Serialize};
use std::{
    fs,
    net::IpAddr,
    path::{Path, PathBuf},
    time::Duration,
};

// ============================================================================
// overrides
// ============================================================================

/// Command-line values that take precedence over `kiln.toml`.
///
/// Kept on the config so a reload during live rebuild applies them again.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Overrides {
    pub destination: Option<PathBuf>,
    pub interface: Option<IpAddr>,
    pub port: Option<u16>,
    pub watch: Option<bool>,
    pub base_url: Option<String>,
    /// `Some(append_port)` while serving; `None` for one-shot builds.
    pub serving: Option<bool>,
}

impl Overrides {
    pub fn from_cli(cli: &Cli) -> Self {
        let mut overrides = Self {
            destination: cli.destination.clone(),
            ..Self::default()
        };
        if let Some(args) = cli.serve_args() {
            overrides.apply_serve_args(args);
        }
        overrides
    }

    fn apply_serve_args(&mut self, args: &ServeArgs) {
        self.interface = args.interface;
        self.port = args.port;
        self.watch = args.watch;
        self.base_url.clone_from(&args.base_url);
        self.serving = Some(args.append_port);
    }
}

// ============================================================================
// root configuration
// ============================================================================

/// Root configuration structure representing kiln.toml
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SiteConfig {
    /// Absolute path to the config file (internal use only)
    #[serde(skip)]
    pub config_path: PathBuf,

    /// Project root directory - parent of config file (internal use only)
    #[serde(skip)]
    pub root: PathBuf,

    /// Command-line overrides (internal use only)
    #[serde(skip)]
    pub overrides: Overrides,

    /// Site metadata
    #[serde(default)]
    pub site: SiteSectionConfig,

    /// Build settings
    #[serde(default)]
    pub build: BuildSectionConfig,

    /// Development server settings
    #[serde(default)]
    pub serve: ServeConfig,
}

impl SiteConfig {
    /// Load configuration from CLI arguments.
    ///
    /// Searches upward from the source directory (or cwd) for the config file.
    /// The project root is the config file's parent directory.
    pub fn load(cli: &Cli) -> Result<Self, ConfigError> {
        let start = match &cli.source {
            Some(source) => normalize_path(source),
            None => std::env::current_dir()
                .map_err(|err| ConfigError::Io(PathBuf::from("."), err))?,
        };

        let config_path =
            find_config_file(&start, &cli.config).unwrap_or_else(|| start.join(&cli.config));

        Self::load_with(&config_path, Overrides::from_cli(cli))
    }

    /// Load, normalize and validate the config at `path`.
    pub fn load_with(path: &Path, overrides: Overrides) -> Result<Self, ConfigError> {
        let mut config = Self::from_path(path)?;
        config.config_path = normalize_path(path);
        config.overrides = overrides;
        config.finalize();
        config.validate()?;
        Ok(config)
    }

    /// Re-read the config file, keeping command-line overrides.
    pub fn reload(&self) -> Result<Self, ConfigError> {
        Self::load_with(&self.config_path, self.overrides.clone())
    }

    /// Parse configuration from TOML string
    pub fn from_str(content: &str) -> Result<Self, ConfigError> {
        Self::parse_with_ignored(content, Path::new("kiln.toml")).map(|(config, _)| config)
    }

    /// Load configuration from file path with unknown field detection.
    fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let content =
            fs::read_to_string(path).map_err(|err| ConfigError::Io(path.to_path_buf(), err))?;

        let (config, ignored) = Self::parse_with_ignored(&content, path)?;

        if !ignored.is_empty() {
            Self::print_unknown_fields_warning(&ignored, path);
        }

        Ok(config)
    }

    /// Parse TOML content, collecting any unknown fields.
    fn parse_with_ignored(content: &str, path: &Path) -> Result<(Self, Vec<String>), ConfigError> {
        let mut ignored = Vec::new();
        let deserializer = toml::Deserializer::new(content);
        let config = serde_ignored::deserialize(deserializer, |field: serde_ignored::Path| {
            ignored.push(field.to_string());
        })
        .map_err(|error| ConfigError::Parse {
            path: path.to_path_buf(),
            error,
        })?;
        Ok((config, ignored))
    }

    /// Print warning about unknown fields.
    fn print_unknown_fields_warning(fields: &[String], path: &Path) {
        let display_path = path
            .file_name()
            .map(|n| n.to_string_lossy())
            .unwrap_or_else(|| path.to_string_lossy());
        log!("warning"; "unknown fields in {}, ignoring:", display_path);
        for field in fields {
            eprintln!("- {field}");
        }
    }

    /// Resolve the root, apply overrides, and make every directory absolute.
    fn finalize(&mut self) {
        self.root = self
            .config_path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default();

        let overrides = self.overrides.clone();
        Self::update_option(&mut self.build.output, overrides.destination.as_ref());
        Self::update_option(&mut self.serve.interface, overrides.interface.as_ref());
        Self::update_option(&mut self.serve.port, overrides.port.as_ref());
        Self::update_option(&mut self.serve.watch, overrides.watch.as_ref());

        let root = self.root.clone();
        for dir in [
            &mut self.build.content,
            &mut self.build.data,
            &mut self.build.layouts,
            &mut self.build.output,
        ] {
            *dir = normalize_path(&root.join(&*dir));
        }
    }

    /// Update config option if CLI value is provided.
    fn update_option<T: Clone>(config_option: &mut T, cli_option: Option<&T>) {
        if let Some(option) = cli_option {
            *config_option = option.clone();
        }
    }

    /// Validate the normalized configuration, collecting every error.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut diag = ConfigDiagnostics::new();

        self.build.validate(&self.root, &mut diag);
        self.serve.validate(&mut diag);

        diag.into_result().map_err(ConfigError::Diagnostics)
    }

    /// Record the port actually bound, so later reloads derive the same URLs.
    pub fn pin_port(&mut self, port: u16) {
        self.overrides.port = Some(port);
        self.serve.port = port;
    }

    // ========================================================================
    // accessors
    // ========================================================================

    /// Get the root directory path
    pub fn get_root(&self) -> &Path {
        &self.root
    }

    /// Get path relative to the site root
    pub fn root_relative(&self, path: impl AsRef<Path>) -> PathBuf {
        path.as_ref()
            .strip_prefix(&self.root)
            .map(Path::to_path_buf)
            .unwrap_or_else(|_| path.as_ref().to_path_buf())
    }

    /// Base URL rendered into pages.
    ///
    /// While serving this is derived from the bound port; see [`serve_base_url`].
    pub fn base_url(&self) -> String {
        let Some(append_port) = self.overrides.serving else {
            return self.site.base_url.clone();
        };
        serve_base_url(
            &self.site.base_url,
            self.overrides.base_url.as_deref(),
            append_port,
            self.serve.port,
        )
        .unwrap_or_else(|_| format!("http://localhost:{}/", self.serve.port))
    }

    /// Resolved options for the live server.
    pub fn serve_options(&self) -> ServeOptions {
        ServeOptions {
            source_dir: self.root.clone(),
            output_dir: self.build.output.clone(),
            port: self.serve.port,
            bind_address: self.serve.interface,
            enable_live_reload: self.serve.watch,
            debounce: Duration::from_millis(self.serve.debounce_ms),
        }
    }
}

// ============================================================================
// Test Helpers (available to all modules via `use crate::config::test_*`)
// ============================================================================

/// Parse config, panicking on unknown fields (to catch config typos in tests).
#[cfg(test)]
pub fn test_parse_config(content: &str) -> SiteConfig {
    let (parsed, ignored) = SiteConfig::parse_with_ignored(content, Path::new("kiln.toml")).unwrap();
    assert!(
        ignored.is_empty(),
        "test config has unknown fields: {:?}",
        ignored
    );
    parsed
}

// ============================================================================
// tests
// ============================================================================
