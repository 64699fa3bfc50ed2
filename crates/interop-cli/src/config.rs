//! CLI settings: loaded configuration plus command-line overrides
//!
//! Precedence, lowest to highest: global config, project `interop.toml`,
//! `INTEROP_*` environment variables, command-line flags.

use anyhow::{Context, Result};
use interop_config::{Config, ConfigLoader};
use interop_runtime::ffi::SymbolResolver;
use std::env;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

/// Log filter used when nothing is configured
const DEFAULT_LOG_FILTER: &str = "warn";

/// Effective settings for one CLI invocation
#[derive(Debug)]
pub struct Settings {
    pub config: Config,
    /// Native library for runtime-marshaled calls
    pub library: String,
    /// Resolver search directories, flags first
    pub search_paths: Vec<PathBuf>,
}

impl Settings {
    /// Load configuration and apply command-line overrides
    ///
    /// With `config_path` the file is loaded directly; otherwise `interop.toml`
    /// is searched for upward from the working directory.
    pub fn load(
        config_path: Option<&Path>,
        library: Option<String>,
        search_paths: Vec<PathBuf>,
    ) -> Result<Self> {
        let mut loader = ConfigLoader::new();
        let config = match config_path {
            Some(path) => loader
                .load_from_file(path)
                .with_context(|| format!("Failed to load config file: {}", path.display()))?,
            None => {
                let cwd = env::current_dir().context("Failed to read working directory")?;
                loader
                    .load_from_directory(&cwd)
                    .context("Failed to load interop.toml")?
            }
        };

        Ok(Self::with_overrides(config, library, search_paths))
    }

    fn with_overrides(config: Config, library: Option<String>, search_paths: Vec<PathBuf>) -> Self {
        let library = library.unwrap_or_else(|| config.native_library().to_string());
        let search_paths = search_paths
            .into_iter()
            .chain(config.search_paths())
            .collect();

        Self {
            config,
            library,
            search_paths,
        }
    }

    /// Resolver over the effective search directories
    pub fn resolver(&self) -> SymbolResolver {
        SymbolResolver::with_search_paths(self.search_paths.clone())
    }

    /// Executable launched as the native caller
    ///
    /// The configured executable, or `interop-probe` next to this binary.
    pub fn probe_path(&self) -> Result<PathBuf> {
        if let Some(path) = self.config.probe_executable() {
            return Ok(path.to_path_buf());
        }

        let exe = env::current_exe().context("Failed to locate the running executable")?;
        let dir = exe
            .parent()
            .context("Running executable has no parent directory")?;
        Ok(dir.join(format!("interop-probe{}", env::consts::EXE_SUFFIX)))
    }
}

/// Install the stderr log subscriber
///
/// Filter precedence: `INTEROP_LOG`, `RUST_LOG`, the configured level, `warn`.
pub fn init_logging(configured: Option<&str>) {
    let filter = env::var("INTEROP_LOG")
        .ok()
        .or_else(|| env::var("RUST_LOG").ok())
        .or_else(|| configured.map(str::to_string))
        .unwrap_or_else(|| DEFAULT_LOG_FILTER.to_string());

    let env_filter = EnvFilter::try_new(&filter).unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));

    // Another subscriber may already be installed (tests); keep it
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .try_init();
}
