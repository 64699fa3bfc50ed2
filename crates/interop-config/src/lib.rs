//! Interop Configuration System
//!
//! Provides configuration management for the interop bridge including:
//! - Project configuration (interop.toml)
//! - Global user configuration (~/.interop/config.toml)
//! - Import declarations for runtime-marshaled native calls
//! - Configuration precedence and merging
//!
//! # Configuration Hierarchy
//!
//! Configuration is loaded and merged in the following order (later overrides earlier):
//! 1. Global config (~/.interop/config.toml)
//! 2. Project config (./interop.toml)
//! 3. Environment variables (INTEROP_*)
//! 4. CLI flags
//!
//! # Example
//!
//! ```no_run
//! use interop_config::ConfigLoader;
//! use std::path::Path;
//!
//! let mut loader = ConfigLoader::new();
//! let config = loader.load_from_directory(Path::new(".")).unwrap();
//! println!("native library: {}", config.native_library());
//! ```

pub mod global;
pub mod loader;
pub mod project;

use std::path::PathBuf;
use thiserror::Error;

/// Name of the project configuration file
pub const PROJECT_CONFIG_FILE: &str = "interop.toml";

/// Library loaded when nothing else is configured
pub const DEFAULT_NATIVE_LIBRARY: &str = "interop_native";

/// Library holding the exported managed entry points
pub const DEFAULT_EXPORTS_LIBRARY: &str = "interop_exports";

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Configuration file not found: {0}")]
    NotFound(PathBuf),

    #[error("Failed to read configuration file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Invalid TOML syntax in {file}: {error}")]
    TomlParseError {
        file: PathBuf,
        error: toml::de::Error,
    },

    #[error("Invalid value for '{field}': {reason}")]
    InvalidValue { field: String, reason: String },

    #[error("Duplicate import declaration '{0}'")]
    DuplicateImport(String),

    #[error("Home directory not found")]
    HomeNotFound,
}

/// Result type for configuration operations
pub type ConfigResult<T> = Result<T, ConfigError>;

// Re-export main types
pub use global::GlobalConfig;
pub use loader::{Config, ConfigLoader};
pub use project::{ImportDecl, ProjectConfig};
