//! Configuration Loader
//!
//! Handles loading and merging configuration from multiple sources with proper precedence.

use crate::global::GlobalConfig;
use crate::project::{ImportDecl, LoggingConfig, NativeConfig, ProcessConfig, ProjectConfig};
use crate::{ConfigResult, DEFAULT_EXPORTS_LIBRARY, DEFAULT_NATIVE_LIBRARY, PROJECT_CONFIG_FILE};
use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Configuration loader
///
/// Loads configuration from multiple sources and merges them with proper precedence:
/// 1. Global config (~/.interop/config.toml) - lowest priority
/// 2. Project config (./interop.toml) - overrides global
/// 3. Environment variables (INTEROP_*) - overrides project
/// 4. CLI flags - highest priority (handled by caller)
pub struct ConfigLoader {
    /// Cached global config path
    global_config_path: Option<PathBuf>,
}

/// Merged configuration result
#[derive(Debug, Clone, Default)]
pub struct Config {
    /// Project configuration
    pub project: ProjectConfig,

    /// Global configuration
    pub global: GlobalConfig,

    /// Project root directory (where interop.toml was found)
    pub project_root: Option<PathBuf>,
}

impl ConfigLoader {
    /// Create a new configuration loader
    pub fn new() -> Self {
        Self {
            global_config_path: None,
        }
    }

    /// Create a loader reading the global config from an explicit path
    pub fn with_global_path(path: PathBuf) -> Self {
        Self {
            global_config_path: Some(path),
        }
    }

    /// Load configuration starting from the given directory
    ///
    /// Walks up the directory tree to find interop.toml, then loads and merges
    /// global config if it exists.
    pub fn load_from_directory(&mut self, start_dir: &Path) -> ConfigResult<Config> {
        let (project_root, mut project_config) = self.find_project_config(start_dir)?;

        if let Some(root) = &project_root {
            project_config.rebase(root);
        }

        // Global config is optional and a broken one must not block the project
        let global_config = self.load_global_config().unwrap_or_default();

        let project_config = self.apply_env_overrides(project_config)?;

        Ok(Config {
            project: project_config,
            global: global_config,
            project_root,
        })
    }

    /// Load configuration from a specific project config file
    pub fn load_from_file(&mut self, config_path: &Path) -> ConfigResult<Config> {
        let mut project_config = ProjectConfig::load_from_file(config_path)?;
        let project_root = config_path.parent().map(|p| p.to_path_buf());

        if let Some(root) = &project_root {
            project_config.rebase(root);
        }

        let global_config = self.load_global_config().unwrap_or_default();
        let project_config = self.apply_env_overrides(project_config)?;

        Ok(Config {
            project: project_config,
            global: global_config,
            project_root,
        })
    }

    /// Find project configuration by walking up directory tree
    ///
    /// Returns (project_root, project_config); a missing file yields the default config
    fn find_project_config(
        &self,
        start_dir: &Path,
    ) -> ConfigResult<(Option<PathBuf>, ProjectConfig)> {
        let mut current = start_dir.to_path_buf();

        loop {
            let config_path = current.join(PROJECT_CONFIG_FILE);

            if config_path.exists() {
                let project_config = ProjectConfig::load_from_file(&config_path)?;
                return Ok((Some(current), project_config));
            }

            match current.parent() {
                Some(parent) => current = parent.to_path_buf(),
                None => return Ok((None, ProjectConfig::default())),
            }
        }
    }

    /// Load global configuration from ~/.interop/config.toml
    fn load_global_config(&mut self) -> ConfigResult<GlobalConfig> {
        let path = match &self.global_config_path {
            Some(path) => path.clone(),
            None => {
                let path = GlobalConfig::global_config_path()?;
                self.global_config_path = Some(path.clone());
                path
            }
        };

        if !path.exists() {
            return Ok(GlobalConfig::default());
        }

        GlobalConfig::load_from_file(&path)
    }

    /// Apply environment variable overrides to project config
    ///
    /// - INTEROP_LIBRARY: native library name or path
    /// - INTEROP_SEARCH_PATH: extra search directories (OS path-list syntax), prepended
    /// - INTEROP_PROBE: executable launched by the process bridge
    /// - INTEROP_LOG: log filter
    fn apply_env_overrides(&self, mut config: ProjectConfig) -> ConfigResult<ProjectConfig> {
        if let Ok(library) = env::var("INTEROP_LIBRARY") {
            if !library.trim().is_empty() {
                config
                    .native
                    .get_or_insert_with(NativeConfig::default)
                    .library = Some(library);
            }
        }

        if let Some(paths) = env::var_os("INTEROP_SEARCH_PATH") {
            let native = config.native.get_or_insert_with(NativeConfig::default);
            let mut merged: Vec<PathBuf> = env::split_paths(&paths)
                .filter(|p| !p.as_os_str().is_empty())
                .collect();
            merged.append(&mut native.search_paths);
            native.search_paths = merged;
        }

        if let Some(probe) = env::var_os("INTEROP_PROBE") {
            config
                .process
                .get_or_insert_with(ProcessConfig::default)
                .executable = Some(PathBuf::from(probe));
        }

        if let Ok(level) = env::var("INTEROP_LOG") {
            config
                .logging
                .get_or_insert_with(LoggingConfig::default)
                .level = Some(level);
        }

        config.validate()?;
        Ok(config)
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl Config {
    /// Effective native library (project > default)
    pub fn native_library(&self) -> &str {
        self.project
            .native_library()
            .unwrap_or(DEFAULT_NATIVE_LIBRARY)
    }

    /// Effective exports library (project > default)
    pub fn exports_library(&self) -> &str {
        self.project
            .exports_library()
            .unwrap_or(DEFAULT_EXPORTS_LIBRARY)
    }

    /// Search paths: project entries first, then global defaults
    pub fn search_paths(&self) -> Vec<PathBuf> {
        self.project
            .search_paths()
            .iter()
            .chain(self.global.search_paths())
            .cloned()
            .collect()
    }

    /// Executable launched by the process bridge, if configured
    pub fn probe_executable(&self) -> Option<&Path> {
        self.project
            .process
            .as_ref()
            .and_then(|p| p.executable.as_deref())
    }

    /// Arguments for the launched executable
    pub fn process_args(&self) -> &[String] {
        self.project
            .process
            .as_ref()
            .map(|p| p.args.as_slice())
            .unwrap_or(&[])
    }

    /// Wait limit for the launched executable
    pub fn process_timeout(&self) -> Option<Duration> {
        self.project
            .process
            .as_ref()
            .and_then(|p| p.timeout_ms)
            .map(Duration::from_millis)
    }

    /// Effective log filter (project/env > global)
    pub fn log_level(&self) -> Option<&str> {
        self.project
            .logging
            .as_ref()
            .and_then(|l| l.level.as_deref())
            .or_else(|| self.global.log_level())
    }

    /// Declared imports
    pub fn imports(&self) -> &[ImportDecl] {
        &self.project.imports
    }

    /// Get the project root directory
    pub fn project_root(&self) -> Option<&Path> {
        self.project_root.as_deref()
    }

    /// Check if this is a project (has interop.toml)
    pub fn is_project(&self) -> bool {
        self.project_root.is_some()
    }
}
