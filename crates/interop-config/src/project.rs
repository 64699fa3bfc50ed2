//! Project Configuration (interop.toml)
//!
//! Handles project-level configuration stored in `interop.toml` at the project root.

use crate::{ConfigError, ConfigResult};
use interop_runtime::ffi::{CallingConvention, FfiSignature};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

/// Project configuration from interop.toml
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(deny_unknown_fields)]
pub struct ProjectConfig {
    /// Native library used for managed-to-native calls
    #[serde(skip_serializing_if = "Option::is_none")]
    pub native: Option<NativeConfig>,

    /// Library carrying exported managed entry points
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exports: Option<ExportsConfig>,

    /// Child process launched by the process bridge
    #[serde(skip_serializing_if = "Option::is_none")]
    pub process: Option<ProcessConfig>,

    /// Logging configuration
    #[serde(skip_serializing_if = "Option::is_none")]
    pub logging: Option<LoggingConfig>,

    /// Symbol declarations for runtime-marshaled calls
    #[serde(default, rename = "import")]
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub imports: Vec<ImportDecl>,
}

/// `[native]` section
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(deny_unknown_fields)]
pub struct NativeConfig {
    /// Library name or path (e.g. "interop_native" or "./libfoo.so")
    #[serde(skip_serializing_if = "Option::is_none")]
    pub library: Option<String>,

    /// Extra directories searched before the OS loader
    #[serde(default)]
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub search_paths: Vec<PathBuf>,
}

/// `[exports]` section
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(deny_unknown_fields)]
pub struct ExportsConfig {
    /// Library name or path of the exports cdylib
    #[serde(skip_serializing_if = "Option::is_none")]
    pub library: Option<String>,
}

/// `[process]` section
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(deny_unknown_fields)]
pub struct ProcessConfig {
    /// Executable launched for native-to-managed runs
    #[serde(skip_serializing_if = "Option::is_none")]
    pub executable: Option<PathBuf>,

    /// Arguments passed to the executable
    #[serde(default)]
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub args: Vec<String>,

    /// Wait limit in milliseconds (absent = wait forever)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,
}

/// `[logging]` section
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(deny_unknown_fields)]
pub struct LoggingConfig {
    /// tracing filter directive (e.g. "info", "interop_runtime=debug")
    #[serde(skip_serializing_if = "Option::is_none")]
    pub level: Option<String>,
}

/// One `[[import]]` entry
///
/// ```toml
/// [[import]]
/// name = "add"
/// library = "interop_native"
/// symbol = "addition"
/// convention = "cdecl"
/// params = ["c_int", "c_int"]
/// returns = "c_int"
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct ImportDecl {
    /// Name the import is called by
    pub name: String,

    /// Library name or path
    pub library: String,

    /// Exported symbol (defaults to `name`)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub symbol: Option<String>,

    /// "cdecl", "stdcall" or "default"
    #[serde(skip_serializing_if = "Option::is_none")]
    pub convention: Option<String>,

    /// Parameter type names
    #[serde(default)]
    pub params: Vec<String>,

    /// Return type name (defaults to "void")
    #[serde(skip_serializing_if = "Option::is_none")]
    pub returns: Option<String>,
}

impl ImportDecl {
    /// Exported symbol this import binds to
    pub fn symbol(&self) -> &str {
        self.symbol.as_deref().unwrap_or(&self.name)
    }

    /// Calling convention name, "default" when unset
    pub fn convention(&self) -> &str {
        self.convention.as_deref().unwrap_or("default")
    }

    /// Return type name, "void" when unset
    pub fn returns(&self) -> &str {
        self.returns.as_deref().unwrap_or("void")
    }
}

impl ProjectConfig {
    /// Load project configuration from a file
    pub fn load_from_file(path: &Path) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ConfigError::NotFound(path.to_path_buf())
            } else {
                ConfigError::IoError(e)
            }
        })?;

        Self::parse(&content, path)
    }

    /// Parse project configuration from TOML text
    ///
    /// `origin` is only used for error messages.
    pub fn parse(content: &str, origin: &Path) -> ConfigResult<Self> {
        let config: Self = toml::from_str(content).map_err(|e| ConfigError::TomlParseError {
            file: origin.to_path_buf(),
            error: e,
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Validate the project configuration
    pub fn validate(&self) -> ConfigResult<()> {
        if let Some(native) = &self.native {
            if let Some(library) = &native.library {
                require_non_empty("native.library", library)?;
            }
        }

        if let Some(exports) = &self.exports {
            if let Some(library) = &exports.library {
                require_non_empty("exports.library", library)?;
            }
        }

        if let Some(process) = &self.process {
            if process.timeout_ms == Some(0) {
                return Err(ConfigError::InvalidValue {
                    field: "process.timeout_ms".to_string(),
                    reason: "must be greater than zero".to_string(),
                });
            }
        }

        let mut seen = HashSet::new();
        for import in &self.imports {
            require_non_empty("import.name", &import.name)?;
            require_non_empty("import.library", &import.library)?;
            require_non_empty("import.symbol", import.symbol())?;
            validate_convention(&format!("import.{}.convention", import.name), import.convention())?;
            FfiSignature::parse(
                &import.name,
                import.params.as_slice(),
                import.returns(),
                import.convention(),
            )
            .map_err(|e| ConfigError::InvalidValue {
                field: format!("import.{}", import.name),
                reason: e.to_string(),
            })?;

            if !seen.insert(import.name.as_str()) {
                return Err(ConfigError::DuplicateImport(import.name.clone()));
            }
        }

        Ok(())
    }

    /// Configured native library, if any
    pub fn native_library(&self) -> Option<&str> {
        self.native.as_ref().and_then(|n| n.library.as_deref())
    }

    /// Configured exports library, if any
    pub fn exports_library(&self) -> Option<&str> {
        self.exports.as_ref().and_then(|e| e.library.as_deref())
    }

    /// Configured search paths (empty when unset)
    pub fn search_paths(&self) -> &[PathBuf] {
        self.native
            .as_ref()
            .map(|n| n.search_paths.as_slice())
            .unwrap_or(&[])
    }

    /// Find an import declaration by name
    pub fn import(&self, name: &str) -> Option<&ImportDecl> {
        self.imports.iter().find(|i| i.name == name)
    }

    /// Resolve relative search paths and executable against the project root
    pub fn rebase(&mut self, root: &Path) {
        if let Some(native) = self.native.as_mut() {
            for path in native.search_paths.iter_mut() {
                if path.is_relative() {
                    *path = root.join(&*path);
                }
            }
        }

        if let Some(process) = self.process.as_mut() {
            if let Some(exe) = process.executable.as_mut() {
                if exe.is_relative() && exe.components().count() > 1 {
                    *exe = root.join(&*exe);
                }
            }
        }
    }
}

fn require_non_empty(field: &str, value: &str) -> ConfigResult<()> {
    if value.trim().is_empty() {
        return Err(ConfigError::InvalidValue {
            field: field.to_string(),
            reason: "must not be empty".to_string(),
        });
    }
    Ok(())
}

/// Validate a calling convention name
///
/// Accepts exactly the names the runtime parses, so a config that loads
/// never fails later on its convention.
pub fn validate_convention(field: &str, value: &str) -> ConfigResult<()> {
    if CallingConvention::from_name(value).is_none() {
        return Err(ConfigError::InvalidValue {
            field: field.to_string(),
            reason: format!("unknown calling convention '{}'", value),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn parse(toml: &str) -> ConfigResult<ProjectConfig> {
        ProjectConfig::parse(toml, Path::new("interop.toml"))
    }

    #[test]
    fn test_parse_empty_config() {
        let config = parse("").unwrap();
        assert_eq!(config, ProjectConfig::default());
    }

    #[test]
    fn test_parse_native_section() {
        let config = parse(
            r#"
[native]
library = "interop_native"
search_paths = ["target/debug"]
"#,
        )
        .unwrap();

        assert_eq!(config.native_library(), Some("interop_native"));
        assert_eq!(config.search_paths(), &[PathBuf::from("target/debug")]);
    }

    #[test]
    fn test_parse_import_defaults() {
        let config = parse(
            r#"
[[import]]
name = "abs"
library = "libc.so.6"
params = ["c_int"]
returns = "c_int"
"#,
        )
        .unwrap();

        let import = config.import("abs").unwrap();
        assert_eq!(import.symbol(), "abs");
        assert_eq!(import.convention(), "default");
        assert_eq!(import.returns(), "c_int");
    }

    #[test]
    fn test_import_void_return_default() {
        let config = parse(
            r#"
[[import]]
name = "fill"
library = "interop_native"
symbol = "fill_rng_bytes"
params = ["buffer"]
"#,
        )
        .unwrap();

        assert_eq!(config.import("fill").unwrap().returns(), "void");
        assert_eq!(config.import("fill").unwrap().symbol(), "fill_rng_bytes");
    }

    #[test]
    fn test_reject_unknown_field() {
        let result = parse(
            r#"
[native]
libary = "typo"
"#,
        );
        assert!(matches!(result, Err(ConfigError::TomlParseError { .. })));
    }

    #[test]
    fn test_reject_bad_convention() {
        let result = parse(
            r#"
[[import]]
name = "add"
library = "m"
convention = "fastcall"
"#,
        );
        assert!(matches!(result, Err(ConfigError::InvalidValue { .. })));
    }

    #[test]
    fn test_convention_aliases_accepted() {
        for convention in ["cdecl", "C", "system", "WinAPI", "Stdcall", "default"] {
            let toml = format!(
                "[[import]]\nname = \"add\"\nlibrary = \"m\"\nconvention = \"{}\"\n",
                convention
            );
            assert!(parse(&toml).is_ok(), "rejected convention {}", convention);
        }
    }

    #[test]
    fn test_reject_unknown_param_type() {
        let result = parse(
            r#"
[[import]]
name = "add"
library = "m"
params = ["c_int", "c_float"]
returns = "c_int"
"#,
        );
        assert!(
            matches!(result, Err(ConfigError::InvalidValue { field, .. }) if field == "import.add")
        );
    }

    #[test]
    fn test_reject_buffer_return() {
        let result = parse(
            r#"
[[import]]
name = "fill"
library = "m"
returns = "buffer"
"#,
        );
        assert!(matches!(result, Err(ConfigError::InvalidValue { .. })));
    }

    #[test]
    fn test_reject_zero_timeout() {
        let result = parse(
            r#"
[process]
timeout_ms = 0
"#,
        );
        assert!(matches!(result, Err(ConfigError::InvalidValue { .. })));
    }

    #[test]
    fn test_reject_duplicate_import() {
        let result = parse(
            r#"
[[import]]
name = "add"
library = "a"

[[import]]
name = "add"
library = "b"
"#,
        );
        assert!(matches!(result, Err(ConfigError::DuplicateImport(name)) if name == "add"));
    }

    #[test]
    fn test_rebase_relative_paths() {
        let mut config = parse(
            r#"
[native]
search_paths = ["lib", "/opt/native"]

[process]
executable = "bin/probe"
"#,
        )
        .unwrap();

        config.rebase(Path::new("/project"));

        assert_eq!(
            config.search_paths(),
            &[PathBuf::from("/project/lib"), PathBuf::from("/opt/native")]
        );
        assert_eq!(
            config.process.unwrap().executable,
            Some(PathBuf::from("/project/bin/probe"))
        );
    }

    #[test]
    fn test_rebase_keeps_bare_executable_name() {
        let mut config = parse(
            r#"
[process]
executable = "probe"
"#,
        )
        .unwrap();

        config.rebase(Path::new("/project"));
        assert_eq!(
            config.process.unwrap().executable,
            Some(PathBuf::from("probe"))
        );
    }
}
