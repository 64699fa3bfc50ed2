//! Symbol resolution for native calls
//!
//! Locates shared libraries with `libloading`, applying platform naming
//! conventions over a list of search directories, and resolves exported
//! symbols to callable addresses.
//!
//! Resolution is lazy and cached per (library, symbol) for the lifetime of the
//! resolver. The caches are `RwLock`-guarded: lookups take the read lock, and
//! the first resolution of a pair takes the write lock once to insert it.

use crate::error::{BridgeError, BridgeResult};
use crate::ffi::caller::{ExternFunction, NativeFunction};
use crate::ffi::types::{FfiSignature, NativeSymbol};
use libloading::Library;
use std::collections::HashMap;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, OnceLock, PoisonError, RwLock};
use tracing::debug;

/// A resolved entry point
///
/// Holds the library alive for as long as the address is reachable.
#[derive(Clone)]
pub struct ResolvedSymbol {
    address: usize,
    library: Arc<Library>,
}

impl ResolvedSymbol {
    /// Raw entry point address
    pub fn address(&self) -> usize {
        self.address
    }

    /// Entry point as an untyped function pointer
    pub fn as_ptr(&self) -> *const () {
        self.address as *const ()
    }

    pub(crate) fn library(&self) -> Arc<Library> {
        Arc::clone(&self.library)
    }
}

impl std::fmt::Debug for ResolvedSymbol {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResolvedSymbol")
            .field("address", &format_args!("{:#x}", self.address))
            .finish()
    }
}

/// Library loader and symbol cache
///
/// # Safety
///
/// Loading a library runs its static initializers in this process. The
/// resolver trusts every binary it loads.
pub struct SymbolResolver {
    /// Directories added by configuration, searched after the working directory
    configured: Vec<PathBuf>,
    /// Loaded libraries by the identifier they were requested with
    libraries: RwLock<HashMap<String, Arc<Library>>>,
    /// Resolved entry points by (library, symbol)
    symbols: RwLock<HashMap<(String, String), ResolvedSymbol>>,
    resolutions: AtomicUsize,
}

impl SymbolResolver {
    /// Create a resolver with the default search directories
    pub fn new() -> Self {
        Self::with_search_paths(Vec::new())
    }

    /// Create a resolver that also searches `paths`
    pub fn with_search_paths(paths: Vec<PathBuf>) -> Self {
        Self {
            configured: paths,
            libraries: RwLock::new(HashMap::new()),
            symbols: RwLock::new(HashMap::new()),
            resolutions: AtomicUsize::new(0),
        }
    }

    /// Add a search directory after the ones already configured
    pub fn add_search_path(&mut self, path: PathBuf) {
        self.configured.push(path);
    }

    /// Directories searched for a bare library name, in priority order
    ///
    /// Working directory, configured paths, then the executable's directory
    /// and its `deps/` subdirectory.
    pub fn search_dirs(&self) -> Vec<PathBuf> {
        let mut dirs = Vec::new();

        if let Ok(cwd) = std::env::current_dir() {
            dirs.push(cwd);
        }

        dirs.extend(self.configured.iter().cloned());

        if let Some(exe_dir) = std::env::current_exe()
            .ok()
            .and_then(|exe| exe.parent().map(Path::to_path_buf))
        {
            let deps = exe_dir.join("deps");
            // Test binaries run from target/<profile>/deps
            let profile_dir = exe_dir
                .ends_with("deps")
                .then(|| exe_dir.parent().map(Path::to_path_buf))
                .flatten();
            dirs.push(exe_dir);
            dirs.push(deps);
            dirs.extend(profile_dir);
        }

        dirs
    }

    /// Candidate file names for a library identifier
    ///
    /// - Linux: lib{name}.so
    /// - macOS: lib{name}.dylib or lib{name}.so
    /// - Windows: {name}.dll
    ///
    /// Identifiers that already carry an extension are used verbatim.
    fn candidate_names(name: &str) -> Vec<String> {
        if Path::new(name).extension().is_some() {
            return vec![name.to_string()];
        }

        let extensions: &[&str] = if cfg!(target_os = "windows") {
            &["dll"]
        } else if cfg!(target_os = "macos") {
            &["dylib", "so"]
        } else {
            &["so"]
        };

        let prefixes: &[&str] = if cfg!(target_os = "windows") {
            &["", "lib"]
        } else {
            &["lib", ""]
        };

        prefixes
            .iter()
            .flat_map(|prefix| {
                extensions
                    .iter()
                    .map(move |ext| format!("{}{}.{}", prefix, name, ext))
            })
            .collect()
    }

    /// Locate a library file in the search directories
    pub fn locate(&self, name: &str) -> Option<PathBuf> {
        let path = Path::new(name);
        if path.is_absolute() || path.components().count() > 1 {
            return path.exists().then(|| path.to_path_buf());
        }

        let names = Self::candidate_names(name);
        self.search_dirs().into_iter().find_map(|dir| {
            names
                .iter()
                .map(|file| dir.join(file))
                .find(|full| full.is_file())
        })
    }

    /// Load a library, or return the cached instance
    ///
    /// When no search directory holds the library, the identifier is handed
    /// to the OS loader, which applies its own search (`dlopen`/`LoadLibrary`).
    pub fn load_library(&self, name: &str) -> BridgeResult<Arc<Library>> {
        if let Some(lib) = self
            .libraries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
        {
            return Ok(Arc::clone(lib));
        }

        let target: OsString = match self.locate(name) {
            Some(path) => path.into_os_string(),
            None if Path::new(name).extension().is_some() => OsString::from(name),
            None => libloading::library_filename(name),
        };

        debug!(library = name, target = ?target, "loading native library");

        // Safety: loading runs the library's initializers; loaded binaries are trusted
        let library = unsafe { Library::new(&target) }.map_err(|e| BridgeError::SymbolNotFound {
            library: name.to_string(),
            reason: e.to_string(),
        })?;

        let mut libraries = self
            .libraries
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        let entry = libraries
            .entry(name.to_string())
            .or_insert_with(|| Arc::new(library));
        Ok(Arc::clone(entry))
    }

    /// Resolve a symbol to its entry point
    ///
    /// Fails with `SymbolNotFound` when the library cannot be loaded and
    /// `EntryPointNotFound` when it loads but lacks the symbol. Failures are
    /// not cached.
    pub fn resolve(&self, symbol: &NativeSymbol) -> BridgeResult<ResolvedSymbol> {
        if symbol.symbol.is_empty() || symbol.symbol.contains('\0') {
            return Err(BridgeError::InvalidSymbolName(symbol.symbol.clone()));
        }

        let key = (symbol.library.clone(), symbol.symbol.clone());
        if let Some(resolved) = self
            .symbols
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&key)
        {
            return Ok(resolved.clone());
        }

        let library = self.load_library(&symbol.library)?;

        // Safety: the address is only reinterpreted by callers that declare its signature
        let address = unsafe {
            library
                .get::<*const ()>(symbol.symbol.as_bytes())
                .map(|sym| *sym as usize)
        }
        .map_err(|_| BridgeError::EntryPointNotFound {
            library: symbol.library.clone(),
            symbol: symbol.symbol.clone(),
        })?;

        let mut symbols = self.symbols.write().unwrap_or_else(PoisonError::into_inner);
        let resolved = symbols.entry(key).or_insert_with(|| {
            self.resolutions.fetch_add(1, Ordering::Relaxed);
            debug!(symbol = %symbol, address = %format!("{:#x}", address), "resolved symbol");
            ResolvedSymbol { address, library }
        });
        Ok(resolved.clone())
    }

    /// Resolve a symbol and bind it to a declared signature
    ///
    /// The symbol's convention overrides the signature's.
    pub fn resolve_function(
        &self,
        symbol: &NativeSymbol,
        signature: FfiSignature,
    ) -> BridgeResult<ExternFunction> {
        let signature = signature.with_convention(symbol.convention);
        signature.validate()?;
        let resolved = self.resolve(symbol)?;
        Ok(ExternFunction::bound(resolved, signature))
    }

    /// Resolve a symbol as a typed function pointer
    ///
    /// # Safety
    ///
    /// `F` must be a function pointer type whose parameters, return type and
    /// ABI match the native definition exactly. Nothing at the binary level
    /// checks this; a mismatch is undefined behavior at call time.
    pub unsafe fn resolve_typed<F: Copy>(
        &self,
        symbol: &NativeSymbol,
    ) -> BridgeResult<NativeFunction<F>> {
        if std::mem::size_of::<F>() != std::mem::size_of::<*const ()>() {
            return Err(BridgeError::UnsupportedSignature(format!(
                "{}: handle type is not a function pointer",
                symbol
            )));
        }

        let resolved = self.resolve(symbol)?;
        let ptr = resolved.as_ptr();
        let func = std::mem::transmute_copy::<*const (), F>(&ptr);
        Ok(NativeFunction::new(
            func,
            symbol.clone(),
            Some(resolved.library()),
        ))
    }

    /// Number of distinct (library, symbol) pairs resolved so far
    pub fn resolution_count(&self) -> usize {
        self.resolutions.load(Ordering::Relaxed)
    }

    /// Number of loaded libraries
    pub fn loaded_count(&self) -> usize {
        self.libraries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Number of cached entry points
    pub fn cached_symbol_count(&self) -> usize {
        self.symbols
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

impl Default for SymbolResolver {
    fn default() -> Self {
        Self::new()
    }
}

static GLOBAL_RESOLVER: OnceLock<SymbolResolver> = OnceLock::new();

/// Process-wide resolver used by `native_import!` declarations
pub fn global_resolver() -> &'static SymbolResolver {
    GLOBAL_RESOLVER.get_or_init(SymbolResolver::new)
}

/// Set the process-wide resolver's search paths
///
/// Returns `false` if the global resolver was already in use.
pub fn configure_global_resolver(paths: Vec<PathBuf>) -> bool {
    let configured = GLOBAL_RESOLVER
        .set(SymbolResolver::with_search_paths(paths))
        .is_ok();
    if !configured {
        debug!("global resolver already initialized; search paths unchanged");
    }
    configured
}
