//! Managed export surface - entry points native code calls into
//!
//! A `ManagedExport` pairs a stable external name with a C-ABI entry point
//! whose signature uses primitive and buffer types only. Exports live in a
//! process-wide table with an explicit lifecycle:
//!
//! 1. `startup()` creates the table
//! 2. `register_export()` adds entries (typically once, at load time)
//! 3. native callers fetch addresses with `export_address()` or the bridge
//!    calls them with `invoke_export()`, any number of times from any thread
//! 4. `shutdown()` tears the table down
//!
//! # Initialization constraint
//!
//! An export compiled ahead of time into a shared library can be called by
//! native code as soon as the library is loaded, possibly before `startup()`
//! or any managed entry point has run. Export bodies must therefore be
//! self-contained: no lazily initialized globals, no loggers or allocators
//! configured at startup, no thread-affine state. The table only governs
//! discovery through the bridge; it is not a precondition for a native caller
//! holding the symbol directly.

use crate::error::{BridgeError, BridgeResult};
use crate::ffi::caller::ExternFunction;
use crate::ffi::marshal::Arg;
use crate::ffi::safety::check_null;
use crate::ffi::types::{FfiSignature, Value};
use std::collections::BTreeMap;
use std::sync::{PoisonError, RwLock};
use tracing::{debug, info};

/// A managed function exposed under a fixed external name
#[derive(Clone)]
pub struct ManagedExport {
    name: String,
    signature: FfiSignature,
    entry: *const (),
}

// Safety: the entry point is a code address with no managed state attached
unsafe impl Send for ManagedExport {}
unsafe impl Sync for ManagedExport {}

impl ManagedExport {
    /// Describe an export
    ///
    /// # Safety
    ///
    /// `entry` must be an `extern "C"` (or `extern "system"`, per the
    /// signature's convention) function whose parameters and return type
    /// match `signature`, and which stays valid for the process lifetime.
    pub unsafe fn new(
        name: impl Into<String>,
        signature: FfiSignature,
        entry: *const (),
    ) -> BridgeResult<Self> {
        let name = name.into();
        let invalid = |reason: &str| BridgeError::InvalidExportSignature {
            name: name.clone(),
            reason: reason.to_string(),
        };

        if name.is_empty() || name.contains('\0') {
            return Err(invalid("external name must be non-empty and contain no NUL"));
        }
        check_null(entry).map_err(invalid)?;
        signature
            .validate()
            .map_err(|e| invalid(&e.to_string()))?;

        Ok(Self {
            name,
            signature,
            entry,
        })
    }

    /// External name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Declared signature
    pub fn signature(&self) -> &FfiSignature {
        &self.signature
    }

    /// Entry point as a native caller would receive it
    pub fn entry_point(&self) -> *const () {
        self.entry
    }

    /// Call the export through the native calling convention
    ///
    /// # Safety
    ///
    /// Relies on the contract given to `ManagedExport::new`.
    pub unsafe fn invoke(&self, args: Vec<Arg<'_>>) -> BridgeResult<Value> {
        ExternFunction::new(self.entry, self.signature.clone()).call(args)
    }
}

impl std::fmt::Debug for ManagedExport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ManagedExport")
            .field("name", &self.name)
            .field("signature", &self.signature.to_string())
            .finish()
    }
}

/// Exports by external name
#[derive(Debug, Default, Clone)]
pub struct ExportRegistry {
    exports: BTreeMap<String, ManagedExport>,
}

impl ExportRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an export; names are unique
    pub fn register(&mut self, export: ManagedExport) -> BridgeResult<()> {
        if self.exports.contains_key(export.name()) {
            return Err(BridgeError::DuplicateExport(export.name.clone()));
        }
        debug!(export = %export.name, signature = %export.signature, "registered export");
        self.exports.insert(export.name.clone(), export);
        Ok(())
    }

    /// Look up an export by name
    pub fn lookup(&self, name: &str) -> BridgeResult<&ManagedExport> {
        self.exports
            .get(name)
            .ok_or_else(|| BridgeError::ExportNotFound(name.to_string()))
    }

    /// Entry point address for an export
    pub fn entry_point(&self, name: &str) -> BridgeResult<*const ()> {
        self.lookup(name).map(ManagedExport::entry_point)
    }

    /// Call an export by name
    ///
    /// # Safety
    ///
    /// See `ManagedExport::invoke`.
    pub unsafe fn invoke(&self, name: &str, args: Vec<Arg<'_>>) -> BridgeResult<Value> {
        self.lookup(name)?.invoke(args)
    }

    /// Registered names, sorted
    pub fn names(&self) -> Vec<&str> {
        self.exports.keys().map(String::as_str).collect()
    }

    /// Iterate over exports in name order
    pub fn iter(&self) -> impl Iterator<Item = &ManagedExport> {
        self.exports.values()
    }

    pub fn len(&self) -> usize {
        self.exports.len()
    }

    pub fn is_empty(&self) -> bool {
        self.exports.is_empty()
    }
}

static PROCESS_EXPORTS: RwLock<Option<ExportRegistry>> = RwLock::new(None);

/// Create the process-wide export table
///
/// Calling it again while initialized keeps the existing table.
pub fn startup() {
    let mut table = PROCESS_EXPORTS
        .write()
        .unwrap_or_else(PoisonError::into_inner);
    if table.is_none() {
        info!("managed exports started");
        *table = Some(ExportRegistry::new());
    }
}

/// Tear down the export table, returning how many exports it held
pub fn shutdown() -> usize {
    let removed = PROCESS_EXPORTS
        .write()
        .unwrap_or_else(PoisonError::into_inner)
        .take()
        .map_or(0, |registry| registry.len());
    info!(removed, "managed exports shut down");
    removed
}

/// Whether `startup()` has run without a matching `shutdown()`
pub fn is_initialized() -> bool {
    PROCESS_EXPORTS
        .read()
        .unwrap_or_else(PoisonError::into_inner)
        .is_some()
}

/// Register an export in the process-wide table
pub fn register_export(export: ManagedExport) -> BridgeResult<()> {
    PROCESS_EXPORTS
        .write()
        .unwrap_or_else(PoisonError::into_inner)
        .as_mut()
        .ok_or(BridgeError::ExportsNotInitialized)?
        .register(export)
}

/// Read the process-wide table
///
/// The lock is held for the duration of `f`; do not call exports from it.
pub fn with_exports<R>(f: impl FnOnce(&ExportRegistry) -> R) -> BridgeResult<R> {
    PROCESS_EXPORTS
        .read()
        .unwrap_or_else(PoisonError::into_inner)
        .as_ref()
        .map(f)
        .ok_or(BridgeError::ExportsNotInitialized)
}

/// Address of a registered export
pub fn export_address(name: &str) -> BridgeResult<usize> {
    with_exports(|registry| registry.entry_point(name).map(|ptr| ptr as usize))?
}

/// Call a registered export as a native caller would
///
/// The table lock is released before the call crosses the boundary.
///
/// # Safety
///
/// See `ManagedExport::invoke`.
pub unsafe fn invoke_export(name: &str, args: Vec<Arg<'_>>) -> BridgeResult<Value> {
    let export = with_exports(|registry| registry.lookup(name).cloned())??;
    export.invoke(args)
}
