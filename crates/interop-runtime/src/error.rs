//! Bridge error taxonomy
//!
//! Every failure the bridge can detect happens on the managed side, before or
//! at the call boundary. Faults inside native code (wild writes, crashes) are
//! outside this taxonomy: they cannot be observed, only avoided.

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Errors surfaced by the bridge
#[derive(Error, Debug)]
pub enum BridgeError {
    /// The native library could not be located or loaded
    #[error("Library '{library}' not found: {reason}")]
    SymbolNotFound { library: String, reason: String },

    /// The library loaded but does not export the requested symbol
    #[error("Entry point '{symbol}' not found in library '{library}'")]
    EntryPointNotFound { library: String, symbol: String },

    /// Symbol name cannot be passed to the OS loader
    #[error("Invalid symbol name: {0:?}")]
    InvalidSymbolName(String),

    /// Declared buffer length exceeds what the caller actually supplied
    #[error("Buffer overrun: declared length {declared} exceeds capacity {capacity}")]
    BufferOverrun { declared: usize, capacity: usize },

    /// Wrong number of arguments for the declared signature
    #[error("Expected {expected} arguments, got {got}")]
    ArityMismatch { expected: usize, got: usize },

    /// Managed value does not match the declared native type
    #[error("Type mismatch: expected {expected}, got {got}")]
    TypeMismatch { expected: String, got: String },

    /// No dispatch exists for this signature
    #[error("Unsupported FFI signature: {0}")]
    UnsupportedSignature(String),

    /// The call was made and the native side reported failure
    #[error("Native function '{symbol}' reported failure code {code}")]
    NativeFailure { symbol: String, code: i64 },

    /// Export table used before `exports::startup()`
    #[error("Managed exports are not initialized (call startup first)")]
    ExportsNotInitialized,

    /// An export with this name is already registered
    #[error("Export '{0}' is already registered")]
    DuplicateExport(String),

    /// No export with this name
    #[error("Export '{0}' is not registered")]
    ExportNotFound(String),

    /// Export signature uses types that cannot cross the boundary
    #[error("Invalid signature for export '{name}': {reason}")]
    InvalidExportSignature { name: String, reason: String },

    /// The child process could not be started
    #[error("Failed to launch '{}': {source}", path.display())]
    LaunchFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Waiting on a started child failed
    #[error("Failed to wait for process {pid}: {source}")]
    WaitFailed {
        pid: u32,
        #[source]
        source: std::io::Error,
    },

    /// The child outlived its wait limit and was terminated
    #[error("Process {pid} did not exit within {timeout:?} and was terminated")]
    WaitTimedOut { pid: u32, timeout: Duration },

    /// Operation not valid in the handle's current lifecycle state
    #[error("Invalid process state: {0}")]
    InvalidProcessState(String),
}

impl BridgeError {
    /// True when the failure happened before control crossed into native code
    ///
    /// `NativeFailure` means the native function ran; the wait errors mean the
    /// child process was started.
    pub fn is_call_not_made(&self) -> bool {
        !matches!(
            self,
            BridgeError::NativeFailure { .. }
                | BridgeError::WaitFailed { .. }
                | BridgeError::WaitTimedOut { .. }
        )
    }
}

/// Result type for bridge operations
pub type BridgeResult<T> = Result<T, BridgeError>;
