//! Interop Runtime - managed/native call bridge
//!
//! This library provides the boundary-crossing machinery between managed
//! Rust code and native libraries or executables:
//! - Symbol resolution and caching for shared libraries
//! - Scalar and buffer marshaling with scoped pinning
//! - Native calls by runtime-declared signature or `native_import!`
//! - Managed exports with a process-wide startup/shutdown boundary
//! - Launching native executables and awaiting their exit

/// Interop runtime version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub mod error;
pub mod ffi;
pub mod process;

pub use error::{BridgeError, BridgeResult};
pub use ffi::exports;
pub use process::{run_to_completion, NativeProcessHandle, ProcessOutcome, ProcessState};
