//! Foreign Function Interface (FFI) infrastructure
//!
//! Managed↔native calls in both directions:
//! - Symbol resolution (`loader`)
//! - Type marshaling and buffer pinning (`marshal`, `safety`)
//! - Native calls, by runtime signature or static declaration (`caller`)
//! - Managed exports callable from native code (`exports`)
//!
//! # Safety
//!
//! FFI operations involve `unsafe` code and careful memory management.
//! All unsafe code is isolated in this module with safe wrappers where the
//! bridge can uphold the contract itself; the remaining `unsafe fn`s mark the
//! places where correctness depends on a caller-declared signature.

pub mod caller;
pub mod exports;
pub mod loader;
pub mod marshal;
pub mod safety;
pub mod types;

pub use caller::{ExternFunction, NativeFunction};
pub use exports::{ExportRegistry, ManagedExport};
pub use loader::{configure_global_resolver, global_resolver, ResolvedSymbol, SymbolResolver};
pub use marshal::{decode_scalar, encode_scalar, Arg, MarshalContext};
pub use safety::{MarshaledBuffer, PinnedBuffer};
pub use types::{CType, CallingConvention, ExternType, FfiSignature, NativeSymbol, Value};
