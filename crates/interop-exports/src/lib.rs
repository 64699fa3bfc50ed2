//! Managed functions exported for native callers
//!
//! Built as a `cdylib`, this is the ahead-of-time compiled library native
//! programs link against or load: every function below is exported unmangled
//! with the C calling convention. Built as an `rlib`, it also supplies the
//! registration table the bridge uses to discover and call the same entry
//! points.
//!
//! # Initialization
//!
//! Native code may call these as soon as the library is mapped, before any
//! managed startup runs. The bodies therefore touch no lazily initialized
//! state, no logger and no process-wide export table; they only read the OS
//! entropy source and do arithmetic. None of them unwind.
//!
//! # Random ranges
//!
//! `rng_crypto_int_32` / `rng_crypto_int_64` keep the established behavior:
//! draw non-zero bytes, reinterpret as a signed integer, take the absolute
//! value. The results are non-negative, but the range is `[0, 2^31-1]` /
//! `[0, 2^63-1]` rather than the full unsigned range, and the magnitude
//! distribution is not uniform.
//!
//! `rng_crypto_uint_32` / `rng_crypto_uint_64` draw straight into the full
//! unsigned range.
//!
//! A bare integer return has no failure channel a native caller would check,
//! so every random export aborts the process when the OS entropy source fails
//! instead of returning a predictable value.

use interop_runtime::ffi::{CallingConvention, ExternType, FfiSignature, ManagedExport};
use interop_runtime::{exports, BridgeResult};
use std::os::raw::c_int;

/// External names, in registration order
pub const EXPORT_NAMES: [&str; 5] = [
    "aot_add",
    "rng_crypto_int_32",
    "rng_crypto_int_64",
    "rng_crypto_uint_32",
    "rng_crypto_uint_64",
];

/// Sum of two 32-bit integers, wrapping on overflow
#[no_mangle]
pub extern "C" fn aot_add(a: c_int, b: c_int) -> c_int {
    a.wrapping_add(b)
}

/// Non-negative random 32-bit integer in `[0, 2^31-1]`
#[no_mangle]
pub extern "C" fn rng_crypto_int_32() -> i32 {
    let mut bytes = [0u8; 4];
    abort_on_failure(fill_non_zero(&mut bytes));
    // Non-zero bytes rule out i32::MIN, which has no absolute value
    i32::from_ne_bytes(bytes).saturating_abs()
}

/// Non-negative random 64-bit integer in `[0, 2^63-1]`
#[no_mangle]
pub extern "C" fn rng_crypto_int_64() -> i64 {
    let mut bytes = [0u8; 8];
    abort_on_failure(fill_non_zero(&mut bytes));
    i64::from_ne_bytes(bytes).saturating_abs()
}

/// Uniform random 32-bit unsigned integer
#[no_mangle]
pub extern "C" fn rng_crypto_uint_32() -> u32 {
    let mut bytes = [0u8; 4];
    abort_on_failure(getrandom::getrandom(&mut bytes));
    u32::from_ne_bytes(bytes)
}

/// Uniform random 64-bit unsigned integer
#[no_mangle]
pub extern "C" fn rng_crypto_uint_64() -> u64 {
    let mut bytes = [0u8; 8];
    abort_on_failure(getrandom::getrandom(&mut bytes));
    u64::from_ne_bytes(bytes)
}

/// Fill with random bytes, redrawing any zero byte
fn fill_non_zero(bytes: &mut [u8]) -> Result<(), getrandom::Error> {
    getrandom::getrandom(bytes)?;
    for byte in bytes.iter_mut() {
        while *byte == 0 {
            getrandom::getrandom(std::slice::from_mut(byte))?;
        }
    }
    Ok(())
}

// Unwinding out of an extern "C" fn is not an option
fn abort_on_failure(result: Result<(), getrandom::Error>) {
    if result.is_err() {
        std::process::abort();
    }
}

/// Descriptions of every export, with their entry points
pub fn export_table() -> BridgeResult<Vec<ManagedExport>> {
    let int_pair = vec![ExternType::CInt, ExternType::CInt];

    let table = [
        (
            FfiSignature::new("aot_add", int_pair, ExternType::CInt),
            aot_add as *const (),
        ),
        (
            FfiSignature::new("rng_crypto_int_32", vec![], ExternType::CInt),
            rng_crypto_int_32 as *const (),
        ),
        (
            FfiSignature::new("rng_crypto_int_64", vec![], ExternType::CInt64),
            rng_crypto_int_64 as *const (),
        ),
        (
            FfiSignature::new("rng_crypto_uint_32", vec![], ExternType::CUInt),
            rng_crypto_uint_32 as *const (),
        ),
        (
            FfiSignature::new("rng_crypto_uint_64", vec![], ExternType::CUInt64),
            rng_crypto_uint_64 as *const (),
        ),
    ];

    table
        .into_iter()
        .map(|(signature, entry)| {
            let signature = signature.with_convention(CallingConvention::Cdecl);
            // Safety: each entry is the extern "C" fn described by its signature
            unsafe { ManagedExport::new(signature.name.clone(), signature, entry) }
        })
        .collect()
}

/// Register every export in the process-wide table
///
/// Requires `exports::startup()` to have run. Returns how many were added.
pub fn register_all() -> BridgeResult<usize> {
    let table = export_table()?;
    let count = table.len();
    for export in table {
        exports::register_export(export)?;
    }
    Ok(count)
}
