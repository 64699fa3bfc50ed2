//! Native library for the interop bridge
//!
//! Plain C-ABI functions, built as a `cdylib` that the bridge loads by name
//! (`interop_native`) and as an `rlib` for in-process tests. Nothing here
//! depends on the bridge; these are the symbols it resolves.
//!
//! No function unwinds across the boundary. Invalid arguments make a call a
//! no-op or return the documented failure value.

#![allow(clippy::missing_safety_doc)]

use std::os::raw::c_int;

/// Status returned by `try_fill_rng_bytes` on success
pub const FILL_OK: c_int = 0;
/// Status returned by `try_fill_rng_bytes` on failure
pub const FILL_FAILED: c_int = -1;

/// Sum of two C ints, wrapping on overflow
#[no_mangle]
pub extern "C" fn addition(a: c_int, b: c_int) -> c_int {
    a.wrapping_add(b)
}

/// Fill `length` bytes at `buffer` with random bytes, in place
///
/// A null buffer or non-positive length is a no-op. If the OS entropy source
/// fails the region is zeroed rather than left partially written.
#[no_mangle]
pub unsafe extern "C" fn fill_rng_bytes(buffer: *mut u8, length: c_int) {
    if let Some(region) = region_mut(buffer, length) {
        if getrandom::getrandom(region).is_err() {
            region.fill(0);
        }
    }
}

/// Like `fill_rng_bytes`, reporting the outcome
///
/// Returns `FILL_OK`, or `FILL_FAILED` for a null buffer, a negative length,
/// or an entropy failure. A zero length succeeds without touching memory.
#[no_mangle]
pub unsafe extern "C" fn try_fill_rng_bytes(buffer: *mut u8, length: c_int) -> c_int {
    if length == 0 {
        return FILL_OK;
    }
    match region_mut(buffer, length) {
        Some(region) => match getrandom::getrandom(region) {
            Ok(()) => FILL_OK,
            Err(_) => FILL_FAILED,
        },
        None => FILL_FAILED,
    }
}

unsafe fn region_mut<'a>(buffer: *mut u8, length: c_int) -> Option<&'a mut [u8]> {
    if buffer.is_null() || length <= 0 {
        return None;
    }
    Some(std::slice::from_raw_parts_mut(buffer, length as usize))
}
