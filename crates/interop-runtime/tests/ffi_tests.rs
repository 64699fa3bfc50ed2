//! Symbol resolution and native call tests
//!
//! Real native code is exercised through the platform C library on Linux;
//! everything else uses in-process `extern "C"` functions.

use interop_runtime::ffi::{
    Arg, CallingConvention, ExternFunction, ExternType, FfiSignature, MarshaledBuffer,
    NativeSymbol, SymbolResolver, Value,
};
use interop_runtime::BridgeError;
use pretty_assertions::assert_eq;
use rstest::rstest;
use std::os::raw::c_int;

#[cfg(target_os = "linux")]
const LIBC: &str = "libc.so.6";

// ============================================================================
// Resolution
// ============================================================================

#[test]
fn test_missing_library_is_symbol_not_found() {
    let resolver = SymbolResolver::new();
    let err = resolver
        .resolve(&NativeSymbol::cdecl("no_such_library_for_interop", "anything"))
        .unwrap_err();
    assert!(matches!(err, BridgeError::SymbolNotFound { .. }));
    assert!(err.is_call_not_made());
    assert_eq!(resolver.resolution_count(), 0);
}

#[cfg(target_os = "linux")]
#[test]
fn test_missing_symbol_is_entry_point_not_found() {
    let resolver = SymbolResolver::new();
    let err = resolver
        .resolve(&NativeSymbol::cdecl(LIBC, "no_such_symbol_for_interop"))
        .unwrap_err();
    assert!(matches!(
        err,
        BridgeError::EntryPointNotFound { ref symbol, .. } if symbol == "no_such_symbol_for_interop"
    ));
    // The library itself loaded
    assert_eq!(resolver.loaded_count(), 1);
    assert_eq!(resolver.cached_symbol_count(), 0);
}

#[cfg(target_os = "linux")]
#[test]
fn test_resolution_is_cached() {
    let resolver = SymbolResolver::new();
    let symbol = NativeSymbol::cdecl(LIBC, "abs");

    let first = resolver.resolve(&symbol).unwrap();
    let second = resolver.resolve(&symbol).unwrap();

    assert_eq!(first.address(), second.address());
    assert_eq!(resolver.resolution_count(), 1);
    assert_eq!(resolver.loaded_count(), 1);
}

#[cfg(target_os = "linux")]
#[test]
fn test_concurrent_resolution_resolves_once() {
    use std::sync::Arc;

    let resolver = Arc::new(SymbolResolver::new());
    let handles: Vec<_> = (0..8)
        .map(|_| {
            let resolver = Arc::clone(&resolver);
            std::thread::spawn(move || {
                resolver
                    .resolve(&NativeSymbol::cdecl(LIBC, "labs"))
                    .unwrap()
                    .address()
            })
        })
        .collect();

    let addresses: Vec<usize> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    assert!(addresses.windows(2).all(|w| w[0] == w[1]));
    assert_eq!(resolver.resolution_count(), 1);
}

// ============================================================================
// Runtime-marshaled calls
// ============================================================================

#[cfg(target_os = "linux")]
#[rstest]
#[case(-5, 5)]
#[case(0, 0)]
#[case(i32::MAX, i32::MAX)]
#[case(-i32::MAX, i32::MAX)]
fn test_call_libc_abs(#[case] input: i32, #[case] expected: i32) {
    let resolver = SymbolResolver::new();
    let sig = FfiSignature::parse("abs", &["c_int"], "c_int", "cdecl").unwrap();
    let abs = resolver
        .resolve_function(&NativeSymbol::cdecl(LIBC, "abs"), sig)
        .unwrap();

    let result = unsafe { abs.call(vec![Arg::from(input)]) }.unwrap();
    assert_eq!(result, Value::Int(expected));
}

#[cfg(all(target_os = "linux", target_pointer_width = "64"))]
#[test]
fn test_call_libc_labs() {
    let resolver = SymbolResolver::new();
    let sig = FfiSignature::new("labs", vec![ExternType::CInt64], ExternType::CInt64);
    let labs = resolver
        .resolve_function(&NativeSymbol::cdecl(LIBC, "labs"), sig)
        .unwrap();

    let result = unsafe { labs.call(vec![Arg::from(-(1_i64 << 40))]) }.unwrap();
    assert_eq!(result, Value::Int64(1 << 40));
}

#[cfg(target_os = "linux")]
#[test]
fn test_wrong_argument_type_fails_before_call() {
    let resolver = SymbolResolver::new();
    let sig = FfiSignature::new("abs", vec![ExternType::CInt], ExternType::CInt);
    let abs = resolver
        .resolve_function(&NativeSymbol::cdecl(LIBC, "abs"), sig)
        .unwrap();

    let err = unsafe { abs.call(vec![Arg::from(-5_i64)]) }.unwrap_err();
    assert!(matches!(err, BridgeError::TypeMismatch { .. }));
    assert!(err.is_call_not_made());
}

#[test]
fn test_resolve_function_rejects_invalid_signature() {
    let resolver = SymbolResolver::new();
    let sig = FfiSignature::new("bad", vec![ExternType::CVoid], ExternType::CInt);
    let result = resolver.resolve_function(&NativeSymbol::cdecl("whatever", "bad"), sig);
    assert!(matches!(result, Err(BridgeError::UnsupportedSignature(_))));
    assert_eq!(resolver.loaded_count(), 0);
}

// ============================================================================
// Buffers
// ============================================================================

extern "C" fn xor_fill(ptr: *mut u8, len: c_int) -> c_int {
    let region = unsafe { std::slice::from_raw_parts_mut(ptr, len as usize) };
    for byte in region.iter_mut() {
        *byte ^= 0xAA;
    }
    len
}

fn xor_fill_function() -> ExternFunction {
    let sig = FfiSignature::new("xor_fill", vec![ExternType::Buffer], ExternType::CInt)
        .with_convention(CallingConvention::Cdecl);
    unsafe { ExternFunction::new(xor_fill as *const (), sig) }
}

#[rstest]
#[case(0)]
#[case(1)]
#[case(8)]
fn test_declared_length_within_capacity(#[case] declared: usize) {
    let func = xor_fill_function();
    let mut data = [0u8; 8];

    let result = unsafe { func.call(vec![Arg::from(MarshaledBuffer::new(&mut data, declared))]) };

    assert_eq!(result.unwrap(), Value::Int(declared as i32));
    assert!(data[..declared].iter().all(|b| *b == 0xAA));
    assert!(data[declared..].iter().all(|b| *b == 0));
}

#[test]
fn test_declared_length_beyond_capacity() {
    let func = xor_fill_function();
    let mut data = [0u8; 8];

    let err = unsafe { func.call(vec![Arg::from(MarshaledBuffer::new(&mut data, 9))]) }
        .unwrap_err();

    assert!(matches!(
        err,
        BridgeError::BufferOverrun {
            declared: 9,
            capacity: 8
        }
    ));
    // No native code ran
    assert_eq!(data, [0u8; 8]);
}

#[test]
fn test_buffer_reusable_after_call() {
    let func = xor_fill_function();
    let mut data = vec![1u8, 2, 3];

    unsafe { func.call(vec![Arg::from(data.as_mut_slice())]) }.unwrap();
    data.push(4);
    unsafe { func.call(vec![Arg::from(data.as_mut_slice())]) }.unwrap();

    assert_eq!(data, vec![1, 2, 3, 4 ^ 0xAA]);
}

// ============================================================================
// Static imports
// ============================================================================

#[cfg(target_os = "linux")]
mod static_imports {
    use super::*;
    use pretty_assertions::assert_eq;

    interop_runtime::native_import! {
        fn c_abs(x: c_int) -> c_int = "libc.so.6" :: "abs" as extern "C";
        fn c_labs(x: i64) -> i64 = "libc.so.6" :: "labs" as extern "system";
        fn missing(x: c_int) -> c_int = "no_such_library_for_interop" :: "missing" as extern "C";
    }

    #[test]
    fn test_static_import_calls_native() {
        assert_eq!(unsafe { c_abs(-42) }.unwrap(), 42);
        assert_eq!(unsafe { c_abs(i32::MIN + 1) }.unwrap(), i32::MAX);
    }

    #[cfg(target_pointer_width = "64")]
    #[test]
    fn test_static_import_system_abi() {
        assert_eq!(unsafe { c_labs(-7) }.unwrap(), 7);
    }

    #[test]
    fn test_static_import_failure_not_cached() {
        for _ in 0..2 {
            let err = unsafe { missing(1) }.unwrap_err();
            assert!(matches!(err, BridgeError::SymbolNotFound { .. }));
        }
    }
}
