//! Native calls through direct function pointers
//!
//! Signatures are declared up front, so calls dispatch on the declared
//! signature to a concrete function pointer type instead of building call
//! frames dynamically.
//!
//! # Calling contract
//!
//! The declared signature cannot be checked against the native definition.
//! Arity and managed-side types are validated before the call; a declaration
//! that disagrees with the real native function is undefined behavior at the
//! boundary, and the bridge does not try to detect it.

use crate::error::{BridgeError, BridgeResult};
use crate::ffi::loader::ResolvedSymbol;
use crate::ffi::marshal::{Arg, MarshalContext};
use crate::ffi::types::{CType, FfiSignature, NativeSymbol, Value};
use libloading::Library;
use std::os::raw::{c_double, c_int};
use std::sync::Arc;
use tracing::trace;

/// Transmute the entry point to a concrete function pointer and call it
/// with the ABI selected by the signature's convention.
macro_rules! invoke_ptr {
    ($func:expr, fn($($ty:ty),*) -> $ret:ty, ($($arg:expr),*)) => {{
        if $func.signature.convention.uses_system_abi() {
            let f: extern "system" fn($($ty),*) -> $ret = std::mem::transmute($func.fn_ptr);
            f($($arg),*)
        } else {
            let f: extern "C" fn($($ty),*) -> $ret = std::mem::transmute($func.fn_ptr);
            f($($arg),*)
        }
    }};
}

/// A native entry point bound to a declared signature
#[derive(Clone)]
pub struct ExternFunction {
    /// Raw function pointer (type-erased)
    fn_ptr: *const (),
    signature: FfiSignature,
    /// Keeps the owning library loaded while the pointer is reachable
    _library: Option<Arc<Library>>,
}

// Safety: holds only a code address and immutable metadata
unsafe impl Send for ExternFunction {}
unsafe impl Sync for ExternFunction {}

impl ExternFunction {
    /// Bind an entry point to a signature
    ///
    /// # Safety
    ///
    /// The caller must ensure:
    /// - `fn_ptr` points to a valid function
    /// - The function's actual signature and ABI match `signature`
    /// - The function remains valid for the lifetime of this ExternFunction
    pub unsafe fn new(fn_ptr: *const (), signature: FfiSignature) -> Self {
        Self {
            fn_ptr,
            signature,
            _library: None,
        }
    }

    pub(crate) fn bound(resolved: ResolvedSymbol, signature: FfiSignature) -> Self {
        Self {
            fn_ptr: resolved.as_ptr(),
            signature,
            _library: Some(resolved.library()),
        }
    }

    /// Call the function with managed arguments
    ///
    /// Arguments are marshaled in declaration order, the call blocks the
    /// current thread until the native function returns, and every buffer
    /// pinned for the call is released before this returns, on success or
    /// error. If the signature declares a failure code and the native side
    /// returns it, the result is `NativeFailure`.
    ///
    /// # Safety
    ///
    /// Calls foreign code under the declared signature; see the module docs.
    pub unsafe fn call<'a>(&self, args: Vec<Arg<'a>>) -> BridgeResult<Value> {
        if args.len() != self.signature.params.len() {
            return Err(BridgeError::ArityMismatch {
                expected: self.signature.params.len(),
                got: args.len(),
            });
        }

        let mut ctx = MarshalContext::new();
        let c_args = args
            .into_iter()
            .zip(self.signature.params.iter())
            .map(|(arg, ty)| ctx.to_native(arg, *ty))
            .collect::<BridgeResult<Vec<_>>>()?;

        trace!(function = %self.signature.name, pinned = ctx.pinned_count(), "native call");

        let c_result = self.call_with_signature(&c_args)?;
        let result = ctx.from_native(c_result)?;
        ctx.release_all();

        match (self.signature.failure_code, result.as_i64()) {
            (Some(code), Some(got)) if code == got => Err(BridgeError::NativeFailure {
                symbol: self.signature.name.clone(),
                code,
            }),
            _ => Ok(result),
        }
    }

    /// Dispatch on the signature key to a concrete function pointer type
    ///
    /// A buffer slot expands to the native pair `(unsigned char*, int)`.
    unsafe fn call_with_signature(&self, args: &[CType]) -> BridgeResult<CType> {
        let sig = self.signature.signature_key();

        match (sig.as_str(), args) {
            // No parameters
            ("()->CInt", []) => Ok(CType::Int(invoke_ptr!(self, fn() -> c_int, ()))),
            ("()->CInt64", []) => Ok(CType::Int64(invoke_ptr!(self, fn() -> i64, ()))),
            ("()->CUInt", []) => Ok(CType::UInt(invoke_ptr!(self, fn() -> u32, ()))),
            ("()->CUInt64", []) => Ok(CType::UInt64(invoke_ptr!(self, fn() -> u64, ()))),
            ("()->CDouble", []) => Ok(CType::Double(invoke_ptr!(self, fn() -> c_double, ()))),
            ("()->CBool", []) => Ok(CType::Bool(invoke_ptr!(self, fn() -> u8, ()))),
            ("()->CVoid", []) => {
                invoke_ptr!(self, fn() -> (), ());
                Ok(CType::Void)
            }

            // One parameter
            ("(CInt)->CInt", [CType::Int(a)]) => {
                Ok(CType::Int(invoke_ptr!(self, fn(c_int) -> c_int, (*a))))
            }
            ("(CInt64)->CInt64", [CType::Int64(a)]) => {
                Ok(CType::Int64(invoke_ptr!(self, fn(i64) -> i64, (*a))))
            }
            ("(CDouble)->CDouble", [CType::Double(a)]) => {
                Ok(CType::Double(invoke_ptr!(self, fn(c_double) -> c_double, (*a))))
            }
            ("(Buffer)->CVoid", [CType::Buffer { ptr, len }]) => {
                invoke_ptr!(self, fn(*mut u8, c_int) -> (), (*ptr, *len));
                Ok(CType::Void)
            }
            ("(Buffer)->CInt", [CType::Buffer { ptr, len }]) => {
                Ok(CType::Int(invoke_ptr!(self, fn(*mut u8, c_int) -> c_int, (*ptr, *len))))
            }

            // Two parameters
            ("(CInt,CInt)->CInt", [CType::Int(a), CType::Int(b)]) => {
                Ok(CType::Int(invoke_ptr!(self, fn(c_int, c_int) -> c_int, (*a, *b))))
            }
            ("(CInt64,CInt64)->CInt64", [CType::Int64(a), CType::Int64(b)]) => {
                Ok(CType::Int64(invoke_ptr!(self, fn(i64, i64) -> i64, (*a, *b))))
            }
            ("(CDouble,CDouble)->CDouble", [CType::Double(a), CType::Double(b)]) => Ok(
                CType::Double(invoke_ptr!(self, fn(c_double, c_double) -> c_double, (*a, *b))),
            ),

            _ => Err(BridgeError::UnsupportedSignature(format!(
                "{} ({})",
                self.signature, sig
            ))),
        }
    }

    /// Declared signature
    pub fn signature(&self) -> &FfiSignature {
        &self.signature
    }

    /// Entry point address
    pub fn address(&self) -> usize {
        self.fn_ptr as usize
    }
}

impl std::fmt::Debug for ExternFunction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExternFunction")
            .field("signature", &self.signature.to_string())
            .field("address", &format_args!("{:#x}", self.address()))
            .finish()
    }
}

/// A resolved symbol as a typed function pointer
///
/// Produced once by the resolver and reused; the type parameter carries the
/// declared ABI and signature, so every call site shares one declaration.
#[derive(Clone)]
pub struct NativeFunction<F: Copy> {
    func: F,
    symbol: NativeSymbol,
    _library: Option<Arc<Library>>,
}

impl<F: Copy> NativeFunction<F> {
    pub(crate) fn new(func: F, symbol: NativeSymbol, library: Option<Arc<Library>>) -> Self {
        Self {
            func,
            symbol,
            _library: library,
        }
    }

    /// The typed function pointer
    pub fn get(&self) -> F {
        self.func
    }

    /// The symbol this handle was resolved from
    pub fn symbol(&self) -> &NativeSymbol {
        &self.symbol
    }
}

impl<F: Copy> std::fmt::Debug for NativeFunction<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NativeFunction")
            .field("symbol", &self.symbol)
            .finish()
    }
}

/// Declare statically typed native imports
///
/// Each declaration becomes an `unsafe fn` returning `BridgeResult<ret>`.
/// The symbol is resolved through the global resolver on first call and the
/// typed handle cached for the process lifetime; failed resolutions are not
/// cached, so a later call retries.
///
/// `extern "C"` declares the C convention; `extern "system"` declares
/// `__stdcall` on 32-bit Windows and the C convention on every other target.
///
/// ```no_run
/// use std::os::raw::c_int;
///
/// interop_runtime::native_import! {
///     pub fn addition(a: c_int, b: c_int) -> c_int = "interop_native" :: "addition" as extern "C";
/// }
///
/// let sum = unsafe { addition(2, 3) }.unwrap();
/// assert_eq!(sum, 5);
/// ```
///
/// # Safety
///
/// Callers of the generated functions must ensure the declared parameter
/// types, return type and ABI match the native definition.
#[macro_export]
macro_rules! native_import {
    ($(
        $(#[$meta:meta])*
        $vis:vis fn $name:ident($($arg:ident: $ty:ty),* $(,)?) -> $ret:ty
            = $lib:literal :: $sym:literal as extern $abi:tt;
    )+) => {
        $(
            $(#[$meta])*
            #[allow(clippy::missing_safety_doc)]
            $vis unsafe fn $name($($arg: $ty),*) -> $crate::BridgeResult<$ret> {
                type Handle = unsafe extern $abi fn($($ty),*) -> $ret;
                static HANDLE: ::std::sync::OnceLock<$crate::ffi::NativeFunction<Handle>> =
                    ::std::sync::OnceLock::new();

                let handle = match HANDLE.get() {
                    Some(handle) => handle,
                    None => {
                        let symbol = $crate::ffi::NativeSymbol::new(
                            $lib,
                            $sym,
                            $crate::ffi::CallingConvention::from_abi($abi),
                        );
                        let resolved = $crate::ffi::global_resolver()
                            .resolve_typed::<Handle>(&symbol)?;
                        HANDLE.get_or_init(|| resolved)
                    }
                };

                Ok((handle.get())($($arg),*))
            }
        )+
    };
}
