//! FFI type system - C-compatible types for the call boundary
//!
//! Defines:
//! - `ExternType`: declared native parameter/return types
//! - `CallingConvention`: the ABI a symbol is called with
//! - `NativeSymbol`: (library, symbol, convention) triple identifying an entry point
//! - `FfiSignature`: declared parameter list, return type and convention
//! - `Value`: managed-side scalar values
//! - `CType`: native-side representation of those values
//!
//! Type mapping:
//! - ExternType::CInt → CType::Int(c_int, exactly 32-bit two's complement)
//! - ExternType::CInt64 → CType::Int64(i64)
//! - ExternType::CUInt → CType::UInt(u32)
//! - ExternType::CUInt64 → CType::UInt64(u64)
//! - ExternType::CDouble → CType::Double(f64)
//! - ExternType::CBool → CType::Bool(u8)
//! - ExternType::CVoid → CType::Void
//! - ExternType::Buffer → CType::Buffer(unsigned char*, int); one declared slot, two native arguments

use crate::error::{BridgeError, BridgeResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::os::raw::{c_double, c_int};

/// C-compatible extern types for FFI
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ExternType {
    /// C int (32-bit)
    CInt,
    /// int64_t / long long
    CInt64,
    /// uint32_t / unsigned int
    CUInt,
    /// uint64_t / unsigned long long
    CUInt64,
    /// C double (f64)
    CDouble,
    /// C bool (u8: 0 or 1)
    CBool,
    /// C void (return type only)
    CVoid,
    /// Caller-owned byte region passed as (unsigned char*, int)
    Buffer,
}

impl ExternType {
    /// Parse a type from its declaration name
    ///
    /// Accepts the C spelling, the Rust spelling and the display name.
    pub fn from_name(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "c_int" | "int" | "i32" | "int32" | "int32_t" => Some(ExternType::CInt),
            "c_int64" | "long long" | "i64" | "int64" | "int64_t" => Some(ExternType::CInt64),
            "c_uint" | "unsigned int" | "u32" | "uint32" | "uint32_t" => Some(ExternType::CUInt),
            "c_uint64" | "unsigned long long" | "u64" | "uint64" | "uint64_t" => {
                Some(ExternType::CUInt64)
            }
            "c_double" | "double" | "f64" => Some(ExternType::CDouble),
            "c_bool" | "bool" => Some(ExternType::CBool),
            "c_void" | "void" | "()" => Some(ExternType::CVoid),
            "buffer" | "bytes" | "span<byte>" => Some(ExternType::Buffer),
            _ => None,
        }
    }

    /// Get a display name for this extern type
    pub fn display_name(&self) -> &'static str {
        match self {
            ExternType::CInt => "c_int",
            ExternType::CInt64 => "c_int64",
            ExternType::CUInt => "c_uint",
            ExternType::CUInt64 => "c_uint64",
            ExternType::CDouble => "c_double",
            ExternType::CBool => "c_bool",
            ExternType::CVoid => "c_void",
            ExternType::Buffer => "buffer",
        }
    }

    /// Size in bytes of the scalar's native representation
    ///
    /// `None` for void and buffers, which have no single fixed-width encoding.
    pub fn native_width(&self) -> Option<usize> {
        match self {
            ExternType::CInt => Some(std::mem::size_of::<c_int>()),
            ExternType::CInt64 => Some(std::mem::size_of::<i64>()),
            ExternType::CUInt => Some(std::mem::size_of::<u32>()),
            ExternType::CUInt64 => Some(std::mem::size_of::<u64>()),
            ExternType::CDouble => Some(std::mem::size_of::<c_double>()),
            ExternType::CBool => Some(std::mem::size_of::<u8>()),
            ExternType::CVoid | ExternType::Buffer => None,
        }
    }

    /// Whether a value of this type may be passed as a parameter
    pub fn is_parameter(&self) -> bool {
        !matches!(self, ExternType::CVoid)
    }

    /// Whether this type may be returned
    pub fn is_return(&self) -> bool {
        !matches!(self, ExternType::Buffer)
    }
}

impl fmt::Display for ExternType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

/// Calling convention declared for a symbol
///
/// The convention is a contract between caller and callee; nothing at the
/// binary level verifies it. A mismatch is undefined behavior.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CallingConvention {
    /// The C convention (`extern "C"`)
    Cdecl,
    /// `__stdcall` on 32-bit Windows; the C convention on every other target
    Stdcall,
    /// Platform default, identical to `Cdecl`
    #[default]
    Default,
}

impl CallingConvention {
    /// Parse a convention name ("cdecl", "stdcall", "default")
    pub fn from_name(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "cdecl" | "c" => Some(CallingConvention::Cdecl),
            "stdcall" | "system" | "winapi" => Some(CallingConvention::Stdcall),
            "default" | "" => Some(CallingConvention::Default),
            _ => None,
        }
    }

    /// Map a Rust ABI string (`"C"`, `"system"`) to a convention
    pub fn from_abi(abi: &str) -> Self {
        match abi {
            "C" | "cdecl" => CallingConvention::Cdecl,
            "system" | "stdcall" => CallingConvention::Stdcall,
            _ => CallingConvention::Default,
        }
    }

    /// Whether calls go through the `extern "system"` ABI
    pub fn uses_system_abi(&self) -> bool {
        matches!(self, CallingConvention::Stdcall)
    }

    /// Get a display name for this convention
    pub fn display_name(&self) -> &'static str {
        match self {
            CallingConvention::Cdecl => "cdecl",
            CallingConvention::Stdcall => "stdcall",
            CallingConvention::Default => "default",
        }
    }
}

/// Identifies a callable native entry point
///
/// Invariant: `library` + `symbol` resolve to exactly one address at call
/// time, or resolution fails.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NativeSymbol {
    /// Library name or path, resolved by the host loader
    pub library: String,
    /// Exported symbol name (no mangling)
    pub symbol: String,
    /// Declared calling convention
    #[serde(default)]
    pub convention: CallingConvention,
}

impl NativeSymbol {
    /// Create a new symbol reference
    pub fn new(
        library: impl Into<String>,
        symbol: impl Into<String>,
        convention: CallingConvention,
    ) -> Self {
        Self {
            library: library.into(),
            symbol: symbol.into(),
            convention,
        }
    }

    /// Create a symbol reference using the C convention
    pub fn cdecl(library: impl Into<String>, symbol: impl Into<String>) -> Self {
        Self::new(library, symbol, CallingConvention::Cdecl)
    }
}

impl fmt::Display for NativeSymbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}!{}", self.library, self.symbol)
    }
}

/// A function signature for FFI calls
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FfiSignature {
    /// Function name (symbol or export name)
    pub name: String,
    /// Parameter types, in declaration order
    pub params: Vec<ExternType>,
    /// Return type
    pub ret: ExternType,
    /// Calling convention
    #[serde(default)]
    pub convention: CallingConvention,
    /// Return value the native side uses to report failure
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure_code: Option<i64>,
}

impl FfiSignature {
    /// Create a new signature with the default convention
    pub fn new(name: impl Into<String>, params: Vec<ExternType>, ret: ExternType) -> Self {
        Self {
            name: name.into(),
            params,
            ret,
            convention: CallingConvention::Default,
            failure_code: None,
        }
    }

    /// Set the calling convention
    pub fn with_convention(mut self, convention: CallingConvention) -> Self {
        self.convention = convention;
        self
    }

    /// Declare a return value that signals native-side failure
    pub fn with_failure_code(mut self, code: i64) -> Self {
        self.failure_code = Some(code);
        self
    }

    /// Build a signature from declaration strings
    ///
    /// ```
    /// # use interop_runtime::ffi::{FfiSignature, ExternType};
    /// let sig = FfiSignature::parse("add", &["c_int", "c_int"], "c_int", "cdecl").unwrap();
    /// assert_eq!(sig.params, vec![ExternType::CInt, ExternType::CInt]);
    /// ```
    pub fn parse<S: AsRef<str>>(
        name: &str,
        params: &[S],
        ret: &str,
        convention: &str,
    ) -> BridgeResult<Self> {
        let parse_type = |s: &str| {
            ExternType::from_name(s)
                .ok_or_else(|| BridgeError::UnsupportedSignature(format!("unknown type '{}'", s)))
        };

        let params = params
            .iter()
            .map(|p| parse_type(p.as_ref()))
            .collect::<BridgeResult<Vec<_>>>()?;
        let ret = parse_type(ret)?;
        let convention = CallingConvention::from_name(convention).ok_or_else(|| {
            BridgeError::UnsupportedSignature(format!("unknown convention '{}'", convention))
        })?;

        let sig = Self::new(name, params, ret).with_convention(convention);
        sig.validate()?;
        Ok(sig)
    }

    /// Check that every slot uses a type legal in its position
    pub fn validate(&self) -> BridgeResult<()> {
        if let Some(bad) = self.params.iter().find(|p| !p.is_parameter()) {
            return Err(BridgeError::UnsupportedSignature(format!(
                "{}: {} is not a valid parameter type",
                self.name, bad
            )));
        }
        if !self.ret.is_return() {
            return Err(BridgeError::UnsupportedSignature(format!(
                "{}: {} is not a valid return type",
                self.name, self.ret
            )));
        }
        Ok(())
    }

    /// Key used for call dispatch, e.g. `(CInt,CInt)->CInt`
    pub fn signature_key(&self) -> String {
        let params: Vec<String> = self.params.iter().map(|t| format!("{:?}", t)).collect();
        format!("({})->{:?}", params.join(","), self.ret)
    }
}

impl fmt::Display for FfiSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let params: Vec<&str> = self.params.iter().map(|t| t.display_name()).collect();
        write!(f, "{}({}) -> {}", self.name, params.join(", "), self.ret)?;
        if self.convention != CallingConvention::Default {
            write!(f, " [{}]", self.convention.display_name())?;
        }
        Ok(())
    }
}

/// Managed-side scalar value
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Value {
    Int(i32),
    Int64(i64),
    UInt(u32),
    UInt64(u64),
    Double(f64),
    Bool(bool),
    Void,
}

impl Value {
    /// Name of the value's type, for diagnostics
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Int(_) => "i32",
            Value::Int64(_) => "i64",
            Value::UInt(_) => "u32",
            Value::UInt64(_) => "u64",
            Value::Double(_) => "f64",
            Value::Bool(_) => "bool",
            Value::Void => "void",
        }
    }

    /// Integer view of the value, if it has one
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i as i64),
            Value::Int64(l) => Some(*l),
            Value::UInt(u) => Some(i64::from(*u)),
            Value::UInt64(u) => i64::try_from(*u).ok(),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Int(i) => write!(f, "{}", i),
            Value::Int64(l) => write!(f, "{}", l),
            Value::UInt(u) => write!(f, "{}", u),
            Value::UInt64(u) => write!(f, "{}", u),
            Value::Double(d) => write!(f, "{}", d),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Void => f.write_str("void"),
        }
    }
}

/// Native-side representation of a marshaled value
///
/// # Safety
///
/// `Buffer` pointers are only valid while the `MarshalContext` that produced
/// them is alive.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CType {
    /// C int value
    Int(c_int),
    /// int64_t value
    Int64(i64),
    /// uint32_t value
    UInt(u32),
    /// uint64_t value
    UInt64(u64),
    /// C double value
    Double(c_double),
    /// C bool (0 or 1)
    Bool(u8),
    /// C void (no value)
    Void,
    /// Pinned region: base pointer and length
    Buffer { ptr: *mut u8, len: c_int },
}
