//! Type marshaling - managed ↔ native conversions
//!
//! The only place that understands both memory models:
//! - `MarshalContext::to_native()`: managed arguments to native representations
//! - `MarshalContext::from_native()`: native results back to managed values
//! - `encode_scalar()` / `decode_scalar()`: fixed-width byte encodings
//!
//! # Memory Safety
//!
//! - Buffers are checked against their declared length before pinning
//! - Every pin is owned by the context and released when it drops
//! - No implicit numeric conversions: each managed type maps to one native type

use crate::error::{BridgeError, BridgeResult};
use crate::ffi::safety::{MarshaledBuffer, PinnedBuffer};
use crate::ffi::types::{CType, ExternType, Value};
use tracing::trace;

/// One argument to a native call
#[derive(Debug)]
pub enum Arg<'a> {
    /// Scalar passed by value
    Value(Value),
    /// Caller-owned region passed as pointer + length
    Buffer(MarshaledBuffer<'a>),
}

impl Arg<'_> {
    /// Name of the argument's type, for diagnostics
    pub fn type_name(&self) -> &'static str {
        match self {
            Arg::Value(v) => v.type_name(),
            Arg::Buffer(_) => "buffer",
        }
    }
}

impl From<Value> for Arg<'_> {
    fn from(v: Value) -> Self {
        Arg::Value(v)
    }
}

impl From<i32> for Arg<'_> {
    fn from(v: i32) -> Self {
        Arg::Value(Value::Int(v))
    }
}

impl From<i64> for Arg<'_> {
    fn from(v: i64) -> Self {
        Arg::Value(Value::Int64(v))
    }
}

impl From<u32> for Arg<'_> {
    fn from(v: u32) -> Self {
        Arg::Value(Value::UInt(v))
    }
}

impl From<u64> for Arg<'_> {
    fn from(v: u64) -> Self {
        Arg::Value(Value::UInt64(v))
    }
}

impl From<f64> for Arg<'_> {
    fn from(v: f64) -> Self {
        Arg::Value(Value::Double(v))
    }
}

impl From<bool> for Arg<'_> {
    fn from(v: bool) -> Self {
        Arg::Value(Value::Bool(v))
    }
}

impl<'a> From<MarshaledBuffer<'a>> for Arg<'a> {
    fn from(b: MarshaledBuffer<'a>) -> Self {
        Arg::Buffer(b)
    }
}

impl<'a> From<&'a mut [u8]> for Arg<'a> {
    fn from(b: &'a mut [u8]) -> Self {
        Arg::Buffer(MarshaledBuffer::whole(b))
    }
}

/// Marshal context for one native call
///
/// Owns the pins taken while marshaling arguments. Dropping the context
/// releases them, so they are released on every exit path.
///
/// # Example
///
/// ```
/// # use interop_runtime::ffi::{Arg, CType, ExternType, MarshalContext, Value};
/// let mut ctx = MarshalContext::new();
///
/// let c_value = ctx.to_native(Arg::from(42), ExternType::CInt).unwrap();
/// assert_eq!(c_value, CType::Int(42));
///
/// let back = ctx.from_native(c_value).unwrap();
/// assert_eq!(back, Value::Int(42));
/// ```
pub struct MarshalContext<'a> {
    pins: Vec<PinnedBuffer<'a>>,
}

impl<'a> MarshalContext<'a> {
    /// Create a new marshal context
    pub fn new() -> Self {
        Self { pins: Vec::new() }
    }

    /// Marshal one argument to its declared native type
    pub fn to_native(&mut self, arg: Arg<'a>, target: ExternType) -> BridgeResult<CType> {
        match (arg, target) {
            (Arg::Value(Value::Int(i)), ExternType::CInt) => Ok(CType::Int(i)),
            (Arg::Value(Value::Int64(l)), ExternType::CInt64) => Ok(CType::Int64(l)),
            (Arg::Value(Value::UInt(u)), ExternType::CUInt) => Ok(CType::UInt(u)),
            (Arg::Value(Value::UInt64(u)), ExternType::CUInt64) => Ok(CType::UInt64(u)),
            (Arg::Value(Value::Double(d)), ExternType::CDouble) => Ok(CType::Double(d)),
            (Arg::Value(Value::Bool(b)), ExternType::CBool) => Ok(CType::Bool(u8::from(b))),
            (Arg::Value(Value::Void), ExternType::CVoid) => Ok(CType::Void),

            (Arg::Buffer(buffer), ExternType::Buffer) => {
                let pinned = PinnedBuffer::acquire(buffer)?;
                let (ptr, len) = pinned.as_native();
                self.pins.push(pinned);
                Ok(CType::Buffer { ptr, len })
            }

            (arg, target) => Err(BridgeError::TypeMismatch {
                expected: target.display_name().to_string(),
                got: arg.type_name().to_string(),
            }),
        }
    }

    /// Marshal a native result back to a managed value
    pub fn from_native(&self, c_value: CType) -> BridgeResult<Value> {
        match c_value {
            CType::Int(i) => Ok(Value::Int(i)),
            CType::Int64(l) => Ok(Value::Int64(l)),
            CType::UInt(u) => Ok(Value::UInt(u)),
            CType::UInt64(u) => Ok(Value::UInt64(u)),
            CType::Double(d) => Ok(Value::Double(d)),
            CType::Bool(b) => Ok(Value::Bool(b != 0)),
            CType::Void => Ok(Value::Void),
            CType::Buffer { .. } => Err(BridgeError::TypeMismatch {
                expected: "scalar return".to_string(),
                got: "buffer".to_string(),
            }),
        }
    }

    /// Number of buffers currently pinned by this context
    pub fn pinned_count(&self) -> usize {
        self.pins.len()
    }

    /// Release every pin now
    pub fn release_all(&mut self) {
        if !self.pins.is_empty() {
            trace!(count = self.pins.len(), "releasing pinned buffers");
        }
        self.pins.clear();
    }
}

impl Default for MarshalContext<'_> {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for MarshalContext<'_> {
    fn drop(&mut self) {
        self.release_all();
    }
}

/// Encode a scalar into its native fixed-width byte representation
///
/// Native byte order; `c_int` is exactly 4 bytes of two's complement.
pub fn encode_scalar(value: Value) -> Vec<u8> {
    match value {
        Value::Int(i) => i.to_ne_bytes().to_vec(),
        Value::Int64(l) => l.to_ne_bytes().to_vec(),
        Value::UInt(u) => u.to_ne_bytes().to_vec(),
        Value::UInt64(u) => u.to_ne_bytes().to_vec(),
        Value::Double(d) => d.to_ne_bytes().to_vec(),
        Value::Bool(b) => vec![u8::from(b)],
        Value::Void => Vec::new(),
    }
}

/// Decode a scalar from its native byte representation
///
/// The byte count must equal the type's native width exactly.
pub fn decode_scalar(bytes: &[u8], ty: ExternType) -> BridgeResult<Value> {
    let mismatch = || BridgeError::TypeMismatch {
        expected: format!(
            "{} ({} bytes)",
            ty.display_name(),
            ty.native_width().unwrap_or(0)
        ),
        got: format!("{} bytes", bytes.len()),
    };

    match ty {
        ExternType::CInt => bytes
            .try_into()
            .map(|b| Value::Int(i32::from_ne_bytes(b)))
            .map_err(|_| mismatch()),
        ExternType::CInt64 => bytes
            .try_into()
            .map(|b| Value::Int64(i64::from_ne_bytes(b)))
            .map_err(|_| mismatch()),
        ExternType::CUInt => bytes
            .try_into()
            .map(|b| Value::UInt(u32::from_ne_bytes(b)))
            .map_err(|_| mismatch()),
        ExternType::CUInt64 => bytes
            .try_into()
            .map(|b| Value::UInt64(u64::from_ne_bytes(b)))
            .map_err(|_| mismatch()),
        ExternType::CDouble => bytes
            .try_into()
            .map(|b| Value::Double(f64::from_ne_bytes(b)))
            .map_err(|_| mismatch()),
        ExternType::CBool => match bytes {
            [b] => Ok(Value::Bool(*b != 0)),
            _ => Err(mismatch()),
        },
        ExternType::CVoid if bytes.is_empty() => Ok(Value::Void),
        ExternType::CVoid | ExternType::Buffer => Err(mismatch()),
    }
}
