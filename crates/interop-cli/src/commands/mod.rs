pub mod add;
pub mod call;
pub mod demo;
pub mod exports;
pub mod launch;
pub mod random;

use anyhow::{bail, Context, Result};
use interop_runtime::ffi::{ExternType, Value};

/// Parse a command-line argument as a value of the declared native type
pub fn parse_scalar(ty: ExternType, raw: &str) -> Result<Value> {
    let invalid = || format!("invalid {} argument '{}'", ty, raw);
    let value = match ty {
        ExternType::CInt => Value::Int(raw.parse().with_context(invalid)?),
        ExternType::CInt64 => Value::Int64(raw.parse().with_context(invalid)?),
        ExternType::CUInt => Value::UInt(raw.parse().with_context(invalid)?),
        ExternType::CUInt64 => Value::UInt64(raw.parse().with_context(invalid)?),
        ExternType::CDouble => Value::Double(raw.parse().with_context(invalid)?),
        ExternType::CBool => Value::Bool(raw.parse().with_context(invalid)?),
        ExternType::CVoid | ExternType::Buffer => bail!("{} is not a scalar argument type", ty),
    };
    Ok(value)
}

/// Uppercase hex, two digits per byte
pub fn hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02X}", b)).collect()
}
