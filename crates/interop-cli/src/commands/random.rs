use super::hex;
use crate::config::Settings;
use anyhow::{Context, Result};
use interop_native::FILL_FAILED;
use interop_runtime::ffi::{Arg, ExternType, FfiSignature, NativeSymbol};

/// Fill `len` bytes through the native library's random source
pub fn fill(settings: &Settings, len: usize) -> Result<Vec<u8>> {
    let symbol = NativeSymbol::cdecl(&settings.library, "try_fill_rng_bytes");
    let signature = FfiSignature::new("try_fill_rng_bytes", vec![ExternType::Buffer], ExternType::CInt)
        .with_failure_code(i64::from(FILL_FAILED));

    let fill_bytes = settings
        .resolver()
        .resolve_function(&symbol, signature)
        .with_context(|| format!("Failed to bind {}", symbol))?;

    let mut bytes = vec![0u8; len];
    // Safety: try_fill_rng_bytes is int(unsigned char *, int) and writes at most len bytes
    unsafe { fill_bytes.call(vec![Arg::from(bytes.as_mut_slice())]) }?;
    Ok(bytes)
}

pub fn run(settings: &Settings, len: usize) -> Result<()> {
    let bytes = fill(settings, len)?;
    println!("rng hex: {}", hex(&bytes));
    println!("rng bytes: {:?}", bytes);
    Ok(())
}
