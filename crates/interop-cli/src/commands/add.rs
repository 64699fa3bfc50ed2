use crate::config::Settings;
use anyhow::{Context, Result};
use interop_runtime::ffi::{Arg, ExternType, FfiSignature, NativeSymbol};

/// Call `addition` in the configured native library
pub fn run(settings: &Settings, a: i32, b: i32) -> Result<()> {
    let symbol = NativeSymbol::cdecl(&settings.library, "addition");
    let signature = FfiSignature::new(
        "addition",
        vec![ExternType::CInt, ExternType::CInt],
        ExternType::CInt,
    );

    let addition = settings
        .resolver()
        .resolve_function(&symbol, signature)
        .with_context(|| format!("Failed to bind {}", symbol))?;

    // Safety: addition is int(int, int) in the native library
    let sum = unsafe { addition.call(vec![Arg::from(a), Arg::from(b)]) }?;
    println!("{} + {} = {}", a, b, sum);
    Ok(())
}
