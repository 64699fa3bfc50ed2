//! Both bridge directions, end to end
//!
//! Managed to native: a static import of `addition` and a runtime-marshaled
//! buffer fill. Native to managed: the probe program, which links the
//! managed exports by C name, is launched and awaited.

use super::{hex, launch, random};
use crate::config::Settings;
use anyhow::{Context, Result};
use std::os::raw::c_int;

interop_runtime::native_import! {
    fn addition(a: c_int, b: c_int) -> c_int = "interop_native" :: "addition" as extern "C";
}

/// Operands are drawn from `OPERAND_MIN..OPERAND_MIN + OPERAND_SPAN`
const OPERAND_MIN: u32 = 10;
const OPERAND_SPAN: u32 = 90;

const RANDOM_LEN: usize = 16;

pub fn run(settings: &Settings, skip_launch: bool) -> Result<()> {
    println!("MANAGED CALL NATIVE");

    let (a, b) = (operand(), operand());
    // Safety: addition is int(int, int) in interop_native
    let sum = unsafe { addition(a, b) }.context("Failed to call native addition")?;
    println!("{} + {} = {}", a, b, sum);

    let bytes = random::fill(settings, RANDOM_LEN)?;
    println!("rng hex: {}", hex(&bytes));
    println!("rng bytes: {:?}", bytes);

    println!();
    println!("The managed exports are compiled into a native library; a native");
    println!("program can call them directly by C name, without this process.");

    if skip_launch {
        return Ok(());
    }

    println!();
    println!("NATIVE CALL MANAGED");
    let probe = settings.probe_path()?;
    launch::run_child(
        &probe,
        settings.config.process_args(),
        settings.config.process_timeout(),
    )
    .with_context(|| format!("Native probe {} failed", probe.display()))?;
    Ok(())
}

fn operand() -> c_int {
    let draw = OPERAND_MIN + interop_exports::rng_crypto_uint_32() % OPERAND_SPAN;
    // draw < 100
    draw as c_int
}
