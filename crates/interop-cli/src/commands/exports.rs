use super::parse_scalar;
use crate::config::Settings;
use anyhow::{anyhow, Context, Result};
use interop_runtime::exports;
use interop_runtime::ffi::{Arg, ExternType, FfiSignature, NativeSymbol, Value};
use interop_runtime::BridgeError;
use serde_json::json;

/// List or call the managed exports
///
/// With `loaded`, a call goes through the compiled exports library resolved
/// by name, instead of the entry points registered in this process.
pub fn run(settings: &Settings, json: bool, call: Option<&[String]>, loaded: bool) -> Result<()> {
    exports::startup();
    let registered = interop_exports::register_all().context("Failed to register managed exports")?;
    tracing::debug!(registered, "managed exports ready");

    let result = match call {
        Some([name, args @ ..]) => call_export(settings, name, args, loaded),
        Some([]) => Err(anyhow!("--call requires an export name")),
        None => list(json),
    };

    exports::shutdown();
    result
}

fn list(json: bool) -> Result<()> {
    let entries: Vec<(FfiSignature, usize)> = exports::with_exports(|registry| {
        registry
            .iter()
            .map(|export| (export.signature().clone(), export.entry_point() as usize))
            .collect()
    })?;

    if json {
        let output: Vec<_> = entries
            .iter()
            .map(|(signature, address)| {
                json!({
                    "name": signature.name,
                    "params": signature.params.iter().map(ExternType::display_name).collect::<Vec<_>>(),
                    "returns": signature.ret.display_name(),
                    "convention": signature.convention.display_name(),
                    "failure_code": signature.failure_code,
                    "address": format!("{:#x}", address),
                })
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&output)?);
    } else {
        for (signature, address) in &entries {
            println!("{:#018x}  {}", address, signature);
        }
    }
    Ok(())
}

fn call_export(settings: &Settings, name: &str, raw_args: &[String], loaded: bool) -> Result<()> {
    let signature =
        exports::with_exports(|registry| registry.lookup(name).map(|e| e.signature().clone()))??;
    if raw_args.len() != signature.params.len() {
        return Err(BridgeError::ArityMismatch {
            expected: signature.params.len(),
            got: raw_args.len(),
        }
        .into());
    }

    let args = signature
        .params
        .iter()
        .zip(raw_args)
        .map(|(ty, raw)| parse_scalar(*ty, raw).map(Arg::Value))
        .collect::<Result<Vec<_>>>()?;

    let result = if loaded {
        call_loaded(settings, signature, args)?
    } else {
        // Safety: registered exports are described by their own signatures
        unsafe { exports::invoke_export(name, args) }?
    };
    println!("{}", result);
    Ok(())
}

fn call_loaded(settings: &Settings, signature: FfiSignature, args: Vec<Arg<'_>>) -> Result<Value> {
    let symbol = NativeSymbol::new(
        settings.config.exports_library(),
        signature.name.clone(),
        signature.convention,
    );
    let func = settings
        .resolver()
        .resolve_function(&symbol, signature)
        .with_context(|| format!("Failed to bind {}", symbol))?;

    // Safety: the compiled library exports the same functions the table describes
    Ok(unsafe { func.call(args) }?)
}
