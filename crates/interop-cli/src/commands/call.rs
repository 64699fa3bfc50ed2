use super::{hex, parse_scalar};
use crate::config::Settings;
use anyhow::{bail, Context, Result};
use interop_config::ImportDecl;
use interop_runtime::ffi::{Arg, ExternType, FfiSignature, NativeSymbol, Value};
use interop_runtime::BridgeError;

/// Call an import declared in the project configuration
pub fn run(settings: &Settings, name: &str, raw_args: &[String]) -> Result<()> {
    let decl = settings
        .config
        .project
        .import(name)
        .with_context(|| format!("No import named '{}' is declared in interop.toml", name))?;

    let signature = signature_of(decl)?;
    if raw_args.len() != signature.params.len() {
        return Err(BridgeError::ArityMismatch {
            expected: signature.params.len(),
            got: raw_args.len(),
        }
        .into());
    }

    let symbol = NativeSymbol::new(&decl.library, decl.symbol(), signature.convention);
    let func = settings
        .resolver()
        .resolve_function(&symbol, signature.clone())
        .with_context(|| format!("Failed to bind import '{}'", name))?;

    // Buffer parameters take a length on the command line
    let mut buffers = Vec::new();
    for (ty, raw) in signature.params.iter().zip(raw_args) {
        if *ty == ExternType::Buffer {
            let len: usize = raw
                .parse()
                .with_context(|| format!("invalid buffer length '{}'", raw))?;
            buffers.push(vec![0u8; len]);
        }
    }

    let mut slots = buffers.iter_mut();
    let mut args = Vec::with_capacity(raw_args.len());
    for (ty, raw) in signature.params.iter().zip(raw_args) {
        let arg = match ty {
            ExternType::Buffer => match slots.next() {
                Some(buffer) => Arg::from(buffer.as_mut_slice()),
                None => bail!("buffer argument '{}' has no backing storage", raw),
            },
            scalar => Arg::Value(parse_scalar(*scalar, raw)?),
        };
        args.push(arg);
    }

    // Safety: the declaration in interop.toml is trusted to match the native definition
    let result = unsafe { func.call(args) }?;

    if result != Value::Void {
        println!("{}", result);
    }
    for buffer in &buffers {
        println!("{}", hex(buffer));
    }
    Ok(())
}

fn signature_of(decl: &ImportDecl) -> Result<FfiSignature> {
    FfiSignature::parse(&decl.name, decl.params.as_slice(), decl.returns(), decl.convention())
        .with_context(|| format!("Invalid declaration for import '{}'", decl.name))
}
