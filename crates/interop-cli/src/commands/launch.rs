use crate::config::Settings;
use anyhow::Result;
use interop_runtime::{NativeProcessHandle, ProcessOutcome};
use std::path::Path;
use std::process::ExitCode;
use std::time::Duration;

/// Launch `path` and wait, using the configured timeout unless one is given
///
/// The child's exit code becomes this command's exit status. A child ended by
/// a signal, or with a code outside `0..=255`, maps to a generic failure.
pub fn run(
    settings: &Settings,
    path: &Path,
    args: &[String],
    timeout_ms: Option<u64>,
) -> Result<ExitCode> {
    let timeout = timeout_ms
        .map(Duration::from_millis)
        .or_else(|| settings.config.process_timeout());
    let outcome = run_child(path, args, timeout)?;
    Ok(exit_status(outcome))
}

fn exit_status(outcome: ProcessOutcome) -> ExitCode {
    exit_byte(outcome).map_or(ExitCode::FAILURE, ExitCode::from)
}

fn exit_byte(outcome: ProcessOutcome) -> Option<u8> {
    outcome.code().and_then(|code| u8::try_from(code).ok())
}

/// Launch a native program sharing this terminal and report how it ended
pub fn run_child(path: &Path, args: &[String], timeout: Option<Duration>) -> Result<ProcessOutcome> {
    let mut handle = NativeProcessHandle::new(path).args(args);
    handle.launch()?;

    let outcome = match timeout {
        Some(limit) => handle.wait_timeout(limit)?,
        None => handle.wait()?,
    };

    match outcome {
        ProcessOutcome::Success => println!("{} exited successfully (exit code 0)", path.display()),
        ProcessOutcome::AbnormalExit(code) => {
            println!("{} exited abnormally (exit code {})", path.display(), code)
        }
        ProcessOutcome::Terminated => println!("{} was terminated by a signal", path.display()),
    }
    Ok(outcome)
}
