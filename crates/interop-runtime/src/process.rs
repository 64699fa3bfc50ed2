//! Process bridge - launch a native executable and wait for it
//!
//! The coarse, out-of-process form of invocation: no shared address space,
//! the exit code is the only structured result. The child inherits the
//! parent's standard streams so its console interaction proceeds on its own.
//!
//! A nonzero exit is a successful launch with abnormal termination and is
//! reported as `ProcessOutcome::AbnormalExit`, not as an error.

use crate::error::{BridgeError, BridgeResult};
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::time::{Duration, Instant};
use tracing::{info, warn};

/// Poll interval for `wait_timeout`
const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Lifecycle of a launched process
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessState {
    /// Not yet launched
    Created,
    /// Launched and not yet reaped
    Running { pid: u32 },
    /// Reaped; `code` is `None` when a signal ended the process
    Exited { code: Option<i32> },
}

/// How a waited-on process ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessOutcome {
    /// Exit code 0
    Success,
    /// Nonzero exit code
    AbnormalExit(i32),
    /// Ended by a signal, without an exit code
    Terminated,
}

impl ProcessOutcome {
    fn from_status(status: ExitStatus) -> Self {
        match status.code() {
            Some(0) => ProcessOutcome::Success,
            Some(code) => ProcessOutcome::AbnormalExit(code),
            None => ProcessOutcome::Terminated,
        }
    }

    /// Exit code, if the process produced one
    pub fn code(&self) -> Option<i32> {
        match self {
            ProcessOutcome::Success => Some(0),
            ProcessOutcome::AbnormalExit(code) => Some(*code),
            ProcessOutcome::Terminated => None,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, ProcessOutcome::Success)
    }
}

/// A native executable launched by the bridge
///
/// Owns the child exclusively. Dropping a handle whose child is still
/// running abandons the child; it is neither killed nor reaped.
#[derive(Debug)]
pub struct NativeProcessHandle {
    path: PathBuf,
    args: Vec<OsString>,
    child: Option<Child>,
    state: ProcessState,
}

impl NativeProcessHandle {
    /// Describe a launch of the executable at `path`
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            args: Vec::new(),
            child: None,
            state: ProcessState::Created,
        }
    }

    /// Add arguments passed to the child
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Start the child with inherited standard streams
    ///
    /// A missing or non-executable path fails immediately with `LaunchFailed`.
    pub fn launch(&mut self) -> BridgeResult<u32> {
        if self.state != ProcessState::Created {
            return Err(BridgeError::InvalidProcessState(format!(
                "cannot launch from state {:?}",
                self.state
            )));
        }

        let child = Command::new(&self.path)
            .args(&self.args)
            .stdin(Stdio::inherit())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .spawn()
            .map_err(|source| BridgeError::LaunchFailed {
                path: self.path.clone(),
                source,
            })?;

        let pid = child.id();
        info!(path = %self.path.display(), pid, "launched native process");

        self.child = Some(child);
        self.state = ProcessState::Running { pid };
        Ok(pid)
    }

    /// Block until the child exits
    pub fn wait(&mut self) -> BridgeResult<ProcessOutcome> {
        let (pid, child) = self.running_child()?;
        let status = child
            .wait()
            .map_err(|source| BridgeError::WaitFailed { pid, source })?;
        Ok(self.record_exit(pid, status))
    }

    /// Block until the child exits or `timeout` elapses
    ///
    /// On expiry the child is killed and reaped before `WaitTimedOut` is
    /// returned, so it is never left running unobserved.
    pub fn wait_timeout(&mut self, timeout: Duration) -> BridgeResult<ProcessOutcome> {
        let (pid, child) = self.running_child()?;
        let deadline = Instant::now() + timeout;

        loop {
            match child.try_wait() {
                Ok(Some(status)) => return Ok(self.record_exit(pid, status)),
                Ok(None) if Instant::now() < deadline => std::thread::sleep(POLL_INTERVAL),
                Ok(None) => break,
                Err(source) => return Err(BridgeError::WaitFailed { pid, source }),
            }
        }

        warn!(pid, ?timeout, "native process timed out; terminating");

        // kill() fails only if the child already exited; wait() reaps either way
        let _ = child.kill();
        let status = child
            .wait()
            .map_err(|source| BridgeError::WaitFailed { pid, source })?;
        self.record_exit(pid, status);

        Err(BridgeError::WaitTimedOut { pid, timeout })
    }

    fn running_child(&mut self) -> BridgeResult<(u32, &mut Child)> {
        match (self.state, self.child.as_mut()) {
            (ProcessState::Running { pid }, Some(child)) => Ok((pid, child)),
            (state, _) => Err(BridgeError::InvalidProcessState(format!(
                "cannot wait in state {:?}",
                state
            ))),
        }
    }

    fn record_exit(&mut self, pid: u32, status: ExitStatus) -> ProcessOutcome {
        let outcome = ProcessOutcome::from_status(status);
        self.child = None;
        self.state = ProcessState::Exited {
            code: status.code(),
        };

        match outcome {
            ProcessOutcome::Success => info!(pid, "native process exited"),
            other => warn!(pid, outcome = ?other, "native process exited abnormally"),
        }
        outcome
    }

    /// Executable path
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Process id while running
    pub fn pid(&self) -> Option<u32> {
        match self.state {
            ProcessState::Running { pid } => Some(pid),
            _ => None,
        }
    }

    pub fn state(&self) -> ProcessState {
        self.state
    }
}

/// Launch an executable and block until it exits
pub fn run_to_completion<I, S>(path: impl Into<PathBuf>, args: I) -> BridgeResult<ProcessOutcome>
where
    I: IntoIterator<Item = S>,
    S: Into<OsString>,
{
    let mut handle = NativeProcessHandle::new(path).args(args);
    handle.launch()?;
    handle.wait()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_handle_is_created() {
        let handle = NativeProcessHandle::new("/bin/true");
        assert_eq!(handle.state(), ProcessState::Created);
        assert_eq!(handle.pid(), None);
    }

    #[test]
    fn test_wait_before_launch_rejected() {
        let mut handle = NativeProcessHandle::new("/bin/true");
        assert!(matches!(
            handle.wait(),
            Err(BridgeError::InvalidProcessState(_))
        ));
    }

    #[test]
    fn test_launch_missing_path() {
        let mut handle = NativeProcessHandle::new("/definitely/not/here/probe");
        let err = handle.launch().unwrap_err();
        assert!(matches!(err, BridgeError::LaunchFailed { .. }));
        assert!(err.is_call_not_made());
        assert_eq!(handle.state(), ProcessState::Created);
    }

    #[test]
    fn test_outcome_codes() {
        assert_eq!(ProcessOutcome::Success.code(), Some(0));
        assert_eq!(ProcessOutcome::AbnormalExit(3).code(), Some(3));
        assert_eq!(ProcessOutcome::Terminated.code(), None);
        assert!(!ProcessOutcome::AbnormalExit(3).is_success());
    }

    #[cfg(unix)]
    #[test]
    fn test_relaunch_rejected() {
        let mut handle = NativeProcessHandle::new("/bin/sh").args(["-c", "exit 0"]);
        handle.launch().unwrap();
        assert!(handle.wait().unwrap().is_success());
        assert!(matches!(
            handle.launch(),
            Err(BridgeError::InvalidProcessState(_))
        ));
    }
}
