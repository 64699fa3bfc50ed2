//! Process bridge tests

use interop_runtime::{run_to_completion, BridgeError, NativeProcessHandle, ProcessOutcome, ProcessState};
use pretty_assertions::assert_eq;
use std::time::{Duration, Instant};

#[test]
fn test_launch_nonexistent_path_fails_without_blocking() {
    let started = Instant::now();
    let err = run_to_completion("/no/such/dir/interop-probe", Vec::<String>::new()).unwrap_err();

    assert!(matches!(err, BridgeError::LaunchFailed { .. }));
    assert!(started.elapsed() < Duration::from_secs(5));
}

#[cfg(unix)]
mod unix {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    #[rstest]
    #[case("exit 0", ProcessOutcome::Success)]
    #[case("exit 3", ProcessOutcome::AbnormalExit(3))]
    #[case("exit 255", ProcessOutcome::AbnormalExit(255))]
    fn test_exit_code_reported(#[case] script: &str, #[case] expected: ProcessOutcome) {
        let outcome = run_to_completion("/bin/sh", ["-c", script]).unwrap();
        assert_eq!(outcome, expected);
    }

    #[test]
    fn test_wait_returns_after_child_exits() {
        let mut handle = NativeProcessHandle::new("/bin/sh").args(["-c", "sleep 0.2; exit 3"]);
        let pid = handle.launch().unwrap();
        assert_eq!(handle.state(), ProcessState::Running { pid });
        assert_eq!(handle.pid(), Some(pid));

        let started = Instant::now();
        let outcome = handle.wait().unwrap();

        assert!(started.elapsed() >= Duration::from_millis(100));
        assert_eq!(outcome.code(), Some(3));
        assert_eq!(handle.state(), ProcessState::Exited { code: Some(3) });
        assert_eq!(handle.pid(), None);
    }

    #[test]
    fn test_wait_timeout_kills_child() {
        let mut handle = NativeProcessHandle::new("/bin/sh").args(["-c", "sleep 30"]);
        let pid = handle.launch().unwrap();

        let started = Instant::now();
        let err = handle.wait_timeout(Duration::from_millis(100)).unwrap_err();

        assert!(started.elapsed() < Duration::from_secs(10));
        assert!(matches!(err, BridgeError::WaitTimedOut { pid: p, .. } if p == pid));
        assert!(!err.is_call_not_made());
        // Killed by signal and reaped
        assert_eq!(handle.state(), ProcessState::Exited { code: None });
    }

    #[test]
    fn test_wait_timeout_returns_exit_when_fast() {
        let mut handle = NativeProcessHandle::new("/bin/sh").args(["-c", "exit 4"]);
        handle.launch().unwrap();
        let outcome = handle.wait_timeout(Duration::from_secs(10)).unwrap();
        assert_eq!(outcome, ProcessOutcome::AbnormalExit(4));
    }

    #[test]
    fn test_non_executable_path_fails_to_launch() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("not-executable");
        std::fs::write(&path, "plain text").unwrap();

        let mut handle = NativeProcessHandle::new(&path);
        assert!(matches!(
            handle.launch(),
            Err(BridgeError::LaunchFailed { .. })
        ));
    }
}
