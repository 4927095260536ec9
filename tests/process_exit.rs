//! Runs the harness binary as a child process, so exit codes and teardown
//! output are observed the way a service manager sees them.

#![cfg(unix)]

use std::io::Read;
use std::process::{Command, Stdio};
use std::time::{Duration, Instant};

/// Generous; every scenario finishes in well under a second.
const CHILD_TIMEOUT: Duration = Duration::from_secs(30);

/// Run one harness scenario; returns the exit code and stdout.
fn run_harness(scenario: &str) -> (Option<i32>, String) {
    let bin = env!("CARGO_BIN_EXE_runlevel-harness");
    let mut child = Command::new(bin)
        .arg(scenario)
        .env("RUNLEVEL_SHUTDOWN_TIMEOUT_MS", "5000")
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .unwrap_or_else(|e| panic!("failed to spawn {bin}: {e}"));

    let begin = Instant::now();
    let status = loop {
        if let Some(status) = child.try_wait().unwrap() {
            break status;
        }
        if begin.elapsed() > CHILD_TIMEOUT {
            let _ = child.kill();
            panic!("harness scenario {scenario} did not exit within {CHILD_TIMEOUT:?}");
        }
        std::thread::sleep(Duration::from_millis(20));
    };

    let mut stdout = String::new();
    child
        .stdout
        .take()
        .unwrap()
        .read_to_string(&mut stdout)
        .unwrap();
    (status.code(), stdout)
}

fn assert_full_teardown(stdout: &str) {
    let steps: Vec<&str> = stdout
        .lines()
        .filter(|line| line.starts_with("teardown"))
        .collect();
    assert_eq!(
        steps,
        ["teardown shutting-down", "teardown terminated"],
        "stdout: {stdout}"
    );
    // The supervisor ends the process; main never gets to return on its own.
    assert!(!stdout.contains("main returning"), "stdout: {stdout}");
}

#[test]
fn supervised_task_error_exits_with_one_after_teardown() {
    let (code, stdout) = run_harness("task-error");
    assert_eq!(code, Some(1), "stdout: {stdout}");
    assert_full_teardown(&stdout);
}

#[test]
fn sigterm_exits_with_zero_after_teardown() {
    let (code, stdout) = run_harness("sigterm");
    assert_eq!(code, Some(0), "stdout: {stdout}");
    assert_full_teardown(&stdout);
}
