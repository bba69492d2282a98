//! Cross-process behaviour of the exclusivity lock.
//!
//! The test binary re-executes itself with `HATLINE_LOCK_CHILD_PATH` set, so
//! the child runs only `child_holds_lock`, which takes the lock and then
//! sleeps until it is killed.

use std::env;
use std::io::{BufRead, BufReader};
use std::path::Path;
use std::process::{Child, Command, Stdio};
use std::time::Duration;

use hatline_events::{Acquired, LockError, ProcessLock};
use tempfile::TempDir;

const CHILD_ENV: &str = "HATLINE_LOCK_CHILD_PATH";
const READY: &str = "LOCKED";

/// Entry point of the child process. A no-op in the normal test run.
#[test]
fn child_holds_lock() {
    let Ok(path) = env::var(CHILD_ENV) else {
        return;
    };

    let lock = ProcessLock::new(path);
    lock.acquire().unwrap();
    println!("{READY}");
    loop {
        std::thread::sleep(Duration::from_secs(60));
    }
}

fn spawn_holder(path: &Path) -> Child {
    let mut child = Command::new(env::current_exe().unwrap())
        .args(["--exact", "child_holds_lock", "--nocapture", "--test-threads=1"])
        .env(CHILD_ENV, path)
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .unwrap();

    let stdout = child.stdout.take().unwrap();
    let ready = BufReader::new(stdout)
        .lines()
        .map_while(Result::ok)
        .any(|line| line.contains(READY));
    assert!(ready, "child exited before taking the lock");
    child
}

#[test]
fn test_lock_held_by_other_process_is_refused() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("hatline.lock");
    let mut child = spawn_holder(&path);

    let lock = ProcessLock::new(&path);
    let result = lock.acquire();

    child.kill().unwrap();
    child.wait().unwrap();

    assert!(matches!(result, Err(LockError::HeldElsewhere { .. })));
}

#[test]
fn test_lock_recovers_after_holder_is_killed() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("hatline.lock");
    let mut child = spawn_holder(&path);

    // SIGKILL: the child never runs its own release.
    child.kill().unwrap();
    child.wait().unwrap();

    let lock = ProcessLock::new(&path);
    assert_eq!(lock.acquire().unwrap(), Acquired::Fresh);
}
