use std::path::PathBuf;
use std::process::Command;
use std::time::{SystemTime, UNIX_EPOCH};

use serde_json::Value;

fn scratch_home() -> PathBuf {
    let nanos = SystemTime::now().duration_since(UNIX_EPOCH).unwrap().as_nanos();
    let mut dir = std::env::temp_dir();
    dir.push(format!("timeclock-cli-{}-{nanos}", std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();
    dir
}

fn timeclock(home: &PathBuf) -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_timeclock"));
    cmd.env("HOME", home)
        .env("XDG_DATA_HOME", home)
        .env("TIMECLOCK_LOG_JSON", "false")
        .env_remove("RUST_LOG");
    cmd
}

#[test]
fn denied_permission_check_exits_non_zero() {
    let home = scratch_home();

    let output = timeclock(&home).args(["can", "employee.read"]).output().unwrap();

    assert_eq!(output.status.code(), Some(1));
    let decision: Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(decision["granted"], Value::Bool(false));
    assert_eq!(decision["denial"], Value::String("no_session".into()));

    let _ = std::fs::remove_dir_all(&home);
}

#[test]
fn logout_without_session_succeeds() {
    let home = scratch_home();

    let status = timeclock(&home).arg("logout").status().unwrap();

    assert!(status.success());
    let _ = std::fs::remove_dir_all(&home);
}
