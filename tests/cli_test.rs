//! Startup behaviour of the exporter binary

use std::net::TcpListener;
use std::process::{Command, Output, Stdio};
use std::time::{Duration, Instant};

fn exporter() -> Command {
    let mut command = Command::new(env!("CARGO_BIN_EXE_teslafi-exporter"));
    command
        .env_remove("TESLAFI_API_TOKEN")
        .env_remove("TESLAFI_EXPORTER_TESLAFI__API_TOKEN")
        .env("RUST_LOG", "error")
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());
    command
}

/// Run the binary, killing it if it has not exited after a few seconds.
fn run_with_deadline(mut command: Command) -> Output {
    let mut child = command.spawn().unwrap();
    let deadline = Instant::now() + Duration::from_secs(10);

    while Instant::now() < deadline {
        if child.try_wait().unwrap().is_some() {
            return child.wait_with_output().unwrap();
        }
        std::thread::sleep(Duration::from_millis(50));
    }

    child.kill().ok();
    panic!("exporter did not exit");
}

fn free_port() -> u16 {
    TcpListener::bind("127.0.0.1:0")
        .unwrap()
        .local_addr()
        .unwrap()
        .port()
}

#[test]
fn test_missing_token_exits_before_binding() {
    let port = free_port();

    let mut command = exporter();
    command.args(["--port", &port.to_string()]);
    let output = run_with_deadline(command);

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("token is required"), "stderr: {}", stderr);

    // The port is still free, so nothing was bound.
    assert!(TcpListener::bind(("127.0.0.1", port)).is_ok());
}

#[test]
fn test_blank_token_is_rejected() {
    let mut command = exporter();
    command.args(["--teslafi_api_token", "  "]);
    let output = run_with_deadline(command);

    assert!(!output.status.success());
}

#[test]
fn test_port_in_use_exits_with_error() {
    let occupied = TcpListener::bind("0.0.0.0:0").unwrap();
    let port = occupied.local_addr().unwrap().port();

    let mut command = exporter();
    command.args(["--teslafi_api_token", "abc123", "--port", &port.to_string()]);
    let output = run_with_deadline(command);

    assert!(!output.status.success());
    drop(occupied);
}
