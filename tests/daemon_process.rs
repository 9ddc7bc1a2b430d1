//! End-to-end checks against the `rpc-daemon` binary: real signals and
//! the real exit path.
#![cfg(unix)]

use std::net::{Ipv4Addr, SocketAddr, TcpListener, TcpStream};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread;
use std::time::{Duration, Instant};

fn spawn_daemon(port: u16, http_compat: bool) -> Child {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_rpc-daemon"));
    cmd.arg("daemon").arg("--port").arg(port.to_string());
    if http_compat {
        cmd.arg("--http");
    }
    cmd.env("RUST_LOG", "rpc_daemon=debug")
        .env("NO_COLOR", "1")
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .unwrap()
}

fn wait_for_exit(child: &mut Child, timeout: Duration) -> ExitStatus {
    let deadline = Instant::now() + timeout;
    loop {
        if let Some(status) = child.try_wait().unwrap() {
            return status;
        }
        if Instant::now() >= deadline {
            child.kill().ok();
            panic!("daemon did not exit within {timeout:?}");
        }
        thread::sleep(Duration::from_millis(20));
    }
}

fn wait_for_port(port: u16, timeout: Duration) {
    let addr = SocketAddr::from((Ipv4Addr::LOCALHOST, port));
    let deadline = Instant::now() + timeout;
    while TcpStream::connect(addr).is_err() {
        assert!(Instant::now() < deadline, "daemon never bound {addr}");
        thread::sleep(Duration::from_millis(20));
    }
}

fn send_signal(child: &Child, signal: &str) {
    let status = Command::new("kill")
        .arg(format!("-{signal}"))
        .arg(child.id().to_string())
        .status()
        .unwrap();
    assert!(status.success());
}

fn output_of(child: Child) -> String {
    let output = child.wait_with_output().unwrap();
    let mut text = String::from_utf8_lossy(&output.stdout).into_owned();
    text.push_str(&String::from_utf8_lossy(&output.stderr));
    text
}

#[test]
fn occupied_compat_port_exits_with_failure() {
    let _squatter = TcpListener::bind((Ipv4Addr::LOCALHOST, 38532)).unwrap();

    let mut child = spawn_daemon(38531, true);
    let status = wait_for_exit(&mut child, Duration::from_secs(10));

    assert_eq!(status.code(), Some(1));
    let logs = output_of(child);
    assert!(logs.contains("failed to bind HTTP compatibility listener"), "{logs}");
}

#[test]
fn repeated_sigterm_cleans_up_once_and_exits_cleanly() {
    let mut child = spawn_daemon(38541, false);
    wait_for_port(38541, Duration::from_secs(10));

    send_signal(&child, "TERM");
    send_signal(&child, "TERM");
    let status = wait_for_exit(&mut child, Duration::from_secs(10));

    assert!(status.success(), "exit status {status:?}");
    let logs = output_of(child);
    assert_eq!(logs.matches("Shutdown token fired").count(), 1, "{logs}");
    assert_eq!(logs.matches("cleaning up").count(), 1, "{logs}");
    assert!(logs.contains("signal:terminate"), "{logs}");
}

#[test]
fn sigint_with_compat_listener_exits_cleanly() {
    let mut child = spawn_daemon(38551, true);
    wait_for_port(38551, Duration::from_secs(10));
    wait_for_port(38552, Duration::from_secs(10));

    send_signal(&child, "INT");
    let status = wait_for_exit(&mut child, Duration::from_secs(10));

    assert!(status.success(), "exit status {status:?}");
    assert!(output_of(child).contains("signal:interrupt"));
}
