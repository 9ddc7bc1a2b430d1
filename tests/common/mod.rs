//! Shared utilities for launcher integration tests.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use rpc_daemon::config::UserConfig;
use rpc_daemon::lifecycle::{
    fatal_channel, manual, CancellationSource, FatalEvents, LaunchConfig, Launcher, RunningService, SignalTrigger,
};
use rpc_daemon::rpc::{NoopTelemetry, RpcResponse};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio_util::sync::CancellationToken;

/// A launched daemon plus the test's handles on it.
#[allow(dead_code)]
pub struct Harness {
    pub service: RunningService,
    pub trigger: SignalTrigger,
    pub cleanups: Arc<AtomicUsize>,
    pub fatal: FatalEvents,
}

#[allow(dead_code)]
impl Harness {
    pub fn cleanup_count(&self) -> usize {
        self.cleanups.load(Ordering::SeqCst)
    }
}

/// Launch with a manual signal source and a counting cleanup action.
pub fn launch(port: u16, compat_mode: bool) -> Harness {
    launch_with_cleanup(port, compat_mode, || {})
}

pub fn launch_with_cleanup<F>(port: u16, compat_mode: bool, cleanup: F) -> Harness
where
    F: FnOnce() + Send + 'static,
{
    let (trigger, signals) = manual();
    let (reporter, fatal) = fatal_channel();
    let cleanups = Arc::new(AtomicUsize::new(0));

    let counter = cleanups.clone();
    let shutdown = CancellationSource::new(signals).arm(&CancellationToken::new(), move || {
        cleanup();
        counter.fetch_add(1, Ordering::SeqCst);
    });

    let service = Launcher::new(reporter).launch(
        LaunchConfig {
            port,
            compat_mode,
            user_config: Arc::new(UserConfig::default()),
            telemetry: Arc::new(NoopTelemetry),
        },
        &shutdown,
    );

    Harness {
        service,
        trigger,
        cleanups,
        fatal,
    }
}

/// Send one envelope over the native transport and read the reply.
#[allow(dead_code)]
pub async fn native_call(addr: SocketAddr, envelope: &str) -> RpcResponse {
    let mut stream = TcpStream::connect(addr).await.unwrap();
    stream.write_all(envelope.as_bytes()).await.unwrap();
    stream.write_all(b"\n").await.unwrap();

    let mut lines = BufReader::new(stream).lines();
    let line = lines.next_line().await.unwrap().expect("connection closed without reply");
    serde_json::from_str(&line).unwrap()
}

#[allow(dead_code)]
pub fn http_client() -> reqwest::Client {
    reqwest::Client::builder().no_proxy().build().unwrap()
}
