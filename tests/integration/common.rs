//! Common utilities for integration tests.
//!
//! Spawns the simulated instrument and the proxy in-process, hands out ports,
//! and polls the HTTP surface until a condition holds.

use core::{
    sync::atomic::{AtomicU16, Ordering},
    time::Duration,
};
use std::{env, fs, time::Instant};

use clap::Parser as _;
use reqwest::Client;
use serde_json::Value;
use tokio::{net::TcpStream, task, time};

use adcproxy_server::cli::Cli as ProxyCli;
use adcproxy_sim::Cli as SimCli;

pub(crate) const DEVICE: &str = "binp/nbi/adc0";

static NEXT_PORT: AtomicU16 = AtomicU16::new(21000);

pub(crate) fn get_free_port() -> u16 {
    NEXT_PORT.fetch_add(1, Ordering::SeqCst)
}

/// Guard that aborts an in-process server when dropped.
pub(crate) struct KillOnDrop(task::JoinHandle<()>);

impl Drop for KillOnDrop {
    fn drop(&mut self) {
        self.0.abort();
    }
}

fn quiet_logs() {
    // SAFETY: This is only used in integration tests and no user-facing code. It just tells the servers to log less verbose output.
    unsafe {
        env::set_var("ADCPROXY_INTEGRATION_TEST", "1");
    }
}

/// Spawn the simulated instrument on `port` with extra CLI arguments.
pub(crate) fn spawn_sim(port: u16, extra_args: &[&str]) -> KillOnDrop {
    let port_arg = port.to_string();
    let mut args = vec![
        "instrument_sim",
        "serve",
        "--port",
        &port_arg,
        "--device",
        DEVICE,
        "--channels",
        "4",
        "--samples",
        "8",
    ];
    args.extend_from_slice(extra_args);
    let cli = SimCli::parse_from(args);
    let handle = tokio::spawn(async move {
        quiet_logs();
        adcproxy_sim::inner_main(cli)
            .await
            .expect("simulator failed");
    });
    KillOnDrop(handle)
}

/// Spawn the proxy on `port`, reading from the simulator on `sim_port`.
///
/// `extra_config` is appended to the `[refresh]` section.
pub(crate) fn spawn_proxy(port: u16, sim_port: u16, extra_config: &str) -> KillOnDrop {
    let config = format!(
        r#"
        [server]
        port = {port}
        bind = "127.0.0.1"

        [source]
        device = "{DEVICE}"
        gateway = "http://127.0.0.1:{sim_port}"
        timeout_ms = 1000

        [refresh]
        tick_interval_ms = 50
        {extra_config}
        "#
    );
    let tmp = env::temp_dir().join(format!("adcproxy_integration_{port}.toml"));
    fs::write(&tmp, config).expect("failed to write config");

    let cli = ProxyCli::parse_from(["adcproxy", "serve", "--config", tmp.to_str().unwrap()]);
    let handle = tokio::spawn(async move {
        quiet_logs();
        adcproxy_server::inner_main(cli)
            .await
            .expect("inner_main failed");
    });
    KillOnDrop(handle)
}

/// Block until a TCP listener is accepting on `127.0.0.1:port` or timeout.
pub(crate) async fn wait_for_listening(port: u16, timeout_secs: u64) {
    let start = Instant::now();
    while TcpStream::connect(("127.0.0.1", port)).await.is_err() {
        assert!(
            start.elapsed() <= Duration::from_secs(timeout_secs),
            "server did not start within timeout"
        );
        time::sleep(Duration::from_millis(50)).await;
    }
}

/// Simulator on a fresh port plus a proxy in front of it, both listening.
pub(crate) async fn start_pair(
    sim_args: &[&str],
    extra_config: &str,
) -> (u16, u16, KillOnDrop, KillOnDrop) {
    let sim_port = get_free_port();
    let proxy_port = get_free_port();
    let sim = spawn_sim(sim_port, sim_args);
    wait_for_listening(sim_port, 5).await;
    let proxy = spawn_proxy(proxy_port, sim_port, extra_config);
    wait_for_listening(proxy_port, 10).await;
    (proxy_port, sim_port, proxy, sim)
}

/// GET `url` until the JSON body satisfies `pred`, returning that body.
pub(crate) async fn poll_json(
    client: &Client,
    url: &str,
    timeout_secs: u64,
    pred: impl Fn(&Value) -> bool,
) -> Value {
    let start = Instant::now();
    loop {
        if let Ok(resp) = client.get(url).send().await
            && resp.status().is_success()
            && let Ok(json) = resp.json::<Value>().await
            && pred(&json)
        {
            return json;
        }
        assert!(
            start.elapsed() <= Duration::from_secs(timeout_secs),
            "condition on {url} not met within timeout"
        );
        time::sleep(Duration::from_millis(50)).await;
    }
}

/// Status of the proxy once it satisfies `pred`.
pub(crate) async fn wait_for_status(
    client: &Client,
    proxy_port: u16,
    pred: impl Fn(&Value) -> bool,
) -> Value {
    poll_json(
        client,
        &format!("http://127.0.0.1:{proxy_port}/api/status"),
        10,
        pred,
    )
    .await
}

/// Fire a shot on the simulator and return the new shot id.
pub(crate) async fn fire_shot(client: &Client, sim_port: u16) -> i64 {
    client
        .post(format!("http://127.0.0.1:{sim_port}/control/shot"))
        .send()
        .await
        .unwrap()
        .json::<i64>()
        .await
        .unwrap()
}

/// POST to a simulator control endpoint, ignoring the body.
pub(crate) async fn sim_control(client: &Client, sim_port: u16, action: &str) {
    let resp = client
        .post(format!("http://127.0.0.1:{sim_port}/control/{action}"))
        .send()
        .await
        .unwrap();
    assert!(resp.status().is_success(), "control/{action} failed");
}
