//! Uses the single integration test approach.
//!
//! This improves parallelism when running the tests, and reduces the number of binaries that have to be built (and linked)
#![expect(
    clippy::tests_outside_test_module,
    reason = "This is the integration test binary, so it's expected that tests are outside of a test module"
)]
#![expect(clippy::indexing_slicing, reason = "This is not problematic in tests")]
#![expect(clippy::unwrap_used, reason = "Using unwrap in tests is fine")]

extern crate alloc;
extern crate core;

mod api;
mod common;
mod refresh;

use reqwest::Client;

use common::{get_free_port, spawn_proxy, wait_for_listening, wait_for_status};

#[tokio::test]
async fn proxy_starts_faulted_and_recovers_when_device_appears() {
    let sim_port = get_free_port();
    let proxy_port = get_free_port();
    let _proxy = spawn_proxy(proxy_port, sim_port, "");
    wait_for_listening(proxy_port, 10).await;

    let client = Client::new();
    let status = wait_for_status(&client, proxy_port, |s| s["state"] == "FAULT").await;
    assert!(
        status["status"].as_str().unwrap().contains("failed to list remote attributes"),
        "unexpected status {status}"
    );

    let _sim = common::spawn_sim(sim_port, &[]);
    let status = wait_for_status(&client, proxy_port, |s| {
        s["state"] == "RUNNING" && s["last_shot_id"] == 1
    })
    .await;
    assert_eq!(status["device"], common::DEVICE);

    let channels: Vec<String> = client
        .get(format!("http://127.0.0.1:{proxy_port}/api/channels"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(channels, vec!["chany0", "chany2"]);
}
