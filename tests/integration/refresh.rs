//! Integration tests of the refresh cycle against the simulated instrument.

use core::time::Duration;

use reqwest::{Client, StatusCode};
use tokio::time;

use crate::common::{fire_shot, poll_json, sim_control, start_pair, wait_for_status};

#[tokio::test]
async fn new_shot_is_cached_downsampled() {
    let (proxy_port, sim_port, _proxy, _sim) = start_pair(&[], "").await;
    let client = Client::new();

    // first observation is only a baseline
    wait_for_status(&client, proxy_port, |s| s["last_shot_id"] == 1).await;
    let resp = client
        .get(format!("http://127.0.0.1:{proxy_port}/api/channels/chany0/data"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);

    let shot = fire_shot(&client, sim_port).await;
    let data = poll_json(
        &client,
        &format!("http://127.0.0.1:{proxy_port}/api/channels/chany0/data"),
        10,
        |d| d["shot_id"] == shot,
    )
    .await;
    assert_eq!(
        data["values"],
        serde_json::json!([2000.5, 2002.5, 2004.5, 2006.5])
    );
    assert_eq!(data["average"], 2);
    assert_eq!(data["quality"], "valid");

    let companion: serde_json::Value = client
        .get(format!("http://127.0.0.1:{proxy_port}/api/channels/chanx0/data"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(companion["values"], serde_json::json!([0.5, 2.5, 4.5, 6.5]));
    assert_eq!(companion["cycle"], data["cycle"]);

    // disabled channels are never fetched
    let resp = client
        .get(format!("http://127.0.0.1:{proxy_port}/api/channels/chany1/data"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn upstream_acquisition_reports_busy_until_shot_completes() {
    let (proxy_port, sim_port, _proxy, _sim) = start_pair(&[], "prime_on_start = true").await;
    let client = Client::new();
    let data_url = format!("http://127.0.0.1:{proxy_port}/api/channels/chany2/data");

    poll_json(&client, &data_url, 10, |d| d["shot_id"] == 1).await;
    // give elapsed time to grow so the restart is a visible regression
    wait_for_status(&client, proxy_port, |s| {
        s["last_elapsed"].as_f64().is_some_and(|e| e > 0.3)
    })
    .await;

    sim_control(&client, sim_port, "arm").await;
    wait_for_status(&client, proxy_port, |s| {
        s["upstream_refresh_in_progress"] == true
    })
    .await;

    let resp = client.get(&data_url).send().await.unwrap();
    assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(resp.headers()["retry-after"], "1");
    // properties stay available
    let resp = client
        .get(format!("http://127.0.0.1:{proxy_port}/api/channels/chany2/properties"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let shot = fire_shot(&client, sim_port).await;
    poll_json(&client, &data_url, 10, |d| d["shot_id"] == shot).await;
    let status = wait_for_status(&client, proxy_port, |_| true).await;
    assert_eq!(status["upstream_refresh_in_progress"], false);
}

#[tokio::test]
async fn failed_refresh_keeps_last_good_data() {
    let (proxy_port, sim_port, _proxy, _sim) = start_pair(&[], "prime_on_start = true").await;
    let client = Client::new();
    let data_url = format!("http://127.0.0.1:{proxy_port}/api/channels/chany0/data");

    poll_json(&client, &data_url, 10, |d| d["shot_id"] == 1).await;

    sim_control(&client, sim_port, "fail").await;
    fire_shot(&client, sim_port).await;
    let status = wait_for_status(&client, proxy_port, |s| s["state"] == "FAULT").await;
    assert_eq!(status["last_shot_id"], 1);
    assert_eq!(status["refresh_in_progress"], false);

    let data: serde_json::Value = client
        .get(&data_url)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(data["shot_id"], 1, "previous cycle must stay intact");

    sim_control(&client, sim_port, "fail").await;
    poll_json(&client, &data_url, 10, |d| d["shot_id"] == 2).await;
    wait_for_status(&client, proxy_port, |s| s["state"] == "RUNNING").await;
}

#[tokio::test]
async fn paired_channels_always_share_a_cycle() {
    let (proxy_port, _sim_port, _proxy, _sim) =
        start_pair(&["--shot-period-ms", "40"], "prime_on_start = true").await;
    let client = Client::new();
    let pair_url = format!("http://127.0.0.1:{proxy_port}/api/channels/chany0/pair");

    poll_json(&client, &pair_url, 10, |_| true).await;

    let readers = (0..4).map(|_| {
        let client = client.clone();
        let pair_url = pair_url.clone();
        async move {
            let mut cycles = Vec::new();
            for _ in 0..50 {
                let resp = client.get(&pair_url).send().await.unwrap();
                if resp.status() == StatusCode::OK {
                    let pair: serde_json::Value = resp.json().await.unwrap();
                    assert_eq!(pair["primary"]["cycle"], pair["companion"]["cycle"]);
                    assert_eq!(pair["primary"]["shot_id"], pair["companion"]["shot_id"]);
                    cycles.push(pair["primary"]["cycle"].as_u64().unwrap());
                }
                time::sleep(Duration::from_millis(5)).await;
            }
            cycles
        }
    });
    let observed: Vec<u64> = futures::future::join_all(readers)
        .await
        .into_iter()
        .flatten()
        .collect();
    assert!(!observed.is_empty(), "no reader ever saw data");
}
