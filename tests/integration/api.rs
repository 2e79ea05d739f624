//! Integration tests of the query API surface.

use reqwest::{Client, StatusCode};

use crate::common::{poll_json, start_pair, wait_for_status};

#[tokio::test]
async fn rediscovery_returns_selection() {
    let (proxy_port, _sim_port, _proxy, _sim) = start_pair(&[], "").await;
    let client = Client::new();
    wait_for_status(&client, proxy_port, |s| s["state"] == "RUNNING").await;

    let resp = client
        .post(format!("http://127.0.0.1:{proxy_port}/api/channels/discover"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let selection: Vec<String> = resp.json().await.unwrap();
    assert_eq!(selection, vec!["chany0", "chany2"]);
}

#[tokio::test]
async fn properties_and_info_are_served_as_text() {
    let (proxy_port, _sim_port, _proxy, _sim) = start_pair(&[], "prime_on_start = true").await;
    let client = Client::new();
    let base = format!("http://127.0.0.1:{proxy_port}/api/channels");
    poll_json(&client, &format!("{base}/chany0/data"), 10, |_| true).await;

    // properties are known for every remote attribute, selected or not
    let props = client
        .get(format!("{base}/chany1/properties"))
        .send()
        .await
        .unwrap();
    assert_eq!(props.status(), StatusCode::OK);
    let first = props.text().await.unwrap();
    let props: serde_json::Value = serde_json::from_str(&first).unwrap();
    assert_eq!(props["save_data"][0], "false");
    let second = client
        .get(format!("{base}/chany1/properties"))
        .send()
        .await
        .unwrap()
        .text()
        .await
        .unwrap();
    assert_eq!(first, second);

    let info = client
        .get(format!("{base}/chanx0/info"))
        .send()
        .await
        .unwrap()
        .text()
        .await
        .unwrap();
    let info: serde_json::Value = serde_json::from_str(&info).unwrap();
    assert_eq!(info["label"], "Time 0");

    let resp = client
        .get(format!("{base}/chany1/info"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn scalars_are_forwarded() {
    let (proxy_port, _sim_port, _proxy, _sim) = start_pair(&[], "").await;
    let client = Client::new();
    let shot = poll_json(
        &client,
        &format!("http://127.0.0.1:{proxy_port}/api/shot_id"),
        10,
        serde_json::Value::is_number,
    )
    .await;
    assert_eq!(shot, 1);
    let elapsed = poll_json(
        &client,
        &format!("http://127.0.0.1:{proxy_port}/api/elapsed"),
        10,
        serde_json::Value::is_number,
    )
    .await;
    assert!(elapsed.as_f64().unwrap() >= 0.0, "elapsed is negative");
}
