//! Device-key gate in front of the proxy routes.

use bread_proxy::security::{AccessKey, DeviceKeyStore};
use serde_json::Value;

mod common;

use common::{client, proxied, start_proxy, start_upstream, test_config, MockResponse};

fn store_with(device: &str, expires_at: Option<u64>) -> DeviceKeyStore {
    let store = DeviceKeyStore::new();
    store.insert(AccessKey {
        id: format!("key-{device}"),
        name: "integration".into(),
        key: "SECRET".into(),
        expires_at,
        expires_in_ms: None,
        bound_device_id: Some(device.into()),
        bound_at: None,
        created_at: None,
        hidden: false,
    });
    store
}

fn gated_config() -> bread_proxy::ProxyConfig {
    let mut config = test_config();
    config.access.enabled = true;
    config
}

async fn denial_reason(res: reqwest::Response) -> String {
    assert_eq!(res.status(), 403);
    let json: Value = res.json().await.unwrap();
    assert_eq!(json["ok"], false);
    json["reason"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn missing_device_id_is_refused() {
    let (upstream, recorded) = start_upstream(|_| MockResponse::new(200)).await;
    let (proxy, _shutdown) = start_proxy(gated_config(), store_with("dev-1", None)).await;

    let res = client()
        .get(proxied(proxy, &format!("http://{upstream}/")))
        .send()
        .await
        .unwrap();

    assert_eq!(denial_reason(res).await, "device_id_required");
    assert!(recorded.lock().unwrap().is_empty());
}

#[tokio::test]
async fn unbound_device_needs_a_key() {
    let (upstream, _) = start_upstream(|_| MockResponse::new(200)).await;
    let (proxy, _shutdown) = start_proxy(gated_config(), store_with("dev-1", None)).await;

    let res = client()
        .get(proxied(proxy, &format!("http://{upstream}/")))
        .header("X-Device-Id", "someone-else")
        .send()
        .await
        .unwrap();

    assert_eq!(denial_reason(res).await, "key_required");
}

#[tokio::test]
async fn expired_key_is_refused() {
    let (upstream, _) = start_upstream(|_| MockResponse::new(200)).await;
    let (proxy, _shutdown) = start_proxy(gated_config(), store_with("dev-1", Some(1))).await;

    let res = client()
        .get(proxied(proxy, &format!("http://{upstream}/")))
        .header("X-Device-Id", "dev-1")
        .send()
        .await
        .unwrap();

    assert_eq!(denial_reason(res).await, "key_required");
}

#[tokio::test]
async fn bound_device_passes_by_header_or_cookie() {
    let (upstream, recorded) = start_upstream(|_| MockResponse::new(200).body("through")).await;
    let (proxy, _shutdown) = start_proxy(gated_config(), store_with("dev-1", None)).await;
    let client = client();

    let res = client
        .get(proxied(proxy, &format!("http://{upstream}/a")))
        .header("X-Device-Id", "dev-1")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 200);
    assert_eq!(res.text().await.unwrap(), "through");

    let res = client
        .get(proxied(proxy, &format!("http://{upstream}/b")))
        .header("Cookie", "theme=dark; deviceId=dev-1")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 200);

    assert_eq!(recorded.lock().unwrap().len(), 2);
}

#[tokio::test]
async fn disabled_gate_passes_everything() {
    let (upstream, _) = start_upstream(|_| MockResponse::new(200)).await;
    let (proxy, _shutdown) = start_proxy(test_config(), DeviceKeyStore::new()).await;

    let res = client()
        .get(proxied(proxy, &format!("http://{upstream}/")))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 200);
}
