//! End-to-end tests for the service's liveness endpoint.

use crate::tests::support;

#[tokio::test]
async fn test_root_path_answers_success_when_serving() {
    let port = support::free_port().await;
    let token = support::spawn_service(port).await;

    let response = reqwest::get(format!("http://127.0.0.1:{}/", port))
        .await
        .unwrap();
    assert!(response.status().is_success());

    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["service"], "livewatch-test");
    assert!(body["timestamp"].is_string());

    token.cancel();
}

#[tokio::test]
async fn test_probing_has_no_side_effects_on_the_service() {
    let port = support::free_port().await;
    let token = support::spawn_service(port).await;
    let url = format!("http://127.0.0.1:{}/", port);

    // Repeating the probe changes nothing observable.
    for _ in 0..10 {
        let response = reqwest::get(&url).await.unwrap();
        assert!(response.status().is_success());
        let body: serde_json::Value = response.json().await.unwrap();
        assert_eq!(body["status"], "healthy");
    }

    token.cancel();
}

#[tokio::test]
async fn test_metrics_endpoint_renders_after_init() {
    support::init_metrics();

    let port = support::free_port().await;
    let token = support::spawn_service(port).await;

    let response = reqwest::get(format!("http://127.0.0.1:{}/metrics", port))
        .await
        .unwrap();
    assert!(response.status().is_success());

    token.cancel();
}

#[tokio::test]
async fn test_stopped_service_refuses_connections() {
    let port = support::free_port().await;
    let token = support::spawn_service(port).await;

    token.cancel();
    support::wait_until_stopped(port).await;

    assert!(reqwest::get(format!("http://127.0.0.1:{}/", port))
        .await
        .is_err());
}
