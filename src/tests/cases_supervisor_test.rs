//! End-to-end tests for the probe loop: real server, real loopback probes.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::config::{OnFailed, ProbeParams};
use crate::http::client::create_client;
use crate::supervisor::{Escalation, HttpProber, Supervisor};
use crate::tests::support;

fn fast_params(start_period: Duration, retries: u32) -> ProbeParams {
    ProbeParams {
        interval: Duration::from_millis(50),
        timeout: Duration::from_millis(20),
        start_period,
        retries,
        path: "/".to_string(),
        on_failed: OnFailed::Observe,
    }
}

fn spawn_supervisor(
    port: u16,
    params: ProbeParams,
) -> (
    Arc<Supervisor>,
    mpsc::Receiver<Escalation>,
    CancellationToken,
) {
    let prober = Arc::new(
        HttpProber::new(create_client(), port, &params.path, params.timeout).unwrap(),
    );
    let (tx, rx) = mpsc::channel(4);
    let supervisor = Arc::new(Supervisor::new(params, prober, tx));

    let token = CancellationToken::new();
    let run_supervisor = supervisor.clone();
    let run_token = token.clone();
    tokio::spawn(async move {
        run_supervisor.run(run_token).await;
    });

    (supervisor, rx, token)
}

#[tokio::test]
async fn test_healthy_service_never_escalates() {
    let port = support::free_port().await;
    let service_token = support::spawn_service(port).await;

    let (supervisor, mut rx, token) =
        spawn_supervisor(port, fast_params(Duration::ZERO, 3));

    let escalation = tokio::time::timeout(Duration::from_millis(500), rx.recv()).await;
    assert!(escalation.is_err(), "healthy service must not escalate");
    assert!(!supervisor.is_failed().await);

    token.cancel();
    service_token.cancel();
}

#[tokio::test]
async fn test_dead_service_escalates_after_retries() {
    let port = support::free_port().await;
    let service_token = support::spawn_service(port).await;

    let (supervisor, mut rx, token) =
        spawn_supervisor(port, fast_params(Duration::ZERO, 3));

    // Let a healthy probe or two land first.
    tokio::time::sleep(Duration::from_millis(150)).await;

    service_token.cancel();
    support::wait_until_stopped(port).await;

    let escalation = tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("escalation must arrive")
        .expect("channel open");
    assert_eq!(escalation.consecutive_failures, 3);
    assert!(supervisor.is_failed().await);

    // One escalation per failure episode, even as failures keep coming.
    let second = tokio::time::timeout(Duration::from_millis(500), rx.recv()).await;
    assert!(second.is_err(), "episode must escalate exactly once");

    token.cancel();
}

#[tokio::test]
async fn test_failures_inside_grace_window_do_not_escalate() {
    // Nothing listening at all: every probe fails from the start.
    let port = support::free_port().await;

    let params = ProbeParams {
        interval: Duration::from_millis(100),
        timeout: Duration::from_millis(30),
        start_period: Duration::from_secs(1),
        retries: 2,
        path: "/".to_string(),
        on_failed: OnFailed::Observe,
    };
    let (supervisor, mut rx, token) = spawn_supervisor(port, params);

    // Inside the grace window the counter must stay untouched.
    let early = tokio::time::timeout(Duration::from_millis(600), rx.recv()).await;
    assert!(early.is_err(), "grace window failures must not escalate");
    assert!(!supervisor.is_failed().await);

    // After the window elapses the same failures count and escalate.
    let escalation = tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("escalation must arrive after the grace window")
        .expect("channel open");
    assert_eq!(escalation.consecutive_failures, 2);

    token.cancel();
}

#[tokio::test]
async fn test_restart_reset_opens_new_episode() {
    let port = support::free_port().await;
    let service_token = support::spawn_service(port).await;

    let (supervisor, mut rx, token) =
        spawn_supervisor(port, fast_params(Duration::ZERO, 3));

    service_token.cancel();
    support::wait_until_stopped(port).await;

    tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("escalation must arrive")
        .expect("channel open");
    assert!(supervisor.is_failed().await);

    // Relaunch the service and re-arm the observer, as the restart policy does.
    let service_token = support::spawn_service(port).await;
    supervisor.mark_restarted().await;
    assert!(!supervisor.is_failed().await);

    // Healthy again: no further escalations.
    let after = tokio::time::timeout(Duration::from_millis(500), rx.recv()).await;
    assert!(after.is_err(), "recovered service must not escalate");
    assert!(!supervisor.is_failed().await);

    token.cancel();
    service_token.cancel();
}

#[tokio::test]
async fn test_recovery_before_threshold_never_escalates() {
    let port = support::free_port().await;
    let service_token = support::spawn_service(port).await;

    // retries=10: allow the service a dip of up to nine failed probes.
    let (supervisor, mut rx, token) =
        spawn_supervisor(port, fast_params(Duration::ZERO, 10));

    tokio::time::sleep(Duration::from_millis(120)).await;

    // Dip: roughly one probe interval of downtime, then back up.
    service_token.cancel();
    support::wait_until_stopped(port).await;
    let service_token = support::spawn_service(port).await;

    let escalation = tokio::time::timeout(Duration::from_millis(700), rx.recv()).await;
    assert!(
        escalation.is_err(),
        "short dip below the retries threshold must not escalate"
    );
    assert!(!supervisor.is_failed().await);

    token.cancel();
    service_token.cancel();
}
