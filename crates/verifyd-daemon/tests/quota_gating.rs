use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;

use tempfile::TempDir;

use verifyd_core::certificate::CertificateId;
use verifyd_daemon::config::DaemonConfig;
use verifyd_daemon::engine::CertifyEngine;
use verifyd_daemon::oracle::{FixedScorer, OracleError, StampingOracle};
use verifyd_daemon::server::{self, AppState, IDENTITY_HEADER};
use verifyd_daemon::telemetry::Telemetry;

struct CopyStamper;

impl StampingOracle for CopyStamper {
    fn stamp(
        &self,
        source: &Path,
        _certificate_id: &CertificateId,
        output: &Path,
    ) -> Result<(), OracleError> {
        std::fs::copy(source, output)?;
        Ok(())
    }
}

async fn start_server(data_dir: &Path, free_upload_limit: u64) -> SocketAddr {
    let cfg = DaemonConfig {
        free_upload_limit,
        ..DaemonConfig::default()
    };
    let engine = CertifyEngine::with_oracles(
        data_dir,
        cfg,
        Arc::new(FixedScorer::new(95)),
        Arc::new(CopyStamper),
        Telemetry::new(),
    )
    .expect("engine");
    let state = AppState {
        engine: Arc::new(engine),
    };
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind");
    let addr = listener.local_addr().expect("addr");
    tokio::spawn(async move {
        server::serve(listener, state, std::future::pending())
            .await
            .expect("server run");
    });
    addr
}

async fn submit(client: &reqwest::Client, addr: SocketAddr, identity: &str) -> reqwest::Response {
    client
        .post(format!("http://{addr}/v1/submit?filename=clip.mp4"))
        .header(IDENTITY_HEADER, identity)
        .body(b"video bytes".to_vec())
        .send()
        .await
        .expect("submit")
}

#[tokio::test]
async fn free_limit_exhaustion_denies_without_charging() {
    let tmp = TempDir::new().expect("tmp");
    let addr = start_server(tmp.path(), 2).await;
    let client = reqwest::Client::new();

    for expected_used in 1..=2u64 {
        let resp = submit(&client, addr, "a@x.com").await;
        assert_eq!(resp.status(), reqwest::StatusCode::OK);
        let body: serde_json::Value = resp.json().await.expect("json");
        assert_eq!(body["uploads_used"], expected_used);
        assert_eq!(body["free_remaining"], 2 - expected_used);
    }

    let denied = submit(&client, addr, "a@x.com").await;
    assert_eq!(denied.status(), reqwest::StatusCode::TOO_MANY_REQUESTS);
    let body: serde_json::Value = denied.json().await.expect("json");
    assert_eq!(body["error"], "QUOTA_EXCEEDED");

    // The denial itself consumed nothing: after subscribing, the counter
    // resumes from where it stopped.
    let subscribe = client
        .post(format!("http://{addr}/v1/subscribe"))
        .json(&serde_json::json!({ "identity": "a@x.com" }))
        .send()
        .await
        .expect("subscribe");
    assert_eq!(subscribe.status(), reqwest::StatusCode::OK);

    let resumed = submit(&client, addr, "a@x.com").await;
    assert_eq!(resumed.status(), reqwest::StatusCode::OK);
    let body: serde_json::Value = resumed.json().await.expect("json");
    assert_eq!(body["uploads_used"], 3);
}

#[tokio::test]
async fn quotas_are_tracked_per_identity() {
    let tmp = TempDir::new().expect("tmp");
    let addr = start_server(tmp.path(), 1).await;
    let client = reqwest::Client::new();

    assert_eq!(
        submit(&client, addr, "a@x.com").await.status(),
        reqwest::StatusCode::OK
    );
    assert_eq!(
        submit(&client, addr, "a@x.com").await.status(),
        reqwest::StatusCode::TOO_MANY_REQUESTS
    );
    assert_eq!(
        submit(&client, addr, "b@x.com").await.status(),
        reqwest::StatusCode::OK
    );
}

#[tokio::test]
async fn anonymous_submissions_bypass_quota_entirely() {
    let tmp = TempDir::new().expect("tmp");
    let addr = start_server(tmp.path(), 1).await;
    let client = reqwest::Client::new();

    for _ in 0..3 {
        let resp = client
            .post(format!("http://{addr}/v1/submit?filename=clip.mp4"))
            .body(b"video bytes".to_vec())
            .send()
            .await
            .expect("submit");
        assert_eq!(resp.status(), reqwest::StatusCode::OK);
        let body: serde_json::Value = resp.json().await.expect("json");
        assert!(body.get("uploads_used").is_none());
    }
}

#[tokio::test]
async fn subscribe_rejects_an_empty_identity() {
    let tmp = TempDir::new().expect("tmp");
    let addr = start_server(tmp.path(), 1).await;
    let client = reqwest::Client::new();

    let resp = client
        .post(format!("http://{addr}/v1/subscribe"))
        .json(&serde_json::json!({ "identity": "  " }))
        .send()
        .await
        .expect("subscribe");
    assert_eq!(resp.status(), reqwest::StatusCode::BAD_REQUEST);
}
