use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;

use sha2::{Digest, Sha256};
use tempfile::TempDir;

use verifyd_core::certificate::CertificateId;
use verifyd_daemon::config::DaemonConfig;
use verifyd_daemon::engine::CertifyEngine;
use verifyd_daemon::oracle::{FixedScorer, OracleError, StampingOracle};
use verifyd_daemon::server::{self, AppState, IDENTITY_HEADER};
use verifyd_daemon::telemetry::Telemetry;

struct MarkerStamper;

impl StampingOracle for MarkerStamper {
    fn stamp(
        &self,
        source: &Path,
        certificate_id: &CertificateId,
        output: &Path,
    ) -> Result<(), OracleError> {
        let mut stamped = std::fs::read(source)?;
        stamped.extend_from_slice(b"|stamp:");
        stamped.extend_from_slice(certificate_id.as_str().as_bytes());
        std::fs::write(output, stamped)?;
        Ok(())
    }
}

async fn start_server(data_dir: &Path, score: u8) -> SocketAddr {
    let engine = CertifyEngine::with_oracles(
        data_dir,
        DaemonConfig::default(),
        Arc::new(FixedScorer::new(score)),
        Arc::new(MarkerStamper),
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

fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

async fn submit(
    client: &reqwest::Client,
    addr: SocketAddr,
    identity: &str,
    filename: &str,
    body: &[u8],
) -> serde_json::Value {
    let resp = client
        .post(format!("http://{addr}/v1/submit?filename={filename}"))
        .header(IDENTITY_HEADER, identity)
        .body(body.to_vec())
        .send()
        .await
        .expect("submit");
    assert_eq!(resp.status(), reqwest::StatusCode::OK);
    resp.json().await.expect("submit json")
}

#[tokio::test]
async fn high_score_submission_certifies_verifies_and_downloads() {
    let tmp = TempDir::new().expect("tmp");
    let addr = start_server(tmp.path(), 95).await;
    let client = reqwest::Client::new();
    let raw = b"scenario a video bytes";

    let submitted = submit(&client, addr, "a@x.com", "clip.mp4", raw).await;
    assert_eq!(submitted["status"], "CERTIFIED");
    assert_eq!(submitted["score"], 95);
    assert_eq!(submitted["uploads_used"], 1);
    let id = submitted["certificate_id"].as_str().expect("id").to_string();
    assert!(submitted["download_url"]
        .as_str()
        .expect("download url")
        .ends_with(&format!("/v1/download/{id}")));

    let verified: serde_json::Value = client
        .get(format!("http://{addr}/v1/verify/{id}"))
        .send()
        .await
        .expect("verify")
        .json()
        .await
        .expect("verify json");
    assert_eq!(verified["status"], "CERTIFIED");
    assert_eq!(verified["score"], 95);
    assert_eq!(verified["fingerprint"], sha256_hex(raw));
    assert_eq!(verified["original_filename"], "clip.mp4");

    let download = client
        .get(format!("http://{addr}/v1/download/{id}"))
        .send()
        .await
        .expect("download");
    assert_eq!(download.status(), reqwest::StatusCode::OK);
    assert_eq!(
        download
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok()),
        Some("video/mp4")
    );
    let released = download.bytes().await.expect("download body");
    assert!(released.starts_with(raw));
    assert!(released.ends_with(format!("|stamp:{id}").as_bytes()));
}

#[tokio::test]
async fn low_score_submission_parks_then_approval_releases() {
    let tmp = TempDir::new().expect("tmp");
    let addr = start_server(tmp.path(), 40).await;
    let client = reqwest::Client::new();

    let submitted = submit(&client, addr, "b@x.com", "clip.mov", b"scenario b").await;
    assert_eq!(submitted["status"], "REVIEW");
    assert_eq!(submitted["score"], 40);
    assert!(submitted.get("download_url").is_none());
    let id = submitted["certificate_id"].as_str().expect("id").to_string();

    let blocked = client
        .get(format!("http://{addr}/v1/download/{id}"))
        .send()
        .await
        .expect("blocked download");
    assert_eq!(blocked.status(), reqwest::StatusCode::FORBIDDEN);
    let body: serde_json::Value = blocked.json().await.expect("blocked json");
    assert_eq!(body["error"], "NOT_CERTIFIED");

    let approved: serde_json::Value = client
        .post(format!("http://{addr}/v1/approve/{id}"))
        .send()
        .await
        .expect("approve")
        .json()
        .await
        .expect("approve json");
    assert_eq!(approved["status"], "CERTIFIED");

    // Second approval is a no-op, not an error.
    let again = client
        .post(format!("http://{addr}/v1/approve/{id}"))
        .send()
        .await
        .expect("approve again");
    assert_eq!(again.status(), reqwest::StatusCode::OK);

    let download = client
        .get(format!("http://{addr}/v1/download/{id}"))
        .send()
        .await
        .expect("download after approve");
    assert_eq!(download.status(), reqwest::StatusCode::OK);
}

#[tokio::test]
async fn unknown_and_malformed_ids_are_distinguished() {
    let tmp = TempDir::new().expect("tmp");
    let addr = start_server(tmp.path(), 95).await;
    let client = reqwest::Client::new();

    let unknown = hex::encode([0u8; 16]);
    for route in ["verify", "download"] {
        let resp = client
            .get(format!("http://{addr}/v1/{route}/{unknown}"))
            .send()
            .await
            .expect("unknown id");
        assert_eq!(resp.status(), reqwest::StatusCode::NOT_FOUND);
        let body: serde_json::Value = resp.json().await.expect("json");
        assert_eq!(body["error"], "NOT_FOUND");
    }

    let resp = client
        .get(format!("http://{addr}/v1/verify/not-a-cert-id"))
        .send()
        .await
        .expect("malformed id");
    assert_eq!(resp.status(), reqwest::StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn unsupported_upload_type_is_rejected() {
    let tmp = TempDir::new().expect("tmp");
    let addr = start_server(tmp.path(), 95).await;
    let client = reqwest::Client::new();

    let resp = client
        .post(format!("http://{addr}/v1/submit?filename=payload.exe"))
        .body(b"not a video".to_vec())
        .send()
        .await
        .expect("submit");
    assert_eq!(resp.status(), reqwest::StatusCode::BAD_REQUEST);
    let body: serde_json::Value = resp.json().await.expect("json");
    assert_eq!(body["error"], "INVALID_INPUT");
}

#[tokio::test]
async fn records_survive_a_daemon_restart() {
    let tmp = TempDir::new().expect("tmp");
    let client = reqwest::Client::new();

    let first = start_server(tmp.path(), 95).await;
    let submitted = submit(&client, first, "c@x.com", "clip.mp4", b"durable").await;
    let id = submitted["certificate_id"].as_str().expect("id").to_string();

    let second = start_server(tmp.path(), 95).await;
    let verified: serde_json::Value = client
        .get(format!("http://{second}/v1/verify/{id}"))
        .send()
        .await
        .expect("verify")
        .json()
        .await
        .expect("json");
    assert_eq!(verified["status"], "CERTIFIED");

    let download = client
        .get(format!("http://{second}/v1/download/{id}"))
        .send()
        .await
        .expect("download");
    assert_eq!(download.status(), reqwest::StatusCode::OK);
}
