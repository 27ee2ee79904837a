//! HTTP surface of the certification service.
//!
//! Transport concerns only: body limits, JSON shapes, public error mapping.
//! Every decision about certificate state is delegated to the engine.

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{Path as AxumPath, Query, State};
use axum::http::header::{CONTENT_DISPOSITION, CONTENT_TYPE};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;

use verifyd_core::certificate::{Certificate, CertificateId};
use verifyd_core::error::{VerifydError, VerifydResult};

use crate::engine::CertifyEngine;
use crate::public_error::public_error;

pub const IDENTITY_HEADER: &str = "x-verifyd-identity";

#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<CertifyEngine>,
}

pub fn router(state: AppState) -> Router {
    let max_upload_bytes = state.engine.config().max_upload_bytes;
    Router::new()
        .route("/", get(live))
        .route("/v1/submit", post(submit))
        .route("/v1/verify/:id", get(verify))
        .route("/v1/download/:id", get(download))
        .route("/v1/approve/:id", post(approve))
        .route("/v1/subscribe", post(subscribe))
        .layer(RequestBodyLimitLayer::new(max_upload_bytes))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub async fn serve(
    listener: tokio::net::TcpListener,
    state: AppState,
    shutdown: impl std::future::Future<Output = ()> + Send + 'static,
) -> Result<(), std::io::Error> {
    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown)
        .await
}

#[derive(Debug, Deserialize)]
struct SubmitQuery {
    filename: String,
}

#[derive(Debug, Serialize)]
struct SubmitResponse {
    certificate_id: String,
    status: &'static str,
    score: u8,
    verify_url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    download_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    uploads_used: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    free_remaining: Option<u64>,
}

#[derive(Debug, Serialize)]
struct VerifyResponse {
    certificate_id: String,
    status: &'static str,
    score: u8,
    fingerprint: String,
    original_filename: String,
    created_at_unix: u64,
}

#[derive(Debug, Deserialize)]
struct SubscribeRequest {
    identity: String,
}

struct ApiError(VerifydError);

impl From<VerifydError> for ApiError {
    fn from(err: VerifydError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, message) = public_error(&self.0);
        if status.is_server_error() {
            tracing::error!(error = %self.0, "request failed");
        }
        (
            status,
            Json(json!({ "error": code.as_str(), "message": message })),
        )
            .into_response()
    }
}

async fn live() -> impl IntoResponse {
    Json(json!({ "status": "verifyd live" }))
}

async fn submit(
    State(state): State<AppState>,
    Query(query): Query<SubmitQuery>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<SubmitResponse>, ApiError> {
    let identity = caller_identity(&headers)?;
    let outcome = state
        .engine
        .submit(identity.as_deref(), &query.filename, body.to_vec())
        .await?;
    Ok(Json(submit_response(&state, &outcome)))
}

async fn verify(
    State(state): State<AppState>,
    AxumPath(id): AxumPath<String>,
) -> Result<Json<VerifyResponse>, ApiError> {
    let id = CertificateId::parse(&id)?;
    let certificate = state.engine.verify(&id)?;
    Ok(Json(VerifyResponse {
        certificate_id: certificate.id.to_string(),
        status: certificate.status.as_str(),
        score: certificate.score,
        fingerprint: certificate.fingerprint,
        original_filename: certificate.original_filename,
        created_at_unix: certificate.created_at_unix,
    }))
}

async fn download(
    State(state): State<AppState>,
    AxumPath(id): AxumPath<String>,
) -> Result<Response, ApiError> {
    let id = CertificateId::parse(&id)?;
    let (certificate, path) = state.engine.download(&id)?;
    let bytes = tokio::fs::read(&path)
        .await
        .map_err(|_| VerifydError::Internal("read certified artifact failed".to_string()))?;
    let disposition = format!("attachment; filename=\"{}.mp4\"", certificate.id);
    Ok((
        StatusCode::OK,
        [
            (CONTENT_TYPE, "video/mp4".to_string()),
            (CONTENT_DISPOSITION, disposition),
        ],
        bytes,
    )
        .into_response())
}

async fn approve(
    State(state): State<AppState>,
    AxumPath(id): AxumPath<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let id = CertificateId::parse(&id)?;
    let certificate = state.engine.approve(&id).await?;
    Ok(Json(json!({
        "certificate_id": certificate.id.to_string(),
        "status": certificate.status.as_str(),
    })))
}

async fn subscribe(
    State(state): State<AppState>,
    Json(request): Json<SubscribeRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    if request.identity.trim().is_empty() {
        return Err(ApiError(VerifydError::InvalidInput(
            "empty identity".to_string(),
        )));
    }
    state.engine.set_subscribed(&request.identity)?;
    Ok(Json(json!({
        "identity": request.identity,
        "subscribed": true,
    })))
}

fn caller_identity(headers: &HeaderMap) -> VerifydResult<Option<String>> {
    match headers.get(IDENTITY_HEADER) {
        None => Ok(None),
        Some(value) => {
            let raw = value
                .to_str()
                .map_err(|_| VerifydError::InvalidInput("malformed identity header".to_string()))?
                .trim();
            if raw.is_empty() {
                Ok(None)
            } else {
                Ok(Some(raw.to_string()))
            }
        }
    }
}

fn submit_response(state: &AppState, outcome: &crate::engine::SubmitOutcome) -> SubmitResponse {
    let certificate = &outcome.certificate;
    SubmitResponse {
        certificate_id: certificate.id.to_string(),
        status: certificate.status.as_str(),
        score: certificate.score,
        verify_url: service_url(state, "verify", certificate),
        download_url: certificate
            .stored_artifact_ref
            .as_ref()
            .map(|_| service_url(state, "download", certificate)),
        uploads_used: outcome.uploads_used,
        free_remaining: outcome.free_remaining,
    }
}

fn service_url(state: &AppState, operation: &str, certificate: &Certificate) -> String {
    let base = state
        .engine
        .config()
        .public_base_url
        .as_deref()
        .unwrap_or("");
    format!("{base}/v1/{operation}/{}", certificate.id)
}
