//! Health & readiness handlers.
//!
//! - GET /healthz  -> simple liveness ("ok")
//! - GET /readyz   -> readiness that checks bucket connectivity

use crate::services::filesystem::VirtualFilesystem;
use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use serde::Serialize;
use std::collections::HashMap;

/// `GET /healthz`
///
/// Very small liveness probe — always returns 200 OK with a plain JSON body.
/// This endpoint should be cheap and never perform I/O.
pub async fn healthz() -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(HealthResponse {
            status: "ok".into(),
        }),
    )
}

/// `GET /readyz`
///
/// Readiness probe that re-runs the gateway connectivity check, the same one
/// startup performs. All state lives in the remote bucket, so a reachable
/// bucket is the only thing readiness means here.
///
/// Returns JSON describing the check. HTTP 200 when it passes, HTTP 503 when
/// it fails.
pub async fn readyz(State(fs): State<VirtualFilesystem>) -> impl IntoResponse {
    let bucket_check = match fs.probe().await {
        Ok(()) => (true, None::<String>),
        Err(err) => (false, Some(err.to_string())),
    };

    let bucket_ok = bucket_check.0;
    let mut checks = HashMap::new();
    checks.insert(
        "bucket",
        CheckStatus {
            ok: bucket_ok,
            error: bucket_check.1,
        },
    );

    let body = ReadyResponse {
        status: if bucket_ok { "ok".into() } else { "error".into() },
        checks,
    };

    let status = if bucket_ok {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (status, Json(body))
}

#[derive(Serialize)]
struct HealthResponse {
    status: String,
}

#[derive(Serialize)]
struct ReadyResponse {
    status: String,
    checks: HashMap<&'static str, CheckStatus>,
}

#[derive(Serialize)]
struct CheckStatus {
    ok: bool,
    error: Option<String>,
}
