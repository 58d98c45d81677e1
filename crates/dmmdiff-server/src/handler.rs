use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Json, Response};
use serde_json::json;
use tracing::{info, warn};

use crate::router::AppState;
use crate::signature::{verify_signature, SIGNATURE_256_HEADER, SIGNATURE_HEADER};
use crate::webhook::{accept_event, Rejection};

/// Health check handler.
pub async fn health_handler(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(json!({
        "status": "ok",
        "name": state.config.name,
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// Pull-request webhook. Accepted events start a job in the background and
/// are answered immediately.
pub async fn webhook_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<&'static str, Rejection> {
    if !state.config.webhook_secret.is_empty() {
        if let Err(e) = verify_signature(
            state.config.webhook_secret.as_bytes(),
            header_str(&headers, SIGNATURE_256_HEADER),
            header_str(&headers, SIGNATURE_HEADER),
            &body,
        ) {
            warn!(error = %e, "rejecting webhook delivery");
            return Err(Rejection::InvalidSignature);
        }
    }

    let request = accept_event(&state.config, &body)?;
    info!(
        repo = %request.full_name,
        pull_request = request.pull_request_id,
        head = %request.head_sha,
        "accepted pull request event"
    );

    let job = state.job.clone();
    tokio::spawn(async move {
        let unique_id = request.unique_id();
        if let Err(e) = job.run(request).await {
            warn!(%unique_id, error = %e, "diff job failed");
        }
    });
    Ok("ok")
}

fn header_str<'h>(headers: &'h HeaderMap, name: &str) -> Option<&'h str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

/// Serve a stored diff map as an attachment.
pub async fn dmm_handler(State(state): State<AppState>, Path(file_name): Path<String>) -> Response {
    if !state.config.host_dmms {
        return (StatusCode::NOT_FOUND, "diff hosting is disabled").into_response();
    }
    if state.config.use_gzip {
        warn!(file = %file_name, "serving gzip-compressed diff; viewers may not open it directly");
    }

    let Some(path) = state.job.store().resolve(&file_name) else {
        return (StatusCode::NOT_FOUND, "not found").into_response();
    };
    match tokio::fs::read(&path).await {
        Ok(bytes) => (
            [
                (header::CONTENT_TYPE, "application/octet-stream".to_string()),
                (
                    header::CONTENT_DISPOSITION,
                    format!("attachment; filename=\"{file_name}\""),
                ),
            ],
            bytes,
        )
            .into_response(),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            (StatusCode::NOT_FOUND, "not found").into_response()
        }
        Err(e) => {
            warn!(path = %path.display(), error = %e, "cannot read stored diff");
            (StatusCode::INTERNAL_SERVER_ERROR, "cannot read diff").into_response()
        }
    }
}
