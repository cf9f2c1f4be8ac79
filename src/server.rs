//! HTTP collaborator: multipart upload in, artifact out.
//!
//! | Route | Behaviour |
//! |-------|-----------|
//! | `POST /convert` | fields `file` (the upload) and `target`; responds with the artifact as an attachment |
//! | `OPTIONS /convert` | `200`, for browser preflight |
//! | `GET /formats` | JSON list of supported `{source, target}` pairs |
//!
//! Rejected inputs answer `400`, engine failures `500`, both with a JSON
//! body `{ "error": <message>, "kind": <ErrorKind> }`. Uploads larger than
//! `max_upload_bytes` are refused before the engine runs.

use crate::error::ErrorKind;
use crate::output::ConversionOutcome;
use crate::Converter;
use axum::{
    body::Body,
    extract::{DefaultBodyLimit, Multipart, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// JSON error body.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub kind: String,
}

impl ErrorResponse {
    fn new(error: impl Into<String>, kind: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            kind: kind.into(),
        }
    }
}

#[derive(Debug, Serialize)]
struct FormatPair {
    source: String,
    target: String,
}

/// Build the router around a shared converter.
pub fn router(converter: Arc<Converter>) -> Router {
    // Multipart framing adds a little on top of the file itself.
    let limit = converter.config().max_upload_bytes.saturating_add(64 * 1024);
    Router::new()
        .route(
            "/convert",
            post(convert_upload).options(|| async { StatusCode::OK }),
        )
        .route("/formats", get(list_formats))
        .layer(DefaultBodyLimit::max(limit))
        .with_state(converter)
}

/// Bind `addr` and serve until the process exits.
pub async fn serve(converter: Arc<Converter>, addr: SocketAddr) -> std::io::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("Listening on http://{}", listener.local_addr()?);
    axum::serve(listener, router(converter)).await
}

async fn list_formats(State(converter): State<Arc<Converter>>) -> Json<Vec<FormatPair>> {
    Json(
        converter
            .registry()
            .supported_pairs()
            .iter()
            .map(|k| FormatPair {
                source: k.source.to_string(),
                target: k.target.to_string(),
            })
            .collect(),
    )
}

async fn convert_upload(
    State(converter): State<Arc<Converter>>,
    mut multipart: Multipart,
) -> Response {
    let mut upload: Option<(String, Vec<u8>)> = None;
    let mut target: Option<String> = None;

    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(e) => return multipart_error(e),
        };
        match field.name().unwrap_or("") {
            "file" => {
                let filename = field.file_name().unwrap_or("").to_string();
                match field.bytes().await {
                    Ok(data) => {
                        debug!("Received '{}' ({} bytes)", filename, data.len());
                        upload = Some((filename, data.to_vec()));
                    }
                    Err(e) => return multipart_error(e),
                }
            }
            "target" | "format" => match field.text().await {
                Ok(text) => target = Some(text),
                Err(e) => return multipart_error(e),
            },
            other => debug!("Ignoring multipart field '{}'", other),
        }
    }

    let Some((filename, bytes)) = upload else {
        return bad_request("Missing 'file' field");
    };
    let Some(target) = target else {
        return bad_request("Missing 'target' field");
    };
    if bytes.len() > converter.config().max_upload_bytes {
        return error_response(
            StatusCode::PAYLOAD_TOO_LARGE,
            ErrorResponse::new("Upload exceeds the size limit", "PayloadTooLarge"),
        );
    }

    outcome_response(converter.convert(&bytes, &filename, &target).await)
}

/// Map a conversion outcome onto an HTTP response.
pub fn outcome_response(outcome: ConversionOutcome) -> Response {
    match outcome {
        ConversionOutcome::Success(artifact) => {
            let disposition = format!("attachment; filename=\"{}\"", artifact.filename);
            (
                StatusCode::OK,
                [
                    (header::CONTENT_TYPE, artifact.content_type),
                    (header::CONTENT_DISPOSITION, disposition),
                ],
                Body::from(artifact.bytes),
            )
                .into_response()
        }
        unsupported @ ConversionOutcome::Unsupported { .. } => {
            let message = unsupported.to_string();
            error_response(
                StatusCode::BAD_REQUEST,
                ErrorResponse::new(message, ErrorKind::UnsupportedConversion.as_str()),
            )
        }
        ConversionOutcome::Failure { kind, message } => {
            let status = if kind.is_client_error() {
                StatusCode::BAD_REQUEST
            } else {
                StatusCode::INTERNAL_SERVER_ERROR
            };
            error_response(status, ErrorResponse::new(message, kind.as_str()))
        }
    }
}

fn error_response(status: StatusCode, body: ErrorResponse) -> Response {
    (status, Json(body)).into_response()
}

fn bad_request(message: &str) -> Response {
    error_response(StatusCode::BAD_REQUEST, ErrorResponse::new(message, "BadRequest"))
}

fn multipart_error(e: axum::extract::multipart::MultipartError) -> Response {
    warn!("Failed to read multipart upload: {}", e);
    let status = e.status();
    let kind = if status == StatusCode::PAYLOAD_TOO_LARGE {
        "PayloadTooLarge"
    } else {
        "BadRequest"
    };
    error_response(status, ErrorResponse::new(e.body_text(), kind))
}
