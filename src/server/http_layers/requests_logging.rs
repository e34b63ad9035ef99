//! Request logging middleware

use super::super::state::ServerState;
use crate::server::metrics::{record_http_request, UNMATCHED_ROUTE};
use axum::{
    body::Body,
    extract::{MatchedPath, State},
    http::{
        header::{AUTHORIZATION, CONTENT_LENGTH},
        HeaderMap, Request, StatusCode,
    },
    middleware::Next,
    response::{IntoResponse, Response},
};
use serde_json::Value;
use std::time::Instant;
use tracing::{error, info};

#[derive(PartialEq, PartialOrd, Clone, Debug, Default, clap::ValueEnum)]
pub enum RequestsLoggingLevel {
    None,
    #[default]
    Path,
    Headers,
    Body,
}

impl std::fmt::Display for RequestsLoggingLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self)
    }
}

const MAX_LOGGABLE_BODY_LENGTH: usize = 1024;
const REDACTED: &str = "<redacted>";

fn declared_length(headers: &HeaderMap) -> Result<usize, &'static str> {
    headers
        .get(CONTENT_LENGTH)
        .ok_or("no Content-Length")?
        .to_str()
        .map_err(|_| "unreadable Content-Length")?
        .parse::<usize>()
        .map_err(|_| "non-numeric Content-Length")
}

fn log_headers(label: &str, headers: &HeaderMap) {
    info!("  {} headers:", label);
    for (name, value) in headers {
        if name == AUTHORIZATION {
            info!("    {}: {}", name, REDACTED);
        } else {
            info!("    {}: {:?}", name, value);
        }
    }
}

/// Blanks out credentials and tokens in a JSON body before it reaches the log.
fn redact_body(bytes: &[u8]) -> String {
    match serde_json::from_slice::<Value>(bytes) {
        Ok(mut json) => {
            redact_value(&mut json);
            json.to_string()
        }
        Err(_) => String::from_utf8_lossy(bytes).into_owned(),
    }
}

fn redact_value(value: &mut Value) {
    match value {
        Value::Object(map) => {
            for (key, field) in map.iter_mut() {
                if key == "password" || key == "token" {
                    *field = Value::String(REDACTED.to_string());
                } else {
                    redact_value(field);
                }
            }
        }
        Value::Array(items) => items.iter_mut().for_each(redact_value),
        _ => {}
    }
}

/// Logs a small body and hands back an equivalent one for the next stage.
/// Large or unsized bodies pass through unread.
async fn log_body(label: &str, headers: &HeaderMap, body: Body) -> Result<Body, axum::Error> {
    let length = match declared_length(headers) {
        Ok(length) => length,
        Err(reason) => {
            info!("  {} body: {}", label, reason);
            return Ok(body);
        }
    };
    if length >= MAX_LOGGABLE_BODY_LENGTH {
        info!(
            "  {} body: {:#}, not logged",
            label,
            byte_unit::Byte::from(length)
        );
        return Ok(body);
    }
    let bytes = axum::body::to_bytes(body, length).await?;
    info!("  {} body: {}", label, redact_body(&bytes));
    Ok(Body::from(bytes))
}

pub async fn log_requests(
    State(state): State<ServerState>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let level = state.config.requests_logging_level.clone();
    let started = Instant::now();
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let route = request
        .extensions()
        .get::<MatchedPath>()
        .map(|matched| matched.as_str().to_string())
        .unwrap_or_else(|| UNMATCHED_ROUTE.to_string());

    if level > RequestsLoggingLevel::None {
        info!(">>> {} {}", method, request.uri());
    }
    if level >= RequestsLoggingLevel::Headers {
        log_headers("Request", request.headers());
    }

    let request = if level >= RequestsLoggingLevel::Body {
        let (parts, body) = request.into_parts();
        match log_body("Request", &parts.headers, body).await {
            Ok(body) => Request::from_parts(parts, body),
            Err(err) => {
                error!("Failed to read request body of {} {}: {}", method, path, err);
                return StatusCode::BAD_REQUEST.into_response();
            }
        }
    } else {
        request
    };

    let response = next.run(request).await;

    if level >= RequestsLoggingLevel::Headers {
        log_headers("Response", response.headers());
    }

    let response = if level >= RequestsLoggingLevel::Body {
        let (parts, body) = response.into_parts();
        match log_body("Response", &parts.headers, body).await {
            Ok(body) => Response::from_parts(parts, body),
            Err(err) => {
                error!("Failed to read response body of {} {}: {}", method, path, err);
                return StatusCode::INTERNAL_SERVER_ERROR.into_response();
            }
        }
    } else {
        response
    };

    let status = response.status().as_u16();
    let elapsed = started.elapsed();
    if level > RequestsLoggingLevel::None {
        info!("<<< {} {} {} ({}ms)", status, method, path, elapsed.as_millis());
    }
    record_http_request(&method, &route, status, elapsed);

    response
}
