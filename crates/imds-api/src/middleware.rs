//! Request middleware: logging, panic recovery, token gating and caching.

use std::any::Any;
use std::net::SocketAddr;
use std::panic::AssertUnwindSafe;
use std::time::Instant;

use axum::body::{Body, to_bytes};
use axum::extract::{ConnectInfo, Request, State};
use axum::http::{StatusCode, header};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use futures_util::FutureExt;
use imds_core::routes::decoded_path;
use imds_core::token::TOKEN_HEADER;
use tracing::{debug, error, info, warn};

use crate::ImdsState;
use crate::pages;

/// Log one event per request once the response is ready.
///
/// The level follows the status: `info` below 400, `warn` for client
/// errors, `error` for server errors.
pub async fn log_requests(request: Request, next: Next) -> Response {
    let start = Instant::now();
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let query = request.uri().query().unwrap_or_default().to_string();
    let user_agent = request
        .headers()
        .get(header::USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();
    let ip = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string())
        .unwrap_or_default();

    let response = next.run(request).await;
    let latency = start.elapsed();
    let status = response.status().as_u16();

    macro_rules! request_event {
        ($level:ident) => {
            $level!(
                %method,
                %path,
                %query,
                status,
                ?latency,
                %user_agent,
                %ip,
                "{} {}",
                method,
                path
            )
        };
    }

    match status {
        500.. => request_event!(error),
        400..=499 => request_event!(warn),
        _ => request_event!(info),
    }

    response
}

/// Convert a panic in request handling into a bare `500`.
pub async fn recover_panics(request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let query = request.uri().query().unwrap_or_default().to_string();

    match AssertUnwindSafe(next.run(request)).catch_unwind().await {
        Ok(response) => response,
        Err(panic) => {
            let message = panic_message(panic.as_ref());
            if is_broken_connection(&message) {
                // The peer is gone; hyper drops whatever we return.
                error!(%method, %path, %query, error = %message, "{} {}", method, path);
            } else {
                error!(%method, %path, %query, error = %message, "panic recovery");
            }
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

fn is_broken_connection(message: &str) -> bool {
    let message = message.to_lowercase();
    message.contains("broken pipe") || message.contains("connection reset by peer")
}

/// Reject requests whose session token the auth policy does not admit.
pub async fn require_token(
    State(state): State<ImdsState>,
    request: Request,
    next: Next,
) -> Response {
    // A header that is not valid ASCII is present but can never validate.
    let token = request
        .headers()
        .get(TOKEN_HEADER)
        .map(|v| v.to_str().unwrap_or_default());

    if state.auth.admits(token) {
        next.run(request).await
    } else {
        debug!(path = %request.uri().path(), "session token rejected");
        pages::unauthorized()
    }
}

/// Serve repeat requests from the response cache.
///
/// Only `200` bodies are stored, keyed by the decoded request path so
/// that escaped and unescaped spellings share an entry.
pub async fn response_cache(
    State(state): State<ImdsState>,
    request: Request,
    next: Next,
) -> Response {
    let key = decoded_path(request.uri().path()).into_owned();
    if let Some(body) = state.cache.get(&key) {
        return pages::plain_text(body);
    }

    let response = next.run(request).await;
    if response.status() != StatusCode::OK {
        return response;
    }

    let (parts, body) = response.into_parts();
    let bytes = match to_bytes(body, usize::MAX).await {
        Ok(bytes) => bytes,
        Err(e) => {
            warn!(path = %key, error = %e, "failed to buffer response body");
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };
    if let Ok(text) = std::str::from_utf8(&bytes) {
        state.cache.set(key, text);
    }
    Response::from_parts(parts, Body::from(bytes))
}
