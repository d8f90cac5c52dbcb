//! Metadata and token handlers.

use axum::extract::State;
use axum::http::{HeaderMap, Uri};
use axum::response::Response;
use imds_core::routes::{category_path, decoded_path};
use imds_core::token::{TOKEN_TTL_HEADER, issue_token};
use imds_state::resolve;
use tracing::debug;

use crate::ImdsState;
use crate::pages;

/// GET /latest/meta-data[/{*category}]
///
/// Resolves the decoded request path against the current document snapshot.
pub async fn get_metadata(State(state): State<ImdsState>, uri: Uri) -> Response {
    let path = decoded_path(uri.path());
    let Some(category) = category_path(&path) else {
        return pages::not_found();
    };

    match resolve(&state.store.snapshot(), category).into_body() {
        Some(body) => pages::plain_text(state.format.apply(body)),
        None => pages::not_found(),
    }
}

/// PUT /latest/api/token
pub async fn put_token(headers: HeaderMap) -> Response {
    let ttl = headers
        .get(TOKEN_TTL_HEADER)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.parse::<i64>().ok());

    let Some(ttl) = ttl else {
        debug!("token request without a numeric ttl");
        return pages::bad_request();
    };

    match issue_token(ttl) {
        Ok(token) => pages::plain_text(token),
        Err(e) => {
            debug!(error = %e, "token request rejected");
            pages::bad_request()
        }
    }
}
