//! Synthetic requests for exercising a router in tests.
//!
//! Requests are sent through the router as a tower service, so no socket is
//! opened. Handler panics that the router does not recover (UI routes)
//! propagate to the caller.

use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use thiserror::Error;
use tower::ServiceExt;

/// Failure to issue a synthetic request or read its response.
#[derive(Debug, Error)]
pub enum TestingError {
    #[error("failed to build request: {0}")]
    Request(#[from] axum::http::Error),

    #[error("failed to read response body: {0}")]
    Body(#[from] axum::Error),

    #[error("response body is not UTF-8: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),
}

/// Send a request to `relative_path` (no leading slash needed) and return
/// the status and body text.
///
/// An empty `body` sends no body.
pub async fn do_request(
    router: &axum::Router,
    method: Method,
    relative_path: &str,
    body: &str,
) -> Result<(StatusCode, String), TestingError> {
    do_request_with_headers(router, method, relative_path, &[], body).await
}

/// Like [`do_request`], with extra request headers.
pub async fn do_request_with_headers(
    router: &axum::Router,
    method: Method,
    relative_path: &str,
    headers: &[(&str, &str)],
    body: &str,
) -> Result<(StatusCode, String), TestingError> {
    let uri = format!("/{}", relative_path.trim_start_matches('/'));
    let mut builder = Request::builder().method(method).uri(uri);
    for (name, value) in headers {
        builder = builder.header(*name, *value);
    }
    let body = if body.is_empty() {
        Body::empty()
    } else {
        Body::from(body.to_string())
    };
    let request = builder.body(body)?;

    let response = match router.clone().oneshot(request).await {
        Ok(response) => response,
        Err(never) => match never {},
    };
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await?;
    Ok((status, String::from_utf8(bytes.to_vec())?))
}
