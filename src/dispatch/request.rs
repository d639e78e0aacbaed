//! Request and response types seen by handlers and hooks.

use axum::body::{Body, Bytes};
use axum::http::{
    header, request::Parts, Extensions, HeaderMap, HeaderName, HeaderValue, Method, Request,
    StatusCode, Uri,
};
use axum::response::Response;

/// An inbound request with its body fully buffered.
#[derive(Debug)]
pub struct InboundRequest {
    parts: Parts,
    body: Bytes,
}

impl InboundRequest {
    pub fn from_parts(parts: Parts, body: Bytes) -> Self {
        Self { parts, body }
    }

    /// Buffer the body of an axum request, up to `limit` bytes.
    pub async fn buffer(request: Request<Body>, limit: usize) -> Result<Self, axum::Error> {
        let (parts, body) = request.into_parts();
        let body = axum::body::to_bytes(body, limit).await?;
        Ok(Self { parts, body })
    }

    pub fn method(&self) -> &Method {
        &self.parts.method
    }

    pub fn uri(&self) -> &Uri {
        &self.parts.uri
    }

    pub fn path(&self) -> &str {
        self.parts.uri.path()
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.parts.headers
    }

    /// Value of a header, if present and visible ASCII.
    pub fn header(&self, name: impl header::AsHeaderName) -> Option<&str> {
        self.parts.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// The `Content-Type` header, or an empty string when absent or not
    /// visible ASCII. Use [`headers`](Self::headers) to tell the two apart.
    pub fn content_type(&self) -> &str {
        self.header(header::CONTENT_TYPE).unwrap_or("")
    }

    pub fn extensions(&self) -> &Extensions {
        &self.parts.extensions
    }

    /// Raw request body.
    pub fn body(&self) -> &Bytes {
        &self.body
    }
}

/// The response a handler is building.
///
/// Status defaults to 200. Writes append to the body buffer.
#[derive(Debug)]
pub struct ResponseSink {
    status: StatusCode,
    headers: HeaderMap,
    body: Vec<u8>,
}

impl ResponseSink {
    pub fn new() -> Self {
        Self {
            status: StatusCode::OK,
            headers: HeaderMap::new(),
            body: Vec::new(),
        }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn set_status(&mut self, status: StatusCode) {
        self.status = status;
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.headers
    }

    /// Set a header, replacing any previous value.
    pub fn insert_header(&mut self, name: HeaderName, value: HeaderValue) {
        self.headers.insert(name, value);
    }

    pub fn write(&mut self, bytes: &[u8]) {
        self.body.extend_from_slice(bytes);
    }

    pub fn write_str(&mut self, text: &str) {
        self.write(text.as_bytes());
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }

    pub fn into_response(self) -> Response {
        let mut response = Response::new(Body::from(self.body));
        *response.status_mut() = self.status;
        *response.headers_mut() = self.headers;
        response
    }
}

impl Default for ResponseSink {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Write for ResponseSink {
    fn write_str(&mut self, s: &str) -> std::fmt::Result {
        ResponseSink::write_str(self, s);
        Ok(())
    }
}
