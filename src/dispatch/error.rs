//! Failure classification for the API envelope.
//!
//! # Responsibilities
//! - Describe what a failure tells the client (status code, message)
//! - Carry every way an API request can fail as a typed error
//! - Convert a failure into its classification at one boundary
//!
//! # Design Decisions
//! - Status and message are independent: a failure may carry either, both or neither
//! - Missing fields fall back to 500 and a generic message
//! - Internal details are logged, never written to the client
//! - One wrapping layer is looked through when classifying

use std::any::Any;
use std::fmt;

use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use thiserror::Error;

use crate::hooks::HookPoint;

/// Body written when a failure carries no user-facing message.
pub const GENERIC_ERROR_MESSAGE: &str = "There was a problem while handling the request.";

/// What a failure exposes to the client.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Classification {
    /// Nothing; the defaults apply.
    #[default]
    Plain,
    /// A status code only.
    Coded(StatusCode),
    /// A user-facing message only.
    Messaged(String),
    /// Both a status code and a user-facing message.
    CodedAndMessaged(StatusCode, String),
}

impl Classification {
    /// Status code to respond with (500 when none was attached).
    pub fn status(&self) -> StatusCode {
        match self {
            Classification::Coded(code) | Classification::CodedAndMessaged(code, _) => *code,
            Classification::Plain | Classification::Messaged(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Body text to respond with (the generic message when none was attached).
    pub fn message(&self) -> &str {
        match self {
            Classification::Messaged(msg) | Classification::CodedAndMessaged(_, msg) => msg,
            Classification::Plain | Classification::Coded(_) => GENERIC_ERROR_MESSAGE,
        }
    }

    fn with_status(self, code: StatusCode) -> Self {
        match self {
            Classification::Plain | Classification::Coded(_) => Classification::Coded(code),
            Classification::Messaged(msg) | Classification::CodedAndMessaged(_, msg) => {
                Classification::CodedAndMessaged(code, msg)
            }
        }
    }

    fn with_message(self, msg: String) -> Self {
        match self {
            Classification::Plain | Classification::Messaged(_) => Classification::Messaged(msg),
            Classification::Coded(code) | Classification::CodedAndMessaged(code, _) => {
                Classification::CodedAndMessaged(code, msg)
            }
        }
    }
}

/// Plain-text error response: classified status, message plus a newline.
impl IntoResponse for Classification {
    fn into_response(self) -> Response {
        let body = format!("{}\n", self.message());
        (
            self.status(),
            [(
                header::CONTENT_TYPE,
                HeaderValue::from_static("text/plain; charset=utf-8"),
            )],
            body,
        )
            .into_response()
    }
}

/// A failure raised by application code: handlers and lifecycle hooks.
///
/// The `detail` is for the logs. What the client sees is decided by the
/// [`Classification`], built up with [`with_status`](Self::with_status) and
/// [`with_message`](Self::with_message):
///
/// ```
/// use axum::http::StatusCode;
/// use lifecycle_router::dispatch::HttpError;
///
/// let err = HttpError::new("widget 7 is locked by another session")
///     .with_status(StatusCode::CONFLICT)
///     .with_message("The widget is being edited elsewhere.");
/// assert_eq!(err.classification().status(), StatusCode::CONFLICT);
/// ```
///
/// An `HttpError` may also be raised with [`std::panic::panic_any`]; the API
/// envelope recovers it with its classification intact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpError {
    detail: String,
    classification: Classification,
}

impl HttpError {
    /// Create an unclassified failure.
    pub fn new(detail: impl Into<String>) -> Self {
        Self {
            detail: detail.into(),
            classification: Classification::Plain,
        }
    }

    /// Attach the status code the client should receive.
    pub fn with_status(mut self, code: StatusCode) -> Self {
        self.classification = self.classification.with_status(code);
        self
    }

    /// Attach the message the client should receive.
    pub fn with_message(mut self, msg: impl Into<String>) -> Self {
        self.classification = self.classification.with_message(msg.into());
        self
    }

    pub fn detail(&self) -> &str {
        &self.detail
    }

    pub fn classification(&self) -> &Classification {
        &self.classification
    }
}

impl fmt::Display for HttpError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.detail)
    }
}

impl std::error::Error for HttpError {}

/// Errors that can end an API request.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// The request body could not be buffered.
    #[error("failed to read request body: {0}")]
    BodyRead(String),

    /// Body decoding was requested but the content type is not JSON.
    #[error("unsupported content type for JSON body: {0}")]
    UnsupportedContentType(String),

    /// The request body is not valid JSON.
    #[error("request body is not valid JSON: {0}")]
    MalformedBody(#[source] serde_json::Error),

    /// The request body is valid JSON but not an object.
    #[error("request body must be a JSON object")]
    BodyNotObject,

    /// The handler (or a panic payload) reported a failure.
    #[error("handler failed: {0}")]
    Handler(HttpError),

    /// A lifecycle hook failed while the abort policy is active.
    #[error("lifecycle hook {hook} failed: {source}")]
    Hook {
        hook: HookPoint,
        #[source]
        source: HttpError,
    },

    /// The handler output could not be encoded.
    #[error("failed to encode handler output: {0}")]
    Encode(#[source] serde_json::Error),

    /// The handler output did not encode to a JSON object.
    #[error("handler output must encode to a JSON object")]
    OutputNotObject,

    /// The request panicked with a payload that carries no classification.
    #[error("handler panicked: {0}")]
    Panicked(String),

    /// Context added on the way up.
    #[error("{context}: {source}")]
    Wrapped {
        context: String,
        #[source]
        source: Box<DispatchError>,
    },
}

impl DispatchError {
    /// Add a layer of context.
    pub fn wrap(self, context: impl Into<String>) -> Self {
        DispatchError::Wrapped {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// Classification of this failure.
    ///
    /// One `Wrapped` layer is looked through so the inner failure's
    /// classification wins over the wrapper's.
    pub fn classification(&self) -> Classification {
        let inner = match self {
            DispatchError::Wrapped { source, .. } => source.as_ref(),
            other => other,
        };
        match inner {
            DispatchError::Handler(err) | DispatchError::Hook { source: err, .. } => {
                err.classification().clone()
            }
            _ => Classification::Plain,
        }
    }

    /// Recover a failure from a panic payload.
    pub fn from_panic(payload: Box<dyn Any + Send>) -> Self {
        let payload = match payload.downcast::<HttpError>() {
            Ok(err) => return DispatchError::Handler(*err),
            Err(other) => other,
        };
        let payload = match payload.downcast::<DispatchError>() {
            Ok(err) => return *err,
            Err(other) => other,
        };
        if let Some(msg) = payload.downcast_ref::<&'static str>() {
            DispatchError::Panicked((*msg).to_string())
        } else if let Some(msg) = payload.downcast_ref::<String>() {
            DispatchError::Panicked(msg.clone())
        } else {
            DispatchError::Panicked("non-string panic payload".to_string())
        }
    }
}

impl From<HttpError> for DispatchError {
    fn from(err: HttpError) -> Self {
        DispatchError::Handler(err)
    }
}
