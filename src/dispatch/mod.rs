//! Dispatch envelope subsystem.
//!
//! # Data Flow
//! ```text
//! axum route match
//!     → request.rs (buffer body into InboundRequest)
//!     → api.rs / ui.rs (envelope, on the blocking pool)
//!         → hooks (before pair)
//!         → body.rs (decode JSON body, API only)
//!         → user handler
//!         → body.rs (encode JSON output, API only)
//!         → hooks (after pair)
//!     → Response
//!
//! On API failure:
//!     error.rs (DispatchError → Classification) → plain-text response
//! ```
//!
//! # Design Decisions
//! - Exactly one response per request: the normal one or the error one
//! - Only the API envelope recovers panics; UI handlers own their error pages
//! - Handlers are synchronous and run off the async reactor

pub mod api;
pub mod body;
pub mod error;
pub mod request;
pub mod ui;

pub use api::{ApiEnvelope, ApiHandler};
pub use error::{Classification, DispatchError, HttpError, GENERIC_ERROR_MESSAGE};
pub use request::{InboundRequest, ResponseSink};
pub use ui::{UiEnvelope, UiHandler};

/// A decoded JSON object; keys keep their original order.
pub type JsonObject = serde_json::Map<String, serde_json::Value>;
