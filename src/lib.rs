//! Lifecycle-hooked request dispatch on top of axum.
//!
//! Applications register two kinds of handlers:
//! - API handlers return data; the envelope encodes it as JSON and turns
//!   failures into classified plain-text error responses.
//! - UI handlers write their own content (e.g. HTML).
//!
//! Every request runs a fixed sequence of [`hooks::LifecycleHooks`] callbacks
//! around its handler.
//!
//! ```no_run
//! use axum::http::Method;
//! use lifecycle_router::dispatch::{HttpError, InboundRequest, JsonObject, ResponseSink};
//! use lifecycle_router::hooks::NoopHooks;
//! use lifecycle_router::LifecycleRouter;
//! use serde_json::json;
//!
//! let mut lr = LifecycleRouter::new(NoopHooks);
//! lr.add_api_handler(
//!     "/api/greet",
//!     &[Method::POST],
//!     true,
//!     |_: &mut ResponseSink, _: &InboundRequest, body: Option<&JsonObject>| {
//!         let name = body
//!             .and_then(|b| b.get("name"))
//!             .and_then(|v| v.as_str())
//!             .unwrap_or("stranger");
//!         Ok::<_, HttpError>(json!({ "greeting": format!("hello, {name}") }))
//!     },
//! )
//! .unwrap();
//! let app: axum::Router = lr.into_router();
//! ```

pub mod config;
pub mod dispatch;
pub mod hooks;
pub mod http;
pub mod observability;
pub mod routing;
pub mod testing;

pub use config::ServerConfig;
pub use dispatch::{HttpError, InboundRequest, JsonObject, ResponseSink};
pub use hooks::{HookFailurePolicy, LifecycleHooks};
pub use http::{HttpServer, Shutdown};
pub use routing::LifecycleRouter;
