//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Registration (at startup):
//!     add_api_handler / add_ui_handler
//!     → wrap handler in ApiEnvelope / UiEnvelope
//!     → MethodFilter from the allowed methods
//!     → axum::Router::route(pattern, method router)
//!
//! Request:
//!     axum matches path and method
//!     → envelope.handle(request)
//! ```
//!
//! # Design Decisions
//! - Path and method matching belong to axum
//! - Registrations are immutable once made
//! - Empty method list = no method restriction

pub mod router;

pub use router::{HandlerKind, LifecycleRouter, Registration, RegistrationError};
