//! HTTP server subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (request ID, trace, timeout layers)
//!     → LifecycleRouter (axum route match → envelope)
//!     → Send to client
//!
//! Shutdown (shutdown.rs):
//!     Ctrl+C or trigger() → stop accepting → drain in-flight requests
//! ```

pub mod server;
pub mod shutdown;

pub use server::{HttpServer, X_REQUEST_ID};
pub use shutdown::Shutdown;
