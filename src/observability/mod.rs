//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! main.rs
//!     → logging::init_logging (global subscriber from config)
//!
//! LifecycleRouter
//!     → Logger (injected sink, defaults to the current subscriber)
//!     → envelopes log hook failures, recovered errors and per-request spans
//! ```

pub mod logging;

pub use logging::{init_logging, Logger};
