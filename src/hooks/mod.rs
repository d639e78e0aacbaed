//! Lifecycle hook subsystem.
//!
//! # Invocation Order
//! ```text
//! API request:  BeforeHandle → BeforeApiHandle → [handler] → AfterApiHandle → AfterHandle
//! UI request:   BeforeHandle → BeforeUiHandle  → [handler] → AfterUiHandle  → AfterHandle
//! ```
//!
//! # Design Decisions
//! - One hook set per router, shared by every in-flight request
//! - Hooks hold no per-request state; implementations synchronize their own state
//! - A failing hook is logged and ignored unless [`HookFailurePolicy::Abort`] is set
//! - After-hooks do not run when the API envelope recovers from a failure

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::dispatch::{HttpError, InboundRequest};

/// Callbacks run around every request the router dispatches.
///
/// Every method defaults to doing nothing.
pub trait LifecycleHooks: Send + Sync + 'static {
    fn before_handle(&self, _request: &InboundRequest) -> Result<(), HttpError> {
        Ok(())
    }

    fn after_handle(&self, _request: &InboundRequest) -> Result<(), HttpError> {
        Ok(())
    }

    fn before_api_handle(&self, _request: &InboundRequest) -> Result<(), HttpError> {
        Ok(())
    }

    fn after_api_handle(&self, _request: &InboundRequest) -> Result<(), HttpError> {
        Ok(())
    }

    fn before_ui_handle(&self, _request: &InboundRequest) -> Result<(), HttpError> {
        Ok(())
    }

    fn after_ui_handle(&self, _request: &InboundRequest) -> Result<(), HttpError> {
        Ok(())
    }
}

/// One of the six hook points.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HookPoint {
    BeforeHandle,
    AfterHandle,
    BeforeApiHandle,
    AfterApiHandle,
    BeforeUiHandle,
    AfterUiHandle,
}

impl HookPoint {
    /// Run this hook point on `hooks`.
    pub fn invoke(
        self,
        hooks: &dyn LifecycleHooks,
        request: &InboundRequest,
    ) -> Result<(), HttpError> {
        match self {
            HookPoint::BeforeHandle => hooks.before_handle(request),
            HookPoint::AfterHandle => hooks.after_handle(request),
            HookPoint::BeforeApiHandle => hooks.before_api_handle(request),
            HookPoint::AfterApiHandle => hooks.after_api_handle(request),
            HookPoint::BeforeUiHandle => hooks.before_ui_handle(request),
            HookPoint::AfterUiHandle => hooks.after_ui_handle(request),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            HookPoint::BeforeHandle => "BeforeHandle",
            HookPoint::AfterHandle => "AfterHandle",
            HookPoint::BeforeApiHandle => "BeforeApiHandle",
            HookPoint::AfterApiHandle => "AfterApiHandle",
            HookPoint::BeforeUiHandle => "BeforeUiHandle",
            HookPoint::AfterUiHandle => "AfterUiHandle",
        }
    }
}

impl fmt::Display for HookPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Hook points run before an API handler, in order.
pub const API_BEFORE: [HookPoint; 2] = [HookPoint::BeforeHandle, HookPoint::BeforeApiHandle];
/// Hook points run after an API handler, in order.
pub const API_AFTER: [HookPoint; 2] = [HookPoint::AfterApiHandle, HookPoint::AfterHandle];
/// Hook points run before a UI handler, in order.
pub const UI_BEFORE: [HookPoint; 2] = [HookPoint::BeforeHandle, HookPoint::BeforeUiHandle];
/// Hook points run after a UI handler, in order.
pub const UI_AFTER: [HookPoint; 2] = [HookPoint::AfterUiHandle, HookPoint::AfterHandle];

/// What happens when a hook returns an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HookFailurePolicy {
    /// Log the failure and continue dispatching.
    #[default]
    Log,
    /// Stop at the failing hook and respond with its classification.
    Abort,
}

/// Run a sequence of hook points under `policy`.
///
/// Returns the first failure only when the policy is `Abort`.
pub fn run_hooks(
    points: &[HookPoint],
    hooks: &dyn LifecycleHooks,
    request: &InboundRequest,
    policy: HookFailurePolicy,
) -> Result<(), (HookPoint, HttpError)> {
    for &point in points {
        if let Err(err) = point.invoke(hooks, request) {
            match policy {
                HookFailurePolicy::Log => {
                    tracing::warn!(
                        hook = %point,
                        method = %request.method(),
                        path = %request.path(),
                        error = %err,
                        "Lifecycle hook failed; continuing"
                    );
                }
                HookFailurePolicy::Abort => {
                    tracing::warn!(
                        hook = %point,
                        method = %request.method(),
                        path = %request.path(),
                        error = %err,
                        "Lifecycle hook failed; aborting request"
                    );
                    return Err((point, err));
                }
            }
        }
    }
    Ok(())
}

/// Hook set that does nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopHooks;

impl LifecycleHooks for NoopHooks {}

/// Hook set that logs every hook point at DEBUG.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingHooks;

impl TracingHooks {
    fn trace(point: HookPoint, request: &InboundRequest) -> Result<(), HttpError> {
        tracing::debug!(
            hook = %point,
            method = %request.method(),
            path = %request.path(),
            "Lifecycle hook"
        );
        Ok(())
    }
}

impl LifecycleHooks for TracingHooks {
    fn before_handle(&self, request: &InboundRequest) -> Result<(), HttpError> {
        Self::trace(HookPoint::BeforeHandle, request)
    }

    fn after_handle(&self, request: &InboundRequest) -> Result<(), HttpError> {
        Self::trace(HookPoint::AfterHandle, request)
    }

    fn before_api_handle(&self, request: &InboundRequest) -> Result<(), HttpError> {
        Self::trace(HookPoint::BeforeApiHandle, request)
    }

    fn after_api_handle(&self, request: &InboundRequest) -> Result<(), HttpError> {
        Self::trace(HookPoint::AfterApiHandle, request)
    }

    fn before_ui_handle(&self, request: &InboundRequest) -> Result<(), HttpError> {
        Self::trace(HookPoint::BeforeUiHandle, request)
    }

    fn after_ui_handle(&self, request: &InboundRequest) -> Result<(), HttpError> {
        Self::trace(HookPoint::AfterUiHandle, request)
    }
}
