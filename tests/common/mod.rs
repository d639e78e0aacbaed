//! Shared utilities for integration tests.

use std::sync::Mutex;

use lifecycle_router::dispatch::{HttpError, InboundRequest};
use lifecycle_router::hooks::{HookPoint, LifecycleHooks};

/// Hook set that records which hook points fired, in order.
#[derive(Default)]
pub struct RecordingHooks {
    seen: Mutex<Vec<HookPoint>>,
}

#[allow(dead_code)]
impl RecordingHooks {
    pub fn seen(&self) -> Vec<HookPoint> {
        self.seen.lock().unwrap().clone()
    }

    pub fn hit(&self, point: HookPoint) -> bool {
        self.seen.lock().unwrap().contains(&point)
    }

    fn record(&self, point: HookPoint) -> Result<(), HttpError> {
        self.seen.lock().unwrap().push(point);
        Ok(())
    }
}

impl LifecycleHooks for RecordingHooks {
    fn before_handle(&self, _: &InboundRequest) -> Result<(), HttpError> {
        self.record(HookPoint::BeforeHandle)
    }

    fn after_handle(&self, _: &InboundRequest) -> Result<(), HttpError> {
        self.record(HookPoint::AfterHandle)
    }

    fn before_api_handle(&self, _: &InboundRequest) -> Result<(), HttpError> {
        self.record(HookPoint::BeforeApiHandle)
    }

    fn after_api_handle(&self, _: &InboundRequest) -> Result<(), HttpError> {
        self.record(HookPoint::AfterApiHandle)
    }

    fn before_ui_handle(&self, _: &InboundRequest) -> Result<(), HttpError> {
        self.record(HookPoint::BeforeUiHandle)
    }

    fn after_ui_handle(&self, _: &InboundRequest) -> Result<(), HttpError> {
        self.record(HookPoint::AfterUiHandle)
    }
}

/// Hook set that rejects every request at BeforeHandle.
#[allow(dead_code)]
pub struct RejectingHooks;

impl LifecycleHooks for RejectingHooks {
    fn before_handle(&self, _: &InboundRequest) -> Result<(), HttpError> {
        Err(HttpError::new("no session cookie")
            .with_status(axum::http::StatusCode::UNAUTHORIZED)
            .with_message("Please sign in."))
    }
}

/// Hook set whose AfterHandle fails after the handler has already run.
#[allow(dead_code)]
pub struct AuditFailureHooks;

impl LifecycleHooks for AuditFailureHooks {
    fn after_handle(&self, _: &InboundRequest) -> Result<(), HttpError> {
        Err(HttpError::new("audit log unavailable")
            .with_status(axum::http::StatusCode::SERVICE_UNAVAILABLE)
            .with_message("Try again shortly."))
    }
}
