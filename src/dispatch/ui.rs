//! UI envelope: the handler writes its own content.
//!
//! The envelope runs the UI hook sequence and sets `Content-Type: text/html`.
//! It does not buffer or transform what the handler writes and does not
//! recover handler panics: a panic is re-raised in the router's task.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, HeaderValue, Request};
use axum::response::{IntoResponse, Response};

use crate::config::DispatchConfig;
use crate::dispatch::error::Classification;
use crate::dispatch::request::{InboundRequest, ResponseSink};
use crate::hooks::{run_hooks, LifecycleHooks, UI_AFTER, UI_BEFORE};
use crate::observability::Logger;

/// Type-erased UI handler.
pub type UiHandler = Arc<dyn Fn(&mut ResponseSink, &InboundRequest) + Send + Sync>;

/// Envelope around one registered UI handler.
pub struct UiEnvelope {
    handler: UiHandler,
    hooks: Arc<dyn LifecycleHooks>,
    config: DispatchConfig,
    logger: Logger,
}

impl UiEnvelope {
    pub fn new(
        handler: UiHandler,
        hooks: Arc<dyn LifecycleHooks>,
        config: DispatchConfig,
        logger: Logger,
    ) -> Self {
        Self {
            handler,
            hooks,
            config,
            logger,
        }
    }

    /// Handle one request routed to this envelope.
    ///
    /// # Panics
    ///
    /// Re-raises a panic from the UI handler or its hooks.
    pub async fn handle(self: Arc<Self>, request: Request<Body>) -> Response {
        let inbound = match InboundRequest::buffer(request, self.config.max_body_bytes).await {
            Ok(inbound) => inbound,
            Err(e) => {
                self.logger.scope(|| {
                    tracing::error!(error = %e, "Failed to read UI request body");
                });
                return Classification::Plain.into_response();
            }
        };

        let envelope = Arc::clone(&self);
        match tokio::task::spawn_blocking(move || envelope.dispatch(inbound)).await {
            Ok(response) => response,
            Err(e) if e.is_panic() => std::panic::resume_unwind(e.into_panic()),
            Err(e) => {
                self.logger.scope(|| {
                    tracing::error!(error = %e, "UI dispatch task did not complete");
                });
                Classification::Plain.into_response()
            }
        }
    }

    /// Run the envelope for a buffered request.
    pub fn dispatch(&self, request: InboundRequest) -> Response {
        self.logger.scope(|| {
            let span = tracing::info_span!(
                "dispatch",
                kind = "ui",
                method = %request.method(),
                path = %request.path(),
            );
            let _enter = span.enter();

            let policy = self.config.hook_failure;
            if let Err((_, err)) = run_hooks(&UI_BEFORE, self.hooks.as_ref(), &request, policy) {
                return err.classification().clone().into_response();
            }

            let mut sink = ResponseSink::new();
            sink.insert_header(header::CONTENT_TYPE, HeaderValue::from_static("text/html"));
            (self.handler)(&mut sink, &request);

            if let Err((_, err)) = run_hooks(&UI_AFTER, self.hooks.as_ref(), &request, policy) {
                return err.classification().clone().into_response();
            }

            tracing::debug!(status = sink.status().as_u16(), "UI request handled");
            sink.into_response()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::{HttpError, GENERIC_ERROR_MESSAGE};
    use crate::hooks::{HookFailurePolicy, HookPoint};
    use axum::body::Bytes;
    use axum::http::StatusCode;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recorder {
        seen: Mutex<Vec<HookPoint>>,
        fail_on: Option<HookPoint>,
    }

    impl Recorder {
        fn record(&self, point: HookPoint) -> Result<(), HttpError> {
            self.seen.lock().unwrap().push(point);
            if self.fail_on == Some(point) {
                return Err(HttpError::new("closed").with_status(StatusCode::SERVICE_UNAVAILABLE));
            }
            Ok(())
        }
    }

    impl LifecycleHooks for Recorder {
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

    fn request() -> InboundRequest {
        let (parts, _) = Request::builder().uri("/page").body(()).unwrap().into_parts();
        InboundRequest::from_parts(parts, Bytes::new())
    }

    fn envelope(hooks: Arc<Recorder>, policy: HookFailurePolicy, handler: UiHandler) -> UiEnvelope {
        let config = DispatchConfig {
            hook_failure: policy,
            ..DispatchConfig::default()
        };
        UiEnvelope::new(handler, hooks, config, Logger::current())
    }

    #[tokio::test]
    async fn test_handler_output_passes_through() {
        let hooks = Arc::new(Recorder::default());
        let env = envelope(
            hooks.clone(),
            HookFailurePolicy::Log,
            Arc::new(|sink: &mut ResponseSink, req: &InboundRequest| {
                sink.write_str(&format!("<h1>{}</h1>", req.path()));
            }),
        );

        let response = env.dispatch(request());
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::CONTENT_TYPE], "text/html");
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        assert_eq!(&body[..], b"<h1>/page</h1>");
        assert_eq!(
            *hooks.seen.lock().unwrap(),
            vec![
                HookPoint::BeforeHandle,
                HookPoint::BeforeUiHandle,
                HookPoint::AfterUiHandle,
                HookPoint::AfterHandle,
            ]
        );
    }

    #[test]
    fn test_abort_policy_skips_handler() {
        let hooks = Arc::new(Recorder {
            fail_on: Some(HookPoint::BeforeUiHandle),
            ..Default::default()
        });
        let called = Arc::new(Mutex::new(false));
        let flag = called.clone();
        let env = envelope(
            hooks,
            HookFailurePolicy::Abort,
            Arc::new(move |_: &mut ResponseSink, _: &InboundRequest| {
                *flag.lock().unwrap() = true;
            }),
        );

        let response = env.dispatch(request());
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert!(!*called.lock().unwrap());
    }

    #[tokio::test]
    async fn test_after_hook_failure_drops_handler_output() {
        let hooks = Arc::new(Recorder {
            fail_on: Some(HookPoint::AfterUiHandle),
            ..Default::default()
        });
        let env = envelope(
            hooks.clone(),
            HookFailurePolicy::Abort,
            Arc::new(|sink: &mut ResponseSink, _: &InboundRequest| {
                sink.write_str("<p>rendered</p>");
            }),
        );

        let response = env.dispatch(request());
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(
            response.headers()[header::CONTENT_TYPE],
            "text/plain; charset=utf-8"
        );
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        assert_eq!(&body[..], format!("{GENERIC_ERROR_MESSAGE}\n").as_bytes());
        assert_eq!(
            *hooks.seen.lock().unwrap(),
            vec![
                HookPoint::BeforeHandle,
                HookPoint::BeforeUiHandle,
                HookPoint::AfterUiHandle,
            ]
        );
    }

    #[test]
    #[should_panic(expected = "template missing")]
    fn test_handler_panic_is_not_recovered() {
        let env = envelope(
            Arc::new(Recorder::default()),
            HookFailurePolicy::Log,
            Arc::new(|_: &mut ResponseSink, _: &InboundRequest| panic!("template missing")),
        );
        env.dispatch(request());
    }
}
