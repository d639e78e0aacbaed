//! API envelope: JSON in, JSON out, failures recovered.
//!
//! # Responsibilities
//! - Decode the JSON request body when the route asks for it
//! - Run the API hook sequence around the handler
//! - Encode handler output as indented JSON
//! - Turn every failure, panics included, into one classified response
//!
//! # Design Decisions
//! - Recovery covers body decoding, hooks, handler and encoding
//! - After-hooks are skipped once a failure is raised
//! - Handler errors get route context; classification looks through it

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, HeaderValue, Request};
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use serde_json::Value;

use crate::config::DispatchConfig;
use crate::dispatch::body::{decode_body, encode_output};
use crate::dispatch::error::{DispatchError, HttpError};
use crate::dispatch::request::{InboundRequest, ResponseSink};
use crate::dispatch::JsonObject;
use crate::hooks::{run_hooks, HookPoint, LifecycleHooks, API_AFTER, API_BEFORE};
use crate::observability::Logger;

/// Type-erased API handler.
pub type ApiHandler = Arc<
    dyn Fn(&mut ResponseSink, &InboundRequest, Option<&JsonObject>) -> Result<Value, DispatchError>
        + Send
        + Sync,
>;

/// Erase an API handler's output type.
pub fn api_handler<F, T>(handler: F) -> ApiHandler
where
    F: Fn(&mut ResponseSink, &InboundRequest, Option<&JsonObject>) -> Result<T, HttpError>
        + Send
        + Sync
        + 'static,
    T: Serialize,
{
    Arc::new(
        move |sink: &mut ResponseSink, request: &InboundRequest, body: Option<&JsonObject>| {
            let output = handler(sink, request, body).map_err(|err| {
                DispatchError::from(err).wrap(format!("{} {}", request.method(), request.path()))
            })?;
            serde_json::to_value(output).map_err(DispatchError::Encode)
        },
    )
}

/// Envelope around one registered API handler.
pub struct ApiEnvelope {
    handler: ApiHandler,
    hooks: Arc<dyn LifecycleHooks>,
    decode_body: bool,
    config: DispatchConfig,
    logger: Logger,
}

impl ApiEnvelope {
    pub fn new(
        handler: ApiHandler,
        hooks: Arc<dyn LifecycleHooks>,
        decode_body: bool,
        config: DispatchConfig,
        logger: Logger,
    ) -> Self {
        Self {
            handler,
            hooks,
            decode_body,
            config,
            logger,
        }
    }

    /// Handle one request routed to this envelope.
    pub async fn handle(self: Arc<Self>, request: Request<Body>) -> Response {
        let method = request.method().clone();
        let path = request.uri().path().to_string();

        let inbound = match InboundRequest::buffer(request, self.config.max_body_bytes).await {
            Ok(inbound) => inbound,
            Err(e) => {
                let err = DispatchError::BodyRead(e.to_string());
                return self.logger.scope(|| {
                    tracing::info_span!("dispatch", kind = "api", %method, %path)
                        .in_scope(|| self.recover(err))
                });
            }
        };

        let envelope = Arc::clone(&self);
        match tokio::task::spawn_blocking(move || envelope.dispatch(inbound)).await {
            Ok(response) => response,
            Err(e) => {
                let err = DispatchError::Panicked(e.to_string());
                self.logger.scope(|| {
                    tracing::info_span!("dispatch", kind = "api", %method, %path)
                        .in_scope(|| self.recover(err))
                })
            }
        }
    }

    /// Run the envelope for a buffered request.
    pub fn dispatch(&self, request: InboundRequest) -> Response {
        self.logger.scope(|| {
            let span = tracing::info_span!(
                "dispatch",
                kind = "api",
                method = %request.method(),
                path = %request.path(),
            );
            let _enter = span.enter();

            let result = panic::catch_unwind(AssertUnwindSafe(|| self.run(&request)))
                .unwrap_or_else(|payload| Err(DispatchError::from_panic(payload)));

            match result {
                Ok(response) => response,
                Err(err) => self.recover(err),
            }
        })
    }

    fn run(&self, request: &InboundRequest) -> Result<Response, DispatchError> {
        let body = if self.decode_body {
            decode_body(request)?
        } else {
            None
        };

        self.hooks_or_abort(&API_BEFORE, request)?;

        let mut sink = ResponseSink::new();
        sink.insert_header(
            header::CONTENT_TYPE,
            HeaderValue::from_static("application/json"),
        );

        let output = (self.handler)(&mut sink, request, body.as_ref())?;
        let encoded = encode_output(&output)?;
        sink.write(&encoded);

        self.hooks_or_abort(&API_AFTER, request)?;

        tracing::debug!(status = sink.status().as_u16(), "API request handled");
        Ok(sink.into_response())
    }

    fn hooks_or_abort(
        &self,
        points: &[HookPoint],
        request: &InboundRequest,
    ) -> Result<(), DispatchError> {
        run_hooks(points, self.hooks.as_ref(), request, self.config.hook_failure)
            .map_err(|(hook, source)| DispatchError::Hook { hook, source })
    }

    fn recover(&self, err: DispatchError) -> Response {
        let classification = err.classification();
        tracing::error!(
            error = %err,
            status = classification.status().as_u16(),
            message = classification.message(),
            "API request failed"
        );
        classification.into_response()
    }
}
