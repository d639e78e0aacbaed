//! Router facade.
//!
//! # Responsibilities
//! - Own the axum router, the hook set and the logger
//! - Wrap each registered handler in its envelope
//! - Translate allowed methods into axum method filters
//!
//! # Design Decisions
//! - No request-time logic here; envelopes do the work
//! - Invalid and conflicting registrations are returned as errors; axum
//!   never sees a route it would panic on

use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use axum::body::Body;
use axum::http::{Method, Request};
use axum::routing::{any, on, MethodFilter, MethodRouter};
use serde::Serialize;
use thiserror::Error;

use crate::config::DispatchConfig;
use crate::dispatch::api::api_handler;
use crate::dispatch::{
    ApiEnvelope, HttpError, InboundRequest, JsonObject, ResponseSink, UiEnvelope,
};
use crate::hooks::LifecycleHooks;
use crate::observability::Logger;

/// Which envelope a route uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandlerKind {
    Api,
    Ui,
}

impl fmt::Display for HandlerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HandlerKind::Api => f.write_str("api"),
            HandlerKind::Ui => f.write_str("ui"),
        }
    }
}

/// A registered route.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Registration {
    pub pattern: String,
    /// Allowed methods; empty means any.
    pub methods: Vec<Method>,
    pub kind: HandlerKind,
    pub decode_body: bool,
}

impl Registration {
    fn overlaps(&self, pattern: &str, methods: &[Method]) -> bool {
        self.pattern == pattern
            && (self.methods.is_empty()
                || methods.is_empty()
                || self.methods.iter().any(|m| methods.contains(m)))
    }
}

/// Errors raised while registering a route.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistrationError {
    #[error("route pattern {0:?} is not valid (captures are written {{name}} or {{*name}})")]
    InvalidPattern(String),

    #[error("method {0} cannot be routed")]
    UnsupportedMethod(Method),

    #[error("route {pattern:?} conflicts with an existing registration")]
    Conflict { pattern: String },
}

/// One `/`-separated piece of a route pattern.
#[derive(Debug, PartialEq, Eq)]
enum Segment<'a> {
    Static(&'a str),
    Capture(&'a str),
    CatchAll(&'a str),
}

impl<'a> Segment<'a> {
    fn parse(segment: &'a str) -> Option<Self> {
        if segment.starts_with(':') || segment.starts_with('*') {
            return None;
        }
        let Some(inner) = segment
            .strip_prefix('{')
            .and_then(|rest| rest.strip_suffix('}'))
        else {
            return Some(Segment::Static(segment));
        };
        if inner.starts_with('{') {
            // `{{...}}` is an escaped literal brace.
            return Some(Segment::Static(segment));
        }
        let (name, catch_all) = match inner.strip_prefix('*') {
            Some(name) => (name, true),
            None => (inner, false),
        };
        if name.is_empty() || name.contains(['{', '}', '*', '/']) {
            return None;
        }
        Some(if catch_all {
            Segment::CatchAll(name)
        } else {
            Segment::Capture(name)
        })
    }
}

/// Split a pattern into segments, rejecting syntax axum does not accept.
fn parse_pattern(pattern: &str) -> Option<Vec<Segment<'_>>> {
    let rest = pattern.strip_prefix('/')?;
    let segments = rest
        .split('/')
        .map(Segment::parse)
        .collect::<Option<Vec<_>>>()?;
    let last = segments.len().saturating_sub(1);
    let misplaced_catch_all = segments
        .iter()
        .enumerate()
        .any(|(i, s)| matches!(s, Segment::CatchAll(_)) && i != last);
    if misplaced_catch_all {
        return None;
    }
    Some(segments)
}

/// Two different patterns that capture at the same position under different
/// names cannot share a route tree.
fn captures_clash(a: &[Segment<'_>], b: &[Segment<'_>]) -> bool {
    for (x, y) in a.iter().zip(b) {
        match (x, y) {
            (Segment::Static(x), Segment::Static(y)) if x == y => continue,
            (Segment::Capture(x), Segment::Capture(y))
            | (Segment::CatchAll(x), Segment::CatchAll(y)) => {
                if x != y {
                    return true;
                }
            }
            _ => return false,
        }
    }
    false
}

/// An axum router whose handlers run inside lifecycle envelopes.
pub struct LifecycleRouter {
    router: axum::Router,
    hooks: Arc<dyn LifecycleHooks>,
    config: DispatchConfig,
    logger: Logger,
    registrations: Vec<Registration>,
}

impl LifecycleRouter {
    /// Create a router with default dispatch settings, logging to the
    /// current subscriber.
    pub fn new(hooks: impl LifecycleHooks) -> Self {
        Self::with_settings(Arc::new(hooks), DispatchConfig::default(), Logger::current())
    }

    pub fn with_settings(
        hooks: Arc<dyn LifecycleHooks>,
        config: DispatchConfig,
        logger: Logger,
    ) -> Self {
        Self {
            router: axum::Router::new(),
            hooks,
            config,
            logger,
            registrations: Vec::new(),
        }
    }

    /// Register a route that produces data.
    ///
    /// The handler's output is encoded as an indented JSON object. With
    /// `decode_body`, the request body is decoded as a JSON object first
    /// and passed to the handler.
    pub fn add_api_handler<F, T>(
        &mut self,
        pattern: &str,
        methods: &[Method],
        decode_body: bool,
        handler: F,
    ) -> Result<&mut Self, RegistrationError>
    where
        F: Fn(&mut ResponseSink, &InboundRequest, Option<&JsonObject>) -> Result<T, HttpError>
            + Send
            + Sync
            + 'static,
        T: Serialize,
    {
        let registration = self.check(pattern, methods, HandlerKind::Api, decode_body)?;
        let envelope = Arc::new(ApiEnvelope::new(
            api_handler(handler),
            Arc::clone(&self.hooks),
            decode_body,
            self.config.clone(),
            self.logger.clone(),
        ));
        let method_router = method_router(methods, move |request: Request<Body>| {
            let envelope = Arc::clone(&envelope);
            async move { envelope.handle(request).await }
        })?;
        self.install(registration, method_router)
    }

    /// Register a route that produces browser content (e.g. HTML).
    pub fn add_ui_handler<F>(
        &mut self,
        pattern: &str,
        methods: &[Method],
        handler: F,
    ) -> Result<&mut Self, RegistrationError>
    where
        F: Fn(&mut ResponseSink, &InboundRequest) + Send + Sync + 'static,
    {
        let registration = self.check(pattern, methods, HandlerKind::Ui, false)?;
        let envelope = Arc::new(UiEnvelope::new(
            Arc::new(handler),
            Arc::clone(&self.hooks),
            self.config.clone(),
            self.logger.clone(),
        ));
        let method_router = method_router(methods, move |request: Request<Body>| {
            let envelope = Arc::clone(&envelope);
            async move { envelope.handle(request).await }
        })?;
        self.install(registration, method_router)
    }

    /// Register a GET-only UI route.
    pub fn add_ui_page<F>(&mut self, pattern: &str, handler: F) -> Result<&mut Self, RegistrationError>
    where
        F: Fn(&mut ResponseSink, &InboundRequest) + Send + Sync + 'static,
    {
        self.add_ui_handler(pattern, &[Method::GET], handler)
    }

    pub fn registrations(&self) -> &[Registration] {
        &self.registrations
    }

    /// A clone of the underlying axum router, usable as a service.
    pub fn router(&self) -> axum::Router {
        self.router.clone()
    }

    pub fn into_router(self) -> axum::Router {
        self.router
    }

    fn check(
        &self,
        pattern: &str,
        methods: &[Method],
        kind: HandlerKind,
        decode_body: bool,
    ) -> Result<Registration, RegistrationError> {
        let segments = parse_pattern(pattern)
            .ok_or_else(|| RegistrationError::InvalidPattern(pattern.to_string()))?;
        let conflict = self.registrations.iter().any(|r| {
            r.overlaps(pattern, methods)
                || parse_pattern(&r.pattern)
                    .is_some_and(|existing| captures_clash(&existing, &segments))
        });
        if conflict {
            return Err(RegistrationError::Conflict {
                pattern: pattern.to_string(),
            });
        }
        Ok(Registration {
            pattern: pattern.to_string(),
            methods: methods.to_vec(),
            kind,
            decode_body,
        })
    }

    /// Add the route to a copy of the axum router and keep the copy only if
    /// axum accepted it.
    fn install(
        &mut self,
        registration: Registration,
        method_router: MethodRouter,
    ) -> Result<&mut Self, RegistrationError> {
        let candidate = self.router.clone();
        let routed = panic::catch_unwind(AssertUnwindSafe(|| {
            candidate.route(&registration.pattern, method_router)
        }));
        let router = match routed {
            Ok(router) => router,
            Err(payload) => {
                let reason = payload
                    .downcast_ref::<String>()
                    .map(String::as_str)
                    .or_else(|| payload.downcast_ref::<&str>().copied())
                    .unwrap_or("");
                tracing::warn!(pattern = %registration.pattern, reason, "Route rejected by axum");
                let pattern = registration.pattern;
                return Err(if reason.contains("conflict") {
                    RegistrationError::Conflict { pattern }
                } else {
                    RegistrationError::InvalidPattern(pattern)
                });
            }
        };

        tracing::debug!(
            pattern = %registration.pattern,
            methods = ?registration.methods,
            kind = %registration.kind,
            decode_body = registration.decode_body,
            "Route registered"
        );
        self.router = router;
        self.registrations.push(registration);
        Ok(self)
    }
}

impl fmt::Debug for LifecycleRouter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LifecycleRouter")
            .field("config", &self.config)
            .field("registrations", &self.registrations)
            .finish_non_exhaustive()
    }
}

fn method_router<H, T>(methods: &[Method], handler: H) -> Result<MethodRouter, RegistrationError>
where
    H: axum::handler::Handler<T, ()>,
    T: 'static,
{
    let mut filter: Option<MethodFilter> = None;
    for method in methods {
        let next = MethodFilter::try_from(method.clone())
            .map_err(|_| RegistrationError::UnsupportedMethod(method.clone()))?;
        filter = Some(match filter {
            Some(acc) => acc.or(next),
            None => next,
        });
    }
    Ok(match filter {
        Some(filter) => on(filter, handler),
        None => any(handler),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hooks::NoopHooks;
    use serde_json::json;

    fn ok_handler(
        _: &mut ResponseSink,
        _: &InboundRequest,
        _: Option<&JsonObject>,
    ) -> Result<serde_json::Value, HttpError> {
        Ok(json!({}))
    }

    #[test]
    fn test_registrations_are_recorded() {
        let mut lr = LifecycleRouter::new(NoopHooks);
        lr.add_api_handler("/api", &[Method::POST], true, ok_handler)
            .unwrap()
            .add_ui_page("/", |_: &mut ResponseSink, _: &InboundRequest| {})
            .unwrap();

        assert_eq!(
            lr.registrations(),
            &[
                Registration {
                    pattern: "/api".into(),
                    methods: vec![Method::POST],
                    kind: HandlerKind::Api,
                    decode_body: true,
                },
                Registration {
                    pattern: "/".into(),
                    methods: vec![Method::GET],
                    kind: HandlerKind::Ui,
                    decode_body: false,
                },
            ]
        );
    }

    #[test]
    fn test_invalid_pattern() {
        let mut lr = LifecycleRouter::new(NoopHooks);
        let err = lr.add_api_handler("api", &[], false, ok_handler).unwrap_err();
        assert_eq!(err, RegistrationError::InvalidPattern("api".into()));
    }

    #[test]
    fn test_overlapping_methods_conflict() {
        let mut lr = LifecycleRouter::new(NoopHooks);
        lr.add_api_handler("/x", &[Method::GET, Method::POST], false, ok_handler)
            .unwrap();

        let err = lr
            .add_api_handler("/x", &[Method::POST], false, ok_handler)
            .unwrap_err();
        assert!(matches!(err, RegistrationError::Conflict { .. }));

        let err = lr.add_api_handler("/x", &[], false, ok_handler).unwrap_err();
        assert!(matches!(err, RegistrationError::Conflict { .. }));

        // Disjoint methods on the same pattern are fine.
        lr.add_api_handler("/x", &[Method::DELETE], false, ok_handler)
            .unwrap();
    }

    #[test]
    fn test_colon_captures_are_invalid() {
        let mut lr = LifecycleRouter::new(NoopHooks);
        for pattern in ["/items/:id", "/files/*rest", "/items/{}", "/{*rest}/tail"] {
            let err = lr
                .add_api_handler(pattern, &[Method::GET], false, ok_handler)
                .unwrap_err();
            assert_eq!(err, RegistrationError::InvalidPattern(pattern.into()));
        }
        assert!(lr.registrations().is_empty());
    }

    #[test]
    fn test_capture_names_must_agree() {
        let page = |_: &mut ResponseSink, _: &InboundRequest| {};
        let mut lr = LifecycleRouter::new(NoopHooks);
        lr.add_api_handler("/items/{id}", &[Method::GET], false, ok_handler)
            .unwrap();

        let err = lr
            .add_api_handler("/items/{name}", &[Method::POST], false, ok_handler)
            .unwrap_err();
        assert_eq!(
            err,
            RegistrationError::Conflict {
                pattern: "/items/{name}".into()
            }
        );

        let err = lr
            .add_ui_handler("/items/{name}/edit", &[Method::GET], page)
            .unwrap_err();
        assert!(matches!(err, RegistrationError::Conflict { .. }));
        assert_eq!(lr.registrations().len(), 1);

        // Same capture name, deeper route: accepted.
        lr.add_ui_handler("/items/{id}/edit", &[Method::GET], page)
            .unwrap();
        lr.add_api_handler("/files/{*path}", &[], false, ok_handler)
            .unwrap();
    }

    #[test]
    fn test_custom_method_is_rejected() {
        let mut lr = LifecycleRouter::new(NoopHooks);
        let purge = Method::from_bytes(b"PURGE").unwrap();
        let err = lr
            .add_api_handler("/x", &[purge.clone()], false, ok_handler)
            .unwrap_err();
        assert_eq!(err, RegistrationError::UnsupportedMethod(purge));
        assert!(lr.registrations().is_empty());
    }
}
