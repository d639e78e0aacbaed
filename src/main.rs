//! Demo server for the lifecycle router.
//!
//! Serves a small API and a UI page so the hook sequence and error handling
//! can be watched in the logs:
//!
//! ```text
//! GET  /              UI page
//! GET  /api/status    JSON status
//! POST /api/echo      echoes the decoded JSON body
//! GET  /api/fail      classified failure (418)
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use axum::http::{Method, StatusCode};
use clap::Parser;
use serde::Serialize;
use serde_json::json;
use tokio::net::TcpListener;

use lifecycle_router::config::{load_config, ServerConfig};
use lifecycle_router::hooks::TracingHooks;
use lifecycle_router::observability::{init_logging, Logger};
use lifecycle_router::{
    HttpError, HttpServer, InboundRequest, JsonObject, LifecycleRouter, ResponseSink, Shutdown,
};

#[derive(Parser)]
#[command(name = "lifecycle-router")]
#[command(about = "Demo server for lifecycle-hooked API and UI routes", long_about = None)]
struct Cli {
    /// Path to a TOML config file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the listener bind address.
    #[arg(short, long)]
    bind: Option<String>,
}

#[derive(Serialize)]
struct Status {
    version: &'static str,
    status: &'static str,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => load_config(path)?,
        None => ServerConfig::default(),
    };
    if let Some(bind) = cli.bind {
        config.listener.bind_address = bind;
    }

    init_logging(&config.observability);
    tracing::info!("lifecycle-router v{} starting", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        bind_address = %config.listener.bind_address,
        hook_failure = ?config.dispatch.hook_failure,
        max_body_bytes = config.dispatch.max_body_bytes,
        "Configuration loaded"
    );

    let router = build_router(&config)?;
    let server = HttpServer::new(router, &config);

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    let shutdown = Shutdown::new();
    let server_shutdown = shutdown.subscribe();
    shutdown.trigger_on_signal();

    server.run(listener, server_shutdown).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}

fn build_router(
    config: &ServerConfig,
) -> Result<LifecycleRouter, lifecycle_router::routing::RegistrationError> {
    let mut lr = LifecycleRouter::with_settings(
        Arc::new(TracingHooks),
        config.dispatch.clone(),
        Logger::current(),
    );

    lr.add_api_handler("/api/status", &[Method::GET], false, status)?
        .add_api_handler("/api/echo", &[Method::POST], true, echo)?
        .add_api_handler("/api/fail", &[Method::GET], false, fail)?
        .add_ui_page("/", index)?;

    Ok(lr)
}

fn status(
    _: &mut ResponseSink,
    _: &InboundRequest,
    _: Option<&JsonObject>,
) -> Result<Status, HttpError> {
    Ok(Status {
        version: env!("CARGO_PKG_VERSION"),
        status: "operational",
    })
}

fn echo(
    _: &mut ResponseSink,
    _: &InboundRequest,
    body: Option<&JsonObject>,
) -> Result<serde_json::Value, HttpError> {
    Ok(json!({ "received": body }))
}

fn fail(
    _: &mut ResponseSink,
    request: &InboundRequest,
    _: Option<&JsonObject>,
) -> Result<serde_json::Value, HttpError> {
    Err(HttpError::new(format!("{} always fails", request.path()))
        .with_status(StatusCode::IM_A_TEAPOT)
        .with_message("This endpoint always fails."))
}

fn index(sink: &mut ResponseSink, _: &InboundRequest) {
    sink.write_str(
        "<!doctype html>\n<title>lifecycle-router</title>\n\
         <h1>lifecycle-router</h1>\n\
         <p>Try <a href=\"/api/status\">/api/status</a>.</p>\n",
    );
}
