//! HTTP trigger for a single deployed shell function

use anyhow::{bail, Result};
use axum::{
    body::{Body, Bytes},
    extract::{DefaultBodyLimit, State},
    http::{HeaderMap, HeaderName, HeaderValue, Method, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use capsules_shell::{InvocationRequest, InvocationResult, ShellRuntime, ShellRuntimeConfig};
use serde::Serialize;
use std::net::SocketAddr;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

/// Request bodies larger than this are answered with 413 unless configured otherwise.
pub const DEFAULT_MAX_BODY_SIZE: usize = 32 * 1024 * 1024;

#[derive(Clone)]
struct AppState {
    runtime: ShellRuntime,
}

#[derive(Serialize)]
struct ReadyResponse<'a> {
    ready: bool,
    function: &'a str,
}

/// Check that every static response header can be sent over HTTP.
pub fn check_response_headers(config: &ShellRuntimeConfig) -> Result<()> {
    for (name, value) in config.response_headers() {
        if HeaderName::from_bytes(name.as_bytes()).is_err() {
            bail!("Response header name '{}' is not a valid HTTP header name", name);
        }
        if HeaderValue::from_str(value).is_err() {
            bail!("Response header '{}' has a value that is not valid in HTTP", name);
        }
    }
    Ok(())
}

/// Create the application router for `runtime`.
///
/// Fails if a static response header cannot be sent over HTTP, so a bad
/// header configuration is caught before the listener is bound.
pub fn create_app(runtime: ShellRuntime, max_body_size: usize) -> Result<Router> {
    check_response_headers(runtime.config())?;

    Ok(Router::new()
        // Health check endpoint
        .route("/health", get(health_check))
        .route("/ready", get(ready))
        // Everything else invokes the function
        .fallback(invoke_function)
        .layer(DefaultBodyLimit::max(max_body_size))
        .layer(TraceLayer::new_for_http())
        .with_state(AppState { runtime }))
}

/// Health check handler
async fn health_check() -> &'static str {
    "OK"
}

async fn ready(State(state): State<AppState>) -> Response {
    Json(ReadyResponse {
        ready: true,
        function: state.runtime.name(),
    })
    .into_response()
}

async fn invoke_function(
    State(state): State<AppState>,
    method: Method,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let mut request = InvocationRequest::new(method.as_str()).with_body(body.to_vec());
    for (name, value) in headers.iter() {
        // values may carry non-ASCII bytes
        request.insert_header(name.as_str(), String::from_utf8_lossy(value.as_bytes()));
    }

    let result = state.runtime.invoke(&request).await;
    into_response(result)
}

fn into_response(result: InvocationResult) -> Response {
    let status = StatusCode::from_u16(result.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

    let mut response = Response::new(Body::from(result.body));
    *response.status_mut() = status;

    let response_headers = response.headers_mut();
    for (name, value) in &result.headers {
        match (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(value),
        ) {
            (Ok(name), Ok(value)) => {
                response_headers.insert(name, value);
            }
            _ => warn!(header = %name, "dropping response header that is not valid HTTP"),
        }
    }

    response
}

/// Start the HTTP trigger for `runtime`
pub async fn serve(addr: SocketAddr, runtime: ShellRuntime, max_body_size: usize) -> Result<()> {
    let function = runtime.name().to_string();
    let app = create_app(runtime, max_body_size)?;

    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%function, "Serving function on {}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
