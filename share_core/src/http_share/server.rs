//! HTTP server for the signaling API
//!
//! JSON endpoints, the realtime WebSocket and optional static assets on one
//! listener.

use super::api;
use super::websocket::{self, ShareState};
use crate::{ServerConfig, SignalHub};
use anyhow::{Context, Result};
use axum::{
    Router,
    extract::Request,
    handler::HandlerWithoutStateExt,
    http::{HeaderValue, header},
    middleware::{self, Next},
    response::Response,
    routing::{get, post},
};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::services::ServeDir;

/// Middleware to add security headers
async fn add_security_headers(req: Request, next: Next) -> Response {
    let mut response = next.run(req).await;
    let headers = response.headers_mut();

    headers.insert(
        header::X_CONTENT_TYPE_OPTIONS,
        HeaderValue::from_static("nosniff"),
    );
    headers.insert(header::X_FRAME_OPTIONS, HeaderValue::from_static("DENY"));
    headers.insert(
        header::REFERRER_POLICY,
        HeaderValue::from_static("no-referrer"),
    );

    response
}

/// Build the axum router
pub fn create_router(state: Arc<ShareState>, config: &ServerConfig) -> Router {
    let router = Router::new()
        .route("/api/health", get(api::health))
        .route("/api/announce-file", post(api::announce_file))
        .route("/api/request-download", post(api::request_download))
        .route("/api/request-file", post(api::request_download))
        .route("/ws", get(websocket::ws_handler));

    let router = match &config.static_dir {
        Some(dir) => router.fallback_service(
            ServeDir::new(dir).not_found_service(api::not_found.into_service()),
        ),
        None => router.fallback(api::not_found),
    };

    router
        .layer(RequestBodyLimitLayer::new(config.max_body_bytes))
        .layer(CorsLayer::permissive())
        .layer(middleware::from_fn(add_security_headers))
        .with_state(state)
}

/// Serve on an already bound listener until `cancel_token` fires
pub async fn serve(
    listener: TcpListener,
    hub: Arc<SignalHub>,
    config: &ServerConfig,
    cancel_token: CancellationToken,
) -> Result<()> {
    let state = Arc::new(ShareState::new(hub, config));
    let router = create_router(state, config);

    axum::serve(
        listener,
        router.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(async move {
        cancel_token.cancelled().await;
        tracing::info!("HTTP server shutting down gracefully");
    })
    .await
    .context("HTTP server failed")?;

    Ok(())
}

/// Bind `config.bind_addr` and serve
pub async fn start_server(
    config: &ServerConfig,
    hub: Arc<SignalHub>,
    cancel_token: CancellationToken,
) -> Result<()> {
    let listener = TcpListener::bind(config.bind_addr)
        .await
        .with_context(|| format!("Failed to bind {}", config.bind_addr))?;

    tracing::info!("Signaling server listening on http://{}", config.bind_addr);
    if let Some(dir) = &config.static_dir {
        tracing::info!("Serving static files from {}", dir.display());
    }

    serve(listener, hub, config, cancel_token).await
}
