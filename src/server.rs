//! HTTP transport.
//!
//! The router has no routes of its own: a single fallback hands every
//! request to the [`Dispatcher`], which owns the route tree. A trace layer
//! wraps it so each request gets a span.

use crate::address::AddressStore;
use crate::cache::{DiskThumbnailCache, ThumbnailSettings};
use crate::config::{ConfigError, GalleryConfig};
use crate::dispatch::Dispatcher;
use crate::imaging::RustBackend;
use axum::Router;
use axum::extract::{Request, State};
use axum::response::Response;
use std::net::SocketAddr;
use std::sync::Arc;
use thiserror::Error;
use tower_http::trace::TraceLayer;
use tracing::info;

#[derive(Error, Debug)]
pub enum ServerError {
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Build the application router around a dispatcher.
pub fn router(dispatcher: Arc<Dispatcher>) -> Router {
    Router::new()
        .fallback(handle)
        .with_state(dispatcher)
        .layer(TraceLayer::new_for_http())
}

async fn handle(State(dispatcher): State<Arc<Dispatcher>>, req: Request) -> Response {
    dispatcher.dispatch(req).await
}

/// Wire the production dispatcher from config: record store, disk
/// thumbnail cache rendering with [`RustBackend`], and client paths.
pub fn dispatcher_from_config(config: &GalleryConfig) -> Dispatcher {
    let store = AddressStore::new(config.records_dir(), config.salt.clone());
    let cache = DiskThumbnailCache::new(
        config.thumbnails_dir(),
        ThumbnailSettings::from_config(&config.thumbnails),
        RustBackend::new(),
    );
    Dispatcher::new(
        Arc::new(store),
        Arc::new(cache),
        config.client_root(),
        config.viewer_document(),
    )
}

/// Serve until Ctrl-C or SIGTERM.
pub async fn run(config: &GalleryConfig, bind: Option<SocketAddr>) -> Result<(), ServerError> {
    let addr = match bind {
        Some(addr) => addr,
        None => config.bind_addr()?,
    };
    let app = router(Arc::new(dispatcher_from_config(config)));

    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(
        %addr,
        data_dir = %config.data_root().display(),
        client_dir = %config.client_root().display(),
        "galleryd listening"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!(error = %e, "failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::warn!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("received SIGINT, shutting down"),
        _ = terminate => info!("received SIGTERM, shutting down"),
    }
}
