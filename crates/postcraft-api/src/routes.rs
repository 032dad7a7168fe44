//! Router setup with all API routes and middleware.

use std::future::Future;

use axum::extract::DefaultBodyLimit;
use axum::http::{header, HeaderValue, Method};
use axum::routing::{get, post};
use axum::Router;
use postcraft_core::error::PostcraftError;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::handlers;
use crate::state::AppState;

/// Create the axum Router with all routes and middleware.
pub fn create_router(state: AppState) -> Router {
    // Local viewers on the API port and the port above it (dev server).
    let port = state.config.api.port;
    let origins: Vec<HeaderValue> = [port, port.saturating_add(1)]
        .into_iter()
        .flat_map(|p| {
            [
                format!("http://127.0.0.1:{}", p),
                format!("http://localhost:{}", p),
            ]
        })
        .filter_map(|origin| origin.parse::<HeaderValue>().ok())
        .collect();
    let cors = CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::ACCEPT]);

    // Reachable before an API key exists.
    let public_routes = Router::new()
        .route("/health", get(handlers::health))
        .route(
            "/credential",
            get(handlers::get_credential).post(handlers::select_credential),
        );

    let gated_routes = Router::new()
        .route("/state", get(handlers::get_state))
        .route("/messages", get(handlers::get_messages))
        .route("/chat", post(handlers::chat))
        .route("/post", get(handlers::get_post))
        .route("/media/{kind}", get(handlers::get_media))
        .route("/media/{kind}/generate", post(handlers::generate_media))
        .route("/media/{kind}/artifact", get(handlers::get_media_artifact))
        .route("/events", get(handlers::events))
        .route_layer(axum::middleware::from_fn_with_state(
            state.clone(),
            crate::gate::require_credential,
        ));

    public_routes
        .merge(gated_routes)
        .layer(DefaultBodyLimit::max(256 * 1024))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Serve the API on the configured address until `shutdown` resolves.
///
/// Once it resolves, open event streams are closed before in-flight
/// requests are drained.
pub async fn start_server<F>(state: AppState, shutdown: F) -> Result<(), PostcraftError>
where
    F: Future<Output = ()> + Send + 'static,
{
    let addr = format!("{}:{}", state.config.api.host, state.config.api.port);
    let closing = state.clone();
    let router = create_router(state);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("API server listening on {}", addr);

    axum::serve(listener, router)
        .with_graceful_shutdown(async move {
            shutdown.await;
            closing.trigger_shutdown();
            tracing::info!("Closing event streams");
        })
        .await?;
    Ok(())
}
