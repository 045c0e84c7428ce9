//! Router setup with all API routes and middleware.

use axum::extract::DefaultBodyLimit;
use axum::http::{header, HeaderValue, Method};
use axum::routing::{delete, get, post};
use axum::Router;
use tower_http::compression::CompressionLayer;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;

use civic_core::{CivicError, PortalConfig};

use crate::handlers;
use crate::state::AppState;

/// Request bodies are small JSON documents.
const BODY_LIMIT: usize = 64 * 1024;

/// Create the axum Router with all routes and middleware.
pub fn create_router(state: AppState) -> Router {
    // Allow the portal's own origin plus port+1 for a dev frontend.
    let port = state.config.server.port;
    let origins: Vec<HeaderValue> = [port, port.saturating_add(1)]
        .into_iter()
        .flat_map(|p| [format!("http://127.0.0.1:{}", p), format!("http://localhost:{}", p)])
        .filter_map(|origin| origin.parse::<HeaderValue>().ok())
        .collect();
    let cors = CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::ACCEPT]);

    let session_routes = Router::new()
        .route("/sessions", post(handlers::create_session))
        .route("/sessions/{id}", delete(handlers::delete_session))
        .route("/sessions/{id}/typing", get(handlers::typing))
        .route(
            "/sessions/{id}/departments/{dept}/messages",
            get(handlers::get_messages).post(handlers::post_message),
        )
        .route(
            "/sessions/{id}/departments/{dept}/stream",
            get(handlers::stream),
        );

    Router::new()
        .route("/health", get(handlers::health))
        .route("/departments", get(handlers::departments))
        .route("/route", post(handlers::route))
        .merge(session_routes)
        .layer(DefaultBodyLimit::max(BODY_LIMIT))
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Start the HTTP server on the configured host and port.
pub async fn start_server(config: &PortalConfig, state: AppState) -> Result<(), CivicError> {
    let addr = format!("{}:{}", config.server.host, config.server.port);
    let router = create_router(state);

    tracing::info!("Starting API server on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| CivicError::Api(format!("Failed to bind: {}", e)))?;

    axum::serve(listener, router)
        .await
        .map_err(|e| CivicError::Api(format!("Server error: {}", e)))?;

    Ok(())
}
