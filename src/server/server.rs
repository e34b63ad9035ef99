use anyhow::{Context, Result};
use std::time::Duration;

use axum::{
    extract::State,
    http::{header, HeaderValue, Method},
    middleware,
    routing::get,
    Json, Router,
};
use serde::Serialize;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tracing::{info, warn};

use super::admin_routes::make_admin_routes;
use super::auth_routes::make_auth_routes;
use super::collection_routes::make_collection_routes;
use super::library_routes::make_library_routes;
use super::metrics::make_metrics_app;
use super::profile_routes::make_profile_routes;
use super::token::TokenCodec;
use super::{log_requests, state::*, ServerConfig};

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    timestamp: String,
    uptime: String,
}

fn format_uptime(duration: Duration) -> String {
    let total_seconds = duration.as_secs();

    let days = total_seconds / 86_400;
    let hours = (total_seconds % 86_400) / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let seconds = total_seconds % 60;

    format!("{}d {:02}:{:02}:{:02}", days, hours, minutes, seconds)
}

async fn health(State(state): State<ServerState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        timestamp: chrono::Utc::now().to_rfc3339(),
        uptime: format_uptime(state.start_time.elapsed()),
    })
}

fn make_cors_layer(allowed_origins: &[String]) -> Result<CorsLayer> {
    let origins = allowed_origins
        .iter()
        .map(|origin| {
            HeaderValue::from_str(origin)
                .with_context(|| format!("Invalid CORS origin: {}", origin))
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
        .max_age(Duration::from_secs(3600)))
}

pub fn make_app(state: ServerState) -> Result<Router> {
    let api_routes: Router = Router::new()
        .route("/health", get(health))
        .with_state(state.clone())
        .merge(make_auth_routes(state.clone()))
        .merge(make_profile_routes(state.clone()))
        .merge(make_library_routes(state.clone()))
        .merge(make_collection_routes(state.clone()))
        .merge(make_admin_routes(state.clone()));

    let mut app: Router = Router::new().nest("/api", api_routes);

    if !state.config.cors_allowed_origins.is_empty() {
        app = app.layer(make_cors_layer(&state.config.cors_allowed_origins)?);
    }
    app = app.layer(middleware::from_fn_with_state(state.clone(), log_requests));

    Ok(app)
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for shutdown signal: {}", err);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}

pub async fn run_server(
    config: ServerConfig,
    store: GuardedLibraryStore,
    token_codec: TokenCodec,
    metrics_port: u16,
) -> Result<()> {
    let port = config.port;
    let state = ServerState::new(config, store, token_codec);
    let app = make_app(state)?;

    let metrics_listener = tokio::net::TcpListener::bind(format!("127.0.0.1:{}", metrics_port))
        .await
        .with_context(|| format!("Failed to bind metrics port {}", metrics_port))?;
    tokio::spawn(async move {
        if let Err(err) = axum::serve(metrics_listener, make_metrics_app()).await {
            warn!("Metrics server stopped: {}", err);
        }
    });

    let listener = tokio::net::TcpListener::bind(format!("127.0.0.1:{}", port))
        .await
        .with_context(|| format!("Failed to bind port {}", port))?;

    info!("Ready to serve at port {}!", port);
    info!("Metrics available at port {}!", metrics_port);

    Ok(axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?)
}
