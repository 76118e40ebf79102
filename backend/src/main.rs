//! Fashion Collective Backend
//!
//! REST backend for collaborative garment design: users publish designs,
//! others evaluate and remix them, and contributions are tracked in a
//! ledger backed by SQLite.

mod ai;
mod api;
mod auth;
mod config;
mod db;
mod errors;
mod models;

use std::sync::Arc;

use axum::{
    routing::{get, post, put},
    Router,
};
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use ai::{DesignAssistant, SimulatedAssistant};
use config::{Config, LogFormat};
use db::Repository;

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    pub repo: Arc<Repository>,
    pub ai: Arc<dyn DesignAssistant>,
    pub config: Arc<Config>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load configuration
    let config = Config::from_env();

    // Initialize logging
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    let registry = tracing_subscriber::registry().with(env_filter);
    match config.log_format {
        LogFormat::Json => registry.with(tracing_subscriber::fmt::layer().json()).init(),
        LogFormat::Text => registry.with(tracing_subscriber::fmt::layer()).init(),
    }

    tracing::info!("Starting Fashion Collective Backend");
    tracing::info!("Database path: {:?}", config.db_path);
    tracing::info!("Bind address: {}", config.bind_addr);
    tracing::info!("Environment: {}", config.environment);

    if config.jwt_secret_is_default {
        tracing::warn!(
            "No credential secret configured (COLLECTIVE_JWT_SECRET). Using the development secret!"
        );
    }

    // Initialize database
    let pool = db::init_database(&config.db_path).await?;
    let repo = Arc::new(Repository::new(pool));

    let ai: Arc<dyn DesignAssistant> = Arc::new(SimulatedAssistant::new(config.ai_latency_factor));

    // Create application state
    let state = AppState {
        repo,
        ai,
        config: Arc::new(config.clone()),
    };

    // Build router
    let app = create_router(state);

    // Start server
    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    tracing::info!("Server listening on {}", config.bind_addr);

    axum::serve(listener, app).await?;

    Ok(())
}

/// Create the application router with all routes.
pub fn create_router(state: AppState) -> Router {
    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // API routes
    let api_routes = Router::new()
        .route("/", get(welcome))
        // Users
        .route("/users", get(api::list_users))
        .route("/users/register", post(api::register))
        .route("/users/login", post(api::login))
        .route(
            "/users/profile",
            get(api::get_profile).put(api::update_profile),
        )
        .route("/users/{id}", get(api::get_user))
        .route("/users/{id}/role", put(api::change_role))
        // Designs
        .route("/designs", get(api::list_designs).post(api::create_design))
        .route("/designs/ai/generated", get(api::list_ai_generated_designs))
        .route("/designs/user/{user_id}", get(api::list_designs_by_creator))
        .route(
            "/designs/{id}",
            get(api::get_design)
                .put(api::update_design)
                .delete(api::delete_design),
        )
        // Evaluations
        .route(
            "/evaluations",
            get(api::list_evaluations).post(api::create_evaluation),
        )
        .route(
            "/evaluations/design/{design_id}",
            get(api::list_evaluations_by_design),
        )
        .route(
            "/evaluations/user/{user_id}",
            get(api::list_evaluations_by_user),
        )
        .route(
            "/evaluations/{id}",
            get(api::get_evaluation)
                .put(api::update_evaluation)
                .delete(api::delete_evaluation),
        )
        // AI tools
        .route("/ai-tools/detect-objects", post(api::detect_objects))
        .route("/ai-tools/render-texture", post(api::render_texture))
        .route("/ai-tools/apply-to-model", post(api::apply_to_model))
        .route("/ai-tools/extract-pattern", post(api::extract_pattern))
        .route(
            "/ai-tools/update-design",
            post(api::update_design_from_evaluations),
        );

    // Health check (no auth required)
    let health_routes = Router::new().route("/health", get(health_check));

    Router::new()
        .nest("/api", api_routes)
        .merge(health_routes)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors),
        )
        .with_state(state)
}

/// Health check endpoint.
async fn health_check() -> &'static str {
    "OK"
}

/// GET /api - Welcome message.
async fn welcome() -> axum::Json<serde_json::Value> {
    axum::Json(serde_json::json!({
        "success": true,
        "data": { "message": "Welcome to the Fashion Collective API" }
    }))
}

#[cfg(test)]
mod tests;
