pub mod api;

use axum::{http::{HeaderValue, Method}, routing::get, Router};
use std::sync::Arc;
use tower_http::{cors::{AllowOrigin, Any, CorsLayer}, trace::TraceLayer};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::{config::Config, docs::ApiDoc, handlers::{banner, health_check, not_found}, websocket::websocket_handler, ws::AppState};
use api::create_api_routes;

/// Build the full application router
pub fn create_app(state: Arc<AppState>, config: &Config) -> Router {
    Router::new()
        .route("/", get(banner))
        .route("/health", get(health_check))
        .route("/ws", get(websocket_handler))
        // Mount API routes
        .nest("/api", create_api_routes())
        .fallback(not_found)
        .with_state(state)
        // Mount Swagger UI
        .merge(SwaggerUi::new("/swagger").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .layer(cors_layer(config))
        // Add tracing layer
        .layer(TraceLayer::new_for_http())
}

fn cors_layer(config: &Config) -> CorsLayer {
    let origins = config.cors_origin_list();
    let allow_origin = if origins.is_empty() {
        AllowOrigin::from(Any)
    } else {
        AllowOrigin::list(origins.iter().filter_map(|o| o.parse::<HeaderValue>().ok()))
    };

    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([Method::GET, Method::POST])
}
