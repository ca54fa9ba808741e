use axum::{
    routing::{get, post, put},
    Router,
};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, limit::RequestBodyLimitLayer, trace::TraceLayer};

use crate::handlers::{self, AppState};
use crate::openapi::{self, OPENAPI_JSON_PATH};

/// Request size limit: 5MB max payload.
pub const MAX_BODY_BYTES: usize = 5 * 1024 * 1024;

/// Documentation and `/api/v1` routes.
///
/// Rate limiting is layered on by the caller so the router can also be driven
/// directly in tests.
pub fn api_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/docs", get(openapi::serve_swagger_ui))
        .route(OPENAPI_JSON_PATH, get(openapi::serve_openapi_spec))
        .route("/api/v1/contacts", post(handlers::create_contact))
        .route("/api/v1/contacts/import", post(handlers::import_contacts))
        .route(
            "/api/v1/contacts/:id",
            get(handlers::get_contact)
                .patch(handlers::update_contact)
                .delete(handlers::delete_contact),
        )
        .route("/api/v1/contacts/:id/tags", put(handlers::replace_tags))
        .route("/api/v1/contacts/:id/enrich", post(handlers::enrich_contact))
        .route(
            "/api/v1/contacts/:id/suggestions",
            get(handlers::get_suggestions),
        )
        .route("/api/v1/enrichment/queue", get(handlers::enrichment_queue))
        .layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES))
}

/// Final app: health check (outside `api`'s layers), tracing and CORS.
pub fn app(state: Arc<AppState>, api: Router<Arc<AppState>>) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .merge(api)
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}
