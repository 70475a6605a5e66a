use axum::http::Method;
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::routes;
use crate::state::AppState;

/// Builds the full router: routes, then tracing + permissive CORS layered on
/// top, same ordering as the monorepo's `build_app`.
pub fn build_app(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(tower_http::cors::Any)
        .allow_methods([Method::GET, Method::POST, Method::DELETE])
        .allow_headers(tower_http::cors::Any);

    routes::router(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}
