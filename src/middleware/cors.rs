use axum::http::header;
use tower_http::cors::{Any, CorsLayer};

/// Survey links are opened from arbitrary origins, and the export download
/// needs its filename header visible to browser clients.
pub fn permissive_cors() -> CorsLayer {
    CorsLayer::new()
        .allow_methods(Any)
        .allow_headers(Any)
        .allow_origin(Any)
        .expose_headers([header::CONTENT_DISPOSITION])
}
