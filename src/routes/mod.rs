pub mod distributions;
pub mod docs;
pub mod export;
pub mod health;
pub mod public;
pub mod questions;
pub mod responses;
pub mod templates;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post, put},
    Router,
};
use tower_http::trace::TraceLayer;

use crate::config::Config;
use crate::middleware::{auth, cors::permissive_cors, rate_limit};
use crate::AppState;

const MAX_BODY_BYTES: usize = 2 * 1024 * 1024;

/// Builds the full HTTP surface: counselor API behind JWT auth, the public
/// survey link endpoints, and the health probe.
pub fn router(state: AppState, config: &Config) -> Router {
    let base_routes = Router::new().route("/health", get(health::health));

    let counselor_api = Router::new()
        .route(
            "/api/templates",
            get(templates::list_templates).post(templates::create_template),
        )
        .route(
            "/api/templates/:id",
            get(templates::get_template)
                .patch(templates::update_template)
                .delete(templates::delete_template),
        )
        .route(
            "/api/templates/:id/questions",
            get(questions::list_questions).post(questions::add_question),
        )
        .route(
            "/api/templates/:id/questions/order",
            put(questions::reorder_questions),
        )
        .route(
            "/api/templates/:id/distributions",
            get(distributions::list_template_distributions)
                .post(distributions::create_distribution),
        )
        .route("/api/questions/empty", get(questions::empty_question))
        .route(
            "/api/questions/:id",
            get(questions::get_question)
                .patch(questions::update_question)
                .delete(questions::delete_question),
        )
        .route("/api/distributions", get(distributions::list_distributions))
        .route("/api/distributions/:id", get(distributions::get_distribution))
        .route(
            "/api/distributions/:id/close",
            post(distributions::close_distribution),
        )
        .route(
            "/api/distributions/:id/responses",
            get(distributions::list_responses).post(distributions::submit_response),
        )
        .route(
            "/api/distributions/:id/summary",
            get(distributions::get_summary),
        )
        .route(
            "/api/distributions/:id/export",
            get(export::export_responses),
        )
        .route(
            "/api/responses/:id",
            get(responses::get_response)
                .put(responses::update_response)
                .delete(responses::delete_response),
        )
        .route("/api/openapi.json", get(docs::openapi))
        .layer(axum::middleware::from_fn_with_state(
            auth::AuthKeys::from_secret(&config.jwt_secret),
            auth::require_counselor,
        ))
        .layer(axum::middleware::from_fn_with_state(
            rate_limit::new_rps_state(config.counselor_rps),
            rate_limit::rps_middleware,
        ));

    let public_api = Router::new()
        .route(
            "/api/public/surveys/:token",
            get(public::get_survey_by_token),
        )
        .route(
            "/api/public/surveys/:token/responses",
            post(public::submit_by_token),
        )
        .layer(axum::middleware::from_fn_with_state(
            rate_limit::new_rps_state(config.public_rps),
            rate_limit::rps_middleware,
        ));

    base_routes
        .merge(counselor_api)
        .merge(public_api)
        .with_state(state)
        .layer(permissive_cors())
        .layer(TraceLayer::new_for_http())
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
}
