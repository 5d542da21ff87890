use axum::Json;
use utoipa::OpenApi;

use crate::routes::{distributions, public, questions, responses, templates};

#[derive(OpenApi)]
#[openapi(
    info(title = "Survey backend", description = "Counselor survey templates, distribution links and analytics"),
    paths(
        templates::create_template,
        templates::list_templates,
        templates::get_template,
        templates::update_template,
        templates::delete_template,
        questions::add_question,
        questions::reorder_questions,
        questions::delete_question,
        distributions::create_distribution,
        distributions::list_distributions,
        distributions::get_distribution,
        distributions::close_distribution,
        distributions::submit_response,
        responses::update_response,
        responses::delete_response,
        public::get_survey_by_token,
        public::submit_by_token,
    )
)]
pub struct ApiDoc;

pub async fn openapi() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}
