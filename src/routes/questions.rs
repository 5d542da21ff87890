use axum::{
    extract::{rejection::QueryRejection, Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json},
};
use uuid::Uuid;

use crate::{
    dto::template_dto::{EmptyQuestionQuery, ReorderQuestionsPayload},
    error::Result,
    models::question::{create_empty_question, NewQuestion},
    AppState,
};

#[axum::debug_handler]
pub async fn list_questions(
    State(state): State<AppState>,
    Path(template_id): Path<Uuid>,
) -> Result<impl IntoResponse> {
    let questions = state.question_service.list(template_id).await?;
    Ok(Json(questions))
}

#[utoipa::path(
    post,
    path = "/api/templates/{id}/questions",
    params(
        ("id" = Uuid, Path, description = "Template ID")
    ),
    request_body = NewQuestion,
    responses(
        (status = 201, description = "Question appended to the template"),
        (status = 404, description = "Template not found"),
        (status = 409, description = "Template is no longer a draft"),
        (status = 422, description = "Question definition rejected")
    )
)]
#[axum::debug_handler]
pub async fn add_question(
    State(state): State<AppState>,
    Path(template_id): Path<Uuid>,
    Json(payload): Json<NewQuestion>,
) -> Result<impl IntoResponse> {
    let question = state.question_service.create(template_id, payload).await?;
    Ok((StatusCode::CREATED, Json(question)))
}

#[utoipa::path(
    put,
    path = "/api/templates/{id}/questions/order",
    params(
        ("id" = Uuid, Path, description = "Template ID")
    ),
    request_body = ReorderQuestionsPayload,
    responses(
        (status = 200, description = "Questions in their new order"),
        (status = 409, description = "Template is no longer a draft"),
        (status = 422, description = "Not a permutation of the template's questions")
    )
)]
#[axum::debug_handler]
pub async fn reorder_questions(
    State(state): State<AppState>,
    Path(template_id): Path<Uuid>,
    Json(payload): Json<ReorderQuestionsPayload>,
) -> Result<impl IntoResponse> {
    let questions = state
        .question_service
        .reorder(template_id, &payload.question_ids)
        .await?;
    Ok(Json(questions))
}

/// Blank definition the editor starts from.
#[axum::debug_handler]
pub async fn empty_question(
    query: std::result::Result<Query<EmptyQuestionQuery>, QueryRejection>,
) -> Result<Json<NewQuestion>> {
    let Query(query) = query?;
    Ok(Json(create_empty_question(query.question_type)))
}

#[axum::debug_handler]
pub async fn get_question(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse> {
    let question = state.question_service.get(id).await?;
    Ok(Json(question))
}

#[axum::debug_handler]
pub async fn update_question(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<NewQuestion>,
) -> Result<impl IntoResponse> {
    let question = state.question_service.update(id, payload).await?;
    Ok(Json(question))
}

#[utoipa::path(
    delete,
    path = "/api/questions/{id}",
    params(
        ("id" = Uuid, Path, description = "Question ID")
    ),
    responses(
        (status = 204, description = "Question removed and positions compacted"),
        (status = 404, description = "Question not found"),
        (status = 409, description = "Template is no longer a draft")
    )
)]
#[axum::debug_handler]
pub async fn delete_question(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse> {
    state.question_service.delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}
