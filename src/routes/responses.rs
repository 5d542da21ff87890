use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json},
};
use uuid::Uuid;

use crate::{dto::response_dto::UpdateResponsePayload, error::Result, AppState};

#[axum::debug_handler]
pub async fn get_response(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse> {
    let response = state.response_service.get(id).await?;
    Ok(Json(response))
}

#[utoipa::path(
    put,
    path = "/api/responses/{id}",
    params(
        ("id" = Uuid, Path, description = "Response ID")
    ),
    request_body = UpdateResponsePayload,
    responses(
        (status = 200, description = "Answers replaced"),
        (status = 404, description = "Response not found"),
        (status = 409, description = "Distribution no longer accepts responses"),
        (status = 422, description = "Answers rejected")
    )
)]
#[axum::debug_handler]
pub async fn update_response(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateResponsePayload>,
) -> Result<impl IntoResponse> {
    let response = state.response_service.update(id, payload).await?;
    Ok(Json(response))
}

#[utoipa::path(
    delete,
    path = "/api/responses/{id}",
    params(
        ("id" = Uuid, Path, description = "Response ID")
    ),
    responses(
        (status = 204, description = "Response retracted"),
        (status = 404, description = "Response not found")
    )
)]
#[axum::debug_handler]
pub async fn delete_response(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse> {
    state.response_service.delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}
