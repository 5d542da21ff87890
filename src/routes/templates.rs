use axum::{
    extract::{rejection::QueryRejection, Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json},
};
use uuid::Uuid;
use validator::Validate;

use crate::{
    dto::template_dto::{
        CreateTemplatePayload, TemplateListQuery, TemplateListResponse, TemplateResponse,
        UpdateTemplatePayload,
    },
    error::Result,
    AppState,
};

#[utoipa::path(
    post,
    path = "/api/templates",
    request_body = CreateTemplatePayload,
    responses(
        (status = 201, description = "Template created as a draft", body = Json<TemplateResponse>),
        (status = 400, description = "Invalid payload"),
        (status = 422, description = "A question definition was rejected")
    )
)]
#[axum::debug_handler]
pub async fn create_template(
    State(state): State<AppState>,
    Json(payload): Json<CreateTemplatePayload>,
) -> Result<impl IntoResponse> {
    payload.validate()?;
    let detail = state.template_service.create(payload).await?;
    Ok((StatusCode::CREATED, Json(TemplateResponse::from(detail))))
}

#[utoipa::path(
    get,
    path = "/api/templates",
    params(
        ("page" = Option<i64>, Query, description = "Page number"),
        ("per_page" = Option<i64>, Query, description = "Items per page"),
        ("status" = Option<String>, Query, description = "draft, active or closed"),
        ("search" = Option<String>, Query, description = "Matches title or description")
    ),
    responses(
        (status = 200, description = "Page of templates", body = Json<TemplateListResponse>)
    )
)]
#[axum::debug_handler]
pub async fn list_templates(
    State(state): State<AppState>,
    query: std::result::Result<Query<TemplateListQuery>, QueryRejection>,
) -> Result<impl IntoResponse> {
    let Query(query) = query?;
    let result = state.template_service.list(query).await?;
    Ok(Json(TemplateListResponse::from(result)))
}

#[utoipa::path(
    get,
    path = "/api/templates/{id}",
    params(
        ("id" = Uuid, Path, description = "Template ID")
    ),
    responses(
        (status = 200, description = "Template with its questions", body = Json<TemplateResponse>),
        (status = 404, description = "Template not found")
    )
)]
#[axum::debug_handler]
pub async fn get_template(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse> {
    let detail = state.template_service.get_detail(id).await?;
    Ok(Json(TemplateResponse::from(detail)))
}

#[utoipa::path(
    patch,
    path = "/api/templates/{id}",
    params(
        ("id" = Uuid, Path, description = "Template ID")
    ),
    request_body = UpdateTemplatePayload,
    responses(
        (status = 200, description = "Template updated", body = Json<TemplateResponse>),
        (status = 404, description = "Template not found"),
        (status = 409, description = "Change not allowed in the current status"),
        (status = 422, description = "A question definition was rejected")
    )
)]
#[axum::debug_handler]
pub async fn update_template(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateTemplatePayload>,
) -> Result<impl IntoResponse> {
    payload.validate()?;
    let detail = state.template_service.update(id, payload).await?;
    Ok(Json(TemplateResponse::from(detail)))
}

#[utoipa::path(
    delete,
    path = "/api/templates/{id}",
    params(
        ("id" = Uuid, Path, description = "Template ID")
    ),
    responses(
        (status = 204, description = "Template deleted"),
        (status = 404, description = "Template not found"),
        (status = 409, description = "Template still has open distributions")
    )
)]
#[axum::debug_handler]
pub async fn delete_template(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse> {
    state.template_service.delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}
