use axum::{
    extract::{rejection::QueryRejection, Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json},
};
use uuid::Uuid;
use validator::Validate;

use crate::{
    dto::distribution_dto::{
        CreateDistributionPayload, DistributionListQuery, DistributionListResponse,
        DistributionResponse,
    },
    dto::response_dto::{ResponseListResponse, SubmitResponsePayload, SummaryQuery},
    error::Result,
    AppState,
};

#[utoipa::path(
    post,
    path = "/api/templates/{id}/distributions",
    params(
        ("id" = Uuid, Path, description = "Template ID")
    ),
    request_body = CreateDistributionPayload,
    responses(
        (status = 201, description = "Distribution opened with a fresh access link", body = Json<DistributionResponse>),
        (status = 404, description = "Template not found"),
        (status = 409, description = "Template is not active"),
        (status = 422, description = "Invalid window or audience")
    )
)]
#[axum::debug_handler]
pub async fn create_distribution(
    State(state): State<AppState>,
    Path(template_id): Path<Uuid>,
    Json(payload): Json<CreateDistributionPayload>,
) -> Result<impl IntoResponse> {
    payload.validate()?;
    let distribution = state
        .distribution_service
        .create(template_id, payload)
        .await?;
    Ok((
        StatusCode::CREATED,
        Json(DistributionResponse::from(distribution)),
    ))
}

#[axum::debug_handler]
pub async fn list_template_distributions(
    State(state): State<AppState>,
    Path(template_id): Path<Uuid>,
) -> Result<impl IntoResponse> {
    state.template_service.get(template_id).await?;
    let items = state
        .distribution_service
        .list(DistributionListQuery {
            template_id: Some(template_id),
            status: None,
        })
        .await?;
    Ok(Json(DistributionListResponse {
        items: items.into_iter().map(Into::into).collect(),
    }))
}

#[utoipa::path(
    get,
    path = "/api/distributions",
    params(
        ("template_id" = Option<Uuid>, Query, description = "Only distributions of this template"),
        ("status" = Option<String>, Query, description = "open or closed")
    ),
    responses(
        (status = 200, description = "Matching distributions, newest first", body = Json<DistributionListResponse>)
    )
)]
#[axum::debug_handler]
pub async fn list_distributions(
    State(state): State<AppState>,
    query: std::result::Result<Query<DistributionListQuery>, QueryRejection>,
) -> Result<impl IntoResponse> {
    let Query(query) = query?;
    let items = state.distribution_service.list(query).await?;
    Ok(Json(DistributionListResponse {
        items: items.into_iter().map(Into::into).collect(),
    }))
}

#[utoipa::path(
    get,
    path = "/api/distributions/{id}",
    params(
        ("id" = Uuid, Path, description = "Distribution ID")
    ),
    responses(
        (status = 200, description = "Distribution found", body = Json<DistributionResponse>),
        (status = 404, description = "Distribution not found")
    )
)]
#[axum::debug_handler]
pub async fn get_distribution(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse> {
    let distribution = state.distribution_service.get(id).await?;
    Ok(Json(DistributionResponse::from(distribution)))
}

#[utoipa::path(
    post,
    path = "/api/distributions/{id}/close",
    params(
        ("id" = Uuid, Path, description = "Distribution ID")
    ),
    responses(
        (status = 200, description = "Distribution closed (idempotent)", body = Json<DistributionResponse>),
        (status = 404, description = "Distribution not found")
    )
)]
#[axum::debug_handler]
pub async fn close_distribution(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse> {
    let distribution = state.distribution_service.close(id).await?;
    Ok(Json(DistributionResponse::from(distribution)))
}

#[axum::debug_handler]
pub async fn list_responses(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse> {
    let items = state.response_service.list(id).await?;
    let total = items.len();
    Ok(Json(ResponseListResponse { items, total }))
}

/// Counselor-entered response, e.g. transcribed from a paper form.
#[utoipa::path(
    post,
    path = "/api/distributions/{id}/responses",
    params(
        ("id" = Uuid, Path, description = "Distribution ID")
    ),
    request_body = SubmitResponsePayload,
    responses(
        (status = 201, description = "Response stored"),
        (status = 404, description = "Distribution not found"),
        (status = 409, description = "Distribution not accepting, or student already responded"),
        (status = 422, description = "Answers rejected")
    )
)]
#[axum::debug_handler]
pub async fn submit_response(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<SubmitResponsePayload>,
) -> Result<impl IntoResponse> {
    payload.validate()?;
    let response = state.response_service.submit(id, payload).await?;
    Ok((StatusCode::CREATED, Json(response)))
}

#[axum::debug_handler]
pub async fn get_summary(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    query: std::result::Result<Query<SummaryQuery>, QueryRejection>,
) -> Result<impl IntoResponse> {
    let Query(query) = query?;
    let summary = if query.refresh.unwrap_or(false) {
        state.analytics_service.summarize_fresh(id).await?
    } else {
        state.analytics_service.summarize(id).await?
    };
    Ok(Json(summary))
}
