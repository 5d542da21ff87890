use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json},
};
use validator::Validate;

use crate::dto::public_dto::{GetSurveyByTokenResponse, PublicDistributionSummary, PublicSurveySummary};
use crate::dto::response_dto::{SubmitAcceptedResponse, SubmitResponsePayload};
use crate::error::{Error, Result};
use crate::utils::token::looks_like_access_token;
use crate::AppState;

/// Malformed tokens are answered exactly like unknown ones.
fn checked_token(token: &str) -> Result<&str> {
    if looks_like_access_token(token) {
        Ok(token)
    } else {
        Err(Error::NotFound("No survey matches this link".to_string()))
    }
}

#[utoipa::path(
    get,
    path = "/api/public/surveys/{token}",
    params(
        ("token" = String, Path, description = "Access token from the survey link")
    ),
    responses(
        (status = 200, description = "Survey questions and whether it accepts responses", body = Json<GetSurveyByTokenResponse>),
        (status = 404, description = "No survey matches this link")
    )
)]
#[axum::debug_handler]
pub async fn get_survey_by_token(
    State(state): State<AppState>,
    Path(token): Path<String>,
) -> Result<impl IntoResponse> {
    let distribution = state
        .distribution_service
        .resolve_by_link(checked_token(&token)?)
        .await?;
    let detail = state
        .template_service
        .get_detail(distribution.template_id)
        .await?;

    let questions: Vec<_> = detail.questions.into_iter().map(Into::into).collect();
    let response = GetSurveyByTokenResponse {
        distribution: PublicDistributionSummary::from(&distribution),
        survey: PublicSurveySummary {
            title: distribution
                .title
                .clone()
                .unwrap_or_else(|| detail.template.title.clone()),
            description: detail.template.description,
            total_questions: questions.len(),
            questions,
        },
    };
    Ok(Json(response))
}

#[utoipa::path(
    post,
    path = "/api/public/surveys/{token}/responses",
    params(
        ("token" = String, Path, description = "Access token from the survey link")
    ),
    request_body = SubmitResponsePayload,
    responses(
        (status = 201, description = "Response recorded", body = Json<SubmitAcceptedResponse>),
        (status = 404, description = "No survey matches this link"),
        (status = 409, description = "Survey closed, not yet open, or already answered by this student"),
        (status = 422, description = "Answers rejected")
    )
)]
#[axum::debug_handler]
pub async fn submit_by_token(
    State(state): State<AppState>,
    Path(token): Path<String>,
    Json(payload): Json<SubmitResponsePayload>,
) -> Result<impl IntoResponse> {
    payload.validate()?;
    let response = state
        .response_service
        .submit_by_token(checked_token(&token)?, payload)
        .await?;
    Ok((
        StatusCode::CREATED,
        Json(SubmitAcceptedResponse {
            response_id: response.id,
            submitted_at: response.submitted_at,
            message: "Thank you, your answers were recorded".to_string(),
        }),
    ))
}
