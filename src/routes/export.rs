use axum::{
    extract::{Path, State},
    http::{header, StatusCode},
    response::IntoResponse,
};
use uuid::Uuid;

use crate::services::export_service::ExportService;
use crate::{error::Result, AppState};

/// Export every response of a distribution as XLSX
#[axum::debug_handler]
pub async fn export_responses(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse> {
    let distribution = state.distribution_service.get(id).await?;
    let detail = state
        .template_service
        .get_detail(distribution.template_id)
        .await?;
    let responses = state.response_service.list(id).await?;

    let buffer = ExportService::generate_responses_xlsx(
        &detail.template,
        &distribution,
        &detail.questions,
        &responses,
    )?;
    tracing::info!(distribution_id = %id, responses = responses.len(), "responses exported");

    let filename = format!(
        "survey_{}_{}.xlsx",
        id.simple(),
        chrono::Utc::now().format("%Y%m%d_%H%M")
    );
    let disposition = format!("attachment; filename=\"{}\"", filename);

    Ok((
        StatusCode::OK,
        [
            (
                header::CONTENT_TYPE,
                "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet".to_string(),
            ),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        buffer,
    ))
}
