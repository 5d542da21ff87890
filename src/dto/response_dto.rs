use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use uuid::Uuid;
use validator::Validate;

use crate::models::response::SurveyResponse;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnswerInput {
    pub question_id: Uuid,
    #[serde(default)]
    pub value: JsonValue,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct SubmitResponsePayload {
    #[validate(length(max = 100))]
    pub student_id: Option<String>,
    #[serde(default)]
    pub answers: Vec<AnswerInput>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateResponsePayload {
    #[serde(default)]
    pub answers: Vec<AnswerInput>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResponseListResponse {
    pub items: Vec<SurveyResponse>,
    pub total: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmitAcceptedResponse {
    pub response_id: Uuid,
    pub submitted_at: DateTime<Utc>,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct SummaryQuery {
    pub refresh: Option<bool>,
}
