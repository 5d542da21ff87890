use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::models::question::{NewQuestion, Question, QuestionType};
use crate::models::template::{TemplateDetail, TemplateListItem, TemplateStatus};
use crate::services::template_service::TemplateList;

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CreateTemplatePayload {
    #[validate(length(min = 1, max = 200))]
    pub title: String,
    #[validate(length(max = 2000))]
    pub description: Option<String>,
    #[serde(default)]
    pub questions: Vec<NewQuestion>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct UpdateTemplatePayload {
    #[validate(length(min = 1, max = 200))]
    pub title: Option<String>,
    #[validate(length(max = 2000))]
    pub description: Option<String>,
    pub status: Option<TemplateStatus>,
    /// Replaces the whole question set. Only allowed while the template is a draft.
    pub questions: Option<Vec<NewQuestion>>,
}

impl UpdateTemplatePayload {
    pub fn touches_structure(&self) -> bool {
        self.questions.is_some()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct TemplateListQuery {
    pub page: Option<i64>,
    pub per_page: Option<i64>,
    pub status: Option<TemplateStatus>,
    pub search: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReorderQuestionsPayload {
    pub question_ids: Vec<Uuid>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmptyQuestionQuery {
    #[serde(rename = "type")]
    pub question_type: QuestionType,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TemplateResponse {
    pub id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub status: TemplateStatus,
    pub question_ids: Vec<Uuid>,
    pub questions: Vec<Question>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TemplateListResponse {
    pub items: Vec<TemplateListItem>,
    pub total: i64,
    pub page: i64,
    pub per_page: i64,
    pub total_pages: i64,
}

impl From<TemplateDetail> for TemplateResponse {
    fn from(value: TemplateDetail) -> Self {
        let question_ids = value.question_ids();
        let template = value.template;
        Self {
            id: template.id,
            title: template.title,
            description: template.description,
            status: template.status,
            question_ids,
            questions: value.questions,
            created_at: template.created_at,
            updated_at: template.updated_at,
        }
    }
}

impl From<TemplateList> for TemplateListResponse {
    fn from(value: TemplateList) -> Self {
        Self {
            items: value.items,
            total: value.total,
            page: value.page,
            per_page: value.per_page,
            total_pages: value.total_pages,
        }
    }
}
