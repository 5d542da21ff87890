use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::distribution::{Distribution, DistributionStatus};
use crate::models::question::{Question, QuestionKind};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublicDistributionSummary {
    pub id: Uuid,
    pub title: Option<String>,
    pub status: DistributionStatus,
    pub accepting: bool,
    pub allow_anonymous: bool,
    pub opens_at: DateTime<Utc>,
    pub closes_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublicQuestion {
    pub id: Uuid,
    pub position: i64,
    pub text: String,
    pub required: bool,
    #[serde(flatten)]
    pub kind: QuestionKind,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublicSurveySummary {
    pub title: String,
    pub description: Option<String>,
    pub total_questions: usize,
    pub questions: Vec<PublicQuestion>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GetSurveyByTokenResponse {
    pub distribution: PublicDistributionSummary,
    pub survey: PublicSurveySummary,
}

impl From<&Distribution> for PublicDistributionSummary {
    fn from(value: &Distribution) -> Self {
        Self {
            id: value.id,
            title: value.title.clone(),
            status: value.status,
            accepting: value.is_accepting(Utc::now()),
            allow_anonymous: value.allow_anonymous,
            opens_at: value.opens_at,
            closes_at: value.closes_at,
        }
    }
}

impl From<Question> for PublicQuestion {
    fn from(value: Question) -> Self {
        Self {
            id: value.id,
            position: value.position,
            text: value.text,
            required: value.required,
            kind: value.kind,
        }
    }
}
