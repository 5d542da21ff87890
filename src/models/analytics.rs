use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::question::QuestionType;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DistributionSummary {
    pub distribution_id: Uuid,
    pub template_id: Uuid,
    pub total_responses: i64,
    pub complete_responses: i64,
    pub completion_rate: f64,
    pub questions: Vec<QuestionSummary>,
    pub computed_at: DateTime<Utc>,
    #[serde(default)]
    pub from_cache: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuestionSummary {
    pub question_id: Uuid,
    pub text: String,
    #[serde(rename = "type")]
    pub question_type: QuestionType,
    pub required: bool,
    /// Responses carrying a usable, non-empty answer to this question.
    pub answered: i64,
    pub stats: QuestionStats,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum QuestionStats {
    Choice {
        options: Vec<OptionCount>,
    },
    Scale {
        count: i64,
        min: Option<f64>,
        max: Option<f64>,
        mean: Option<f64>,
    },
    Text {
        non_empty: i64,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptionCount {
    pub option: String,
    pub count: i64,
}
