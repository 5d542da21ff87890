use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use sqlx::types::Json;
use sqlx::FromRow;
use uuid::Uuid;

/// Typed reading of a raw answer value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AnswerValue {
    Number(f64),
    Text(String),
    Selections(Vec<String>),
}

impl AnswerValue {
    /// `Ok(None)` for a JSON null, `Err` for shapes no question type accepts.
    pub fn parse(raw: &JsonValue) -> std::result::Result<Option<Self>, String> {
        if raw.is_null() {
            return Ok(None);
        }
        serde_json::from_value(raw.clone())
            .map(Some)
            .map_err(|_| "answer must be text, a number or a list of options".to_string())
    }

    pub fn is_empty(&self) -> bool {
        match self {
            AnswerValue::Number(n) => !n.is_finite(),
            AnswerValue::Text(text) => text.trim().is_empty(),
            AnswerValue::Selections(items) => items.is_empty(),
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        let number = match self {
            AnswerValue::Number(n) => *n,
            AnswerValue::Text(text) => text.trim().parse::<f64>().ok()?,
            AnswerValue::Selections(_) => return None,
        };
        number.is_finite().then_some(number)
    }

    /// A single text value counts as one selection.
    pub fn selections(&self) -> Option<Vec<String>> {
        match self {
            AnswerValue::Selections(items) => Some(items.clone()),
            AnswerValue::Text(text) => Some(vec![text.clone()]),
            AnswerValue::Number(_) => None,
        }
    }

    pub fn display(&self) -> String {
        match self {
            AnswerValue::Number(n) => n.to_string(),
            AnswerValue::Text(text) => text.clone(),
            AnswerValue::Selections(items) => items.join(", "),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Answer {
    pub question_id: Uuid,
    pub value: JsonValue,
}

impl Answer {
    /// `None` when the stored value is empty or no longer readable.
    pub fn parsed(&self) -> Option<AnswerValue> {
        AnswerValue::parse(&self.value)
            .ok()
            .flatten()
            .filter(|v| !v.is_empty())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SurveyResponse {
    pub id: Uuid,
    pub distribution_id: Uuid,
    pub student_id: Option<String>,
    pub submitted_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub answers: Vec<Answer>,
}

#[derive(Debug, Clone, FromRow)]
pub struct ResponseRow {
    pub id: Uuid,
    pub distribution_id: Uuid,
    pub student_id: Option<String>,
    pub submitted_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow)]
pub struct AnswerRow {
    pub response_id: Uuid,
    pub question_id: Uuid,
    pub value: Json<JsonValue>,
}

impl ResponseRow {
    pub fn with_answers(self, answers: Vec<Answer>) -> SurveyResponse {
        SurveyResponse {
            id: self.id,
            distribution_id: self.distribution_id,
            student_id: self.student_id,
            submitted_at: self.submitted_at,
            updated_at: self.updated_at,
            answers,
        }
    }
}
