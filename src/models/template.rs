use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::models::question::Question;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum TemplateStatus {
    Draft,
    Active,
    Closed,
}

impl TemplateStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            TemplateStatus::Draft => "draft",
            TemplateStatus::Active => "active",
            TemplateStatus::Closed => "closed",
        }
    }

    /// Templates only move forward: draft → active → closed, or straight from
    /// draft to closed.
    pub fn can_become(self, next: TemplateStatus) -> bool {
        use TemplateStatus::*;
        matches!(
            (self, next),
            (Draft, Active) | (Draft, Closed) | (Active, Closed)
        ) || self == next
    }
}

impl std::fmt::Display for TemplateStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Template {
    pub id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub status: TemplateStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct TemplateListItem {
    pub id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub status: TemplateStatus,
    pub question_count: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A template together with its questions in declared order.
#[derive(Debug, Clone)]
pub struct TemplateDetail {
    pub template: Template,
    pub questions: Vec<Question>,
}

impl TemplateDetail {
    pub fn question_ids(&self) -> Vec<Uuid> {
        self.questions.iter().map(|q| q.id).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::TemplateStatus::*;

    #[test]
    fn lifecycle_only_moves_forward() {
        assert!(Draft.can_become(Active));
        assert!(Draft.can_become(Closed));
        assert!(Active.can_become(Closed));
        assert!(Active.can_become(Active));
        assert!(!Active.can_become(Draft));
        assert!(!Closed.can_become(Active));
        assert!(!Closed.can_become(Draft));
    }
}
