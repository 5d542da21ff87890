use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::FromRow;
use uuid::Uuid;

use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum DistributionStatus {
    Open,
    Closed,
}

impl DistributionStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            DistributionStatus::Open => "open",
            DistributionStatus::Closed => "closed",
        }
    }
}

impl std::fmt::Display for DistributionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Who a distribution is addressed to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TargetScope {
    #[default]
    All,
    Class { class_name: String },
    Students { student_ids: Vec<String> },
}

impl TargetScope {
    /// Class membership lives in the student roster, so class-scoped
    /// distributions admit any respondent here.
    pub fn admits(&self, student_id: Option<&str>) -> bool {
        match self {
            TargetScope::All | TargetScope::Class { .. } => true,
            TargetScope::Students { student_ids } => {
                student_id.is_some_and(|id| student_ids.iter().any(|s| s == id))
            }
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Distribution {
    pub id: Uuid,
    pub template_id: Uuid,
    pub title: Option<String>,
    pub access_token: String,
    pub target_scope: Json<TargetScope>,
    pub allow_anonymous: bool,
    pub opens_at: DateTime<Utc>,
    pub closes_at: Option<DateTime<Utc>>,
    pub status: DistributionStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Distribution {
    pub fn is_accepting(&self, now: DateTime<Utc>) -> bool {
        self.ensure_accepting(now).is_ok()
    }

    pub fn ensure_accepting(&self, now: DateTime<Utc>) -> Result<()> {
        if self.status == DistributionStatus::Closed {
            return Err(Error::InvalidState("distribution closed".to_string()));
        }
        if now < self.opens_at {
            return Err(Error::InvalidState("distribution not yet open".to_string()));
        }
        if self.closes_at.is_some_and(|closes_at| now >= closes_at) {
            return Err(Error::InvalidState("distribution closed".to_string()));
        }
        Ok(())
    }

    pub fn share_path(&self) -> String {
        format!("/api/public/surveys/{}", self.access_token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn distribution(status: DistributionStatus) -> Distribution {
        let now = Utc::now();
        Distribution {
            id: Uuid::new_v4(),
            template_id: Uuid::new_v4(),
            title: None,
            access_token: "tok".into(),
            target_scope: Json(TargetScope::All),
            allow_anonymous: true,
            opens_at: now - Duration::hours(1),
            closes_at: Some(now + Duration::hours(1)),
            status,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn accepts_only_inside_window_while_open() {
        let now = Utc::now();
        let open = distribution(DistributionStatus::Open);
        assert!(open.is_accepting(now));
        assert!(!open.is_accepting(now - Duration::hours(2)));
        assert!(!open.is_accepting(now + Duration::hours(2)));
        assert!(!distribution(DistributionStatus::Closed).is_accepting(now));
    }

    #[test]
    fn student_scope_requires_listed_student() {
        let scope = TargetScope::Students {
            student_ids: vec!["s-1".into(), "s-2".into()],
        };
        assert!(scope.admits(Some("s-2")));
        assert!(!scope.admits(Some("s-3")));
        assert!(!scope.admits(None));
        assert!(TargetScope::All.admits(None));
    }
}
