use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::models::distribution::{Distribution, DistributionStatus, TargetScope};

fn default_allow_anonymous() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CreateDistributionPayload {
    #[validate(length(min = 1, max = 200))]
    pub title: Option<String>,
    #[serde(default)]
    pub scope: TargetScope,
    #[serde(default = "default_allow_anonymous")]
    pub allow_anonymous: bool,
    pub opens_at: Option<DateTime<Utc>>,
    pub closes_at: Option<DateTime<Utc>>,
}

impl Default for CreateDistributionPayload {
    fn default() -> Self {
        Self {
            title: None,
            scope: TargetScope::All,
            allow_anonymous: true,
            opens_at: None,
            closes_at: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct DistributionListQuery {
    pub template_id: Option<Uuid>,
    pub status: Option<DistributionStatus>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DistributionResponse {
    pub id: Uuid,
    pub template_id: Uuid,
    pub title: Option<String>,
    pub access_token: String,
    pub share_path: String,
    pub scope: TargetScope,
    pub allow_anonymous: bool,
    pub opens_at: DateTime<Utc>,
    pub closes_at: Option<DateTime<Utc>>,
    pub status: DistributionStatus,
    pub accepting: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DistributionListResponse {
    pub items: Vec<DistributionResponse>,
}

impl From<Distribution> for DistributionResponse {
    fn from(value: Distribution) -> Self {
        let accepting = value.is_accepting(Utc::now());
        let share_path = value.share_path();
        Self {
            id: value.id,
            template_id: value.template_id,
            title: value.title,
            access_token: value.access_token,
            share_path,
            scope: value.target_scope.0,
            allow_anonymous: value.allow_anonymous,
            opens_at: value.opens_at,
            closes_at: value.closes_at,
            status: value.status,
            accepting,
            created_at: value.created_at,
            updated_at: value.updated_at,
        }
    }
}
