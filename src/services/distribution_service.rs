use std::sync::Arc;

use chrono::{DateTime, Utc};
use sqlx::types::Json;
use uuid::Uuid;

use crate::database::pool::DbPool;
use crate::dto::distribution_dto::{CreateDistributionPayload, DistributionListQuery};
use crate::error::{is_unique_violation, Error, Result, Violation};
use crate::models::distribution::{Distribution, DistributionStatus, TargetScope};
use crate::models::template::TemplateStatus;
use crate::services::question_service::find_template;
use crate::utils::time::now;
use crate::utils::token::generate_access_token;

const DISTRIBUTION_COLUMNS: &str = "id, template_id, title, access_token, target_scope, allow_anonymous, opens_at, closes_at, status, created_at, updated_at";

/// Attempts before a create gives up on finding an unused access token.
const MAX_TOKEN_ATTEMPTS: usize = 5;

#[cfg_attr(test, mockall::automock)]
pub trait TokenSource: Send + Sync {
    fn generate(&self) -> String;
}

pub struct RandomTokenSource {
    length: usize,
}

impl RandomTokenSource {
    pub fn new(length: usize) -> Self {
        Self { length }
    }
}

impl TokenSource for RandomTokenSource {
    fn generate(&self) -> String {
        generate_access_token(self.length)
    }
}

#[derive(Clone)]
pub struct DistributionService {
    pool: DbPool,
    tokens: Arc<dyn TokenSource>,
}

impl DistributionService {
    pub fn new(pool: DbPool, token_length: usize) -> Self {
        Self::with_token_source(pool, Arc::new(RandomTokenSource::new(token_length)))
    }

    pub fn with_token_source(pool: DbPool, tokens: Arc<dyn TokenSource>) -> Self {
        Self { pool, tokens }
    }

    pub async fn create(
        &self,
        template_id: Uuid,
        payload: CreateDistributionPayload,
    ) -> Result<Distribution> {
        let mut conn = self.pool.acquire().await?;
        let template = find_template(&mut conn, template_id).await?;
        drop(conn);

        if template.status != TemplateStatus::Active {
            return Err(Error::InvalidState(format!(
                "template {} is {}; only active templates can be distributed",
                template_id, template.status
            )));
        }

        let stamp = now();
        let opens_at = payload.opens_at.unwrap_or(stamp);
        let mut issues = Vec::new();
        if payload.closes_at.is_some_and(|closes_at| closes_at <= opens_at) {
            issues.push(Violation::new("closes_at", "closes_at must be after opens_at"));
        }
        match &payload.scope {
            TargetScope::Class { class_name } if class_name.trim().is_empty() => {
                issues.push(Violation::new("scope.class_name", "class name is required"));
            }
            TargetScope::Students { student_ids } if student_ids.is_empty() => {
                issues.push(Violation::new("scope.student_ids", "at least one student is required"));
            }
            _ => {}
        }
        if !issues.is_empty() {
            return Err(Error::Rejected(issues));
        }

        for attempt in 1..=MAX_TOKEN_ATTEMPTS {
            let token = self.tokens.generate();
            let inserted = sqlx::query_as::<_, Distribution>(&format!(
                "INSERT INTO distributions (id, template_id, title, access_token, target_scope, allow_anonymous, opens_at, closes_at, status, created_at, updated_at)
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                 RETURNING {DISTRIBUTION_COLUMNS}"
            ))
            .bind(Uuid::new_v4())
            .bind(template_id)
            .bind(payload.title.as_deref())
            .bind(&token)
            .bind(Json(&payload.scope))
            .bind(payload.allow_anonymous)
            .bind(opens_at)
            .bind(payload.closes_at)
            .bind(DistributionStatus::Open)
            .bind(stamp)
            .bind(stamp)
            .fetch_one(&self.pool)
            .await;

            match inserted {
                Ok(distribution) => {
                    tracing::info!(
                        distribution_id = %distribution.id,
                        template_id = %template_id,
                        "distribution created"
                    );
                    return Ok(distribution);
                }
                Err(err) if is_unique_violation(&err) => {
                    tracing::warn!(attempt, "access token collision, regenerating");
                }
                Err(err) => return Err(err.into()),
            }
        }

        Err(Error::Internal(format!(
            "could not allocate a unique access token after {} attempts",
            MAX_TOKEN_ATTEMPTS
        )))
    }

    pub async fn get(&self, id: Uuid) -> Result<Distribution> {
        sqlx::query_as::<_, Distribution>(&format!(
            "SELECT {DISTRIBUTION_COLUMNS} FROM distributions WHERE id = ?"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| Error::NotFound(format!("Distribution {} not found", id)))
    }

    pub async fn list(&self, query: DistributionListQuery) -> Result<Vec<Distribution>> {
        let mut filters = Vec::new();
        if query.template_id.is_some() {
            filters.push("template_id = ?");
        }
        if query.status.is_some() {
            filters.push("status = ?");
        }
        let where_clause = if filters.is_empty() {
            "".to_string()
        } else {
            format!("WHERE {}", filters.join(" AND "))
        };

        let sql = format!(
            "SELECT {DISTRIBUTION_COLUMNS} FROM distributions {where_clause} ORDER BY created_at DESC"
        );
        let mut statement = sqlx::query_as::<_, Distribution>(&sql);
        if let Some(template_id) = query.template_id {
            statement = statement.bind(template_id);
        }
        if let Some(status) = query.status {
            statement = statement.bind(status);
        }
        Ok(statement.fetch_all(&self.pool).await?)
    }

    pub async fn resolve_by_link(&self, token: &str) -> Result<Distribution> {
        sqlx::query_as::<_, Distribution>(&format!(
            "SELECT {DISTRIBUTION_COLUMNS} FROM distributions WHERE access_token = ?"
        ))
        .bind(token)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| Error::NotFound("No survey matches this link".to_string()))
    }

    /// Closing an already closed distribution is a no-op.
    pub async fn close(&self, id: Uuid) -> Result<Distribution> {
        let distribution = self.get(id).await?;
        if distribution.status == DistributionStatus::Closed {
            return Ok(distribution);
        }

        let closed = sqlx::query_as::<_, Distribution>(&format!(
            "UPDATE distributions SET status = ?, updated_at = ? WHERE id = ? RETURNING {DISTRIBUTION_COLUMNS}"
        ))
        .bind(DistributionStatus::Closed)
        .bind(now())
        .bind(id)
        .fetch_one(&self.pool)
        .await?;

        tracing::info!(distribution_id = %id, "distribution closed");
        Ok(closed)
    }

    /// Closes every open distribution whose window ended before `at`.
    pub async fn close_expired(&self, at: DateTime<Utc>) -> Result<u64> {
        let open = self
            .list(DistributionListQuery {
                template_id: None,
                status: Some(DistributionStatus::Open),
            })
            .await?;

        let mut closed = 0;
        for distribution in open
            .into_iter()
            .filter(|d| d.closes_at.is_some_and(|closes_at| closes_at <= at))
        {
            self.close(distribution.id).await?;
            closed += 1;
        }
        if closed > 0 {
            tracing::info!(closed, "expired distributions closed");
        }
        Ok(closed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::pool::{connect, run_migrations};
    use crate::dto::template_dto::{CreateTemplatePayload, UpdateTemplatePayload};
    use crate::models::question::{NewQuestion, QuestionKind, TextRules};
    use crate::services::template_service::TemplateService;

    async fn active_template(pool: &DbPool) -> Uuid {
        let templates = TemplateService::new(pool.clone());
        let created = templates
            .create(CreateTemplatePayload {
                title: "Wellbeing check-in".into(),
                description: None,
                questions: vec![NewQuestion {
                    text: "How was your week?".into(),
                    required: false,
                    kind: QuestionKind::FreeText {
                        validation: TextRules::default(),
                    },
                }],
            })
            .await
            .unwrap();
        templates
            .update(
                created.template.id,
                UpdateTemplatePayload {
                    status: Some(TemplateStatus::Active),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        created.template.id
    }

    async fn pool() -> DbPool {
        let pool = connect("sqlite::memory:", 1).await.unwrap();
        run_migrations(&pool).await.unwrap();
        pool
    }

    #[tokio::test]
    async fn token_collision_is_retried_with_a_fresh_token() {
        let pool = pool().await;
        let template_id = active_template(&pool).await;

        let mut first = MockTokenSource::new();
        first
            .expect_generate()
            .times(1)
            .returning(|| "AAAAAAAAAAAAAAAAAAAAAAAA".to_string());
        let first = DistributionService::with_token_source(pool.clone(), Arc::new(first));
        first
            .create(template_id, CreateDistributionPayload::default())
            .await
            .unwrap();

        let mut seq = mockall::Sequence::new();
        let mut colliding = MockTokenSource::new();
        colliding
            .expect_generate()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|| "AAAAAAAAAAAAAAAAAAAAAAAA".to_string());
        colliding
            .expect_generate()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|| "BBBBBBBBBBBBBBBBBBBBBBBB".to_string());
        let service = DistributionService::with_token_source(pool.clone(), Arc::new(colliding));

        let second = service
            .create(template_id, CreateDistributionPayload::default())
            .await
            .unwrap();
        assert_eq!(second.access_token, "BBBBBBBBBBBBBBBBBBBBBBBB");
    }

    #[tokio::test]
    async fn persistent_collisions_surface_as_internal_error() {
        let pool = pool().await;
        let template_id = active_template(&pool).await;

        let mut stuck = MockTokenSource::new();
        stuck
            .expect_generate()
            .returning(|| "CCCCCCCCCCCCCCCCCCCCCCCC".to_string());
        let service = DistributionService::with_token_source(pool.clone(), Arc::new(stuck));
        service
            .create(template_id, CreateDistributionPayload::default())
            .await
            .unwrap();

        let err = service
            .create(template_id, CreateDistributionPayload::default())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Internal(_)));
    }

    #[tokio::test]
    async fn close_expired_only_touches_lapsed_windows() {
        let pool = pool().await;
        let template_id = active_template(&pool).await;
        let service = DistributionService::new(pool.clone(), 32);
        let start = now();

        let lapsing = service
            .create(
                template_id,
                CreateDistributionPayload {
                    opens_at: Some(start - chrono::Duration::hours(2)),
                    closes_at: Some(start + chrono::Duration::minutes(5)),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        let open_ended = service
            .create(template_id, CreateDistributionPayload::default())
            .await
            .unwrap();

        let closed = service
            .close_expired(start + chrono::Duration::minutes(10))
            .await
            .unwrap();
        assert_eq!(closed, 1);
        assert_eq!(
            service.get(lapsing.id).await.unwrap().status,
            DistributionStatus::Closed
        );
        assert_eq!(
            service.get(open_ended.id).await.unwrap().status,
            DistributionStatus::Open
        );
    }
}
