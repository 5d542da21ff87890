use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use sqlx::SqliteConnection;
use uuid::Uuid;

use crate::database::pool::DbPool;
use crate::error::Result;
use crate::models::analytics::{DistributionSummary, OptionCount, QuestionStats, QuestionSummary};
use crate::models::distribution::Distribution;
use crate::models::question::{Question, QuestionKind};
use crate::models::response::{AnswerValue, SurveyResponse};
use crate::services::distribution_service::DistributionService;
use crate::services::question_service::load_questions;
use crate::services::response_service::fetch_responses;
use crate::utils::time::{expiry_after, now};

/// Summaries are always derived from stored responses. The `analytics_cache`
/// table only saves recomputation and may be dropped at any time.
#[derive(Clone)]
pub struct AnalyticsService {
    pool: DbPool,
    distributions: DistributionService,
    cache_ttl_seconds: i64,
}

impl AnalyticsService {
    pub fn new(pool: DbPool, distributions: DistributionService, cache_ttl_seconds: i64) -> Self {
        Self {
            pool,
            distributions,
            cache_ttl_seconds,
        }
    }

    pub async fn summarize(&self, distribution_id: Uuid) -> Result<DistributionSummary> {
        let distribution = self.distributions.get(distribution_id).await?;
        if let Some(mut cached) = self.cached(distribution_id).await {
            cached.from_cache = true;
            return Ok(cached);
        }
        self.compute_and_store(&distribution).await
    }

    /// Ignores any cached copy and recomputes from the response rows.
    pub async fn summarize_fresh(&self, distribution_id: Uuid) -> Result<DistributionSummary> {
        let distribution = self.distributions.get(distribution_id).await?;
        self.compute_and_store(&distribution).await
    }

    pub async fn invalidate(&self, distribution_id: Uuid) -> Result<()> {
        sqlx::query("DELETE FROM analytics_cache WHERE distribution_id = ?")
            .bind(distribution_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn purge_expired(&self, at: DateTime<Utc>) -> Result<u64> {
        let res = sqlx::query("DELETE FROM analytics_cache WHERE expires_at <= ?")
            .bind(at.timestamp())
            .execute(&self.pool)
            .await?;
        Ok(res.rows_affected())
    }

    async fn cached(&self, distribution_id: Uuid) -> Option<DistributionSummary> {
        if self.cache_ttl_seconds <= 0 {
            return None;
        }
        let row = match sqlx::query_as::<_, (String, i64, i64, i64)>(
            "SELECT c.payload, c.expires_at, c.source_version, d.response_version
             FROM analytics_cache c
             JOIN distributions d ON d.id = c.distribution_id
             WHERE c.distribution_id = ?",
        )
        .bind(distribution_id)
        .fetch_optional(&self.pool)
        .await
        {
            Ok(row) => row,
            Err(e) => {
                tracing::warn!(error = ?e, %distribution_id, "analytics cache read failed");
                return None;
            }
        };

        let (payload, expires_at, source_version, response_version) = row?;
        if source_version != response_version || expires_at <= now().timestamp() {
            return None;
        }
        match serde_json::from_str(&payload) {
            Ok(summary) => Some(summary),
            Err(e) => {
                tracing::warn!(error = ?e, %distribution_id, "discarding unreadable analytics cache row");
                None
            }
        }
    }

    async fn compute_and_store(&self, distribution: &Distribution) -> Result<DistributionSummary> {
        // Read before the rows: a write landing in between leaves the stored
        // copy one version behind, so the next read recomputes it.
        let version = response_version(&self.pool, distribution.id).await?;
        let questions = {
            let mut conn = self.pool.acquire().await?;
            load_questions(&mut conn, distribution.template_id).await?
        };
        let responses = fetch_responses(&self.pool, distribution.id).await?;
        let computed_at = now();
        let summary = aggregate(distribution, &questions, &responses, computed_at);

        if self.cache_ttl_seconds > 0 {
            if let Err(e) = self.store(&summary, version, computed_at).await {
                tracing::warn!(error = ?e, distribution_id = %distribution.id, "analytics cache write failed");
            }
        }
        Ok(summary)
    }

    async fn store(&self, summary: &DistributionSummary, version: i64, at: DateTime<Utc>) -> Result<()> {
        let payload = serde_json::to_string(summary)?;
        sqlx::query(
            "INSERT INTO analytics_cache (distribution_id, payload, source_version, expires_at)
             VALUES (?, ?, ?, ?)
             ON CONFLICT(distribution_id) DO UPDATE SET
                 payload = excluded.payload,
                 source_version = excluded.source_version,
                 expires_at = excluded.expires_at",
        )
        .bind(summary.distribution_id)
        .bind(payload)
        .bind(version)
        .bind(expiry_after(at, self.cache_ttl_seconds))
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

async fn response_version(pool: &DbPool, distribution_id: Uuid) -> Result<i64> {
    let version = sqlx::query_scalar("SELECT response_version FROM distributions WHERE id = ?")
        .bind(distribution_id)
        .fetch_one(pool)
        .await?;
    Ok(version)
}

/// Marks the distribution's responses as changed. Called inside the
/// transaction that changes them.
pub(crate) async fn bump_response_version(
    conn: &mut SqliteConnection,
    distribution_id: Uuid,
) -> Result<()> {
    sqlx::query("UPDATE distributions SET response_version = response_version + 1 WHERE id = ?")
        .bind(distribution_id)
        .execute(&mut *conn)
        .await?;
    Ok(())
}

enum Tally {
    Choice(Vec<(String, i64)>),
    Scale(Vec<f64>),
    Text(i64),
}

impl Tally {
    fn for_kind(kind: &QuestionKind) -> Self {
        match kind {
            QuestionKind::FreeText { .. } => Tally::Text(0),
            QuestionKind::Scale { .. } => Tally::Scale(Vec::new()),
            QuestionKind::SingleChoice { options, .. }
            | QuestionKind::MultipleChoice { options, .. }
            | QuestionKind::Dropdown { options, .. } => {
                Tally::Choice(options.iter().map(|o| (o.clone(), 0)).collect())
            }
        }
    }

    /// Returns whether the value was usable for this question.
    fn record(&mut self, value: &AnswerValue) -> bool {
        match self {
            Tally::Text(count) => match value {
                AnswerValue::Text(_) => {
                    *count += 1;
                    true
                }
                _ => false,
            },
            Tally::Scale(values) => match value.as_number() {
                Some(n) => {
                    values.push(n);
                    true
                }
                None => false,
            },
            Tally::Choice(counts) => {
                let Some(selected) = value.selections() else {
                    return false;
                };
                let mut matched = false;
                for choice in selected {
                    if let Some((_, count)) = counts.iter_mut().find(|(option, _)| *option == choice) {
                        *count += 1;
                        matched = true;
                    }
                }
                matched
            }
        }
    }

    fn into_stats(self) -> QuestionStats {
        match self {
            Tally::Text(non_empty) => QuestionStats::Text { non_empty },
            Tally::Choice(counts) => QuestionStats::Choice {
                options: counts
                    .into_iter()
                    .map(|(option, count)| OptionCount { option, count })
                    .collect(),
            },
            Tally::Scale(values) => {
                let count = values.len() as i64;
                let min = values.iter().copied().reduce(f64::min);
                let max = values.iter().copied().reduce(f64::max);
                let mean = (count > 0).then(|| values.iter().sum::<f64>() / count as f64);
                QuestionStats::Scale {
                    count,
                    min,
                    max,
                    mean,
                }
            }
        }
    }
}

/// Whether a stored value is usable as an answer to a question of this kind.
pub fn counts_as_answer(kind: &QuestionKind, value: &AnswerValue) -> bool {
    match kind {
        QuestionKind::FreeText { .. } => matches!(value, AnswerValue::Text(_)),
        QuestionKind::Scale { .. } => value.as_number().is_some(),
        QuestionKind::SingleChoice { options, .. }
        | QuestionKind::MultipleChoice { options, .. }
        | QuestionKind::Dropdown { options, .. } => value
            .selections()
            .is_some_and(|selected| selected.iter().any(|choice| options.contains(choice))),
    }
}

/// A response is complete when every required question has a usable answer.
pub fn is_complete(questions: &[Question], response: &SurveyResponse) -> bool {
    questions.iter().filter(|q| q.required).all(|q| {
        response
            .answers
            .iter()
            .filter(|answer| answer.question_id == q.id)
            .filter_map(|answer| answer.parsed())
            .any(|value| counts_as_answer(&q.kind, &value))
    })
}

/// Folds stored responses into a summary. Answers that no longer fit their
/// question (unknown id, wrong shape, option no longer offered) are skipped.
pub fn aggregate(
    distribution: &Distribution,
    questions: &[Question],
    responses: &[SurveyResponse],
    computed_at: DateTime<Utc>,
) -> DistributionSummary {
    let index: HashMap<Uuid, usize> = questions
        .iter()
        .enumerate()
        .map(|(idx, q)| (q.id, idx))
        .collect();
    let mut tallies: Vec<Tally> = questions.iter().map(|q| Tally::for_kind(&q.kind)).collect();
    let mut answered = vec![0_i64; questions.len()];
    let mut complete = 0_i64;
    let mut skipped = 0_usize;

    for response in responses {
        let mut covered = HashSet::new();
        for answer in &response.answers {
            let Some(&idx) = index.get(&answer.question_id) else {
                skipped += 1;
                continue;
            };
            if covered.contains(&idx) {
                skipped += 1;
                continue;
            }
            let Some(value) = answer.parsed() else {
                continue;
            };
            if tallies[idx].record(&value) {
                covered.insert(idx);
                answered[idx] += 1;
            } else {
                skipped += 1;
            }
        }

        if is_complete(questions, response) {
            complete += 1;
        }
    }

    if skipped > 0 {
        tracing::warn!(distribution_id = %distribution.id, skipped, "skipped unusable answers while aggregating");
    }

    let total = responses.len() as i64;
    let completion_rate = if total == 0 {
        0.0
    } else {
        complete as f64 / total as f64
    };

    DistributionSummary {
        distribution_id: distribution.id,
        template_id: distribution.template_id,
        total_responses: total,
        complete_responses: complete,
        completion_rate,
        questions: questions
            .iter()
            .zip(tallies)
            .zip(answered)
            .map(|((q, tally), answered)| QuestionSummary {
                question_id: q.id,
                text: q.text.clone(),
                question_type: q.question_type(),
                required: q.required,
                answered,
                stats: tally.into_stats(),
            })
            .collect(),
        computed_at,
        from_cache: false,
    }
}
