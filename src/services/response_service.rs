use std::collections::{HashMap, HashSet};

use sqlx::types::Json;
use sqlx::SqliteConnection;
use uuid::Uuid;

use crate::database::pool::DbPool;
use crate::dto::response_dto::{AnswerInput, SubmitResponsePayload, UpdateResponsePayload};
use crate::error::{is_unique_violation, Error, Result, Violation};
use crate::models::distribution::Distribution;
use crate::models::question::Question;
use crate::models::response::{Answer, AnswerRow, AnswerValue, ResponseRow, SurveyResponse};
use crate::services::analytics_service::{bump_response_version, AnalyticsService};
use crate::services::distribution_service::DistributionService;
use crate::services::question_service::load_questions;
use crate::utils::time::now;

const RESPONSE_COLUMNS: &str = "id, distribution_id, student_id, submitted_at, updated_at";

#[derive(Clone)]
pub struct ResponseService {
    pool: DbPool,
    distributions: DistributionService,
    analytics: AnalyticsService,
}

impl ResponseService {
    pub fn new(pool: DbPool, distributions: DistributionService, analytics: AnalyticsService) -> Self {
        Self {
            pool,
            distributions,
            analytics,
        }
    }

    pub async fn submit(
        &self,
        distribution_id: Uuid,
        payload: SubmitResponsePayload,
    ) -> Result<SurveyResponse> {
        let distribution = self.distributions.get(distribution_id).await?;
        self.submit_to(&distribution, payload).await
    }

    /// Entry point for the public link.
    pub async fn submit_by_token(
        &self,
        token: &str,
        payload: SubmitResponsePayload,
    ) -> Result<SurveyResponse> {
        let distribution = self.distributions.resolve_by_link(token).await?;
        self.submit_to(&distribution, payload).await
    }

    async fn submit_to(
        &self,
        distribution: &Distribution,
        payload: SubmitResponsePayload,
    ) -> Result<SurveyResponse> {
        distribution.ensure_accepting(now())?;

        let student_id = payload
            .student_id
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string);
        let questions = self.questions_for(distribution).await?;

        let mut issues = check_respondent(distribution, student_id.as_deref());
        let accepted = match validate_answers(&questions, &payload.answers) {
            Ok(accepted) if issues.is_empty() => accepted,
            Ok(_) => return Err(Error::Rejected(issues)),
            Err(mut answer_issues) => {
                issues.append(&mut answer_issues);
                return Err(Error::Rejected(issues));
            }
        };

        if let Some(student) = &student_id {
            let already: i64 = sqlx::query_scalar(
                "SELECT COUNT(*) FROM responses WHERE distribution_id = ? AND student_id = ?",
            )
            .bind(distribution.id)
            .bind(student)
            .fetch_one(&self.pool)
            .await?;
            if already > 0 {
                return Err(duplicate_student(student));
            }
        }

        let stamp = now();
        let mut tx = self.pool.begin().await?;
        let inserted = sqlx::query_as::<_, ResponseRow>(&format!(
            "INSERT INTO responses (id, distribution_id, student_id, submitted_at, updated_at)
             VALUES (?, ?, ?, ?, ?)
             RETURNING {RESPONSE_COLUMNS}"
        ))
        .bind(Uuid::new_v4())
        .bind(distribution.id)
        .bind(student_id.as_deref())
        .bind(stamp)
        .bind(stamp)
        .fetch_one(&mut *tx)
        .await;
        let row = match inserted {
            Ok(row) => row,
            Err(err) if is_unique_violation(&err) => {
                return Err(duplicate_student(student_id.as_deref().unwrap_or_default()));
            }
            Err(err) => return Err(err.into()),
        };
        let answers = insert_answers(&mut tx, row.id, accepted).await?;
        bump_response_version(&mut tx, distribution.id).await?;
        tx.commit().await?;

        self.invalidate_summary(distribution.id).await;
        tracing::info!(
            response_id = %row.id,
            distribution_id = %distribution.id,
            answers = answers.len(),
            "response submitted"
        );
        Ok(row.with_answers(answers))
    }

    pub async fn get(&self, id: Uuid) -> Result<SurveyResponse> {
        let row = self.find_row(id).await?;
        let answers = sqlx::query_as::<_, AnswerRow>(
            "SELECT response_id, question_id, value FROM response_answers WHERE response_id = ? ORDER BY position ASC",
        )
        .bind(id)
        .fetch_all(&self.pool)
        .await?;
        Ok(row.with_answers(answers.into_iter().map(to_answer).collect()))
    }

    pub async fn list(&self, distribution_id: Uuid) -> Result<Vec<SurveyResponse>> {
        self.distributions.get(distribution_id).await?;
        fetch_responses(&self.pool, distribution_id).await
    }

    pub async fn count(&self, distribution_id: Uuid) -> Result<i64> {
        let total = sqlx::query_scalar("SELECT COUNT(*) FROM responses WHERE distribution_id = ?")
            .bind(distribution_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(total)
    }

    /// Replaces a response's answers. Only possible while its distribution
    /// still accepts submissions.
    pub async fn update(&self, id: Uuid, payload: UpdateResponsePayload) -> Result<SurveyResponse> {
        let row = self.find_row(id).await?;
        let distribution = self.distributions.get(row.distribution_id).await?;
        distribution.ensure_accepting(now())?;

        let questions = self.questions_for(&distribution).await?;
        let accepted = validate_answers(&questions, &payload.answers).map_err(Error::Rejected)?;

        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM response_answers WHERE response_id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        let answers = insert_answers(&mut tx, id, accepted).await?;
        let updated = sqlx::query_as::<_, ResponseRow>(&format!(
            "UPDATE responses SET updated_at = ? WHERE id = ? RETURNING {RESPONSE_COLUMNS}"
        ))
        .bind(now())
        .bind(id)
        .fetch_one(&mut *tx)
        .await?;
        bump_response_version(&mut tx, distribution.id).await?;
        tx.commit().await?;

        self.invalidate_summary(distribution.id).await;
        tracing::info!(response_id = %id, "response updated");
        Ok(updated.with_answers(answers))
    }

    /// Retraction is allowed whatever state the distribution is in.
    pub async fn delete(&self, id: Uuid) -> Result<()> {
        let row = self.find_row(id).await?;
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM responses WHERE id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        bump_response_version(&mut tx, row.distribution_id).await?;
        tx.commit().await?;

        self.invalidate_summary(row.distribution_id).await;
        tracing::info!(response_id = %id, distribution_id = %row.distribution_id, "response deleted");
        Ok(())
    }

    async fn find_row(&self, id: Uuid) -> Result<ResponseRow> {
        sqlx::query_as::<_, ResponseRow>(&format!(
            "SELECT {RESPONSE_COLUMNS} FROM responses WHERE id = ?"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| Error::NotFound(format!("Response {} not found", id)))
    }

    async fn questions_for(&self, distribution: &Distribution) -> Result<Vec<Question>> {
        let mut conn = self.pool.acquire().await?;
        load_questions(&mut conn, distribution.template_id).await
    }

    async fn invalidate_summary(&self, distribution_id: Uuid) {
        if let Err(e) = self.analytics.invalidate(distribution_id).await {
            tracing::warn!(error = ?e, %distribution_id, "could not invalidate analytics cache");
        }
    }
}

fn duplicate_student(student_id: &str) -> Error {
    Error::Conflict(format!(
        "student {} has already responded to this distribution",
        student_id
    ))
}

fn to_answer(row: AnswerRow) -> Answer {
    Answer {
        question_id: row.question_id,
        value: row.value.0,
    }
}

/// Checks who is answering against the distribution's audience settings.
pub fn check_respondent(distribution: &Distribution, student_id: Option<&str>) -> Vec<Violation> {
    let scope = &distribution.target_scope;
    let message = match student_id {
        None if !distribution.allow_anonymous => {
            Some("this survey does not accept anonymous responses")
        }
        None if !scope.admits(None) => {
            Some("this survey is addressed to specific students; a student id is required")
        }
        Some(id) if !scope.admits(Some(id)) => Some("this student is not part of the survey's audience"),
        _ => None,
    };
    message
        .map(|m| vec![Violation::new("student_id", m)])
        .unwrap_or_default()
}

/// Validates a full answer set against the template's questions. Returns the
/// non-empty answers in question order, or every violation found.
pub fn validate_answers(
    questions: &[Question],
    answers: &[AnswerInput],
) -> std::result::Result<Vec<Answer>, Vec<Violation>> {
    let by_id: HashMap<Uuid, &Question> = questions.iter().map(|q| (q.id, q)).collect();
    let mut seen = HashSet::new();
    let mut answered = HashSet::new();
    let mut accepted = Vec::new();
    let mut issues = Vec::new();

    for input in answers {
        let Some(question) = by_id.get(&input.question_id) else {
            issues.push(Violation::for_question(
                input.question_id,
                "question does not belong to this survey",
            ));
            continue;
        };
        if !seen.insert(input.question_id) {
            issues.push(Violation::for_question(
                input.question_id,
                "question answered more than once",
            ));
            continue;
        }

        match AnswerValue::parse(&input.value) {
            Err(message) => issues.push(Violation::for_question(question.id, message)),
            Ok(None) => {}
            Ok(Some(value)) if value.is_empty() => {}
            Ok(Some(value)) => match question.kind.check_answer(&value) {
                Ok(()) => {
                    answered.insert(question.id);
                    accepted.push((question.position, Answer {
                        question_id: question.id,
                        value: input.value.clone(),
                    }));
                }
                Err(message) => issues.push(Violation::for_question(question.id, message)),
            },
        }
    }

    for question in questions {
        if question.required && !answered.contains(&question.id) && !already_flagged(&issues, question.id) {
            issues.push(Violation::for_question(question.id, "answer is required"));
        }
    }

    if !issues.is_empty() {
        return Err(issues);
    }
    accepted.sort_by_key(|(position, _)| *position);
    Ok(accepted.into_iter().map(|(_, answer)| answer).collect())
}

/// A question that already has a violation is not reported again as missing.
fn already_flagged(issues: &[Violation], question_id: Uuid) -> bool {
    issues.iter().any(|v| v.question_id == Some(question_id))
}

async fn insert_answers(
    conn: &mut SqliteConnection,
    response_id: Uuid,
    answers: Vec<Answer>,
) -> Result<Vec<Answer>> {
    for (position, answer) in answers.iter().enumerate() {
        sqlx::query(
            "INSERT INTO response_answers (response_id, question_id, position, value) VALUES (?, ?, ?, ?)",
        )
        .bind(response_id)
        .bind(answer.question_id)
        .bind(position as i64)
        .bind(Json(&answer.value))
        .execute(&mut *conn)
        .await?;
    }
    Ok(answers)
}

/// Loads every response of a distribution with its answers, oldest first.
pub async fn fetch_responses(pool: &DbPool, distribution_id: Uuid) -> Result<Vec<SurveyResponse>> {
    let rows = sqlx::query_as::<_, ResponseRow>(&format!(
        "SELECT {RESPONSE_COLUMNS} FROM responses WHERE distribution_id = ? ORDER BY submitted_at ASC"
    ))
    .bind(distribution_id)
    .fetch_all(pool)
    .await?;

    let answer_rows = sqlx::query_as::<_, AnswerRow>(
        "SELECT a.response_id, a.question_id, a.value
         FROM response_answers a
         JOIN responses r ON r.id = a.response_id
         WHERE r.distribution_id = ?
         ORDER BY a.response_id, a.position ASC",
    )
    .bind(distribution_id)
    .fetch_all(pool)
    .await?;

    let mut grouped: HashMap<Uuid, Vec<Answer>> = HashMap::new();
    for row in answer_rows {
        grouped.entry(row.response_id).or_default().push(to_answer(row));
    }

    Ok(rows
        .into_iter()
        .map(|row| {
            let answers = grouped.remove(&row.id).unwrap_or_default();
            row.with_answers(answers)
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::distribution::{DistributionStatus, TargetScope};
    use crate::models::question::{NoRules, QuestionKind, RangeRules, TextRules};
    use chrono::Utc;
    use serde_json::json;

    fn question(position: i64, required: bool, kind: QuestionKind) -> Question {
        let now = Utc::now();
        Question {
            id: Uuid::new_v4(),
            template_id: Uuid::nil(),
            position,
            text: format!("Question {position}"),
            required,
            kind,
            created_at: now,
            updated_at: now,
        }
    }

    fn survey() -> Vec<Question> {
        vec![
            question(
                0,
                true,
                QuestionKind::SingleChoice {
                    options: vec!["Yes".into(), "No".into()],
                    validation: NoRules::default(),
                },
            ),
            question(
                1,
                true,
                QuestionKind::Scale {
                    validation: RangeRules {
                        min: Some(1.0),
                        max: Some(10.0),
                    },
                },
            ),
            question(
                2,
                false,
                QuestionKind::FreeText {
                    validation: TextRules::default(),
                },
            ),
        ]
    }

    fn input(question_id: Uuid, value: serde_json::Value) -> AnswerInput {
        AnswerInput { question_id, value }
    }

    #[test]
    fn accepts_complete_submission_in_question_order() {
        let questions = survey();
        let accepted = validate_answers(
            &questions,
            &[
                input(questions[2].id, json!("All good")),
                input(questions[1].id, json!(7)),
                input(questions[0].id, json!("Yes")),
            ],
        )
        .unwrap();
        let order: Vec<Uuid> = accepted.iter().map(|a| a.question_id).collect();
        assert_eq!(order, vec![questions[0].id, questions[1].id, questions[2].id]);
    }

    #[test]
    fn enumerates_every_missing_required_question() {
        let questions = survey();
        let issues = validate_answers(&questions, &[input(questions[2].id, json!("hi"))]).unwrap_err();
        let missing: Vec<Uuid> = issues.iter().filter_map(|v| v.question_id).collect();
        assert_eq!(missing, vec![questions[0].id, questions[1].id]);
    }

    #[test]
    fn blank_answer_to_required_question_counts_as_missing() {
        let questions = survey();
        let issues = validate_answers(
            &questions,
            &[input(questions[0].id, json!("  ")), input(questions[1].id, json!(3))],
        )
        .unwrap_err();
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].question_id, Some(questions[0].id));
        assert_eq!(issues[0].message, "answer is required");
    }

    #[test]
    fn option_outside_the_list_names_that_question_only() {
        let questions = survey();
        let issues = validate_answers(
            &questions,
            &[input(questions[0].id, json!("Maybe")), input(questions[1].id, json!(4))],
        )
        .unwrap_err();
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].question_id, Some(questions[0].id));
        assert!(issues[0].message.contains("Maybe"));
    }

    #[test]
    fn foreign_and_repeated_questions_are_rejected() {
        let questions = survey();
        let stranger = Uuid::new_v4();
        let issues = validate_answers(
            &questions,
            &[
                input(questions[0].id, json!("Yes")),
                input(questions[0].id, json!("No")),
                input(questions[1].id, json!(2)),
                input(stranger, json!("?")),
            ],
        )
        .unwrap_err();
        assert_eq!(issues.len(), 2);
        assert!(issues.iter().any(|v| v.question_id == Some(stranger)));
        assert!(issues
            .iter()
            .any(|v| v.message == "question answered more than once"));
    }

    #[test]
    fn respondent_rules_follow_distribution_settings() {
        let now = Utc::now();
        let mut distribution = Distribution {
            id: Uuid::new_v4(),
            template_id: Uuid::nil(),
            title: None,
            access_token: "t".into(),
            target_scope: Json(TargetScope::All),
            allow_anonymous: false,
            opens_at: now,
            closes_at: None,
            status: DistributionStatus::Open,
            created_at: now,
            updated_at: now,
        };
        assert_eq!(check_respondent(&distribution, None).len(), 1);
        assert!(check_respondent(&distribution, Some("s-1")).is_empty());

        distribution.target_scope = Json(TargetScope::Students {
            student_ids: vec!["s-1".into()],
        });
        assert!(check_respondent(&distribution, Some("s-1")).is_empty());
        assert_eq!(check_respondent(&distribution, Some("s-9")).len(), 1);

        distribution.allow_anonymous = true;
        assert_eq!(check_respondent(&distribution, None).len(), 1);
    }
}
