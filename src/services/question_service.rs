use std::collections::HashSet;

use sqlx::types::Json;
use sqlx::SqliteConnection;
use uuid::Uuid;

use crate::database::pool::DbPool;
use crate::error::{Error, Result, Violation};
use crate::models::question::{NewQuestion, Question, QuestionRow};
use crate::models::template::{Template, TemplateStatus};
use crate::utils::time::now;

const QUESTION_COLUMNS: &str =
    "id, template_id, position, text, required, kind, created_at, updated_at";

#[derive(Clone)]
pub struct QuestionService {
    pool: DbPool,
}

impl QuestionService {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub async fn create(&self, template_id: Uuid, definition: NewQuestion) -> Result<Question> {
        reject_if_invalid(definition.check(""))?;

        let mut tx = self.pool.begin().await?;
        ensure_draft(&mut tx, template_id).await?;
        let position: i64 = sqlx::query_scalar(
            "SELECT COALESCE(MAX(position) + 1, 0) FROM questions WHERE template_id = ?",
        )
        .bind(template_id)
        .fetch_one(&mut *tx)
        .await?;
        let question = insert_question(&mut tx, template_id, position, &definition).await?;
        touch_template(&mut tx, template_id).await?;
        tx.commit().await?;

        tracing::info!(template_id = %template_id, question_id = %question.id, "question added");
        Ok(question)
    }

    pub async fn get(&self, id: Uuid) -> Result<Question> {
        let row = sqlx::query_as::<_, QuestionRow>(&format!(
            "SELECT {QUESTION_COLUMNS} FROM questions WHERE id = ?"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| Error::NotFound(format!("Question {} not found", id)))?;
        Ok(row.into())
    }

    pub async fn list(&self, template_id: Uuid) -> Result<Vec<Question>> {
        let mut conn = self.pool.acquire().await?;
        find_template(&mut conn, template_id).await?;
        load_questions(&mut conn, template_id).await
    }

    pub async fn update(&self, id: Uuid, definition: NewQuestion) -> Result<Question> {
        reject_if_invalid(definition.check(""))?;

        let existing = self.get(id).await?;
        let mut tx = self.pool.begin().await?;
        ensure_draft(&mut tx, existing.template_id).await?;
        let row = sqlx::query_as::<_, QuestionRow>(&format!(
            "UPDATE questions
             SET text = ?, required = ?, question_type = ?, kind = ?, updated_at = ?
             WHERE id = ?
             RETURNING {QUESTION_COLUMNS}"
        ))
        .bind(definition.text.trim())
        .bind(definition.required)
        .bind(definition.kind.question_type())
        .bind(Json(&definition.kind))
        .bind(now())
        .bind(id)
        .fetch_one(&mut *tx)
        .await?;
        touch_template(&mut tx, existing.template_id).await?;
        tx.commit().await?;

        Ok(row.into())
    }

    /// Rewrites positions to follow `ordered_ids`, which must name every
    /// question of the template exactly once.
    pub async fn reorder(&self, template_id: Uuid, ordered_ids: &[Uuid]) -> Result<Vec<Question>> {
        let mut tx = self.pool.begin().await?;
        ensure_draft(&mut tx, template_id).await?;
        let current = load_questions(&mut tx, template_id).await?;

        let known: HashSet<Uuid> = current.iter().map(|q| q.id).collect();
        let mut seen = HashSet::new();
        let mut issues = Vec::new();
        for id in ordered_ids {
            if !known.contains(id) {
                issues.push(Violation::for_question(*id, "question does not belong to this template"));
            } else if !seen.insert(*id) {
                issues.push(Violation::for_question(*id, "question listed more than once"));
            }
        }
        for id in current.iter().map(|q| q.id).filter(|id| !seen.contains(id)) {
            issues.push(Violation::for_question(id, "question missing from the new order"));
        }
        if !issues.is_empty() {
            for issue in &mut issues {
                issue.field = "question_ids".to_string();
            }
            return Err(Error::Rejected(issues));
        }

        let stamp = now();
        for (position, id) in ordered_ids.iter().enumerate() {
            sqlx::query("UPDATE questions SET position = ?, updated_at = ? WHERE id = ?")
                .bind(position as i64)
                .bind(stamp)
                .bind(*id)
                .execute(&mut *tx)
                .await?;
        }
        touch_template(&mut tx, template_id).await?;
        let reordered = load_questions(&mut tx, template_id).await?;
        tx.commit().await?;

        tracing::info!(template_id = %template_id, count = reordered.len(), "questions reordered");
        Ok(reordered)
    }

    pub async fn delete(&self, id: Uuid) -> Result<()> {
        let question = self.get(id).await?;
        let mut tx = self.pool.begin().await?;
        ensure_draft(&mut tx, question.template_id).await?;
        sqlx::query("DELETE FROM questions WHERE id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        sqlx::query(
            "UPDATE questions SET position = position - 1 WHERE template_id = ? AND position > ?",
        )
        .bind(question.template_id)
        .bind(question.position)
        .execute(&mut *tx)
        .await?;
        touch_template(&mut tx, question.template_id).await?;
        tx.commit().await?;

        tracing::info!(template_id = %question.template_id, question_id = %id, "question deleted");
        Ok(())
    }
}

pub(crate) fn reject_if_invalid(issues: Vec<Violation>) -> Result<()> {
    if issues.is_empty() {
        Ok(())
    } else {
        Err(Error::Rejected(issues))
    }
}

pub(crate) async fn find_template(conn: &mut SqliteConnection, id: Uuid) -> Result<Template> {
    sqlx::query_as::<_, Template>(
        "SELECT id, title, description, status, created_at, updated_at FROM templates WHERE id = ?",
    )
    .bind(id)
    .fetch_optional(&mut *conn)
    .await?
    .ok_or_else(|| Error::NotFound(format!("Template {} not found", id)))
}

/// Structural edits are only allowed while the template is a draft.
pub(crate) async fn ensure_draft(conn: &mut SqliteConnection, template_id: Uuid) -> Result<Template> {
    let template = find_template(conn, template_id).await?;
    if template.status != TemplateStatus::Draft {
        return Err(Error::InvalidState(format!(
            "template {} is {}; questions can only change while it is a draft",
            template_id, template.status
        )));
    }
    Ok(template)
}

pub(crate) async fn load_questions(conn: &mut SqliteConnection, template_id: Uuid) -> Result<Vec<Question>> {
    let rows = sqlx::query_as::<_, QuestionRow>(&format!(
        "SELECT {QUESTION_COLUMNS} FROM questions WHERE template_id = ? ORDER BY position ASC"
    ))
    .bind(template_id)
    .fetch_all(&mut *conn)
    .await?;
    Ok(rows.into_iter().map(Into::into).collect())
}

pub(crate) async fn insert_question(
    conn: &mut SqliteConnection,
    template_id: Uuid,
    position: i64,
    definition: &NewQuestion,
) -> Result<Question> {
    let stamp = now();
    let row = sqlx::query_as::<_, QuestionRow>(&format!(
        "INSERT INTO questions (id, template_id, position, text, required, question_type, kind, created_at, updated_at)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
         RETURNING {QUESTION_COLUMNS}"
    ))
    .bind(Uuid::new_v4())
    .bind(template_id)
    .bind(position)
    .bind(definition.text.trim())
    .bind(definition.required)
    .bind(definition.kind.question_type())
    .bind(Json(&definition.kind))
    .bind(stamp)
    .bind(stamp)
    .fetch_one(&mut *conn)
    .await?;
    Ok(row.into())
}

async fn touch_template(conn: &mut SqliteConnection, template_id: Uuid) -> Result<()> {
    sqlx::query("UPDATE templates SET updated_at = ? WHERE id = ?")
        .bind(now())
        .bind(template_id)
        .execute(&mut *conn)
        .await?;
    Ok(())
}
