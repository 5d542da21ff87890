use sqlx::SqliteConnection;
use uuid::Uuid;

use crate::database::pool::DbPool;
use crate::dto::template_dto::{CreateTemplatePayload, TemplateListQuery, UpdateTemplatePayload};
use crate::error::{Error, Result, Violation};
use crate::models::question::NewQuestion;
use crate::models::template::{Template, TemplateDetail, TemplateListItem, TemplateStatus};
use crate::services::question_service::{
    find_template, insert_question, load_questions, reject_if_invalid,
};
use crate::utils::time::now;

const TEMPLATE_COLUMNS: &str = "id, title, description, status, created_at, updated_at";

#[derive(Clone)]
pub struct TemplateService {
    pool: DbPool,
}

pub struct TemplateList {
    pub items: Vec<TemplateListItem>,
    pub total: i64,
    pub page: i64,
    pub per_page: i64,
    pub total_pages: i64,
}

fn check_questions(questions: &[NewQuestion]) -> Vec<Violation> {
    questions
        .iter()
        .enumerate()
        .flat_map(|(idx, q)| q.check(&format!("questions[{idx}].")))
        .collect()
}

fn check_title(title: &str, issues: &mut Vec<Violation>) {
    if title.trim().is_empty() {
        issues.push(Violation::new("title", "title must not be blank"));
    }
}

impl TemplateService {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub async fn create(&self, payload: CreateTemplatePayload) -> Result<TemplateDetail> {
        let mut issues = Vec::new();
        check_title(&payload.title, &mut issues);
        issues.extend(check_questions(&payload.questions));
        reject_if_invalid(issues)?;

        let stamp = now();
        let mut tx = self.pool.begin().await?;
        let template = sqlx::query_as::<_, Template>(&format!(
            "INSERT INTO templates (id, title, description, status, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?)
             RETURNING {TEMPLATE_COLUMNS}"
        ))
        .bind(Uuid::new_v4())
        .bind(payload.title.trim())
        .bind(payload.description.as_deref())
        .bind(TemplateStatus::Draft)
        .bind(stamp)
        .bind(stamp)
        .fetch_one(&mut *tx)
        .await?;

        let mut questions = Vec::with_capacity(payload.questions.len());
        for (position, definition) in payload.questions.iter().enumerate() {
            questions.push(insert_question(&mut tx, template.id, position as i64, definition).await?);
        }
        tx.commit().await?;

        tracing::info!(template_id = %template.id, questions = questions.len(), "template created");
        Ok(TemplateDetail {
            template,
            questions,
        })
    }

    pub async fn get(&self, id: Uuid) -> Result<Template> {
        let mut conn = self.pool.acquire().await?;
        find_template(&mut conn, id).await
    }

    pub async fn get_detail(&self, id: Uuid) -> Result<TemplateDetail> {
        let mut conn = self.pool.acquire().await?;
        detail(&mut conn, id).await
    }

    pub async fn list(&self, query: TemplateListQuery) -> Result<TemplateList> {
        let page = query.page.unwrap_or(1).max(1);
        let per_page = query.per_page.unwrap_or(20).clamp(1, 100);
        let offset = (page - 1).saturating_mul(per_page);

        let mut filters = Vec::new();
        let mut args: Vec<String> = Vec::new();

        if let Some(status) = query.status {
            filters.push("t.status = ?".to_string());
            args.push(status.as_str().to_string());
        }
        if let Some(search) = query.search.filter(|s| !s.trim().is_empty()) {
            filters.push("(t.title LIKE ? OR COALESCE(t.description, '') LIKE ?)".to_string());
            let pattern = format!("%{}%", search.trim());
            args.push(pattern.clone());
            args.push(pattern);
        }

        let where_clause = if filters.is_empty() {
            "".to_string()
        } else {
            format!("WHERE {}", filters.join(" AND "))
        };

        let items_query = format!(
            "SELECT t.id, t.title, t.description, t.status,
                    (SELECT COUNT(*) FROM questions q WHERE q.template_id = t.id) AS question_count,
                    t.created_at, t.updated_at
             FROM templates t
             {}
             ORDER BY t.updated_at DESC
             LIMIT ? OFFSET ?",
            where_clause
        );
        let total_query = format!("SELECT COUNT(*) FROM templates t {}", where_clause);

        let mut items_statement = sqlx::query_as::<_, TemplateListItem>(&items_query);
        for value in &args {
            items_statement = items_statement.bind(value);
        }
        items_statement = items_statement.bind(per_page).bind(offset);
        let items = items_statement.fetch_all(&self.pool).await?;

        let mut total_statement = sqlx::query_scalar::<_, i64>(&total_query);
        for value in &args {
            total_statement = total_statement.bind(value);
        }
        let total = total_statement.fetch_one(&self.pool).await?;

        let total_pages = ((total as f64) / (per_page as f64)).ceil() as i64;

        Ok(TemplateList {
            items,
            total,
            page,
            per_page,
            total_pages,
        })
    }

    /// Metadata (title, description, status) can change at any point of the
    /// lifecycle the status rules allow; the question set only while drafting.
    pub async fn update(&self, id: Uuid, payload: UpdateTemplatePayload) -> Result<TemplateDetail> {
        let mut issues = Vec::new();
        if let Some(title) = &payload.title {
            check_title(title, &mut issues);
        }
        if let Some(questions) = &payload.questions {
            issues.extend(check_questions(questions));
        }
        reject_if_invalid(issues)?;

        let mut tx = self.pool.begin().await?;
        let current = find_template(&mut tx, id).await?;

        if payload.touches_structure() && current.status != TemplateStatus::Draft {
            return Err(Error::InvalidState(format!(
                "template {} is {}; its questions can only change while it is a draft",
                id, current.status
            )));
        }

        if let Some(next) = payload.status {
            if !current.status.can_become(next) {
                return Err(Error::InvalidState(format!(
                    "template {} cannot move from {} to {}",
                    id, current.status, next
                )));
            }
        }

        if let Some(questions) = &payload.questions {
            sqlx::query("DELETE FROM questions WHERE template_id = ?")
                .bind(id)
                .execute(&mut *tx)
                .await?;
            for (position, definition) in questions.iter().enumerate() {
                insert_question(&mut tx, id, position as i64, definition).await?;
            }
        }

        if payload.status == Some(TemplateStatus::Active) && current.status == TemplateStatus::Draft {
            let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM questions WHERE template_id = ?")
                .bind(id)
                .fetch_one(&mut *tx)
                .await?;
            if count == 0 {
                return Err(Error::rejected(Violation::new(
                    "status",
                    "a template needs at least one question before it can be activated",
                )));
            }
        }

        let title = payload.title.as_deref().map(str::trim);
        sqlx::query(
            "UPDATE templates
             SET title = COALESCE(?, title),
                 description = COALESCE(?, description),
                 status = COALESCE(?, status),
                 updated_at = ?
             WHERE id = ?",
        )
        .bind(title)
        .bind(payload.description.as_deref())
        .bind(payload.status)
        .bind(now())
        .bind(id)
        .execute(&mut *tx)
        .await?;

        let updated = detail(&mut tx, id).await?;
        tx.commit().await?;

        if payload.status.is_some_and(|s| s != current.status) {
            tracing::info!(template_id = %id, from = %current.status, to = %updated.template.status, "template status changed");
        }
        Ok(updated)
    }

    /// Removes a template with its questions. Refused while any distribution
    /// of it is still open; closed distributions and their responses go with it.
    pub async fn delete(&self, id: Uuid) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        find_template(&mut tx, id).await?;

        let live: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM distributions WHERE template_id = ? AND status != 'closed'",
        )
        .bind(id)
        .fetch_one(&mut *tx)
        .await?;
        if live > 0 {
            return Err(Error::Conflict(format!(
                "template {} still has {} open distribution(s)",
                id, live
            )));
        }

        sqlx::query("DELETE FROM templates WHERE id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;

        tracing::info!(template_id = %id, "template deleted");
        Ok(())
    }
}

async fn detail(conn: &mut SqliteConnection, id: Uuid) -> Result<TemplateDetail> {
    let template = find_template(conn, id).await?;
    let questions = load_questions(conn, id).await?;
    Ok(TemplateDetail {
        template,
        questions,
    })
}
