use std::str::FromStr;

use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::application::{
    ApplicationRow, ApplicationStatus, ApplicationView, CommunicationRow, Party, StatusHistoryRow,
};
use crate::models::pagination::Page;

const VIEW_SELECT: &str = r#"
    SELECT a.*, j.title AS job_title, j.company_id, c.name AS company_name,
           u.full_name AS candidate_name, u.email AS candidate_email
    FROM applications a
    JOIN jobs j ON j.id = a.job_id
    JOIN companies c ON c.id = j.company_id
    JOIN users u ON u.id = a.candidate_id
"#;

/// Which applications a listing covers.
#[derive(Debug, Clone, Copy)]
pub enum Scope {
    Candidate(Uuid),
    Job(Uuid),
}

impl Scope {
    fn column(&self) -> &'static str {
        match self {
            Scope::Candidate(_) => "a.candidate_id",
            Scope::Job(_) => "a.job_id",
        }
    }

    fn id(&self) -> Uuid {
        match self {
            Scope::Candidate(id) | Scope::Job(id) => *id,
        }
    }
}

async fn record_history(
    tx: &mut Transaction<'_, Postgres>,
    application_id: Uuid,
    from: Option<ApplicationStatus>,
    to: ApplicationStatus,
    changed_by: Uuid,
    note: Option<&str>,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO application_status_history
            (id, application_id, from_status, to_status, changed_by, note)
        VALUES ($1, $2, $3, $4, $5, $6)
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(application_id)
    .bind(from.map(|s| s.as_str()))
    .bind(to.as_str())
    .bind(changed_by)
    .bind(note)
    .execute(&mut **tx)
    .await?;
    Ok(())
}

pub async fn create(
    pool: &PgPool,
    job_id: Uuid,
    candidate_id: Uuid,
    cover_letter: Option<&str>,
    cv_key: Option<&str>,
) -> Result<ApplicationRow, AppError> {
    let mut tx = pool.begin().await?;
    let application = sqlx::query_as::<_, ApplicationRow>(
        r#"
        INSERT INTO applications (id, job_id, candidate_id, cover_letter, cv_key, status)
        VALUES ($1, $2, $3, $4, $5, 'applied')
        RETURNING *
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(job_id)
    .bind(candidate_id)
    .bind(cover_letter)
    .bind(cv_key)
    .fetch_one(&mut *tx)
    .await
    .map_err(|e| match AppError::from(e) {
        AppError::Conflict(_) => {
            AppError::Conflict("You have already applied to this job".to_string())
        }
        other => other,
    })?;
    record_history(
        &mut tx,
        application.id,
        None,
        ApplicationStatus::Applied,
        candidate_id,
        None,
    )
    .await?;
    tx.commit().await?;
    Ok(application)
}

pub async fn find_view(pool: &PgPool, id: Uuid) -> Result<Option<ApplicationView>, sqlx::Error> {
    sqlx::query_as::<_, ApplicationView>(&format!("{VIEW_SELECT} WHERE a.id = $1"))
        .bind(id)
        .fetch_optional(pool)
        .await
}

pub async fn list(
    pool: &PgPool,
    scope: Scope,
    status: Option<ApplicationStatus>,
    page: Page,
) -> Result<(Vec<ApplicationView>, i64), sqlx::Error> {
    let status = status.map(|s| s.as_str());
    let filter = format!(
        "WHERE {} = $1 AND ($2::TEXT IS NULL OR a.status = $2)",
        scope.column()
    );

    let items = sqlx::query_as::<_, ApplicationView>(&format!(
        "{VIEW_SELECT} {filter} ORDER BY a.created_at DESC, a.id DESC LIMIT $3 OFFSET $4"
    ))
    .bind(scope.id())
    .bind(status)
    .bind(page.limit())
    .bind(page.offset())
    .fetch_all(pool)
    .await?;

    let total: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM applications a {filter}"))
        .bind(scope.id())
        .bind(status)
        .fetch_one(pool)
        .await?;

    Ok((items, total))
}

/// Applies a status change for `party`, appending it to the history.
pub async fn change_status(
    pool: &PgPool,
    id: Uuid,
    next: ApplicationStatus,
    party: Party,
    changed_by: Uuid,
    note: Option<&str>,
) -> Result<(ApplicationStatus, ApplicationRow), AppError> {
    let mut tx = pool.begin().await?;
    let current = sqlx::query_as::<_, ApplicationRow>(
        "SELECT * FROM applications WHERE id = $1 FOR UPDATE",
    )
    .bind(id)
    .fetch_optional(&mut *tx)
    .await?
    .ok_or_else(|| AppError::NotFound(format!("Application {id} not found")))?;

    let from = ApplicationStatus::from_str(&current.status)?;
    from.check_transition(next, party)?;

    let updated = sqlx::query_as::<_, ApplicationRow>(
        "UPDATE applications SET status = $2, updated_at = NOW() WHERE id = $1 RETURNING *",
    )
    .bind(id)
    .bind(next.as_str())
    .fetch_one(&mut *tx)
    .await?;
    record_history(&mut tx, id, Some(from), next, changed_by, note).await?;
    tx.commit().await?;
    Ok((from, updated))
}

pub async fn history(pool: &PgPool, id: Uuid) -> Result<Vec<StatusHistoryRow>, sqlx::Error> {
    sqlx::query_as::<_, StatusHistoryRow>(
        "SELECT * FROM application_status_history WHERE application_id = $1 ORDER BY created_at, id",
    )
    .bind(id)
    .fetch_all(pool)
    .await
}

pub async fn messages(pool: &PgPool, id: Uuid) -> Result<Vec<CommunicationRow>, sqlx::Error> {
    sqlx::query_as::<_, CommunicationRow>(
        r#"
        SELECT m.id, m.application_id, m.sender_id, u.full_name AS sender_name, m.body, m.created_at
        FROM communications m
        JOIN users u ON u.id = m.sender_id
        WHERE m.application_id = $1
        ORDER BY m.created_at, m.id
        "#,
    )
    .bind(id)
    .fetch_all(pool)
    .await
}

pub async fn add_message(
    pool: &PgPool,
    application_id: Uuid,
    sender_id: Uuid,
    body: &str,
) -> Result<CommunicationRow, sqlx::Error> {
    sqlx::query_as::<_, CommunicationRow>(
        r#"
        WITH inserted AS (
            INSERT INTO communications (id, application_id, sender_id, body)
            VALUES ($1, $2, $3, $4)
            RETURNING *
        )
        SELECT i.id, i.application_id, i.sender_id, u.full_name AS sender_name, i.body, i.created_at
        FROM inserted i
        JOIN users u ON u.id = i.sender_id
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(application_id)
    .bind(sender_id)
    .bind(body)
    .fetch_one(pool)
    .await
}
