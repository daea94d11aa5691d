//! Axum route handlers for job postings.

use std::str::FromStr;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer};
use tracing::{debug, info};
use uuid::Uuid;

use crate::auth::AuthUser;
use crate::cache::keys;
use crate::companies::access::{access_for, require_member};
use crate::companies::service as companies;
use crate::errors::AppError;
use crate::jobs::filters::{JobFilter, JobListQuery};
use crate::jobs::service::{self, JobFields};
use crate::models::job::{EmploymentType, ExperienceLevel, JobResponse, JobRow, JobStatus, WorkMode};
use crate::models::pagination::{Page, Paginated};
use crate::state::AppState;
use crate::validation::{optional_text_max, require_tags, require_text};

const MAX_SKILLS: usize = 50;
const MAX_DESCRIPTION: usize = 20_000;

/// Distinguishes an absent field (`None`) from an explicit `null` (`Some(None)`).
fn double_option<'de, T, D>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

/// Raw job fields before validation.
#[derive(Debug, Clone, Default)]
struct JobInput {
    title: String,
    description: String,
    location: Option<String>,
    employment_type: String,
    work_mode: String,
    experience_level: Option<String>,
    salary_min: Option<i64>,
    salary_max: Option<i64>,
    currency: Option<String>,
    skills: Vec<String>,
    closes_at: Option<DateTime<Utc>>,
}

impl JobInput {
    /// `closes_at_changed` limits the future-date check to values the caller sent.
    fn validate(&self, now: DateTime<Utc>, closes_at_changed: bool) -> Result<JobFields, AppError> {
        let title = require_text("title", &self.title, 3, 200)?;
        let description = require_text("description", &self.description, 1, MAX_DESCRIPTION)?;

        for (field, value) in [("salary_min", self.salary_min), ("salary_max", self.salary_max)] {
            if value.is_some_and(|v| v < 0) {
                return Err(AppError::Validation(format!("{field} must not be negative")));
            }
        }
        if let (Some(min), Some(max)) = (self.salary_min, self.salary_max) {
            if min > max {
                return Err(AppError::Validation(
                    "salary_min must not exceed salary_max".to_string(),
                ));
            }
        }

        let currency = optional_text_max("currency", self.currency.as_deref(), 3)?;
        if let Some(code) = &currency {
            if code.len() != 3 || !code.chars().all(|c| c.is_ascii_uppercase()) {
                return Err(AppError::Validation(
                    "currency must be a 3-letter uppercase ISO 4217 code".to_string(),
                ));
            }
        }

        if closes_at_changed && self.closes_at.is_some_and(|c| c <= now) {
            return Err(AppError::Validation("closes_at must be in the future".to_string()));
        }

        Ok(JobFields {
            title,
            description,
            location: optional_text_max("location", self.location.as_deref(), 200)?,
            employment_type: EmploymentType::from_str(self.employment_type.trim())?,
            work_mode: WorkMode::from_str(self.work_mode.trim())?,
            experience_level: self
                .experience_level
                .as_deref()
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(ExperienceLevel::from_str)
                .transpose()?,
            salary_min: self.salary_min,
            salary_max: self.salary_max,
            currency,
            skills: require_tags("skills", &self.skills, 60, MAX_SKILLS)?,
            closes_at: self.closes_at,
        })
    }
}

#[derive(Debug, Deserialize)]
pub struct CreateJobRequest {
    pub title: String,
    pub description: String,
    pub location: Option<String>,
    pub employment_type: String,
    pub work_mode: String,
    pub experience_level: Option<String>,
    pub salary_min: Option<i64>,
    pub salary_max: Option<i64>,
    pub currency: Option<String>,
    #[serde(default)]
    pub skills: Vec<String>,
    pub closes_at: Option<DateTime<Utc>>,
}

impl CreateJobRequest {
    fn validate(self, now: DateTime<Utc>) -> Result<JobFields, AppError> {
        JobInput {
            title: self.title,
            description: self.description,
            location: self.location,
            employment_type: self.employment_type,
            work_mode: self.work_mode,
            experience_level: self.experience_level,
            salary_min: self.salary_min,
            salary_max: self.salary_max,
            currency: self.currency,
            skills: self.skills,
            closes_at: self.closes_at,
        }
        .validate(now, true)
    }
}

/// Partial update. Absent fields keep their value; `null` clears optional ones.
#[derive(Debug, Default, Deserialize)]
pub struct UpdateJobRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    pub location: Option<Option<String>>,
    pub employment_type: Option<String>,
    pub work_mode: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    pub experience_level: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub salary_min: Option<Option<i64>>,
    #[serde(default, deserialize_with = "double_option")]
    pub salary_max: Option<Option<i64>>,
    #[serde(default, deserialize_with = "double_option")]
    pub currency: Option<Option<String>>,
    pub skills: Option<Vec<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub closes_at: Option<Option<DateTime<Utc>>>,
}

impl UpdateJobRequest {
    fn apply_to(self, current: &JobRow, now: DateTime<Utc>) -> Result<JobFields, AppError> {
        let closes_at_changed = self.closes_at.is_some();
        JobInput {
            title: self.title.unwrap_or_else(|| current.title.clone()),
            description: self.description.unwrap_or_else(|| current.description.clone()),
            location: self.location.unwrap_or_else(|| current.location.clone()),
            employment_type: self
                .employment_type
                .unwrap_or_else(|| current.employment_type.clone()),
            work_mode: self.work_mode.unwrap_or_else(|| current.work_mode.clone()),
            experience_level: self
                .experience_level
                .unwrap_or_else(|| current.experience_level.clone()),
            salary_min: self.salary_min.unwrap_or(current.salary_min),
            salary_max: self.salary_max.unwrap_or(current.salary_max),
            currency: self.currency.unwrap_or_else(|| current.currency.clone()),
            skills: self.skills.unwrap_or_else(|| current.skills.clone()),
            closes_at: self.closes_at.unwrap_or(current.closes_at),
        }
        .validate(now, closes_at_changed)
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct CompanyJobsQuery {
    pub page: Option<u32>,
    pub limit: Option<u32>,
    pub status: Option<String>,
}

/// Member of the job's company (or platform admin), else 403.
async fn require_job_member(state: &AppState, user: &AuthUser, job_id: Uuid) -> Result<JobRow, AppError> {
    let job = service::require(&state.db, job_id).await?;
    require_member(&state.db, user, job.company_id).await?;
    Ok(job)
}

// ────────────────────────────────────────────────────────────────────────────
// Public
// ────────────────────────────────────────────────────────────────────────────

/// GET /api/v1/jobs
pub async fn handle_list(
    State(state): State<AppState>,
    Query(query): Query<JobListQuery>,
) -> Result<Json<Paginated<JobResponse>>, AppError> {
    let filter = JobFilter::try_from(&query)?;
    let generation = state.cache.counter(keys::JOB_LIST_GENERATION).await;
    let key = keys::job_list(generation, &filter.canonical());

    if let Some(cached) = state.cache.get_json(keys::JOBS_NAMESPACE, &key).await {
        return Ok(Json(cached));
    }

    let (items, total) = service::list_published(&state.db, &filter).await?;
    let page = Paginated::new(items, total, filter.page);
    state.cache.set_json(&key, &page).await;
    debug!("Cached job listing {key}");
    Ok(Json(page))
}

/// GET /api/v1/jobs/:id
///
/// Published jobs are public and cached. Other statuses are visible to
/// members of the owning company only; everyone else gets 404.
pub async fn handle_get(
    State(state): State<AppState>,
    user: Option<AuthUser>,
    Path(id): Path<Uuid>,
) -> Result<Json<JobResponse>, AppError> {
    let key = keys::job_detail(id);
    if let Some(cached) = state.cache.get_json::<JobResponse>(keys::JOBS_NAMESPACE, &key).await {
        return Ok(Json(cached));
    }

    let not_found = || AppError::NotFound(format!("Job {id} not found"));
    let job = service::find_response(&state.db, id)
        .await?
        .ok_or_else(not_found)?;

    if job.job.status == JobStatus::Published.as_str() {
        state.cache.set_json(&key, &job).await;
        return Ok(Json(job));
    }

    let Some(user) = user else {
        return Err(not_found());
    };
    match access_for(&state.db, &user, job.job.company_id).await? {
        Some(_) => Ok(Json(job)),
        None => Err(not_found()),
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Company members
// ────────────────────────────────────────────────────────────────────────────

/// POST /api/v1/companies/:id/jobs
pub async fn handle_create(
    State(state): State<AppState>,
    user: AuthUser,
    Path(company_id): Path<Uuid>,
    Json(req): Json<CreateJobRequest>,
) -> Result<(StatusCode, Json<JobRow>), AppError> {
    companies::require(&state.db, company_id).await?;
    require_member(&state.db, &user, company_id).await?;
    let fields = req.validate(Utc::now())?;

    let job = service::create(&state.db, company_id, user.id, &fields).await?;
    service::invalidate(&state.cache, job.id).await;
    info!("Job {} drafted for company {company_id}", job.id);
    Ok((StatusCode::CREATED, Json(job)))
}

/// GET /api/v1/companies/:id/jobs
pub async fn handle_list_for_company(
    State(state): State<AppState>,
    user: AuthUser,
    Path(company_id): Path<Uuid>,
    Query(query): Query<CompanyJobsQuery>,
) -> Result<Json<Paginated<JobRow>>, AppError> {
    companies::require(&state.db, company_id).await?;
    require_member(&state.db, &user, company_id).await?;
    let status = query
        .status
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(JobStatus::from_str)
        .transpose()?;
    let page = Page::new(query.page, query.limit);
    let (items, total) = service::list_for_company(&state.db, company_id, status, page).await?;
    Ok(Json(Paginated::new(items, total, page)))
}

/// PATCH /api/v1/jobs/:id
pub async fn handle_update(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateJobRequest>,
) -> Result<Json<JobRow>, AppError> {
    require_job_member(&state, &user, id).await?;
    let now = Utc::now();
    let job = service::update(&state.db, id, |current| req.apply_to(current, now)).await?;
    service::invalidate(&state.cache, id).await;
    Ok(Json(job))
}

async fn transition(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
    next: JobStatus,
) -> Result<Json<JobRow>, AppError> {
    require_job_member(state, user, id).await?;
    let job = service::transition(&state.db, id, next).await?;
    service::invalidate(&state.cache, id).await;
    info!("Job {id} is now {next}");
    Ok(Json(job))
}

/// POST /api/v1/jobs/:id/publish
pub async fn handle_publish(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<JobRow>, AppError> {
    transition(&state, &user, id, JobStatus::Published).await
}

/// POST /api/v1/jobs/:id/close
pub async fn handle_close(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<JobRow>, AppError> {
    transition(&state, &user, id, JobStatus::Closed).await
}

/// DELETE /api/v1/jobs/:id (archives; rows are never deleted)
pub async fn handle_archive(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<JobRow>, AppError> {
    transition(&state, &user, id, JobStatus::Archived).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn create_request() -> CreateJobRequest {
        CreateJobRequest {
            title: "Senior Rust Engineer".into(),
            description: "Build the matching engine".into(),
            location: Some(" Berlin ".into()),
            employment_type: "full_time".into(),
            work_mode: "hybrid".into(),
            experience_level: Some("senior".into()),
            salary_min: Some(80_000),
            salary_max: Some(110_000),
            currency: Some("EUR".into()),
            skills: vec!["Rust".into(), "rust".into(), "Tokio".into()],
            closes_at: None,
        }
    }

    fn existing_job() -> JobRow {
        let fields = create_request().validate(Utc::now()).unwrap();
        let now = Utc::now();
        JobRow {
            id: Uuid::new_v4(),
            company_id: Uuid::new_v4(),
            created_by: Uuid::new_v4(),
            title: fields.title,
            description: fields.description,
            location: fields.location,
            employment_type: fields.employment_type.to_string(),
            work_mode: fields.work_mode.to_string(),
            experience_level: fields.experience_level.map(|l| l.to_string()),
            salary_min: fields.salary_min,
            salary_max: fields.salary_max,
            currency: fields.currency,
            skills: fields.skills,
            status: "published".into(),
            published_at: Some(now),
            closes_at: Some(now - Duration::days(1)),
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_create_validation_normalizes() {
        let fields = create_request().validate(Utc::now()).unwrap();
        assert_eq!(fields.location.as_deref(), Some("Berlin"));
        assert_eq!(fields.skills, vec!["Rust", "Tokio"]);
        assert_eq!(fields.employment_type, EmploymentType::FullTime);
    }

    #[test]
    fn test_create_validation_rejects() {
        let cases: Vec<Box<dyn Fn(&mut CreateJobRequest)>> = vec![
            Box::new(|r| r.title = "QA".into()),
            Box::new(|r| r.description = "   ".into()),
            Box::new(|r| r.salary_min = Some(200_000)),
            Box::new(|r| r.salary_max = Some(-1)),
            Box::new(|r| r.currency = Some("eur".into())),
            Box::new(|r| r.currency = Some("EURO".into())),
            Box::new(|r| r.work_mode = "office".into()),
            Box::new(|r| r.closes_at = Some(Utc::now() - Duration::hours(1))),
        ];
        for mutate in cases {
            let mut req = create_request();
            mutate(&mut req);
            assert!(req.validate(Utc::now()).is_err());
        }
    }

    #[test]
    fn test_patch_merges_and_clears() {
        let current = existing_job();
        let req: UpdateJobRequest =
            serde_json::from_value(serde_json::json!({"title": "Staff Rust Engineer", "salary_max": null}))
                .unwrap();
        // The stored closes_at is in the past, but it is not being changed.
        let fields = req.apply_to(&current, Utc::now()).unwrap();
        assert_eq!(fields.title, "Staff Rust Engineer");
        assert_eq!(fields.salary_max, None);
        assert_eq!(fields.salary_min, Some(80_000));
        assert_eq!(fields.currency.as_deref(), Some("EUR"));
    }

    #[test]
    fn test_patch_revalidates_salary_range() {
        let req = UpdateJobRequest {
            salary_min: Some(Some(500_000)),
            ..UpdateJobRequest::default()
        };
        assert!(req.apply_to(&existing_job(), Utc::now()).is_err());
    }
}
