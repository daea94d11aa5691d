//! Public job listing parameters: parsing, normalization and the canonical
//! form used as the cache key.

use std::str::FromStr;

use serde::Deserialize;
use sqlx::{Postgres, QueryBuilder};
use uuid::Uuid;

use crate::cache::keys::canonical_query;
use crate::errors::AppError;
use crate::models::job::{EmploymentType, ExperienceLevel, WorkMode};
use crate::models::pagination::Page;

/// `GET /api/v1/jobs` query string, as sent.
#[derive(Debug, Default, Deserialize)]
pub struct JobListQuery {
    pub page: Option<u32>,
    pub limit: Option<u32>,
    pub q: Option<String>,
    pub location: Option<String>,
    pub employment_type: Option<String>,
    pub work_mode: Option<String>,
    pub experience_level: Option<String>,
    pub company_id: Option<String>,
    pub salary_min: Option<i64>,
}

/// Validated filters. Text filters are trimmed and lowercased, so logically
/// equal queries normalize to the same value.
#[derive(Debug, Clone, PartialEq)]
pub struct JobFilter {
    pub page: Page,
    pub q: Option<String>,
    pub location: Option<String>,
    pub employment_type: Option<EmploymentType>,
    pub work_mode: Option<WorkMode>,
    pub experience_level: Option<ExperienceLevel>,
    pub company_id: Option<Uuid>,
    pub salary_min: Option<i64>,
}

fn normalized_text(raw: &Option<String>) -> Option<String> {
    raw.as_deref()
        .map(|s| s.split_whitespace().collect::<Vec<_>>().join(" ").to_lowercase())
        .filter(|s| !s.is_empty())
}

fn parse_opt<T: FromStr<Err = AppError>>(raw: &Option<String>) -> Result<Option<T>, AppError> {
    raw.as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(T::from_str)
        .transpose()
}

impl TryFrom<&JobListQuery> for JobFilter {
    type Error = AppError;

    fn try_from(query: &JobListQuery) -> Result<Self, Self::Error> {
        let company_id = match query.company_id.as_deref().map(str::trim) {
            Some("") | None => None,
            Some(raw) => Some(
                Uuid::parse_str(raw)
                    .map_err(|_| AppError::Validation(format!("company_id '{raw}' is not a UUID")))?,
            ),
        };
        if query.salary_min.is_some_and(|s| s < 0) {
            return Err(AppError::Validation("salary_min must not be negative".to_string()));
        }
        Ok(JobFilter {
            page: Page::new(query.page, query.limit),
            q: normalized_text(&query.q).map(|q| q.chars().take(200).collect()),
            location: normalized_text(&query.location),
            employment_type: parse_opt(&query.employment_type)?,
            work_mode: parse_opt(&query.work_mode)?,
            experience_level: parse_opt(&query.experience_level)?,
            company_id,
            salary_min: query.salary_min,
        })
    }
}

/// `%`, `_` and `\` are literal in user search terms.
pub fn like_pattern(term: &str) -> String {
    let escaped = term
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{escaped}%")
}

impl JobFilter {
    /// Defaults applied, absent filters dropped, sorted by name.
    pub fn canonical(&self) -> String {
        canonical_query(&[
            ("page", Some(self.page.page.to_string())),
            ("limit", Some(self.page.limit.to_string())),
            ("q", self.q.clone()),
            ("location", self.location.clone()),
            ("employment_type", self.employment_type.map(|v| v.to_string())),
            ("work_mode", self.work_mode.map(|v| v.to_string())),
            ("experience_level", self.experience_level.map(|v| v.to_string())),
            ("company_id", self.company_id.map(|v| v.to_string())),
            ("salary_min", self.salary_min.map(|v| v.to_string())),
        ])
    }

    /// Appends the WHERE clause for published, open jobs matching the filters.
    /// The job table must be aliased `j`.
    pub fn push_where(&self, qb: &mut QueryBuilder<'_, Postgres>) {
        qb.push(" WHERE j.status = 'published' AND (j.closes_at IS NULL OR j.closes_at > NOW())");
        if let Some(q) = &self.q {
            let pattern = like_pattern(q);
            qb.push(" AND (j.title ILIKE ")
                .push_bind(pattern.clone())
                .push(" OR j.description ILIKE ")
                .push_bind(pattern.clone())
                .push(" OR EXISTS (SELECT 1 FROM unnest(j.skills) AS s(skill) WHERE s.skill ILIKE ")
                .push_bind(pattern)
                .push("))");
        }
        if let Some(location) = &self.location {
            qb.push(" AND j.location ILIKE ").push_bind(like_pattern(location));
        }
        if let Some(v) = self.employment_type {
            qb.push(" AND j.employment_type = ").push_bind(v.as_str());
        }
        if let Some(v) = self.work_mode {
            qb.push(" AND j.work_mode = ").push_bind(v.as_str());
        }
        if let Some(v) = self.experience_level {
            qb.push(" AND j.experience_level = ").push_bind(v.as_str());
        }
        if let Some(id) = self.company_id {
            qb.push(" AND j.company_id = ").push_bind(id);
        }
        if let Some(min) = self.salary_min {
            qb.push(" AND j.salary_max >= ").push_bind(min);
        }
    }
}
