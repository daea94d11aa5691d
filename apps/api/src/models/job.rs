use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::models::text_enum;

text_enum! {
    pub enum JobStatus {
        Draft => "draft",
        Published => "published",
        Closed => "closed",
        Archived => "archived",
    }
}

impl JobStatus {
    /// Lifecycle: draft|closed -> published, published -> closed,
    /// anything but archived -> archived. Archived is terminal.
    pub fn can_transition_to(&self, next: JobStatus) -> bool {
        use JobStatus::*;
        matches!(
            (self, next),
            (Draft, Published)
                | (Closed, Published)
                | (Published, Closed)
                | (Draft, Archived)
                | (Published, Archived)
                | (Closed, Archived)
        )
    }
}

text_enum! {
    pub enum EmploymentType {
        FullTime => "full_time",
        PartTime => "part_time",
        Contract => "contract",
        Internship => "internship",
        Temporary => "temporary",
    }
}

text_enum! {
    pub enum WorkMode {
        Onsite => "onsite",
        Remote => "remote",
        Hybrid => "hybrid",
    }
}

text_enum! {
    pub enum ExperienceLevel {
        Entry => "entry",
        Mid => "mid",
        Senior => "senior",
        Lead => "lead",
        Executive => "executive",
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct JobRow {
    pub id: Uuid,
    pub company_id: Uuid,
    pub created_by: Uuid,
    pub title: String,
    pub description: String,
    pub location: Option<String>,
    pub employment_type: String,
    pub work_mode: String,
    pub experience_level: Option<String>,
    pub salary_min: Option<i64>,
    pub salary_max: Option<i64>,
    pub currency: Option<String>,
    pub skills: Vec<String>,
    pub status: String,
    pub published_at: Option<DateTime<Utc>>,
    pub closes_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl JobRow {
    /// Published and not past its closing date.
    pub fn accepts_applications(&self, now: DateTime<Utc>) -> bool {
        self.status == JobStatus::Published.as_str() && self.closes_at.map_or(true, |c| c > now)
    }
}

/// Job joined with the owning company's display fields.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct JobResponse {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub job: JobRow,
    pub company_name: String,
    pub company_slug: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn job(status: JobStatus, closes_at: Option<DateTime<Utc>>) -> JobRow {
        let now = Utc::now();
        JobRow {
            id: Uuid::new_v4(),
            company_id: Uuid::new_v4(),
            created_by: Uuid::new_v4(),
            title: "Backend Engineer".into(),
            description: "Build APIs".into(),
            location: None,
            employment_type: "full_time".into(),
            work_mode: "remote".into(),
            experience_level: None,
            salary_min: None,
            salary_max: None,
            currency: None,
            skills: vec![],
            status: status.as_str().into(),
            published_at: None,
            closes_at,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_job_transitions() {
        assert!(JobStatus::Draft.can_transition_to(JobStatus::Published));
        assert!(JobStatus::Closed.can_transition_to(JobStatus::Published));
        assert!(JobStatus::Published.can_transition_to(JobStatus::Closed));
        assert!(!JobStatus::Draft.can_transition_to(JobStatus::Closed));
        assert!(!JobStatus::Archived.can_transition_to(JobStatus::Published));
        assert!(!JobStatus::Archived.can_transition_to(JobStatus::Archived));
        assert!(!JobStatus::Published.can_transition_to(JobStatus::Draft));
    }

    #[test]
    fn test_accepts_applications() {
        let now = Utc::now();
        assert!(job(JobStatus::Published, None).accepts_applications(now));
        assert!(job(JobStatus::Published, Some(now + Duration::days(1))).accepts_applications(now));
        assert!(!job(JobStatus::Published, Some(now - Duration::days(1))).accepts_applications(now));
        assert!(!job(JobStatus::Draft, None).accepts_applications(now));
    }
}
