use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct CandidateProfileRow {
    pub user_id: Uuid,
    pub headline: Option<String>,
    pub summary: Option<String>,
    pub location: Option<String>,
    pub phone: Option<String>,
    pub years_experience: Option<i32>,
    pub skills: Vec<String>,
    pub languages: Vec<String>,
    pub linkedin_url: Option<String>,
    pub portfolio_url: Option<String>,
    pub cv_key: Option<String>,
    pub cv_file_name: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Profile joined with the owner's name and email, as shown to recruiters.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct CandidateProfileView {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub profile: CandidateProfileRow,
    pub full_name: String,
    pub email: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct CvAnalysisRow {
    pub id: Uuid,
    pub user_id: Uuid,
    pub file_key: String,
    pub file_name: String,
    pub format: String,
    pub extraction_method: String,
    pub extraction_source: String,
    pub text_length: i32,
    pub parsed: Value,
    pub warnings: Vec<String>,
    pub created_at: DateTime<Utc>,
}
