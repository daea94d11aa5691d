//! Candidate profile persistence and the merge of parsed CV fields into a profile.

use sqlx::types::Json;
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use crate::cv::fields::ParsedCv;
use crate::cv::CvAnalysis;
use crate::models::candidate::{CandidateProfileRow, CandidateProfileView, CvAnalysisRow};
use crate::validation::normalize_tags;

pub const MAX_SKILLS: usize = 50;
pub const MAX_TAG_LEN: usize = 60;

/// The user-editable part of a profile.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProfileFields {
    pub headline: Option<String>,
    pub summary: Option<String>,
    pub location: Option<String>,
    pub phone: Option<String>,
    pub years_experience: Option<i32>,
    pub skills: Vec<String>,
    pub languages: Vec<String>,
    pub linkedin_url: Option<String>,
    pub portfolio_url: Option<String>,
}

impl From<&CandidateProfileRow> for ProfileFields {
    fn from(row: &CandidateProfileRow) -> Self {
        Self {
            headline: row.headline.clone(),
            summary: row.summary.clone(),
            location: row.location.clone(),
            phone: row.phone.clone(),
            years_experience: row.years_experience,
            skills: row.skills.clone(),
            languages: row.languages.clone(),
            linkedin_url: row.linkedin_url.clone(),
            portfolio_url: row.portfolio_url.clone(),
        }
    }
}

impl ProfileFields {
    /// Fills empty fields from a parsed CV. Values the candidate entered win;
    /// skills and languages are unioned.
    pub fn merged_with(&self, parsed: &ParsedCv) -> ProfileFields {
        fn keep_or<T: Clone>(current: &Option<T>, parsed: &Option<T>) -> Option<T> {
            current.clone().or_else(|| parsed.clone())
        }
        fn union(current: &[String], parsed: &[String]) -> Vec<String> {
            let all: Vec<String> = current.iter().chain(parsed).cloned().collect();
            normalize_tags(&all, MAX_TAG_LEN, MAX_SKILLS)
        }

        ProfileFields {
            headline: keep_or(&self.headline, &parsed.headline),
            summary: keep_or(&self.summary, &parsed.summary),
            location: keep_or(&self.location, &parsed.location),
            phone: keep_or(&self.phone, &parsed.phone),
            years_experience: keep_or(&self.years_experience, &parsed.years_experience),
            skills: union(&self.skills, &parsed.skills),
            languages: union(&self.languages, &parsed.languages),
            linkedin_url: keep_or(&self.linkedin_url, &parsed.linkedin_url),
            portfolio_url: keep_or(&self.portfolio_url, &parsed.portfolio_url),
        }
    }
}

pub async fn create_empty_profile(
    tx: &mut Transaction<'_, Postgres>,
    user_id: Uuid,
) -> Result<(), sqlx::Error> {
    sqlx::query("INSERT INTO candidate_profiles (user_id) VALUES ($1) ON CONFLICT DO NOTHING")
        .bind(user_id)
        .execute(&mut **tx)
        .await?;
    Ok(())
}

pub async fn get_profile(
    pool: &PgPool,
    user_id: Uuid,
) -> Result<Option<CandidateProfileRow>, sqlx::Error> {
    sqlx::query_as::<_, CandidateProfileRow>("SELECT * FROM candidate_profiles WHERE user_id = $1")
        .bind(user_id)
        .fetch_optional(pool)
        .await
}

pub async fn get_profile_view(
    pool: &PgPool,
    user_id: Uuid,
) -> Result<Option<CandidateProfileView>, sqlx::Error> {
    sqlx::query_as::<_, CandidateProfileView>(
        r#"
        SELECT p.*, u.full_name, u.email
        FROM candidate_profiles p
        JOIN users u ON u.id = p.user_id
        WHERE p.user_id = $1 AND u.is_active
        "#,
    )
    .bind(user_id)
    .fetch_optional(pool)
    .await
}

pub async fn update_profile(
    pool: &PgPool,
    user_id: Uuid,
    fields: &ProfileFields,
) -> Result<Option<CandidateProfileRow>, sqlx::Error> {
    sqlx::query_as::<_, CandidateProfileRow>(
        r#"
        UPDATE candidate_profiles SET
            headline = $2, summary = $3, location = $4, phone = $5,
            years_experience = $6, skills = $7, languages = $8,
            linkedin_url = $9, portfolio_url = $10, updated_at = NOW()
        WHERE user_id = $1
        RETURNING *
        "#,
    )
    .bind(user_id)
    .bind(&fields.headline)
    .bind(&fields.summary)
    .bind(&fields.location)
    .bind(&fields.phone)
    .bind(fields.years_experience)
    .bind(&fields.skills)
    .bind(&fields.languages)
    .bind(&fields.linkedin_url)
    .bind(&fields.portfolio_url)
    .fetch_optional(pool)
    .await
}

/// Points the profile at a newly uploaded CV and fills its gaps from the
/// parsed fields. The row is locked so concurrent edits are not lost.
pub async fn attach_cv(
    tx: &mut Transaction<'_, Postgres>,
    user_id: Uuid,
    cv_key: &str,
    file_name: &str,
    parsed: &ParsedCv,
) -> Result<Option<CandidateProfileRow>, sqlx::Error> {
    let current = sqlx::query_as::<_, CandidateProfileRow>(
        "SELECT * FROM candidate_profiles WHERE user_id = $1 FOR UPDATE",
    )
    .bind(user_id)
    .fetch_optional(&mut **tx)
    .await?;
    let Some(current) = current else {
        return Ok(None);
    };

    let merged = ProfileFields::from(&current).merged_with(parsed);
    sqlx::query_as::<_, CandidateProfileRow>(
        r#"
        UPDATE candidate_profiles SET
            headline = $2, summary = $3, location = $4, phone = $5,
            years_experience = $6, skills = $7, languages = $8,
            linkedin_url = $9, portfolio_url = $10,
            cv_key = $11, cv_file_name = $12, updated_at = NOW()
        WHERE user_id = $1
        RETURNING *
        "#,
    )
    .bind(user_id)
    .bind(&merged.headline)
    .bind(&merged.summary)
    .bind(&merged.location)
    .bind(&merged.phone)
    .bind(merged.years_experience)
    .bind(&merged.skills)
    .bind(&merged.languages)
    .bind(&merged.linkedin_url)
    .bind(&merged.portfolio_url)
    .bind(cv_key)
    .bind(file_name)
    .fetch_optional(&mut **tx)
    .await
}

pub async fn insert_analysis(
    tx: &mut Transaction<'_, Postgres>,
    user_id: Uuid,
    file_key: &str,
    file_name: &str,
    analysis: &CvAnalysis,
) -> Result<CvAnalysisRow, sqlx::Error> {
    sqlx::query_as::<_, CvAnalysisRow>(
        r#"
        INSERT INTO cv_analyses
            (id, user_id, file_key, file_name, format, extraction_method,
             extraction_source, text_length, parsed, warnings)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
        RETURNING *
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(user_id)
    .bind(file_key)
    .bind(file_name)
    .bind(analysis.format.as_str())
    .bind(analysis.extraction_method.as_str())
    .bind(analysis.extraction_source.as_str())
    .bind(i32::try_from(analysis.text_length).unwrap_or(i32::MAX))
    .bind(Json(&analysis.parsed))
    .bind(&analysis.warnings)
    .fetch_one(&mut **tx)
    .await
}

pub async fn list_analyses(pool: &PgPool, user_id: Uuid) -> Result<Vec<CvAnalysisRow>, sqlx::Error> {
    sqlx::query_as::<_, CvAnalysisRow>(
        "SELECT * FROM cv_analyses WHERE user_id = $1 ORDER BY created_at DESC LIMIT 50",
    )
    .bind(user_id)
    .fetch_all(pool)
    .await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_merge_keeps_user_values_and_unions_skills() {
        let current = ProfileFields {
            headline: Some("Staff Engineer".into()),
            skills: vec!["Rust".into(), "SQL".into()],
            ..ProfileFields::default()
        };
        let parsed = ParsedCv {
            headline: Some("Engineer".into()),
            phone: Some("+4420794609".into()),
            years_experience: Some(9),
            skills: vec!["rust".into(), "Kafka".into()],
            languages: vec!["English".into()],
            ..ParsedCv::default()
        };
        let merged = current.merged_with(&parsed);
        assert_eq!(merged.headline.as_deref(), Some("Staff Engineer"));
        assert_eq!(merged.phone.as_deref(), Some("+4420794609"));
        assert_eq!(merged.years_experience, Some(9));
        assert_eq!(merged.skills, vec!["Rust", "SQL", "Kafka"]);
        assert_eq!(merged.languages, vec!["English"]);
    }

    #[test]
    fn test_merge_caps_skill_count() {
        let current = ProfileFields {
            skills: (0..45).map(|i| format!("skill-{i}")).collect(),
            ..ProfileFields::default()
        };
        let parsed = ParsedCv {
            skills: (0..20).map(|i| format!("other-{i}")).collect(),
            ..ParsedCv::default()
        };
        assert_eq!(current.merged_with(&parsed).skills.len(), MAX_SKILLS);
    }
}
