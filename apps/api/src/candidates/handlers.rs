//! Axum route handlers for candidate profiles and CV uploads.

use axum::{
    extract::{Multipart, Path, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use crate::auth::AuthUser;
use crate::candidates::service::{self, ProfileFields, MAX_SKILLS, MAX_TAG_LEN};
use crate::cv::fields::clean_phone;
use crate::cv::format::detect_format;
use crate::cv::CvAnalysis;
use crate::errors::AppError;
use crate::models::candidate::{CandidateProfileRow, CandidateProfileView, CvAnalysisRow};
use crate::models::user::Role;
use crate::state::AppState;
use crate::storage::cv_key;
use crate::uploads::read_file_field;
use crate::validation::{optional_text, optional_text_max, optional_url, require_tags};

const MAX_YEARS_EXPERIENCE: i32 = 60;

#[derive(Debug, Deserialize)]
pub struct UpdateProfileRequest {
    pub headline: Option<String>,
    pub summary: Option<String>,
    pub location: Option<String>,
    pub phone: Option<String>,
    pub years_experience: Option<i32>,
    #[serde(default)]
    pub skills: Vec<String>,
    #[serde(default)]
    pub languages: Vec<String>,
    pub linkedin_url: Option<String>,
    pub portfolio_url: Option<String>,
}

impl UpdateProfileRequest {
    fn validate(&self) -> Result<ProfileFields, AppError> {
        let phone = match optional_text(self.phone.as_deref()) {
            Some(raw) => Some(clean_phone(&raw).ok_or_else(|| {
                AppError::Validation("phone must contain between 7 and 15 digits".to_string())
            })?),
            None => None,
        };
        if let Some(years) = self.years_experience {
            if !(0..=MAX_YEARS_EXPERIENCE).contains(&years) {
                return Err(AppError::Validation(format!(
                    "years_experience must be between 0 and {MAX_YEARS_EXPERIENCE}"
                )));
            }
        }
        Ok(ProfileFields {
            headline: optional_text_max("headline", self.headline.as_deref(), 200)?,
            summary: optional_text_max("summary", self.summary.as_deref(), 5000)?,
            location: optional_text_max("location", self.location.as_deref(), 200)?,
            phone,
            years_experience: self.years_experience,
            skills: require_tags("skills", &self.skills, MAX_TAG_LEN, MAX_SKILLS)?,
            languages: require_tags("languages", &self.languages, MAX_TAG_LEN, MAX_SKILLS)?,
            linkedin_url: optional_url("linkedin_url", self.linkedin_url.as_deref())?,
            portfolio_url: optional_url("portfolio_url", self.portfolio_url.as_deref())?,
        })
    }
}

#[derive(Debug, Serialize)]
pub struct CvUploadResponse {
    pub analysis_id: Uuid,
    #[serde(flatten)]
    pub analysis: CvAnalysis,
    pub profile: CandidateProfileRow,
}

/// Profiles belong to candidate accounts only.
fn require_candidate(user: &AuthUser) -> Result<(), AppError> {
    if user.role == Role::Candidate {
        Ok(())
    } else {
        Err(AppError::Forbidden)
    }
}

fn profile_not_found() -> AppError {
    AppError::NotFound("Candidate profile not found".to_string())
}

/// GET /api/v1/candidates/me
pub async fn handle_get_me(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<Json<CandidateProfileView>, AppError> {
    require_candidate(&user)?;
    let profile = service::get_profile_view(&state.db, user.id)
        .await?
        .ok_or_else(profile_not_found)?;
    Ok(Json(profile))
}

/// PUT /api/v1/candidates/me
pub async fn handle_update_me(
    State(state): State<AppState>,
    user: AuthUser,
    Json(req): Json<UpdateProfileRequest>,
) -> Result<Json<CandidateProfileRow>, AppError> {
    require_candidate(&user)?;
    let fields = req.validate()?;
    let profile = service::update_profile(&state.db, user.id, &fields)
        .await?
        .ok_or_else(profile_not_found)?;
    info!("Updated candidate profile {}", user.id);
    Ok(Json(profile))
}

/// GET /api/v1/candidates/:user_id
pub async fn handle_get_candidate(
    State(state): State<AppState>,
    user: AuthUser,
    Path(candidate_id): Path<Uuid>,
) -> Result<Json<CandidateProfileView>, AppError> {
    if candidate_id != user.id {
        user.require_any(&[Role::Recruiter])?;
    }
    let profile = service::get_profile_view(&state.db, candidate_id)
        .await?
        .ok_or_else(profile_not_found)?;
    Ok(Json(profile))
}

/// POST /api/v1/candidates/me/cv
///
/// The file is analysed before it is stored, so unreadable uploads leave
/// nothing behind in the bucket.
pub async fn handle_upload_cv(
    State(state): State<AppState>,
    user: AuthUser,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<CvUploadResponse>), AppError> {
    require_candidate(&user)?;
    if service::get_profile(&state.db, user.id).await?.is_none() {
        return Err(profile_not_found());
    }

    let upload = read_file_field(&mut multipart, "file", state.config.max_upload_bytes).await?;
    let format = detect_format(
        &upload.bytes,
        upload.content_type.as_deref(),
        upload.file_name.as_deref(),
    )?;
    let file_name = upload
        .file_name
        .clone()
        .unwrap_or_else(|| format!("cv.{}", format.extension()));
    info!(
        "CV upload from {}: {} bytes, detected {format}",
        user.id,
        upload.bytes.len()
    );

    let analysis = state.cv.analyze(format, upload.bytes.clone()).await?;

    let key = cv_key(user.id, format.extension());
    state
        .storage
        .put(&key, upload.bytes, format.content_type())
        .await?;

    let stored = async {
        let mut tx = state.db.begin().await?;
        let row = service::insert_analysis(&mut tx, user.id, &key, &file_name, &analysis).await?;
        let profile = service::attach_cv(&mut tx, user.id, &key, &file_name, &analysis.parsed)
            .await?
            .ok_or_else(profile_not_found)?;
        tx.commit().await?;
        Ok::<_, AppError>((row, profile))
    }
    .await;

    let (row, profile) = match stored {
        Ok(stored) => stored,
        Err(e) => {
            if let Err(cleanup) = state.storage.delete(&key).await {
                warn!("Could not remove orphaned CV {key}: {cleanup}");
            }
            return Err(e);
        }
    };

    Ok((
        StatusCode::CREATED,
        Json(CvUploadResponse {
            analysis_id: row.id,
            analysis,
            profile,
        }),
    ))
}

/// GET /api/v1/candidates/me/cv/analyses
pub async fn handle_list_analyses(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<Json<Vec<CvAnalysisRow>>, AppError> {
    require_candidate(&user)?;
    Ok(Json(service::list_analyses(&state.db, user.id).await?))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> UpdateProfileRequest {
        UpdateProfileRequest {
            headline: Some("  Backend Engineer ".into()),
            summary: None,
            location: Some("".into()),
            phone: Some("+44 20 7946 0958".into()),
            years_experience: Some(8),
            skills: vec!["Rust".into(), "rust".into(), " Go ".into()],
            languages: vec![],
            linkedin_url: Some("https://linkedin.com/in/jane".into()),
            portfolio_url: None,
        }
    }

    #[test]
    fn test_profile_update_normalizes() {
        let fields = request().validate().unwrap();
        assert_eq!(fields.headline.as_deref(), Some("Backend Engineer"));
        assert_eq!(fields.location, None);
        assert_eq!(fields.phone.as_deref(), Some("+442079460958"));
        assert_eq!(fields.skills, vec!["Rust", "Go"]);
    }

    #[test]
    fn test_profile_update_rejects_bad_values() {
        let mut req = request();
        req.years_experience = Some(61);
        assert!(req.validate().is_err());

        let mut req = request();
        req.linkedin_url = Some("linkedin.com/in/jane".into());
        assert!(req.validate().is_err());

        let mut req = request();
        req.phone = Some("12".into());
        assert!(req.validate().is_err());
    }

    #[test]
    fn test_only_candidates_own_profiles() {
        let recruiter = AuthUser {
            id: Uuid::new_v4(),
            role: Role::Recruiter,
        };
        assert!(matches!(require_candidate(&recruiter), Err(AppError::Forbidden)));
    }
}
