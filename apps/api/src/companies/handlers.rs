//! Axum route handlers for companies, their members and invitations.

use std::str::FromStr;

use axum::{
    extract::{Multipart, Path, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{info, warn};
use uuid::Uuid;

use crate::auth::{users, AuthUser};
use crate::companies::access::{require_manager, require_member, Access};
use crate::companies::invitations;
use crate::companies::service::{self, CompanyFields};
use crate::cv::format::{detect_format, DocumentFormat};
use crate::errors::AppError;
use crate::models::company::{CompanyMemberRow, CompanyRow, InvitationRow, MemberRole};
use crate::models::notification::NotificationKind;
use crate::models::user::Role;
use crate::notifications::{notify, NewNotification};
use crate::state::AppState;
use crate::storage::logo_key;
use crate::uploads::read_file_field;
use crate::validation::{optional_text_max, optional_url, require_email, require_text};

const LOGO_FORMATS: &[DocumentFormat] = &[
    DocumentFormat::Png,
    DocumentFormat::Jpeg,
    DocumentFormat::Webp,
    DocumentFormat::Gif,
];

#[derive(Debug, Deserialize)]
pub struct CreateCompanyRequest {
    pub name: String,
    pub description: Option<String>,
    pub website: Option<String>,
    pub location: Option<String>,
}

impl CreateCompanyRequest {
    fn validate(&self) -> Result<CompanyFields, AppError> {
        Ok(CompanyFields {
            name: require_text("name", &self.name, 2, 120)?,
            description: optional_text_max("description", self.description.as_deref(), 5000)?,
            website: optional_url("website", self.website.as_deref())?,
            location: optional_text_max("location", self.location.as_deref(), 200)?,
        })
    }
}

/// Absent fields are left unchanged; an empty string clears an optional field.
#[derive(Debug, Default, Deserialize)]
pub struct UpdateCompanyRequest {
    pub name: Option<String>,
    pub description: Option<String>,
    pub website: Option<String>,
    pub location: Option<String>,
}

impl UpdateCompanyRequest {
    fn apply_to(&self, current: &CompanyRow) -> Result<CompanyFields, AppError> {
        Ok(CompanyFields {
            name: match &self.name {
                Some(name) => require_text("name", name, 2, 120)?,
                None => current.name.clone(),
            },
            description: match &self.description {
                Some(d) => optional_text_max("description", Some(d), 5000)?,
                None => current.description.clone(),
            },
            website: match &self.website {
                Some(w) => optional_url("website", Some(w))?,
                None => current.website.clone(),
            },
            location: match &self.location {
                Some(l) => optional_text_max("location", Some(l), 200)?,
                None => current.location.clone(),
            },
        })
    }
}

#[derive(Debug, Deserialize)]
pub struct InviteRequest {
    pub email: String,
    pub role: String,
}

#[derive(Debug, Serialize)]
pub struct AcceptResponse {
    pub company: CompanyRow,
    pub role: MemberRole,
    /// When true the caller should refresh their tokens to pick up the recruiter role.
    pub role_changed: bool,
}

// ────────────────────────────────────────────────────────────────────────────
// Companies
// ────────────────────────────────────────────────────────────────────────────

/// POST /api/v1/companies
pub async fn handle_create(
    State(state): State<AppState>,
    user: AuthUser,
    Json(req): Json<CreateCompanyRequest>,
) -> Result<(StatusCode, Json<CompanyRow>), AppError> {
    user.require_any(&[Role::Recruiter])?;
    let fields = req.validate()?;
    let company = service::create(&state.db, user.id, &fields).await?;
    info!("Company {} ({}) created by {}", company.id, company.slug, user.id);
    Ok((StatusCode::CREATED, Json(company)))
}

/// GET /api/v1/companies/:id
pub async fn handle_get(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<CompanyRow>, AppError> {
    Ok(Json(service::require(&state.db, id).await?))
}

/// PATCH /api/v1/companies/:id
pub async fn handle_update(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateCompanyRequest>,
) -> Result<Json<CompanyRow>, AppError> {
    require_manager(&state.db, &user, id).await?;
    let current = service::require(&state.db, id).await?;
    let fields = req.apply_to(&current)?;
    let company = service::update(&state.db, id, &fields)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Company {id} not found")))?;
    Ok(Json(company))
}

/// POST /api/v1/companies/:id/logo
pub async fn handle_upload_logo(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    mut multipart: Multipart,
) -> Result<Json<CompanyRow>, AppError> {
    require_manager(&state.db, &user, id).await?;
    let current = service::require(&state.db, id).await?;

    let upload = read_file_field(&mut multipart, "file", state.config.max_upload_bytes).await?;
    let format = detect_format(
        &upload.bytes,
        upload.content_type.as_deref(),
        upload.file_name.as_deref(),
    )?;
    if !LOGO_FORMATS.contains(&format) {
        return Err(AppError::UnsupportedMediaType(
            "logos must be PNG, JPEG, WEBP or GIF images".to_string(),
        ));
    }

    let key = logo_key(id, format.extension());
    state.storage.put(&key, upload.bytes, format.content_type()).await?;
    let company = service::set_logo(&state.db, id, &key)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Company {id} not found")))?;

    if let Some(old) = current.logo_key {
        if let Err(e) = state.storage.delete(&old).await {
            warn!("Could not delete previous logo {old}: {e}");
        }
    }
    Ok(Json(company))
}

// ────────────────────────────────────────────────────────────────────────────
// Members
// ────────────────────────────────────────────────────────────────────────────

/// GET /api/v1/companies/:id/members
pub async fn handle_list_members(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<CompanyMemberRow>>, AppError> {
    require_member(&state.db, &user, id).await?;
    service::require(&state.db, id).await?;
    Ok(Json(service::list_members(&state.db, id).await?))
}

/// DELETE /api/v1/companies/:id/members/:user_id
///
/// Only owners may remove other owners.
pub async fn handle_remove_member(
    State(state): State<AppState>,
    user: AuthUser,
    Path((id, member_id)): Path<(Uuid, Uuid)>,
) -> Result<StatusCode, AppError> {
    let access = require_manager(&state.db, &user, id).await?;
    service::require(&state.db, id).await?;
    let target = service::member_role(&state.db, id, member_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Member not found".to_string()))?;
    if target == MemberRole::Owner && !access.is_owner() {
        return Err(AppError::Forbidden);
    }
    service::remove_member(&state.db, id, member_id).await?;
    info!("Removed {member_id} from company {id}");
    Ok(StatusCode::NO_CONTENT)
}

// ────────────────────────────────────────────────────────────────────────────
// Invitations
// ────────────────────────────────────────────────────────────────────────────

/// POST /api/v1/companies/:id/invitations
pub async fn handle_invite(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    Json(req): Json<InviteRequest>,
) -> Result<(StatusCode, Json<InvitationRow>), AppError> {
    let access = require_manager(&state.db, &user, id).await?;
    let company = service::require(&state.db, id).await?;
    let email = require_email(&req.email)?;
    let role = MemberRole::from_str(req.role.trim())?;
    if role == MemberRole::Owner && !access.is_owner() {
        return Err(AppError::Forbidden);
    }

    let invitation = invitations::create(
        &state.db,
        id,
        &email,
        role,
        user.id,
        state.config.invitation_ttl_days,
    )
    .await?;
    info!("Invited {email} to company {id} as {role}");

    if let Some(invitee) = users::find_by_email(&state.db, &email).await? {
        let notification = NewNotification::new(
            NotificationKind::CompanyInvitation,
            format!("Invitation to join {}", company.name),
            format!("You have been invited to join {} as {role}.", company.name),
            json!({
                "company_id": company.id,
                "invitation_id": invitation.id,
                "token": invitation.token,
            }),
        );
        notify(&state.db, invitee.id, &notification).await;
    }

    Ok((StatusCode::CREATED, Json(invitation)))
}

/// GET /api/v1/companies/:id/invitations
pub async fn handle_list_invitations(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<InvitationRow>>, AppError> {
    require_manager(&state.db, &user, id).await?;
    service::require(&state.db, id).await?;
    Ok(Json(invitations::list(&state.db, id).await?))
}

/// DELETE /api/v1/companies/:id/invitations/:invitation_id
pub async fn handle_revoke_invitation(
    State(state): State<AppState>,
    user: AuthUser,
    Path((id, invitation_id)): Path<(Uuid, Uuid)>,
) -> Result<Json<InvitationRow>, AppError> {
    require_manager(&state.db, &user, id).await?;
    service::require(&state.db, id).await?;
    let invitation = invitations::revoke(&state.db, id, invitation_id).await?;
    info!("Revoked invitation {invitation_id} of company {id}");
    Ok(Json(invitation))
}

/// POST /api/v1/invitations/:token/accept
pub async fn handle_accept_invitation(
    State(state): State<AppState>,
    user: AuthUser,
    Path(token): Path<String>,
) -> Result<Json<AcceptResponse>, AppError> {
    let account = users::find_by_id(&state.db, user.id)
        .await?
        .filter(|u| u.is_active)
        .ok_or_else(AppError::unauthorized)?;
    if account.role == Role::Admin.as_str() {
        return Err(AppError::Validation(
            "platform admins do not join companies".to_string(),
        ));
    }

    let accepted = invitations::accept(&state.db, token.trim(), &account).await?;
    let company = service::require(&state.db, accepted.invitation.company_id).await?;
    info!(
        "User {} joined company {} as {}",
        user.id, company.id, accepted.role
    );

    Ok(Json(AcceptResponse {
        company,
        role: accepted.role,
        role_changed: accepted.promoted,
    }))
}
