//! Axum route handlers for job applications, their status workflow and messages.

use std::str::FromStr;

use axum::{
    extract::{Path, Query, State},
    http::{
        header::{CONTENT_DISPOSITION, CONTENT_TYPE},
        StatusCode,
    },
    response::{IntoResponse, Response},
    Json,
};
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;
use tracing::info;
use uuid::Uuid;

use crate::applications::service::{self, Scope};
use crate::auth::AuthUser;
use crate::candidates::service as candidates;
use crate::companies::access::{access_for, require_member};
use crate::companies::service as companies;
use crate::cv::format::from_extension;
use crate::errors::AppError;
use crate::jobs::service as jobs;
use crate::models::application::{
    ApplicationStatus, ApplicationView, CommunicationRow, Party, StatusHistoryRow,
};
use crate::models::notification::NotificationKind;
use crate::models::pagination::{Page, Paginated};
use crate::models::user::Role;
use crate::monitoring::{inc, METRICS};
use crate::notifications::{notify, notify_many, NewNotification};
use crate::state::AppState;
use crate::validation::{optional_text_max, require_text};

const MAX_COVER_LETTER: usize = 10_000;
const MAX_MESSAGE: usize = 5_000;
const MAX_NOTE: usize = 2_000;

#[derive(Debug, Default, Deserialize)]
pub struct ApplyRequest {
    pub cover_letter: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ApplicationListQuery {
    pub page: Option<u32>,
    pub limit: Option<u32>,
    pub status: Option<String>,
}

impl ApplicationListQuery {
    fn status(&self) -> Result<Option<ApplicationStatus>, AppError> {
        self.status
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(ApplicationStatus::from_str)
            .transpose()
    }
}

#[derive(Debug, Deserialize)]
pub struct StatusChangeRequest {
    pub status: String,
    pub note: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct MessageRequest {
    pub body: String,
}

fn not_found(id: Uuid) -> AppError {
    AppError::NotFound(format!("Application {id} not found"))
}

/// The caller's side of an application. Callers on neither side get 404.
async fn party_for(
    state: &AppState,
    user: &AuthUser,
    application: &ApplicationView,
) -> Result<Party, AppError> {
    if application.application.candidate_id == user.id {
        return Ok(Party::Candidate);
    }
    match access_for(&state.db, user, application.company_id).await? {
        Some(_) => Ok(Party::Company),
        None => Err(not_found(application.application.id)),
    }
}

async fn load(state: &AppState, user: &AuthUser, id: Uuid) -> Result<(ApplicationView, Party), AppError> {
    let application = service::find_view(&state.db, id)
        .await?
        .ok_or_else(|| not_found(id))?;
    let party = party_for(state, user, &application).await?;
    Ok((application, party))
}

async fn notify_company(state: &AppState, company_id: Uuid, notification: &NewNotification) {
    match companies::member_ids(&state.db, company_id).await {
        Ok(ids) => notify_many(&state.db, &ids, notification).await,
        Err(e) => tracing::warn!("Could not load members of {company_id} for notification: {e}"),
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Candidate side
// ────────────────────────────────────────────────────────────────────────────

/// POST /api/v1/jobs/:id/applications
pub async fn handle_apply(
    State(state): State<AppState>,
    user: AuthUser,
    Path(job_id): Path<Uuid>,
    Json(req): Json<ApplyRequest>,
) -> Result<(StatusCode, Json<ApplicationView>), AppError> {
    if user.role != Role::Candidate {
        return Err(AppError::Forbidden);
    }
    let job = jobs::require(&state.db, job_id).await?;
    if !job.accepts_applications(Utc::now()) {
        return Err(AppError::UnprocessableEntity(
            "This job is not accepting applications".to_string(),
        ));
    }
    let cover_letter =
        optional_text_max("cover_letter", req.cover_letter.as_deref(), MAX_COVER_LETTER)?;
    let cv_key = candidates::get_profile(&state.db, user.id)
        .await?
        .and_then(|p| p.cv_key);

    let application = service::create(
        &state.db,
        job.id,
        user.id,
        cover_letter.as_deref(),
        cv_key.as_deref(),
    )
    .await?;
    inc(&METRICS.applications_total, &[ApplicationStatus::Applied.as_str()]);
    info!("Candidate {} applied to job {}", user.id, job.id);

    let view = service::find_view(&state.db, application.id)
        .await?
        .ok_or_else(|| not_found(application.id))?;
    let notification = NewNotification::new(
        NotificationKind::ApplicationReceived,
        format!("New application for {}", job.title),
        format!("{} applied to {}.", view.candidate_name, job.title),
        json!({ "application_id": application.id, "job_id": job.id }),
    );
    notify_company(&state, job.company_id, &notification).await;

    Ok((StatusCode::CREATED, Json(view)))
}

/// GET /api/v1/applications/me
pub async fn handle_list_mine(
    State(state): State<AppState>,
    user: AuthUser,
    Query(query): Query<ApplicationListQuery>,
) -> Result<Json<Paginated<ApplicationView>>, AppError> {
    if user.role != Role::Candidate {
        return Err(AppError::Forbidden);
    }
    let page = Page::new(query.page, query.limit);
    let (items, total) =
        service::list(&state.db, Scope::Candidate(user.id), query.status()?, page).await?;
    Ok(Json(Paginated::new(items, total, page)))
}

/// POST /api/v1/applications/:id/withdraw
pub async fn handle_withdraw(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<ApplicationView>, AppError> {
    let (application, party) = load(&state, &user, id).await?;
    if party != Party::Candidate {
        return Err(AppError::Forbidden);
    }
    service::change_status(
        &state.db,
        id,
        ApplicationStatus::Withdrawn,
        Party::Candidate,
        user.id,
        None,
    )
    .await?;
    inc(&METRICS.applications_total, &[ApplicationStatus::Withdrawn.as_str()]);

    let notification = NewNotification::new(
        NotificationKind::ApplicationStatusChanged,
        format!("Application withdrawn for {}", application.job_title),
        format!("{} withdrew their application.", application.candidate_name),
        json!({ "application_id": id, "status": ApplicationStatus::Withdrawn }),
    );
    notify_company(&state, application.company_id, &notification).await;

    let view = service::find_view(&state.db, id).await?.ok_or_else(|| not_found(id))?;
    Ok(Json(view))
}

// ────────────────────────────────────────────────────────────────────────────
// Company side
// ────────────────────────────────────────────────────────────────────────────

/// GET /api/v1/jobs/:id/applications
pub async fn handle_list_for_job(
    State(state): State<AppState>,
    user: AuthUser,
    Path(job_id): Path<Uuid>,
    Query(query): Query<ApplicationListQuery>,
) -> Result<Json<Paginated<ApplicationView>>, AppError> {
    let job = jobs::require(&state.db, job_id).await?;
    require_member(&state.db, &user, job.company_id).await?;
    let page = Page::new(query.page, query.limit);
    let (items, total) = service::list(&state.db, Scope::Job(job_id), query.status()?, page).await?;
    Ok(Json(Paginated::new(items, total, page)))
}

/// PATCH /api/v1/applications/:id/status
pub async fn handle_change_status(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    Json(req): Json<StatusChangeRequest>,
) -> Result<Json<ApplicationView>, AppError> {
    let (application, party) = load(&state, &user, id).await?;
    if party != Party::Company {
        return Err(AppError::Forbidden);
    }
    let next = ApplicationStatus::from_str(req.status.trim())?;
    let note = optional_text_max("note", req.note.as_deref(), MAX_NOTE)?;

    let (from, _) =
        service::change_status(&state.db, id, next, Party::Company, user.id, note.as_deref()).await?;
    inc(&METRICS.applications_total, &[next.as_str()]);
    info!("Application {id} moved from {from} to {next} by {}", user.id);

    let notification = NewNotification::new(
        NotificationKind::ApplicationStatusChanged,
        format!("Update on your application for {}", application.job_title),
        format!(
            "Your application at {} is now '{next}'.",
            application.company_name
        ),
        json!({ "application_id": id, "from": from, "status": next }),
    );
    notify(&state.db, application.application.candidate_id, &notification).await;

    let view = service::find_view(&state.db, id).await?.ok_or_else(|| not_found(id))?;
    Ok(Json(view))
}

// ────────────────────────────────────────────────────────────────────────────
// Both sides
// ────────────────────────────────────────────────────────────────────────────

/// GET /api/v1/applications/:id
pub async fn handle_get(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<ApplicationView>, AppError> {
    let (application, _) = load(&state, &user, id).await?;
    Ok(Json(application))
}

/// GET /api/v1/applications/:id/history
pub async fn handle_history(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<StatusHistoryRow>>, AppError> {
    load(&state, &user, id).await?;
    Ok(Json(service::history(&state.db, id).await?))
}

/// GET /api/v1/applications/:id/messages
pub async fn handle_list_messages(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<CommunicationRow>>, AppError> {
    load(&state, &user, id).await?;
    Ok(Json(service::messages(&state.db, id).await?))
}

/// POST /api/v1/applications/:id/messages
pub async fn handle_send_message(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    Json(req): Json<MessageRequest>,
) -> Result<(StatusCode, Json<CommunicationRow>), AppError> {
    let (application, party) = load(&state, &user, id).await?;
    if application.application.status == ApplicationStatus::Withdrawn.as_str() {
        return Err(AppError::UnprocessableEntity(
            "Messages cannot be sent on a withdrawn application".to_string(),
        ));
    }
    let body = require_text("body", &req.body, 1, MAX_MESSAGE)?;
    let message = service::add_message(&state.db, id, user.id, &body).await?;

    let notification = NewNotification::new(
        NotificationKind::MessageReceived,
        format!("New message about {}", application.job_title),
        format!("{} sent a message.", message.sender_name),
        json!({ "application_id": id, "message_id": message.id }),
    );
    match party {
        Party::Candidate => notify_company(&state, application.company_id, &notification).await,
        Party::Company => {
            notify(&state.db, application.application.candidate_id, &notification).await
        }
    }

    Ok((StatusCode::CREATED, Json(message)))
}

/// GET /api/v1/applications/:id/cv
///
/// Streams the CV snapshot taken when the candidate applied.
pub async fn handle_download_cv(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Response, AppError> {
    let (application, _) = load(&state, &user, id).await?;
    let key = application
        .application
        .cv_key
        .ok_or_else(|| AppError::NotFound("No CV was attached to this application".to_string()))?;

    let bytes = state.storage.get(&key).await?;
    let format = from_extension(&key);
    let content_type = format.map_or("application/octet-stream", |f| f.content_type());
    let extension = format.map_or("bin", |f| f.extension());
    let disposition = format!("attachment; filename=\"cv-{id}.{extension}\"");

    Ok((
        [
            (CONTENT_TYPE, content_type.to_string()),
            (CONTENT_DISPOSITION, disposition),
        ],
        bytes,
    )
        .into_response())
}
