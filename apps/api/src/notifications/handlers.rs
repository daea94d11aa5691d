use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::auth::AuthUser;
use crate::errors::AppError;
use crate::models::notification::NotificationRow;
use crate::models::pagination::{Page, Paginated};
use crate::notifications::service;
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct NotificationQuery {
    pub page: Option<u32>,
    pub limit: Option<u32>,
    #[serde(default)]
    pub unread_only: bool,
}

#[derive(Debug, Serialize)]
pub struct UnreadCount {
    pub unread: i64,
}

#[derive(Debug, Serialize)]
pub struct ReadAllResponse {
    pub updated: u64,
}

fn not_found() -> AppError {
    AppError::NotFound("Notification not found".to_string())
}

/// GET /api/v1/notifications
pub async fn handle_list(
    State(state): State<AppState>,
    user: AuthUser,
    Query(query): Query<NotificationQuery>,
) -> Result<Json<Paginated<NotificationRow>>, AppError> {
    let page = Page::new(query.page, query.limit);
    let (items, total) = service::list(&state.db, user.id, query.unread_only, page).await?;
    Ok(Json(Paginated::new(items, total, page)))
}

/// GET /api/v1/notifications/unread-count
pub async fn handle_unread_count(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<Json<UnreadCount>, AppError> {
    let unread = service::unread_count(&state.db, user.id).await?;
    Ok(Json(UnreadCount { unread }))
}

/// POST /api/v1/notifications/:id/read
pub async fn handle_mark_read(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<NotificationRow>, AppError> {
    let row = service::mark_read(&state.db, user.id, id)
        .await?
        .ok_or_else(not_found)?;
    Ok(Json(row))
}

/// POST /api/v1/notifications/read-all
pub async fn handle_mark_all_read(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<Json<ReadAllResponse>, AppError> {
    let updated = service::mark_all_read(&state.db, user.id).await?;
    Ok(Json(ReadAllResponse { updated }))
}

/// DELETE /api/v1/notifications/:id
pub async fn handle_delete(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    if service::delete(&state.db, user.id, id).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(not_found())
    }
}
