pub mod health;

use axum::{
    extract::DefaultBodyLimit,
    middleware,
    routing::{delete, get, patch, post},
    Router,
};

use crate::monitoring::{metrics_handler, middleware::track_requests};
use crate::state::AppState;
use crate::{applications, auth, candidates, companies, jobs, notifications};

/// Multipart framing on top of the file itself.
const MULTIPART_OVERHEAD_BYTES: usize = 64 * 1024;

pub fn build_router(state: AppState) -> Router {
    let body_limit = state.config.max_upload_bytes + MULTIPART_OVERHEAD_BYTES;

    Router::new()
        .route("/health", get(health::health_handler))
        .route("/health/ready", get(health::ready_handler))
        .route("/metrics", get(metrics_handler))
        .nest("/api/v1", api_routes())
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(middleware::from_fn(track_requests))
        .with_state(state)
}

fn api_routes() -> Router<AppState> {
    Router::new()
        // Auth
        .route("/auth/register", post(auth::handlers::handle_register))
        .route("/auth/login", post(auth::handlers::handle_login))
        .route("/auth/refresh", post(auth::handlers::handle_refresh))
        .route("/auth/logout", post(auth::handlers::handle_logout))
        .route("/auth/me", get(auth::handlers::handle_me))
        // Companies
        .route("/companies", post(companies::handlers::handle_create))
        .route(
            "/companies/:id",
            get(companies::handlers::handle_get).patch(companies::handlers::handle_update),
        )
        .route("/companies/:id/logo", post(companies::handlers::handle_upload_logo))
        .route("/companies/:id/members", get(companies::handlers::handle_list_members))
        .route(
            "/companies/:id/members/:user_id",
            delete(companies::handlers::handle_remove_member),
        )
        .route(
            "/companies/:id/invitations",
            get(companies::handlers::handle_list_invitations)
                .post(companies::handlers::handle_invite),
        )
        .route(
            "/companies/:id/invitations/:invitation_id",
            delete(companies::handlers::handle_revoke_invitation),
        )
        .route(
            "/companies/:id/jobs",
            get(jobs::handlers::handle_list_for_company).post(jobs::handlers::handle_create),
        )
        .route(
            "/invitations/:token/accept",
            post(companies::handlers::handle_accept_invitation),
        )
        // Jobs
        .route("/jobs", get(jobs::handlers::handle_list))
        .route(
            "/jobs/:id",
            get(jobs::handlers::handle_get)
                .patch(jobs::handlers::handle_update)
                .delete(jobs::handlers::handle_archive),
        )
        .route("/jobs/:id/publish", post(jobs::handlers::handle_publish))
        .route("/jobs/:id/close", post(jobs::handlers::handle_close))
        .route(
            "/jobs/:id/applications",
            get(applications::handlers::handle_list_for_job)
                .post(applications::handlers::handle_apply),
        )
        // Candidates
        .route(
            "/candidates/me",
            get(candidates::handlers::handle_get_me).put(candidates::handlers::handle_update_me),
        )
        .route("/candidates/me/cv", post(candidates::handlers::handle_upload_cv))
        .route(
            "/candidates/me/cv/analyses",
            get(candidates::handlers::handle_list_analyses),
        )
        .route("/candidates/:user_id", get(candidates::handlers::handle_get_candidate))
        // Applications
        .route("/applications/me", get(applications::handlers::handle_list_mine))
        .route("/applications/:id", get(applications::handlers::handle_get))
        .route(
            "/applications/:id/status",
            patch(applications::handlers::handle_change_status),
        )
        .route(
            "/applications/:id/withdraw",
            post(applications::handlers::handle_withdraw),
        )
        .route("/applications/:id/history", get(applications::handlers::handle_history))
        .route(
            "/applications/:id/messages",
            get(applications::handlers::handle_list_messages)
                .post(applications::handlers::handle_send_message),
        )
        .route("/applications/:id/cv", get(applications::handlers::handle_download_cv))
        // Notifications
        .route("/notifications", get(notifications::handlers::handle_list))
        .route(
            "/notifications/unread-count",
            get(notifications::handlers::handle_unread_count),
        )
        .route(
            "/notifications/read-all",
            post(notifications::handlers::handle_mark_all_read),
        )
        .route(
            "/notifications/:id/read",
            post(notifications::handlers::handle_mark_read),
        )
        .route("/notifications/:id", delete(notifications::handlers::handle_delete))
}
