//! Axum route handlers for the Auth API.

use axum::{extract::State, http::StatusCode, Json};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use tracing::{info, warn};

use crate::auth::jwt::TokenPair;
use crate::auth::password::{hash_password, verify_password, MAX_PASSWORD_LEN, MIN_PASSWORD_LEN};
use crate::auth::{refresh_store, users, AuthUser};
use crate::candidates::service::create_empty_profile;
use crate::errors::AppError;
use crate::models::user::{Role, UserResponse, UserRow};
use crate::monitoring::{inc, METRICS};
use crate::state::AppState;
use crate::validation::{normalize_email, require_email, require_text};

const INVALID_CREDENTIALS: &str = "Invalid email or password";
const INVALID_REFRESH: &str = "Invalid or expired refresh token";

// ────────────────────────────────────────────────────────────────────────────
// Request / Response types
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    pub full_name: String,
    pub role: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub user: UserResponse,
    #[serde(flatten)]
    pub tokens: TokenPair,
}

/// Validated registration input.
#[derive(Debug)]
struct NewUser {
    email: String,
    full_name: String,
    role: Role,
}

impl RegisterRequest {
    fn validate(&self) -> Result<NewUser, AppError> {
        let email = require_email(&self.email)?;
        let full_name = require_text("full_name", &self.full_name, 1, 120)?;
        let password_len = self.password.chars().count();
        if !(MIN_PASSWORD_LEN..=MAX_PASSWORD_LEN).contains(&password_len) {
            return Err(AppError::Validation(format!(
                "password must be between {MIN_PASSWORD_LEN} and {MAX_PASSWORD_LEN} characters"
            )));
        }
        let role = Role::from_str(self.role.trim())?;
        if role == Role::Admin {
            return Err(AppError::Validation(
                "role must be 'candidate' or 'recruiter'".to_string(),
            ));
        }
        Ok(NewUser {
            email,
            full_name,
            role,
        })
    }
}

fn role_of(user: &UserRow) -> Result<Role, AppError> {
    Role::from_str(&user.role).map_err(|_| {
        AppError::Internal(anyhow::anyhow!("user {} has unknown role '{}'", user.id, user.role))
    })
}

async fn issue_tokens(state: &AppState, user: &UserRow) -> Result<TokenPair, AppError> {
    let pair = state
        .jwt
        .issue_pair(user.id, role_of(user)?)
        .map_err(|e| AppError::Internal(anyhow::anyhow!("token signing failed: {e}")))?;
    refresh_store::record(&state.db, pair.refresh_jti, user.id, pair.refresh_expires_at).await?;
    Ok(pair)
}

// ────────────────────────────────────────────────────────────────────────────
// Handlers
// ────────────────────────────────────────────────────────────────────────────

/// POST /api/v1/auth/register
pub async fn handle_register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<AuthResponse>), AppError> {
    let new_user = req.validate()?;

    if users::find_by_email(&state.db, &new_user.email).await?.is_some() {
        inc(&METRICS.auth_events_total, &["register", "conflict"]);
        return Err(AppError::Conflict(
            "An account with this email already exists".to_string(),
        ));
    }

    let password_hash = hash_password(req.password)
        .await
        .map_err(|e| AppError::Internal(e.into()))?;

    let mut tx = state.db.begin().await?;
    let user = users::insert(
        &mut tx,
        &new_user.email,
        &password_hash,
        &new_user.full_name,
        new_user.role,
    )
    .await?;
    if new_user.role == Role::Candidate {
        create_empty_profile(&mut tx, user.id).await?;
    }
    tx.commit().await?;

    info!("Registered {} user {}", new_user.role, user.id);
    inc(&METRICS.auth_events_total, &["register", "success"]);

    let tokens = issue_tokens(&state, &user).await?;
    Ok((
        StatusCode::CREATED,
        Json(AuthResponse {
            user: user.into(),
            tokens,
        }),
    ))
}

/// POST /api/v1/auth/login
///
/// Unknown email, inactive account and wrong password are indistinguishable.
pub async fn handle_login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> Result<Json<AuthResponse>, AppError> {
    let email = normalize_email(&req.email);
    let user = match users::find_by_email(&state.db, &email).await? {
        Some(user) if user.is_active => user,
        _ => {
            inc(&METRICS.auth_events_total, &["login", "failure"]);
            return Err(AppError::Unauthorized(INVALID_CREDENTIALS.to_string()));
        }
    };

    let valid = verify_password(req.password, user.password_hash.clone())
        .await
        .map_err(|e| AppError::Internal(e.into()))?;
    if !valid {
        inc(&METRICS.auth_events_total, &["login", "failure"]);
        return Err(AppError::Unauthorized(INVALID_CREDENTIALS.to_string()));
    }

    inc(&METRICS.auth_events_total, &["login", "success"]);
    let tokens = issue_tokens(&state, &user).await?;
    Ok(Json(AuthResponse {
        user: user.into(),
        tokens,
    }))
}

/// POST /api/v1/auth/refresh
///
/// Rotates the refresh token. Replaying a revoked token revokes the whole
/// token family of that user.
pub async fn handle_refresh(
    State(state): State<AppState>,
    Json(req): Json<RefreshRequest>,
) -> Result<Json<AuthResponse>, AppError> {
    let reject = || {
        inc(&METRICS.auth_events_total, &["refresh", "failure"]);
        AppError::Unauthorized(INVALID_REFRESH.to_string())
    };

    let claims = state
        .jwt
        .validate_refresh(req.refresh_token.trim())
        .map_err(|_| reject())?;
    let stored = refresh_store::find(&state.db, claims.jti)
        .await?
        .ok_or_else(reject)?;

    if stored.revoked_at.is_some() {
        let revoked = refresh_store::revoke_all_for_user(&state.db, stored.user_id).await?;
        warn!(
            "Refresh token {} replayed for user {}; revoked {} live tokens",
            stored.jti, stored.user_id, revoked
        );
        inc(&METRICS.auth_events_total, &["refresh", "reuse_detected"]);
        return Err(AppError::Unauthorized(INVALID_REFRESH.to_string()));
    }
    if stored.expires_at <= chrono::Utc::now() {
        return Err(reject());
    }

    let user = match users::find_by_id(&state.db, stored.user_id).await? {
        Some(user) if user.is_active => user,
        _ => return Err(reject()),
    };

    let pair = state
        .jwt
        .issue_pair(user.id, role_of(&user)?)
        .map_err(|e| AppError::Internal(anyhow::anyhow!("token signing failed: {e}")))?;
    let rotated = refresh_store::rotate(
        &state.db,
        stored.jti,
        pair.refresh_jti,
        user.id,
        pair.refresh_expires_at,
    )
    .await?;
    if !rotated {
        return Err(reject());
    }

    inc(&METRICS.auth_events_total, &["refresh", "success"]);
    Ok(Json(AuthResponse {
        user: user.into(),
        tokens: pair,
    }))
}

/// POST /api/v1/auth/logout
///
/// Always 204: an unknown or malformed token has nothing left to revoke.
pub async fn handle_logout(
    State(state): State<AppState>,
    Json(req): Json<RefreshRequest>,
) -> Result<StatusCode, AppError> {
    if let Ok(claims) = state.jwt.validate_refresh(req.refresh_token.trim()) {
        refresh_store::revoke(&state.db, claims.jti).await?;
        info!("User {} logged out", claims.sub);
    }
    Ok(StatusCode::NO_CONTENT)
}

/// GET /api/v1/auth/me
pub async fn handle_me(
    State(state): State<AppState>,
    auth: AuthUser,
) -> Result<Json<UserResponse>, AppError> {
    let user = users::find_by_id(&state.db, auth.id)
        .await?
        .filter(|u| u.is_active)
        .ok_or_else(AppError::unauthorized)?;
    Ok(Json(user.into()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(email: &str, password: &str, role: &str) -> RegisterRequest {
        RegisterRequest {
            email: email.into(),
            password: password.into(),
            full_name: "Jane Doe".into(),
            role: role.into(),
        }
    }

    #[test]
    fn test_register_validation_accepts_candidate() {
        let user = request(" Jane@Example.com ", "long enough", "candidate")
            .validate()
            .unwrap();
        assert_eq!(user.email, "jane@example.com");
        assert_eq!(user.role, Role::Candidate);
    }

    #[test]
    fn test_register_rejects_admin_self_signup() {
        assert!(matches!(
            request("a@example.com", "long enough", "admin").validate(),
            Err(AppError::Validation(_))
        ));
    }

    #[test]
    fn test_register_rejects_short_password_and_bad_role() {
        assert!(request("a@example.com", "short", "candidate").validate().is_err());
        assert!(request("a@example.com", "long enough", "boss").validate().is_err());
        assert!(request("not-an-email", "long enough", "recruiter").validate().is_err());
    }
}
