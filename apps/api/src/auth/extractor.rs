use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts},
};
use tracing::debug;
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::user::Role;
use crate::state::AppState;

/// The caller, authenticated from an `Authorization: Bearer <access token>` header.
#[derive(Debug, Clone, Copy)]
pub struct AuthUser {
    pub id: Uuid,
    pub role: Role,
}

impl AuthUser {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    /// Fails with 403 unless the caller has one of `roles` (admins always pass).
    pub fn require_any(&self, roles: &[Role]) -> Result<(), AppError> {
        if self.is_admin() || roles.contains(&self.role) {
            Ok(())
        } else {
            Err(AppError::Forbidden)
        }
    }
}

fn bearer_token(parts: &Parts) -> Option<&str> {
    let value = parts.headers.get(AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.split_once(' ')?;
    if scheme.eq_ignore_ascii_case("bearer") && !token.trim().is_empty() {
        Some(token.trim())
    } else {
        None
    }
}

#[async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let token = bearer_token(parts).ok_or_else(AppError::unauthorized)?;
        let claims = state.jwt.validate_access(token).map_err(|e| {
            debug!("Rejected access token: {e}");
            AppError::Unauthorized("Invalid or expired access token".to_string())
        })?;
        Ok(AuthUser {
            id: claims.sub,
            role: claims.role,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;

    fn parts_with(header: Option<&str>) -> Parts {
        let mut builder = Request::builder().uri("/");
        if let Some(h) = header {
            builder = builder.header(AUTHORIZATION, h);
        }
        builder.body(()).unwrap().into_parts().0
    }

    #[test]
    fn test_bearer_token_parsing() {
        assert_eq!(bearer_token(&parts_with(Some("Bearer abc"))), Some("abc"));
        assert_eq!(bearer_token(&parts_with(Some("bearer abc"))), Some("abc"));
        assert_eq!(bearer_token(&parts_with(Some("Basic abc"))), None);
        assert_eq!(bearer_token(&parts_with(Some("Bearer "))), None);
        assert_eq!(bearer_token(&parts_with(None)), None);
    }

    #[test]
    fn test_require_any() {
        let candidate = AuthUser {
            id: Uuid::new_v4(),
            role: Role::Candidate,
        };
        let admin = AuthUser {
            id: Uuid::new_v4(),
            role: Role::Admin,
        };
        assert!(candidate.require_any(&[Role::Candidate]).is_ok());
        assert!(candidate.require_any(&[Role::Recruiter]).is_err());
        assert!(admin.require_any(&[Role::Recruiter]).is_ok());
    }
}
