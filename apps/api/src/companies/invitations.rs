//! Company invitations: pending → accepted | revoked | expired.

use std::str::FromStr;

use argon2::password_hash::rand_core::{OsRng, RngCore};
use chrono::{DateTime, Duration, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::auth::users;
use crate::companies::service::add_member;
use crate::errors::AppError;
use crate::models::company::{InvitationRow, InvitationStatus, MemberRole};
use crate::models::user::{Role, UserRow};

/// 256 random bits, hex encoded.
pub fn generate_token() -> String {
    let mut bytes = [0u8; 32];
    OsRng.fill_bytes(&mut bytes);
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

/// Why an invitation cannot be accepted, checked in this order.
#[derive(Debug, PartialEq, Eq)]
pub enum AcceptError {
    NotPending(InvitationStatus),
    Expired,
    WrongRecipient,
}

impl From<AcceptError> for AppError {
    fn from(e: AcceptError) -> Self {
        match e {
            AcceptError::NotPending(status) => {
                AppError::Conflict(format!("Invitation is already {status}"))
            }
            AcceptError::Expired => AppError::UnprocessableEntity("Invitation has expired".to_string()),
            AcceptError::WrongRecipient => AppError::Forbidden,
        }
    }
}

pub fn check_acceptable(
    invitation: &InvitationRow,
    caller_email: &str,
    now: DateTime<Utc>,
) -> Result<(), AcceptError> {
    let status = InvitationStatus::from_str(&invitation.status)
        .map_err(|_| AcceptError::NotPending(InvitationStatus::Revoked))?;
    if status.is_terminal() {
        return Err(AcceptError::NotPending(status));
    }
    if invitation.expires_at <= now {
        return Err(AcceptError::Expired);
    }
    if !invitation.email.eq_ignore_ascii_case(caller_email) {
        return Err(AcceptError::WrongRecipient);
    }
    Ok(())
}

pub async fn create(
    pool: &PgPool,
    company_id: Uuid,
    email: &str,
    role: MemberRole,
    invited_by: Uuid,
    ttl_days: i64,
) -> Result<InvitationRow, AppError> {
    let already_member: bool = sqlx::query_scalar(
        r#"
        SELECT EXISTS(
            SELECT 1 FROM company_members m JOIN users u ON u.id = m.user_id
            WHERE m.company_id = $1 AND u.email = $2
        )
        "#,
    )
    .bind(company_id)
    .bind(email)
    .fetch_one(pool)
    .await?;
    if already_member {
        return Err(AppError::Conflict(format!("{email} is already a member")));
    }

    let mut tx = pool.begin().await?;
    // Lapsed pending invitations no longer block a new one.
    sqlx::query(
        r#"
        UPDATE company_invitations SET status = 'expired'
        WHERE company_id = $1 AND email = $2 AND status = 'pending' AND expires_at <= NOW()
        "#,
    )
    .bind(company_id)
    .bind(email)
    .execute(&mut *tx)
    .await?;

    let pending: bool = sqlx::query_scalar(
        r#"
        SELECT EXISTS(
            SELECT 1 FROM company_invitations
            WHERE company_id = $1 AND email = $2 AND status = 'pending'
        )
        "#,
    )
    .bind(company_id)
    .bind(email)
    .fetch_one(&mut *tx)
    .await?;
    if pending {
        return Err(AppError::Conflict(format!(
            "{email} already has a pending invitation"
        )));
    }

    let invitation = sqlx::query_as::<_, InvitationRow>(
        r#"
        INSERT INTO company_invitations
            (id, company_id, email, role, token, invited_by, status, expires_at)
        VALUES ($1, $2, $3, $4, $5, $6, 'pending', $7)
        RETURNING *
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(company_id)
    .bind(email)
    .bind(role.as_str())
    .bind(generate_token())
    .bind(invited_by)
    .bind(Utc::now() + Duration::days(ttl_days))
    .fetch_one(&mut *tx)
    .await?;
    tx.commit().await?;
    Ok(invitation)
}

pub async fn list(pool: &PgPool, company_id: Uuid) -> Result<Vec<InvitationRow>, sqlx::Error> {
    sqlx::query_as::<_, InvitationRow>(
        "SELECT * FROM company_invitations WHERE company_id = $1 ORDER BY created_at DESC",
    )
    .bind(company_id)
    .fetch_all(pool)
    .await
}

pub async fn revoke(
    pool: &PgPool,
    company_id: Uuid,
    invitation_id: Uuid,
) -> Result<InvitationRow, AppError> {
    let mut tx = pool.begin().await?;
    let invitation = sqlx::query_as::<_, InvitationRow>(
        "SELECT * FROM company_invitations WHERE id = $1 AND company_id = $2 FOR UPDATE",
    )
    .bind(invitation_id)
    .bind(company_id)
    .fetch_optional(&mut *tx)
    .await?
    .ok_or_else(|| AppError::NotFound("Invitation not found".to_string()))?;

    let status = InvitationStatus::from_str(&invitation.status)?;
    if status.is_terminal() {
        return Err(AppError::Conflict(format!("Invitation is already {status}")));
    }

    let revoked = sqlx::query_as::<_, InvitationRow>(
        "UPDATE company_invitations SET status = 'revoked' WHERE id = $1 RETURNING *",
    )
    .bind(invitation_id)
    .fetch_one(&mut *tx)
    .await?;
    tx.commit().await?;
    Ok(revoked)
}

#[derive(Debug)]
pub struct Accepted {
    pub invitation: InvitationRow,
    pub role: MemberRole,
    /// The account was a candidate and is now a recruiter.
    pub promoted: bool,
}

/// Accepts an invitation for `user`. An expired invitation is marked
/// `expired` (and that change is kept) before the 422 is returned.
pub async fn accept(pool: &PgPool, token: &str, user: &UserRow) -> Result<Accepted, AppError> {
    let mut tx = pool.begin().await?;
    let invitation = sqlx::query_as::<_, InvitationRow>(
        "SELECT * FROM company_invitations WHERE token = $1 FOR UPDATE",
    )
    .bind(token)
    .fetch_optional(&mut *tx)
    .await?
    .ok_or_else(|| AppError::NotFound("Invitation not found".to_string()))?;

    match check_acceptable(&invitation, &user.email, Utc::now()) {
        Ok(()) => {}
        Err(AcceptError::Expired) => {
            sqlx::query("UPDATE company_invitations SET status = 'expired' WHERE id = $1")
                .bind(invitation.id)
                .execute(&mut *tx)
                .await?;
            tx.commit().await?;
            return Err(AcceptError::Expired.into());
        }
        Err(e) => return Err(e.into()),
    }

    let role = MemberRole::from_str(&invitation.role)?;
    let is_member: bool = sqlx::query_scalar(
        "SELECT EXISTS(SELECT 1 FROM company_members WHERE company_id = $1 AND user_id = $2)",
    )
    .bind(invitation.company_id)
    .bind(user.id)
    .fetch_one(&mut *tx)
    .await?;
    if is_member {
        return Err(AppError::Conflict("You are already a member of this company".to_string()));
    }

    add_member(&mut tx, invitation.company_id, user.id, role).await?;
    let promoted = user.role == Role::Candidate.as_str();
    if promoted {
        users::set_role(&mut tx, user.id, Role::Recruiter).await?;
    }

    let invitation = sqlx::query_as::<_, InvitationRow>(
        r#"
        UPDATE company_invitations SET status = 'accepted', accepted_at = NOW()
        WHERE id = $1
        RETURNING *
        "#,
    )
    .bind(invitation.id)
    .fetch_one(&mut *tx)
    .await?;
    tx.commit().await?;

    Ok(Accepted {
        invitation,
        role,
        promoted,
    })
}
