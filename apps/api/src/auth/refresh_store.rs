//! Server-side record of issued refresh tokens, keyed by JWT `jti`.
//!
//! A refresh token is only honoured while its row exists, is unexpired and
//! unrevoked. Rotation revokes the presented row and links it to its successor.

use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

#[derive(Debug, Clone, FromRow)]
pub struct RefreshTokenRow {
    pub jti: Uuid,
    pub user_id: Uuid,
    pub expires_at: DateTime<Utc>,
    pub revoked_at: Option<DateTime<Utc>>,
    pub replaced_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

pub async fn record(
    pool: &PgPool,
    jti: Uuid,
    user_id: Uuid,
    expires_at: DateTime<Utc>,
) -> Result<(), sqlx::Error> {
    sqlx::query("INSERT INTO refresh_tokens (jti, user_id, expires_at) VALUES ($1, $2, $3)")
        .bind(jti)
        .bind(user_id)
        .bind(expires_at)
        .execute(pool)
        .await?;
    Ok(())
}

pub async fn find(pool: &PgPool, jti: Uuid) -> Result<Option<RefreshTokenRow>, sqlx::Error> {
    sqlx::query_as::<_, RefreshTokenRow>("SELECT * FROM refresh_tokens WHERE jti = $1")
        .bind(jti)
        .fetch_optional(pool)
        .await
}

/// Revokes `old` and records `new` in one transaction.
/// Returns false if `old` was already revoked by a concurrent rotation.
pub async fn rotate(
    pool: &PgPool,
    old: Uuid,
    new: Uuid,
    user_id: Uuid,
    new_expires_at: DateTime<Utc>,
) -> Result<bool, sqlx::Error> {
    let mut tx = pool.begin().await?;

    let revoked = sqlx::query(
        "UPDATE refresh_tokens SET revoked_at = NOW(), replaced_by = $2 \
         WHERE jti = $1 AND revoked_at IS NULL",
    )
    .bind(old)
    .bind(new)
    .execute(&mut *tx)
    .await?
    .rows_affected();

    if revoked != 1 {
        tx.rollback().await?;
        return Ok(false);
    }

    sqlx::query("INSERT INTO refresh_tokens (jti, user_id, expires_at) VALUES ($1, $2, $3)")
        .bind(new)
        .bind(user_id)
        .bind(new_expires_at)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;
    Ok(true)
}

pub async fn revoke(pool: &PgPool, jti: Uuid) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE refresh_tokens SET revoked_at = NOW() WHERE jti = $1 AND revoked_at IS NULL")
        .bind(jti)
        .execute(pool)
        .await?;
    Ok(())
}

/// Revokes every live refresh token of a user. Returns how many were revoked.
pub async fn revoke_all_for_user(pool: &PgPool, user_id: Uuid) -> Result<u64, sqlx::Error> {
    Ok(sqlx::query(
        "UPDATE refresh_tokens SET revoked_at = NOW() WHERE user_id = $1 AND revoked_at IS NULL",
    )
    .bind(user_id)
    .execute(pool)
    .await?
    .rows_affected())
}
