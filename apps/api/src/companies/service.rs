use std::str::FromStr;

use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::company::{CompanyMemberRow, CompanyRow, MemberRole};

/// Company details as validated from a request.
#[derive(Debug, Clone, PartialEq)]
pub struct CompanyFields {
    pub name: String,
    pub description: Option<String>,
    pub website: Option<String>,
    pub location: Option<String>,
}

/// Lowercase ASCII alphanumerics separated by single dashes.
/// Non-ASCII letters are dropped, so "Café Ñandú" becomes "caf-and".
pub fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    let mut pending_dash = false;
    for c in name.chars() {
        if c.is_ascii_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.push(c.to_ascii_lowercase());
        } else {
            pending_dash = true;
        }
    }
    slug.truncate(80);
    slug.trim_end_matches('-').to_string()
}

pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<CompanyRow>, sqlx::Error> {
    sqlx::query_as::<_, CompanyRow>("SELECT * FROM companies WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await
}

pub async fn require(pool: &PgPool, id: Uuid) -> Result<CompanyRow, AppError> {
    find_by_id(pool, id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Company {id} not found")))
}

/// Inserts the company and its creator as `owner` in one transaction.
pub async fn create(
    pool: &PgPool,
    creator: Uuid,
    fields: &CompanyFields,
) -> Result<CompanyRow, AppError> {
    let slug = slugify(&fields.name);
    if slug.is_empty() {
        return Err(AppError::Validation(
            "name must contain at least one ASCII letter or digit".to_string(),
        ));
    }
    let taken: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM companies WHERE slug = $1)")
        .bind(&slug)
        .fetch_one(pool)
        .await?;
    if taken {
        return Err(AppError::Conflict(format!(
            "A company with the slug '{slug}' already exists"
        )));
    }

    let mut tx = pool.begin().await?;
    let company = sqlx::query_as::<_, CompanyRow>(
        r#"
        INSERT INTO companies (id, name, slug, description, website, location, created_by)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        RETURNING *
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(&fields.name)
    .bind(&slug)
    .bind(&fields.description)
    .bind(&fields.website)
    .bind(&fields.location)
    .bind(creator)
    .fetch_one(&mut *tx)
    .await?;
    add_member(&mut tx, company.id, creator, MemberRole::Owner).await?;
    tx.commit().await?;
    Ok(company)
}

/// The slug stays stable when the name changes, so links keep working.
pub async fn update(
    pool: &PgPool,
    id: Uuid,
    fields: &CompanyFields,
) -> Result<Option<CompanyRow>, sqlx::Error> {
    sqlx::query_as::<_, CompanyRow>(
        r#"
        UPDATE companies SET
            name = $2, description = $3, website = $4, location = $5, updated_at = NOW()
        WHERE id = $1
        RETURNING *
        "#,
    )
    .bind(id)
    .bind(&fields.name)
    .bind(&fields.description)
    .bind(&fields.website)
    .bind(&fields.location)
    .fetch_optional(pool)
    .await
}

pub async fn set_logo(pool: &PgPool, id: Uuid, key: &str) -> Result<Option<CompanyRow>, sqlx::Error> {
    sqlx::query_as::<_, CompanyRow>(
        "UPDATE companies SET logo_key = $2, updated_at = NOW() WHERE id = $1 RETURNING *",
    )
    .bind(id)
    .bind(key)
    .fetch_optional(pool)
    .await
}

pub async fn member_role(
    pool: &PgPool,
    company_id: Uuid,
    user_id: Uuid,
) -> Result<Option<MemberRole>, AppError> {
    let role: Option<String> = sqlx::query_scalar(
        "SELECT role FROM company_members WHERE company_id = $1 AND user_id = $2",
    )
    .bind(company_id)
    .bind(user_id)
    .fetch_optional(pool)
    .await?;
    role.map(|r| MemberRole::from_str(&r)).transpose()
}

pub async fn add_member(
    tx: &mut Transaction<'_, Postgres>,
    company_id: Uuid,
    user_id: Uuid,
    role: MemberRole,
) -> Result<(), sqlx::Error> {
    sqlx::query("INSERT INTO company_members (company_id, user_id, role) VALUES ($1, $2, $3)")
        .bind(company_id)
        .bind(user_id)
        .bind(role.as_str())
        .execute(&mut **tx)
        .await?;
    Ok(())
}

pub async fn list_members(
    pool: &PgPool,
    company_id: Uuid,
) -> Result<Vec<CompanyMemberRow>, sqlx::Error> {
    sqlx::query_as::<_, CompanyMemberRow>(
        r#"
        SELECT m.company_id, m.user_id, m.role, u.email, u.full_name, m.created_at
        FROM company_members m
        JOIN users u ON u.id = m.user_id
        WHERE m.company_id = $1
        ORDER BY m.created_at
        "#,
    )
    .bind(company_id)
    .fetch_all(pool)
    .await
}

/// Ids of every member, for fan-out notifications.
pub async fn member_ids(pool: &PgPool, company_id: Uuid) -> Result<Vec<Uuid>, sqlx::Error> {
    sqlx::query_scalar("SELECT user_id FROM company_members WHERE company_id = $1")
        .bind(company_id)
        .fetch_all(pool)
        .await
}

/// Removes a member. The owner rows are locked first so two concurrent
/// removals cannot both pass the last-owner check.
pub async fn remove_member(pool: &PgPool, company_id: Uuid, user_id: Uuid) -> Result<(), AppError> {
    let mut tx = pool.begin().await?;
    let owners: Vec<Uuid> = sqlx::query_scalar(
        "SELECT user_id FROM company_members WHERE company_id = $1 AND role = 'owner' FOR UPDATE",
    )
    .bind(company_id)
    .fetch_all(&mut *tx)
    .await?;

    if owners.len() == 1 && owners[0] == user_id {
        return Err(AppError::Conflict(
            "The last owner of a company cannot be removed".to_string(),
        ));
    }

    let removed = sqlx::query("DELETE FROM company_members WHERE company_id = $1 AND user_id = $2")
        .bind(company_id)
        .bind(user_id)
        .execute(&mut *tx)
        .await?
        .rows_affected();
    if removed == 0 {
        return Err(AppError::NotFound("Member not found".to_string()));
    }
    tx.commit().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slugify() {
        assert_eq!(slugify("Acme Corp"), "acme-corp");
        assert_eq!(slugify("  --Hello,   World!!  "), "hello-world");
        assert_eq!(slugify("R&D 42"), "r-d-42");
        assert_eq!(slugify("Café Ñandú"), "caf-and");
        assert_eq!(slugify("!!!"), "");
    }

    #[test]
    fn test_slug_is_bounded() {
        let slug = slugify(&"ab ".repeat(100));
        assert!(slug.len() <= 80);
        assert!(!slug.ends_with('-'));
    }
}
