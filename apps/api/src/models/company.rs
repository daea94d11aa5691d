use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::models::text_enum;

text_enum! {
    /// Role of a user inside a company (the tenant).
    pub enum MemberRole {
        Owner => "owner",
        Admin => "admin",
        Recruiter => "recruiter",
    }
}

impl MemberRole {
    /// Owners and admins manage members, invitations and company details.
    pub fn can_manage(&self) -> bool {
        matches!(self, MemberRole::Owner | MemberRole::Admin)
    }
}

text_enum! {
    pub enum InvitationStatus {
        Pending => "pending",
        Accepted => "accepted",
        Revoked => "revoked",
        Expired => "expired",
    }
}

impl InvitationStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, InvitationStatus::Pending)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct CompanyRow {
    pub id: Uuid,
    pub name: String,
    pub slug: String,
    pub description: Option<String>,
    pub website: Option<String>,
    pub location: Option<String>,
    pub logo_key: Option<String>,
    pub created_by: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Membership joined with the member's user record.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct CompanyMemberRow {
    pub company_id: Uuid,
    pub user_id: Uuid,
    pub role: String,
    pub email: String,
    pub full_name: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct InvitationRow {
    pub id: Uuid,
    pub company_id: Uuid,
    pub email: String,
    pub role: String,
    pub token: String,
    pub invited_by: Uuid,
    pub status: String,
    pub expires_at: DateTime<Utc>,
    pub accepted_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_member_role_round_trip_text() {
        for role in MemberRole::ALL {
            assert_eq!(MemberRole::from_str(role.as_str()).unwrap(), *role);
        }
        assert!(MemberRole::from_str("superuser").is_err());
    }

    #[test]
    fn test_only_pending_invitation_is_open() {
        assert!(!InvitationStatus::Pending.is_terminal());
        assert!(InvitationStatus::Accepted.is_terminal());
        assert!(InvitationStatus::Revoked.is_terminal());
        assert!(InvitationStatus::Expired.is_terminal());
    }

    #[test]
    fn test_recruiter_cannot_manage() {
        assert!(MemberRole::Owner.can_manage());
        assert!(MemberRole::Admin.can_manage());
        assert!(!MemberRole::Recruiter.can_manage());
    }
}
