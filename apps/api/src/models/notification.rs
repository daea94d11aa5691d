use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::FromRow;
use uuid::Uuid;

use crate::models::text_enum;

text_enum! {
    pub enum NotificationKind {
        ApplicationReceived => "application_received",
        ApplicationStatusChanged => "application_status_changed",
        MessageReceived => "message_received",
        CompanyInvitation => "company_invitation",
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct NotificationRow {
    pub id: Uuid,
    pub user_id: Uuid,
    pub kind: String,
    pub title: String,
    pub body: String,
    pub data: Value,
    pub read_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}
