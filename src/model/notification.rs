use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};
use utoipa::ToSchema;

#[derive(Debug, Copy, Clone, Eq, PartialEq, Serialize, Deserialize, ToSchema, AsRefStr, Display, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum NotificationKind {
    Info,
    Leave,
    Payroll,
    Role,
    Account,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
pub struct Notification {
    pub id: u64,
    pub user_id: u64,
    #[schema(example = "leave")]
    pub kind: String,
    pub title: String,
    pub message: String,
    pub is_read: bool,
    #[schema(value_type = String, format = "date-time")]
    pub created_at: DateTime<Utc>,
}

pub const NOTIFICATION_COLUMNS: &str = "id, user_id, kind, title, message, is_read, created_at";
