use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};
use utoipa::ToSchema;

#[derive(Debug, Copy, Clone, Eq, PartialEq, Serialize, Deserialize, ToSchema, AsRefStr, Display, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum LeaveType {
    Paid,
    Sick,
    Unpaid,
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, Serialize, Deserialize, ToSchema, AsRefStr, Display, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum LeaveStatus {
    Pending,
    Approved,
    Rejected,
}

impl LeaveStatus {
    /// Only a pending request can be decided, and only into a final state.
    pub fn can_transition_to(self, next: LeaveStatus) -> bool {
        matches!(
            (self, next),
            (LeaveStatus::Pending, LeaveStatus::Approved) | (LeaveStatus::Pending, LeaveStatus::Rejected)
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
#[schema(example = json!({
    "id": 1,
    "user_id": 7,
    "leave_type": "sick",
    "start_date": "2026-01-10",
    "end_date": "2026-01-12",
    "remarks": "Flu",
    "status": "approved",
    "admin_comment": "ok",
    "reviewed_by": 1,
    "reviewed_at": "2026-01-09T10:00:00Z",
    "created_at": "2026-01-08T08:00:00Z"
}))]
pub struct LeaveRequest {
    pub id: u64,
    pub user_id: u64,
    pub leave_type: String,
    #[schema(value_type = String, format = "date")]
    pub start_date: NaiveDate,
    #[schema(value_type = String, format = "date")]
    pub end_date: NaiveDate,
    pub remarks: Option<String>,
    pub status: String,
    pub admin_comment: Option<String>,
    pub reviewed_by: Option<u64>,
    #[schema(value_type = Option<String>, format = "date-time")]
    pub reviewed_at: Option<DateTime<Utc>>,
    #[schema(value_type = String, format = "date-time")]
    pub created_at: DateTime<Utc>,
}

pub const LEAVE_COLUMNS: &str = "id, user_id, leave_type, start_date, end_date, remarks, status, \
     admin_comment, reviewed_by, reviewed_at, created_at";

/// Inclusive day count of a leave range.
pub fn leave_days(start: NaiveDate, end: NaiveDate) -> i64 {
    (end - start).num_days() + 1
}
