use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};
use utoipa::ToSchema;

#[derive(Debug, Copy, Clone, Eq, PartialEq, Serialize, Deserialize, ToSchema, AsRefStr, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum AttendanceStatus {
    Present,
    HalfDay,
    Absent,
    Leave,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
pub struct AttendanceRecord {
    pub id: u64,
    pub user_id: u64,
    #[schema(value_type = String, format = "date", example = "2026-01-05")]
    pub date: NaiveDate,
    #[schema(value_type = Option<String>, format = "date-time")]
    pub check_in: Option<DateTime<Utc>>,
    #[schema(value_type = Option<String>, format = "date-time")]
    pub check_out: Option<DateTime<Utc>>,
    #[schema(value_type = Option<f64>, example = 8.25)]
    pub work_hours: Option<Decimal>,
    #[schema(example = "present")]
    pub status: String,
}

/// Hours between check-in and check-out, rounded to two decimals.
pub fn work_hours(check_in: DateTime<Utc>, check_out: DateTime<Utc>) -> Decimal {
    let seconds = (check_out - check_in).num_seconds().max(0);
    (Decimal::from(seconds) / Decimal::from(3600)).round_dp(2)
}

pub fn status_for_hours(hours: Decimal, half_day_hours: Decimal) -> AttendanceStatus {
    if hours < half_day_hours {
        AttendanceStatus::HalfDay
    } else {
        AttendanceStatus::Present
    }
}
