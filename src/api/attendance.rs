use crate::{
    auth::auth::AuthUser,
    config::Config,
    error::ApiError,
    model::attendance::{AttendanceRecord, AttendanceStatus, status_for_hours, work_hours},
};
use actix_web::{HttpResponse, web};
use chrono::{DateTime, Datelike, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, MySqlPool};
use tracing::{error, info};
use utoipa::{IntoParams, ToSchema};

const ATTENDANCE_COLUMNS: &str = "id, user_id, date, check_in, check_out, work_hours, status";

#[derive(Serialize, ToSchema)]
pub struct AttendanceResponse {
    pub success: bool,
    pub attendance: AttendanceRecord,
}

#[derive(Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct MyAttendanceQuery {
    /// Defaults to the current month
    #[param(example = 1)]
    pub month: Option<u32>,
    #[param(example = 2026)]
    pub year: Option<i32>,
}

#[derive(Serialize, ToSchema)]
pub struct AttendanceListResponse {
    pub data: Vec<AttendanceRecord>,
}

#[derive(Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct DailyAttendanceQuery {
    /// YYYY-MM-DD, defaults to today (UTC)
    pub date: Option<NaiveDate>,
}

/// One row per employee for the requested day; employees without a record show as `absent`.
#[derive(Serialize, FromRow, ToSchema)]
pub struct DailyAttendanceRow {
    pub user_id: u64,
    pub employee_id: String,
    pub full_name: String,
    pub department: Option<String>,
    pub attendance_id: Option<u64>,
    #[schema(value_type = Option<String>, format = "date-time")]
    pub check_in: Option<DateTime<Utc>>,
    #[schema(value_type = Option<String>, format = "date-time")]
    pub check_out: Option<DateTime<Utc>>,
    #[schema(value_type = Option<f64>)]
    pub work_hours: Option<Decimal>,
    #[schema(example = "present")]
    pub status: String,
}

#[derive(Serialize, ToSchema)]
pub struct DailyAttendanceResponse {
    #[schema(value_type = String, format = "date")]
    pub date: NaiveDate,
    pub data: Vec<DailyAttendanceRow>,
}

async fn todays_record(
    pool: &MySqlPool,
    user_id: u64,
    today: NaiveDate,
) -> Result<Option<AttendanceRecord>, sqlx::Error> {
    sqlx::query_as::<_, AttendanceRecord>(&format!(
        "SELECT {} FROM attendance WHERE user_id = ? AND date = ?",
        ATTENDANCE_COLUMNS
    ))
    .bind(user_id)
    .bind(today)
    .fetch_optional(pool)
    .await
}

/// Explains why today's row already exists.
fn check_in_conflict(existing: Option<&AttendanceRecord>) -> ApiError {
    match existing {
        Some(record) if record.status == AttendanceStatus::Leave.as_ref() => {
            ApiError::conflict("Today is marked as approved leave")
        }
        _ => ApiError::conflict("Already checked in today"),
    }
}

/// Check-in endpoint
#[utoipa::path(
    post,
    path = "/api/me/attendance/check-in",
    responses(
        (status = 201, description = "Checked in", body = AttendanceResponse),
        (status = 401, description = "Unauthorized"),
        (status = 409, description = "Already checked in today, or the day is approved leave", body = Object, example = json!({
            "error": "Already checked in today"
        })),
        (status = 500, description = "Internal server error")
    ),
    security(("bearer_auth" = [])),
    tag = "Attendance"
)]
pub async fn check_in(auth: AuthUser, pool: web::Data<MySqlPool>) -> Result<HttpResponse, ApiError> {
    let now = Utc::now();
    let today = now.date_naive();

    let result = sqlx::query(
        r#"
        INSERT INTO attendance (user_id, date, check_in, status)
        VALUES (?, ?, ?, ?)
        "#,
    )
    .bind(auth.user_id)
    .bind(today)
    .bind(now)
    .bind(AttendanceStatus::Present.as_ref())
    .execute(pool.get_ref())
    .await;

    if let Err(e) = result {
        // (user_id, date) is unique: the second check-in of the day lands here
        let err = ApiError::on_duplicate(e, "Already checked in today");
        if matches!(err, ApiError::Conflict(_)) {
            let existing = todays_record(pool.get_ref(), auth.user_id, today).await?;
            return Err(check_in_conflict(existing.as_ref()));
        }
        error!(user_id = auth.user_id, "Check-in failed");
        return Err(err);
    }

    let attendance = todays_record(pool.get_ref(), auth.user_id, today)
        .await?
        .ok_or(ApiError::Internal)?;

    info!(user_id = auth.user_id, date = %today, "Checked in");

    Ok(HttpResponse::Created().json(AttendanceResponse {
        success: true,
        attendance,
    }))
}

/// Check-out endpoint
#[utoipa::path(
    post,
    path = "/api/me/attendance/check-out",
    responses(
        (status = 200, description = "Checked out", body = AttendanceResponse),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "No check-in found for today"),
        (status = 409, description = "Already checked out today"),
        (status = 500, description = "Internal server error")
    ),
    security(("bearer_auth" = [])),
    tag = "Attendance"
)]
pub async fn check_out(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
) -> Result<HttpResponse, ApiError> {
    let now = Utc::now();
    let today = now.date_naive();

    let record = todays_record(pool.get_ref(), auth.user_id, today)
        .await?
        .ok_or_else(|| ApiError::not_found("No check-in found for today"))?;

    if record.check_out.is_some() {
        return Err(ApiError::conflict("Already checked out today"));
    }

    let check_in = record
        .check_in
        .ok_or_else(|| ApiError::not_found("No check-in found for today"))?;

    let hours = work_hours(check_in, now);
    let status = status_for_hours(hours, config.half_day_hours);

    let result = sqlx::query(
        r#"
        UPDATE attendance
        SET check_out = ?, work_hours = ?, status = ?
        WHERE id = ?
        AND check_out IS NULL
        "#,
    )
    .bind(now)
    .bind(hours)
    .bind(status.as_ref())
    .bind(record.id)
    .execute(pool.get_ref())
    .await?;

    // A concurrent check-out won the race
    if result.rows_affected() == 0 {
        return Err(ApiError::conflict("Already checked out today"));
    }

    let attendance = todays_record(pool.get_ref(), auth.user_id, today)
        .await?
        .ok_or(ApiError::Internal)?;

    info!(user_id = auth.user_id, work_hours = %hours, status = %status, "Checked out");

    Ok(HttpResponse::Ok().json(AttendanceResponse {
        success: true,
        attendance,
    }))
}

#[utoipa::path(
    get,
    path = "/api/me/attendance",
    params(MyAttendanceQuery),
    responses(
        (status = 200, description = "Caller's attendance, newest first", body = AttendanceListResponse),
        (status = 400, description = "Invalid month/year"),
        (status = 401, description = "Unauthorized")
    ),
    security(("bearer_auth" = [])),
    tag = "Attendance"
)]
pub async fn my_attendance(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    query: web::Query<MyAttendanceQuery>,
) -> Result<HttpResponse, ApiError> {
    let today = Utc::now().date_naive();
    let year = query.year.unwrap_or_else(|| today.year());
    let month = query.month.unwrap_or_else(|| today.month());

    let (from, to) = month_bounds(year, month)
        .ok_or_else(|| ApiError::bad_request("Invalid month or year"))?;

    let data = sqlx::query_as::<_, AttendanceRecord>(&format!(
        "SELECT {} FROM attendance WHERE user_id = ? AND date >= ? AND date < ? ORDER BY date DESC",
        ATTENDANCE_COLUMNS
    ))
    .bind(auth.user_id)
    .bind(from)
    .bind(to)
    .fetch_all(pool.get_ref())
    .await?;

    Ok(HttpResponse::Ok().json(AttendanceListResponse { data }))
}

/// First day of the month and first day of the next month.
pub fn month_bounds(year: i32, month: u32) -> Option<(NaiveDate, NaiveDate)> {
    let from = NaiveDate::from_ymd_opt(year, month, 1)?;
    let to = if month == 12 {
        NaiveDate::from_ymd_opt(year + 1, 1, 1)?
    } else {
        NaiveDate::from_ymd_opt(year, month + 1, 1)?
    };
    Some((from, to))
}

#[utoipa::path(
    get,
    path = "/api/admin/attendance",
    params(DailyAttendanceQuery),
    responses(
        (status = 200, description = "Attendance of every employee for the day", body = DailyAttendanceResponse),
        (status = 400, description = "Malformed date"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Admin only")
    ),
    security(("bearer_auth" = [])),
    tag = "Admin"
)]
pub async fn attendance_by_date(
    pool: web::Data<MySqlPool>,
    query: web::Query<DailyAttendanceQuery>,
) -> Result<HttpResponse, ApiError> {
    let date = query.date.unwrap_or_else(|| Utc::now().date_naive());

    let sql = format!(
        r#"
        SELECT
            p.user_id,
            p.employee_id,
            p.full_name,
            p.department,
            a.id AS attendance_id,
            a.check_in,
            a.check_out,
            a.work_hours,
            COALESCE(a.status, '{}') AS status
        FROM profiles p
        LEFT JOIN attendance a ON a.user_id = p.user_id AND a.date = ?
        ORDER BY p.full_name ASC
        "#,
        AttendanceStatus::Absent
    );

    let data = sqlx::query_as::<_, DailyAttendanceRow>(&sql)
        .bind(date)
        .fetch_all(pool.get_ref())
        .await?;

    Ok(HttpResponse::Ok().json(DailyAttendanceResponse { date, data }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(status: AttendanceStatus, checked_in: bool) -> AttendanceRecord {
        AttendanceRecord {
            id: 1,
            user_id: 7,
            date: NaiveDate::from_ymd_opt(2026, 1, 5).unwrap(),
            check_in: checked_in.then(Utc::now),
            check_out: None,
            work_hours: None,
            status: status.to_string(),
        }
    }

    #[test]
    fn second_check_in_is_a_conflict() {
        let existing = record(AttendanceStatus::Present, true);
        let err = check_in_conflict(Some(&existing));
        assert!(matches!(&err, ApiError::Conflict(msg) if msg == "Already checked in today"));
    }

    #[test]
    fn check_in_on_leave_day_says_so() {
        let existing = record(AttendanceStatus::Leave, false);
        let err = check_in_conflict(Some(&existing));
        assert!(matches!(&err, ApiError::Conflict(msg) if msg == "Today is marked as approved leave"));
    }

    #[test]
    fn conflict_without_visible_row_still_reports_duplicate() {
        assert!(matches!(check_in_conflict(None), ApiError::Conflict(_)));
    }

    #[test]
    fn month_bounds_cover_whole_month() {
        let (from, to) = month_bounds(2026, 2).unwrap();
        assert_eq!(from, NaiveDate::from_ymd_opt(2026, 2, 1).unwrap());
        assert_eq!(to, NaiveDate::from_ymd_opt(2026, 3, 1).unwrap());
    }

    #[test]
    fn december_rolls_into_next_year() {
        let (_, to) = month_bounds(2025, 12).unwrap();
        assert_eq!(to, NaiveDate::from_ymd_opt(2026, 1, 1).unwrap());
    }

    #[test]
    fn invalid_month_is_none() {
        assert!(month_bounds(2026, 0).is_none());
        assert!(month_bounds(2026, 13).is_none());
    }
}
