use crate::{
    auth::auth::AuthUser,
    error::ApiError,
    model::{
        attendance::AttendanceStatus,
        leave_request::{LEAVE_COLUMNS, LeaveRequest, LeaveStatus, LeaveType, leave_days},
        notification::NotificationKind,
    },
    utils::{
        audit,
        db_utils::{Filters, SqlValue, fetch_count, fetch_rows},
        notify,
        pagination::PageWindow,
    },
};
use actix_web::{HttpResponse, web};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use sqlx::{FromRow, MySqlPool};
use tracing::{debug, info, warn};
use utoipa::{IntoParams, ToSchema};

/// Approved leave longer than this is not mirrored into attendance.
const MAX_MIRRORED_LEAVE_DAYS: i64 = 366;

#[derive(Deserialize, ToSchema)]
pub struct CreateLeave {
    #[schema(example = "sick")]
    pub leave_type: LeaveType,
    #[schema(example = "2026-01-10", format = "date", value_type = String)]
    pub start_date: NaiveDate,
    #[schema(example = "2026-01-12", format = "date", value_type = String)]
    pub end_date: NaiveDate,
    #[schema(example = "Flu")]
    pub remarks: Option<String>,
}

#[derive(Deserialize, ToSchema)]
pub struct LeaveAction {
    #[schema(example = 12)]
    pub leave_id: u64,
    /// `approved` or `rejected`
    #[schema(example = "approved")]
    pub action: String,
    #[schema(example = "ok")]
    pub admin_comment: Option<String>,
}

#[derive(Serialize, ToSchema)]
#[schema(example = json!({
    "success": true,
    "leave": {
        "id": 12,
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
    }
}))]
pub struct LeaveResponse {
    pub success: bool,
    pub leave: LeaveRequest,
}

#[derive(Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct MyLeaveQuery {
    /// Filter by status: pending, approved, rejected
    pub status: Option<String>,
}

#[derive(Serialize, ToSchema)]
pub struct MyLeaveListResponse {
    pub data: Vec<LeaveRequest>,
}

#[derive(Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct LeaveFilter {
    /// Filter by employee (user) id
    #[param(example = 7)]
    pub user_id: Option<u64>,
    /// Filter by status: pending, approved, rejected
    #[param(example = "pending")]
    pub status: Option<String>,
    /// Pagination page number (start with 1)
    #[param(example = 1)]
    pub page: Option<u32>,
    #[param(example = 20)]
    pub per_page: Option<u32>,
}

/// Leave request with the requesting employee's name, for the admin console.
#[derive(Serialize, FromRow, ToSchema)]
pub struct AdminLeaveRow {
    pub id: u64,
    pub user_id: u64,
    #[schema(example = "DFJODO20260001")]
    pub employee_id: String,
    pub full_name: String,
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

#[derive(Serialize, ToSchema)]
pub struct LeaveListResponse {
    pub data: Vec<AdminLeaveRow>,
    #[schema(example = 1)]
    pub page: u32,
    #[schema(example = 20)]
    pub per_page: u32,
    #[schema(example = 1)]
    pub total: i64,
}

fn parse_status(raw: &str) -> Result<LeaveStatus, ApiError> {
    raw.parse::<LeaveStatus>()
        .map_err(|_| ApiError::bad_request("Invalid status. Allowed: pending, approved, rejected"))
}

/// Only the two final states are valid admin decisions.
pub fn parse_action(raw: &str) -> Result<LeaveStatus, ApiError> {
    match raw.parse::<LeaveStatus>() {
        Ok(status) if LeaveStatus::Pending.can_transition_to(status) => Ok(status),
        _ => Err(ApiError::bad_request("Invalid action. Allowed: approved, rejected")),
    }
}

async fn fetch_leave(pool: &MySqlPool, leave_id: u64) -> Result<Option<LeaveRequest>, sqlx::Error> {
    sqlx::query_as::<_, LeaveRequest>(&format!(
        "SELECT {} FROM leave_requests WHERE id = ?",
        LEAVE_COLUMNS
    ))
    .bind(leave_id)
    .fetch_optional(pool)
    .await
}

/* =========================
Create leave request
========================= */
#[utoipa::path(
    post,
    path = "/api/me/leaves",
    request_body(
        content = CreateLeave,
        description = "Leave request payload",
        content_type = "application/json"
    ),
    responses(
        (status = 201, description = "Leave request submitted", body = LeaveResponse),
        (status = 400, description = "Bad request"),
        (status = 401, description = "Unauthorized"),
        (status = 409, description = "Overlaps another pending or approved request")
    ),
    security(("bearer_auth" = [])),
    tag = "Leave"
)]
pub async fn create_leave(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    payload: web::Json<CreateLeave>,
) -> Result<HttpResponse, ApiError> {
    if payload.start_date > payload.end_date {
        return Err(ApiError::bad_request("start_date cannot be after end_date"));
    }

    let overlapping = sqlx::query_scalar::<_, i64>(
        r#"
        SELECT COUNT(*)
        FROM leave_requests
        WHERE user_id = ?
        AND status IN (?, ?)
        AND start_date <= ?
        AND end_date >= ?
        "#,
    )
    .bind(auth.user_id)
    .bind(LeaveStatus::Pending.as_ref())
    .bind(LeaveStatus::Approved.as_ref())
    .bind(payload.end_date)
    .bind(payload.start_date)
    .fetch_one(pool.get_ref())
    .await?;

    if overlapping > 0 {
        return Err(ApiError::conflict(
            "Leave dates overlap an existing pending or approved request",
        ));
    }

    let remarks = payload
        .remarks
        .as_deref()
        .map(str::trim)
        .filter(|r| !r.is_empty());

    let leave_id = sqlx::query(
        r#"
        INSERT INTO leave_requests
            (user_id, leave_type, start_date, end_date, remarks)
        VALUES (?, ?, ?, ?, ?)
        "#,
    )
    .bind(auth.user_id)
    .bind(payload.leave_type.as_ref())
    .bind(payload.start_date)
    .bind(payload.end_date)
    .bind(remarks)
    .execute(pool.get_ref())
    .await?
    .last_insert_id();

    let leave = fetch_leave(pool.get_ref(), leave_id)
        .await?
        .ok_or(ApiError::Internal)?;

    info!(
        user_id = auth.user_id,
        leave_id,
        days = leave_days(leave.start_date, leave.end_date),
        "Leave request submitted"
    );

    Ok(HttpResponse::Created().json(LeaveResponse { success: true, leave }))
}

#[utoipa::path(
    get,
    path = "/api/me/leaves",
    params(MyLeaveQuery),
    responses(
        (status = 200, description = "Caller's leave requests, newest first", body = MyLeaveListResponse),
        (status = 400, description = "Invalid status filter"),
        (status = 401, description = "Unauthorized")
    ),
    security(("bearer_auth" = [])),
    tag = "Leave"
)]
pub async fn my_leaves(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    query: web::Query<MyLeaveQuery>,
) -> Result<HttpResponse, ApiError> {
    let mut filters = Filters::new();
    filters.push("user_id = ?", SqlValue::U64(auth.user_id));

    if let Some(status) = query.status.as_deref() {
        filters.push("status = ?", SqlValue::String(parse_status(status)?.to_string()));
    }

    let sql = format!(
        "SELECT {} FROM leave_requests{} ORDER BY created_at DESC, id DESC",
        LEAVE_COLUMNS,
        filters.where_clause()
    );

    let data = fetch_rows::<LeaveRequest>(pool.get_ref(), &sql, filters.values()).await?;

    Ok(HttpResponse::Ok().json(MyLeaveListResponse { data }))
}

/* =========================
Approve / reject (admin)
========================= */
#[utoipa::path(
    post,
    path = "/api/admin/leave-action",
    request_body = LeaveAction,
    responses(
        (status = 200, description = "Leave decided", body = LeaveResponse),
        (status = 400, description = "Invalid action"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Admin only"),
        (status = 404, description = "Leave request not found"),
        (status = 409, description = "Leave request already processed", body = Object, example = json!({
            "error": "Leave request already processed"
        }))
    ),
    security(("bearer_auth" = [])),
    tag = "Admin"
)]
pub async fn leave_action(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    payload: web::Json<LeaveAction>,
) -> Result<HttpResponse, ApiError> {
    let decision = parse_action(&payload.action)?;
    let leave_id = payload.leave_id;

    let current = fetch_leave(pool.get_ref(), leave_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Leave request not found"))?;

    let current_status = parse_status(&current.status).map_err(|_| {
        ApiError::internal("Stored leave status is invalid", &current.status)
    })?;

    if !current_status.can_transition_to(decision) {
        return Err(ApiError::conflict("Leave request already processed"));
    }

    let admin_comment = payload
        .admin_comment
        .as_deref()
        .map(str::trim)
        .filter(|c| !c.is_empty());

    // The status guard makes concurrent decisions race-free: only one UPDATE matches.
    let result = sqlx::query(
        r#"
        UPDATE leave_requests
        SET status = ?, admin_comment = ?, reviewed_by = ?, reviewed_at = ?
        WHERE id = ?
        AND status = ?
        "#,
    )
    .bind(decision.as_ref())
    .bind(admin_comment)
    .bind(auth.user_id)
    .bind(Utc::now())
    .bind(leave_id)
    .bind(LeaveStatus::Pending.as_ref())
    .execute(pool.get_ref())
    .await?;

    if result.rows_affected() == 0 {
        return Err(ApiError::conflict("Leave request already processed"));
    }

    let leave = fetch_leave(pool.get_ref(), leave_id)
        .await?
        .ok_or(ApiError::Internal)?;

    info!(leave_id, decision = %decision, admin_id = auth.user_id, "Leave decided");

    if decision == LeaveStatus::Approved {
        mirror_into_attendance(pool.get_ref(), &leave).await;
    }

    let mut message = format!(
        "Your {} leave from {} to {} was {}.",
        leave.leave_type, leave.start_date, leave.end_date, decision
    );
    if let Some(comment) = admin_comment {
        message.push_str(&format!(" Comment: {}", comment));
    }

    notify::send(
        pool.get_ref(),
        leave.user_id,
        NotificationKind::Leave,
        &format!("Leave request {}", decision),
        &message,
    )
    .await;

    audit::record(
        pool.get_ref(),
        auth.user_id,
        &format!("leave.{}", decision),
        "leave_request",
        leave_id,
        json!({
            "employee": leave.user_id,
            "admin_comment": admin_comment,
        }),
    )
    .await;

    Ok(HttpResponse::Ok().json(LeaveResponse { success: true, leave }))
}

/// Marks each day of an approved leave as `leave` in attendance, keeping existing rows.
async fn mirror_into_attendance(pool: &MySqlPool, leave: &LeaveRequest) {
    let days = leave_days(leave.start_date, leave.end_date);
    if days > MAX_MIRRORED_LEAVE_DAYS {
        warn!(leave_id = leave.id, days, "Leave too long to mirror into attendance");
        return;
    }

    for day in leave.start_date.iter_days().take(days as usize) {
        if let Err(e) = sqlx::query("INSERT IGNORE INTO attendance (user_id, date, status) VALUES (?, ?, ?)")
            .bind(leave.user_id)
            .bind(day)
            .bind(AttendanceStatus::Leave.as_ref())
            .execute(pool)
            .await
        {
            warn!(error = %e, leave_id = leave.id, date = %day, "Failed to mirror leave into attendance");
            return;
        }
    }
    debug!(leave_id = leave.id, days, "Leave mirrored into attendance");
}

/// Admin list of leave requests
#[utoipa::path(
    get,
    path = "/api/admin/leaves",
    params(LeaveFilter),
    responses(
        (status = 200, description = "Paginated leave list", body = LeaveListResponse),
        (status = 400, description = "Invalid status filter"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Admin only")
    ),
    security(("bearer_auth" = [])),
    tag = "Admin"
)]
pub async fn list_leaves(
    pool: web::Data<MySqlPool>,
    query: web::Query<LeaveFilter>,
) -> Result<HttpResponse, ApiError> {
    let window = PageWindow::new(query.page, query.per_page);

    let mut filters = Filters::new();

    if let Some(user_id) = query.user_id {
        filters.push("l.user_id = ?", SqlValue::U64(user_id));
    }

    if let Some(status) = query.status.as_deref() {
        filters.push("l.status = ?", SqlValue::String(parse_status(status)?.to_string()));
    }

    let where_clause = filters.where_clause();

    let count_sql = format!("SELECT COUNT(*) FROM leave_requests l{}", where_clause);
    let total = fetch_count(pool.get_ref(), &count_sql, filters.values()).await?;

    let data_sql = format!(
        r#"
        SELECT l.id, l.user_id, p.employee_id, p.full_name, l.leave_type, l.start_date,
               l.end_date, l.remarks, l.status, l.admin_comment, l.reviewed_by,
               l.reviewed_at, l.created_at
        FROM leave_requests l
        JOIN profiles p ON p.user_id = l.user_id
        {}
        ORDER BY l.created_at DESC, l.id DESC
        {}
        "#,
        where_clause,
        window.limit_clause()
    );

    let data = fetch_rows::<AdminLeaveRow>(pool.get_ref(), &data_sql, filters.values()).await?;

    Ok(HttpResponse::Ok().json(LeaveListResponse {
        data,
        page: window.page,
        per_page: window.per_page,
        total,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn actions_are_final_states_only() {
        assert_eq!(parse_action("approved").unwrap(), LeaveStatus::Approved);
        assert_eq!(parse_action("rejected").unwrap(), LeaveStatus::Rejected);
        assert!(parse_action("pending").is_err());
        assert!(parse_action("approve").is_err());
        assert!(parse_action("").is_err());
    }

    #[test]
    fn status_filter_validation() {
        assert_eq!(parse_status("pending").unwrap(), LeaveStatus::Pending);
        assert!(parse_status("cancelled").is_err());
    }

    #[test]
    fn create_leave_rejects_unknown_leave_type() {
        let body = r#"{"leave_type":"vacation","start_date":"2026-01-10","end_date":"2026-01-12"}"#;
        assert!(serde_json::from_str::<CreateLeave>(body).is_err());

        let body = r#"{"leave_type":"paid","start_date":"2026-01-10","end_date":"2026-01-12"}"#;
        let parsed = serde_json::from_str::<CreateLeave>(body).unwrap();
        assert_eq!(parsed.leave_type, LeaveType::Paid);
        assert!(parsed.remarks.is_none());
    }

    #[test]
    fn leave_response_matches_documented_shape() {
        let leave = LeaveRequest {
            id: 12,
            user_id: 7,
            leave_type: "sick".into(),
            start_date: NaiveDate::from_ymd_opt(2026, 1, 10).unwrap(),
            end_date: NaiveDate::from_ymd_opt(2026, 1, 12).unwrap(),
            remarks: None,
            status: LeaveStatus::Approved.to_string(),
            admin_comment: Some("ok".into()),
            reviewed_by: Some(1),
            reviewed_at: None,
            created_at: Utc::now(),
        };
        let value = serde_json::to_value(LeaveResponse { success: true, leave }).unwrap();
        assert_eq!(value["success"], json!(true));
        assert_eq!(value["leave"]["status"], json!("approved"));
        assert_eq!(value["leave"]["admin_comment"], json!("ok"));
    }
}
