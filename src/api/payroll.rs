use actix_web::{HttpResponse, web};
use chrono::{Datelike, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::json;
use sqlx::MySqlPool;
use tracing::{debug, info};
use utoipa::{IntoParams, ToSchema};

use crate::{
    auth::auth::AuthUser,
    error::ApiError,
    model::{
        notification::NotificationKind,
        payroll::{PAYROLL_COLUMNS, PaymentStatus, PayrollRecord, net_salary, validate_amounts, validate_period},
    },
    utils::{
        audit,
        db_utils::{Filters, SqlValue, fetch_count, fetch_rows},
        notify,
        pagination::PageWindow,
    },
};

#[derive(Deserialize, ToSchema)]
pub struct CreatePayroll {
    #[schema(example = 7)]
    pub user_id: u64,

    #[schema(example = 1)]
    pub month: u8,

    #[schema(example = 2026)]
    pub year: u16,

    #[schema(value_type = f64, example = 50000.0)]
    pub basic_salary: Decimal,

    #[schema(value_type = Option<f64>, example = 5000.0)]
    pub allowances: Option<Decimal>,

    #[schema(value_type = Option<f64>, example = 2000.0)]
    pub deductions: Option<Decimal>,

    /// Defaults to `pending`
    pub payment_status: Option<PaymentStatus>,
}

/// The period and the employee are fixed once a payroll exists.
#[derive(Deserialize, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct UpdatePayroll {
    #[schema(value_type = Option<f64>, example = 52000.0)]
    pub basic_salary: Option<Decimal>,

    #[schema(value_type = Option<f64>, example = 6000.0)]
    pub allowances: Option<Decimal>,

    #[schema(value_type = Option<f64>, example = 2500.0)]
    pub deductions: Option<Decimal>,

    #[schema(example = "paid")]
    pub payment_status: Option<PaymentStatus>,
}

#[derive(Serialize, ToSchema)]
pub struct PayrollResponse {
    pub success: bool,
    pub payroll: PayrollRecord,
}

#[derive(Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct PayrollQuery {
    #[param(example = 7)]
    pub user_id: Option<u64>,

    #[param(example = 1)]
    pub month: Option<u8>,

    #[param(example = 2026)]
    pub year: Option<u16>,

    #[param(example = 1)]
    pub page: Option<u32>,

    #[param(example = 20)]
    pub per_page: Option<u32>,
}

#[derive(Serialize, ToSchema)]
pub struct PaginatedPayrollResponse {
    pub data: Vec<PayrollRecord>,
    #[schema(example = 1)]
    pub page: u32,
    #[schema(example = 20)]
    pub per_page: u32,
    #[schema(example = 1)]
    pub total: i64,
}

#[derive(Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct MyPayrollQuery {
    /// Defaults to the current year
    #[param(example = 2026)]
    pub year: Option<u16>,
}

#[derive(Serialize, ToSchema)]
pub struct MyPayrollListResponse {
    pub data: Vec<PayrollRecord>,
}

/// Amounts after applying an edit on top of the stored record.
#[derive(Debug, PartialEq)]
pub struct PayrollAmounts {
    pub basic_salary: Decimal,
    pub allowances: Decimal,
    pub deductions: Decimal,
    pub net_salary: Decimal,
}

impl PayrollAmounts {
    /// Validates each amount and derives the net, all before anything reaches the store.
    pub fn new(basic_salary: Decimal, allowances: Decimal, deductions: Decimal) -> Result<Self, ApiError> {
        validate_amounts(&[
            ("basic_salary", basic_salary),
            ("allowances", allowances),
            ("deductions", deductions),
        ])
        .map_err(ApiError::BadRequest)?;

        Ok(Self {
            basic_salary,
            allowances,
            deductions,
            net_salary: net_salary(basic_salary, allowances, deductions).map_err(ApiError::BadRequest)?,
        })
    }

    pub fn merge(current: &PayrollRecord, edit: &UpdatePayroll) -> Result<Self, ApiError> {
        Self::new(
            edit.basic_salary.unwrap_or(current.basic_salary),
            edit.allowances.unwrap_or(current.allowances),
            edit.deductions.unwrap_or(current.deductions),
        )
    }
}

async fn fetch_payroll(pool: &MySqlPool, id: u64) -> Result<Option<PayrollRecord>, sqlx::Error> {
    sqlx::query_as::<_, PayrollRecord>(&format!("SELECT {} FROM payrolls WHERE id = ?", PAYROLL_COLUMNS))
        .bind(id)
        .fetch_optional(pool)
        .await
}

async fn profile_exists(pool: &MySqlPool, user_id: u64) -> Result<bool, sqlx::Error> {
    let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM profiles WHERE user_id = ?")
        .bind(user_id)
        .fetch_one(pool)
        .await?;
    Ok(count > 0)
}

fn period_label(month: u8, year: u16) -> String {
    format!("{:02}/{}", month, year)
}

#[utoipa::path(
    post,
    path = "/api/admin/payroll",
    request_body = CreatePayroll,
    responses(
        (status = 201, description = "Payroll created", body = PayrollResponse),
        (status = 400, description = "Invalid period or amounts"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Admin only"),
        (status = 404, description = "Employee not found"),
        (status = 409, description = "Payroll already exists for this period", body = Object, example = json!({
            "error": "Payroll already exists for this period"
        }))
    ),
    security(("bearer_auth" = [])),
    tag = "Payroll"
)]
pub async fn create_payroll(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    payload: web::Json<CreatePayroll>,
) -> Result<HttpResponse, ApiError> {
    validate_period(payload.month, payload.year).map_err(ApiError::BadRequest)?;

    let amounts = PayrollAmounts::new(
        payload.basic_salary,
        payload.allowances.unwrap_or(Decimal::ZERO),
        payload.deductions.unwrap_or(Decimal::ZERO),
    )?;

    if !profile_exists(pool.get_ref(), payload.user_id).await? {
        return Err(ApiError::not_found("Employee not found"));
    }

    let status = payload.payment_status.unwrap_or(PaymentStatus::Pending);

    let result = sqlx::query(
        r#"
        INSERT INTO payrolls
            (user_id, month, year, basic_salary, allowances, deductions, net_salary, payment_status)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(payload.user_id)
    .bind(payload.month)
    .bind(payload.year)
    .bind(amounts.basic_salary)
    .bind(amounts.allowances)
    .bind(amounts.deductions)
    .bind(amounts.net_salary)
    .bind(status.as_ref())
    .execute(pool.get_ref())
    .await;

    let payroll_id = result
        .map_err(|e| ApiError::on_duplicate(e, "Payroll already exists for this period"))?
        .last_insert_id();

    let payroll = fetch_payroll(pool.get_ref(), payroll_id)
        .await?
        .ok_or(ApiError::Internal)?;

    info!(payroll_id, user_id = payroll.user_id, net_salary = %amounts.net_salary, "Payroll created");

    notify::send(
        pool.get_ref(),
        payroll.user_id,
        NotificationKind::Payroll,
        "Payroll generated",
        &format!(
            "Your payroll for {} is available. Net salary: {}",
            period_label(payroll.month, payroll.year),
            payroll.net_salary
        ),
    )
    .await;

    audit::record(
        pool.get_ref(),
        auth.user_id,
        "payroll.create",
        "payroll",
        payroll_id,
        json!({
            "employee": payroll.user_id,
            "month": payroll.month,
            "year": payroll.year,
            "net_salary": payroll.net_salary,
        }),
    )
    .await;

    Ok(HttpResponse::Created().json(PayrollResponse { success: true, payroll }))
}

#[utoipa::path(
    put,
    path = "/api/admin/payroll/{id}",
    params(("id" = u64, Path, description = "Payroll id")),
    request_body = UpdatePayroll,
    responses(
        (status = 200, description = "Payroll updated", body = PayrollResponse),
        (status = 400, description = "Invalid amounts or non-editable field"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Admin only"),
        (status = 404, description = "Payroll not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Payroll"
)]
pub async fn update_payroll(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
    payload: web::Json<UpdatePayroll>,
) -> Result<HttpResponse, ApiError> {
    let payroll_id = path.into_inner();

    let current = fetch_payroll(pool.get_ref(), payroll_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Payroll not found"))?;

    let amounts = PayrollAmounts::merge(&current, &payload)?;
    let status = payload.payment_status.map(|s| s.to_string()).unwrap_or_else(|| current.payment_status.clone());

    sqlx::query(
        r#"
        UPDATE payrolls
        SET basic_salary = ?, allowances = ?, deductions = ?, net_salary = ?, payment_status = ?
        WHERE id = ?
        "#,
    )
    .bind(amounts.basic_salary)
    .bind(amounts.allowances)
    .bind(amounts.deductions)
    .bind(amounts.net_salary)
    .bind(&status)
    .bind(payroll_id)
    .execute(pool.get_ref())
    .await?;

    let payroll = fetch_payroll(pool.get_ref(), payroll_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Payroll not found"))?;

    info!(payroll_id, net_salary = %payroll.net_salary, status = %payroll.payment_status, "Payroll updated");

    if current.payment_status != payroll.payment_status && payroll.payment_status == PaymentStatus::Paid.as_ref() {
        notify::send(
            pool.get_ref(),
            payroll.user_id,
            NotificationKind::Payroll,
            "Salary paid",
            &format!(
                "Your salary for {} has been paid. Net salary: {}",
                period_label(payroll.month, payroll.year),
                payroll.net_salary
            ),
        )
        .await;
    }

    audit::record(
        pool.get_ref(),
        auth.user_id,
        "payroll.update",
        "payroll",
        payroll_id,
        json!({
            "before": {
                "basic_salary": current.basic_salary,
                "allowances": current.allowances,
                "deductions": current.deductions,
                "payment_status": current.payment_status,
            },
            "after": {
                "basic_salary": payroll.basic_salary,
                "allowances": payroll.allowances,
                "deductions": payroll.deductions,
                "payment_status": payroll.payment_status,
            },
        }),
    )
    .await;

    Ok(HttpResponse::Ok().json(PayrollResponse { success: true, payroll }))
}

#[utoipa::path(
    get,
    path = "/api/admin/payrolls",
    params(PayrollQuery),
    responses(
        (status = 200, description = "Paginated payroll list", body = PaginatedPayrollResponse),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Admin only")
    ),
    security(("bearer_auth" = [])),
    tag = "Payroll"
)]
pub async fn list_payrolls(
    pool: web::Data<MySqlPool>,
    query: web::Query<PayrollQuery>,
) -> Result<HttpResponse, ApiError> {
    let window = PageWindow::new(query.page, query.per_page);

    let mut filters = Filters::new();
    if let Some(user_id) = query.user_id {
        filters.push("user_id = ?", SqlValue::U64(user_id));
    }
    if let Some(month) = query.month {
        filters.push("month = ?", SqlValue::U64(month.into()));
    }
    if let Some(year) = query.year {
        filters.push("year = ?", SqlValue::U64(year.into()));
    }

    let where_clause = filters.where_clause();

    let count_sql = format!("SELECT COUNT(*) FROM payrolls{}", where_clause);
    let total = fetch_count(pool.get_ref(), &count_sql, filters.values()).await?;

    let data_sql = format!(
        "SELECT {} FROM payrolls{} ORDER BY year DESC, month DESC, id DESC{}",
        PAYROLL_COLUMNS,
        where_clause,
        window.limit_clause()
    );
    debug!(sql = %data_sql, "Fetching payrolls");

    let data = fetch_rows::<PayrollRecord>(pool.get_ref(), &data_sql, filters.values()).await?;

    Ok(HttpResponse::Ok().json(PaginatedPayrollResponse {
        data,
        page: window.page,
        per_page: window.per_page,
        total,
    }))
}

#[utoipa::path(
    get,
    path = "/api/me/payrolls",
    params(MyPayrollQuery),
    responses(
        (status = 200, description = "Caller's payroll records for the year", body = MyPayrollListResponse),
        (status = 401, description = "Unauthorized")
    ),
    security(("bearer_auth" = [])),
    tag = "Payroll"
)]
pub async fn my_payrolls(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    query: web::Query<MyPayrollQuery>,
) -> Result<HttpResponse, ApiError> {
    let year = match query.year {
        Some(year) => year,
        None => u16::try_from(Utc::now().year()).map_err(|e| ApiError::internal("Current year out of range", e))?,
    };

    let data = sqlx::query_as::<_, PayrollRecord>(&format!(
        "SELECT {} FROM payrolls WHERE user_id = ? AND year = ? ORDER BY month DESC",
        PAYROLL_COLUMNS
    ))
    .bind(auth.user_id)
    .bind(year)
    .fetch_all(pool.get_ref())
    .await?;

    Ok(HttpResponse::Ok().json(MyPayrollListResponse { data }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record() -> PayrollRecord {
        PayrollRecord {
            id: 1,
            user_id: 7,
            month: 1,
            year: 2026,
            basic_salary: Decimal::new(5_000_000, 2),
            allowances: Decimal::new(500_000, 2),
            deductions: Decimal::new(200_000, 2),
            net_salary: Decimal::new(5_300_000, 2),
            payment_status: "pending".into(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn edit_recomputes_net_from_merged_amounts() {
        let edit: UpdatePayroll = serde_json::from_str(r#"{"deductions": 3000}"#).unwrap();
        let amounts = PayrollAmounts::merge(&record(), &edit).unwrap();
        assert_eq!(amounts.basic_salary, Decimal::new(50_000, 0));
        assert_eq!(amounts.deductions, Decimal::new(3_000, 0));
        assert_eq!(amounts.net_salary, Decimal::new(52_000, 0));
    }

    #[test]
    fn edit_rejects_negative_amounts() {
        let edit: UpdatePayroll = serde_json::from_str(r#"{"allowances": -5}"#).unwrap();
        assert!(matches!(PayrollAmounts::merge(&record(), &edit), Err(ApiError::BadRequest(_))));
    }

    #[test]
    fn create_amounts_default_to_zero_and_derive_net() {
        let amounts = PayrollAmounts::new(Decimal::new(50_000, 0), Decimal::ZERO, Decimal::new(1_000, 0)).unwrap();
        assert_eq!(amounts.net_salary, Decimal::new(49_000, 0));
    }

    #[test]
    fn create_rejects_overflowing_amounts_with_bad_request() {
        let huge = Decimal::from_i128_with_scale(70_000_000_000_000_000_000_000_000_000, 0);
        assert!(matches!(PayrollAmounts::new(huge, huge, Decimal::ZERO), Err(ApiError::BadRequest(_))));
        assert!(matches!(
            PayrollAmounts::new(Decimal::new(100_000_000_000, 0), Decimal::ZERO, Decimal::ZERO),
            Err(ApiError::BadRequest(_))
        ));
    }

    #[test]
    fn edit_rejects_amounts_beyond_column_range() {
        let edit: UpdatePayroll = serde_json::from_str(r#"{"basic_salary": 100000000000}"#).unwrap();
        assert!(matches!(PayrollAmounts::merge(&record(), &edit), Err(ApiError::BadRequest(_))));
    }

    #[test]
    fn edit_with_huge_amounts_is_a_bad_request_not_a_panic() {
        let edit: UpdatePayroll =
            serde_json::from_str(r#"{"basic_salary": 7e28, "allowances": 7e28}"#).unwrap();
        assert!(matches!(PayrollAmounts::merge(&record(), &edit), Err(ApiError::BadRequest(_))));
    }

    #[test]
    fn edit_whose_net_overflows_the_column_is_rejected() {
        let edit: UpdatePayroll = serde_json::from_str(
            r#"{"basic_salary": 9999999999.99, "allowances": 9999999999.99, "deductions": 0}"#,
        )
        .unwrap();
        assert!(matches!(PayrollAmounts::merge(&record(), &edit), Err(ApiError::BadRequest(_))));
    }

    #[test]
    fn edit_payload_cannot_move_the_period() {
        assert!(serde_json::from_str::<UpdatePayroll>(r#"{"month": 2}"#).is_err());
        assert!(serde_json::from_str::<UpdatePayroll>(r#"{"user_id": 9, "basic_salary": 1}"#).is_err());
        assert!(serde_json::from_str::<UpdatePayroll>(r#"{"payment_status": "paid"}"#).is_ok());
    }

    #[test]
    fn create_payload_defaults() {
        let body = r#"{"user_id": 7, "month": 1, "year": 2026, "basic_salary": 50000.5}"#;
        let parsed: CreatePayroll = serde_json::from_str(body).unwrap();
        assert!(parsed.allowances.is_none());
        assert!(parsed.payment_status.is_none());
        assert_eq!(parsed.basic_salary, Decimal::new(500_005, 1));
    }

    #[test]
    fn unknown_payment_status_is_rejected() {
        assert!(serde_json::from_str::<UpdatePayroll>(r#"{"payment_status": "late"}"#).is_err());
    }

    #[test]
    fn period_label_pads_month() {
        assert_eq!(period_label(3, 2026), "03/2026");
    }
}
