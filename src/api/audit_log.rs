use actix_web::{HttpResponse, web};
use serde::{Deserialize, Serialize};
use sqlx::MySqlPool;
use utoipa::{IntoParams, ToSchema};

use crate::{
    error::ApiError,
    model::audit_log::AuditLogEntry,
    utils::{
        db_utils::{Filters, SqlValue, fetch_count, fetch_rows},
        pagination::PageWindow,
    },
};

#[derive(Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct AuditLogQuery {
    /// Exact action, e.g. `leave.approved`
    #[param(example = "leave.approved")]
    pub action: Option<String>,
    #[param(example = 1)]
    pub actor_id: Option<u64>,
    #[param(example = 1)]
    pub page: Option<u32>,
    #[param(example = 20)]
    pub per_page: Option<u32>,
}

#[derive(Serialize, ToSchema)]
pub struct AuditLogListResponse {
    pub data: Vec<AuditLogEntry>,
    pub page: u32,
    pub per_page: u32,
    pub total: i64,
}

#[utoipa::path(
    get,
    path = "/api/admin/audit-logs",
    params(AuditLogQuery),
    responses(
        (status = 200, description = "Audit log, newest first", body = AuditLogListResponse),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Admin only")
    ),
    security(("bearer_auth" = [])),
    tag = "Admin"
)]
pub async fn list_audit_logs(
    pool: web::Data<MySqlPool>,
    query: web::Query<AuditLogQuery>,
) -> Result<HttpResponse, ApiError> {
    let window = PageWindow::new(query.page, query.per_page);

    let mut filters = Filters::new();
    if let Some(action) = query.action.as_deref().map(str::trim).filter(|a| !a.is_empty()) {
        filters.push("action = ?", SqlValue::String(action.to_string()));
    }
    if let Some(actor_id) = query.actor_id {
        filters.push("actor_id = ?", SqlValue::U64(actor_id));
    }

    let where_clause = filters.where_clause();

    let total = fetch_count(
        pool.get_ref(),
        &format!("SELECT COUNT(*) FROM audit_logs{}", where_clause),
        filters.values(),
    )
    .await?;

    let data_sql = format!(
        "SELECT id, actor_id, action, entity_type, entity_id, details, created_at \
         FROM audit_logs{} ORDER BY created_at DESC, id DESC{}",
        where_clause,
        window.limit_clause()
    );

    let data = fetch_rows::<AuditLogEntry>(pool.get_ref(), &data_sql, filters.values()).await?;

    Ok(HttpResponse::Ok().json(AuditLogListResponse {
        data,
        page: window.page,
        per_page: window.per_page,
        total,
    }))
}
