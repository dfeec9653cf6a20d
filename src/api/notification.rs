use actix_web::{HttpResponse, web};
use serde::{Deserialize, Serialize};
use serde_json::json;
use sqlx::MySqlPool;
use tracing::info;
use utoipa::{IntoParams, ToSchema};

use crate::{
    auth::auth::AuthUser,
    error::ApiError,
    model::notification::{NOTIFICATION_COLUMNS, Notification, NotificationKind},
    utils::{
        audit,
        db_utils::{TITLE_MAX, check_len},
        notify,
    },
};

#[derive(Deserialize, ToSchema)]
pub struct SendNotification {
    #[schema(example = 7)]
    pub user_id: u64,
    #[schema(example = "Office closed")]
    pub title: String,
    #[schema(example = "The office is closed on Friday.")]
    pub message: String,
    /// Defaults to `info`
    pub kind: Option<NotificationKind>,
}

impl SendNotification {
    /// Trimmed title and message; both required, title limited to its column.
    fn trimmed(&self) -> Result<(&str, &str), ApiError> {
        let title = self.title.trim();
        let message = self.message.trim();
        if title.is_empty() || message.is_empty() {
            return Err(ApiError::bad_request("title and message are required"));
        }
        check_len("title", title, TITLE_MAX)?;
        Ok((title, message))
    }
}

#[derive(Serialize, ToSchema)]
pub struct NotificationResponse {
    pub success: bool,
    pub notification: Notification,
}

#[derive(Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct NotificationQuery {
    /// Only unread notifications when true
    pub unread_only: Option<bool>,
}

#[derive(Serialize, ToSchema)]
pub struct NotificationListResponse {
    pub data: Vec<Notification>,
    #[schema(example = 3)]
    pub unread: i64,
}

async fn fetch_notification(
    pool: &MySqlPool,
    id: u64,
    user_id: u64,
) -> Result<Option<Notification>, sqlx::Error> {
    sqlx::query_as::<_, Notification>(&format!(
        "SELECT {} FROM notifications WHERE id = ? AND user_id = ?",
        NOTIFICATION_COLUMNS
    ))
    .bind(id)
    .bind(user_id)
    .fetch_optional(pool)
    .await
}

#[utoipa::path(
    post,
    path = "/api/admin/notifications",
    request_body = SendNotification,
    responses(
        (status = 201, description = "Notification sent", body = NotificationResponse),
        (status = 400, description = "Missing title or message"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Admin only"),
        (status = 404, description = "Employee not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Notifications"
)]
pub async fn send_notification(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    payload: web::Json<SendNotification>,
) -> Result<HttpResponse, ApiError> {
    let (title, message) = payload.trimmed()?;

    let exists = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM profiles WHERE user_id = ?")
        .bind(payload.user_id)
        .fetch_one(pool.get_ref())
        .await?;
    if exists == 0 {
        return Err(ApiError::not_found("Employee not found"));
    }

    let kind = payload.kind.unwrap_or(NotificationKind::Info);

    let id = notify::insert(pool.get_ref(), payload.user_id, kind, title, message).await?;

    let notification = fetch_notification(pool.get_ref(), id, payload.user_id)
        .await?
        .ok_or(ApiError::Internal)?;

    info!(notification_id = id, user_id = payload.user_id, kind = %kind, "Notification sent");

    audit::record(
        pool.get_ref(),
        auth.user_id,
        "notification.send",
        "notification",
        id,
        json!({ "recipient": payload.user_id, "kind": kind, "title": title }),
    )
    .await;

    Ok(HttpResponse::Created().json(NotificationResponse {
        success: true,
        notification,
    }))
}

#[utoipa::path(
    get,
    path = "/api/me/notifications",
    params(NotificationQuery),
    responses(
        (status = 200, description = "Caller's notifications, newest first", body = NotificationListResponse),
        (status = 401, description = "Unauthorized")
    ),
    security(("bearer_auth" = [])),
    tag = "Notifications"
)]
pub async fn my_notifications(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    query: web::Query<NotificationQuery>,
) -> Result<HttpResponse, ApiError> {
    let unread_filter = if query.unread_only.unwrap_or(false) { " AND is_read = 0" } else { "" };

    let data = sqlx::query_as::<_, Notification>(&format!(
        "SELECT {} FROM notifications WHERE user_id = ?{} ORDER BY created_at DESC, id DESC",
        NOTIFICATION_COLUMNS, unread_filter
    ))
    .bind(auth.user_id)
    .fetch_all(pool.get_ref())
    .await?;

    let unread = sqlx::query_scalar::<_, i64>(
        "SELECT COUNT(*) FROM notifications WHERE user_id = ? AND is_read = 0",
    )
    .bind(auth.user_id)
    .fetch_one(pool.get_ref())
    .await?;

    Ok(HttpResponse::Ok().json(NotificationListResponse { data, unread }))
}

#[utoipa::path(
    put,
    path = "/api/me/notifications/{id}/read",
    params(("id" = u64, Path, description = "Notification id")),
    responses(
        (status = 200, description = "Marked as read", body = NotificationResponse),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "Notification not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Notifications"
)]
pub async fn mark_read(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> Result<HttpResponse, ApiError> {
    let id = path.into_inner();

    // Scoped to the caller; someone else's notification looks like a missing one.
    sqlx::query("UPDATE notifications SET is_read = 1 WHERE id = ? AND user_id = ?")
        .bind(id)
        .bind(auth.user_id)
        .execute(pool.get_ref())
        .await?;

    let notification = fetch_notification(pool.get_ref(), id, auth.user_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Notification not found"))?;

    Ok(HttpResponse::Ok().json(NotificationResponse {
        success: true,
        notification,
    }))
}
