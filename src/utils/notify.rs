use sqlx::MySqlPool;
use tracing::warn;

use crate::model::notification::NotificationKind;

/// Inserts a notification for `user_id`; returns its id, or `None` when the insert failed.
///
/// Used for side effects of other mutations, so errors never reach the caller.
pub async fn send(
    pool: &MySqlPool,
    user_id: u64,
    kind: NotificationKind,
    title: &str,
    message: &str,
) -> Option<u64> {
    match insert(pool, user_id, kind, title, message).await {
        Ok(id) => Some(id),
        Err(e) => {
            warn!(error = %e, user_id, kind = %kind, "Failed to create notification");
            None
        }
    }
}

/// Fallible variant for when the notification is the primary mutation.
pub async fn insert(
    pool: &MySqlPool,
    user_id: u64,
    kind: NotificationKind,
    title: &str,
    message: &str,
) -> Result<u64, sqlx::Error> {
    let result = sqlx::query(
        r#"
        INSERT INTO notifications (user_id, kind, title, message)
        VALUES (?, ?, ?, ?)
        "#,
    )
    .bind(user_id)
    .bind(kind.as_ref())
    .bind(title)
    .bind(message)
    .execute(pool)
    .await?;

    Ok(result.last_insert_id())
}
