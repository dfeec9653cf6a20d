use serde_json::Value;
use sqlx::{MySqlPool, types::Json};
use tracing::{debug, warn};

/// Appends an audit-log row. Failures are logged and swallowed.
pub async fn record(
    pool: &MySqlPool,
    actor_id: u64,
    action: &str,
    entity_type: &str,
    entity_id: impl ToString,
    details: Value,
) {
    let entity_id = entity_id.to_string();

    let result = sqlx::query(
        r#"
        INSERT INTO audit_logs (actor_id, action, entity_type, entity_id, details)
        VALUES (?, ?, ?, ?, ?)
        "#,
    )
    .bind(actor_id)
    .bind(action)
    .bind(entity_type)
    .bind(&entity_id)
    .bind(Json(details))
    .execute(pool)
    .await;

    match result {
        Ok(_) => debug!(actor_id, action, entity_type, entity_id = %entity_id, "Audit entry written"),
        Err(e) => warn!(
            error = %e,
            actor_id,
            action,
            entity_type,
            entity_id = %entity_id,
            "Failed to write audit entry"
        ),
    }
}
