use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::types::Json;
use utoipa::ToSchema;

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
pub struct AuditLogEntry {
    pub id: u64,
    pub actor_id: Option<u64>,
    #[schema(example = "leave.approved")]
    pub action: String,
    #[schema(example = "leave_request")]
    pub entity_type: String,
    pub entity_id: Option<String>,
    #[schema(value_type = Option<Object>)]
    pub details: Option<Json<Value>>,
    #[schema(value_type = String, format = "date-time")]
    pub created_at: DateTime<Utc>,
}
