use serde::{Deserialize, Serialize};

/// Login account; the matching `profiles` row shares its id.
#[derive(Debug, Serialize, Deserialize, sqlx::FromRow)]
pub struct User {
    pub id: u64,
    pub email: String,
    #[serde(skip_serializing)]
    pub password: String,
}
