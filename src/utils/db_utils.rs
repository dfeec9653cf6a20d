use chrono::NaiveDate;
use serde_json::Value;
use sqlx::{MySqlPool, mysql::MySqlRow};

use crate::error::ApiError;

/// ===============================
/// SQL bindable value enum
/// ===============================
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    String(String),
    U64(u64),
    Date(NaiveDate),
    Null,
}

/// How a patchable column accepts JSON input.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ColumnKind {
    /// VARCHAR holding at most this many characters.
    Text(usize),
    Date,
}

// Column widths from the schema.
pub const EMAIL_MAX: usize = 255;
pub const FULL_NAME_MAX: usize = 255;
pub const PHONE_MAX: usize = 32;
pub const ADDRESS_MAX: usize = 512;
pub const DEPARTMENT_MAX: usize = 128;
pub const DESIGNATION_MAX: usize = 128;
pub const TITLE_MAX: usize = 255;

/// 400 when `value` has more characters than its column holds.
pub fn check_len(field: &str, value: &str, max: usize) -> Result<(), ApiError> {
    if value.chars().count() > max {
        return Err(ApiError::bad_request(format!(
            "'{}' must be at most {} characters",
            field, max
        )));
    }
    Ok(())
}

/// ===============================
/// SQL update container
/// ===============================
#[derive(Debug)]
pub struct SqlUpdate {
    pub sql: String,
    pub values: Vec<SqlValue>,
}

/// ===============================
/// Build dynamic UPDATE SQL
/// ===============================
///
/// Only keys listed in `allowed` become SET entries; anything else is a 400.
/// Column names never come from the payload itself.
pub fn build_update_sql(
    table: &str,
    payload: &Value,
    allowed: &[(&'static str, ColumnKind)],
    id_column: &str,
    id_value: u64,
) -> Result<SqlUpdate, ApiError> {
    let obj = payload
        .as_object()
        .ok_or_else(|| ApiError::bad_request("Payload must be a JSON object"))?;

    if obj.is_empty() {
        return Err(ApiError::bad_request("No fields provided for update"));
    }

    let mut sets = Vec::with_capacity(obj.len());
    let mut values = Vec::with_capacity(obj.len() + 1);

    for (key, value) in obj {
        let (column, kind) = allowed
            .iter()
            .find(|(name, _)| *name == key.as_str())
            .copied()
            .ok_or_else(|| ApiError::bad_request(format!("Field '{}' cannot be updated", key)))?;

        let bound = match (kind, value) {
            (_, Value::Null) => SqlValue::Null,
            (ColumnKind::Text(max), Value::String(s)) => {
                let trimmed = s.trim();
                check_len(key, trimmed, max)?;
                if trimmed.is_empty() {
                    SqlValue::Null
                } else {
                    SqlValue::String(trimmed.to_string())
                }
            }
            (ColumnKind::Date, Value::String(s)) => NaiveDate::parse_from_str(s, "%Y-%m-%d")
                .map(SqlValue::Date)
                .map_err(|_| ApiError::bad_request(format!("'{}' must be a YYYY-MM-DD date", key)))?,
            _ => {
                return Err(ApiError::bad_request(format!(
                    "Unsupported value type for '{}'",
                    key
                )));
            }
        };

        sets.push(format!("{} = ?", column));
        values.push(bound);
    }

    let sql = format!(
        "UPDATE {} SET {} WHERE {} = ?",
        table,
        sets.join(", "),
        id_column
    );

    values.push(SqlValue::U64(id_value));

    Ok(SqlUpdate { sql, values })
}

/// ===============================
/// Execute the update
/// ===============================
pub async fn execute_update(pool: &MySqlPool, update: SqlUpdate) -> Result<u64, sqlx::Error> {
    let mut query = sqlx::query(&update.sql);

    for value in update.values {
        query = match value {
            SqlValue::String(v) => query.bind(v),
            SqlValue::U64(v) => query.bind(v),
            SqlValue::Date(v) => query.bind(v),
            SqlValue::Null => query.bind(None::<String>),
        };
    }

    let result = query.execute(pool).await?;
    Ok(result.rows_affected())
}

/// AND-joined WHERE conditions with their bind values, kept in order.
#[derive(Debug, Default)]
pub struct Filters {
    conditions: Vec<String>,
    values: Vec<SqlValue>,
}

impl Filters {
    pub fn new() -> Self {
        Self::default()
    }

    /// `condition` contains exactly one `?` for `value`.
    pub fn push(&mut self, condition: &str, value: SqlValue) -> &mut Self {
        self.conditions.push(condition.to_string());
        self.values.push(value);
        self
    }

    /// Same value bound to several placeholders, e.g. a LIKE search over columns.
    pub fn push_repeated(&mut self, condition: &str, value: SqlValue, times: usize) -> &mut Self {
        self.conditions.push(condition.to_string());
        for _ in 0..times {
            self.values.push(value.clone());
        }
        self
    }

    pub fn where_clause(&self) -> String {
        if self.conditions.is_empty() {
            String::new()
        } else {
            format!(" WHERE {}", self.conditions.join(" AND "))
        }
    }

    pub fn values(&self) -> &[SqlValue] {
        &self.values
    }
}

pub async fn fetch_count(pool: &MySqlPool, sql: &str, values: &[SqlValue]) -> Result<i64, sqlx::Error> {
    let mut query = sqlx::query_scalar::<_, i64>(sql);
    for value in values.iter().cloned() {
        query = match value {
            SqlValue::String(v) => query.bind(v),
            SqlValue::U64(v) => query.bind(v),
            SqlValue::Date(v) => query.bind(v),
            SqlValue::Null => query.bind(None::<String>),
        };
    }
    query.fetch_one(pool).await
}

pub async fn fetch_rows<T>(pool: &MySqlPool, sql: &str, values: &[SqlValue]) -> Result<Vec<T>, sqlx::Error>
where
    T: for<'r> sqlx::FromRow<'r, MySqlRow> + Send + Unpin,
{
    let mut query = sqlx::query_as::<_, T>(sql);
    for value in values.iter().cloned() {
        query = match value {
            SqlValue::String(v) => query.bind(v),
            SqlValue::U64(v) => query.bind(v),
            SqlValue::Date(v) => query.bind(v),
            SqlValue::Null => query.bind(None::<String>),
        };
    }
    query.fetch_all(pool).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const CONTACT: &[(&str, ColumnKind)] = &[
        ("phone", ColumnKind::Text(PHONE_MAX)),
        ("address", ColumnKind::Text(ADDRESS_MAX)),
    ];
    const HR: &[(&str, ColumnKind)] = &[
        ("department", ColumnKind::Text(DEPARTMENT_MAX)),
        ("date_of_joining", ColumnKind::Date),
    ];

    #[test]
    fn builds_set_clause_for_allowed_columns() {
        let update = build_update_sql("profiles", &json!({"phone": " 123 "}), CONTACT, "user_id", 9).unwrap();
        assert_eq!(update.sql, "UPDATE profiles SET phone = ? WHERE user_id = ?");
        assert_eq!(update.values, vec![SqlValue::String("123".into()), SqlValue::U64(9)]);
    }

    #[test]
    fn rejects_columns_outside_the_allow_list() {
        let err = build_update_sql("profiles", &json!({"role": "admin"}), CONTACT, "user_id", 9).unwrap_err();
        assert!(matches!(err, ApiError::BadRequest(_)));
    }

    #[test]
    fn rejects_empty_and_non_object_payloads() {
        assert!(build_update_sql("profiles", &json!({}), CONTACT, "user_id", 1).is_err());
        assert!(build_update_sql("profiles", &json!(["phone"]), CONTACT, "user_id", 1).is_err());
    }

    #[test]
    fn date_columns_require_iso_dates() {
        let ok = build_update_sql("profiles", &json!({"date_of_joining": "2026-02-01"}), HR, "user_id", 1).unwrap();
        assert_eq!(
            ok.values[0],
            SqlValue::Date(NaiveDate::from_ymd_opt(2026, 2, 1).unwrap())
        );
        assert!(build_update_sql("profiles", &json!({"date_of_joining": "01/02/2026"}), HR, "user_id", 1).is_err());
    }

    #[test]
    fn null_and_blank_clear_a_column() {
        let update = build_update_sql("profiles", &json!({"address": null, "phone": "  "}), CONTACT, "user_id", 1).unwrap();
        assert_eq!(update.values[0], SqlValue::Null);
        assert_eq!(update.values[1], SqlValue::Null);
    }

    #[test]
    fn text_longer_than_its_column_is_rejected() {
        let phone = "9".repeat(PHONE_MAX + 1);
        let err = build_update_sql("profiles", &json!({ "phone": phone }), CONTACT, "user_id", 1).unwrap_err();
        assert!(matches!(err, ApiError::BadRequest(msg) if msg.contains("phone")));

        // Width is counted in characters and after trimming.
        let padded = format!("  {}  ", "é".repeat(PHONE_MAX));
        assert!(build_update_sql("profiles", &json!({ "phone": padded }), CONTACT, "user_id", 1).is_ok());
    }

    #[test]
    fn filters_join_conditions_in_order() {
        let mut filters = Filters::new();
        assert_eq!(filters.where_clause(), "");

        filters
            .push("status = ?", SqlValue::String("pending".into()))
            .push_repeated("(a LIKE ? OR b LIKE ?)", SqlValue::String("%x%".into()), 2);
        assert_eq!(filters.where_clause(), " WHERE status = ? AND (a LIKE ? OR b LIKE ?)");
        assert_eq!(filters.values().len(), 3);
    }
}
