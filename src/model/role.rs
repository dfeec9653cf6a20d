use serde::{Deserialize, Serialize};
use strum::IntoEnumIterator;
use strum_macros::{AsRefStr, Display, EnumIter, EnumString};
use utoipa::ToSchema;

/// Stored in `profiles.role`; the only thing that gates `/api/admin/*`.
#[derive(
    Debug,
    Copy,
    Clone,
    Eq,
    PartialEq,
    Serialize,
    Deserialize,
    ToSchema,
    AsRefStr,
    Display,
    EnumIter,
    EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Role {
    Employee,
    Admin,
}

impl Role {
    /// Parses the stored column value; unknown values are treated as no role at all.
    pub fn from_column(value: &str) -> Option<Self> {
        value.parse().ok()
    }

    pub fn is_admin(&self) -> bool {
        *self == Role::Admin
    }

    pub fn allowed_values() -> String {
        Role::iter()
            .map(|r| r.to_string())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_only_the_two_roles() {
        assert_eq!(Role::from_column("admin"), Some(Role::Admin));
        assert_eq!(Role::from_column("employee"), Some(Role::Employee));
        assert_eq!(Role::from_column("hr"), None);
        assert_eq!(Role::from_column("Admin"), None);
    }

    #[test]
    fn serializes_lowercase() {
        assert_eq!(serde_json::to_string(&Role::Admin).unwrap(), "\"admin\"");
        assert_eq!(Role::Employee.as_ref(), "employee");
        assert_eq!(Role::allowed_values(), "employee, admin");
    }
}
