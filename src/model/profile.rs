use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Columns selected whenever a full profile row is read.
pub const PROFILE_COLUMNS: &str = "user_id, employee_id, full_name, email, phone, address, \
     department, designation, date_of_joining, role, first_login, created_at, updated_at";

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
#[schema(
    example = json!({
        "user_id": 7,
        "employee_id": "DFJODO20260001",
        "full_name": "John Doe",
        "email": "john.doe@company.com",
        "phone": "+8801712345678",
        "address": "12 Lake Road, Dhaka",
        "department": "Engineering",
        "designation": "Backend Engineer",
        "date_of_joining": "2026-01-05",
        "role": "employee",
        "first_login": false,
        "created_at": "2026-01-05T09:00:00Z",
        "updated_at": "2026-01-05T09:00:00Z"
    })
)]
pub struct Profile {
    pub user_id: u64,

    #[schema(example = "DFJODO20260001")]
    pub employee_id: String,

    pub full_name: String,

    #[schema(format = "email")]
    pub email: String,

    #[schema(nullable = true)]
    pub phone: Option<String>,

    #[schema(nullable = true)]
    pub address: Option<String>,

    #[schema(nullable = true)]
    pub department: Option<String>,

    #[schema(nullable = true)]
    pub designation: Option<String>,

    #[schema(value_type = Option<String>, format = "date")]
    pub date_of_joining: Option<NaiveDate>,

    #[schema(example = "employee")]
    pub role: String,

    pub first_login: bool,

    #[schema(value_type = String, format = "date-time")]
    pub created_at: DateTime<Utc>,

    #[schema(value_type = String, format = "date-time")]
    pub updated_at: DateTime<Utc>,
}

/// Builds `<COMPANY><FIRST2><LAST2><YEAR><SERIAL>`, e.g. `DFJODO20260001` for John Doe.
///
/// Single-word names reuse the word for the last-name part; letters missing
/// from very short names are filled with `X`.
pub fn generate_employee_id(company_code: &str, full_name: &str, year: i32, serial: u64) -> String {
    fn initials(word: &str) -> String {
        let mut letters: String = word
            .chars()
            .filter(|c| c.is_alphanumeric())
            .take(2)
            .collect::<String>()
            .to_uppercase();
        while letters.chars().count() < 2 {
            letters.push('X');
        }
        letters
    }

    let mut words = full_name.split_whitespace();
    let first = words.next().unwrap_or("");
    let last = words.last().unwrap_or(first);

    format!(
        "{}{}{}{}{:04}",
        company_code.to_uppercase(),
        initials(first),
        initials(last),
        year,
        serial
    )
}
