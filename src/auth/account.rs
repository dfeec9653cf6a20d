use chrono::{Datelike, NaiveDate, Utc};
use sqlx::{MySql, MySqlPool, Transaction};
use tracing::{debug, info};

use crate::auth::password::hash_password;
use crate::error::ApiError;
use crate::model::profile::{PROFILE_COLUMNS, Profile, generate_employee_id};
use crate::model::role::Role;
use crate::utils::{
    db_utils::{
        ADDRESS_MAX, DEPARTMENT_MAX, DESIGNATION_MAX, EMAIL_MAX, FULL_NAME_MAX, PHONE_MAX, check_len,
    },
    email_cache, email_filter,
};

/// Everything needed to create a login account plus its profile row.
pub struct NewAccount<'a> {
    pub email: &'a str,
    pub password: &'a str,
    pub full_name: &'a str,
    pub role: Role,
    pub phone: Option<&'a str>,
    pub address: Option<&'a str>,
    pub department: Option<&'a str>,
    pub designation: Option<&'a str>,
    pub date_of_joining: Option<NaiveDate>,
    /// Provisioned accounts must change their password on first login
    pub first_login: bool,
}

/// true  => email AVAILABLE
/// false => email TAKEN
pub async fn is_email_available(email: &str, pool: &MySqlPool) -> Result<bool, ApiError> {
    let email = email_filter::normalize(email);

    // Cuckoo filter: fast negative
    if !email_filter::might_exist(&email) {
        return Ok(true);
    }

    // Moka cache: fast positive
    if email_cache::owner_of(&email).await.is_some() {
        return Ok(false);
    }

    let owner = sqlx::query_scalar::<_, u64>("SELECT id FROM users WHERE email = ?")
        .bind(&email)
        .fetch_optional(pool)
        .await?;

    match owner {
        Some(user_id) => {
            email_cache::remember(&email, user_id).await;
            Ok(false)
        }
        None => Ok(true),
    }
}

pub fn validate_email(email: &str) -> Result<(), ApiError> {
    let email = email.trim();
    let valid = match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty() && domain.contains('.') && !domain.starts_with('.') && !domain.ends_with('.')
        }
        None => false,
    };
    if valid && !email.contains(char::is_whitespace) {
        Ok(())
    } else {
        Err(ApiError::bad_request("A valid email address is required"))
    }
}

/// Serials tried after the first one when a concurrent provision took the same id.
const EMPLOYEE_ID_RETRIES: u64 = 4;

impl NewAccount<'_> {
    /// Rejects values the `users`/`profiles` columns cannot hold.
    pub fn validate_lengths(&self) -> Result<(), ApiError> {
        check_len("email", self.email.trim(), EMAIL_MAX)?;
        check_len("full_name", self.full_name.trim(), FULL_NAME_MAX)?;
        let optional = [
            ("phone", self.phone, PHONE_MAX),
            ("address", self.address, ADDRESS_MAX),
            ("department", self.department, DEPARTMENT_MAX),
            ("designation", self.designation, DESIGNATION_MAX),
        ];
        for (field, value, max) in optional {
            if let Some(value) = value {
                check_len(field, value.trim(), max)?;
            }
        }
        Ok(())
    }
}

/// True when a profile insert lost the race for its employee id.
pub fn is_employee_id_collision(e: &sqlx::Error) -> bool {
    match e {
        sqlx::Error::Database(db_err) => {
            db_err.is_unique_violation() && db_err.message().contains("uq_profiles_employee_id")
        }
        _ => false,
    }
}

async fn insert_profile(
    tx: &mut Transaction<'_, MySql>,
    user_id: u64,
    employee_id: &str,
    email: &str,
    account: &NewAccount<'_>,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO profiles
            (user_id, employee_id, full_name, email, phone, address,
             department, designation, date_of_joining, role, first_login)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(user_id)
    .bind(employee_id)
    .bind(account.full_name.trim())
    .bind(email)
    .bind(account.phone)
    .bind(account.address)
    .bind(account.department)
    .bind(account.designation)
    .bind(account.date_of_joining)
    .bind(account.role.as_ref())
    .bind(account.first_login)
    .execute(&mut **tx)
    .await?;
    Ok(())
}

/// Inserts `users` + `profiles` in one transaction and returns the new profile.
pub async fn create_account(
    pool: &MySqlPool,
    company_code: &str,
    account: NewAccount<'_>,
) -> Result<Profile, ApiError> {
    account.validate_lengths()?;

    let email = email_filter::normalize(account.email);
    let full_name = account.full_name.trim();

    if !is_email_available(&email, pool).await? {
        return Err(ApiError::conflict("Email already registered"));
    }

    let hashed = hash_password(account.password)?;
    let year = Utc::now().year();

    let mut tx = pool.begin().await?;

    let user_id = sqlx::query("INSERT INTO users (email, password) VALUES (?, ?)")
        .bind(&email)
        .bind(&hashed)
        .execute(&mut *tx)
        .await
        .map_err(|e| ApiError::on_duplicate(e, "Email already registered"))?
        .last_insert_id();

    let joined_this_year = sqlx::query_scalar::<_, i64>(
        "SELECT COUNT(*) FROM profiles WHERE YEAR(created_at) = ?",
    )
    .bind(year)
    .fetch_one(&mut *tx)
    .await?;

    let first_serial = u64::try_from(joined_this_year).unwrap_or(0) + 1;
    let mut serial = first_serial;
    loop {
        let candidate = generate_employee_id(company_code, full_name, year, serial);
        match insert_profile(&mut tx, user_id, &candidate, &email, &account).await {
            Ok(()) => {
                debug!(user_id, employee_id = %candidate, "Generated employee identifier");
                break;
            }
            Err(e) if serial < first_serial + EMPLOYEE_ID_RETRIES && is_employee_id_collision(&e) => {
                debug!(user_id, employee_id = %candidate, "Employee identifier taken, trying next serial");
                serial += 1;
            }
            Err(e) => return Err(e.into()),
        }
    }

    let profile = sqlx::query_as::<_, Profile>(&format!(
        "SELECT {} FROM profiles WHERE user_id = ?",
        PROFILE_COLUMNS
    ))
    .bind(user_id)
    .fetch_one(&mut *tx)
    .await?;

    tx.commit().await?;

    email_filter::insert(&email);
    email_cache::remember(&email, user_id).await;

    info!(user_id, employee_id = %profile.employee_id, role = %account.role, "Account created");

    Ok(profile)
}

pub async fn fetch_profile(pool: &MySqlPool, user_id: u64) -> Result<Option<Profile>, sqlx::Error> {
    sqlx::query_as::<_, Profile>(&format!(
        "SELECT {} FROM profiles WHERE user_id = ?",
        PROFILE_COLUMNS
    ))
    .bind(user_id)
    .fetch_optional(pool)
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::testing::FakeDbError;

    fn account<'a>(full_name: &'a str, phone: Option<&'a str>) -> NewAccount<'a> {
        NewAccount {
            email: "jane@company.com",
            password: "longenough",
            full_name,
            role: Role::Employee,
            phone,
            address: None,
            department: None,
            designation: None,
            date_of_joining: None,
            first_login: true,
        }
    }

    #[test]
    fn column_sized_values_pass() {
        let name = "N".repeat(FULL_NAME_MAX);
        let phone = "1".repeat(PHONE_MAX);
        assert!(account(&name, Some(&phone)).validate_lengths().is_ok());
    }

    #[test]
    fn oversized_values_are_bad_requests() {
        let phone = "1".repeat(PHONE_MAX + 1);
        assert!(matches!(
            account("Jane Roe", Some(&phone)).validate_lengths(),
            Err(ApiError::BadRequest(_))
        ));

        let name = "N".repeat(FULL_NAME_MAX + 1);
        assert!(matches!(account(&name, None).validate_lengths(), Err(ApiError::BadRequest(_))));
    }

    #[test]
    fn employee_id_collision_is_detected_by_key_name() {
        let taken = sqlx::Error::Database(Box::new(FakeDbError::unique(
            "Duplicate entry 'DFJODO20260001' for key 'profiles.uq_profiles_employee_id'",
        )));
        let email_taken = sqlx::Error::Database(Box::new(FakeDbError::unique(
            "Duplicate entry 'jane@company.com' for key 'users.uq_users_email'",
        )));
        assert!(is_employee_id_collision(&taken));
        assert!(!is_employee_id_collision(&email_taken));
        assert!(!is_employee_id_collision(&sqlx::Error::RowNotFound));
    }

    #[test]
    fn email_shape_checks() {
        assert!(validate_email("jane@company.com").is_ok());
        assert!(validate_email("  jane@company.com ").is_ok());
        assert!(validate_email("jane").is_err());
        assert!(validate_email("@company.com").is_err());
        assert!(validate_email("jane@company").is_err());
        assert!(validate_email("ja ne@company.com").is_err());
    }
}
