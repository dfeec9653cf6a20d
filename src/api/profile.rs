use crate::{
    auth::{
        account::{NewAccount, create_account, fetch_profile, validate_email},
        auth::AuthUser,
        password::{MIN_PASSWORD_LEN, hash_password, temporary_password, verify_password},
    },
    config::Config,
    error::ApiError,
    model::{
        notification::NotificationKind,
        profile::{PROFILE_COLUMNS, Profile},
        role::Role,
        user::User,
    },
    utils::{
        audit,
        db_utils::{
            ADDRESS_MAX, ColumnKind, DEPARTMENT_MAX, DESIGNATION_MAX, FULL_NAME_MAX, Filters, PHONE_MAX,
            SqlValue, build_update_sql, execute_update, fetch_count, fetch_rows,
        },
        notify,
        pagination::PageWindow,
    },
};
use actix_web::{HttpResponse, web};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use sqlx::MySqlPool;
use tracing::{debug, info};
use utoipa::{IntoParams, ToSchema};

/// Columns an employee may change on their own profile.
const SELF_EDITABLE: &[(&str, ColumnKind)] = &[
    ("phone", ColumnKind::Text(PHONE_MAX)),
    ("address", ColumnKind::Text(ADDRESS_MAX)),
];

/// HR fields an admin may change; role has its own endpoint.
const ADMIN_EDITABLE: &[(&str, ColumnKind)] = &[
    ("full_name", ColumnKind::Text(FULL_NAME_MAX)),
    ("phone", ColumnKind::Text(PHONE_MAX)),
    ("address", ColumnKind::Text(ADDRESS_MAX)),
    ("department", ColumnKind::Text(DEPARTMENT_MAX)),
    ("designation", ColumnKind::Text(DESIGNATION_MAX)),
    ("date_of_joining", ColumnKind::Date),
];

#[derive(Deserialize, ToSchema)]
pub struct AddEmployee {
    #[schema(example = "john.doe@company.com", format = "email")]
    pub email: String,
    #[schema(example = "John Doe")]
    pub full_name: String,
    pub phone: Option<String>,
    pub address: Option<String>,
    #[schema(example = "Engineering")]
    pub department: Option<String>,
    #[schema(example = "Backend Engineer")]
    pub designation: Option<String>,
    #[schema(value_type = Option<String>, format = "date", example = "2026-01-05")]
    pub date_of_joining: Option<NaiveDate>,
    /// Defaults to `employee`
    pub role: Option<Role>,
    /// Generated when omitted and returned once in the response
    pub password: Option<String>,
}

#[derive(Serialize, ToSchema)]
pub struct AddEmployeeResponse {
    pub success: bool,
    pub profile: Profile,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temporary_password: Option<String>,
}

#[derive(Deserialize, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct UpdateRole {
    #[schema(example = 7)]
    pub user_id: u64,
    #[schema(example = "admin")]
    pub role: String,
}

#[derive(Deserialize, ToSchema)]
pub struct ChangePassword {
    pub current_password: String,
    pub new_password: String,
}

#[derive(Serialize, ToSchema)]
pub struct ProfileResponse {
    pub success: bool,
    pub profile: Profile,
}

#[derive(Deserialize, IntoParams, ToSchema)]
#[into_params(parameter_in = Query)]
pub struct ProfileQuery {
    /// `employee` or `admin`
    pub role: Option<String>,
    pub department: Option<String>,
    /// Matches name, email or employee id
    pub search: Option<String>,
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

#[derive(Serialize, ToSchema)]
pub struct ProfileListResponse {
    pub data: Vec<Profile>,
    #[schema(example = 1)]
    pub page: u32,
    #[schema(example = 20)]
    pub per_page: u32,
    #[schema(example = 42)]
    pub total: i64,
}

async fn load_profile(pool: &MySqlPool, user_id: u64) -> Result<Profile, ApiError> {
    fetch_profile(pool, user_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Profile not found"))
}

/* =========================
Self service
========================= */

#[utoipa::path(
    get,
    path = "/api/me/profile",
    responses(
        (status = 200, description = "Caller's profile", body = ProfileResponse),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "Profile not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Profile"
)]
pub async fn get_my_profile(auth: AuthUser, pool: web::Data<MySqlPool>) -> Result<HttpResponse, ApiError> {
    let profile = load_profile(pool.get_ref(), auth.user_id).await?;
    Ok(HttpResponse::Ok().json(ProfileResponse { success: true, profile }))
}

/// Contact fields only: `phone`, `address`
#[utoipa::path(
    put,
    path = "/api/me/profile",
    request_body(content = Object, example = json!({"phone": "+8801712345678", "address": "12 Lake Road"})),
    responses(
        (status = 200, description = "Profile updated", body = ProfileResponse),
        (status = 400, description = "Field not editable or bad value"),
        (status = 401, description = "Unauthorized")
    ),
    security(("bearer_auth" = [])),
    tag = "Profile"
)]
pub async fn update_my_profile(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    body: web::Json<Value>,
) -> Result<HttpResponse, ApiError> {
    let update = build_update_sql("profiles", &body, SELF_EDITABLE, "user_id", auth.user_id)?;
    debug!(sql = %update.sql, user_id = auth.user_id, "Updating own profile");

    execute_update(pool.get_ref(), update).await?;

    let profile = load_profile(pool.get_ref(), auth.user_id).await?;
    Ok(HttpResponse::Ok().json(ProfileResponse { success: true, profile }))
}

#[utoipa::path(
    post,
    path = "/api/me/password",
    request_body = ChangePassword,
    responses(
        (status = 200, description = "Password changed", body = Object, example = json!({"success": true})),
        (status = 400, description = "New password too short"),
        (status = 401, description = "Current password is wrong")
    ),
    security(("bearer_auth" = [])),
    tag = "Profile"
)]
pub async fn change_password(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    body: web::Json<ChangePassword>,
) -> Result<HttpResponse, ApiError> {
    if body.new_password.len() < MIN_PASSWORD_LEN {
        return Err(ApiError::bad_request(format!(
            "Password must be at least {} characters",
            MIN_PASSWORD_LEN
        )));
    }

    let user = sqlx::query_as::<_, User>("SELECT id, email, password FROM users WHERE id = ?")
        .bind(auth.user_id)
        .fetch_optional(pool.get_ref())
        .await?
        .ok_or_else(|| ApiError::Unauthorized("User not found".to_string()))?;

    if verify_password(&body.current_password, &user.password).is_err() {
        return Err(ApiError::Unauthorized("Current password is incorrect".to_string()));
    }

    let hashed = hash_password(&body.new_password)?;

    let mut tx = pool.begin().await?;
    sqlx::query("UPDATE users SET password = ? WHERE id = ?")
        .bind(&hashed)
        .bind(auth.user_id)
        .execute(&mut *tx)
        .await?;
    sqlx::query("UPDATE profiles SET first_login = 0 WHERE user_id = ?")
        .bind(auth.user_id)
        .execute(&mut *tx)
        .await?;
    // Existing sessions must log in again with the new password.
    sqlx::query("UPDATE refresh_tokens SET revoked = 1 WHERE user_id = ?")
        .bind(auth.user_id)
        .execute(&mut *tx)
        .await?;
    tx.commit().await?;

    info!(user_id = user.id, email = %user.email, "Password changed");

    Ok(HttpResponse::Ok().json(json!({ "success": true })))
}

/* =========================
Admin
========================= */

#[utoipa::path(
    post,
    path = "/api/admin/add-employee",
    request_body = AddEmployee,
    responses(
        (status = 201, description = "Employee provisioned", body = AddEmployeeResponse),
        (status = 400, description = "Missing or invalid fields"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Admin only"),
        (status = 409, description = "Email already registered")
    ),
    security(("bearer_auth" = [])),
    tag = "Admin"
)]
pub async fn add_employee(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
    payload: web::Json<AddEmployee>,
) -> Result<HttpResponse, ApiError> {
    validate_email(&payload.email)?;
    if payload.full_name.trim().is_empty() {
        return Err(ApiError::bad_request("full_name must not be empty"));
    }

    let (password, temporary) = match payload.password.as_deref() {
        Some(p) if p.len() < MIN_PASSWORD_LEN => {
            return Err(ApiError::bad_request(format!(
                "Password must be at least {} characters",
                MIN_PASSWORD_LEN
            )));
        }
        Some(p) => (p.to_string(), false),
        None => (temporary_password(), true),
    };

    let role = payload.role.unwrap_or(Role::Employee);

    let profile = create_account(
        pool.get_ref(),
        &config.company_code,
        NewAccount {
            email: &payload.email,
            password: &password,
            full_name: &payload.full_name,
            role,
            phone: payload.phone.as_deref(),
            address: payload.address.as_deref(),
            department: payload.department.as_deref(),
            designation: payload.designation.as_deref(),
            date_of_joining: payload.date_of_joining,
            first_login: true,
        },
    )
    .await?;

    notify::send(
        pool.get_ref(),
        profile.user_id,
        NotificationKind::Account,
        "Welcome to DayFlow",
        &format!(
            "Your employee ID is {}. Please change your password after signing in.",
            profile.employee_id
        ),
    )
    .await;

    audit::record(
        pool.get_ref(),
        auth.user_id,
        "employee.create",
        "profile",
        profile.user_id,
        json!({
            "employee_id": profile.employee_id,
            "email": profile.email,
            "role": role,
        }),
    )
    .await;

    Ok(HttpResponse::Created().json(AddEmployeeResponse {
        success: true,
        profile,
        temporary_password: temporary.then_some(password),
    }))
}

#[utoipa::path(
    post,
    path = "/api/admin/update-role",
    request_body = UpdateRole,
    responses(
        (status = 200, description = "Role updated", body = ProfileResponse),
        (status = 400, description = "Invalid role or own account"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Admin only"),
        (status = 404, description = "User not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Admin"
)]
pub async fn update_role(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    payload: web::Json<UpdateRole>,
) -> Result<HttpResponse, ApiError> {
    let role = Role::from_column(&payload.role).ok_or_else(|| {
        ApiError::bad_request(format!("Invalid role. Allowed: {}", Role::allowed_values()))
    })?;

    if payload.user_id == auth.user_id {
        return Err(ApiError::bad_request("Admins cannot change their own role"));
    }

    let previous = load_profile(pool.get_ref(), payload.user_id).await?;

    sqlx::query("UPDATE profiles SET role = ? WHERE user_id = ?")
        .bind(role.as_ref())
        .bind(payload.user_id)
        .execute(pool.get_ref())
        .await?;

    let profile = load_profile(pool.get_ref(), payload.user_id).await?;

    notify::send(
        pool.get_ref(),
        profile.user_id,
        NotificationKind::Role,
        "Role updated",
        &format!("Your role is now {}.", role),
    )
    .await;

    audit::record(
        pool.get_ref(),
        auth.user_id,
        "role.update",
        "profile",
        profile.user_id,
        json!({ "from": previous.role, "to": role }),
    )
    .await;

    Ok(HttpResponse::Ok().json(ProfileResponse { success: true, profile }))
}

#[utoipa::path(
    get,
    path = "/api/admin/profiles",
    params(ProfileQuery),
    responses(
        (status = 200, description = "Paginated profiles", body = ProfileListResponse),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Admin only")
    ),
    security(("bearer_auth" = [])),
    tag = "Admin"
)]
pub async fn list_profiles(
    pool: web::Data<MySqlPool>,
    query: web::Query<ProfileQuery>,
) -> Result<HttpResponse, ApiError> {
    let window = PageWindow::new(query.page, query.per_page);

    let mut filters = Filters::new();

    if let Some(role) = query.role.as_deref() {
        let role = Role::from_column(role).ok_or_else(|| {
            ApiError::bad_request(format!("Invalid role. Allowed: {}", Role::allowed_values()))
        })?;
        filters.push("role = ?", SqlValue::String(role.to_string()));
    }

    if let Some(department) = query.department.as_deref() {
        filters.push("department = ?", SqlValue::String(department.to_string()));
    }

    if let Some(search) = query.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        filters.push_repeated(
            "(full_name LIKE ? OR email LIKE ? OR employee_id LIKE ?)",
            SqlValue::String(format!("%{}%", search)),
            3,
        );
    }

    let where_clause = filters.where_clause();

    let count_sql = format!("SELECT COUNT(*) FROM profiles{}", where_clause);
    let total = fetch_count(pool.get_ref(), &count_sql, filters.values()).await?;

    let data_sql = format!(
        "SELECT {} FROM profiles{} ORDER BY created_at DESC, user_id DESC{}",
        PROFILE_COLUMNS,
        where_clause,
        window.limit_clause()
    );
    debug!(sql = %data_sql, page = window.page, per_page = window.per_page, "Fetching profiles");

    let data = fetch_rows::<Profile>(pool.get_ref(), &data_sql, filters.values()).await?;

    Ok(HttpResponse::Ok().json(ProfileListResponse {
        data,
        page: window.page,
        per_page: window.per_page,
        total,
    }))
}

/// HR fields: `full_name`, `phone`, `address`, `department`, `designation`, `date_of_joining`
#[utoipa::path(
    put,
    path = "/api/admin/profiles/{user_id}",
    params(("user_id" = u64, Path, description = "Profile (user) id")),
    request_body(content = Object, example = json!({"department": "Finance", "designation": "Analyst"})),
    responses(
        (status = 200, description = "Profile updated", body = ProfileResponse),
        (status = 400, description = "Field not editable or bad value"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Admin only"),
        (status = 404, description = "Profile not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Admin"
)]
pub async fn update_profile(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
    body: web::Json<Value>,
) -> Result<HttpResponse, ApiError> {
    let user_id = path.into_inner();

    if let Some(name) = body.get("full_name") {
        if name.as_str().map(str::trim).unwrap_or("").is_empty() {
            return Err(ApiError::bad_request("full_name must not be empty"));
        }
    }

    // 404 before touching anything; rows_affected is 0 for no-op updates too.
    load_profile(pool.get_ref(), user_id).await?;

    let update = build_update_sql("profiles", &body, ADMIN_EDITABLE, "user_id", user_id)?;
    execute_update(pool.get_ref(), update).await?;

    let profile = load_profile(pool.get_ref(), user_id).await?;

    audit::record(
        pool.get_ref(),
        auth.user_id,
        "profile.update",
        "profile",
        user_id,
        body.into_inner(),
    )
    .await;

    Ok(HttpResponse::Ok().json(ProfileResponse { success: true, profile }))
}
