use crate::{
    auth::{
        account::{NewAccount, create_account, validate_email},
        jwt::{generate_access_token, generate_refresh_token, verify_token},
        password::{MIN_PASSWORD_LEN, verify_password},
    },
    config::Config,
    error::ApiError,
    model::role::Role,
    models::{LoginReqDto, LoginResponse, RegisterReq, TokenType},
    utils::{audit, email_filter::normalize},
};
use actix_web::{HttpRequest, HttpResponse, web};
use serde_json::json;
use sqlx::{FromRow, MySqlPool};
use tracing::{debug, error, info, instrument};

#[derive(FromRow)]
struct LoginRow {
    id: u64,
    email: String,
    password: String,
    role: String,
    first_login: bool,
}

fn bearer_token(req: &HttpRequest) -> Option<&str> {
    req.headers()
        .get("Authorization")
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .map(str::trim)
}

/// Self-registration
#[utoipa::path(
    post,
    path = "/auth/register",
    request_body = RegisterReq,
    responses(
        (status = 201, description = "Account created", body = Object, example = json!({
            "success": true,
            "message": "User registered successfully"
        })),
        (status = 400, description = "Missing or invalid fields"),
        (status = 409, description = "Email already registered")
    ),
    tag = "Auth"
)]
#[instrument(name = "auth_register", skip(pool, config, user), fields(email = %user.email))]
pub async fn register(
    user: web::Json<RegisterReq>,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
) -> Result<HttpResponse, ApiError> {
    let email = normalize(&user.email);

    validate_email(&email)?;
    if user.full_name.trim().is_empty() {
        return Err(ApiError::bad_request("full_name must not be empty"));
    }
    if user.password.len() < MIN_PASSWORD_LEN {
        return Err(ApiError::bad_request(format!(
            "Password must be at least {} characters",
            MIN_PASSWORD_LEN
        )));
    }

    let role = match &config.bootstrap_admin_email {
        Some(admin_email) if *admin_email == email => Role::Admin,
        _ => Role::Employee,
    };

    let profile = create_account(
        pool.get_ref(),
        &config.company_code,
        NewAccount {
            email: &email,
            password: &user.password,
            full_name: &user.full_name,
            role,
            phone: None,
            address: None,
            department: None,
            designation: None,
            date_of_joining: None,
            first_login: false,
        },
    )
    .await?;

    audit::record(
        pool.get_ref(),
        profile.user_id,
        "account.register",
        "profile",
        profile.user_id,
        json!({ "role": role, "employee_id": profile.employee_id }),
    )
    .await;

    Ok(HttpResponse::Created().json(json!({
        "success": true,
        "message": "User registered successfully"
    })))
}

#[utoipa::path(
    post,
    path = "/auth/login",
    request_body = LoginReqDto,
    responses(
        (status = 200, description = "Tokens issued", body = LoginResponse),
        (status = 400, description = "Missing email or password"),
        (status = 401, description = "Invalid credentials")
    ),
    tag = "Auth"
)]
#[instrument(name = "auth_login", skip(pool, config, user), fields(email = %user.email))]
pub async fn login(
    user: web::Json<LoginReqDto>,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
) -> Result<HttpResponse, ApiError> {
    info!("Login request received");

    let email = normalize(&user.email);
    if email.is_empty() || user.password.is_empty() {
        return Err(ApiError::bad_request("Email and password are required"));
    }

    debug!("Fetching user from database");

    let db_user = sqlx::query_as::<_, LoginRow>(
        r#"
        SELECT u.id, u.email, u.password, p.role, p.first_login
        FROM users u
        JOIN profiles p ON p.user_id = u.id
        WHERE u.email = ?
        "#,
    )
    .bind(&email)
    .fetch_optional(pool.get_ref())
    .await?;

    let db_user = match db_user {
        Some(u) => u,
        None => {
            info!("Invalid credentials: user not found");
            return Err(ApiError::Unauthorized("Invalid credentials".to_string()));
        }
    };

    if let Err(e) = verify_password(&user.password, &db_user.password) {
        info!(error = %e, "Invalid credentials: password mismatch");
        return Err(ApiError::Unauthorized("Invalid credentials".to_string()));
    }

    let access_token = generate_access_token(
        db_user.id,
        &db_user.email,
        &db_user.role,
        &config.jwt_secret,
        config.access_token_ttl,
    )?;

    let (refresh_token, refresh_claims) = generate_refresh_token(
        db_user.id,
        &db_user.email,
        &db_user.role,
        &config.jwt_secret,
        config.refresh_token_ttl,
    )?;

    debug!(user_id = db_user.id, jti = %refresh_claims.jti, "Storing refresh token");

    sqlx::query(
        r#"
        INSERT INTO refresh_tokens (user_id, jti, expires_at)
        VALUES (?, ?, FROM_UNIXTIME(?))
        "#,
    )
    .bind(db_user.id)
    .bind(&refresh_claims.jti)
    .bind(refresh_claims.exp as i64)
    .execute(pool.get_ref())
    .await?;

    // non-fatal
    if let Err(e) = sqlx::query("UPDATE users SET last_login_at = NOW() WHERE id = ?")
        .bind(db_user.id)
        .execute(pool.get_ref())
        .await
    {
        error!(error = %e, "Failed to update last_login_at");
    }

    info!(user_id = db_user.id, "Login successful");

    Ok(HttpResponse::Ok().json(LoginResponse {
        access_token,
        refresh_token,
        role: db_user.role,
        first_login: db_user.first_login,
    }))
}

#[utoipa::path(
    post,
    path = "/auth/refresh",
    responses(
        (status = 200, description = "Rotated tokens", body = Object, example = json!({
            "access_token": "eyJ...",
            "refresh_token": "eyJ..."
        })),
        (status = 401, description = "Missing, invalid, expired or revoked refresh token")
    ),
    security(("bearer_auth" = [])),
    tag = "Auth"
)]
pub async fn refresh_token(
    req: HttpRequest,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
) -> Result<HttpResponse, ApiError> {
    let unauthorized = || ApiError::Unauthorized("Invalid refresh token".to_string());

    let token = bearer_token(&req).ok_or_else(unauthorized)?;
    let claims = verify_token(token, &config.jwt_secret).map_err(|_| unauthorized())?;

    if claims.token_type != TokenType::Refresh {
        return Err(unauthorized());
    }

    let mut tx = pool.begin().await?;

    // Revoke first; zero rows means unknown or already used.
    let revoked = sqlx::query("UPDATE refresh_tokens SET revoked = 1 WHERE jti = ? AND revoked = 0")
        .bind(&claims.jti)
        .execute(&mut *tx)
        .await?;

    if revoked.rows_affected() == 0 {
        return Err(unauthorized());
    }

    // Role may have changed since the old token was issued.
    let (email, role) = sqlx::query_as::<_, (String, String)>(
        "SELECT email, role FROM profiles WHERE user_id = ?",
    )
    .bind(claims.user_id)
    .fetch_optional(&mut *tx)
    .await?
    .ok_or_else(unauthorized)?;

    let (new_refresh_token, new_claims) = generate_refresh_token(
        claims.user_id,
        &email,
        &role,
        &config.jwt_secret,
        config.refresh_token_ttl,
    )?;

    sqlx::query(
        r#"
        INSERT INTO refresh_tokens (user_id, jti, expires_at)
        VALUES (?, ?, FROM_UNIXTIME(?))
        "#,
    )
    .bind(claims.user_id)
    .bind(&new_claims.jti)
    .bind(new_claims.exp as i64)
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;

    let access_token = generate_access_token(
        claims.user_id,
        &email,
        &role,
        &config.jwt_secret,
        config.access_token_ttl,
    )?;

    Ok(HttpResponse::Ok().json(json!({
        "access_token": access_token,
        "refresh_token": new_refresh_token
    })))
}

/// Revokes the presented refresh token; always 204.
#[utoipa::path(
    post,
    path = "/auth/logout",
    responses((status = 204, description = "Logged out")),
    security(("bearer_auth" = [])),
    tag = "Auth"
)]
pub async fn logout(
    req: HttpRequest,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
) -> HttpResponse {
    let claims = match bearer_token(&req).and_then(|t| verify_token(t, &config.jwt_secret).ok()) {
        Some(c) if c.token_type == TokenType::Refresh => c,
        _ => return HttpResponse::NoContent().finish(),
    };

    if let Err(e) = sqlx::query("UPDATE refresh_tokens SET revoked = 1 WHERE jti = ?")
        .bind(&claims.jti)
        .execute(pool.get_ref())
        .await
    {
        error!(error = %e, "Failed to revoke refresh token");
    }

    HttpResponse::NoContent().finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::test::TestRequest;

    #[test]
    fn bearer_token_is_extracted() {
        let req = TestRequest::default()
            .insert_header(("Authorization", "Bearer abc.def.ghi"))
            .to_http_request();
        assert_eq!(bearer_token(&req), Some("abc.def.ghi"));
    }

    #[test]
    fn non_bearer_schemes_are_ignored() {
        let req = TestRequest::default()
            .insert_header(("Authorization", "Basic Zm9vOmJhcg=="))
            .to_http_request();
        assert_eq!(bearer_token(&req), None);
        assert_eq!(bearer_token(&TestRequest::default().to_http_request()), None);
    }
}
