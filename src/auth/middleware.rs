use crate::auth::auth::{AuthUser, authorize_admin};
use crate::auth::jwt::verify_token;
use crate::config::Config;
use crate::error::ApiError;
use crate::model::role::Role;
use crate::models::TokenType;
use actix_web::middleware::Next;
use actix_web::{
    Error, HttpMessage, ResponseError,
    body::BoxBody,
    dev::{ServiceRequest, ServiceResponse},
    web::Data,
};
use sqlx::MySqlPool;
use tracing::{debug, warn};

fn reject(req: ServiceRequest, err: ApiError) -> Result<ServiceResponse<BoxBody>, Error> {
    Ok(req.into_response(err.error_response()))
}

/// Verifies the bearer access token and stores the caller as [`AuthUser`].
pub async fn auth_middleware(
    req: ServiceRequest,
    next: Next<BoxBody>,
) -> Result<ServiceResponse<BoxBody>, Error> {
    let config = match req.app_data::<Data<Config>>() {
        Some(c) => c.clone(),
        None => return reject(req, ApiError::internal("Auth middleware", "app config missing")),
    };

    let header_value = match req.headers().get("Authorization").map(|h| h.to_str()) {
        Some(Ok(v)) => v.to_string(),
        Some(Err(_)) => {
            return reject(
                req,
                ApiError::Unauthorized("Invalid Authorization header encoding".to_string()),
            );
        }
        None => {
            return reject(
                req,
                ApiError::Unauthorized("Missing Authorization header".to_string()),
            );
        }
    };

    let token = match header_value.strip_prefix("Bearer ") {
        Some(t) => t.trim(),
        None => {
            return reject(
                req,
                ApiError::Unauthorized("Authorization header must start with Bearer".to_string()),
            );
        }
    };

    let claims = match verify_token(token, &config.jwt_secret) {
        Ok(c) => c,
        Err(e) => {
            debug!(error = %e, "Token verification failed");
            return reject(req, ApiError::Unauthorized("Invalid or expired token".to_string()));
        }
    };

    if claims.token_type != TokenType::Access {
        return reject(req, ApiError::Unauthorized("Access token required".to_string()));
    }

    req.extensions_mut().insert(AuthUser {
        user_id: claims.user_id,
        email: claims.sub,
    });

    next.call(req).await
}

/// Re-reads the caller's role from `profiles`; the token's role hint is ignored.
pub async fn admin_middleware(
    req: ServiceRequest,
    next: Next<BoxBody>,
) -> Result<ServiceResponse<BoxBody>, Error> {
    let caller = req.extensions().get::<AuthUser>().cloned();
    let auth_user = match caller {
        Some(u) => u,
        None => return reject(req, ApiError::Unauthorized("Not authenticated".to_string())),
    };

    let pool = match req.app_data::<Data<MySqlPool>>() {
        Some(p) => p.clone(),
        None => return reject(req, ApiError::internal("Admin gate", "database pool missing")),
    };

    let stored = sqlx::query_scalar::<_, String>("SELECT role FROM profiles WHERE user_id = ?")
        .bind(auth_user.user_id)
        .fetch_optional(pool.get_ref())
        .await;

    let stored_role = match stored {
        Ok(row) => row.map(|r| Role::from_column(&r)),
        Err(e) => return reject(req, ApiError::internal("Failed to fetch caller role", e)),
    };

    if let Err(e) = authorize_admin(stored_role) {
        warn!(
            user_id = auth_user.user_id,
            path = %req.path(),
            "Admin route refused"
        );
        return reject(req, e);
    }

    next.call(req).await
}
