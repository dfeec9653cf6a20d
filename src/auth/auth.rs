use crate::error::ApiError;
use crate::model::role::Role;
use actix_web::{FromRequest, HttpMessage, HttpRequest, dev::Payload};
use futures::future::{Ready, ready};

/// Caller identity, placed in request extensions by the auth middleware.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: u64,
    pub email: String,
}

impl FromRequest for AuthUser {
    type Error = ApiError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        ready(
            req.extensions()
                .get::<AuthUser>()
                .cloned()
                .ok_or_else(|| ApiError::Unauthorized("Not authenticated".to_string())),
        )
    }
}

/// Admin gate decision on the role read from the caller's stored profile.
///
/// `None` means the caller has no profile row, which is an authentication failure.
pub fn authorize_admin(stored_role: Option<Option<Role>>) -> Result<(), ApiError> {
    match stored_role {
        None => Err(ApiError::Unauthorized("User not found".to_string())),
        Some(Some(role)) if role.is_admin() => Ok(()),
        Some(_) => Err(ApiError::Forbidden("Admin only".to_string())),
    }
}
