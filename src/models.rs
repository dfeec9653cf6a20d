use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Deserialize, ToSchema)]
pub struct RegisterReq {
    #[schema(example = "jane@company.com", format = "email")]
    pub email: String,
    #[schema(example = "correct-horse-battery")]
    pub password: String,
    #[schema(example = "Jane Smith")]
    pub full_name: String,
}

#[derive(Deserialize, ToSchema)]
pub struct LoginReqDto {
    #[schema(example = "jane@company.com", format = "email")]
    pub email: String,
    pub password: String,
}

#[derive(Serialize, Deserialize, ToSchema)]
pub struct LoginResponse {
    pub access_token: String,
    pub refresh_token: String,
    #[schema(example = "employee")]
    pub role: String,
    /// True until the user changes the password they were provisioned with
    pub first_login: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub user_id: u64,
    /// Account email
    pub sub: String,
    /// Role at issue time; a display hint only, admin routes re-read it from the store
    pub role: String,
    pub exp: usize,
    pub jti: String,

    pub token_type: TokenType,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub enum TokenType {
    Access,
    Refresh,
}
