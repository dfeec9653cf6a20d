use actix_web::{HttpResponse, ResponseError, http::StatusCode};
use derive_more::Display;
use serde_json::json;

/// Every handler error ends up as `{"error": "..."}` with one of these statuses.
#[derive(Debug, Display)]
pub enum ApiError {
    #[display(fmt = "{}", _0)]
    BadRequest(String),
    #[display(fmt = "{}", _0)]
    Unauthorized(String),
    #[display(fmt = "{}", _0)]
    Forbidden(String),
    #[display(fmt = "{}", _0)]
    NotFound(String),
    #[display(fmt = "{}", _0)]
    Conflict(String),
    #[display(fmt = "Internal Server Error")]
    Internal,
}

impl ApiError {
    pub fn bad_request(msg: impl Into<String>) -> Self {
        ApiError::BadRequest(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        ApiError::NotFound(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        ApiError::Conflict(msg.into())
    }

    /// Logs the underlying failure and hides it from the caller.
    pub fn internal(context: &str, err: impl std::fmt::Display) -> Self {
        tracing::error!(error = %err, "{}", context);
        ApiError::Internal
    }
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).json(json!({ "error": self.to_string() }))
    }
}

impl From<sqlx::Error> for ApiError {
    fn from(e: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db_err) = &e {
            if db_err.is_unique_violation() {
                return ApiError::conflict("Record already exists");
            }
            if db_err.is_foreign_key_violation() {
                return ApiError::bad_request("Referenced record does not exist");
            }
            if db_err.is_check_violation() {
                return ApiError::bad_request("Value violates a table constraint");
            }
            // SQLSTATE class 22: data too long, out of range, bad date.
            if db_err.code().is_some_and(|code| code.starts_with("22")) {
                return ApiError::bad_request("Value is too long or out of range");
            }
        }
        ApiError::internal("Database error", e)
    }
}

impl ApiError {
    /// Like `From<sqlx::Error>`, but a duplicate key answers 409 with `msg`.
    pub fn on_duplicate(e: sqlx::Error, msg: &str) -> Self {
        match &e {
            sqlx::Error::Database(db_err) if db_err.is_unique_violation() => ApiError::conflict(msg),
            _ => e.into(),
        }
    }
}

impl From<argon2::password_hash::Error> for ApiError {
    fn from(e: argon2::password_hash::Error) -> Self {
        ApiError::internal("Password hashing failed", e)
    }
}

impl From<jsonwebtoken::errors::Error> for ApiError {
    fn from(e: jsonwebtoken::errors::Error) -> Self {
        ApiError::internal("Token encoding failed", e)
    }
}

/// Driver-free database errors for classification tests.
#[cfg(test)]
pub(crate) mod testing {
    use sqlx::error::{DatabaseError, ErrorKind};
    use std::borrow::Cow;

    #[derive(Debug)]
    pub struct FakeDbError {
        kind: ErrorKind,
        code: &'static str,
        message: String,
    }

    impl FakeDbError {
        pub fn new(kind: ErrorKind, code: &'static str, message: impl Into<String>) -> Self {
            FakeDbError { kind, code, message: message.into() }
        }

        /// MySQL duplicate-entry error (1062, SQLSTATE 23000).
        pub fn unique(message: impl Into<String>) -> Self {
            FakeDbError::new(ErrorKind::UniqueViolation, "23000", message)
        }
    }

    impl std::fmt::Display for FakeDbError {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            write!(f, "{} ({})", self.message, self.code)
        }
    }

    impl std::error::Error for FakeDbError {}

    impl DatabaseError for FakeDbError {
        fn message(&self) -> &str {
            &self.message
        }

        fn code(&self) -> Option<Cow<'_, str>> {
            Some(Cow::Borrowed(self.code))
        }

        fn as_error(&self) -> &(dyn std::error::Error + Send + Sync + 'static) {
            self
        }

        fn as_error_mut(&mut self) -> &mut (dyn std::error::Error + Send + Sync + 'static) {
            self
        }

        fn into_error(self: Box<Self>) -> Box<dyn std::error::Error + Send + Sync + 'static> {
            self
        }

        fn kind(&self) -> ErrorKind {
            match self.kind {
                ErrorKind::UniqueViolation => ErrorKind::UniqueViolation,
                ErrorKind::ForeignKeyViolation => ErrorKind::ForeignKeyViolation,
                ErrorKind::CheckViolation => ErrorKind::CheckViolation,
                _ => ErrorKind::Other,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use super::testing::FakeDbError;
    use actix_web::body::to_bytes;
    use sqlx::error::ErrorKind;

    #[actix_web::test]
    async fn error_body_has_error_field() {
        let resp = ApiError::conflict("Already checked in today").error_response();
        assert_eq!(resp.status(), StatusCode::CONFLICT);

        let body = to_bytes(resp.into_body()).await.unwrap();
        let value: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(value, json!({ "error": "Already checked in today" }));
    }

    #[actix_web::test]
    async fn internal_error_hides_details() {
        let resp = ApiError::internal("boom", "connection reset by peer").error_response();
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let body = to_bytes(resp.into_body()).await.unwrap();
        let text = String::from_utf8(body.to_vec()).unwrap();
        assert!(!text.contains("connection reset"));
    }

    #[test]
    fn status_codes_per_class() {
        assert_eq!(ApiError::bad_request("x").status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(
            ApiError::Unauthorized("x".into()).status_code(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(ApiError::Forbidden("x".into()).status_code(), StatusCode::FORBIDDEN);
        assert_eq!(ApiError::not_found("x").status_code(), StatusCode::NOT_FOUND);
    }

    fn db_error(kind: ErrorKind, code: &'static str) -> sqlx::Error {
        sqlx::Error::Database(Box::new(FakeDbError::new(kind, code, "fake database error")))
    }

    #[test]
    fn duplicate_key_maps_to_conflict() {
        let err: ApiError = db_error(ErrorKind::UniqueViolation, "23000").into();
        assert_eq!(err.status_code(), StatusCode::CONFLICT);
    }

    #[test]
    fn duplicate_key_keeps_the_callers_message() {
        let err = ApiError::on_duplicate(db_error(ErrorKind::UniqueViolation, "23000"), "Already checked in today");
        assert_eq!(err.status_code(), StatusCode::CONFLICT);
        assert_eq!(err.to_string(), "Already checked in today");

        let err = ApiError::on_duplicate(
            db_error(ErrorKind::UniqueViolation, "23000"),
            "Payroll already exists for this period",
        );
        assert_eq!(err.to_string(), "Payroll already exists for this period");
    }

    #[test]
    fn on_duplicate_falls_back_to_normal_mapping() {
        let err = ApiError::on_duplicate(db_error(ErrorKind::ForeignKeyViolation, "23000"), "dup");
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
        assert!(matches!(ApiError::on_duplicate(sqlx::Error::RowNotFound, "dup"), ApiError::Internal));
    }

    #[test]
    fn foreign_key_and_check_violations_are_bad_requests() {
        let fk: ApiError = db_error(ErrorKind::ForeignKeyViolation, "23000").into();
        let check: ApiError = db_error(ErrorKind::CheckViolation, "HY000").into();
        assert_eq!(fk.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(check.status_code(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn data_too_long_is_a_bad_request() {
        let too_long: ApiError = db_error(ErrorKind::Other, "22001").into();
        let out_of_range: ApiError = db_error(ErrorKind::Other, "22003").into();
        assert_eq!(too_long.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(out_of_range.status_code(), StatusCode::BAD_REQUEST);

        let other: ApiError = db_error(ErrorKind::Other, "HY000").into();
        assert!(matches!(other, ApiError::Internal));
    }

    #[test]
    fn row_not_found_maps_to_internal() {
        let err: ApiError = sqlx::Error::RowNotFound.into();
        assert!(matches!(err, ApiError::Internal));
    }
}
