use crate::{
    api::{attendance, audit_log, leave_request, notification, payroll, profile},
    auth::{
        handlers,
        middleware::{admin_middleware, auth_middleware},
    },
    config::Config,
    error::ApiError,
};
use actix_governor::{
    Governor, GovernorConfigBuilder, PeerIpKeyExtractor, governor::middleware::NoOpMiddleware,
};
use actix_web::{middleware::from_fn, web};
use anyhow::{Result, anyhow};
use std::sync::Arc;

type Limiter = Arc<Governor<PeerIpKeyExtractor, NoOpMiddleware>>;

/// Per-IP limiters, built once so every worker shares the same buckets.
#[derive(Clone)]
pub struct RateLimiters {
    login: Limiter,
    register: Limiter,
    refresh: Limiter,
    protected: Limiter,
}

impl RateLimiters {
    pub fn from_config(config: &Config) -> Result<Self> {
        Ok(Self {
            login: build_limiter("login", config.rate_login_per_min)?,
            register: build_limiter("register", config.rate_register_per_min)?,
            refresh: build_limiter("refresh", config.rate_refresh_per_min)?,
            protected: build_limiter("protected", config.rate_protected_per_min)?,
        })
    }
}

fn build_limiter(name: &str, requests_per_min: u32) -> Result<Limiter> {
    let requests_per_min = requests_per_min.max(1);
    let per_ms = (60_000 / requests_per_min as u64).max(1);

    let cfg = GovernorConfigBuilder::default()
        .per_millisecond(per_ms)
        .burst_size(requests_per_min)
        .key_extractor(PeerIpKeyExtractor)
        .finish()
        .ok_or_else(|| anyhow!("invalid {name} rate limit: {requests_per_min}/min"))?;

    Ok(Arc::new(Governor::new(&cfg)))
}

/// Malformed bodies, queries and paths answer `{"error": ...}` like every other failure.
fn extractor_errors(cfg: &mut web::ServiceConfig) {
    cfg.app_data(
        web::JsonConfig::default()
            .error_handler(|err, _req| ApiError::bad_request(err.to_string()).into()),
    )
    .app_data(
        web::QueryConfig::default()
            .error_handler(|err, _req| ApiError::bad_request(err.to_string()).into()),
    )
    .app_data(
        web::PathConfig::default()
            .error_handler(|err, _req| ApiError::bad_request(err.to_string()).into()),
    );
}

pub fn configure(cfg: &mut web::ServiceConfig, config: &Config, limiters: RateLimiters) {
    extractor_errors(cfg);

    // Public routes
    cfg.service(
        web::scope("/auth")
            .service(
                web::resource("/login")
                    .wrap(limiters.login.clone())
                    .route(web::post().to(handlers::login)),
            )
            .service(
                web::resource("/register")
                    .wrap(limiters.register.clone())
                    .route(web::post().to(handlers::register)),
            )
            .service(
                web::resource("/refresh")
                    .wrap(limiters.refresh.clone())
                    .route(web::post().to(handlers::refresh_token)),
            )
            .service(
                web::resource("/logout")
                    .wrap(limiters.refresh.clone())
                    .route(web::post().to(handlers::logout)),
            ),
    );

    // Protected routes
    cfg.service(
        web::scope(&config.api_prefix)
            .wrap(from_fn(auth_middleware))
            .wrap(limiters.protected.clone())
            .service(
                web::scope("/me")
                    .service(
                        web::resource("/profile")
                            .route(web::get().to(profile::get_my_profile))
                            .route(web::put().to(profile::update_my_profile)),
                    )
                    .service(web::resource("/password").route(web::post().to(profile::change_password)))
                    .service(web::resource("/attendance").route(web::get().to(attendance::my_attendance)))
                    .service(
                        web::resource("/attendance/check-in").route(web::post().to(attendance::check_in)),
                    )
                    .service(
                        web::resource("/attendance/check-out").route(web::post().to(attendance::check_out)),
                    )
                    .service(
                        web::resource("/leaves")
                            .route(web::get().to(leave_request::my_leaves))
                            .route(web::post().to(leave_request::create_leave)),
                    )
                    .service(web::resource("/payrolls").route(web::get().to(payroll::my_payrolls)))
                    .service(
                        web::resource("/notifications").route(web::get().to(notification::my_notifications)),
                    )
                    .service(
                        web::resource("/notifications/{id}/read")
                            .route(web::put().to(notification::mark_read)),
                    ),
            )
            .service(
                web::scope("/admin")
                    .wrap(from_fn(admin_middleware))
                    .service(web::resource("/add-employee").route(web::post().to(profile::add_employee)))
                    .service(web::resource("/update-role").route(web::post().to(profile::update_role)))
                    .service(web::resource("/profiles").route(web::get().to(profile::list_profiles)))
                    .service(
                        web::resource("/profiles/{user_id}").route(web::put().to(profile::update_profile)),
                    )
                    .service(
                        web::resource("/attendance").route(web::get().to(attendance::attendance_by_date)),
                    )
                    .service(web::resource("/leaves").route(web::get().to(leave_request::list_leaves)))
                    .service(
                        web::resource("/leave-action").route(web::post().to(leave_request::leave_action)),
                    )
                    .service(web::resource("/payroll").route(web::post().to(payroll::create_payroll)))
                    .service(web::resource("/payroll/{id}").route(web::put().to(payroll::update_payroll)))
                    .service(web::resource("/payrolls").route(web::get().to(payroll::list_payrolls)))
                    .service(
                        web::resource("/notifications")
                            .route(web::post().to(notification::send_notification)),
                    )
                    .service(
                        web::resource("/audit-logs").route(web::get().to(audit_log::list_audit_logs)),
                    ),
            ),
    );
}

// LOGIN
//  ├─ access_token (15 min)
//  └─ refresh_token (7 days)

// API REQUEST
//  └─ Authorization: Bearer access_token
//       └─ /api/admin/* re-reads profiles.role on every call

// ACCESS EXPIRED
//  └─ POST /auth/refresh with refresh_token
//       └─ rotates both tokens

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::jwt::generate_refresh_token;
    use actix_web::{App, http::Method, http::StatusCode, test, web::Data};
    use serde_json::Value;
    use sqlx::mysql::MySqlPoolOptions;
    use std::net::SocketAddr;

    const PROTECTED: &[(&str, &str)] = &[
        ("GET", "/api/me/profile"),
        ("PUT", "/api/me/profile"),
        ("POST", "/api/me/password"),
        ("GET", "/api/me/attendance"),
        ("POST", "/api/me/attendance/check-in"),
        ("POST", "/api/me/attendance/check-out"),
        ("GET", "/api/me/leaves"),
        ("POST", "/api/me/leaves"),
        ("GET", "/api/me/payrolls"),
        ("GET", "/api/me/notifications"),
        ("PUT", "/api/me/notifications/1/read"),
        ("POST", "/api/admin/add-employee"),
        ("POST", "/api/admin/update-role"),
        ("GET", "/api/admin/profiles"),
        ("PUT", "/api/admin/profiles/1"),
        ("GET", "/api/admin/attendance"),
        ("GET", "/api/admin/leaves"),
        ("POST", "/api/admin/leave-action"),
        ("POST", "/api/admin/payroll"),
        ("PUT", "/api/admin/payroll/1"),
        ("GET", "/api/admin/payrolls"),
        ("POST", "/api/admin/notifications"),
        ("GET", "/api/admin/audit-logs"),
    ];

    fn peer() -> SocketAddr {
        "127.0.0.1:40000".parse().unwrap()
    }

    fn request(method: &str, uri: &str) -> test::TestRequest {
        test::TestRequest::default()
            .method(Method::from_bytes(method.as_bytes()).unwrap())
            .uri(uri)
            .peer_addr(peer())
    }

    macro_rules! app {
        () => {
            app!(Config::for_tests())
        };
        ($config:expr) => {{
            let config = $config;
            let limiters = RateLimiters::from_config(&config).unwrap();
            // Lazy pool: never connects unless a handler actually queries.
            let pool = MySqlPoolOptions::new()
                .connect_lazy(&config.database_url)
                .unwrap();
            test::init_service(
                App::new()
                    .app_data(Data::new(pool))
                    .app_data(Data::new(config.clone()))
                    .configure(|cfg| configure(cfg, &config, limiters)),
            )
            .await
        }};
    }

    #[actix_web::test]
    async fn protected_routes_require_a_token() {
        let app = app!();
        for (method, uri) in PROTECTED {
            let resp = test::call_service(&app, request(method, uri).to_request()).await;
            assert_eq!(resp.status(), StatusCode::UNAUTHORIZED, "{method} {uri}");
        }
    }

    #[actix_web::test]
    async fn malformed_tokens_are_rejected() {
        let app = app!();
        for header in ["Bearer not-a-jwt", "Basic Zm9vOmJhcg==", "Bearer "] {
            for (method, uri) in PROTECTED {
                let req = request(method, uri)
                    .insert_header(("Authorization", header))
                    .to_request();
                let resp = test::call_service(&app, req).await;
                assert_eq!(resp.status(), StatusCode::UNAUTHORIZED, "{header:?} {method} {uri}");
            }
        }
    }

    #[actix_web::test]
    async fn refresh_tokens_cannot_call_the_api() {
        let app = app!();
        let config = Config::for_tests();
        let (token, _) =
            generate_refresh_token(1, "admin@dayflow.test", "admin", &config.jwt_secret, 600).unwrap();

        for (method, uri) in PROTECTED {
            let req = request(method, uri)
                .insert_header(("Authorization", format!("Bearer {token}")))
                .to_request();
            let resp = test::call_service(&app, req).await;
            assert_eq!(resp.status(), StatusCode::UNAUTHORIZED, "{method} {uri}");
        }
    }

    #[actix_web::test]
    async fn unauthorized_body_is_an_error_object() {
        let app = app!();
        let resp = test::call_service(&app, request("GET", "/api/admin/profiles").to_request()).await;
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["error"], "Missing Authorization header");
    }

    #[actix_web::test]
    async fn malformed_json_is_a_bad_request() {
        let app = app!();
        let req = request("POST", "/auth/login")
            .insert_header(("Content-Type", "application/json"))
            .set_payload("{not json")
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let body: Value = test::read_body_json(resp).await;
        assert!(body["error"].is_string());
    }

    #[actix_web::test]
    async fn register_validates_before_touching_the_database() {
        let app = app!();
        let cases = [
            serde_json::json!({"email": "not-an-email", "password": "longenough", "full_name": "Jane Roe"}),
            serde_json::json!({"email": "jane@dayflow.test", "password": "short", "full_name": "Jane Roe"}),
            serde_json::json!({"email": "jane@dayflow.test", "password": "longenough", "full_name": "  "}),
        ];
        for body in cases {
            let req = request("POST", "/auth/register").set_json(&body).to_request();
            let resp = test::call_service(&app, req).await;
            assert_eq!(resp.status(), StatusCode::BAD_REQUEST, "{body}");
        }
    }

    #[actix_web::test]
    async fn logout_without_token_is_no_content() {
        let app = app!();
        let resp = test::call_service(&app, request("POST", "/auth/logout").to_request()).await;
        assert_eq!(resp.status(), StatusCode::NO_CONTENT);
    }

    #[actix_web::test]
    async fn register_rejects_values_wider_than_their_columns() {
        let app = app!();
        let cases = [
            serde_json::json!({"email": "jane@dayflow.test", "password": "longenough", "full_name": "N".repeat(256)}),
            serde_json::json!({"email": format!("{}@dayflow.test", "j".repeat(250)), "password": "longenough", "full_name": "Jane Roe"}),
        ];
        for body in cases {
            let req = request("POST", "/auth/register").set_json(&body).to_request();
            let resp = test::call_service(&app, req).await;
            assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        }
    }

    #[actix_web::test]
    async fn logout_is_not_throttled_by_the_login_limit() {
        let config = Config {
            rate_login_per_min: 1,
            ..Config::for_tests()
        };
        let app = app!(config);

        let login = || {
            request("POST", "/auth/login")
                .insert_header(("Content-Type", "application/json"))
                .set_payload("{}")
                .to_request()
        };
        assert_eq!(test::call_service(&app, login()).await.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            test::call_service(&app, login()).await.status(),
            StatusCode::TOO_MANY_REQUESTS
        );

        for _ in 0..3 {
            let resp = test::call_service(&app, request("POST", "/auth/logout").to_request()).await;
            assert_eq!(resp.status(), StatusCode::NO_CONTENT);
        }
    }

    #[::core::prelude::v1::test]
    fn zero_rate_limit_is_clamped() {
        assert!(build_limiter("test", 0).is_ok());
    }
}
