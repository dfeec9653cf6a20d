use crate::api::attendance::{
    AttendanceListResponse, AttendanceResponse, DailyAttendanceResponse, DailyAttendanceRow,
};
use crate::api::audit_log::AuditLogListResponse;
use crate::api::leave_request::{
    AdminLeaveRow, CreateLeave, LeaveAction, LeaveListResponse, LeaveResponse, MyLeaveListResponse,
};
use crate::api::notification::{NotificationListResponse, NotificationResponse, SendNotification};
use crate::api::payroll::{
    CreatePayroll, MyPayrollListResponse, PaginatedPayrollResponse, PayrollResponse, UpdatePayroll,
};
use crate::api::profile::{
    AddEmployee, AddEmployeeResponse, ChangePassword, ProfileListResponse, ProfileResponse,
    UpdateRole,
};
use crate::model::{
    attendance::{AttendanceRecord, AttendanceStatus},
    audit_log::AuditLogEntry,
    leave_request::{LeaveRequest, LeaveStatus, LeaveType},
    notification::{Notification, NotificationKind},
    payroll::{PaymentStatus, PayrollRecord},
    profile::Profile,
    role::Role,
};
use crate::models::{LoginReqDto, LoginResponse, RegisterReq};
use utoipa::Modify;
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{OpenApi, openapi};

/// Registers the `bearer_auth` scheme referenced by protected paths.
pub struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer_auth",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}

#[derive(OpenApi)]
#[openapi(
    info(
        title = "DayFlow HRMS API",
        version = "1.0.0",
        description = r#"
## DayFlow HRMS

Privileged admin API and employee self-service for the DayFlow HR system.

### Key Features
- **Accounts**: registration, login, token refresh and logout
- **Profiles**: self-service contact edits, admin HR-field edits, role management
- **Attendance**: daily check-in / check-out, per-day admin view
- **Leave**: requests, approval and rejection
- **Payroll**: monthly records with server-computed net salary
- **Notifications** and an append-only **audit log**

### Security
Every `/api/*` endpoint needs `Authorization: Bearer <access token>`.
`/api/admin/*` additionally requires the caller's stored role to be `admin`;
the role inside the token is never trusted.

### Response Format
- Errors: `{"error": "..."}`
- Lists: `{"data": [...], "page", "per_page", "total"}`
- Mutations: `{"success": true, "<entity>": {...}}`
"#,
    ),
    paths(
        crate::auth::handlers::register,
        crate::auth::handlers::login,
        crate::auth::handlers::refresh_token,
        crate::auth::handlers::logout,

        crate::api::profile::get_my_profile,
        crate::api::profile::update_my_profile,
        crate::api::profile::change_password,
        crate::api::profile::add_employee,
        crate::api::profile::update_role,
        crate::api::profile::list_profiles,
        crate::api::profile::update_profile,

        crate::api::attendance::check_in,
        crate::api::attendance::check_out,
        crate::api::attendance::my_attendance,
        crate::api::attendance::attendance_by_date,

        crate::api::leave_request::create_leave,
        crate::api::leave_request::my_leaves,
        crate::api::leave_request::leave_action,
        crate::api::leave_request::list_leaves,

        crate::api::payroll::create_payroll,
        crate::api::payroll::update_payroll,
        crate::api::payroll::list_payrolls,
        crate::api::payroll::my_payrolls,

        crate::api::notification::send_notification,
        crate::api::notification::my_notifications,
        crate::api::notification::mark_read,

        crate::api::audit_log::list_audit_logs
    ),
    components(
        schemas(
            RegisterReq,
            LoginReqDto,
            LoginResponse,
            Role,
            Profile,
            AddEmployee,
            AddEmployeeResponse,
            UpdateRole,
            ChangePassword,
            ProfileResponse,
            ProfileListResponse,
            AttendanceStatus,
            AttendanceRecord,
            AttendanceResponse,
            AttendanceListResponse,
            DailyAttendanceRow,
            DailyAttendanceResponse,
            LeaveType,
            LeaveStatus,
            LeaveRequest,
            CreateLeave,
            LeaveAction,
            LeaveResponse,
            MyLeaveListResponse,
            AdminLeaveRow,
            LeaveListResponse,
            PaymentStatus,
            PayrollRecord,
            CreatePayroll,
            UpdatePayroll,
            PayrollResponse,
            PaginatedPayrollResponse,
            MyPayrollListResponse,
            NotificationKind,
            Notification,
            SendNotification,
            NotificationResponse,
            NotificationListResponse,
            AuditLogEntry,
            AuditLogListResponse
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Auth", description = "Registration, login and token rotation"),
        (name = "Profile", description = "Self-service profile and password"),
        (name = "Attendance", description = "Daily check-in and check-out"),
        (name = "Leave", description = "Leave requests"),
        (name = "Payroll", description = "Payroll records"),
        (name = "Notifications", description = "In-app notifications"),
        (name = "Admin", description = "Admin-only console endpoints"),
    )
)]
pub struct ApiDoc;
