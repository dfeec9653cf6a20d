pub mod attendance;
pub mod audit_log;
pub mod leave_request;
pub mod notification;
pub mod payroll;
pub mod profile;
pub mod role;
pub mod user;
