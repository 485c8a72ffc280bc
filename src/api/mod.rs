// ==========================================
// 报名与事项审批核心 - API 层
// ==========================================
// 职责: 业务操作入口（参数校验、权限、重试、审计、通知）
// 红线: API 层不拼 SQL，原子性由 Repository 保证
// ==========================================

pub(crate) mod common;
pub mod enrollment_api;
pub mod error;
pub mod procedure_api;
pub mod roster_api;

// 重导出
pub use enrollment_api::EnrollmentApi;
pub use error::{ApiError, ApiResult, ErrorKind, ErrorResponse};
pub use procedure_api::{ProcedureApi, ProcedurePage};
pub use roster_api::{RosterApi, RosterEntry, RosterFilter, RosterPage, RosterPaging};
