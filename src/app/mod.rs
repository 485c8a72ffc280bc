// ==========================================
// 报名与事项审批核心 - 应用层
// ==========================================
// 职责: 装配共享连接、仓储、协作方与 API
// ==========================================

pub mod state;

// 重导出
pub use state::{get_default_db_path, AppCollaborators, AppState};
