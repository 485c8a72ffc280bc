// ==========================================
// 报名与事项审批核心 - 数据仓储层
// ==========================================
// 红线: Repository 不含业务逻辑
// ==========================================
// 职责: 提供数据访问接口,屏蔽数据库细节
// 约束: 所有查询使用参数化,防止 SQL 注入
// ==========================================

pub mod action_log_repo;
pub mod error;
pub mod pool_repo;
pub mod procedure_repo;
pub mod sql_builder;

// 重导出核心仓储
pub use action_log_repo::ActionLogRepository;
pub use error::{RepositoryError, RepositoryResult};
pub use pool_repo::{EnrollOutcome, PoolDeleteOutcome, PoolRepository, RosterRow, WithdrawOutcome};
pub use procedure_repo::{AttachOutcome, ProcedureRepository};
