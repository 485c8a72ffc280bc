// ==========================================
// 报名与事项审批核心 - 领域模型层
// ==========================================
// 职责: 定义领域实体、类型、业务规则接口
// 红线: 不含数据访问逻辑
// ==========================================

pub mod action_log;
pub mod pool;
pub mod procedure;
pub mod types;

// 重导出核心类型
pub use action_log::{ActionLog, ActionType};
pub use pool::{CapacityPool, EnrollmentRecord, NewPool, PoolMember, SubProject};
pub use procedure::{
    DocumentRef, NewDocument, Procedure, ProcedureFilter, ProcedureNote, ProcedurePatch,
    TransitionEffect,
};
pub use types::{EnrollmentStatus, PoolKind, Priority, ProcedureKind, ProcedureState, Role};
