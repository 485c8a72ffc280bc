// ==========================================
// 报名与事项审批核心 - 核心库
// ==========================================
// 职责: 容量池报名、行政事项审批流转、花名册投影
// 技术栈: Rust + SQLite
// ==========================================

// 初始化国际化系统
rust_i18n::i18n!("locales", fallback = "zh-CN");

// ==========================================
// 模块声明
// ==========================================

// 领域层 - 实体与类型
pub mod domain;

// 数据仓储层 - 数据访问
pub mod repository;

// 引擎层 - 业务规则
pub mod engine;

// 配置层 - 系统配置
pub mod config;

// 数据库基础设施（连接初始化/PRAGMA 统一/建表）
pub mod db;

// 日志系统
pub mod logging;

// 国际化
pub mod i18n;

// 外部协作方（身份、对象存储）
pub mod collaborator;

// 导出渲染
pub mod export;

// API 层 - 业务接口
pub mod api;

// 应用层 - 装配
pub mod app;

// ==========================================
// 重导出核心类型
// ==========================================

pub use domain::types::{EnrollmentStatus, PoolKind, Priority, ProcedureKind, ProcedureState, Role};

pub use domain::{ActionLog, ActionType, CapacityPool, EnrollmentRecord, Procedure, SubProject};

pub use api::{ApiError, ApiResult, EnrollmentApi, ProcedureApi, RosterApi};

pub use export::ExportFormat;

// ==========================================
// 常量定义
// ==========================================

// 系统版本
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// 系统名称
pub const APP_NAME: &str = "报名与事项审批核心";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }
}
