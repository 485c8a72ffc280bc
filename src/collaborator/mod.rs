// ==========================================
// 报名与事项审批核心 - 外部协作方接口
// ==========================================
// 职责: 定义身份查询、对象存储的 trait（依赖倒置）
// 说明: 核心只依赖 trait，不关心具体实现；
//       内存实现用于装配默认 AppState 与测试
// ==========================================

pub mod blob_store;
pub mod identity;

use thiserror::Error;

pub use blob_store::{BlobHandle, BlobMetadata, BlobStore, InMemoryBlobStore};
pub use identity::{IdentityDirectory, InMemoryIdentityDirectory, UserProfile};

/// 协作方调用错误
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CollaboratorError {
    /// 协作方暂时不可用（可重试）
    #[error("协作方不可用: {0}")]
    Unavailable(String),

    /// 对象不存在
    #[error("对象不存在: {0}")]
    NotFound(String),

    /// 其他错误
    #[error("协作方错误: {0}")]
    Other(String),
}

/// Result 类型别名
pub type CollaboratorResult<T> = Result<T, CollaboratorError>;
