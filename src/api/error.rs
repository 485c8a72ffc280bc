// ==========================================
// 报名与事项审批核心 - API层错误类型
// ==========================================
// 职责: 定义调用方可见的错误分类，转换 Repository / 协作方错误
// 约束: 每个错误都有稳定的 kind 与 code，消息只用于展示
// ==========================================

use crate::collaborator::CollaboratorError;
use crate::domain::types::ProcedureState;
use crate::engine::validation::FieldViolation;
use crate::repository::error::RepositoryError;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// 错误大类（调用方据此决定重试/提示方式）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    Validation,
    NotFound,
    Conflict,
    Authorization,
    /// 存储暂时不可用，可稍后重试
    TransientStore,
    Internal,
}

/// API层错误类型
#[derive(Error, Debug)]
pub enum ApiError {
    // ==========================================
    // 输入校验错误
    // ==========================================
    #[error("数据验证失败: {message}")]
    ValidationError {
        message: String,
        violations: Vec<FieldViolation>,
    },

    // ==========================================
    // 资源不存在
    // ==========================================
    #[error("资源未找到: {entity}(id={id})")]
    NotFound { entity: String, id: String },

    // ==========================================
    // 业务冲突（不重试）
    // ==========================================
    #[error("已报名: pool_id={pool_id}, participant_id={participant_id}, 剩余席位={seats_remaining}")]
    AlreadyEnrolled {
        pool_id: String,
        participant_id: String,
        seats_remaining: u32,
    },

    #[error("名额已满: pool_id={pool_id}, 剩余席位={seats_remaining}")]
    PoolFull { pool_id: String, seats_remaining: u32 },

    #[error("报名未开放: pool_id={pool_id}, 剩余席位={seats_remaining}")]
    EnrollmentClosed { pool_id: String, seats_remaining: u32 },

    #[error("未报名: pool_id={pool_id}, participant_id={participant_id}, 剩余席位={seats_remaining}")]
    NotEnrolled {
        pool_id: String,
        participant_id: String,
        seats_remaining: u32,
    },

    #[error("当前状态不允许编辑: procedure_id={procedure_id}, state={state}")]
    EditNotAllowed {
        procedure_id: String,
        state: ProcedureState,
    },

    #[error("无效的状态转换: from={from} to={to}")]
    InvalidStatusTransition { from: String, to: String },

    #[error("存在依赖资源，禁止删除: {entity}(id={id}), 依赖数量={count}")]
    DependentResourcesExist { entity: String, id: String, count: u32 },

    #[error("并发修改冲突: {entity}(id={id}), 已尝试{attempts}次")]
    OptimisticLockFailure {
        entity: String,
        id: String,
        attempts: u32,
    },

    // ==========================================
    // 权限错误
    // ==========================================
    #[error("无权操作: actor_id={actor_id}, action={action}")]
    AuthorizationError { actor_id: String, action: String },

    // ==========================================
    // 基础设施错误
    // ==========================================
    #[error("存储暂时不可用: {0}")]
    TransientStoreError(String),

    #[error("协作方不可用: {0}")]
    CollaboratorUnavailable(String),

    #[error("数据库错误: {0}")]
    DatabaseError(String),

    // ==========================================
    // 通用错误
    // ==========================================
    #[error("内部错误: {0}")]
    InternalError(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl ApiError {
    /// 快捷构造：NotFound
    pub fn not_found(entity: &str, id: &str) -> Self {
        ApiError::NotFound {
            entity: entity.to_string(),
            id: id.to_string(),
        }
    }

    /// 快捷构造：无权限
    pub fn forbidden(actor_id: &str, action: &str) -> Self {
        ApiError::AuthorizationError {
            actor_id: actor_id.to_string(),
            action: action.to_string(),
        }
    }

    /// 快捷构造：单字段校验失败
    pub fn invalid_field(field: &str, reason: &str) -> Self {
        ApiError::ValidationError {
            message: format!("{}: {}", field, reason),
            violations: vec![FieldViolation {
                field: field.to_string(),
                reason: reason.to_string(),
            }],
        }
    }

    /// 错误大类
    pub fn kind(&self) -> ErrorKind {
        match self {
            ApiError::ValidationError { .. } => ErrorKind::Validation,
            ApiError::NotFound { .. } => ErrorKind::NotFound,
            ApiError::AlreadyEnrolled { .. }
            | ApiError::PoolFull { .. }
            | ApiError::EnrollmentClosed { .. }
            | ApiError::NotEnrolled { .. }
            | ApiError::EditNotAllowed { .. }
            | ApiError::InvalidStatusTransition { .. }
            | ApiError::DependentResourcesExist { .. }
            | ApiError::OptimisticLockFailure { .. } => ErrorKind::Conflict,
            ApiError::AuthorizationError { .. } => ErrorKind::Authorization,
            ApiError::TransientStoreError(_) | ApiError::CollaboratorUnavailable(_) => {
                ErrorKind::TransientStore
            }
            ApiError::DatabaseError(_) | ApiError::InternalError(_) | ApiError::Other(_) => {
                ErrorKind::Internal
            }
        }
    }

    /// 稳定错误码
    pub fn code(&self) -> &'static str {
        match self {
            ApiError::ValidationError { .. } => "VALIDATION_ERROR",
            ApiError::NotFound { .. } => "NOT_FOUND",
            ApiError::AlreadyEnrolled { .. } => "ALREADY_ENROLLED",
            ApiError::PoolFull { .. } => "POOL_FULL",
            ApiError::EnrollmentClosed { .. } => "ENROLLMENT_CLOSED",
            ApiError::NotEnrolled { .. } => "NOT_ENROLLED",
            ApiError::EditNotAllowed { .. } => "EDIT_NOT_ALLOWED",
            ApiError::InvalidStatusTransition { .. } => "INVALID_STATUS_TRANSITION",
            ApiError::DependentResourcesExist { .. } => "DEPENDENT_RESOURCES_EXIST",
            ApiError::OptimisticLockFailure { .. } => "OPTIMISTIC_LOCK_FAILURE",
            ApiError::AuthorizationError { .. } => "AUTHORIZATION_ERROR",
            ApiError::TransientStoreError(_) => "TRANSIENT_STORE_ERROR",
            ApiError::CollaboratorUnavailable(_) => "COLLABORATOR_UNAVAILABLE",
            ApiError::DatabaseError(_) => "DATABASE_ERROR",
            ApiError::InternalError(_) => "INTERNAL_ERROR",
            ApiError::Other(_) => "OTHER_ERROR",
        }
    }

    /// 是否可由重试策略自动重试
    ///
    /// 业务结果永远不重试；乐观锁冲突在接口内部已重试过，此处不再计入
    pub fn is_retryable(&self) -> bool {
        matches!(self, ApiError::TransientStoreError(_))
    }

    /// 附带的结构化细节（剩余席位、当前状态等）
    pub fn details(&self) -> Option<serde_json::Value> {
        match self {
            ApiError::ValidationError { violations, .. } => {
                Some(serde_json::json!({ "violations": violations }))
            }
            ApiError::AlreadyEnrolled { seats_remaining, .. }
            | ApiError::PoolFull { seats_remaining, .. }
            | ApiError::EnrollmentClosed { seats_remaining, .. }
            | ApiError::NotEnrolled { seats_remaining, .. } => {
                Some(serde_json::json!({ "seats_remaining": seats_remaining }))
            }
            ApiError::EditNotAllowed { state, .. } => Some(serde_json::json!({ "state": state })),
            ApiError::InvalidStatusTransition { from, to } => {
                Some(serde_json::json!({ "from": from, "to": to }))
            }
            ApiError::DependentResourcesExist { count, .. } => {
                Some(serde_json::json!({ "dependent_count": count }))
            }
            ApiError::OptimisticLockFailure { attempts, .. } => {
                Some(serde_json::json!({ "attempts": attempts }))
            }
            _ => None,
        }
    }
}

// ==========================================
// 从 RepositoryError 转换
// ==========================================
impl From<RepositoryError> for ApiError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::OptimisticLockFailure { entity, id, .. } => {
                ApiError::OptimisticLockFailure {
                    entity,
                    id,
                    attempts: 1,
                }
            }
            RepositoryError::StoreBusy(msg) => ApiError::TransientStoreError(msg),
            RepositoryError::LockError(msg) => {
                ApiError::InternalError(format!("数据库锁获取失败: {}", msg))
            }
            RepositoryError::NotFound { entity, id } => ApiError::NotFound { entity, id },
            RepositoryError::DatabaseConnectionError(msg) => {
                ApiError::DatabaseError(format!("连接失败: {}", msg))
            }
            RepositoryError::DatabaseQueryError(msg) => ApiError::DatabaseError(msg),
            RepositoryError::UniqueConstraintViolation(msg)
            | RepositoryError::ForeignKeyViolation(msg)
            | RepositoryError::CheckConstraintViolation(msg) => {
                ApiError::DatabaseError(format!("约束违反: {}", msg))
            }
            RepositoryError::FieldValueError { field, message } => {
                ApiError::InternalError(format!("字段{}数据异常: {}", field, message))
            }
            RepositoryError::InternalError(msg) => ApiError::InternalError(msg),
            RepositoryError::Other(err) => ApiError::Other(err),
        }
    }
}

// ==========================================
// 从 CollaboratorError 转换
// ==========================================
impl From<CollaboratorError> for ApiError {
    fn from(err: CollaboratorError) -> Self {
        match err {
            CollaboratorError::Unavailable(msg) => ApiError::CollaboratorUnavailable(msg),
            CollaboratorError::NotFound(id) => ApiError::NotFound {
                entity: "Blob".to_string(),
                id,
            },
            CollaboratorError::Other(msg) => ApiError::InternalError(msg),
        }
    }
}

/// Result 类型别名
pub type ApiResult<T> = Result<T, ApiError>;

// ==========================================
// 错误响应（对外序列化形态）
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// 错误代码
    pub code: String,
    /// 错误大类
    pub kind: ErrorKind,
    /// 错误消息
    pub message: String,
    /// 详细信息（可选）
    pub details: Option<serde_json::Value>,
}

impl From<&ApiError> for ErrorResponse {
    fn from(err: &ApiError) -> Self {
        Self {
            code: err.code().to_string(),
            kind: err.kind(),
            message: err.to_string(),
            details: err.details(),
        }
    }
}
