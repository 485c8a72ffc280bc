// ==========================================
// 报名与事项审批核心 - 引擎层
// ==========================================
// 职责: 纯业务规则（能力判定、载荷校验、重试、通知事件）
// 红线: Engine 不拼 SQL
// ==========================================

pub mod authorization;
pub mod events;
pub mod retry;
pub mod validation;

// 重导出核心引擎
pub use authorization::{can, can_transition, Capability};
pub use events::{
    LoggingNotifier, NoOpNotifier, NotificationEvent, NotificationEventType, NotificationSink,
    OptionalNotifier,
};
pub use retry::RetryPolicy;
pub use validation::{normalize_submission, FieldViolation, NormalizedSubmission};
