// ==========================================
// 报名与事项审批核心 - 通知事件发布
// ==========================================
// 职责: 定义通知事件与发送 trait（投递本身在核心之外）
// 约束: 发送失败只打 warn 日志，不影响已提交的写入
// ==========================================

use serde::{Deserialize, Serialize};
use std::error::Error;
use std::sync::Arc;

// ==========================================
// 通知事件类型
// ==========================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NotificationEventType {
    /// 报名成功
    Enrolled,
    /// 退出报名
    Withdrawn,
    /// 培训报名状态变更
    EnrollmentStatusChanged,
    /// 事项已提交
    ProcedureSubmitted,
    /// 事项状态变更
    ProcedureTransitioned,
    /// 事项新增附件
    DocumentAttached,
}

impl NotificationEventType {
    /// 转换为字符串标识
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationEventType::Enrolled => "Enrolled",
            NotificationEventType::Withdrawn => "Withdrawn",
            NotificationEventType::EnrollmentStatusChanged => "EnrollmentStatusChanged",
            NotificationEventType::ProcedureSubmitted => "ProcedureSubmitted",
            NotificationEventType::ProcedureTransitioned => "ProcedureTransitioned",
            NotificationEventType::DocumentAttached => "DocumentAttached",
        }
    }
}

/// 通知事件
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationEvent {
    pub event_type: NotificationEventType,
    /// 池ID或事项ID
    pub target_id: String,
    /// 接收人
    pub recipient_ids: Vec<String>,
    /// 摘要（如新状态、剩余席位）
    pub summary: String,
}

impl NotificationEvent {
    pub fn new(
        event_type: NotificationEventType,
        target_id: &str,
        recipient_ids: Vec<String>,
        summary: impl Into<String>,
    ) -> Self {
        Self {
            event_type,
            target_id: target_id.to_string(),
            recipient_ids,
            summary: summary.into(),
        }
    }
}

// ==========================================
// 通知发送 Trait
// ==========================================

/// 通知发送者
///
/// 实现方负责实际投递（邮件/推送等），核心只负责生成事件
pub trait NotificationSink: Send + Sync {
    fn notify(&self, event: &NotificationEvent) -> Result<(), Box<dyn Error + Send + Sync>>;
}

/// 空操作发送者（单元测试/未配置时使用）
#[derive(Debug, Clone, Default)]
pub struct NoOpNotifier;

impl NotificationSink for NoOpNotifier {
    fn notify(&self, event: &NotificationEvent) -> Result<(), Box<dyn Error + Send + Sync>> {
        tracing::debug!(
            "NoOpNotifier: 跳过通知 - target_id={}, event_type={}",
            event.target_id,
            event.event_type.as_str()
        );
        Ok(())
    }
}

/// 写入 tracing 日志的发送者
#[derive(Debug, Clone, Default)]
pub struct LoggingNotifier;

impl NotificationSink for LoggingNotifier {
    fn notify(&self, event: &NotificationEvent) -> Result<(), Box<dyn Error + Send + Sync>> {
        tracing::info!(
            event_type = event.event_type.as_str(),
            target_id = %event.target_id,
            recipients = ?event.recipient_ids,
            summary = %event.summary,
            "通知事件"
        );
        Ok(())
    }
}

/// 可选的通知发送者包装
///
/// 简化 Option<Arc<dyn NotificationSink>> 的使用
#[derive(Clone)]
pub struct OptionalNotifier {
    inner: Option<Arc<dyn NotificationSink>>,
}

impl OptionalNotifier {
    /// 创建带发送者的实例
    pub fn with_sink(sink: Arc<dyn NotificationSink>) -> Self {
        Self { inner: Some(sink) }
    }

    /// 创建空实例（不发送）
    pub fn none() -> Self {
        Self { inner: None }
    }

    /// 尽力发送：失败只记录告警，不向调用方传播
    pub fn dispatch(&self, event: NotificationEvent) {
        let Some(sink) = &self.inner else {
            tracing::debug!(
                "OptionalNotifier: 未配置发送者，跳过事件 - target_id={}, event_type={}",
                event.target_id,
                event.event_type.as_str()
            );
            return;
        };

        if let Err(e) = sink.notify(&event) {
            tracing::warn!(
                event_type = event.event_type.as_str(),
                target_id = %event.target_id,
                error = %e,
                "通知发送失败（已忽略）"
            );
        }
    }

    /// 检查是否配置了发送者
    pub fn is_configured(&self) -> bool {
        self.inner.is_some()
    }
}

impl Default for OptionalNotifier {
    fn default() -> Self {
        Self::none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    struct FailingNotifier {
        calls: Mutex<u32>,
    }

    impl NotificationSink for FailingNotifier {
        fn notify(&self, _event: &NotificationEvent) -> Result<(), Box<dyn Error + Send + Sync>> {
            *self.calls.lock().unwrap() += 1;
            Err("smtp down".into())
        }
    }

    #[test]
    fn test_dispatch_swallows_sink_failure() {
        let sink = Arc::new(FailingNotifier { calls: Mutex::new(0) });
        let notifier = OptionalNotifier::with_sink(sink.clone());

        notifier.dispatch(NotificationEvent::new(
            NotificationEventType::Enrolled,
            "P1",
            vec!["U1".to_string()],
            "seats_remaining=4",
        ));

        assert_eq!(*sink.calls.lock().unwrap(), 1);
        assert!(notifier.is_configured());
    }

    #[test]
    fn test_unconfigured_notifier_is_silent() {
        let notifier = OptionalNotifier::default();
        assert!(!notifier.is_configured());
        notifier.dispatch(NotificationEvent::new(
            NotificationEventType::ProcedureSubmitted,
            "PR1",
            Vec::new(),
            "",
        ));
    }
}
