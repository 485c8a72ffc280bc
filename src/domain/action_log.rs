// ==========================================
// 报名与事项审批核心 - 操作日志领域模型
// ==========================================
// 红线: 所有写入必须记录（尽力写入，失败仅告警，不回滚业务写入）
// 用途: 审计追踪
// ==========================================

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

// ==========================================
// ActionLog - 操作日志
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionLog {
    pub action_id: String,
    pub action_type: String,       // 操作类型 (存储为字符串)
    pub action_ts: NaiveDateTime,
    pub actor: String,             // 操作人
    pub target_type: String,       // POOL / PROCEDURE
    pub target_id: String,
    pub payload_json: Option<JsonValue>,
    pub detail: Option<String>,
}

// ==========================================
// ActionType - 操作类型
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ActionType {
    // ===== 资源池 =====
    CreatePool,
    DeletePool,
    SetEnrollmentOpen,
    SetResponsibleParty,
    CreateSubProject,
    DeleteSubProject,
    Enroll,
    Withdraw,
    UpdateEnrollmentStatus,
    // ===== 行政事项 =====
    CreateProcedure,
    TransitionProcedure,
    EditProcedure,
    AttachDocument,
    AddNote,
    DeleteProcedure,
}

impl ActionType {
    /// 转换为字符串 (用于数据库存储)
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionType::CreatePool => "CreatePool",
            ActionType::DeletePool => "DeletePool",
            ActionType::SetEnrollmentOpen => "SetEnrollmentOpen",
            ActionType::SetResponsibleParty => "SetResponsibleParty",
            ActionType::CreateSubProject => "CreateSubProject",
            ActionType::DeleteSubProject => "DeleteSubProject",
            ActionType::Enroll => "Enroll",
            ActionType::Withdraw => "Withdraw",
            ActionType::UpdateEnrollmentStatus => "UpdateEnrollmentStatus",
            ActionType::CreateProcedure => "CreateProcedure",
            ActionType::TransitionProcedure => "TransitionProcedure",
            ActionType::EditProcedure => "EditProcedure",
            ActionType::AttachDocument => "AttachDocument",
            ActionType::AddNote => "AddNote",
            ActionType::DeleteProcedure => "DeleteProcedure",
        }
    }

    /// 操作对象类型
    pub fn target_type(&self) -> &'static str {
        match self {
            ActionType::CreatePool
            | ActionType::DeletePool
            | ActionType::SetEnrollmentOpen
            | ActionType::SetResponsibleParty
            | ActionType::CreateSubProject
            | ActionType::DeleteSubProject
            | ActionType::Enroll
            | ActionType::Withdraw
            | ActionType::UpdateEnrollmentStatus => "POOL",
            _ => "PROCEDURE",
        }
    }
}

impl ActionLog {
    /// 构造一条新日志（ID 与时间戳在此生成）
    pub fn new(
        action_type: ActionType,
        actor: &str,
        target_id: &str,
        payload_json: Option<JsonValue>,
        detail: Option<String>,
    ) -> Self {
        Self {
            action_id: uuid::Uuid::new_v4().to_string(),
            action_type: action_type.as_str().to_string(),
            action_ts: chrono::Utc::now().naive_utc(),
            actor: actor.to_string(),
            target_type: action_type.target_type().to_string(),
            target_id: target_id.to_string(),
            payload_json,
            detail,
        }
    }
}
