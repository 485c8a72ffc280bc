// ==========================================
// 报名与事项审批核心 - 行政事项领域模型
// ==========================================
// 不变量:
// - reviewed_at 只在首次进入 IN_REVIEW 时写入一次
// - completed_at 只在首次进入 COMPLETED 时写入一次
// - 两者都存在时 reviewed_at <= completed_at
// 附件/备注为只追加子表
// ==========================================

use crate::domain::types::{Priority, ProcedureKind, ProcedureState};
use chrono::{Duration, NaiveDateTime};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};

// ==========================================
// Procedure - 行政事项
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Procedure {
    // ===== 主键 =====
    pub procedure_id: String,
    pub requester_id: String,
    pub kind: ProcedureKind,

    // ===== 生命周期 =====
    pub state: ProcedureState,
    pub submitted_at: NaiveDateTime,
    pub reviewed_at: Option<NaiveDateTime>,
    pub completed_at: Option<NaiveDateTime>,
    pub reviewer_id: Option<String>,

    // ===== 业务字段 =====
    pub priority: Priority,
    pub notes: String,
    pub origin_region: Option<String>,
    pub payload: Map<String, JsonValue>,

    // ===== 子集合（按 seq 升序） =====
    pub attachments: Vec<DocumentRef>,
    pub staff_notes: Vec<ProcedureNote>,

    // ===== 乐观锁 =====
    pub revision: i64,
}

/// 状态流转的副作用（用于日志与审计）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TransitionEffect {
    pub state_changed: bool,
    pub reviewed_at_stamped: bool,
    pub completed_at_stamped: bool,
}

impl Procedure {
    /// 应用状态流转并按规则打时间戳
    ///
    /// # 规则
    /// - 算子宽松: 不校验边，任意状态可直接设置
    /// - 首次进入 IN_REVIEW 写 reviewed_at；首次进入 COMPLETED 写 completed_at
    /// - 重复进入同一状态不改时间戳
    /// - completed_at 不早于 reviewed_at；若先办结后审核，reviewed_at 截断到 completed_at
    pub fn apply_transition(
        &mut self,
        new_state: ProcedureState,
        reviewer_id: &str,
        now: NaiveDateTime,
    ) -> TransitionEffect {
        let mut effect = TransitionEffect {
            state_changed: self.state != new_state,
            ..TransitionEffect::default()
        };

        match new_state {
            ProcedureState::InReview if self.reviewed_at.is_none() => {
                let stamp = match self.completed_at {
                    Some(completed_at) if completed_at < now => completed_at,
                    _ => now,
                };
                self.reviewed_at = Some(stamp);
                effect.reviewed_at_stamped = true;
            }
            ProcedureState::Completed if self.completed_at.is_none() => {
                let stamp = match self.reviewed_at {
                    Some(reviewed_at) if reviewed_at > now => reviewed_at,
                    _ => now,
                };
                self.completed_at = Some(stamp);
                effect.completed_at_stamped = true;
            }
            _ => {}
        }

        self.state = new_state;
        self.reviewer_id = Some(reviewer_id.to_string());
        effect
    }

    /// 办理时长 = completed_at - submitted_at（未办结返回 None）
    pub fn processing_duration(&self) -> Option<Duration> {
        self.completed_at.map(|completed_at| completed_at - self.submitted_at)
    }

    /// 时间戳单调性检查
    pub fn timestamps_are_ordered(&self) -> bool {
        match (self.reviewed_at, self.completed_at) {
            (Some(reviewed_at), Some(completed_at)) => reviewed_at <= completed_at,
            _ => true,
        }
    }
}

// ==========================================
// DocumentRef - 附件引用（只追加）
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentRef {
    pub seq: i64,
    pub name: String,
    pub blob_id: String,
    pub blob_url: Option<String>,
    pub uploader_id: String,
    pub uploaded_at: NaiveDateTime,
}

/// 追加附件的入参（seq/uploaded_at 由仓储分配）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewDocument {
    pub name: String,
    pub blob_id: String,
    #[serde(default)]
    pub blob_url: Option<String>,
}

// ==========================================
// ProcedureNote - 工作人员备注（只追加）
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcedureNote {
    pub seq: i64,
    pub author_id: String,
    pub body: String,
    pub created_at: NaiveDateTime,
}

// ==========================================
// ProcedurePatch - 编辑补丁
// ==========================================
// payload 为浅合并（字段级覆盖），合并后需重新校验
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProcedurePatch {
    #[serde(default)]
    pub priority: Option<Priority>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub payload: Option<Map<String, JsonValue>>,
}

impl ProcedurePatch {
    pub fn is_empty(&self) -> bool {
        self.priority.is_none() && self.notes.is_none() && self.payload.is_none()
    }
}

// ==========================================
// ProcedureFilter - 查询条件
// ==========================================
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProcedureFilter {
    pub requester_id: Option<String>,
    pub state: Option<ProcedureState>,
    pub kind: Option<ProcedureKind>,
    pub origin_region: Option<String>,
    /// 提交时间下界（包含）
    pub submitted_from: Option<NaiveDateTime>,
    /// 提交时间上界（不包含）
    pub submitted_to: Option<NaiveDateTime>,
}
