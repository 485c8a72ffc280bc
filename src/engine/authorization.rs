// ==========================================
// 报名与事项审批核心 - 角色能力判定
// ==========================================
// 红线: 角色判断只在此处进行，接口层只调用 can 系列函数
// 规则:
// - STAFF / ADMIN: 事项流转、删除、备注、池管理、报名状态维护、查看全部事项
// - REQUESTER: 只能创建事项、查看/编辑自己的事项、为自己的非终态事项上传附件
// - 事项的申请人永远不能流转自己的事项（即使其为工作人员）
// ==========================================

use crate::domain::types::Role;
use serde::{Deserialize, Serialize};

/// 能力
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Capability {
    TransitionProcedure,
    DeleteProcedure,
    AnnotateProcedure,
    /// 任意状态下附加文件、编辑他人事项
    ManageAnyProcedure,
    ViewAllProcedures,
    ManagePools,
    UpdateEnrollmentStatus,
}

impl Capability {
    pub fn as_str(&self) -> &'static str {
        match self {
            Capability::TransitionProcedure => "TransitionProcedure",
            Capability::DeleteProcedure => "DeleteProcedure",
            Capability::AnnotateProcedure => "AnnotateProcedure",
            Capability::ManageAnyProcedure => "ManageAnyProcedure",
            Capability::ViewAllProcedures => "ViewAllProcedures",
            Capability::ManagePools => "ManagePools",
            Capability::UpdateEnrollmentStatus => "UpdateEnrollmentStatus",
        }
    }
}

/// 角色是否具备某项能力
pub fn can(role: Role, capability: Capability) -> bool {
    use Capability::*;
    match capability {
        // 申请人只能操作自己的事项，由调用方做归属判断
        TransitionProcedure
        | DeleteProcedure
        | AnnotateProcedure
        | ManageAnyProcedure
        | ViewAllProcedures
        | ManagePools
        | UpdateEnrollmentStatus => matches!(role, Role::Staff | Role::Admin),
    }
}

/// 角色是否可以流转事项
pub fn can_transition(role: Role) -> bool {
    can(role, Capability::TransitionProcedure)
}

/// 操作人是否为事项申请人本人（本人永远不能流转自己的事项）
pub fn is_self_review(actor_id: &str, requester_id: &str) -> bool {
    actor_id == requester_id
}

/// 是否可查看事项
pub fn can_view_procedure(role: Role, actor_id: &str, requester_id: &str) -> bool {
    actor_id == requester_id || can(role, Capability::ViewAllProcedures)
}

/// 是否可编辑事项（状态门槛另行检查）
pub fn can_edit_procedure(role: Role, actor_id: &str, requester_id: &str) -> bool {
    actor_id == requester_id || can(role, Capability::ManageAnyProcedure)
}
