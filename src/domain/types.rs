// ==========================================
// 报名与事项审批核心 - 领域类型定义
// ==========================================
// 序列化格式: SCREAMING_SNAKE_CASE (与数据库一致)
// 解析: 大小写不敏感，兼容 "in_review" / "IN_REVIEW"
// ==========================================

use serde::{Deserialize, Serialize};
use std::fmt;

// ==========================================
// 资源池类型 (Pool Kind)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PoolKind {
    Program,  // 项目
    Training, // 培训（需要报名开放标志）
}

impl PoolKind {
    pub fn to_db_str(&self) -> &'static str {
        match self {
            PoolKind::Program => "PROGRAM",
            PoolKind::Training => "TRAINING",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_uppercase().as_str() {
            "PROGRAM" => Some(PoolKind::Program),
            "TRAINING" => Some(PoolKind::Training),
            _ => None,
        }
    }
}

impl fmt::Display for PoolKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_str())
    }
}

// ==========================================
// 培训报名状态 (Enrollment Status)
// ==========================================
// 流转: ENROLLED → ATTENDED → COMPLETED → CERTIFIED
//       ENROLLED / ATTENDED → ABSENT
// 与席位计数无关
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EnrollmentStatus {
    Enrolled,  // 已报名
    Attended,  // 已出席
    Completed, // 已完成
    Certified, // 已发证
    Absent,    // 缺席
}

impl EnrollmentStatus {
    pub fn to_db_str(&self) -> &'static str {
        match self {
            EnrollmentStatus::Enrolled => "ENROLLED",
            EnrollmentStatus::Attended => "ATTENDED",
            EnrollmentStatus::Completed => "COMPLETED",
            EnrollmentStatus::Certified => "CERTIFIED",
            EnrollmentStatus::Absent => "ABSENT",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_uppercase().as_str() {
            "ENROLLED" => Some(EnrollmentStatus::Enrolled),
            "ATTENDED" => Some(EnrollmentStatus::Attended),
            "COMPLETED" => Some(EnrollmentStatus::Completed),
            "CERTIFIED" => Some(EnrollmentStatus::Certified),
            "ABSENT" => Some(EnrollmentStatus::Absent),
            _ => None,
        }
    }

    /// 是否允许从当前状态流转到 `next`（相同状态视为幂等，允许）
    pub fn can_move_to(&self, next: EnrollmentStatus) -> bool {
        use EnrollmentStatus::*;
        if *self == next {
            return true;
        }
        matches!(
            (self, next),
            (Enrolled, Attended)
                | (Attended, Completed)
                | (Completed, Certified)
                | (Enrolled, Absent)
                | (Attended, Absent)
        )
    }

    /// i18n 键
    pub fn label_key(&self) -> &'static str {
        match self {
            EnrollmentStatus::Enrolled => "status.enrolled",
            EnrollmentStatus::Attended => "status.attended",
            EnrollmentStatus::Completed => "status.completed",
            EnrollmentStatus::Certified => "status.certified",
            EnrollmentStatus::Absent => "status.absent",
        }
    }
}

impl fmt::Display for EnrollmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_str())
    }
}

// ==========================================
// 事项类型 (Procedure Kind)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProcedureKind {
    SuppliesRequest,    // 物资申请
    TechnicalRequest,   // 技术援助申请
    ProgramEnrollment,  // 项目报名申请
    CertificateRequest, // 证书申请
}

impl ProcedureKind {
    pub fn to_db_str(&self) -> &'static str {
        match self {
            ProcedureKind::SuppliesRequest => "SUPPLIES_REQUEST",
            ProcedureKind::TechnicalRequest => "TECHNICAL_REQUEST",
            ProcedureKind::ProgramEnrollment => "PROGRAM_ENROLLMENT",
            ProcedureKind::CertificateRequest => "CERTIFICATE_REQUEST",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_uppercase().as_str() {
            "SUPPLIES_REQUEST" => Some(ProcedureKind::SuppliesRequest),
            "TECHNICAL_REQUEST" => Some(ProcedureKind::TechnicalRequest),
            "PROGRAM_ENROLLMENT" => Some(ProcedureKind::ProgramEnrollment),
            "CERTIFICATE_REQUEST" => Some(ProcedureKind::CertificateRequest),
            _ => None,
        }
    }
}

impl fmt::Display for ProcedureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_str())
    }
}

// ==========================================
// 事项状态 (Procedure State)
// ==========================================
// 主路径: SUBMITTED → IN_REVIEW → {APPROVED, REJECTED} → COMPLETED
// 终态: REJECTED / COMPLETED
// 注意: 状态流转算子本身是宽松的（任意状态可设置为任意状态），
//       硬约束只有时间戳打点规则，见 domain::procedure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProcedureState {
    Submitted, // 已提交
    InReview,  // 审核中
    Approved,  // 已批准
    Rejected,  // 已驳回
    Completed, // 已办结
}

impl ProcedureState {
    pub fn to_db_str(&self) -> &'static str {
        match self {
            ProcedureState::Submitted => "SUBMITTED",
            ProcedureState::InReview => "IN_REVIEW",
            ProcedureState::Approved => "APPROVED",
            ProcedureState::Rejected => "REJECTED",
            ProcedureState::Completed => "COMPLETED",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_uppercase().as_str() {
            "SUBMITTED" => Some(ProcedureState::Submitted),
            "IN_REVIEW" => Some(ProcedureState::InReview),
            "APPROVED" => Some(ProcedureState::Approved),
            "REJECTED" => Some(ProcedureState::Rejected),
            "COMPLETED" => Some(ProcedureState::Completed),
            _ => None,
        }
    }

    /// 是否为终态
    pub fn is_terminal(&self) -> bool {
        matches!(self, ProcedureState::Rejected | ProcedureState::Completed)
    }

    /// 是否允许编辑
    pub fn is_editable(&self) -> bool {
        matches!(self, ProcedureState::Submitted | ProcedureState::InReview)
    }
}

impl fmt::Display for ProcedureState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_str())
    }
}

// ==========================================
// 优先级 (Priority)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Priority {
    Low,
    Medium,
    High,
}

impl Priority {
    pub fn to_db_str(&self) -> &'static str {
        match self {
            Priority::Low => "LOW",
            Priority::Medium => "MEDIUM",
            Priority::High => "HIGH",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_uppercase().as_str() {
            "LOW" => Some(Priority::Low),
            "MEDIUM" => Some(Priority::Medium),
            "HIGH" => Some(Priority::High),
            _ => None,
        }
    }
}

impl Default for Priority {
    fn default() -> Self {
        Priority::Medium
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_str())
    }
}

// ==========================================
// 角色 (Role)
// ==========================================
// 能力判定集中在 engine::authorization，禁止在各接口里比较角色字符串
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    Requester, // 普通申请人
    Staff,     // 工作人员
    Admin,     // 管理员
}

impl Role {
    pub fn to_db_str(&self) -> &'static str {
        match self {
            Role::Requester => "REQUESTER",
            Role::Staff => "STAFF",
            Role::Admin => "ADMIN",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_uppercase().as_str() {
            "REQUESTER" | "USER" => Some(Role::Requester),
            "STAFF" => Some(Role::Staff),
            "ADMIN" => Some(Role::Admin),
            _ => None,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_parse_is_case_insensitive() {
        assert_eq!(ProcedureState::parse("in_review"), Some(ProcedureState::InReview));
        assert_eq!(ProcedureState::parse("COMPLETED"), Some(ProcedureState::Completed));
        assert_eq!(ProcedureState::parse("archived"), None);
    }

    #[test]
    fn test_terminal_and_editable_states() {
        assert!(ProcedureState::Rejected.is_terminal());
        assert!(ProcedureState::Completed.is_terminal());
        assert!(!ProcedureState::Approved.is_terminal());

        assert!(ProcedureState::Submitted.is_editable());
        assert!(ProcedureState::InReview.is_editable());
        assert!(!ProcedureState::Approved.is_editable());
        assert!(!ProcedureState::Rejected.is_editable());
    }

    #[test]
    fn test_enrollment_status_edges() {
        use EnrollmentStatus::*;
        assert!(Enrolled.can_move_to(Attended));
        assert!(Attended.can_move_to(Completed));
        assert!(Completed.can_move_to(Certified));
        assert!(Enrolled.can_move_to(Absent));
        assert!(Attended.can_move_to(Absent));
        assert!(Certified.can_move_to(Certified));

        assert!(!Enrolled.can_move_to(Certified));
        assert!(!Certified.can_move_to(Enrolled));
        assert!(!Absent.can_move_to(Attended));
        assert!(!Completed.can_move_to(Absent));
    }

    #[test]
    fn test_serde_uses_db_representation() {
        let json = serde_json::to_string(&ProcedureKind::SuppliesRequest).unwrap();
        assert_eq!(json, "\"SUPPLIES_REQUEST\"");
        let back: ProcedureState = serde_json::from_str("\"IN_REVIEW\"").unwrap();
        assert_eq!(back, ProcedureState::InReview);
    }
}
