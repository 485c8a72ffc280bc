// ==========================================
// 报名与事项审批核心 - 资源池领域模型
// ==========================================
// 不变量: 成员数 == total_seats - seats_remaining，且不超过 total_seats
// 不变量: 同一参与人在同一池中至多出现一次
// 红线: 席位只允许通过 Enroll / Withdraw 原子变更
// ==========================================

use crate::domain::types::{EnrollmentStatus, PoolKind};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

// ==========================================
// CapacityPool - 容量池（项目/培训）
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CapacityPool {
    // ===== 主键 =====
    pub pool_id: String,
    pub name: String,
    pub kind: PoolKind,

    // ===== 席位 =====
    pub total_seats: u32,
    pub seats_remaining: u32,

    // ===== 报名控制（仅培训生效） =====
    pub enrollment_open: bool,

    // ===== 负责人（可空，不做任何兜底推断） =====
    pub responsible_id: Option<String>,
    pub region: Option<String>,

    // ===== 审计 =====
    pub created_by: String,
    pub created_at: NaiveDateTime,
    pub revision: i64,
}

impl CapacityPool {
    /// 已占用席位
    pub fn seats_taken(&self) -> u32 {
        self.total_seats.saturating_sub(self.seats_remaining)
    }

    /// 是否接受新报名（不考虑是否已在池中）
    pub fn accepts_enrollment(&self) -> bool {
        let gate_open = match self.kind {
            PoolKind::Program => true,
            PoolKind::Training => self.enrollment_open,
        };
        gate_open && self.seats_remaining > 0
    }

    /// 成员数量与席位计数是否一致
    pub fn is_consistent_with(&self, member_count: u32) -> bool {
        self.seats_remaining <= self.total_seats && member_count == self.seats_taken()
    }
}

// ==========================================
// NewPool - 创建参数
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewPool {
    pub name: String,
    pub kind: PoolKind,
    pub total_seats: u32,
    #[serde(default = "default_enrollment_open")]
    pub enrollment_open: bool,
    #[serde(default)]
    pub responsible_id: Option<String>,
    #[serde(default)]
    pub region: Option<String>,
}

fn default_enrollment_open() -> bool {
    true
}

// ==========================================
// PoolMember - 池成员（子表，按 seq 递增追加）
// ==========================================
// status 仅培训池有值
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PoolMember {
    pub pool_id: String,
    pub seq: i64,
    pub participant_id: String,
    pub enrolled_at: NaiveDateTime,
    pub status: Option<EnrollmentStatus>,
    pub status_updated_at: Option<NaiveDateTime>,
    pub status_updated_by: Option<String>,
}

// ==========================================
// EnrollmentRecord - 培训报名记录
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnrollmentRecord {
    pub pool_id: String,
    pub participant_id: String,
    pub enrolled_at: NaiveDateTime,
    pub status: EnrollmentStatus,
}

impl PoolMember {
    /// 培训池成员投影为报名记录；项目池成员返回 None
    pub fn as_enrollment_record(&self) -> Option<EnrollmentRecord> {
        self.status.map(|status| EnrollmentRecord {
            pool_id: self.pool_id.clone(),
            participant_id: self.participant_id.clone(),
            enrolled_at: self.enrolled_at,
            status,
        })
    }
}

// ==========================================
// SubProject - 子项目（存在时禁止删除所属池）
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubProject {
    pub sub_project_id: String,
    pub pool_id: String,
    pub name: String,
    pub created_by: String,
    pub created_at: NaiveDateTime,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pool(kind: PoolKind, total: u32, remaining: u32, open: bool) -> CapacityPool {
        CapacityPool {
            pool_id: "P1".to_string(),
            name: "焊接培训".to_string(),
            kind,
            total_seats: total,
            seats_remaining: remaining,
            enrollment_open: open,
            responsible_id: None,
            region: None,
            created_by: "admin".to_string(),
            created_at: chrono::Utc::now().naive_utc(),
            revision: 0,
        }
    }

    #[test]
    fn test_training_gate_blocks_closed_pool() {
        assert!(!pool(PoolKind::Training, 5, 5, false).accepts_enrollment());
        assert!(pool(PoolKind::Training, 5, 5, true).accepts_enrollment());
        // 项目池忽略开放标志
        assert!(pool(PoolKind::Program, 5, 5, false).accepts_enrollment());
    }

    #[test]
    fn test_full_pool_rejects() {
        assert!(!pool(PoolKind::Program, 2, 0, true).accepts_enrollment());
    }

    #[test]
    fn test_consistency_check() {
        let p = pool(PoolKind::Program, 10, 7, true);
        assert_eq!(p.seats_taken(), 3);
        assert!(p.is_consistent_with(3));
        assert!(!p.is_consistent_with(4));
    }

    #[test]
    fn test_program_member_has_no_enrollment_record() {
        let member = PoolMember {
            pool_id: "P1".to_string(),
            seq: 1,
            participant_id: "U1".to_string(),
            enrolled_at: chrono::Utc::now().naive_utc(),
            status: None,
            status_updated_at: None,
            status_updated_by: None,
        };
        assert!(member.as_enrollment_record().is_none());
    }
}
