// ==========================================
// 报名与事项审批核心 - 报名 API
// ==========================================
// 职责: 容量池报名/退出、培训报名状态、池管理
// 红线: 席位检查与扣减只通过 PoolRepository::try_enroll / try_withdraw 原子完成
// 红线: 业务结果（已满、已报名…）不重试；只有存储繁忙走重试策略
// ==========================================

use std::sync::Arc;
use tracing::{debug, info};

use crate::api::common::{now, record_action, require_capability, require_non_empty, resolve_user};
use crate::api::error::{ApiError, ApiResult};
use crate::collaborator::IdentityDirectory;
use crate::domain::action_log::{ActionLog, ActionType};
use crate::domain::pool::{CapacityPool, EnrollmentRecord, NewPool, SubProject};
use crate::domain::types::{EnrollmentStatus, PoolKind};
use crate::engine::authorization::Capability;
use crate::engine::events::{NotificationEvent, NotificationEventType, OptionalNotifier};
use crate::engine::retry::RetryPolicy;
use crate::repository::action_log_repo::ActionLogRepository;
use crate::repository::error::RepositoryError;
use crate::repository::pool_repo::{EnrollOutcome, PoolDeleteOutcome, PoolRepository, WithdrawOutcome};

// ==========================================
// EnrollmentApi - 报名 API
// ==========================================

/// 报名API
///
/// 职责：
/// 1. 报名/退出（原子席位变更）
/// 2. 培训报名状态维护
/// 3. 池与子项目管理
/// 4. ActionLog记录与通知
pub struct EnrollmentApi {
    pool_repo: Arc<PoolRepository>,
    action_log_repo: Arc<ActionLogRepository>,
    identity: Arc<dyn IdentityDirectory>,
    notifier: OptionalNotifier,
    retry_policy: RetryPolicy,
}

impl EnrollmentApi {
    /// 创建新的EnrollmentApi实例
    pub fn new(
        pool_repo: Arc<PoolRepository>,
        action_log_repo: Arc<ActionLogRepository>,
        identity: Arc<dyn IdentityDirectory>,
        notifier: OptionalNotifier,
        retry_policy: RetryPolicy,
    ) -> Self {
        Self {
            pool_repo,
            action_log_repo,
            identity,
            notifier,
            retry_policy,
        }
    }

    // ==========================================
    // 报名 / 退出
    // ==========================================

    /// 报名
    ///
    /// # 返回
    /// - Ok(seats_remaining): 报名后的剩余席位
    /// - Err(AlreadyEnrolled / PoolFull / EnrollmentClosed): 无写入，带当前剩余席位
    /// - Err(NotFound): 池或参与人不存在
    pub fn enroll(&self, pool_id: &str, participant_id: &str) -> ApiResult<u32> {
        require_non_empty("pool_id", pool_id)?;
        let participant = resolve_user(self.identity.as_ref(), participant_id)?;

        let outcome = self.retry_policy.run(
            "enroll",
            RepositoryError::is_transient,
            |_| self.pool_repo.try_enroll(pool_id, &participant.user_id, now()),
        )?;

        match outcome {
            EnrollOutcome::Enrolled { seats_remaining, seq } => {
                info!(pool_id = %pool_id, participant_id = %participant_id, seq, seats_remaining, "报名成功");
                record_action(
                    &self.action_log_repo,
                    ActionLog::new(
                        ActionType::Enroll,
                        participant_id,
                        pool_id,
                        Some(serde_json::json!({
                            "participant_id": participant_id,
                            "seq": seq,
                            "seats_remaining": seats_remaining,
                        })),
                        None,
                    ),
                );
                self.notifier.dispatch(NotificationEvent::new(
                    NotificationEventType::Enrolled,
                    pool_id,
                    vec![participant_id.to_string()],
                    format!("seats_remaining={}", seats_remaining),
                ));
                Ok(seats_remaining)
            }
            EnrollOutcome::AlreadyEnrolled { seats_remaining } => Err(ApiError::AlreadyEnrolled {
                pool_id: pool_id.to_string(),
                participant_id: participant_id.to_string(),
                seats_remaining,
            }),
            EnrollOutcome::PoolFull { seats_remaining } => Err(ApiError::PoolFull {
                pool_id: pool_id.to_string(),
                seats_remaining,
            }),
            EnrollOutcome::EnrollmentClosed { seats_remaining } => Err(ApiError::EnrollmentClosed {
                pool_id: pool_id.to_string(),
                seats_remaining,
            }),
            EnrollOutcome::PoolNotFound => Err(ApiError::not_found("CapacityPool", pool_id)),
        }
    }

    /// 退出报名（与报名状态历史无关）
    ///
    /// # 返回
    /// - Ok(seats_remaining): 退出后的剩余席位
    /// - Err(NotEnrolled): 无写入
    pub fn withdraw(&self, pool_id: &str, participant_id: &str) -> ApiResult<u32> {
        require_non_empty("pool_id", pool_id)?;
        require_non_empty("participant_id", participant_id)?;

        let outcome = self.retry_policy.run(
            "withdraw",
            RepositoryError::is_transient,
            |_| self.pool_repo.try_withdraw(pool_id, participant_id),
        )?;

        match outcome {
            WithdrawOutcome::Withdrawn { seats_remaining } => {
                info!(pool_id = %pool_id, participant_id = %participant_id, seats_remaining, "退出报名");
                record_action(
                    &self.action_log_repo,
                    ActionLog::new(
                        ActionType::Withdraw,
                        participant_id,
                        pool_id,
                        Some(serde_json::json!({
                            "participant_id": participant_id,
                            "seats_remaining": seats_remaining,
                        })),
                        None,
                    ),
                );
                self.notifier.dispatch(NotificationEvent::new(
                    NotificationEventType::Withdrawn,
                    pool_id,
                    vec![participant_id.to_string()],
                    format!("seats_remaining={}", seats_remaining),
                ));
                Ok(seats_remaining)
            }
            WithdrawOutcome::NotEnrolled { seats_remaining } => Err(ApiError::NotEnrolled {
                pool_id: pool_id.to_string(),
                participant_id: participant_id.to_string(),
                seats_remaining,
            }),
            WithdrawOutcome::PoolNotFound => Err(ApiError::not_found("CapacityPool", pool_id)),
        }
    }

    // ==========================================
    // 培训报名状态
    // ==========================================

    /// 更新培训报名状态（工作人员）
    ///
    /// # 规则
    /// - ENROLLED → ATTENDED → COMPLETED → CERTIFIED；ENROLLED / ATTENDED → ABSENT
    /// - 设置为当前状态是无操作
    /// - 不影响席位
    pub fn update_enrollment_status(
        &self,
        actor_id: &str,
        pool_id: &str,
        participant_id: &str,
        status: EnrollmentStatus,
    ) -> ApiResult<EnrollmentRecord> {
        let actor = resolve_user(self.identity.as_ref(), actor_id)?;
        require_capability(&actor, Capability::UpdateEnrollmentStatus, "update_enrollment_status")?;

        let pool = self.load_pool(pool_id)?;
        if pool.kind != PoolKind::Training {
            return Err(ApiError::invalid_field("pool_id", "只有培训池有报名状态"));
        }

        let max_attempts = self.retry_policy.max_attempts.max(1);
        for attempt in 1..=max_attempts {
            let member = self
                .pool_repo
                .find_member(pool_id, participant_id)?
                .ok_or_else(|| ApiError::NotEnrolled {
                    pool_id: pool_id.to_string(),
                    participant_id: participant_id.to_string(),
                    seats_remaining: pool.seats_remaining,
                })?;
            let record = member
                .as_enrollment_record()
                .ok_or_else(|| ApiError::InternalError(format!("培训池成员缺少报名状态: {}", participant_id)))?;

            if record.status == status {
                debug!(pool_id = %pool_id, participant_id = %participant_id, status = %status, "状态未变化");
                return Ok(record);
            }
            if !record.status.can_move_to(status) {
                return Err(ApiError::InvalidStatusTransition {
                    from: record.status.to_string(),
                    to: status.to_string(),
                });
            }

            let updated = self.retry_policy.run(
                "update_enrollment_status",
                RepositoryError::is_transient,
                |_| {
                    self.pool_repo.update_member_status(
                        pool_id,
                        participant_id,
                        record.status,
                        status,
                        &actor.user_id,
                        now(),
                    )
                },
            )?;

            if updated {
                info!(pool_id = %pool_id, participant_id = %participant_id, from = %record.status, to = %status, "报名状态已更新");
                record_action(
                    &self.action_log_repo,
                    ActionLog::new(
                        ActionType::UpdateEnrollmentStatus,
                        &actor.user_id,
                        pool_id,
                        Some(serde_json::json!({
                            "participant_id": participant_id,
                            "from": record.status,
                            "to": status,
                        })),
                        None,
                    ),
                );
                self.notifier.dispatch(NotificationEvent::new(
                    NotificationEventType::EnrollmentStatusChanged,
                    pool_id,
                    vec![participant_id.to_string()],
                    status.to_string(),
                ));
                return Ok(EnrollmentRecord { status, ..record });
            }

            debug!(attempt, pool_id = %pool_id, participant_id = %participant_id, "报名状态并发修改，重新读取");
        }

        Err(ApiError::OptimisticLockFailure {
            entity: "PoolMember".to_string(),
            id: format!("{}/{}", pool_id, participant_id),
            attempts: max_attempts,
        })
    }

    /// 查询单个参与人的培训报名记录
    pub fn get_enrollment(&self, pool_id: &str, participant_id: &str) -> ApiResult<Option<EnrollmentRecord>> {
        let member = self.pool_repo.find_member(pool_id, participant_id)?;
        Ok(member.and_then(|m| m.as_enrollment_record()))
    }

    // ==========================================
    // 池管理
    // ==========================================

    /// 创建容量池（工作人员）
    pub fn create_pool(&self, actor_id: &str, new_pool: NewPool) -> ApiResult<CapacityPool> {
        let actor = resolve_user(self.identity.as_ref(), actor_id)?;
        require_capability(&actor, Capability::ManagePools, "create_pool")?;

        require_non_empty("name", &new_pool.name)?;
        if new_pool.total_seats == 0 {
            return Err(ApiError::invalid_field("total_seats", "必须大于0"));
        }
        if let Some(responsible_id) = new_pool.responsible_id.as_deref() {
            resolve_user(self.identity.as_ref(), responsible_id)?;
        }

        let pool = CapacityPool {
            pool_id: uuid::Uuid::new_v4().to_string(),
            name: new_pool.name.trim().to_string(),
            kind: new_pool.kind,
            total_seats: new_pool.total_seats,
            seats_remaining: new_pool.total_seats,
            enrollment_open: new_pool.enrollment_open,
            responsible_id: new_pool.responsible_id,
            region: new_pool.region,
            created_by: actor.user_id.clone(),
            created_at: now(),
            revision: 0,
        };
        self.pool_repo.insert(&pool)?;

        info!(pool_id = %pool.pool_id, kind = %pool.kind, total_seats = pool.total_seats, "容量池已创建");
        record_action(
            &self.action_log_repo,
            ActionLog::new(
                ActionType::CreatePool,
                &actor.user_id,
                &pool.pool_id,
                serde_json::to_value(&pool).ok(),
                None,
            ),
        );
        Ok(pool)
    }

    /// 设置报名开放标志（工作人员）
    pub fn set_enrollment_open(&self, actor_id: &str, pool_id: &str, open: bool) -> ApiResult<CapacityPool> {
        let actor = resolve_user(self.identity.as_ref(), actor_id)?;
        require_capability(&actor, Capability::ManagePools, "set_enrollment_open")?;

        if !self.pool_repo.set_enrollment_open(pool_id, open)? {
            return Err(ApiError::not_found("CapacityPool", pool_id));
        }

        info!(pool_id = %pool_id, open, "报名开放标志已更新");
        record_action(
            &self.action_log_repo,
            ActionLog::new(
                ActionType::SetEnrollmentOpen,
                &actor.user_id,
                pool_id,
                Some(serde_json::json!({ "enrollment_open": open })),
                None,
            ),
        );
        self.load_pool(pool_id)
    }

    /// 设置负责人（None 表示清空）
    pub fn set_responsible_party(
        &self,
        actor_id: &str,
        pool_id: &str,
        responsible_id: Option<&str>,
    ) -> ApiResult<CapacityPool> {
        let actor = resolve_user(self.identity.as_ref(), actor_id)?;
        require_capability(&actor, Capability::ManagePools, "set_responsible_party")?;

        if let Some(id) = responsible_id {
            resolve_user(self.identity.as_ref(), id)?;
        }
        if !self.pool_repo.set_responsible(pool_id, responsible_id)? {
            return Err(ApiError::not_found("CapacityPool", pool_id));
        }

        info!(pool_id = %pool_id, responsible_id = ?responsible_id, "负责人已更新");
        record_action(
            &self.action_log_repo,
            ActionLog::new(
                ActionType::SetResponsibleParty,
                &actor.user_id,
                pool_id,
                Some(serde_json::json!({ "responsible_id": responsible_id })),
                None,
            ),
        );
        self.load_pool(pool_id)
    }

    /// 查询负责人
    ///
    /// 未设置时返回 None，不做任何推断
    pub fn get_responsible_party(&self, pool_id: &str) -> ApiResult<Option<String>> {
        Ok(self.load_pool(pool_id)?.responsible_id)
    }

    /// 创建子项目（工作人员）
    pub fn create_sub_project(&self, actor_id: &str, pool_id: &str, name: &str) -> ApiResult<SubProject> {
        let actor = resolve_user(self.identity.as_ref(), actor_id)?;
        require_capability(&actor, Capability::ManagePools, "create_sub_project")?;
        require_non_empty("name", name)?;
        self.load_pool(pool_id)?;

        let sub_project = SubProject {
            sub_project_id: uuid::Uuid::new_v4().to_string(),
            pool_id: pool_id.to_string(),
            name: name.trim().to_string(),
            created_by: actor.user_id.clone(),
            created_at: now(),
        };
        self.pool_repo.insert_sub_project(&sub_project)?;

        record_action(
            &self.action_log_repo,
            ActionLog::new(
                ActionType::CreateSubProject,
                &actor.user_id,
                pool_id,
                Some(serde_json::json!({ "sub_project_id": sub_project.sub_project_id })),
                None,
            ),
        );
        Ok(sub_project)
    }

    /// 删除子项目（工作人员）
    pub fn delete_sub_project(&self, actor_id: &str, pool_id: &str, sub_project_id: &str) -> ApiResult<()> {
        let actor = resolve_user(self.identity.as_ref(), actor_id)?;
        require_capability(&actor, Capability::ManagePools, "delete_sub_project")?;

        let belongs = self
            .pool_repo
            .list_sub_projects(pool_id)?
            .iter()
            .any(|s| s.sub_project_id == sub_project_id);
        if !belongs || !self.pool_repo.delete_sub_project(sub_project_id)? {
            return Err(ApiError::not_found("SubProject", sub_project_id));
        }

        record_action(
            &self.action_log_repo,
            ActionLog::new(
                ActionType::DeleteSubProject,
                &actor.user_id,
                pool_id,
                Some(serde_json::json!({ "sub_project_id": sub_project_id })),
                None,
            ),
        );
        Ok(())
    }

    /// 查询池下子项目
    pub fn list_sub_projects(&self, pool_id: &str) -> ApiResult<Vec<SubProject>> {
        Ok(self.pool_repo.list_sub_projects(pool_id)?)
    }

    /// 删除容量池（存在子项目时拒绝）
    pub fn delete_pool(&self, actor_id: &str, pool_id: &str) -> ApiResult<()> {
        let actor = resolve_user(self.identity.as_ref(), actor_id)?;
        require_capability(&actor, Capability::ManagePools, "delete_pool")?;

        match self.pool_repo.delete(pool_id)? {
            PoolDeleteOutcome::Deleted => {
                info!(pool_id = %pool_id, "容量池已删除");
                record_action(
                    &self.action_log_repo,
                    ActionLog::new(ActionType::DeletePool, &actor.user_id, pool_id, None, None),
                );
                Ok(())
            }
            PoolDeleteOutcome::NotFound => Err(ApiError::not_found("CapacityPool", pool_id)),
            PoolDeleteOutcome::HasSubProjects(count) => Err(ApiError::DependentResourcesExist {
                entity: "CapacityPool".to_string(),
                id: pool_id.to_string(),
                count,
            }),
        }
    }

    // ==========================================
    // 查询接口
    // ==========================================

    /// 查询池详情
    pub fn get_pool(&self, pool_id: &str) -> ApiResult<CapacityPool> {
        self.load_pool(pool_id)
    }

    /// 查询池列表
    pub fn list_pools(&self, kind: Option<PoolKind>) -> ApiResult<Vec<CapacityPool>> {
        Ok(self.pool_repo.list(kind)?)
    }

    fn load_pool(&self, pool_id: &str) -> ApiResult<CapacityPool> {
        require_non_empty("pool_id", pool_id)?;
        self.pool_repo
            .find_by_id(pool_id)?
            .ok_or_else(|| ApiError::not_found("CapacityPool", pool_id))
    }
}
