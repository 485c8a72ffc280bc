// ==========================================
// 报名与事项审批核心 - 行政事项 API
// ==========================================
// 职责: 事项创建、状态流转、编辑、备注、附件、删除、查询
// 红线: 流转只允许具备 TransitionProcedure 能力且非申请人本人的操作人
// 红线: 时间戳规则由 Procedure::apply_transition 统一执行
// 并发: 主记录 revision 乐观锁，冲突时重新读取后重试
// ==========================================

use std::sync::Arc;
use tracing::{debug, info};

use crate::api::common::{now, record_action, require_capability, require_non_empty, resolve_user};
use crate::api::error::{ApiError, ApiResult};
use crate::collaborator::{BlobMetadata, BlobStore, IdentityDirectory, UserProfile};
use crate::domain::action_log::{ActionLog, ActionType};
use crate::domain::procedure::{NewDocument, Procedure, ProcedureFilter, ProcedurePatch};
use crate::domain::types::{ProcedureKind, ProcedureState};
use crate::engine::authorization::{
    can, can_edit_procedure, can_view_procedure, is_self_review, Capability,
};
use crate::engine::events::{NotificationEvent, NotificationEventType, OptionalNotifier};
use crate::engine::retry::RetryPolicy;
use crate::engine::validation::{describe_violations, merge_payload, normalize_submission};
use crate::repository::action_log_repo::ActionLogRepository;
use crate::repository::error::RepositoryError;
use crate::repository::procedure_repo::{AttachOutcome, ProcedureRepository};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};

/// 分页结果
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcedurePage {
    pub items: Vec<Procedure>,
    pub total: u64,
    pub page: usize,
    pub page_size: usize,
}

// ==========================================
// ProcedureApi - 行政事项 API
// ==========================================
pub struct ProcedureApi {
    procedure_repo: Arc<ProcedureRepository>,
    action_log_repo: Arc<ActionLogRepository>,
    identity: Arc<dyn IdentityDirectory>,
    blob_store: Arc<dyn BlobStore>,
    notifier: OptionalNotifier,
    retry_policy: RetryPolicy,
    max_page_size: usize,
}

impl ProcedureApi {
    /// 创建新的ProcedureApi实例
    pub fn new(
        procedure_repo: Arc<ProcedureRepository>,
        action_log_repo: Arc<ActionLogRepository>,
        identity: Arc<dyn IdentityDirectory>,
        blob_store: Arc<dyn BlobStore>,
        notifier: OptionalNotifier,
        retry_policy: RetryPolicy,
        max_page_size: usize,
    ) -> Self {
        Self {
            procedure_repo,
            action_log_repo,
            identity,
            blob_store,
            notifier,
            retry_policy,
            max_page_size: max_page_size.max(1),
        }
    }

    // ==========================================
    // 创建
    // ==========================================

    /// 提交事项
    ///
    /// # 参数
    /// - requester_id: 申请人（必须存在于身份目录）
    /// - kind: 事项类型
    /// - payload: 业务载荷（可含 priority / notes）
    ///
    /// # 返回
    /// - Ok(Procedure): state=SUBMITTED, submitted_at=now
    /// - Err(ValidationError): 缺少该类型的必填字段
    pub fn create(
        &self,
        requester_id: &str,
        kind: ProcedureKind,
        payload: Map<String, JsonValue>,
    ) -> ApiResult<Procedure> {
        let requester = resolve_user(self.identity.as_ref(), requester_id)?;

        let normalized = normalize_submission(kind, &payload).map_err(|violations| {
            ApiError::ValidationError {
                message: describe_violations(&violations),
                violations,
            }
        })?;

        let procedure = Procedure {
            procedure_id: uuid::Uuid::new_v4().to_string(),
            requester_id: requester.user_id.clone(),
            kind,
            state: ProcedureState::Submitted,
            submitted_at: now(),
            reviewed_at: None,
            completed_at: None,
            reviewer_id: None,
            priority: normalized.priority.unwrap_or_default(),
            notes: normalized.notes.unwrap_or_default(),
            origin_region: normalized.origin_region,
            payload: normalized.payload,
            attachments: Vec::new(),
            staff_notes: Vec::new(),
            revision: 0,
        };

        self.retry_policy.run("create_procedure", RepositoryError::is_transient, |_| {
            self.procedure_repo.insert(&procedure)
        })?;

        info!(procedure_id = %procedure.procedure_id, kind = %kind, requester_id = %requester_id, "事项已提交");
        record_action(
            &self.action_log_repo,
            ActionLog::new(
                ActionType::CreateProcedure,
                &requester.user_id,
                &procedure.procedure_id,
                Some(serde_json::json!({ "kind": kind, "priority": procedure.priority })),
                None,
            ),
        );
        self.notifier.dispatch(NotificationEvent::new(
            NotificationEventType::ProcedureSubmitted,
            &procedure.procedure_id,
            vec![requester.user_id.clone()],
            kind.to_string(),
        ));

        Ok(procedure)
    }

    // ==========================================
    // 状态流转
    // ==========================================

    /// 流转事项状态（工作人员）
    ///
    /// # 规则
    /// - 任意状态可直接设置为任意状态
    /// - 首次进入 IN_REVIEW / COMPLETED 时打时间戳，重复进入不变
    /// - 申请人本人永远不能流转
    ///
    /// # 错误
    /// - NotFound / AuthorizationError
    /// - OptimisticLockFailure: 重试耗尽
    pub fn transition(
        &self,
        procedure_id: &str,
        new_state: ProcedureState,
        reviewer_id: &str,
    ) -> ApiResult<Procedure> {
        let reviewer = resolve_user(self.identity.as_ref(), reviewer_id)?;
        require_capability(&reviewer, Capability::TransitionProcedure, "transition_procedure")?;

        let (procedure, effect) = self.update_with_retry(procedure_id, |current| {
            if is_self_review(&reviewer.user_id, &current.requester_id) {
                return Err(ApiError::forbidden(&reviewer.user_id, "transition_procedure"));
            }
            let effect = current.apply_transition(new_state, &reviewer.user_id, now());
            Ok(effect)
        })?;

        info!(
            procedure_id = %procedure_id,
            state = %procedure.state,
            reviewer_id = %reviewer.user_id,
            reviewed_at_stamped = effect.reviewed_at_stamped,
            completed_at_stamped = effect.completed_at_stamped,
            "事项状态已流转"
        );
        record_action(
            &self.action_log_repo,
            ActionLog::new(
                ActionType::TransitionProcedure,
                &reviewer.user_id,
                procedure_id,
                Some(serde_json::json!({ "state": procedure.state, "effect": effect })),
                None,
            ),
        );
        if effect.state_changed {
            self.notifier.dispatch(NotificationEvent::new(
                NotificationEventType::ProcedureTransitioned,
                procedure_id,
                vec![procedure.requester_id.clone()],
                procedure.state.to_string(),
            ));
        }

        Ok(procedure)
    }

    // ==========================================
    // 编辑
    // ==========================================

    /// 编辑事项（仅 SUBMITTED / IN_REVIEW）
    ///
    /// 申请人可编辑自己的事项，工作人员可编辑任意事项；
    /// 载荷浅合并后整体重新校验
    pub fn edit(&self, actor_id: &str, procedure_id: &str, patch: ProcedurePatch) -> ApiResult<Procedure> {
        let actor = resolve_user(self.identity.as_ref(), actor_id)?;
        if patch.is_empty() {
            return Err(ApiError::invalid_field("patch", "没有可更新的字段"));
        }

        let (procedure, _) = self.update_with_retry(procedure_id, |current| {
            if !can_edit_procedure(actor.role, &actor.user_id, &current.requester_id) {
                return Err(ApiError::forbidden(&actor.user_id, "edit_procedure"));
            }
            if !current.state.is_editable() {
                return Err(ApiError::EditNotAllowed {
                    procedure_id: current.procedure_id.clone(),
                    state: current.state,
                });
            }

            if let Some(payload_patch) = &patch.payload {
                let merged = merge_payload(&current.payload, payload_patch);
                let normalized = normalize_submission(current.kind, &merged).map_err(|violations| {
                    ApiError::ValidationError {
                        message: describe_violations(&violations),
                        violations,
                    }
                })?;
                current.payload = normalized.payload;
                current.origin_region = normalized.origin_region;
                if let Some(priority) = normalized.priority {
                    current.priority = priority;
                }
                if let Some(notes) = normalized.notes {
                    current.notes = notes;
                }
            }
            if let Some(priority) = patch.priority {
                current.priority = priority;
            }
            if let Some(notes) = &patch.notes {
                current.notes = notes.clone();
            }
            Ok(())
        })?;

        info!(procedure_id = %procedure_id, actor_id = %actor.user_id, "事项已编辑");
        record_action(
            &self.action_log_repo,
            ActionLog::new(
                ActionType::EditProcedure,
                &actor.user_id,
                procedure_id,
                serde_json::to_value(&patch).ok(),
                None,
            ),
        );
        Ok(procedure)
    }

    // ==========================================
    // 备注 / 附件
    // ==========================================

    /// 工作人员备注（任意状态）
    pub fn add_note(&self, actor_id: &str, procedure_id: &str, body: &str) -> ApiResult<Procedure> {
        let actor = resolve_user(self.identity.as_ref(), actor_id)?;
        require_capability(&actor, Capability::AnnotateProcedure, "add_note")?;
        require_non_empty("body", body)?;

        let seq = self
            .retry_policy
            .run("add_note", RepositoryError::is_transient, |_| {
                self.procedure_repo.append_note(procedure_id, &actor.user_id, body, now())
            })?
            .ok_or_else(|| ApiError::not_found("Procedure", procedure_id))?;

        debug!(procedure_id = %procedure_id, seq, "备注已追加");
        record_action(
            &self.action_log_repo,
            ActionLog::new(
                ActionType::AddNote,
                &actor.user_id,
                procedure_id,
                Some(serde_json::json!({ "seq": seq })),
                None,
            ),
        );
        self.load_procedure(procedure_id)
    }

    /// 追加附件（只追加）
    ///
    /// # 规则
    /// - blob 必须已存在于对象存储
    /// - 申请人只能给自己的非终态事项追加；工作人员任意状态
    pub fn attach_document(
        &self,
        actor_id: &str,
        procedure_id: &str,
        document: NewDocument,
    ) -> ApiResult<Procedure> {
        let actor = resolve_user(self.identity.as_ref(), actor_id)?;
        require_non_empty("name", &document.name)?;
        require_non_empty("blob_id", &document.blob_id)?;

        let current = self.load_procedure(procedure_id)?;
        let is_staff = can(actor.role, Capability::ManageAnyProcedure);
        if !is_staff && current.requester_id != actor.user_id {
            return Err(ApiError::forbidden(&actor.user_id, "attach_document"));
        }

        if !self.blob_store.blob_exists(&document.blob_id)? {
            return Err(ApiError::invalid_field("blob_id", "对象存储中不存在该文件"));
        }

        let outcome = self.retry_policy.run("attach_document", RepositoryError::is_transient, |_| {
            self.procedure_repo
                .append_attachment(procedure_id, &document, &actor.user_id, now(), !is_staff)
        })?;

        match outcome {
            AttachOutcome::Appended { seq } => {
                info!(procedure_id = %procedure_id, seq, blob_id = %document.blob_id, "附件已追加");
                record_action(
                    &self.action_log_repo,
                    ActionLog::new(
                        ActionType::AttachDocument,
                        &actor.user_id,
                        procedure_id,
                        Some(serde_json::json!({ "seq": seq, "blob_id": document.blob_id, "name": document.name })),
                        None,
                    ),
                );
                let mut recipients = vec![current.requester_id.clone()];
                if let Some(reviewer_id) = &current.reviewer_id {
                    recipients.push(reviewer_id.clone());
                }
                self.notifier.dispatch(NotificationEvent::new(
                    NotificationEventType::DocumentAttached,
                    procedure_id,
                    recipients,
                    document.name.clone(),
                ));
                self.load_procedure(procedure_id)
            }
            AttachOutcome::ProcedureNotFound => Err(ApiError::not_found("Procedure", procedure_id)),
            AttachOutcome::Terminal { state } => Err(ApiError::EditNotAllowed {
                procedure_id: procedure_id.to_string(),
                state,
            }),
        }
    }

    /// 上传文件并追加为附件
    pub fn upload_and_attach(
        &self,
        actor_id: &str,
        procedure_id: &str,
        name: &str,
        bytes: Vec<u8>,
        content_type: Option<&str>,
    ) -> ApiResult<Procedure> {
        require_non_empty("name", name)?;
        let actor = resolve_user(self.identity.as_ref(), actor_id)?;

        let handle = self.blob_store.put_blob(
            bytes,
            BlobMetadata {
                name: name.to_string(),
                content_type: content_type.map(str::to_string),
                uploader_id: actor.user_id.clone(),
            },
        )?;

        self.attach_document(
            &actor.user_id,
            procedure_id,
            NewDocument {
                name: name.to_string(),
                blob_id: handle.blob_id,
                blob_url: Some(handle.url),
            },
        )
    }

    // ==========================================
    // 删除
    // ==========================================

    /// 删除事项（工作人员）
    ///
    /// 附件元数据与备注一并删除；对象存储中的文件不清理
    pub fn delete(&self, actor_id: &str, procedure_id: &str) -> ApiResult<()> {
        let actor = resolve_user(self.identity.as_ref(), actor_id)?;
        require_capability(&actor, Capability::DeleteProcedure, "delete_procedure")?;

        let deleted = self.retry_policy.run("delete_procedure", RepositoryError::is_transient, |_| {
            self.procedure_repo.delete(procedure_id)
        })?;
        if !deleted {
            return Err(ApiError::not_found("Procedure", procedure_id));
        }

        info!(procedure_id = %procedure_id, actor_id = %actor.user_id, "事项已删除");
        record_action(
            &self.action_log_repo,
            ActionLog::new(ActionType::DeleteProcedure, &actor.user_id, procedure_id, None, None),
        );
        Ok(())
    }

    // ==========================================
    // 查询接口
    // ==========================================

    /// 查询事项（申请人只能看自己的）
    pub fn get(&self, actor_id: &str, procedure_id: &str) -> ApiResult<Procedure> {
        let actor = resolve_user(self.identity.as_ref(), actor_id)?;
        let procedure = self.load_procedure(procedure_id)?;

        if !can_view_procedure(actor.role, &actor.user_id, &procedure.requester_id) {
            return Err(ApiError::forbidden(&actor.user_id, "view_procedure"));
        }
        Ok(procedure)
    }

    /// 条件分页查询（申请人强制只看自己的）
    ///
    /// page_size 超过上限时截断；偏移量超出存储可表示范围时返回校验错误
    pub fn list(
        &self,
        actor_id: &str,
        filter: ProcedureFilter,
        page: usize,
        page_size: usize,
    ) -> ApiResult<ProcedurePage> {
        let actor = resolve_user(self.identity.as_ref(), actor_id)?;
        if page == 0 {
            return Err(ApiError::invalid_field("page", "从1开始"));
        }
        if page_size == 0 {
            return Err(ApiError::invalid_field("page_size", "必须大于0"));
        }
        let page_size = page_size.min(self.max_page_size);
        (page - 1)
            .checked_mul(page_size)
            .filter(|offset| *offset <= i64::MAX as usize)
            .ok_or_else(|| ApiError::invalid_field("page", "页码超出范围"))?;

        let filter = self.scope_filter(&actor, filter);
        let (items, total) = self.procedure_repo.query(&filter, page, page_size)?;

        debug!(actor_id = %actor.user_id, total, page, page_size, "事项查询");
        Ok(ProcedurePage {
            items,
            total,
            page,
            page_size,
        })
    }

    fn scope_filter(&self, actor: &UserProfile, mut filter: ProcedureFilter) -> ProcedureFilter {
        if !can(actor.role, Capability::ViewAllProcedures) {
            filter.requester_id = Some(actor.user_id.clone());
        }
        filter
    }

    // ==========================================
    // 内部工具
    // ==========================================

    fn load_procedure(&self, procedure_id: &str) -> ApiResult<Procedure> {
        require_non_empty("procedure_id", procedure_id)?;
        self.procedure_repo
            .find_by_id(procedure_id)?
            .ok_or_else(|| ApiError::not_found("Procedure", procedure_id))
    }

    /// 读取 → 修改 → revision CAS 写回；冲突时重新读取，最多 max_attempts 次
    ///
    /// mutate 返回 Err 时直接终止（业务拒绝不重试）
    fn update_with_retry<R, F>(&self, procedure_id: &str, mut mutate: F) -> ApiResult<(Procedure, R)>
    where
        F: FnMut(&mut Procedure) -> ApiResult<R>,
    {
        let max_attempts = self.retry_policy.max_attempts.max(1);

        for attempt in 1..=max_attempts {
            let mut current = self.load_procedure(procedure_id)?;
            let result = mutate(&mut current)?;

            match self.procedure_repo.update_with_revision(&current) {
                Ok(new_revision) => {
                    current.revision = new_revision;
                    return Ok((current, result));
                }
                Err(RepositoryError::OptimisticLockFailure { .. }) | Err(RepositoryError::StoreBusy(_))
                    if attempt < max_attempts =>
                {
                    let delay = self.retry_policy.delay_for(attempt);
                    debug!(procedure_id = %procedure_id, attempt, delay_ms = delay.as_millis() as u64, "事项并发冲突，重新读取");
                    std::thread::sleep(delay);
                }
                Err(RepositoryError::OptimisticLockFailure { entity, id, .. }) => {
                    return Err(ApiError::OptimisticLockFailure {
                        entity,
                        id,
                        attempts: max_attempts,
                    });
                }
                Err(e) => return Err(e.into()),
            }
        }

        Err(ApiError::OptimisticLockFailure {
            entity: "Procedure".to_string(),
            id: procedure_id.to_string(),
            attempts: max_attempts,
        })
    }
}

