// ==========================================
// 公共工具：参数校验、身份解析、能力检查、审计写入
// ==========================================

use crate::api::error::{ApiError, ApiResult};
use crate::collaborator::{IdentityDirectory, UserProfile};
use crate::domain::action_log::ActionLog;
use crate::engine::authorization::{can, Capability};
use crate::repository::action_log_repo::ActionLogRepository;
use chrono::NaiveDateTime;

/// 当前 UTC 时间（毫秒精度，与存储格式一致）
pub(crate) fn now() -> NaiveDateTime {
    let now = chrono::Utc::now().naive_utc();
    crate::db::parse_ts(0, &crate::db::format_ts(&now)).unwrap_or(now)
}

/// 非空校验
pub(crate) fn require_non_empty(field: &str, value: &str) -> ApiResult<()> {
    if value.trim().is_empty() {
        return Err(ApiError::invalid_field(field, "不能为空"));
    }
    Ok(())
}

/// 解析用户（不存在时返回 NotFound）
pub(crate) fn resolve_user(identity: &dyn IdentityDirectory, user_id: &str) -> ApiResult<UserProfile> {
    require_non_empty("user_id", user_id)?;
    identity
        .get_user(user_id)?
        .ok_or_else(|| ApiError::not_found("User", user_id))
}

/// 能力检查
pub(crate) fn require_capability(
    actor: &UserProfile,
    capability: Capability,
    action: &str,
) -> ApiResult<()> {
    if can(actor.role, capability) {
        Ok(())
    } else {
        tracing::warn!(actor_id = %actor.user_id, role = %actor.role, action = %action, "权限不足");
        Err(ApiError::forbidden(&actor.user_id, action))
    }
}

/// 写入操作日志（尽力而为，失败只告警）
pub(crate) fn record_action(repo: &ActionLogRepository, log: ActionLog) {
    if let Err(e) = repo.insert(&log) {
        tracing::warn!(
            action_type = %log.action_type,
            target_id = %log.target_id,
            error = %e,
            "操作日志写入失败（业务写入已提交）"
        );
    }
}
