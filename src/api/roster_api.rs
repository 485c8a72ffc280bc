// ==========================================
// 报名与事项审批核心 - 花名册 API
// ==========================================
// 职责: 花名册只读投影（成员 + 身份信息）与导出
// 说明: 读取最近一次已提交状态，不做缓存
// 说明: 单个参与人的身份查询失败只清空其展示字段，不影响整页
// ==========================================

use std::sync::Arc;
use tracing::{debug, warn};

use crate::api::common::require_non_empty;
use crate::api::error::{ApiError, ApiResult};
use crate::collaborator::IdentityDirectory;
use crate::domain::types::{EnrollmentStatus, PoolKind};
use crate::export::{render_roster_csv, render_roster_pdf, ExportFormat};
use crate::repository::pool_repo::{PoolRepository, RosterRow};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

// ==========================================
// 请求 / 响应类型
// ==========================================

/// 花名册过滤条件
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RosterFilter {
    #[serde(default)]
    pub status: Option<EnrollmentStatus>,
    /// 匹配参与人区域或池区域
    #[serde(default)]
    pub region: Option<String>,
    /// 大小写不敏感，匹配姓名、参与人ID、池名称
    #[serde(default)]
    pub free_text: Option<String>,
}

/// 花名册条目
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RosterEntry {
    pub pool_id: String,
    pub pool_name: String,
    pub pool_kind: PoolKind,
    pub pool_region: Option<String>,
    pub participant_id: String,
    pub seq: i64,
    pub display_name: Option<String>,
    pub region: Option<String>,
    pub enrolled_at: NaiveDateTime,
    pub status: Option<EnrollmentStatus>,
}

/// 花名册分页结果
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RosterPage {
    pub items: Vec<RosterEntry>,
    pub total: u64,
    pub page: usize,
    pub page_size: usize,
}

/// 分页配置
#[derive(Debug, Clone, Copy)]
pub struct RosterPaging {
    pub default_page_size: usize,
    pub max_page_size: usize,
}

impl Default for RosterPaging {
    fn default() -> Self {
        Self {
            default_page_size: 20,
            max_page_size: 200,
        }
    }
}

// ==========================================
// RosterApi
// ==========================================

pub struct RosterApi {
    pool_repo: Arc<PoolRepository>,
    identity: Arc<dyn IdentityDirectory>,
    paging: RosterPaging,
    export_locale: String,
}

impl RosterApi {
    pub fn new(
        pool_repo: Arc<PoolRepository>,
        identity: Arc<dyn IdentityDirectory>,
        paging: RosterPaging,
        export_locale: impl Into<String>,
    ) -> Self {
        Self {
            pool_repo,
            identity,
            paging,
            export_locale: export_locale.into(),
        }
    }

    /// 查询花名册
    ///
    /// # 参数
    /// - pool_id: None 表示全部池
    /// - page: 从 1 开始，None 取 1
    /// - page_size: None 取默认值，超过上限时截断
    /// - 页码超出结果范围时返回空页
    pub fn get_roster(
        &self,
        pool_id: Option<&str>,
        filter: &RosterFilter,
        page: Option<usize>,
        page_size: Option<usize>,
    ) -> ApiResult<RosterPage> {
        let page = page.unwrap_or(1);
        if page == 0 {
            return Err(ApiError::invalid_field("page", "必须从 1 开始"));
        }
        let page_size = match page_size {
            Some(0) => return Err(ApiError::invalid_field("page_size", "必须大于 0")),
            Some(n) => n.min(self.paging.max_page_size),
            None => self.paging.default_page_size,
        };

        if let Some(id) = pool_id {
            self.ensure_pool_exists(id)?;
        }

        let entries = self.load_entries(pool_id, filter)?;
        let total = entries.len() as u64;
        let items: Vec<RosterEntry> = entries
            .into_iter()
            .skip((page - 1).saturating_mul(page_size))
            .take(page_size)
            .collect();

        debug!(
            pool_id = ?pool_id,
            total = total,
            page = page,
            returned = items.len(),
            "花名册查询完成"
        );

        Ok(RosterPage {
            items,
            total,
            page,
            page_size,
        })
    }

    /// 导出单个池的完整花名册
    pub fn export(&self, pool_id: &str, format: ExportFormat) -> ApiResult<Vec<u8>> {
        let pool = self.ensure_pool_exists(pool_id)?;
        let entries = self.load_entries(Some(pool_id), &RosterFilter::default())?;

        let bytes = match format {
            ExportFormat::Csv => render_roster_csv(&entries, &self.export_locale)
                .map_err(|e| ApiError::InternalError(format!("CSV 导出失败: {}", e)))?,
            ExportFormat::Pdf => render_roster_pdf(&pool.name, &entries),
        };

        debug!(pool_id = %pool_id, format = %format, rows = entries.len(), bytes = bytes.len(), "花名册导出完成");
        Ok(bytes)
    }

    fn ensure_pool_exists(&self, pool_id: &str) -> ApiResult<crate::domain::pool::CapacityPool> {
        require_non_empty("pool_id", pool_id)?;
        self.pool_repo
            .find_by_id(pool_id)?
            .ok_or_else(|| ApiError::not_found("CapacityPool", pool_id))
    }

    /// 状态过滤走 SQL，区域/自由文本依赖身份信息，在拼接后过滤
    fn load_entries(&self, pool_id: Option<&str>, filter: &RosterFilter) -> ApiResult<Vec<RosterEntry>> {
        let rows = self.pool_repo.query_roster(pool_id, filter.status)?;

        let region = normalized(filter.region.as_deref());
        let needle = normalized(filter.free_text.as_deref());

        Ok(rows
            .into_iter()
            .map(|row| self.join_identity(row))
            .filter(|entry| match &region {
                Some(r) => {
                    entry.region.as_deref().map(str::to_lowercase).as_deref() == Some(r.as_str())
                        || entry.pool_region.as_deref().map(str::to_lowercase).as_deref()
                            == Some(r.as_str())
                }
                None => true,
            })
            .filter(|entry| match &needle {
                Some(n) => {
                    entry.participant_id.to_lowercase().contains(n.as_str())
                        || entry.pool_name.to_lowercase().contains(n.as_str())
                        || entry
                            .display_name
                            .as_deref()
                            .is_some_and(|d| d.to_lowercase().contains(n.as_str()))
                }
                None => true,
            })
            .collect())
    }

    fn join_identity(&self, row: RosterRow) -> RosterEntry {
        let (display_name, region) = match self.identity.get_user(&row.member.participant_id) {
            Ok(Some(profile)) => (Some(profile.display_name), profile.region),
            Ok(None) => (None, None),
            Err(e) => {
                warn!(
                    participant_id = %row.member.participant_id,
                    error = %e,
                    "身份查询失败，展示字段置空"
                );
                (None, None)
            }
        };

        RosterEntry {
            pool_id: row.member.pool_id,
            pool_name: row.pool_name,
            pool_kind: row.pool_kind,
            pool_region: row.pool_region,
            participant_id: row.member.participant_id,
            seq: row.member.seq,
            display_name,
            region,
            enrolled_at: row.member.enrolled_at,
            status: row.member.status,
        }
    }
}

fn normalized(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_lowercase)
}
