// ==========================================
// 池成员查询与报名状态维护
// ==========================================
// 报名状态变更只改 status 三列，不触碰席位
// ==========================================

use super::pools::PoolRepository;
use crate::db::{format_ts, invalid_text, parse_opt_ts, parse_ts};
use crate::domain::pool::PoolMember;
use crate::domain::types::{EnrollmentStatus, PoolKind};
use crate::repository::error::RepositoryResult;
use crate::repository::sql_builder::SqlQueryBuilder;
use chrono::NaiveDateTime;
use rusqlite::{params, params_from_iter, OptionalExtension, Result as SqliteResult};
use serde::{Deserialize, Serialize};

const MEMBER_COLUMNS: &str = r#"
    m.pool_id, m.seq, m.participant_id, m.enrolled_at,
    m.status, m.status_updated_at, m.status_updated_by
"#;

/// 花名册行（成员 + 所属池摘要）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RosterRow {
    pub member: PoolMember,
    pub pool_name: String,
    pub pool_kind: PoolKind,
    pub pool_region: Option<String>,
}

impl PoolRepository {
    /// 查询单个成员
    pub fn find_member(&self, pool_id: &str, participant_id: &str) -> RepositoryResult<Option<PoolMember>> {
        let conn = self.get_conn()?;
        let sql = format!(
            "SELECT {} FROM pool_member m WHERE m.pool_id = ?1 AND m.participant_id = ?2",
            MEMBER_COLUMNS
        );

        let member = conn
            .query_row(&sql, params![pool_id, participant_id], |row| map_member_row(row))
            .optional()?;

        Ok(member)
    }

    /// 成员数量
    pub fn count_members(&self, pool_id: &str) -> RepositoryResult<u32> {
        let conn = self.get_conn()?;
        let count: u32 = conn.query_row(
            "SELECT COUNT(*) FROM pool_member WHERE pool_id = ?1",
            params![pool_id],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    /// 条件更新报名状态（状态比较 + 写入一步完成）
    ///
    /// # 返回
    /// - Ok(true): 已更新
    /// - Ok(false): 成员不存在或当前状态已不是 expected（并发修改）
    pub fn update_member_status(
        &self,
        pool_id: &str,
        participant_id: &str,
        expected: EnrollmentStatus,
        new_status: EnrollmentStatus,
        actor: &str,
        now: NaiveDateTime,
    ) -> RepositoryResult<bool> {
        let conn = self.get_conn()?;
        let affected = conn.execute(
            r#"
            UPDATE pool_member
            SET status = ?1, status_updated_at = ?2, status_updated_by = ?3
            WHERE pool_id = ?4 AND participant_id = ?5 AND status = ?6
            "#,
            params![
                new_status.to_db_str(),
                format_ts(&now),
                actor,
                pool_id,
                participant_id,
                expected.to_db_str(),
            ],
        )?;
        Ok(affected == 1)
    }

    /// 花名册查询（可限定池与报名状态）
    ///
    /// 地区/关键字过滤依赖身份信息，由上层在联表后完成
    pub fn query_roster(
        &self,
        pool_id: Option<&str>,
        status: Option<EnrollmentStatus>,
    ) -> RepositoryResult<Vec<RosterRow>> {
        let conn = self.get_conn()?;

        let select = format!(
            "SELECT {}, p.name, p.kind, p.region FROM pool_member m JOIN capacity_pool p ON p.pool_id = m.pool_id",
            MEMBER_COLUMNS
        );
        let mut builder = SqlQueryBuilder::new(&select);
        builder.filter("m.pool_id = ?", pool_id.map(str::to_string));
        builder.filter("m.status = ?", status.map(|s| s.to_db_str().to_string()));
        builder.order_by("p.created_at, m.pool_id, m.seq");

        let sql = builder.build();
        let mut stmt = conn.prepare(&sql)?;

        let rows = stmt
            .query_map(params_from_iter(builder.params().iter()), |row| {
                let kind_str: String = row.get(8)?;
                let pool_kind =
                    PoolKind::parse(&kind_str).ok_or_else(|| invalid_text(8, "kind", &kind_str))?;
                Ok(RosterRow {
                    member: map_member_row(row)?,
                    pool_name: row.get(7)?,
                    pool_kind,
                    pool_region: row.get(9)?,
                })
            })?
            .collect::<SqliteResult<Vec<_>>>()?;

        Ok(rows)
    }
}

/// 映射成员行（列顺序见 MEMBER_COLUMNS）
fn map_member_row(row: &rusqlite::Row) -> rusqlite::Result<PoolMember> {
    let status = match row.get::<_, Option<String>>(4)? {
        Some(raw) => Some(EnrollmentStatus::parse(&raw).ok_or_else(|| invalid_text(4, "status", &raw))?),
        None => None,
    };

    Ok(PoolMember {
        pool_id: row.get(0)?,
        seq: row.get(1)?,
        participant_id: row.get(2)?,
        enrolled_at: parse_ts(3, &row.get::<_, String>(3)?)?,
        status,
        status_updated_at: parse_opt_ts(5, row.get(5)?)?,
        status_updated_by: row.get(6)?,
    })
}
