// ==========================================
// 容量池与子项目的基础读写
// ==========================================

use crate::db::{format_ts, invalid_text, open_sqlite_connection, parse_ts};
use crate::domain::pool::{CapacityPool, SubProject};
use crate::domain::types::PoolKind;
use crate::repository::error::{RepositoryError, RepositoryResult};
use rusqlite::{params, Connection, OptionalExtension, Result as SqliteResult, TransactionBehavior};
use std::sync::{Arc, Mutex};

const POOL_COLUMNS: &str = r#"
    pool_id, name, kind, total_seats, seats_remaining, enrollment_open,
    responsible_id, region, created_by, created_at, revision
"#;

/// 删除池的结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PoolDeleteOutcome {
    Deleted,
    NotFound,
    /// 仍存在子项目，禁止删除
    HasSubProjects(u32),
}

// ==========================================
// PoolRepository - 容量池仓储
// ==========================================

/// 容量池仓储
/// 职责: 管理 capacity_pool / pool_member / pool_sub_project 表
pub struct PoolRepository {
    conn: Arc<Mutex<Connection>>,
}

impl PoolRepository {
    /// 创建新的仓储实例（独立连接）
    ///
    /// # 参数
    /// - db_path: 数据库文件路径
    pub fn new(db_path: &str) -> RepositoryResult<Self> {
        let conn = open_sqlite_connection(db_path)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// 从已有连接创建仓储实例
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    /// 获取数据库连接
    pub(super) fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    // ==========================================
    // 容量池
    // ==========================================

    /// 插入新池（seats_remaining 必须等于 total_seats）
    pub fn insert(&self, pool: &CapacityPool) -> RepositoryResult<()> {
        let conn = self.get_conn()?;

        conn.execute(
            r#"
            INSERT INTO capacity_pool (
                pool_id, name, kind, total_seats, seats_remaining, enrollment_open,
                responsible_id, region, created_by, created_at, revision
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
            "#,
            params![
                pool.pool_id,
                pool.name,
                pool.kind.to_db_str(),
                pool.total_seats,
                pool.seats_remaining,
                pool.enrollment_open,
                pool.responsible_id,
                pool.region,
                pool.created_by,
                format_ts(&pool.created_at),
                pool.revision,
            ],
        )?;

        Ok(())
    }

    /// 按ID查询
    pub fn find_by_id(&self, pool_id: &str) -> RepositoryResult<Option<CapacityPool>> {
        let conn = self.get_conn()?;
        let sql = format!("SELECT {} FROM capacity_pool WHERE pool_id = ?1", POOL_COLUMNS);

        let pool = conn
            .query_row(&sql, params![pool_id], |row| map_pool_row(row))
            .optional()?;

        Ok(pool)
    }

    /// 查询全部池（可按类型过滤）
    pub fn list(&self, kind: Option<PoolKind>) -> RepositoryResult<Vec<CapacityPool>> {
        let conn = self.get_conn()?;

        let pools = match kind {
            Some(k) => {
                let sql = format!(
                    "SELECT {} FROM capacity_pool WHERE kind = ?1 ORDER BY created_at, pool_id",
                    POOL_COLUMNS
                );
                let mut stmt = conn.prepare(&sql)?;
                let rows = stmt
                    .query_map(params![k.to_db_str()], |row| map_pool_row(row))?
                    .collect::<SqliteResult<Vec<_>>>()?;
                rows
            }
            None => {
                let sql = format!(
                    "SELECT {} FROM capacity_pool ORDER BY created_at, pool_id",
                    POOL_COLUMNS
                );
                let mut stmt = conn.prepare(&sql)?;
                let rows = stmt
                    .query_map([], |row| map_pool_row(row))?
                    .collect::<SqliteResult<Vec<_>>>()?;
                rows
            }
        };

        Ok(pools)
    }

    /// 设置报名开放标志
    ///
    /// # 返回
    /// - Ok(true): 已更新
    /// - Ok(false): 池不存在
    pub fn set_enrollment_open(&self, pool_id: &str, open: bool) -> RepositoryResult<bool> {
        let conn = self.get_conn()?;
        let affected = conn.execute(
            r#"UPDATE capacity_pool
               SET enrollment_open = ?1, revision = revision + 1
               WHERE pool_id = ?2"#,
            params![open, pool_id],
        )?;
        Ok(affected == 1)
    }

    /// 设置负责人（None 表示清空）
    pub fn set_responsible(&self, pool_id: &str, responsible_id: Option<&str>) -> RepositoryResult<bool> {
        let conn = self.get_conn()?;
        let affected = conn.execute(
            r#"UPDATE capacity_pool
               SET responsible_id = ?1, revision = revision + 1
               WHERE pool_id = ?2"#,
            params![responsible_id, pool_id],
        )?;
        Ok(affected == 1)
    }

    /// 删除池（存在子项目时拒绝；成员随池级联删除）
    ///
    /// # 红线
    /// - 子项目检查与删除在同一事务内完成
    pub fn delete(&self, pool_id: &str) -> RepositoryResult<PoolDeleteOutcome> {
        let mut conn = self.get_conn()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let exists: bool = tx.query_row(
            "SELECT EXISTS(SELECT 1 FROM capacity_pool WHERE pool_id = ?1)",
            params![pool_id],
            |row| row.get(0),
        )?;
        if !exists {
            return Ok(PoolDeleteOutcome::NotFound);
        }

        let sub_projects: u32 = tx.query_row(
            "SELECT COUNT(*) FROM pool_sub_project WHERE pool_id = ?1",
            params![pool_id],
            |row| row.get(0),
        )?;
        if sub_projects > 0 {
            return Ok(PoolDeleteOutcome::HasSubProjects(sub_projects));
        }

        tx.execute("DELETE FROM capacity_pool WHERE pool_id = ?1", params![pool_id])?;
        tx.commit()?;
        Ok(PoolDeleteOutcome::Deleted)
    }

    // ==========================================
    // 子项目
    // ==========================================

    /// 新增子项目（池不存在时返回外键错误）
    pub fn insert_sub_project(&self, sub_project: &SubProject) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        conn.execute(
            r#"INSERT INTO pool_sub_project (sub_project_id, pool_id, name, created_by, created_at)
               VALUES (?1, ?2, ?3, ?4, ?5)"#,
            params![
                sub_project.sub_project_id,
                sub_project.pool_id,
                sub_project.name,
                sub_project.created_by,
                format_ts(&sub_project.created_at),
            ],
        )?;
        Ok(())
    }

    /// 删除子项目
    pub fn delete_sub_project(&self, sub_project_id: &str) -> RepositoryResult<bool> {
        let conn = self.get_conn()?;
        let affected = conn.execute(
            "DELETE FROM pool_sub_project WHERE sub_project_id = ?1",
            params![sub_project_id],
        )?;
        Ok(affected == 1)
    }

    /// 查询池下的子项目
    pub fn list_sub_projects(&self, pool_id: &str) -> RepositoryResult<Vec<SubProject>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            r#"SELECT sub_project_id, pool_id, name, created_by, created_at
               FROM pool_sub_project
               WHERE pool_id = ?1
               ORDER BY created_at, sub_project_id"#,
        )?;

        let rows = stmt
            .query_map(params![pool_id], |row| {
                Ok(SubProject {
                    sub_project_id: row.get(0)?,
                    pool_id: row.get(1)?,
                    name: row.get(2)?,
                    created_by: row.get(3)?,
                    created_at: parse_ts(4, &row.get::<_, String>(4)?)?,
                })
            })?
            .collect::<SqliteResult<Vec<_>>>()?;

        Ok(rows)
    }
}

/// 映射数据库行到 CapacityPool（列顺序见 POOL_COLUMNS）
fn map_pool_row(row: &rusqlite::Row) -> rusqlite::Result<CapacityPool> {
    let kind_str: String = row.get(2)?;
    let kind = PoolKind::parse(&kind_str).ok_or_else(|| invalid_text(2, "kind", &kind_str))?;

    Ok(CapacityPool {
        pool_id: row.get(0)?,
        name: row.get(1)?,
        kind,
        total_seats: row.get(3)?,
        seats_remaining: row.get(4)?,
        enrollment_open: row.get(5)?,
        responsible_id: row.get(6)?,
        region: row.get(7)?,
        created_by: row.get(8)?,
        created_at: parse_ts(9, &row.get::<_, String>(9)?)?,
        revision: row.get(10)?,
    })
}
