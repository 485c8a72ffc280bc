// ==========================================
// 事项主记录读写（含乐观锁更新）
// ==========================================

use crate::db::{format_ts, invalid_text, open_sqlite_connection, parse_opt_ts, parse_ts};
use crate::domain::procedure::Procedure;
use crate::domain::types::{Priority, ProcedureKind, ProcedureState};
use crate::repository::error::{RepositoryError, RepositoryResult};
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde_json::{Map, Value as JsonValue};
use std::sync::{Arc, Mutex};

pub(super) const PROCEDURE_COLUMNS: &str = r#"
    procedure_id, requester_id, kind, state, submitted_at, reviewed_at,
    completed_at, reviewer_id, priority, notes, origin_region, payload_json, revision
"#;

// ==========================================
// ProcedureRepository - 行政事项仓储
// ==========================================
pub struct ProcedureRepository {
    conn: Arc<Mutex<Connection>>,
}

impl ProcedureRepository {
    /// 创建新的仓储实例（独立连接）
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

    /// 插入新事项（附件/备注需另行追加）
    pub fn insert(&self, procedure: &Procedure) -> RepositoryResult<()> {
        let conn = self.get_conn()?;

        conn.execute(
            r#"
            INSERT INTO admin_procedure (
                procedure_id, requester_id, kind, state, submitted_at, reviewed_at,
                completed_at, reviewer_id, priority, notes, origin_region, payload_json, revision
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)
            "#,
            params![
                procedure.procedure_id,
                procedure.requester_id,
                procedure.kind.to_db_str(),
                procedure.state.to_db_str(),
                format_ts(&procedure.submitted_at),
                procedure.reviewed_at.as_ref().map(format_ts),
                procedure.completed_at.as_ref().map(format_ts),
                procedure.reviewer_id,
                procedure.priority.to_db_str(),
                procedure.notes,
                procedure.origin_region,
                JsonValue::Object(procedure.payload.clone()).to_string(),
                procedure.revision,
            ],
        )?;

        Ok(())
    }

    /// 按ID查询（含附件与备注）
    pub fn find_by_id(&self, procedure_id: &str) -> RepositoryResult<Option<Procedure>> {
        let conn = self.get_conn()?;
        let sql = format!(
            "SELECT {} FROM admin_procedure WHERE procedure_id = ?1",
            PROCEDURE_COLUMNS
        );

        let procedure = conn
            .query_row(&sql, params![procedure_id], |row| map_procedure_row(row))
            .optional()?;

        match procedure {
            Some(mut p) => {
                super::children::load_children(&conn, &mut p)?;
                Ok(Some(p))
            }
            None => Ok(None),
        }
    }

    /// 更新事项 (带乐观锁检查)
    ///
    /// # 并发控制
    /// 使用 revision 字段做比较并交换；procedure.revision 为读取时的版本
    ///
    /// # 返回
    /// - Ok(new_revision)
    ///
    /// # 错误
    /// - `RepositoryError::OptimisticLockFailure`: revision不匹配 (其他请求已更新)
    /// - `RepositoryError::NotFound`: procedure_id不存在
    pub fn update_with_revision(&self, procedure: &Procedure) -> RepositoryResult<i64> {
        let conn = self.get_conn()?;

        let rows_affected = conn.execute(
            r#"UPDATE admin_procedure
               SET state = ?1, reviewed_at = ?2, completed_at = ?3, reviewer_id = ?4,
                   priority = ?5, notes = ?6, origin_region = ?7, payload_json = ?8,
                   revision = revision + 1
               WHERE procedure_id = ?9 AND revision = ?10"#,
            params![
                procedure.state.to_db_str(),
                procedure.reviewed_at.as_ref().map(format_ts),
                procedure.completed_at.as_ref().map(format_ts),
                procedure.reviewer_id,
                procedure.priority.to_db_str(),
                procedure.notes,
                procedure.origin_region,
                JsonValue::Object(procedure.payload.clone()).to_string(),
                procedure.procedure_id,
                procedure.revision,
            ],
        )?;

        if rows_affected == 0 {
            // 判断是记录不存在还是revision冲突
            let actual: Option<i64> = conn
                .query_row(
                    "SELECT revision FROM admin_procedure WHERE procedure_id = ?1",
                    params![procedure.procedure_id],
                    |row| row.get(0),
                )
                .optional()?;

            return match actual {
                Some(actual) => Err(RepositoryError::OptimisticLockFailure {
                    entity: "Procedure".to_string(),
                    id: procedure.procedure_id.clone(),
                    expected: procedure.revision,
                    actual,
                }),
                None => Err(RepositoryError::NotFound {
                    entity: "Procedure".to_string(),
                    id: procedure.procedure_id.clone(),
                }),
            };
        }

        Ok(procedure.revision + 1)
    }

    /// 删除事项（附件元数据与备注随之级联删除）
    ///
    /// # 返回
    /// - Ok(true): 已删除
    /// - Ok(false): 不存在
    pub fn delete(&self, procedure_id: &str) -> RepositoryResult<bool> {
        let conn = self.get_conn()?;
        let affected = conn.execute(
            "DELETE FROM admin_procedure WHERE procedure_id = ?1",
            params![procedure_id],
        )?;
        Ok(affected == 1)
    }
}

/// 映射主记录（子集合为空，由 load_children 填充）
pub(super) fn map_procedure_row(row: &Row) -> rusqlite::Result<Procedure> {
    let kind_str: String = row.get(2)?;
    let state_str: String = row.get(3)?;
    let priority_str: String = row.get(8)?;
    let payload_str: String = row.get(11)?;

    let kind = ProcedureKind::parse(&kind_str).ok_or_else(|| invalid_text(2, "kind", &kind_str))?;
    let state =
        ProcedureState::parse(&state_str).ok_or_else(|| invalid_text(3, "state", &state_str))?;
    let priority =
        Priority::parse(&priority_str).ok_or_else(|| invalid_text(8, "priority", &priority_str))?;
    let payload = match serde_json::from_str::<JsonValue>(&payload_str) {
        Ok(JsonValue::Object(map)) => map,
        Ok(_) => Map::new(),
        Err(e) => {
            return Err(rusqlite::Error::FromSqlConversionFailure(
                11,
                rusqlite::types::Type::Text,
                Box::new(e),
            ))
        }
    };

    Ok(Procedure {
        procedure_id: row.get(0)?,
        requester_id: row.get(1)?,
        kind,
        state,
        submitted_at: parse_ts(4, &row.get::<_, String>(4)?)?,
        reviewed_at: parse_opt_ts(5, row.get(5)?)?,
        completed_at: parse_opt_ts(6, row.get(6)?)?,
        reviewer_id: row.get(7)?,
        priority,
        notes: row.get(9)?,
        origin_region: row.get(10)?,
        payload,
        attachments: Vec::new(),
        staff_notes: Vec::new(),
        revision: row.get(12)?,
    })
}
