use super::core::ActionLogRepository;
use crate::db::{format_ts, parse_ts};
use crate::domain::action_log::ActionLog;
use crate::repository::error::RepositoryResult;
use chrono::NaiveDateTime;
use rusqlite::{params, OptionalExtension, Result as SqliteResult, Row};

const LOG_COLUMNS: &str = r#"
    action_id, action_type, action_ts, actor,
    target_type, target_id, payload_json, detail
"#;

impl ActionLogRepository {
    // ==========================================
    // 查询操作
    // ==========================================

    /// 按 action_id 查询单个日志
    pub fn find_by_id(&self, action_id: &str) -> RepositoryResult<Option<ActionLog>> {
        let conn = self.get_conn()?;
        let sql = format!("SELECT {} FROM action_log WHERE action_id = ?1", LOG_COLUMNS);

        let log = conn
            .query_row(&sql, params![action_id], |row| map_row(row))
            .optional()?;

        Ok(log)
    }

    /// 查询某个对象的全部日志（按时间升序）
    pub fn find_by_target(&self, target_type: &str, target_id: &str) -> RepositoryResult<Vec<ActionLog>> {
        let conn = self.get_conn()?;
        let sql = format!(
            r#"SELECT {} FROM action_log
               WHERE target_type = ?1 AND target_id = ?2
               ORDER BY action_ts ASC, rowid ASC"#,
            LOG_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;

        let logs = stmt
            .query_map(params![target_type, target_id], |row| map_row(row))?
            .collect::<SqliteResult<Vec<_>>>()?;

        Ok(logs)
    }

    /// 查询指定时间范围的操作日志（左闭右开，按时间倒序）
    pub fn find_by_time_range(
        &self,
        start_time: NaiveDateTime,
        end_time: NaiveDateTime,
    ) -> RepositoryResult<Vec<ActionLog>> {
        let conn = self.get_conn()?;
        let sql = format!(
            r#"SELECT {} FROM action_log
               WHERE action_ts >= ?1 AND action_ts < ?2
               ORDER BY action_ts DESC, rowid DESC"#,
            LOG_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;

        let logs = stmt
            .query_map(
                params![format_ts(&start_time), format_ts(&end_time)],
                |row| map_row(row),
            )?
            .collect::<SqliteResult<Vec<_>>>()?;

        Ok(logs)
    }

    /// 最近 N 条日志
    pub fn list_recent(&self, limit: usize) -> RepositoryResult<Vec<ActionLog>> {
        let conn = self.get_conn()?;
        let sql = format!(
            "SELECT {} FROM action_log ORDER BY action_ts DESC, rowid DESC LIMIT ?1",
            LOG_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;

        let logs = stmt
            .query_map(params![limit as i64], |row| map_row(row))?
            .collect::<SqliteResult<Vec<_>>>()?;

        Ok(logs)
    }
}

/// 映射数据库行到 ActionLog
fn map_row(row: &Row) -> SqliteResult<ActionLog> {
    let payload_json: Option<String> = row.get(6)?;

    Ok(ActionLog {
        action_id: row.get(0)?,
        action_type: row.get(1)?,
        action_ts: parse_ts(2, &row.get::<_, String>(2)?)?,
        actor: row.get(3)?,
        target_type: row.get(4)?,
        target_id: row.get(5)?,
        payload_json: payload_json.and_then(|s| serde_json::from_str(&s).ok()),
        detail: row.get(7)?,
    })
}
