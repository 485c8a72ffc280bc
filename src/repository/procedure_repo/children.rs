// ==========================================
// 事项子表：附件与工作人员备注（只追加）
// ==========================================

use super::records::ProcedureRepository;
use crate::db::{format_ts, invalid_text, parse_ts};
use crate::domain::procedure::{DocumentRef, NewDocument, Procedure, ProcedureNote};
use crate::domain::types::ProcedureState;
use crate::repository::error::RepositoryResult;
use chrono::NaiveDateTime;
use rusqlite::{params, Connection, OptionalExtension, Result as SqliteResult};

/// 追加附件的结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttachOutcome {
    Appended { seq: i64 },
    ProcedureNotFound,
    /// 调用方要求非终态，但事项已处于终态
    Terminal { state: ProcedureState },
}

impl ProcedureRepository {
    /// 追加附件
    ///
    /// # 参数
    /// - reject_terminal: 为 true 时，事项处于终态则拒绝（申请人上传）
    ///
    /// # 红线
    /// - 状态检查与 seq 分配、插入在同一 IMMEDIATE 事务内
    pub fn append_attachment(
        &self,
        procedure_id: &str,
        document: &NewDocument,
        uploader_id: &str,
        uploaded_at: NaiveDateTime,
        reject_terminal: bool,
    ) -> RepositoryResult<AttachOutcome> {
        let mut conn = self.get_conn()?;
        let tx = conn.transaction_with_behavior(rusqlite::TransactionBehavior::Immediate)?;

        let state_str: Option<String> = tx
            .query_row(
                "SELECT state FROM admin_procedure WHERE procedure_id = ?1",
                params![procedure_id],
                |row| row.get(0),
            )
            .optional()?;

        let Some(state_str) = state_str else {
            return Ok(AttachOutcome::ProcedureNotFound);
        };
        let state = ProcedureState::parse(&state_str)
            .ok_or_else(|| invalid_text(0, "state", &state_str))?;

        if reject_terminal && state.is_terminal() {
            return Ok(AttachOutcome::Terminal { state });
        }

        let seq: i64 = tx.query_row(
            "SELECT COALESCE(MAX(seq), 0) + 1 FROM procedure_attachment WHERE procedure_id = ?1",
            params![procedure_id],
            |row| row.get(0),
        )?;

        tx.execute(
            r#"
            INSERT INTO procedure_attachment (
                procedure_id, seq, name, blob_id, blob_url, uploader_id, uploaded_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
            params![
                procedure_id,
                seq,
                document.name,
                document.blob_id,
                document.blob_url,
                uploader_id,
                format_ts(&uploaded_at),
            ],
        )?;

        tx.commit()?;
        Ok(AttachOutcome::Appended { seq })
    }

    /// 追加备注
    ///
    /// # 返回
    /// - Ok(Some(seq)): 已追加
    /// - Ok(None): 事项不存在
    pub fn append_note(
        &self,
        procedure_id: &str,
        author_id: &str,
        body: &str,
        created_at: NaiveDateTime,
    ) -> RepositoryResult<Option<i64>> {
        let mut conn = self.get_conn()?;
        let tx = conn.transaction_with_behavior(rusqlite::TransactionBehavior::Immediate)?;

        let exists: bool = tx.query_row(
            "SELECT EXISTS(SELECT 1 FROM admin_procedure WHERE procedure_id = ?1)",
            params![procedure_id],
            |row| row.get(0),
        )?;
        if !exists {
            return Ok(None);
        }

        let seq: i64 = tx.query_row(
            "SELECT COALESCE(MAX(seq), 0) + 1 FROM procedure_note WHERE procedure_id = ?1",
            params![procedure_id],
            |row| row.get(0),
        )?;

        tx.execute(
            r#"INSERT INTO procedure_note (procedure_id, seq, author_id, body, created_at)
               VALUES (?1, ?2, ?3, ?4, ?5)"#,
            params![procedure_id, seq, author_id, body, format_ts(&created_at)],
        )?;

        tx.commit()?;
        Ok(Some(seq))
    }

    /// 查询附件（按 seq 升序）
    pub fn list_attachments(&self, procedure_id: &str) -> RepositoryResult<Vec<DocumentRef>> {
        let conn = self.get_conn()?;
        Ok(load_attachments(&conn, procedure_id)?)
    }
}

/// 填充事项的附件与备注
pub(super) fn load_children(conn: &Connection, procedure: &mut Procedure) -> SqliteResult<()> {
    procedure.attachments = load_attachments(conn, &procedure.procedure_id)?;
    procedure.staff_notes = load_notes(conn, &procedure.procedure_id)?;
    Ok(())
}

fn load_attachments(conn: &Connection, procedure_id: &str) -> SqliteResult<Vec<DocumentRef>> {
    let mut stmt = conn.prepare(
        r#"SELECT seq, name, blob_id, blob_url, uploader_id, uploaded_at
           FROM procedure_attachment
           WHERE procedure_id = ?1
           ORDER BY seq"#,
    )?;

    let rows = stmt
        .query_map(params![procedure_id], |row| {
            Ok(DocumentRef {
                seq: row.get(0)?,
                name: row.get(1)?,
                blob_id: row.get(2)?,
                blob_url: row.get(3)?,
                uploader_id: row.get(4)?,
                uploaded_at: parse_ts(5, &row.get::<_, String>(5)?)?,
            })
        })?
        .collect::<SqliteResult<Vec<_>>>()?;

    Ok(rows)
}

fn load_notes(conn: &Connection, procedure_id: &str) -> SqliteResult<Vec<ProcedureNote>> {
    let mut stmt = conn.prepare(
        r#"SELECT seq, author_id, body, created_at
           FROM procedure_note
           WHERE procedure_id = ?1
           ORDER BY seq"#,
    )?;

    let rows = stmt
        .query_map(params![procedure_id], |row| {
            Ok(ProcedureNote {
                seq: row.get(0)?,
                author_id: row.get(1)?,
                body: row.get(2)?,
                created_at: parse_ts(3, &row.get::<_, String>(3)?)?,
            })
        })?
        .collect::<SqliteResult<Vec<_>>>()?;

    Ok(rows)
}
