// ==========================================
// 报名与事项审批核心 - SQLite 连接初始化
// ==========================================
// 目标:
// - 统一所有 Connection::open 的 PRAGMA 行为，避免“部分模块外键开启/部分不开启”
// - 统一 busy_timeout，减少并发写入时的偶发 busy 错误
// - 统一建表（CREATE TABLE IF NOT EXISTS）与时间戳编码
// ==========================================

use chrono::NaiveDateTime;
use rusqlite::Connection;
use rusqlite::OptionalExtension;
use std::time::Duration;

/// 默认 busy_timeout（毫秒）
pub const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;

/// 当前代码所期望的 schema_version
pub const CURRENT_SCHEMA_VERSION: i64 = 1;

/// 时间戳存储格式（UTC，毫秒精度）
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.3f";

/// 配置 SQLite 连接的统一 PRAGMA
///
/// 说明：
/// - foreign_keys 需要“每个连接”单独开启
/// - busy_timeout 需要“每个连接”单独配置
pub fn configure_sqlite_connection(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;
    conn.busy_timeout(Duration::from_millis(DEFAULT_BUSY_TIMEOUT_MS))?;
    Ok(())
}

/// 打开 SQLite 连接并应用统一配置
pub fn open_sqlite_connection(db_path: &str) -> rusqlite::Result<Connection> {
    let conn = Connection::open(db_path)?;
    configure_sqlite_connection(&conn)?;
    Ok(conn)
}

/// 打开连接并确保 schema 存在（应用启动与测试共用）
pub fn open_and_init(db_path: &str) -> rusqlite::Result<Connection> {
    let conn = open_sqlite_connection(db_path)?;
    ensure_schema(&conn)?;
    Ok(conn)
}

/// 建表（幂等）
///
/// 说明：
/// - 成员/附件/备注均为子表，按 (父ID, seq) 组织，追加时不重写父记录
/// - capacity_pool 上的 CHECK 约束是席位不变量的最后一道防线
pub fn ensure_schema(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE TABLE IF NOT EXISTS config_kv (
            scope_id TEXT NOT NULL,
            key TEXT NOT NULL,
            value TEXT NOT NULL,
            updated_at TEXT NOT NULL DEFAULT (datetime('now')),
            PRIMARY KEY (scope_id, key)
        );

        CREATE TABLE IF NOT EXISTS capacity_pool (
            pool_id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            kind TEXT NOT NULL CHECK (kind IN ('PROGRAM', 'TRAINING')),
            total_seats INTEGER NOT NULL CHECK (total_seats > 0),
            seats_remaining INTEGER NOT NULL,
            enrollment_open INTEGER NOT NULL DEFAULT 1,
            responsible_id TEXT,
            region TEXT,
            created_by TEXT NOT NULL,
            created_at TEXT NOT NULL,
            member_seq INTEGER NOT NULL DEFAULT 0,
            revision INTEGER NOT NULL DEFAULT 0,
            CHECK (seats_remaining >= 0 AND seats_remaining <= total_seats)
        );

        CREATE TABLE IF NOT EXISTS pool_member (
            pool_id TEXT NOT NULL REFERENCES capacity_pool(pool_id) ON DELETE CASCADE,
            seq INTEGER NOT NULL,
            participant_id TEXT NOT NULL,
            enrolled_at TEXT NOT NULL,
            status TEXT,
            status_updated_at TEXT,
            status_updated_by TEXT,
            PRIMARY KEY (pool_id, seq),
            UNIQUE (pool_id, participant_id)
        );

        CREATE INDEX IF NOT EXISTS idx_pool_member_participant
            ON pool_member(participant_id);

        CREATE TABLE IF NOT EXISTS pool_sub_project (
            sub_project_id TEXT PRIMARY KEY,
            pool_id TEXT NOT NULL REFERENCES capacity_pool(pool_id),
            name TEXT NOT NULL,
            created_by TEXT NOT NULL,
            created_at TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_pool_sub_project_pool
            ON pool_sub_project(pool_id);

        CREATE TABLE IF NOT EXISTS admin_procedure (
            procedure_id TEXT PRIMARY KEY,
            requester_id TEXT NOT NULL,
            kind TEXT NOT NULL,
            state TEXT NOT NULL,
            submitted_at TEXT NOT NULL,
            reviewed_at TEXT,
            completed_at TEXT,
            reviewer_id TEXT,
            priority TEXT NOT NULL,
            notes TEXT NOT NULL DEFAULT '',
            origin_region TEXT,
            payload_json TEXT NOT NULL,
            revision INTEGER NOT NULL DEFAULT 0
        );

        CREATE INDEX IF NOT EXISTS idx_procedure_requester
            ON admin_procedure(requester_id, submitted_at);
        CREATE INDEX IF NOT EXISTS idx_procedure_state
            ON admin_procedure(state, kind);

        CREATE TABLE IF NOT EXISTS procedure_attachment (
            procedure_id TEXT NOT NULL REFERENCES admin_procedure(procedure_id) ON DELETE CASCADE,
            seq INTEGER NOT NULL,
            name TEXT NOT NULL,
            blob_id TEXT NOT NULL,
            blob_url TEXT,
            uploader_id TEXT NOT NULL,
            uploaded_at TEXT NOT NULL,
            PRIMARY KEY (procedure_id, seq)
        );

        CREATE TABLE IF NOT EXISTS procedure_note (
            procedure_id TEXT NOT NULL REFERENCES admin_procedure(procedure_id) ON DELETE CASCADE,
            seq INTEGER NOT NULL,
            author_id TEXT NOT NULL,
            body TEXT NOT NULL,
            created_at TEXT NOT NULL,
            PRIMARY KEY (procedure_id, seq)
        );

        CREATE TABLE IF NOT EXISTS action_log (
            action_id TEXT PRIMARY KEY,
            action_type TEXT NOT NULL,
            action_ts TEXT NOT NULL,
            actor TEXT NOT NULL,
            target_type TEXT NOT NULL,
            target_id TEXT NOT NULL,
            payload_json TEXT,
            detail TEXT
        );

        CREATE INDEX IF NOT EXISTS idx_action_log_target
            ON action_log(target_type, target_id, action_ts);
        "#,
    )?;

    conn.execute(
        "INSERT OR IGNORE INTO schema_version (version) VALUES (?1)",
        [CURRENT_SCHEMA_VERSION],
    )?;

    Ok(())
}

/// 读取 schema_version（若表不存在则返回 None）
pub fn read_schema_version(conn: &Connection) -> rusqlite::Result<Option<i64>> {
    let has_table: bool = conn
        .query_row(
            "SELECT 1 FROM sqlite_master WHERE type='table' AND name='schema_version' LIMIT 1",
            [],
            |_row| Ok(true),
        )
        .optional()?
        .unwrap_or(false);

    if !has_table {
        return Ok(None);
    }

    let v: Option<i64> = conn.query_row("SELECT MAX(version) FROM schema_version", [], |row| row.get(0))?;
    Ok(v)
}

/// 时间戳编码
pub fn format_ts(ts: &NaiveDateTime) -> String {
    ts.format(TIMESTAMP_FORMAT).to_string()
}

/// 时间戳解码（用于 row 映射，失败时转为 FromSqlConversionFailure）
pub fn parse_ts(idx: usize, raw: &str) -> rusqlite::Result<NaiveDateTime> {
    NaiveDateTime::parse_from_str(raw, TIMESTAMP_FORMAT).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
    })
}

/// 非法枚举文本 -> FromSqlConversionFailure
pub fn invalid_text(idx: usize, column: &str, value: &str) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(
        idx,
        rusqlite::types::Type::Text,
        format!("非法的 {} 值: {}", column, value).into(),
    )
}

/// 可空时间戳解码
pub fn parse_opt_ts(idx: usize, raw: Option<String>) -> rusqlite::Result<Option<NaiveDateTime>> {
    raw.map(|s| parse_ts(idx, &s)).transpose()
}
