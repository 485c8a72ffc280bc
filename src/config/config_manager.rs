// ==========================================
// 报名与事项审批核心 - 配置管理器
// ==========================================
// 职责: 配置加载、查询、覆写管理
// 存储: config_kv 表 (key-value + scope)
// 说明: 缺失或无法解析的值一律回落到默认值，并打 warn 日志
// ==========================================

use crate::db::open_sqlite_connection;
use crate::engine::retry::RetryPolicy;
use rusqlite::{params, Connection, OptionalExtension};
use serde_json::json;
use std::collections::BTreeMap;
use std::error::Error;
use std::str::FromStr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

// ==========================================
// ConfigManager - 配置管理器
// ==========================================
pub struct ConfigManager {
    conn: Arc<Mutex<Connection>>,
}

impl ConfigManager {
    /// 创建新的 ConfigManager 实例
    ///
    /// # 参数
    /// - db_path: 数据库文件路径
    pub fn new(db_path: &str) -> Result<Self, Box<dyn Error>> {
        let conn = open_sqlite_connection(db_path)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// 从已有连接创建 ConfigManager
    ///
    /// 说明：为保证连接行为一致，会对传入连接再次应用统一 PRAGMA（幂等）。
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> Result<Self, Box<dyn Error>> {
        {
            let conn_guard = conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;
            crate::db::configure_sqlite_connection(&conn_guard)?;
        }

        Ok(Self { conn })
    }

    /// 从 config_kv 表读取配置值（scope_id='global'）
    ///
    /// # 返回
    /// - Some(String): 配置值
    /// - None: 配置不存在
    pub fn get_global_config_value(&self, key: &str) -> Result<Option<String>, Box<dyn Error>> {
        let conn = self.conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;

        let value = conn
            .query_row(
                "SELECT value FROM config_kv WHERE scope_id = 'global' AND key = ?1",
                params![key],
                |row| row.get::<_, String>(0),
            )
            .optional()?;

        Ok(value)
    }

    /// 写入 global 配置（存在则覆盖）
    pub fn set_global_config_value(&self, key: &str, value: &str) -> Result<(), Box<dyn Error>> {
        let conn = self.conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;

        conn.execute(
            r#"INSERT INTO config_kv (scope_id, key, value, updated_at)
               VALUES ('global', ?1, ?2, datetime('now'))
               ON CONFLICT(scope_id, key) DO UPDATE SET value = ?2, updated_at = datetime('now')"#,
            params![key, value],
        )?;

        tracing::info!(key = %key, value = %value, "配置已更新");
        Ok(())
    }

    /// 读取并解析配置，缺失或格式错误时返回默认值
    fn get_parsed_or_default<T>(&self, key: &str, default: T) -> Result<T, Box<dyn Error>>
    where
        T: FromStr + Copy,
    {
        match self.get_global_config_value(key)? {
            Some(raw) => match raw.trim().parse::<T>() {
                Ok(v) => Ok(v),
                Err(_) => {
                    tracing::warn!(key = %key, raw = %raw, "配置值无法解析，使用默认值");
                    Ok(default)
                }
            },
            None => Ok(default),
        }
    }

    /// 获取所有配置的快照（JSON格式，键有序）
    pub fn get_config_snapshot(&self) -> Result<String, Box<dyn Error>> {
        let conn = self.conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;

        let mut stmt =
            conn.prepare("SELECT key, value FROM config_kv WHERE scope_id = 'global' ORDER BY key")?;

        let mut config_map: BTreeMap<String, String> = BTreeMap::new();
        let rows = stmt.query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)))?;

        for row in rows {
            let (key, value) = row?;
            config_map.insert(key, value);
        }

        Ok(serde_json::to_string(&json!(config_map))?)
    }

    // ===== 存储重试 =====

    /// 获取存储层重试策略
    pub fn retry_policy(&self) -> Result<RetryPolicy, Box<dyn Error>> {
        let defaults = RetryPolicy::default();

        let max_attempts =
            self.get_parsed_or_default(config_keys::RETRY_MAX_ATTEMPTS, defaults.max_attempts)?;
        let base_delay_ms = self.get_parsed_or_default(
            config_keys::RETRY_BASE_DELAY_MS,
            defaults.base_delay.as_millis() as u64,
        )?;
        let max_jitter_ms = self.get_parsed_or_default(
            config_keys::RETRY_MAX_JITTER_MS,
            defaults.max_jitter.as_millis() as u64,
        )?;

        Ok(RetryPolicy {
            max_attempts: max_attempts.max(1),
            base_delay: Duration::from_millis(base_delay_ms),
            max_jitter: Duration::from_millis(max_jitter_ms),
        })
    }

    // ===== 花名册分页 =====

    /// 默认每页条数
    pub fn get_default_page_size(&self) -> Result<usize, Box<dyn Error>> {
        let size = self.get_parsed_or_default(config_keys::ROSTER_DEFAULT_PAGE_SIZE, 20usize)?;
        Ok(size.max(1))
    }

    /// 每页条数上限
    pub fn get_max_page_size(&self) -> Result<usize, Box<dyn Error>> {
        let size = self.get_parsed_or_default(config_keys::ROSTER_MAX_PAGE_SIZE, 200usize)?;
        Ok(size.max(1))
    }

    /// 事项列表每页条数上限
    pub fn get_procedure_max_page_size(&self) -> Result<usize, Box<dyn Error>> {
        let size = self.get_parsed_or_default(config_keys::PROCEDURE_MAX_PAGE_SIZE, 200usize)?;
        Ok(size.max(1))
    }

    // ===== 导出 =====

    /// 导出使用的语言
    pub fn get_export_locale(&self) -> Result<String, Box<dyn Error>> {
        Ok(self
            .get_global_config_value(config_keys::EXPORT_LOCALE)?
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| crate::i18n::DEFAULT_LOCALE.to_string()))
    }
}

// ==========================================
// 配置键常量
// ==========================================
pub mod config_keys {
    // 存储重试
    pub const RETRY_MAX_ATTEMPTS: &str = "store/retry_max_attempts";
    pub const RETRY_BASE_DELAY_MS: &str = "store/retry_base_delay_ms";
    pub const RETRY_MAX_JITTER_MS: &str = "store/retry_max_jitter_ms";

    // 花名册
    pub const ROSTER_DEFAULT_PAGE_SIZE: &str = "roster/default_page_size";
    pub const ROSTER_MAX_PAGE_SIZE: &str = "roster/max_page_size";

    // 事项列表
    pub const PROCEDURE_MAX_PAGE_SIZE: &str = "procedure/max_page_size";

    // 导出
    pub const EXPORT_LOCALE: &str = "export/locale";
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup_manager() -> ConfigManager {
        let conn = Connection::open_in_memory().unwrap();
        crate::db::ensure_schema(&conn).unwrap();
        ConfigManager::from_connection(Arc::new(Mutex::new(conn))).unwrap()
    }

    #[test]
    fn test_defaults_when_absent() {
        let manager = setup_manager();

        let policy = manager.retry_policy().unwrap();
        assert_eq!(policy.max_attempts, 3);
        assert_eq!(manager.get_default_page_size().unwrap(), 20);
        assert_eq!(manager.get_max_page_size().unwrap(), 200);
        assert_eq!(manager.get_procedure_max_page_size().unwrap(), 200);
        assert_eq!(manager.get_export_locale().unwrap(), "zh-CN");
    }

    #[test]
    fn test_override_and_bad_value_fallback() {
        let manager = setup_manager();

        manager.set_global_config_value(config_keys::RETRY_MAX_ATTEMPTS, "5").unwrap();
        manager.set_global_config_value(config_keys::ROSTER_DEFAULT_PAGE_SIZE, "abc").unwrap();
        manager.set_global_config_value(config_keys::EXPORT_LOCALE, "en").unwrap();

        assert_eq!(manager.retry_policy().unwrap().max_attempts, 5);
        assert_eq!(manager.get_default_page_size().unwrap(), 20);
        assert_eq!(manager.get_export_locale().unwrap(), "en");

        let snapshot: serde_json::Value =
            serde_json::from_str(&manager.get_config_snapshot().unwrap()).unwrap();
        assert_eq!(snapshot["store/retry_max_attempts"], "5");
    }

    #[test]
    fn test_zero_attempts_clamped() {
        let manager = setup_manager();
        manager.set_global_config_value(config_keys::RETRY_MAX_ATTEMPTS, "0").unwrap();
        assert_eq!(manager.retry_policy().unwrap().max_attempts, 1);
    }
}
