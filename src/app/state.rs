// ==========================================
// 报名与事项审批核心 - 应用状态
// ==========================================
// 职责: 管理应用级别的共享状态和API实例
// 说明: 所有仓储共享同一个 Arc<Mutex<Connection>>；
//       其他进程/线程可各自打开同一数据库文件
// ==========================================

use rusqlite::Connection;
use std::sync::{Arc, Mutex};

use crate::api::{EnrollmentApi, ProcedureApi, RosterApi, RosterPaging};
use crate::collaborator::{BlobStore, IdentityDirectory, InMemoryBlobStore, InMemoryIdentityDirectory};
use crate::config::ConfigManager;
use crate::db;
use crate::engine::{LoggingNotifier, OptionalNotifier};
use crate::repository::{ActionLogRepository, PoolRepository, ProcedureRepository};

/// 数据库路径环境变量
pub const DB_PATH_ENV: &str = "ENROLLMENT_CORE_DB_PATH";

/// 外部协作方
#[derive(Clone)]
pub struct AppCollaborators {
    pub identity: Arc<dyn IdentityDirectory>,
    pub blob_store: Arc<dyn BlobStore>,
    pub notifier: OptionalNotifier,
}

impl AppCollaborators {
    /// 内存身份目录 + 内存对象存储 + 日志通知
    pub fn in_memory() -> Self {
        Self {
            identity: Arc::new(InMemoryIdentityDirectory::new()),
            blob_store: Arc::new(InMemoryBlobStore::new()),
            notifier: OptionalNotifier::with_sink(Arc::new(LoggingNotifier)),
        }
    }
}

/// 应用状态
///
/// 包含所有API实例和共享资源
pub struct AppState {
    /// 数据库路径
    pub db_path: String,

    /// 配置管理器
    pub config_manager: Arc<ConfigManager>,

    /// 报名API
    pub enrollment_api: Arc<EnrollmentApi>,

    /// 事项审批API
    pub procedure_api: Arc<ProcedureApi>,

    /// 花名册API
    pub roster_api: Arc<RosterApi>,
}

impl AppState {
    /// 使用内存协作方创建 AppState
    pub fn new(db_path: String) -> Result<Self, String> {
        Self::with_collaborators(db_path, AppCollaborators::in_memory())
    }

    /// 使用指定协作方创建 AppState
    pub fn with_collaborators(db_path: String, collaborators: AppCollaborators) -> Result<Self, String> {
        tracing::info!("初始化AppState，数据库路径: {}", db_path);

        let conn = db::open_and_init(&db_path).map_err(|e| format!("无法打开数据库: {}", e))?;
        if let Some(version) = db::read_schema_version(&conn).map_err(|e| format!("无法读取schema版本: {}", e))? {
            tracing::debug!(schema_version = version, "schema 就绪");
        }
        let conn: Arc<Mutex<Connection>> = Arc::new(Mutex::new(conn));

        // ==========================================
        // 配置
        // ==========================================
        let config_manager = Arc::new(
            ConfigManager::from_connection(conn.clone())
                .map_err(|e| format!("无法创建ConfigManager: {}", e))?,
        );
        let retry_policy = config_manager
            .retry_policy()
            .map_err(|e| format!("无法读取重试配置: {}", e))?;
        let paging = RosterPaging {
            default_page_size: config_manager
                .get_default_page_size()
                .map_err(|e| format!("无法读取分页配置: {}", e))?,
            max_page_size: config_manager
                .get_max_page_size()
                .map_err(|e| format!("无法读取分页配置: {}", e))?,
        };
        let procedure_max_page_size = config_manager
            .get_procedure_max_page_size()
            .map_err(|e| format!("无法读取分页配置: {}", e))?;
        let export_locale = config_manager
            .get_export_locale()
            .map_err(|e| format!("无法读取导出语言: {}", e))?;

        // ==========================================
        // Repository层
        // ==========================================
        let pool_repo = Arc::new(PoolRepository::from_connection(conn.clone()));
        let procedure_repo = Arc::new(ProcedureRepository::from_connection(conn.clone()));
        let action_log_repo = Arc::new(ActionLogRepository::new(conn));

        // ==========================================
        // API层
        // ==========================================
        let enrollment_api = Arc::new(EnrollmentApi::new(
            pool_repo.clone(),
            action_log_repo.clone(),
            collaborators.identity.clone(),
            collaborators.notifier.clone(),
            retry_policy,
        ));

        let procedure_api = Arc::new(ProcedureApi::new(
            procedure_repo,
            action_log_repo,
            collaborators.identity.clone(),
            collaborators.blob_store.clone(),
            collaborators.notifier.clone(),
            retry_policy,
            procedure_max_page_size,
        ));

        let roster_api = Arc::new(RosterApi::new(
            pool_repo,
            collaborators.identity,
            paging,
            export_locale,
        ));

        tracing::info!(
            notifier_configured = collaborators.notifier.is_configured(),
            "AppState初始化完成"
        );

        Ok(Self {
            db_path,
            config_manager,
            enrollment_api,
            procedure_api,
            roster_api,
        })
    }
}

/// 获取默认数据库路径
///
/// 优先读取 ENROLLMENT_CORE_DB_PATH，否则使用用户数据目录
pub fn get_default_db_path() -> String {
    use std::path::PathBuf;

    if let Ok(path) = std::env::var(DB_PATH_ENV) {
        let trimmed = path.trim();
        if !trimmed.is_empty() {
            return trimmed.to_string();
        }
    }

    let mut path = PathBuf::from("./enrollment_core.db");

    if let Some(data_dir) = dirs::data_dir() {
        let dir = data_dir.join("enrollment-core");
        match std::fs::create_dir_all(&dir) {
            Ok(()) => path = dir.join("enrollment_core.db"),
            Err(e) => tracing::warn!("无法创建数据目录 {}: {}，使用当前目录", dir.display(), e),
        }
    }

    path.to_string_lossy().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_default_db_path() {
        let path = get_default_db_path();
        assert!(!path.is_empty());
        assert!(path.ends_with(".db"));
    }

    #[test]
    fn test_app_state_initializes_schema() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let path = file.path().to_str().unwrap().to_string();

        let state = AppState::new(path.clone()).unwrap();
        assert_eq!(state.db_path, path);

        let conn = db::open_sqlite_connection(&path).unwrap();
        assert_eq!(db::read_schema_version(&conn).unwrap(), Some(db::CURRENT_SCHEMA_VERSION));
    }
}
