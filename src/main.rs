// ==========================================
// 报名与事项审批核心 - 主入口
// ==========================================
// 职责: 初始化日志、打开数据库、装配 AppState 并输出概况
// ==========================================

use anyhow::{anyhow, Context};
use enrollment_core::app::{get_default_db_path, AppState};
use enrollment_core::logging;

fn main() -> anyhow::Result<()> {
    logging::init();

    tracing::info!("==================================================");
    tracing::info!("{} v{}", enrollment_core::APP_NAME, enrollment_core::VERSION);
    tracing::info!("==================================================");

    let db_path = std::env::args().nth(1).unwrap_or_else(get_default_db_path);
    tracing::info!("使用数据库: {}", db_path);

    let state = AppState::new(db_path).map_err(|e| anyhow!(e)).context("AppState 初始化失败")?;

    let pools = state.enrollment_api.list_pools(None).context("读取容量池失败")?;
    let config = state
        .config_manager
        .get_config_snapshot()
        .map_err(|e| anyhow!(e.to_string()))
        .context("读取配置失败")?;

    tracing::info!(pool_count = pools.len(), "容量池概况");
    for pool in &pools {
        tracing::info!(
            pool_id = %pool.pool_id,
            kind = %pool.kind,
            seats_remaining = pool.seats_remaining,
            total_seats = pool.total_seats,
            "{}",
            pool.name
        );
    }
    tracing::info!(config = %config, "当前配置");

    Ok(())
}
