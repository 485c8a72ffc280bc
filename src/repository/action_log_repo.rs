// ==========================================
// 报名与事项审批核心 - 操作日志数据仓储
// ==========================================
// 红线: 所有写入必须记录
// 说明: 日志只追加，不提供更新/删除
// ==========================================

mod core;
mod queries;

#[cfg(test)]
mod tests;

pub use self::core::ActionLogRepository;
