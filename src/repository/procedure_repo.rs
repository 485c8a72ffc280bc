// ==========================================
// 报名与事项审批核心 - 行政事项数据仓储
// ==========================================
// 红线: Repository 不含业务逻辑
// 并发: 事项主记录走 revision 乐观锁；附件/备注为子表追加，
//       在 IMMEDIATE 事务内分配 seq，不改主记录 revision
// ==========================================

mod children;
mod records;
mod queries;

#[cfg(test)]
mod tests;

pub use children::AttachOutcome;
pub use records::ProcedureRepository;
