// ==========================================
// 报名与事项审批核心 - 容量池数据仓储
// ==========================================
// 红线: Repository 不含业务逻辑
// 红线: 席位检查与“加成员、减席位”必须是同一个原子写入，禁止先读后写
// ==========================================

mod pools;
mod members;
mod seats;


pub use pools::{PoolDeleteOutcome, PoolRepository};
pub use members::RosterRow;
pub use seats::{EnrollOutcome, WithdrawOutcome};
