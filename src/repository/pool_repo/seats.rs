// ==========================================
// 席位原子操作（Enroll / Withdraw）
// ==========================================
// 并发模型:
// - IMMEDIATE 事务一开始就取得写锁，同一池上的并发调用在库层串行化
// - 条件 UPDATE 把“有空位、未报名、报名开放”三个检查与扣减合成一步，
//   affected_rows == 0 时才去诊断原因（诊断只读，不产生写入）
// ==========================================

use super::pools::PoolRepository;
use crate::db::format_ts;
use crate::domain::types::{EnrollmentStatus, PoolKind};
use crate::repository::error::{RepositoryError, RepositoryResult};
use chrono::NaiveDateTime;
use rusqlite::{params, OptionalExtension, Transaction, TransactionBehavior};

/// 报名结果（业务结果，不是错误）
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnrollOutcome {
    Enrolled { seats_remaining: u32, seq: i64 },
    AlreadyEnrolled { seats_remaining: u32 },
    PoolFull { seats_remaining: u32 },
    EnrollmentClosed { seats_remaining: u32 },
    PoolNotFound,
}

/// 退出结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WithdrawOutcome {
    Withdrawn { seats_remaining: u32 },
    NotEnrolled { seats_remaining: u32 },
    PoolNotFound,
}

impl PoolRepository {
    /// 原子报名：条件扣减席位 + 追加成员，同一事务提交
    ///
    /// # 参数
    /// - pool_id: 池ID
    /// - participant_id: 参与人ID
    /// - enrolled_at: 报名时间
    ///
    /// # 返回
    /// - Ok(EnrollOutcome): 业务结果（含当前剩余席位）
    /// - Err: 数据库错误（StoreBusy 可重试）
    pub fn try_enroll(
        &self,
        pool_id: &str,
        participant_id: &str,
        enrolled_at: NaiveDateTime,
    ) -> RepositoryResult<EnrollOutcome> {
        let mut conn = self.get_conn()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let updated = tx.execute(
            r#"
            UPDATE capacity_pool
            SET seats_remaining = seats_remaining - 1,
                member_seq = member_seq + 1,
                revision = revision + 1
            WHERE pool_id = ?1
              AND seats_remaining > 0
              AND (kind = 'PROGRAM' OR enrollment_open = 1)
              AND NOT EXISTS (
                  SELECT 1 FROM pool_member
                  WHERE pool_id = ?1 AND participant_id = ?2
              )
            "#,
            params![pool_id, participant_id],
        )?;

        if updated == 0 {
            // 未写入，事务随 drop 回滚
            return diagnose_enroll_rejection(&tx, pool_id, participant_id);
        }

        let (kind_str, seats_remaining, seq): (String, u32, i64) = tx.query_row(
            "SELECT kind, seats_remaining, member_seq FROM capacity_pool WHERE pool_id = ?1",
            params![pool_id],
            |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
        )?;

        let status = match PoolKind::parse(&kind_str) {
            Some(PoolKind::Training) => Some(EnrollmentStatus::Enrolled.to_db_str()),
            Some(PoolKind::Program) => None,
            None => {
                return Err(RepositoryError::FieldValueError {
                    field: "capacity_pool.kind".to_string(),
                    message: kind_str,
                })
            }
        };

        tx.execute(
            r#"
            INSERT INTO pool_member (pool_id, seq, participant_id, enrolled_at, status)
            VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
            params![pool_id, seq, participant_id, format_ts(&enrolled_at), status],
        )?;

        tx.commit()?;
        Ok(EnrollOutcome::Enrolled { seats_remaining, seq })
    }

    /// 原子退出：删除成员 + 归还席位，同一事务提交
    ///
    /// 与报名状态历史无关（缺席/已发证同样归还席位）
    pub fn try_withdraw(&self, pool_id: &str, participant_id: &str) -> RepositoryResult<WithdrawOutcome> {
        let mut conn = self.get_conn()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let deleted = tx.execute(
            "DELETE FROM pool_member WHERE pool_id = ?1 AND participant_id = ?2",
            params![pool_id, participant_id],
        )?;

        if deleted == 0 {
            let seats: Option<u32> = tx
                .query_row(
                    "SELECT seats_remaining FROM capacity_pool WHERE pool_id = ?1",
                    params![pool_id],
                    |row| row.get(0),
                )
                .optional()?;

            return Ok(match seats {
                Some(seats_remaining) => WithdrawOutcome::NotEnrolled { seats_remaining },
                None => WithdrawOutcome::PoolNotFound,
            });
        }

        let updated = tx.execute(
            r#"
            UPDATE capacity_pool
            SET seats_remaining = seats_remaining + 1,
                revision = revision + 1
            WHERE pool_id = ?1 AND seats_remaining < total_seats
            "#,
            params![pool_id],
        )?;

        if updated == 0 {
            // 成员存在但席位已满额，说明计数已损坏；回滚并上报
            return Err(RepositoryError::InternalError(format!(
                "席位计数与成员不一致: pool_id={}",
                pool_id
            )));
        }

        let seats_remaining: u32 = tx.query_row(
            "SELECT seats_remaining FROM capacity_pool WHERE pool_id = ?1",
            params![pool_id],
            |row| row.get(0),
        )?;

        tx.commit()?;
        Ok(WithdrawOutcome::Withdrawn { seats_remaining })
    }
}

/// 条件扣减未命中时诊断原因（只读）
///
/// 优先级: 池不存在 > 已报名 > 报名未开放 > 已满
fn diagnose_enroll_rejection(
    tx: &Transaction<'_>,
    pool_id: &str,
    participant_id: &str,
) -> RepositoryResult<EnrollOutcome> {
    let pool: Option<(String, u32, bool)> = tx
        .query_row(
            "SELECT kind, seats_remaining, enrollment_open FROM capacity_pool WHERE pool_id = ?1",
            params![pool_id],
            |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
        )
        .optional()?;

    let Some((kind_str, seats_remaining, enrollment_open)) = pool else {
        return Ok(EnrollOutcome::PoolNotFound);
    };

    let already: bool = tx.query_row(
        "SELECT EXISTS(SELECT 1 FROM pool_member WHERE pool_id = ?1 AND participant_id = ?2)",
        params![pool_id, participant_id],
        |row| row.get(0),
    )?;

    if already {
        return Ok(EnrollOutcome::AlreadyEnrolled { seats_remaining });
    }

    if PoolKind::parse(&kind_str) == Some(PoolKind::Training) && !enrollment_open {
        return Ok(EnrollOutcome::EnrollmentClosed { seats_remaining });
    }

    Ok(EnrollOutcome::PoolFull { seats_remaining })
}
