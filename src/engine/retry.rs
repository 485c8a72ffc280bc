// ==========================================
// 报名与事项审批核心 - 有界重试
// ==========================================
// 适用: 存储繁忙 (SQLITE_BUSY) 与乐观锁冲突
// 不适用: 业务规则结果（已满、已报名等），这些直接返回
// 退避: base_delay * 2^(attempt-1) + [0, max_jitter) 随机抖动
// ==========================================

use rand::Rng;
use std::time::Duration;

/// 重试策略
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// 总尝试次数（含首次），至少为 1
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_jitter: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(10),
            max_jitter: Duration::from_millis(25),
        }
    }
}

impl RetryPolicy {
    /// 不重试（单次尝试）
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            base_delay: Duration::ZERO,
            max_jitter: Duration::ZERO,
        }
    }

    /// 第 attempt 次失败后的等待时长（attempt 从 1 开始）
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exp = attempt.saturating_sub(1).min(16);
        let backoff = self.base_delay.saturating_mul(1u32 << exp);

        let jitter_ms = self.max_jitter.as_millis() as u64;
        let jitter = if jitter_ms == 0 {
            Duration::ZERO
        } else {
            Duration::from_millis(rand::thread_rng().gen_range(0..jitter_ms))
        };

        backoff + jitter
    }

    /// 执行操作，遇到可重试错误时退避后重来
    ///
    /// # 参数
    /// - operation: 日志中的操作名
    /// - is_retryable: 错误是否可重试
    /// - op: 被执行的闭包，入参为当前尝试序号（从 1 开始）
    ///
    /// # 返回
    /// - 首个成功结果，或最后一次的错误
    pub fn run<T, E, F, P>(&self, operation: &str, is_retryable: P, mut op: F) -> Result<T, E>
    where
        F: FnMut(u32) -> Result<T, E>,
        P: Fn(&E) -> bool,
        E: std::fmt::Display,
    {
        let max_attempts = self.max_attempts.max(1);
        let mut attempt = 1;

        loop {
            match op(attempt) {
                Ok(value) => return Ok(value),
                Err(e) if attempt < max_attempts && is_retryable(&e) => {
                    let delay = self.delay_for(attempt);
                    tracing::debug!(
                        operation = %operation,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "可重试错误，退避后重试"
                    );
                    std::thread::sleep(delay);
                    attempt += 1;
                }
                Err(e) => {
                    if attempt > 1 {
                        tracing::warn!(operation = %operation, attempt, error = %e, "重试结束仍失败");
                    }
                    return Err(e);
                }
            }
        }
    }
}
