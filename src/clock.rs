//! 时钟抽象模块
//!
//! 所有带过期语义的记录（OTP 记录、限流窗口、握手 state）都通过注入的
//! [`Clock`] 读取当前时间，而不是直接调用 `Utc::now()`。过期采用被动判定：
//! 记录只存储 `expires_at`，读取时超过该时间即视为不存在，配合可选的
//! 定期清理回收内存。没有任何按记录调度的定时器。
//!
//! ## 示例
//!
//! ```rust
//! use otprs::clock::{Clock, ManualClock};
//! use chrono::Duration;
//!
//! let clock = ManualClock::starting_now();
//! let before = clock.now();
//!
//! // 测试中可以直接拨快时间
//! clock.advance(Duration::minutes(10));
//! assert_eq!(clock.now() - before, Duration::minutes(10));
//! ```

use chrono::{DateTime, Duration, Utc};
use std::sync::{Arc, RwLock};

/// 时间来源抽象
///
/// 生产环境使用 [`SystemClock`]；测试中使用 [`ManualClock`]
/// 以确定性地模拟 TTL 过期和限流窗口滑动。
pub trait Clock: Send + Sync {
    /// 返回当前时间
    fn now(&self) -> DateTime<Utc>;
}

/// 系统时钟（默认实现）
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// 手动时钟
///
/// 内部共享可变时间点，克隆后指向同一时间源，便于在测试中同时注入
/// 多个组件并统一拨动。
#[derive(Debug, Clone)]
pub struct ManualClock {
    current: Arc<RwLock<DateTime<Utc>>>,
}

impl ManualClock {
    /// 以指定时间点创建
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            current: Arc::new(RwLock::new(start)),
        }
    }

    /// 以系统当前时间创建
    pub fn starting_now() -> Self {
        Self::new(Utc::now())
    }

    /// 向前拨动时间
    pub fn advance(&self, delta: Duration) {
        let mut current = self.current.write().unwrap();
        *current = *current + delta;
    }

    /// 直接设置时间
    pub fn set(&self, instant: DateTime<Utc>) {
        *self.current.write().unwrap() = instant;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.current.read().unwrap()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_system_clock_is_monotonic_enough() {
        let clock = SystemClock;
        let a = clock.now();
        let b = clock.now();
        assert!(b >= a);
    }

    #[test]
    fn test_manual_clock_advance() {
        let clock = ManualClock::starting_now();
        let start = clock.now();

        clock.advance(Duration::minutes(15));
        assert_eq!(clock.now(), start + Duration::minutes(15));

        // 克隆共享同一时间源
        let cloned = clock.clone();
        cloned.advance(Duration::seconds(1));
        assert_eq!(clock.now(), start + Duration::minutes(15) + Duration::seconds(1));
    }

    #[test]
    fn test_manual_clock_set() {
        let clock = ManualClock::starting_now();
        let target = clock.now() + Duration::hours(2);
        clock.set(target);
        assert_eq!(clock.now(), target);
    }
}
