//! 速率限制模块
//!
//! 基于滑动窗口的按标识符准入控制，用于在生成和下发验证码之前限制
//! 滥用及下游短信/邮件成本。
//!
//! 准入语义（见 [`RateLimiter::admit`]）：
//!
//! 1. 裁剪掉窗口之外的历史时间戳
//! 2. 若剩余计数已达上限，拒绝且**不记录**本次请求
//! 3. 否则记录当前时间并放行
//!
//! 检查与记录在同一把写锁内完成，对单个键而言是原子的。
//! 结果只是一个布尔裁决，没有错误类型；调用方（如 OTP 引擎）
//! 负责把拒绝映射为自己的限流错误。
//!
//! ## 示例
//!
//! ```rust
//! use otprs::rate_limit::{RateLimiter, RateLimitConfig};
//! use std::time::Duration;
//!
//! // 每 15 分钟最多 5 次请求
//! let limiter = RateLimiter::new(RateLimitConfig::for_otp_issue());
//!
//! let key = "alice@example.com";
//! assert!(limiter.admit(key));
//! ```

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use crate::clock::{Clock, SystemClock};

// ============================================================================
// 配置
// ============================================================================

/// 速率限制配置
#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    /// 窗口内允许的最大请求数
    pub max_requests: u32,
    /// 滑动窗口大小
    pub window: Duration,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self::for_otp_issue()
    }
}

impl RateLimitConfig {
    /// 创建新的配置
    pub fn new() -> Self {
        Self::default()
    }

    /// 设置最大请求数
    pub fn with_max_requests(mut self, max: u32) -> Self {
        self.max_requests = max;
        self
    }

    /// 设置时间窗口
    pub fn with_window(mut self, window: Duration) -> Self {
        self.window = window;
        self
    }

    /// 验证码签发场景的预设配置
    ///
    /// 每 15 分钟最多 5 次请求。
    pub fn for_otp_issue() -> Self {
        Self {
            max_requests: 5,
            window: Duration::from_secs(15 * 60),
        }
    }

    fn window_chrono(&self) -> ChronoDuration {
        ChronoDuration::seconds(self.window.as_secs() as i64)
    }
}

/// 速率限制状态信息（只读查询用，不记录请求）
#[derive(Debug, Clone)]
pub struct RateLimitInfo {
    /// 剩余请求次数
    pub remaining: u32,
    /// 总限制次数
    pub limit: u32,
    /// 距最旧一条记录滑出窗口、容量恢复一格的时间
    pub reset_after: Duration,
}

// ============================================================================
// 存储接口
// ============================================================================

/// 速率限制存储接口
///
/// 实现此 trait 以提供自定义的存储后端（如 Redis 等），
/// 从而在多实例部署时共享窗口状态。
pub trait RateLimitStore: Send + Sync {
    /// 检查并记录一次请求
    ///
    /// 返回 `true` 表示放行（且已记录），`false` 表示拒绝（未记录）。
    /// 对单个键而言，检查与记录必须是原子的。
    fn check_and_record(&self, key: &str, config: &RateLimitConfig, now: DateTime<Utc>) -> bool;

    /// 查询当前状态，不记录请求
    fn get_status(&self, key: &str, config: &RateLimitConfig, now: DateTime<Utc>) -> RateLimitInfo;

    /// 重置某个 key 的窗口
    fn reset(&self, key: &str);

    /// 清理窗口内已无记录的 key（内存回收，不影响语义）
    fn cleanup(&self, config: &RateLimitConfig, now: DateTime<Utc>) -> usize;
}

// ============================================================================
// 内存滑动窗口实现
// ============================================================================

/// 内存滑动窗口存储
///
/// 每个 key 维护一个有序的请求时间戳序列。适用于单实例部署。
#[derive(Debug, Default)]
pub struct InMemorySlidingWindowStore {
    windows: RwLock<HashMap<String, Vec<DateTime<Utc>>>>,
}

impl InMemorySlidingWindowStore {
    /// 创建新的内存存储
    pub fn new() -> Self {
        Self::default()
    }
}

impl RateLimitStore for InMemorySlidingWindowStore {
    fn check_and_record(&self, key: &str, config: &RateLimitConfig, now: DateTime<Utc>) -> bool {
        let mut windows = match self.windows.write() {
            Ok(w) => w,
            Err(_) => return false,
        };

        let timestamps = windows.entry(key.to_string()).or_default();

        // 裁剪窗口外的时间戳
        let cutoff = now - config.window_chrono();
        timestamps.retain(|&ts| ts > cutoff);

        if timestamps.len() as u32 >= config.max_requests {
            // 拒绝时不记录
            return false;
        }

        timestamps.push(now);
        true
    }

    fn get_status(&self, key: &str, config: &RateLimitConfig, now: DateTime<Utc>) -> RateLimitInfo {
        let windows = match self.windows.read() {
            Ok(w) => w,
            Err(_) => {
                return RateLimitInfo {
                    remaining: config.max_requests,
                    limit: config.max_requests,
                    reset_after: Duration::ZERO,
                };
            }
        };

        let cutoff = now - config.window_chrono();
        let in_window: Vec<DateTime<Utc>> = windows
            .get(key)
            .map(|ts| ts.iter().copied().filter(|&t| t > cutoff).collect())
            .unwrap_or_default();

        let count = in_window.len() as u32;
        let reset_after = in_window
            .iter()
            .min()
            .map(|&oldest| {
                let free_at = oldest + config.window_chrono();
                (free_at - now).to_std().unwrap_or(Duration::ZERO)
            })
            .unwrap_or(Duration::ZERO);

        RateLimitInfo {
            remaining: config.max_requests.saturating_sub(count),
            limit: config.max_requests,
            reset_after,
        }
    }

    fn reset(&self, key: &str) {
        if let Ok(mut windows) = self.windows.write() {
            windows.remove(key);
        }
    }

    fn cleanup(&self, config: &RateLimitConfig, now: DateTime<Utc>) -> usize {
        let Ok(mut windows) = self.windows.write() else {
            return 0;
        };
        let cutoff = now - config.window_chrono();
        let before = windows.len();
        windows.retain(|_, timestamps| timestamps.iter().any(|&ts| ts > cutoff));
        before - windows.len()
    }
}

// ============================================================================
// 速率限制器
// ============================================================================

/// 滑动窗口速率限制器
///
/// 必须在生成或下发任何验证码之前同步调用，以同时约束滥用和
/// 下游供应商成本。
pub struct RateLimiter {
    config: RateLimitConfig,
    store: Arc<dyn RateLimitStore>,
    clock: Arc<dyn Clock>,
}

impl RateLimiter {
    /// 使用默认内存存储创建限制器
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            config,
            store: Arc::new(InMemorySlidingWindowStore::new()),
            clock: Arc::new(SystemClock),
        }
    }

    /// 使用自定义存储创建限制器
    pub fn with_store<S: RateLimitStore + 'static>(config: RateLimitConfig, store: S) -> Self {
        Self {
            config,
            store: Arc::new(store),
            clock: Arc::new(SystemClock),
        }
    }

    /// 替换时间来源（测试中注入 [`crate::clock::ManualClock`]）
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// 检查是否放行一次请求
    ///
    /// 放行时记录本次请求；拒绝时不产生任何副作用。
    pub fn admit(&self, key: &str) -> bool {
        self.store
            .check_and_record(key, &self.config, self.clock.now())
    }

    /// 距离容量恢复一格的等待时间
    ///
    /// 窗口为空时返回零。
    pub fn retry_after(&self, key: &str) -> Duration {
        self.status(key).reset_after
    }

    /// 查询当前状态（不记录请求）
    pub fn status(&self, key: &str) -> RateLimitInfo {
        self.store.get_status(key, &self.config, self.clock.now())
    }

    /// 重置某个 key 的窗口
    pub fn reset(&self, key: &str) {
        self.store.reset(key);
    }

    /// 清理空闲的窗口记录，返回清理数量
    pub fn cleanup(&self) -> usize {
        self.store.cleanup(&self.config, self.clock.now())
    }

    /// 获取配置
    pub fn config(&self) -> &RateLimitConfig {
        &self.config
    }
}
