//! OTP 生命周期引擎
//!
//! 编排标识符校验、限流准入、验证码生成与存储，并定义验证状态机。
//!
//! ## 验证状态机
//!
//! `verify` 按以下固定顺序检查（过期先于尝试次数判定）：
//!
//! 1. 记录不存在 → `NotFound`
//! 2. 已过期 → 删除记录，`Expired`
//! 3. 尝试次数已达上限 → 删除记录，`AttemptsExhausted`
//! 4. 验证码不匹配 → 计数加一，记录保持存活，`Mismatch { remaining }`
//! 5. 匹配：`consume_on_success` 为真则删除记录（消费），否则仅标记
//!    `verified` 并保留记录，等待后续的消费式调用或自然过期
//!
//! 非消费式验证服务于两阶段流程（如密码重置）：第一阶段确认验证码
//! 有效，第二阶段执行真正的变更动作而无需用户重新输入验证码。
//! 处于已验证待消费状态的记录依旧按原 TTL 过期，错误尝试也照常计数。
//!
//! ## 示例
//!
//! ```rust
//! use otprs::otp::{OtpEngine, OtpConfig, Purpose};
//! use otprs::error::{Error, VerifyError};
//!
//! let engine = OtpEngine::new(OtpConfig::default());
//!
//! let issued = engine.issue("user@example.com", Purpose::SignIn).unwrap();
//!
//! // 错误的验证码消耗一次尝试
//! let err = engine.verify("user@example.com", "000000", true).unwrap_err();
//! assert!(matches!(err, Error::Verify(VerifyError::Mismatch { remaining: 2 })));
//!
//! // 正确的验证码验证并消费
//! let verification = engine.verify("user@example.com", &issued.code, true).unwrap();
//! assert_eq!(verification.purpose, Purpose::SignIn);
//! ```

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use super::store::{InMemoryOtpStore, OtpRecord, OtpStore};
use super::Purpose;
use crate::clock::{Clock, SystemClock};
use crate::dispatch::DeliveryDispatcher;
use crate::error::{Error, Result, ValidationError, VerifyError};
use crate::identifier::{Identifier, PhoneScheme};
use crate::random::{constant_time_compare_str, generate_numeric_code};
use crate::rate_limit::{RateLimitConfig, RateLimiter};

// ============================================================================
// 配置
// ============================================================================

/// OTP 引擎配置
#[derive(Debug, Clone)]
pub struct OtpConfig {
    /// 验证码位数
    pub code_length: usize,

    /// 验证码有效期，创建时固定，不再延长
    pub ttl: Duration,

    /// 最大错误尝试次数（达到后记录作废）
    pub max_attempts: u32,
}

impl Default for OtpConfig {
    fn default() -> Self {
        Self {
            code_length: 6,
            ttl: Duration::from_secs(10 * 60),
            max_attempts: 3,
        }
    }
}

impl OtpConfig {
    /// 创建新配置
    pub fn new() -> Self {
        Self::default()
    }

    /// 设置验证码位数
    pub fn with_code_length(mut self, length: usize) -> Self {
        assert!(
            (4..=10).contains(&length),
            "code length must be between 4 and 10"
        );
        self.code_length = length;
        self
    }

    /// 设置有效期
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    /// 设置最大尝试次数
    pub fn with_max_attempts(mut self, max: u32) -> Self {
        assert!(max > 0, "max attempts must be positive");
        self.max_attempts = max;
        self
    }

    /// 高安全性配置
    ///
    /// - 8 位验证码
    /// - 3 分钟过期
    /// - 最多 3 次尝试
    pub fn high_security() -> Self {
        Self {
            code_length: 8,
            ttl: Duration::from_secs(3 * 60),
            max_attempts: 3,
        }
    }

    /// 宽松配置（适用于开发/测试）
    pub fn relaxed() -> Self {
        Self {
            code_length: 4,
            ttl: Duration::from_secs(30 * 60),
            max_attempts: 10,
        }
    }

    fn ttl_chrono(&self) -> ChronoDuration {
        ChronoDuration::seconds(self.ttl.as_secs() as i64)
    }
}

// ============================================================================
// 验证码来源
// ============================================================================

/// 验证码来源抽象
///
/// 默认实现 [`RandomCodeSource`] 使用 CSPRNG；测试中可注入固定来源
/// 以获得确定性的端到端场景。
pub trait CodeSource: Send + Sync {
    /// 生成下一个指定位数的数字验证码
    fn next_code(&self, length: usize) -> String;
}

/// 密码学安全的随机验证码来源（默认）
#[derive(Debug, Clone, Copy, Default)]
pub struct RandomCodeSource;

impl CodeSource for RandomCodeSource {
    fn next_code(&self, length: usize) -> String {
        generate_numeric_code(length)
    }
}

// ============================================================================
// 数据结构
// ============================================================================

/// 一次签发的结果
#[derive(Debug, Clone)]
pub struct IssuedOtp {
    /// 规范化后的标识符
    pub identifier: Identifier,

    /// 生成的验证码，由调用方交给下发通道
    pub code: String,

    /// 签发用途
    pub purpose: Purpose,

    /// 创建时间
    pub created_at: DateTime<Utc>,

    /// 过期时间
    pub expires_at: DateTime<Utc>,
}

/// 签发并尝试下发的结果
///
/// 下发失败不回滚记录：`issued` 始终有效，调用方可引导用户走重发路径。
#[derive(Debug, Clone)]
pub struct DispatchOutcome {
    /// 已签发的验证码
    pub issued: IssuedOtp,

    /// 下发是否成功
    pub delivered: bool,
}

/// 验证成功的结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Verification {
    /// 记录签发时的用途，供调用方路由后续逻辑
    pub purpose: Purpose,

    /// 记录是否已被本次调用消费删除
    pub consumed: bool,
}

/// 只读的记录状态快照（不触发任何状态转移）
#[derive(Debug, Clone)]
pub struct OtpStatus {
    /// 签发用途
    pub purpose: Purpose,

    /// 已发生的错误尝试次数
    pub attempts: u32,

    /// 剩余尝试次数
    pub remaining_attempts: u32,

    /// 过期时间
    pub expires_at: DateTime<Utc>,

    /// 是否处于已验证待消费状态
    pub verified: bool,
}

// ============================================================================
// 引擎
// ============================================================================

/// OTP 生命周期引擎
///
/// 持有验证码账本、限流器、时钟和验证码来源，是所有 OTP 状态的唯一
/// 所有者。所有状态转移都在本引擎内同步完成，不会出现可观测的
/// 半更新记录。
pub struct OtpEngine<S: OtpStore = InMemoryOtpStore> {
    store: S,
    limiter: RateLimiter,
    clock: Arc<dyn Clock>,
    codes: Arc<dyn CodeSource>,
    scheme: PhoneScheme,
    config: OtpConfig,
}

impl OtpEngine<InMemoryOtpStore> {
    /// 使用默认内存账本创建引擎
    pub fn new(config: OtpConfig) -> Self {
        Self::with_store(InMemoryOtpStore::new(), config)
    }

    /// 使用默认配置创建引擎
    pub fn with_default_config() -> Self {
        Self::new(OtpConfig::default())
    }
}

impl<S: OtpStore> OtpEngine<S> {
    /// 使用自定义账本创建引擎
    pub fn with_store(store: S, config: OtpConfig) -> Self {
        Self {
            store,
            limiter: RateLimiter::new(RateLimitConfig::for_otp_issue()),
            clock: Arc::new(SystemClock),
            codes: Arc::new(RandomCodeSource),
            scheme: PhoneScheme::default(),
            config,
        }
    }

    /// 替换限流器
    ///
    /// 如之后还要调用 [`with_clock`](Self::with_clock)，请先设置限流器，
    /// 时钟会一并应用到当前限流器上。
    pub fn with_rate_limiter(mut self, limiter: RateLimiter) -> Self {
        self.limiter = limiter;
        self
    }

    /// 替换时间来源（同时应用于内部限流器）
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.limiter = self.limiter.with_clock(clock.clone());
        self.clock = clock;
        self
    }

    /// 替换验证码来源
    pub fn with_code_source(mut self, codes: Arc<dyn CodeSource>) -> Self {
        self.codes = codes;
        self
    }

    /// 替换手机号编号方案
    pub fn with_phone_scheme(mut self, scheme: PhoneScheme) -> Self {
        self.scheme = scheme;
        self
    }

    /// 获取配置
    pub fn config(&self) -> &OtpConfig {
        &self.config
    }

    /// 为标识符签发一个新验证码
    ///
    /// 依次执行：标识符规范化校验 → 限流准入 → 生成验证码 →
    /// 覆盖写入账本。限流检查必须发生在任何生成动作之前；被拒绝时
    /// 返回 [`Error::RateLimitExceeded`] 并携带重试等待时间。
    ///
    /// 覆盖写入意味着该标识符之前未消费的验证码立即作废。
    pub fn issue(&self, identifier: &str, purpose: Purpose) -> Result<IssuedOtp> {
        let identifier = Identifier::parse_with_scheme(identifier, &self.scheme)?;
        let key = identifier.canonical().to_string();

        if !self.limiter.admit(&key) {
            return Err(Error::rate_limited(self.limiter.retry_after(&key)));
        }

        let code = self.codes.next_code(self.config.code_length);
        let created_at = self.clock.now();
        let expires_at = created_at + self.config.ttl_chrono();

        self.store.save(
            &key,
            OtpRecord {
                code: code.clone(),
                purpose: purpose.clone(),
                attempts: 0,
                created_at,
                expires_at,
                verified: false,
            },
        )?;

        debug!(identifier = %key, %purpose, "otp issued");

        Ok(IssuedOtp {
            identifier,
            code,
            purpose,
            created_at,
            expires_at,
        })
    }

    /// 签发并通过下发通道发送验证码
    ///
    /// 下发失败被视作"签发成功、下发失败"：记录不回滚，失败细节记入
    /// 日志，调用方通过 [`DispatchOutcome::delivered`] 得知结果。
    /// 重发路径就是再次调用本方法，它会原子地覆盖旧记录。
    pub async fn issue_and_dispatch(
        &self,
        identifier: &str,
        purpose: Purpose,
        dispatcher: &dyn DeliveryDispatcher,
    ) -> Result<DispatchOutcome> {
        let issued = self.issue(identifier, purpose)?;

        let delivered = match dispatcher
            .dispatch(&issued.identifier, &issued.purpose, &issued.code)
            .await
        {
            Ok(()) => true,
            Err(e) => {
                warn!(identifier = %issued.identifier, error = %e, "otp delivery failed");
                false
            }
        };

        Ok(DispatchOutcome { issued, delivered })
    }

    /// 验证用户提交的验证码
    ///
    /// 使用常量时间比较防止时序攻击。格式不合法的验证码（位数或字符
    /// 不对）在触碰账本之前即被拒绝，不消耗尝试次数。
    ///
    /// `consume_on_success` 为真时，验证成功即删除记录（一次完成）；
    /// 为假时仅标记 `verified`，记录保留到被消费式调用删除或过期，
    /// 供两阶段流程使用。
    pub fn verify(
        &self,
        identifier: &str,
        submitted_code: &str,
        consume_on_success: bool,
    ) -> Result<Verification> {
        let identifier = Identifier::parse_with_scheme(identifier, &self.scheme)?;
        let key = identifier.canonical();

        if submitted_code.len() != self.config.code_length
            || !submitted_code.chars().all(|c| c.is_ascii_digit())
        {
            return Err(Error::Validation(ValidationError::MalformedCode {
                expected_length: self.config.code_length,
            }));
        }

        let now = self.clock.now();
        let record = self
            .store
            .get(key)?
            .ok_or(Error::Verify(VerifyError::NotFound))?;

        // 过期先于尝试次数判定
        if record.is_expired(now) {
            self.store.delete(key)?;
            return Err(Error::Verify(VerifyError::Expired));
        }

        if record.attempts >= self.config.max_attempts {
            self.store.delete(key)?;
            return Err(Error::Verify(VerifyError::AttemptsExhausted));
        }

        if !constant_time_compare_str(submitted_code, &record.code) {
            self.store.increment_attempts(key)?;
            let remaining = self.config.max_attempts - (record.attempts + 1);
            return Err(Error::Verify(VerifyError::Mismatch { remaining }));
        }

        let consumed = if consume_on_success {
            self.store.delete(key)?;
            true
        } else {
            self.store.mark_verified(key)?;
            false
        };

        Ok(Verification {
            purpose: record.purpose,
            consumed,
        })
    }

    /// 撤销标识符当前的验证码（幂等）
    pub fn revoke(&self, identifier: &str) -> Result<()> {
        let identifier = Identifier::parse_with_scheme(identifier, &self.scheme)?;
        self.store.delete(identifier.canonical())
    }

    /// 只读查询当前记录状态
    ///
    /// 已过期的记录按不存在处理（被动过期语义），但不在此处删除。
    pub fn status(&self, identifier: &str) -> Result<Option<OtpStatus>> {
        let identifier = Identifier::parse_with_scheme(identifier, &self.scheme)?;
        let now = self.clock.now();

        Ok(self
            .store
            .get(identifier.canonical())?
            .filter(|record| !record.is_expired(now))
            .map(|record| OtpStatus {
                remaining_attempts: self.config.max_attempts.saturating_sub(record.attempts),
                purpose: record.purpose,
                attempts: record.attempts,
                expires_at: record.expires_at,
                verified: record.verified,
            }))
    }

    /// 清理过期记录（时间驱动，与任何 verify 调用无关）
    ///
    /// 与前台删除并发安全：对已被删除的记录是无操作。
    pub fn sweep_expired(&self) -> Result<usize> {
        let swept = self.store.cleanup_expired(self.clock.now())?;
        if swept > 0 {
            debug!(count = swept, "swept expired otp records");
        }
        Ok(swept)
    }
}
