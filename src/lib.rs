//! # OtpRS
//!
//! 一次性验证码（OTP）生命周期引擎与联合登录握手库。
//!
//! ## 功能特性
//!
//! - **验证码生成**: 密码学安全的定长数字验证码
//! - **验证码存储**: 带过期与尝试预算的单记录账本
//! - **验证码校验**: 常量时间比较、过期优先、尝试耗尽即作废
//! - **速率限制**: 按标识符的滑动窗口限流，防止验证码轰炸
//! - **标识符归一化**: 邮箱与多种手机号书写形式归一为规范键
//! - **联合登录**: OAuth 授权码 + 单次使用 state 的防伪握手
//! - **可注入时钟**: 所有过期判定经由 [`Clock`] 契约，测试可控
//!
//! ## 快速开始
//!
//! ```rust
//! use otprs::otp::{OtpEngine, Purpose};
//!
//! let engine = OtpEngine::with_default_config();
//!
//! // 签发：同一标识符重复签发会覆盖旧记录
//! let issued = engine.issue("user@example.com", Purpose::SignIn).unwrap();
//! assert_eq!(issued.code.len(), 6);
//!
//! // 校验：成功即消费，验证码不可重放
//! let verification = engine.verify("user@example.com", &issued.code, true).unwrap();
//! assert_eq!(verification.purpose, Purpose::SignIn);
//! assert!(verification.consumed);
//! ```
//!
//! ## 速率限制示例
//!
//! ```rust
//! use otprs::rate_limit::{RateLimitConfig, RateLimiter};
//!
//! // 默认策略：15 分钟窗口内最多 5 次签发
//! let limiter = RateLimiter::new(RateLimitConfig::for_otp_issue());
//!
//! for _ in 0..5 {
//!     assert!(limiter.admit("user@example.com"));
//! }
//! assert!(!limiter.admit("user@example.com"));
//! ```
//!
//! ## 标识符归一化示例
//!
//! ```rust
//! use otprs::identifier::Identifier;
//!
//! // 三种手机号书写形式归一为同一个规范键
//! let a = Identifier::parse("98912345678").unwrap();
//! let b = Identifier::parse("0912345678").unwrap();
//! let c = Identifier::parse("912345678").unwrap();
//! assert_eq!(a.canonical(), "+98912345678");
//! assert_eq!(a, b);
//! assert_eq!(b, c);
//! ```

pub mod clock;
pub mod dispatch;
pub mod error;
pub mod federation;
pub mod identifier;
pub mod otp;
pub mod random;
pub mod rate_limit;

pub use error::{Error, Result};

// ============================================================================
// 时钟与随机数导出
// ============================================================================

pub use clock::{Clock, ManualClock, SystemClock};
pub use random::{
    constant_time_compare, constant_time_compare_str, generate_numeric_code,
    generate_random_base64_url, generate_random_bytes, generate_state_token,
};

// ============================================================================
// 标识符相关导出
// ============================================================================

pub use identifier::{Identifier, PhoneScheme};

// ============================================================================
// OTP 相关导出
// ============================================================================

pub use otp::engine::{
    CodeSource, DispatchOutcome, IssuedOtp, OtpConfig, OtpEngine, OtpStatus, RandomCodeSource,
    Verification,
};
pub use otp::store::{InMemoryOtpStore, OtpRecord, OtpStore};
pub use otp::Purpose;

pub use dispatch::DeliveryDispatcher;

// ============================================================================
// 速率限制相关导出
// ============================================================================

pub use rate_limit::{
    InMemorySlidingWindowStore, RateLimitConfig, RateLimitInfo, RateLimitStore, RateLimiter,
};

// ============================================================================
// 联合登录相关导出
// ============================================================================

pub use federation::{
    Handshake, HandshakeConfig, HandshakeManager, HandshakeOutcome, IdentityDirectory,
    IdentityProvider, InMemoryStateStore, ProviderConfig, StateStore,
};
