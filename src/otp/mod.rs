//! OTP（一次性验证码）生命周期模块
//!
//! 提供验证码的生成、带过期的存储、限次验证与消费的完整生命周期。
//!
//! ## 设计原则
//!
//! 本模块只负责验证码的生成和验证状态机，**不包含**实际的邮件/短信发送；
//! 发送由应用层通过 [`crate::dispatch::DeliveryDispatcher`] 契约对接
//! 第三方服务完成。下发失败不会回滚已存储的验证码记录——重发就是再一次
//! `issue`，它会原子地覆盖旧记录。
//!
//! ## 工作流程
//!
//! 1. 调用方为某个标识符请求验证码
//! 2. 标识符规范化校验 → 限流器准入 → 生成并存储验证码
//! 3. 应用层把验证码发送给用户
//! 4. 用户提交验证码，[`OtpEngine::verify`] 给出裁决并完成状态转移
//!
//! ## 示例
//!
//! ```rust
//! use otprs::otp::{OtpEngine, OtpConfig, Purpose};
//!
//! let engine = OtpEngine::new(OtpConfig::default());
//!
//! let issued = engine.issue("user@example.com", Purpose::SignIn).unwrap();
//!
//! // 应用层发送 issued.code 给用户……
//!
//! let verification = engine
//!     .verify("user@example.com", &issued.code, true)
//!     .unwrap();
//! assert_eq!(verification.purpose, Purpose::SignIn);
//! assert!(verification.consumed);
//! ```

pub mod engine;
pub mod store;

pub use engine::{
    CodeSource, DispatchOutcome, IssuedOtp, OtpConfig, OtpEngine, OtpStatus, RandomCodeSource,
    Verification,
};
pub use store::{InMemoryOtpStore, OtpRecord, OtpStore};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// 验证码用途
///
/// 验证成功后返回给调用方，供其路由后续逻辑（如登录建会话、
/// 重置密码进入第二阶段）。
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Purpose {
    /// 登录
    SignIn,
    /// 密码重置
    PasswordReset,
    /// 调用方自定义用途
    Tag(String),
}

impl std::fmt::Display for Purpose {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Purpose::SignIn => write!(f, "signin"),
            Purpose::PasswordReset => write!(f, "password_reset"),
            Purpose::Tag(tag) => write!(f, "{}", tag),
        }
    }
}

impl std::str::FromStr for Purpose {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "" => Err(Error::validation("purpose cannot be empty")),
            "signin" => Ok(Purpose::SignIn),
            "password_reset" => Ok(Purpose::PasswordReset),
            other => Ok(Purpose::Tag(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_purpose_display() {
        assert_eq!(Purpose::SignIn.to_string(), "signin");
        assert_eq!(Purpose::PasswordReset.to_string(), "password_reset");
        assert_eq!(Purpose::Tag("invite".to_string()).to_string(), "invite");
    }

    #[test]
    fn test_purpose_parse_roundtrip() {
        assert_eq!("signin".parse::<Purpose>().unwrap(), Purpose::SignIn);
        assert_eq!(
            "password_reset".parse::<Purpose>().unwrap(),
            Purpose::PasswordReset
        );
        assert_eq!(
            "invite".parse::<Purpose>().unwrap(),
            Purpose::Tag("invite".to_string())
        );
        assert!("".parse::<Purpose>().is_err());
    }
}
