//! 标识符规范化与校验模块
//!
//! 验证码签发和验证都以"标识符"（邮箱或手机号）为键。本模块负责在触碰
//! 限流器和验证码账本之前，把调用方输入的原始字符串规范化为唯一的
//! 标准形式，并拒绝所有不合法的输入。校验是纯函数，没有任何副作用。
//!
//! ## 规范化规则
//!
//! - **邮箱**: 去除首尾空白并转为小写；要求恰好一个 `@`、非空的本地部分、
//!   含 `.` 的域名。采用保守模式校验，不追求完整的 RFC 5322。
//! - **手机号**: 去掉所有非数字字符后，接受固定区域编号方案下的三种形式
//!   （含国家码共 11 位、本地 0 开头 10 位、裸 9 位用户号），
//!   统一规范化为 `+<国家码><9 位用户号>` 的 E.164 形式。
//!
//! ## 示例
//!
//! ```rust
//! use otprs::identifier::Identifier;
//!
//! let email = Identifier::parse("  User@Example.COM ").unwrap();
//! assert_eq!(email.canonical(), "user@example.com");
//!
//! // 三种手机号输入形式指向同一标准形式
//! let a = Identifier::parse("98 912 345 678").unwrap();
//! let b = Identifier::parse("0912-345-678").unwrap();
//! let c = Identifier::parse("912 345 678").unwrap();
//! assert_eq!(a.canonical(), "+98912345678");
//! assert_eq!(b.canonical(), a.canonical());
//! assert_eq!(c.canonical(), a.canonical());
//! ```

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result, ValidationError};

// ============================================================================
// 区域编号方案
// ============================================================================

/// 手机号编号方案
///
/// 固定为两位国家码加九位用户号。国家码可配置，默认 `98`。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhoneScheme {
    /// 国家码（两位数字，不含 `+`）
    pub country_code: String,
}

/// 用户号位数（不含国家码和前导 0）
const SUBSCRIBER_DIGITS: usize = 9;

impl Default for PhoneScheme {
    fn default() -> Self {
        Self {
            country_code: "98".to_string(),
        }
    }
}

impl PhoneScheme {
    /// 使用指定国家码创建编号方案
    pub fn new(country_code: impl Into<String>) -> Self {
        let country_code = country_code.into();
        assert!(
            country_code.len() == 2 && country_code.chars().all(|c| c.is_ascii_digit()),
            "country code must be two digits"
        );
        Self { country_code }
    }

    /// 规范化一个手机号输入为 E.164 形式
    ///
    /// 接受三种输入形式（忽略空格、连字符等非数字字符）：
    ///
    /// - `<国家码><9 位>`：共 11 位
    /// - `0<9 位>`：本地形式，共 10 位
    /// - `<9 位>`：裸用户号
    pub fn normalize(&self, raw: &str) -> Result<String> {
        let digits: String = raw.chars().filter(|c| c.is_ascii_digit()).collect();

        let subscriber = match digits.len() {
            11 if digits.starts_with(&self.country_code) => &digits[2..],
            10 if digits.starts_with('0') => &digits[1..],
            SUBSCRIBER_DIGITS => digits.as_str(),
            _ => {
                return Err(Error::Validation(ValidationError::InvalidPhone(
                    raw.to_string(),
                )));
            }
        };

        debug_assert_eq!(subscriber.len(), SUBSCRIBER_DIGITS);
        Ok(format!("+{}{}", self.country_code, subscriber))
    }
}

// ============================================================================
// 标识符
// ============================================================================

/// 已规范化的标识符
///
/// 构造唯一入口是 [`Identifier::parse`]，因此持有本类型即代表
/// 校验已通过、内部字符串已是标准形式。
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Identifier {
    /// 邮箱地址（小写、已去除空白）
    Email(String),
    /// E.164 形式的手机号（`+` 开头）
    Phone(String),
}

impl Identifier {
    /// 解析并规范化一个原始输入
    ///
    /// 含 `@` 的输入按邮箱处理，否则按默认编号方案的手机号处理。
    /// 任何校验失败返回 [`ValidationError`]，调用方必须在此之后
    /// 才能触碰限流器或账本。
    pub fn parse(raw: &str) -> Result<Self> {
        Self::parse_with_scheme(raw, &PhoneScheme::default())
    }

    /// 使用指定手机号编号方案解析
    pub fn parse_with_scheme(raw: &str, scheme: &PhoneScheme) -> Result<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(Error::Validation(ValidationError::EmptyField(
                "identifier".to_string(),
            )));
        }

        if trimmed.contains('@') {
            Ok(Identifier::Email(normalize_email(trimmed)?))
        } else {
            Ok(Identifier::Phone(scheme.normalize(trimmed)?))
        }
    }

    /// 返回标准形式字符串，作为账本和限流器的键
    pub fn canonical(&self) -> &str {
        match self {
            Identifier::Email(s) => s,
            Identifier::Phone(s) => s,
        }
    }

    /// 是否为邮箱标识符
    pub fn is_email(&self) -> bool {
        matches!(self, Identifier::Email(_))
    }

    /// 是否为手机号标识符
    pub fn is_phone(&self) -> bool {
        matches!(self, Identifier::Phone(_))
    }
}

impl std::fmt::Display for Identifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.canonical())
    }
}

// ============================================================================
// 邮箱校验
// ============================================================================

/// 规范化并校验邮箱
fn normalize_email(raw: &str) -> Result<String> {
    let email = raw.trim().to_lowercase();
    let invalid = || Error::Validation(ValidationError::InvalidEmail(raw.to_string()));

    if email.chars().any(|c| c.is_whitespace() || c.is_control()) {
        return Err(invalid());
    }

    let mut parts = email.splitn(2, '@');
    let local = parts.next().unwrap_or_default();
    let domain = parts.next().ok_or_else(invalid)?;

    // 恰好一个 @
    if domain.contains('@') || local.is_empty() || domain.is_empty() {
        return Err(invalid());
    }

    // 域名必须含 .，且 . 不在首尾
    if !domain.contains('.') || domain.starts_with('.') || domain.ends_with('.') {
        return Err(invalid());
    }

    Ok(email)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_email_normalization() {
        let id = Identifier::parse("  Alice@Example.COM ").unwrap();
        assert!(id.is_email());
        assert_eq!(id.canonical(), "alice@example.com");
    }

    #[test]
    fn test_email_rejects_malformed() {
        // 缺少 @ 的输入会被当作手机号，也同样失败
        assert!(Identifier::parse("not-an-email").is_err());
        assert!(Identifier::parse("@example.com").is_err());
        assert!(Identifier::parse("user@").is_err());
        assert!(Identifier::parse("user@@example.com").is_err());
        assert!(Identifier::parse("user@nodot").is_err());
        assert!(Identifier::parse("user@.com").is_err());
        assert!(Identifier::parse("user@example.com.").is_err());
        assert!(Identifier::parse("us er@example.com").is_err());
        assert!(Identifier::parse("").is_err());
        assert!(Identifier::parse("   ").is_err());
    }

    #[test]
    fn test_phone_three_shapes_canonicalize() {
        // 含国家码 11 位
        let a = Identifier::parse("98912345678").unwrap();
        // 本地 0 开头 10 位
        let b = Identifier::parse("0912345678").unwrap();
        // 裸 9 位
        let c = Identifier::parse("912345678").unwrap();

        assert_eq!(a.canonical(), "+98912345678");
        assert_eq!(b.canonical(), "+98912345678");
        assert_eq!(c.canonical(), "+98912345678");
        assert!(a.is_phone());
    }

    #[test]
    fn test_phone_strips_formatting() {
        let id = Identifier::parse("0912-345-678").unwrap();
        assert_eq!(id.canonical(), "+98912345678");

        let id = Identifier::parse("98 912 345 678").unwrap();
        assert_eq!(id.canonical(), "+98912345678");
    }

    #[test]
    fn test_phone_rejects_wrong_lengths() {
        assert!(Identifier::parse("12345").is_err());
        assert!(Identifier::parse("123456789012").is_err());
        // 11 位但不以国家码开头
        assert!(Identifier::parse("12912345678").is_err());
        // 10 位但不以 0 开头
        assert!(Identifier::parse("9123456789").is_err());
    }

    #[test]
    fn test_custom_scheme() {
        let scheme = PhoneScheme::new("90");
        let id = Identifier::parse_with_scheme("0532 123 456", &scheme).unwrap();
        assert_eq!(id.canonical(), "+90532123456");
    }

    #[test]
    #[should_panic(expected = "country code must be two digits")]
    fn test_scheme_rejects_bad_country_code() {
        PhoneScheme::new("998");
    }

    #[test]
    fn test_display_matches_canonical() {
        let id = Identifier::parse("alice@example.com").unwrap();
        assert_eq!(id.to_string(), "alice@example.com");
    }
}
