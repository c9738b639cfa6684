//! 统一错误类型模块
//!
//! 提供 otprs 库中所有操作的错误类型定义。
//!
//! 错误分类与处理策略：
//!
//! - **校验错误** ([`ValidationError`])：标识符或验证码格式不合法，
//!   在触碰任何共享状态之前被拒绝
//! - **限流错误** ([`Error::RateLimitExceeded`])：与验证失败严格区分
//! - **验证错误** ([`VerifyError`])：未找到/已过期/验证码错误/尝试次数耗尽，
//!   各自携带不同的用户可见消息
//! - **联合登录错误** ([`FederationError`])：state 校验失败属于硬错误；
//!   提供方网络失败在边界处被捕获并转换为带错误标记的重定向，不向外传播

use std::fmt;
use std::time::Duration;

/// otprs 库的统一结果类型
pub type Result<T> = std::result::Result<T, Error>;

/// otprs 库的错误类型
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// 校验错误
    Validation(ValidationError),

    /// OTP 验证错误
    Verify(VerifyError),

    /// 存储错误
    Storage(StorageError),

    /// 联合登录握手错误
    Federation(FederationError),

    /// 速率限制超出
    RateLimitExceeded {
        /// 重试等待时间
        retry_after: Duration,
    },

    /// 内部错误
    Internal(String),

    /// 其他错误
    Other(String),
}

impl Error {
    /// 创建一个内部错误
    pub fn internal(msg: impl Into<String>) -> Self {
        Error::Internal(msg.into())
    }

    /// 创建一个校验错误
    pub fn validation(msg: impl Into<String>) -> Self {
        Error::Validation(ValidationError::Custom(msg.into()))
    }

    /// 创建一个速率限制错误
    pub fn rate_limited(retry_after: Duration) -> Self {
        Error::RateLimitExceeded { retry_after }
    }
}

/// 标识符与输入校验相关错误
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// 无效的邮箱格式
    InvalidEmail(String),
    /// 无效的手机号格式
    InvalidPhone(String),
    /// 无效的验证码格式（长度或字符不合法）
    MalformedCode { expected_length: usize },
    /// 字段为空
    EmptyField(String),
    /// 自定义校验错误
    Custom(String),
}

/// OTP 验证相关错误
///
/// 每个变体对应验证状态机的一个终止分支，携带各自的用户可见消息。
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VerifyError {
    /// 记录不存在（从未签发、已被消费或已被清理）
    NotFound,
    /// 记录已过期
    Expired,
    /// 尝试次数已耗尽
    AttemptsExhausted,
    /// 验证码不匹配，记录仍然存活
    Mismatch {
        /// 剩余尝试次数
        remaining: u32,
    },
}

/// 存储相关错误
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageError {
    /// 记录未找到
    NotFound(String),
    /// 操作失败
    OperationFailed(String),
}

/// 联合登录握手相关错误
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FederationError {
    /// state 未知（从未签发或已被消费）
    UnknownState,
    /// state 已过期
    ExpiredState,
    /// 授权码换取令牌失败
    ExchangeFailed(String),
    /// 获取外部用户资料失败
    ProfileFailed(String),
    /// 身份目录对账失败
    DirectoryFailed(String),
}

// ============================================================================
// Display 实现
// ============================================================================

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Validation(e) => write!(f, "Validation error: {}", e),
            Error::Verify(e) => write!(f, "Verification error: {}", e),
            Error::Storage(e) => write!(f, "Storage error: {}", e),
            Error::Federation(e) => write!(f, "Federation error: {}", e),
            Error::RateLimitExceeded { retry_after } => {
                write!(f, "Rate limit exceeded, retry after {:?}", retry_after)
            }
            Error::Internal(msg) => write!(f, "Internal error: {}", msg),
            Error::Other(msg) => write!(f, "Error: {}", msg),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationError::InvalidEmail(email) => write!(f, "invalid email format: {}", email),
            ValidationError::InvalidPhone(phone) => {
                write!(f, "invalid phone number format: {}", phone)
            }
            ValidationError::MalformedCode { expected_length } => {
                write!(f, "code must be {} digits", expected_length)
            }
            ValidationError::EmptyField(field) => write!(f, "field '{}' cannot be empty", field),
            ValidationError::Custom(msg) => write!(f, "{}", msg),
        }
    }
}

impl fmt::Display for VerifyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VerifyError::NotFound => write!(f, "code not found or expired"),
            VerifyError::Expired => write!(f, "code has expired"),
            VerifyError::AttemptsExhausted => write!(f, "too many attempts"),
            VerifyError::Mismatch { remaining } => {
                write!(f, "incorrect code, {} attempts remaining", remaining)
            }
        }
    }
}

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StorageError::NotFound(item) => write!(f, "not found: {}", item),
            StorageError::OperationFailed(msg) => write!(f, "storage operation failed: {}", msg),
        }
    }
}

impl fmt::Display for FederationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FederationError::UnknownState => write!(f, "unknown or already consumed state"),
            FederationError::ExpiredState => write!(f, "state has expired"),
            FederationError::ExchangeFailed(msg) => write!(f, "token exchange failed: {}", msg),
            FederationError::ProfileFailed(msg) => write!(f, "profile fetch failed: {}", msg),
            FederationError::DirectoryFailed(msg) => {
                write!(f, "identity directory failed: {}", msg)
            }
        }
    }
}

// ============================================================================
// std::error::Error 实现
// ============================================================================

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        None
    }
}

impl std::error::Error for ValidationError {}
impl std::error::Error for VerifyError {}
impl std::error::Error for StorageError {}
impl std::error::Error for FederationError {}

// ============================================================================
// From 实现 - 方便错误转换
// ============================================================================

impl From<ValidationError> for Error {
    fn from(err: ValidationError) -> Self {
        Error::Validation(err)
    }
}

impl From<VerifyError> for Error {
    fn from(err: VerifyError) -> Self {
        Error::Verify(err)
    }
}

impl From<StorageError> for Error {
    fn from(err: StorageError) -> Self {
        Error::Storage(err)
    }
}

impl From<FederationError> for Error {
    fn from(err: FederationError) -> Self {
        Error::Federation(err)
    }
}

impl From<String> for Error {
    fn from(msg: String) -> Self {
        Error::Other(msg)
    }
}

impl From<&str> for Error {
    fn from(msg: &str) -> Self {
        Error::Other(msg.to_string())
    }
}
