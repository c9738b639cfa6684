//! 安全随机数生成模块
//!
//! 提供密码学安全的随机数生成功能，用于生成 OTP 验证码和握手 state 等
//! 敏感数据，以及防时序攻击的常量时间比较。

use rand::{Rng, TryRngCore, rngs::OsRng};

use crate::error::{Error, Result};

/// 生成指定长度的随机字节数组
///
/// 使用操作系统提供的密码学安全随机数生成器 (CSPRNG)
///
/// # Example
///
/// ```rust
/// use otprs::random::generate_random_bytes;
///
/// let bytes = generate_random_bytes(32).unwrap();
/// assert_eq!(bytes.len(), 32);
/// ```
pub fn generate_random_bytes(length: usize) -> Result<Vec<u8>> {
    let mut bytes = vec![0u8; length];
    OsRng
        .try_fill_bytes(&mut bytes)
        .map_err(|e| Error::internal(format!("rng failure: {:?}", e)))?;
    Ok(bytes)
}

/// 生成指定长度的 Base64 URL 安全随机字符串
///
/// 使用 URL 安全的 Base64 编码（不含填充），可直接嵌入 URL 参数。
pub fn generate_random_base64_url(byte_length: usize) -> Result<String> {
    use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
    let bytes = generate_random_bytes(byte_length)?;
    Ok(URL_SAFE_NO_PAD.encode(&bytes))
}

/// 生成联合登录握手的防伪 state token
///
/// 使用 32 字节（256 位）的随机数据，提供足够的熵使其不可猜测。
///
/// # Example
///
/// ```rust
/// use otprs::random::generate_state_token;
///
/// let state = generate_state_token().unwrap();
/// assert!(!state.contains('+'));
/// assert!(!state.contains('/'));
/// ```
pub fn generate_state_token() -> Result<String> {
    generate_random_base64_url(32)
}

/// 生成指定位数的数字验证码
///
/// 在 `[10^(length-1), 10^length)` 内均匀取值，因此首位非零，
/// 6 位时即 `100000`–`999999`。底层使用线程本地的 CSPRNG。
///
/// 6 位验证码配合 3 次尝试上限，单个生命周期内的猜中概率约为
/// 3/900000，必须与尝试上限和请求限流共同使用才可接受。
///
/// # Example
///
/// ```rust
/// use otprs::random::generate_numeric_code;
///
/// let code = generate_numeric_code(6);
/// assert_eq!(code.len(), 6);
/// assert!(code.chars().all(|c| c.is_ascii_digit()));
/// assert_ne!(&code[0..1], "0");
/// ```
pub fn generate_numeric_code(length: usize) -> String {
    debug_assert!((4..=10).contains(&length), "code length must be 4..=10");
    let min = 10u64.pow((length - 1) as u32);
    let max = 10u64.pow(length as u32);
    let code = rand::rng().random_range(min..max);
    code.to_string()
}

// ============================================================================
// 常量时间比较
// ============================================================================

/// 常量时间比较两个字节切片
///
/// 用于防止时序攻击。
pub fn constant_time_compare(a: &[u8], b: &[u8]) -> bool {
    use subtle::ConstantTimeEq;
    a.ct_eq(b).into()
}

/// 常量时间比较两个字符串
///
/// 验证码与 state 的比较都必须走这里，不允许使用 `==`。
pub fn constant_time_compare_str(a: &str, b: &str) -> bool {
    constant_time_compare(a.as_bytes(), b.as_bytes())
}
