//! 联合登录（第三方身份提供方）模块
//!
//! 实现 OAuth 授权码 + 防伪 state 的握手协议：发起时生成单次使用的
//! state token 并构造授权 URL，回调时关联校验、交换令牌、对账身份
//! 目录。state 的过期窗口独立于 OTP 账本管理。
//!
//! 提供方的网络调用（令牌交换、资料获取）与身份目录都是外部协作方，
//! 通过 [`IdentityProvider`] 与 [`IdentityDirectory`] 契约注入。
//!
//! ## 示例
//!
//! ```rust,no_run
//! use otprs::federation::{HandshakeManager, ProviderConfig};
//! # use otprs::federation::{IdentityProvider, IdentityDirectory};
//! # use std::sync::Arc;
//! # fn demo(provider: Arc<dyn IdentityProvider>, directory: Arc<dyn IdentityDirectory>) {
//! let config = ProviderConfig::new(
//!     "client-id",
//!     "client-secret",
//!     "https://provider.example.com/oauth/authorize",
//!     "https://provider.example.com/oauth/token",
//!     "https://app.example.com/auth/callback",
//! );
//! let manager = HandshakeManager::new(config, provider, directory);
//!
//! // 发起：把浏览器重定向到 handshake.authorization_url
//! let handshake = manager.begin("/dashboard").unwrap();
//! # }
//! ```

pub mod handshake;
pub mod provider;

pub use handshake::{
    Handshake, HandshakeConfig, HandshakeManager, HandshakeOutcome, InMemoryStateStore,
    StateRecord, StateStore,
};
pub use provider::{
    DirectoryUser, ExternalProfile, IdentityDirectory, IdentityProvider, ProviderConfig,
    ProviderTokens,
};
