//! 外部身份提供方与身份目录契约
//!
//! 联合登录的网络侧协作方：标准 OAuth 2.0 授权码交换的提供方，
//! 以及持久化用户账户的身份目录。两者都是外部系统，核心只定义
//! 面向它们的契约和授权 URL 的构造。

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{Error, Result};

// ============================================================================
// 提供方配置
// ============================================================================

/// OAuth 授权码流程的固定参数
const RESPONSE_TYPE: &str = "code";
const DEFAULT_SCOPE: &str = "openid email profile";

/// 外部身份提供方配置
#[derive(Debug, Clone)]
pub struct ProviderConfig {
    /// 客户端 ID
    pub client_id: String,

    /// 客户端密钥（仅由 [`IdentityProvider`] 实现方在令牌交换时使用）
    pub client_secret: String,

    /// 授权端点
    pub authorization_endpoint: String,

    /// 令牌端点
    pub token_endpoint: String,

    /// 回调地址
    pub redirect_uri: String,

    /// 请求的权限范围
    pub scope: String,
}

impl ProviderConfig {
    /// 创建配置
    pub fn new(
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        authorization_endpoint: impl Into<String>,
        token_endpoint: impl Into<String>,
        redirect_uri: impl Into<String>,
    ) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            authorization_endpoint: authorization_endpoint.into(),
            token_endpoint: token_endpoint.into(),
            redirect_uri: redirect_uri.into(),
            scope: DEFAULT_SCOPE.to_string(),
        }
    }

    /// 设置权限范围
    pub fn with_scope(mut self, scope: impl Into<String>) -> Self {
        self.scope = scope.into();
        self
    }

    /// 构造嵌入 state 的授权 URL
    ///
    /// 固定携带 `response_type=code` 与配置的 client_id、redirect_uri、
    /// scope；所有参数经过正确的 URL 编码。
    pub fn authorization_url(&self, state: &str) -> Result<String> {
        let mut url = Url::parse(&self.authorization_endpoint)
            .map_err(|e| Error::validation(format!("invalid authorization endpoint: {}", e)))?;

        url.query_pairs_mut()
            .append_pair("response_type", RESPONSE_TYPE)
            .append_pair("client_id", &self.client_id)
            .append_pair("redirect_uri", &self.redirect_uri)
            .append_pair("scope", &self.scope)
            .append_pair("state", state);

        Ok(url.into())
    }
}

// ============================================================================
// 数据结构
// ============================================================================

/// 令牌交换的结果
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderTokens {
    /// 访问令牌
    pub access_token: String,

    /// 身份令牌（OpenID Connect）
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id_token: Option<String>,
}

/// 提供方返回的外部用户资料
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExternalProfile {
    /// 提供方侧的稳定用户标识
    pub subject: String,

    /// 邮箱
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,

    /// 显示名
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

/// 身份目录对账的结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectoryUser {
    /// 目录侧用户 ID
    pub user_id: String,

    /// 本次对账是否新建了账户
    pub created: bool,
}

// ============================================================================
// 协作方契约
// ============================================================================

/// 外部身份提供方
///
/// 实现方负责真正的网络调用：用授权码（连同 client_id/client_secret/
/// redirect_uri）换取令牌，再用访问令牌获取用户资料。
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// 用授权码换取令牌
    async fn exchange_code(&self, code: &str) -> Result<ProviderTokens>;

    /// 获取外部用户资料
    async fn fetch_profile(&self, tokens: &ProviderTokens) -> Result<ExternalProfile>;
}

/// 身份目录
///
/// 持久化用户账户的外部存储。`reconcile` 实现 create-or-login：
/// 按外部资料查找已有账户，不存在则创建。
#[async_trait]
pub trait IdentityDirectory: Send + Sync {
    /// 按外部资料对账，返回目录侧用户
    async fn reconcile(&self, profile: &ExternalProfile) -> Result<DirectoryUser>;
}
