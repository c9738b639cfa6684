//! 联合登录握手管理
//!
//! 管理授权码流程中的防伪 state token：发起登录时生成并存储，
//! 回调时关联、校验并消费。state 的生命周期独立于验证码账本。
//!
//! ## 安全语义
//!
//! - state 为 32 字节不可猜测随机值，**单次使用**：回调一到达就从
//!   存储中取出删除，无论后续校验结果如何
//! - 未知、已消费或已过期的 state 一律闭合失败（fail closed），
//!   且绝不触发令牌交换
//! - state 校验通过之后的任何协作方失败（令牌交换、资料获取、目录
//!   对账）被捕获并映射为带错误标记的重定向结果，而不是硬错误——
//!   因为此时的调用方是重定向途中的浏览器，不是可以重试的 API 客户端
//! - 大量 state 由中途放弃的用户留下，独立的时间驱动清理
//!   ([`HandshakeManager::sweep_expired`]) 无需任何回调即可回收它们

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::Duration;
use tracing::{debug, warn};

use super::provider::{DirectoryUser, IdentityDirectory, IdentityProvider, ProviderConfig};
use crate::clock::{Clock, SystemClock};
use crate::error::{Error, FederationError, Result};
use crate::random::generate_state_token;

// ============================================================================
// 配置
// ============================================================================

/// 握手配置
#[derive(Debug, Clone)]
pub struct HandshakeConfig {
    /// state 有效期
    pub state_ttl: Duration,
}

impl Default for HandshakeConfig {
    fn default() -> Self {
        Self {
            state_ttl: Duration::from_secs(10 * 60),
        }
    }
}

impl HandshakeConfig {
    /// 创建新配置
    pub fn new() -> Self {
        Self::default()
    }

    /// 设置 state 有效期
    pub fn with_state_ttl(mut self, ttl: Duration) -> Self {
        self.state_ttl = ttl;
        self
    }

    fn ttl_chrono(&self) -> ChronoDuration {
        ChronoDuration::seconds(self.state_ttl.as_secs() as i64)
    }
}

// ============================================================================
// 数据结构
// ============================================================================

/// 存储中的 state 记录
#[derive(Debug, Clone)]
pub struct StateRecord {
    /// 登录完成后的目标重定向地址
    pub redirect_target: String,

    /// 创建时间
    pub created_at: DateTime<Utc>,

    /// 过期时间
    pub expires_at: DateTime<Utc>,
}

/// 发起握手的结果
#[derive(Debug, Clone)]
pub struct Handshake {
    /// 嵌入了 state 的提供方授权 URL，调用方把浏览器重定向到这里
    pub authorization_url: String,

    /// 本次握手的 state token
    pub state: String,
}

/// 完成握手的结果
///
/// state 校验通过后的所有路径都会给出一个可供浏览器跳转的重定向目标。
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HandshakeOutcome {
    /// 登录成功
    Completed {
        /// 发起握手时登记的重定向目标
        redirect_target: String,
        /// 目录侧用户
        user: DirectoryUser,
    },
    /// 协作方失败；调用方应在重定向目标上附加通用错误标记
    Failed {
        /// 发起握手时登记的重定向目标
        redirect_target: String,
    },
}

// ============================================================================
// 存储接口
// ============================================================================

/// state 存储接口
pub trait StateStore: Send + Sync {
    /// 保存 state 记录
    fn save(&self, state: &str, record: StateRecord) -> Result<()>;

    /// 取出并删除 state 记录（单次使用的强制点）
    fn take(&self, state: &str) -> Result<Option<StateRecord>>;

    /// 清理过期记录，返回清理数量
    fn cleanup_expired(&self, now: DateTime<Utc>) -> Result<usize>;
}

/// 内存 state 存储
#[derive(Debug, Clone, Default)]
pub struct InMemoryStateStore {
    records: Arc<RwLock<HashMap<String, StateRecord>>>,
}

impl InMemoryStateStore {
    /// 创建新的内存存储
    pub fn new() -> Self {
        Self::default()
    }

    /// 当前存储的 state 数量
    pub fn len(&self) -> usize {
        self.records.read().unwrap().len()
    }

    /// 存储是否为空
    pub fn is_empty(&self) -> bool {
        self.records.read().unwrap().is_empty()
    }
}

impl StateStore for InMemoryStateStore {
    fn save(&self, state: &str, record: StateRecord) -> Result<()> {
        let mut records = self
            .records
            .write()
            .map_err(|_| Error::internal("state store lock poisoned"))?;
        records.insert(state.to_string(), record);
        Ok(())
    }

    fn take(&self, state: &str) -> Result<Option<StateRecord>> {
        let mut records = self
            .records
            .write()
            .map_err(|_| Error::internal("state store lock poisoned"))?;
        Ok(records.remove(state))
    }

    fn cleanup_expired(&self, now: DateTime<Utc>) -> Result<usize> {
        let mut records = self
            .records
            .write()
            .map_err(|_| Error::internal("state store lock poisoned"))?;
        let before = records.len();
        records.retain(|_, record| record.expires_at >= now);
        Ok(before - records.len())
    }
}

// ============================================================================
// 握手管理器
// ============================================================================

/// 联合登录握手管理器
pub struct HandshakeManager<S: StateStore = InMemoryStateStore> {
    provider_config: ProviderConfig,
    provider: Arc<dyn IdentityProvider>,
    directory: Arc<dyn IdentityDirectory>,
    store: S,
    clock: Arc<dyn Clock>,
    config: HandshakeConfig,
}

impl HandshakeManager<InMemoryStateStore> {
    /// 使用默认内存存储创建管理器
    pub fn new(
        provider_config: ProviderConfig,
        provider: Arc<dyn IdentityProvider>,
        directory: Arc<dyn IdentityDirectory>,
    ) -> Self {
        Self::with_store(
            InMemoryStateStore::new(),
            provider_config,
            provider,
            directory,
        )
    }
}

impl<S: StateStore> HandshakeManager<S> {
    /// 使用自定义存储创建管理器
    pub fn with_store(
        store: S,
        provider_config: ProviderConfig,
        provider: Arc<dyn IdentityProvider>,
        directory: Arc<dyn IdentityDirectory>,
    ) -> Self {
        Self {
            provider_config,
            provider,
            directory,
            store,
            clock: Arc::new(SystemClock),
            config: HandshakeConfig::default(),
        }
    }

    /// 替换握手配置
    pub fn with_config(mut self, config: HandshakeConfig) -> Self {
        self.config = config;
        self
    }

    /// 替换时间来源
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// 发起一次联合登录握手
    ///
    /// 生成不可猜测的 state，登记重定向目标，构造提供方授权 URL。
    /// 顺带清理一批已过期的 state。
    pub fn begin(&self, redirect_target: impl Into<String>) -> Result<Handshake> {
        let now = self.clock.now();

        // 机会性清理被放弃的握手
        let _ = self.store.cleanup_expired(now)?;

        let state = generate_state_token()?;
        self.store.save(
            &state,
            StateRecord {
                redirect_target: redirect_target.into(),
                created_at: now,
                expires_at: now + self.config.ttl_chrono(),
            },
        )?;

        let authorization_url = self.provider_config.authorization_url(&state)?;

        Ok(Handshake {
            authorization_url,
            state,
        })
    }

    /// 完成回调侧的握手
    ///
    /// state 先被无条件取出删除（单次使用），未知或过期的 state 闭合
    /// 失败且不触发令牌交换。之后的协作方失败被捕获并映射为
    /// [`HandshakeOutcome::Failed`]。
    pub async fn complete(&self, code: &str, state: &str) -> Result<HandshakeOutcome> {
        let record = self
            .store
            .take(state)?
            .ok_or(Error::Federation(FederationError::UnknownState))?;

        if self.clock.now() > record.expires_at {
            return Err(Error::Federation(FederationError::ExpiredState));
        }

        let redirect_target = record.redirect_target;

        let tokens = match self.provider.exchange_code(code).await {
            Ok(tokens) => tokens,
            Err(e) => {
                warn!(error = %e, "token exchange failed");
                return Ok(HandshakeOutcome::Failed { redirect_target });
            }
        };

        let profile = match self.provider.fetch_profile(&tokens).await {
            Ok(profile) => profile,
            Err(e) => {
                warn!(error = %e, "profile fetch failed");
                return Ok(HandshakeOutcome::Failed { redirect_target });
            }
        };

        let user = match self.directory.reconcile(&profile).await {
            Ok(user) => user,
            Err(e) => {
                warn!(error = %e, subject = %profile.subject, "directory reconcile failed");
                return Ok(HandshakeOutcome::Failed { redirect_target });
            }
        };

        debug!(user_id = %user.user_id, created = user.created, "handshake completed");

        Ok(HandshakeOutcome::Completed {
            redirect_target,
            user,
        })
    }

    /// 清理过期的 state（时间驱动，与回调无关）
    ///
    /// 被用户放弃的握手只能靠这里回收。
    pub fn sweep_expired(&self) -> Result<usize> {
        let swept = self.store.cleanup_expired(self.clock.now())?;
        if swept > 0 {
            debug!(count = swept, "swept expired handshake states");
        }
        Ok(swept)
    }

    /// 获取配置
    pub fn config(&self) -> &HandshakeConfig {
        &self.config
    }
}
