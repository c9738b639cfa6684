//! 联合登录集成测试
//!
//! 覆盖授权 URL 构造、state 的单次使用与闭合失败语义，以及协作方
//! 失败到重定向结果的映射。

use otprs::clock::ManualClock;
use otprs::error::{Error, FederationError, Result};
use otprs::federation::{
    DirectoryUser, ExternalProfile, HandshakeConfig, HandshakeManager, HandshakeOutcome,
    IdentityDirectory, IdentityProvider, InMemoryStateStore, ProviderConfig, ProviderTokens,
};
use async_trait::async_trait;
use chrono::Duration as ChronoDuration;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// 可配置失败点的提供方测试替身
struct StubProvider {
    exchange_calls: AtomicUsize,
    fail_exchange: bool,
    fail_profile: bool,
}

impl StubProvider {
    fn healthy() -> Self {
        Self {
            exchange_calls: AtomicUsize::new(0),
            fail_exchange: false,
            fail_profile: false,
        }
    }
}

#[async_trait]
impl IdentityProvider for StubProvider {
    async fn exchange_code(&self, _code: &str) -> Result<ProviderTokens> {
        self.exchange_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_exchange {
            return Err(Error::Federation(FederationError::ExchangeFailed(
                "provider unreachable".to_string(),
            )));
        }
        Ok(ProviderTokens {
            access_token: "access-token".to_string(),
            id_token: None,
        })
    }

    async fn fetch_profile(&self, _tokens: &ProviderTokens) -> Result<ExternalProfile> {
        if self.fail_profile {
            return Err(Error::Federation(FederationError::ProfileFailed(
                "profile endpoint 500".to_string(),
            )));
        }
        Ok(ExternalProfile {
            subject: "ext-42".to_string(),
            email: Some("user@example.com".to_string()),
            name: Some("User".to_string()),
        })
    }
}

struct StubDirectory {
    fail: bool,
}

#[async_trait]
impl IdentityDirectory for StubDirectory {
    async fn reconcile(&self, profile: &ExternalProfile) -> Result<DirectoryUser> {
        if self.fail {
            return Err(Error::Federation(FederationError::DirectoryFailed(
                "directory write failed".to_string(),
            )));
        }
        Ok(DirectoryUser {
            user_id: format!("local-{}", profile.subject),
            created: true,
        })
    }
}

fn provider_config() -> ProviderConfig {
    ProviderConfig::new(
        "client-id",
        "client-secret",
        "https://provider.example.com/oauth/authorize",
        "https://provider.example.com/oauth/token",
        "https://app.example.com/auth/callback",
    )
}

fn manager(
    provider: Arc<StubProvider>,
    directory: StubDirectory,
    clock: ManualClock,
) -> HandshakeManager<InMemoryStateStore> {
    HandshakeManager::new(provider_config(), provider, Arc::new(directory))
        .with_clock(Arc::new(clock))
}

// ============================================================================
// 授权 URL 与完整流程
// ============================================================================

/// 授权 URL 携带全部必需参数，完整回调流程产出目录侧用户
#[tokio::test]
async fn test_full_federated_login_flow() {
    let provider = Arc::new(StubProvider::healthy());
    let manager = manager(
        provider.clone(),
        StubDirectory { fail: false },
        ManualClock::starting_now(),
    );

    let handshake = manager.begin("/dashboard").unwrap();
    let url = &handshake.authorization_url;
    assert!(url.starts_with("https://provider.example.com/oauth/authorize?"));
    assert!(url.contains("response_type=code"));
    assert!(url.contains("client_id=client-id"));
    assert!(url.contains(&format!("state={}", handshake.state)));

    let outcome = manager.complete("auth-code", &handshake.state).await.unwrap();
    assert_eq!(
        outcome,
        HandshakeOutcome::Completed {
            redirect_target: "/dashboard".to_string(),
            user: DirectoryUser {
                user_id: "local-ext-42".to_string(),
                created: true,
            },
        }
    );
}

// ============================================================================
// state 安全语义
// ============================================================================

/// 未知 state 闭合失败，绝不触发令牌交换
#[tokio::test]
async fn test_unknown_state_fails_closed() {
    let provider = Arc::new(StubProvider::healthy());
    let manager = manager(
        provider.clone(),
        StubDirectory { fail: false },
        ManualClock::starting_now(),
    );

    let err = manager.complete("auth-code", "forged-state").await.unwrap_err();
    assert_eq!(err, Error::Federation(FederationError::UnknownState));
    assert_eq!(provider.exchange_calls.load(Ordering::SeqCst), 0);
}

/// state 单次使用：成功回调后重放被拒绝
#[tokio::test]
async fn test_state_replay_rejected() {
    let provider = Arc::new(StubProvider::healthy());
    let manager = manager(
        provider.clone(),
        StubDirectory { fail: false },
        ManualClock::starting_now(),
    );

    let handshake = manager.begin("/home").unwrap();
    manager.complete("auth-code", &handshake.state).await.unwrap();

    let err = manager
        .complete("auth-code", &handshake.state)
        .await
        .unwrap_err();
    assert_eq!(err, Error::Federation(FederationError::UnknownState));
    assert_eq!(provider.exchange_calls.load(Ordering::SeqCst), 1);
}

/// 过期 state 闭合失败，同样不触发交换
#[tokio::test]
async fn test_expired_state_fails_closed() {
    let provider = Arc::new(StubProvider::healthy());
    let clock = ManualClock::starting_now();
    let manager = manager(provider.clone(), StubDirectory { fail: false }, clock.clone());

    let handshake = manager.begin("/home").unwrap();
    clock.advance(ChronoDuration::minutes(10) + ChronoDuration::seconds(1));

    let err = manager
        .complete("auth-code", &handshake.state)
        .await
        .unwrap_err();
    assert_eq!(err, Error::Federation(FederationError::ExpiredState));
    assert_eq!(provider.exchange_calls.load(Ordering::SeqCst), 0);
}

// ============================================================================
// 协作方失败映射
// ============================================================================

/// state 校验通过后的交换失败映射为重定向结果，不是硬错误
#[tokio::test]
async fn test_exchange_failure_is_soft() {
    let provider = Arc::new(StubProvider {
        exchange_calls: AtomicUsize::new(0),
        fail_exchange: true,
        fail_profile: false,
    });
    let manager = manager(provider, StubDirectory { fail: false }, ManualClock::starting_now());

    let handshake = manager.begin("/home").unwrap();
    let outcome = manager.complete("auth-code", &handshake.state).await.unwrap();
    assert_eq!(
        outcome,
        HandshakeOutcome::Failed {
            redirect_target: "/home".to_string(),
        }
    );
}

/// 资料获取失败与目录对账失败同样落到重定向结果
#[tokio::test]
async fn test_profile_and_directory_failures_are_soft() {
    let provider = Arc::new(StubProvider {
        exchange_calls: AtomicUsize::new(0),
        fail_exchange: false,
        fail_profile: true,
    });
    let manager = manager(provider, StubDirectory { fail: false }, ManualClock::starting_now());
    let handshake = manager.begin("/a").unwrap();
    let outcome = manager.complete("auth-code", &handshake.state).await.unwrap();
    assert_eq!(
        outcome,
        HandshakeOutcome::Failed {
            redirect_target: "/a".to_string(),
        }
    );

    let provider = Arc::new(StubProvider::healthy());
    let manager = manager_with_directory_failure(provider);
    let handshake = manager.begin("/b").unwrap();
    let outcome = manager.complete("auth-code", &handshake.state).await.unwrap();
    assert_eq!(
        outcome,
        HandshakeOutcome::Failed {
            redirect_target: "/b".to_string(),
        }
    );
}

fn manager_with_directory_failure(
    provider: Arc<StubProvider>,
) -> HandshakeManager<InMemoryStateStore> {
    HandshakeManager::new(provider_config(), provider, Arc::new(StubDirectory { fail: true }))
        .with_clock(Arc::new(ManualClock::starting_now()))
}

// ============================================================================
// 放弃流程的清理
// ============================================================================

/// 被用户放弃的握手由时间驱动清理回收
#[tokio::test]
async fn test_abandoned_handshakes_swept() {
    let provider = Arc::new(StubProvider::healthy());
    let clock = ManualClock::starting_now();
    let manager = manager(provider, StubDirectory { fail: false }, clock.clone());

    manager.begin("/a").unwrap();
    manager.begin("/b").unwrap();
    manager.begin("/c").unwrap();
    assert_eq!(manager.sweep_expired().unwrap(), 0);

    clock.advance(ChronoDuration::minutes(11));
    assert_eq!(manager.sweep_expired().unwrap(), 3);
}

/// 自定义较短的 state 有效期生效
#[tokio::test]
async fn test_custom_state_ttl() {
    let provider = Arc::new(StubProvider::healthy());
    let clock = ManualClock::starting_now();
    let manager = manager(provider.clone(), StubDirectory { fail: false }, clock.clone())
        .with_config(HandshakeConfig::new().with_state_ttl(Duration::from_secs(60)));

    let handshake = manager.begin("/home").unwrap();
    clock.advance(ChronoDuration::seconds(61));

    let err = manager
        .complete("auth-code", &handshake.state)
        .await
        .unwrap_err();
    assert_eq!(err, Error::Federation(FederationError::ExpiredState));
}
