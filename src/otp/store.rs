//! 验证码账本（OTP Ledger）
//!
//! 按标准化标识符为键的、带过期和尝试计数的验证码存储。每个标识符
//! 同一时刻最多存在一条存活记录：`save` 是覆盖语义，签发新码即隐式
//! 作废旧码。过期被动判定，由引擎在读取时检查 `expires_at`，
//! `cleanup_expired` 仅用于内存回收。

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use super::Purpose;
use crate::error::{Error, Result};

/// 账本中的一条验证码记录
#[derive(Debug, Clone)]
pub struct OtpRecord {
    /// 验证码（6 位数字字符串）
    pub code: String,

    /// 签发用途
    pub purpose: Purpose,

    /// 已发生的错误尝试次数（从 0 计起）
    pub attempts: u32,

    /// 创建时间
    pub created_at: DateTime<Utc>,

    /// 过期时间，固定为 `created_at + ttl`，创建后不再延长
    pub expires_at: DateTime<Utc>,

    /// 是否已通过非消费式验证（两阶段流程的中间态）
    pub verified: bool,
}

impl OtpRecord {
    /// 判断记录在给定时间点是否已过期
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }
}

// ============================================================================
// 存储接口
// ============================================================================

/// 验证码账本存储接口
///
/// 实现此 trait 以提供自定义的存储后端（如 Redis、数据库等），
/// 使单进程内存表和共享外部存储可以互换。所有删除操作都是幂等的：
/// 删除不存在的键是无操作，时间驱动的清理与前台访问互不冲突。
pub trait OtpStore: Send + Sync {
    /// 保存记录，覆盖该标识符之前的任何记录
    fn save(&self, key: &str, record: OtpRecord) -> Result<()>;

    /// 读取记录
    fn get(&self, key: &str) -> Result<Option<OtpRecord>>;

    /// 错误尝试计数加一
    fn increment_attempts(&self, key: &str) -> Result<()>;

    /// 标记为已验证（非消费式验证成功后的持久化）
    fn mark_verified(&self, key: &str) -> Result<()>;

    /// 删除记录（幂等）
    fn delete(&self, key: &str) -> Result<()>;

    /// 清理过期记录，返回清理数量
    fn cleanup_expired(&self, now: DateTime<Utc>) -> Result<usize>;
}

// ============================================================================
// 内存存储实现
// ============================================================================

/// 内存账本实现
///
/// 适用于单实例部署或测试环境。多实例部署需要换用共享存储，
/// 或保证请求对单实例的亲和性。
#[derive(Debug, Clone, Default)]
pub struct InMemoryOtpStore {
    /// 标准化标识符 -> 记录
    records: Arc<RwLock<HashMap<String, OtpRecord>>>,
}

impl InMemoryOtpStore {
    /// 创建新的内存账本
    pub fn new() -> Self {
        Self::default()
    }

    /// 当前存储的记录数量
    pub fn len(&self) -> usize {
        self.records.read().unwrap().len()
    }

    /// 账本是否为空
    pub fn is_empty(&self) -> bool {
        self.records.read().unwrap().is_empty()
    }
}

impl OtpStore for InMemoryOtpStore {
    fn save(&self, key: &str, record: OtpRecord) -> Result<()> {
        let mut records = lock_write(&self.records)?;
        records.insert(key.to_string(), record);
        Ok(())
    }

    fn get(&self, key: &str) -> Result<Option<OtpRecord>> {
        let records = self
            .records
            .read()
            .map_err(|_| Error::internal("otp store lock poisoned"))?;
        Ok(records.get(key).cloned())
    }

    fn increment_attempts(&self, key: &str) -> Result<()> {
        let mut records = lock_write(&self.records)?;
        if let Some(record) = records.get_mut(key) {
            record.attempts = record.attempts.saturating_add(1);
        }
        Ok(())
    }

    fn mark_verified(&self, key: &str) -> Result<()> {
        let mut records = lock_write(&self.records)?;
        if let Some(record) = records.get_mut(key) {
            record.verified = true;
        }
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<()> {
        let mut records = lock_write(&self.records)?;
        records.remove(key);
        Ok(())
    }

    fn cleanup_expired(&self, now: DateTime<Utc>) -> Result<usize> {
        let mut records = lock_write(&self.records)?;
        let before = records.len();
        records.retain(|_, record| !record.is_expired(now));
        Ok(before - records.len())
    }
}

fn lock_write<'a>(
    records: &'a Arc<RwLock<HashMap<String, OtpRecord>>>,
) -> Result<std::sync::RwLockWriteGuard<'a, HashMap<String, OtpRecord>>> {
    records
        .write()
        .map_err(|_| Error::internal("otp store lock poisoned"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn record(code: &str, now: DateTime<Utc>) -> OtpRecord {
        OtpRecord {
            code: code.to_string(),
            purpose: Purpose::SignIn,
            attempts: 0,
            created_at: now,
            expires_at: now + Duration::minutes(10),
            verified: false,
        }
    }

    #[test]
    fn test_save_overwrites() {
        let store = InMemoryOtpStore::new();
        let now = Utc::now();

        store.save("k", record("111111", now)).unwrap();
        store.save("k", record("222222", now)).unwrap();

        assert_eq!(store.len(), 1);
        assert_eq!(store.get("k").unwrap().unwrap().code, "222222");
    }

    #[test]
    fn test_increment_attempts() {
        let store = InMemoryOtpStore::new();
        let now = Utc::now();
        store.save("k", record("111111", now)).unwrap();

        store.increment_attempts("k").unwrap();
        store.increment_attempts("k").unwrap();
        assert_eq!(store.get("k").unwrap().unwrap().attempts, 2);

        // 对不存在的键是无操作
        store.increment_attempts("missing").unwrap();
    }

    #[test]
    fn test_mark_verified() {
        let store = InMemoryOtpStore::new();
        let now = Utc::now();
        store.save("k", record("111111", now)).unwrap();

        store.mark_verified("k").unwrap();
        assert!(store.get("k").unwrap().unwrap().verified);
    }

    #[test]
    fn test_delete_is_idempotent() {
        let store = InMemoryOtpStore::new();
        let now = Utc::now();
        store.save("k", record("111111", now)).unwrap();

        store.delete("k").unwrap();
        assert!(store.get("k").unwrap().is_none());

        // 再次删除是无操作
        store.delete("k").unwrap();
    }

    #[test]
    fn test_cleanup_expired() {
        let store = InMemoryOtpStore::new();
        let now = Utc::now();

        store.save("live", record("111111", now)).unwrap();
        store
            .save("dead", record("222222", now - Duration::minutes(20)))
            .unwrap();

        let cleaned = store.cleanup_expired(now).unwrap();
        assert_eq!(cleaned, 1);
        assert!(store.get("live").unwrap().is_some());
        assert!(store.get("dead").unwrap().is_none());
    }

    #[test]
    fn test_is_expired_boundary() {
        let now = Utc::now();
        let rec = record("111111", now);
        // 恰好等于 expires_at 时尚未过期
        assert!(!rec.is_expired(rec.expires_at));
        assert!(rec.is_expired(rec.expires_at + Duration::seconds(1)));
    }
}
