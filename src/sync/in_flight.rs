//! Copyright (c) 2025, Kirky.X
//!
//! MIT License
//!
//! 该模块定义了按 (principal, entity) 串行化乐观变更的许可机制。

use crate::config::ConflictPolicy;
use crate::error::{CacheError, Result};
use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{debug, instrument};

type SlotKey = (String, String);
type Slots = DashMap<SlotKey, Arc<Mutex<()>>>;

/// 变更许可
///
/// 持有期间同一 (principal, entity) 上不会有第二个乐观补丁。drop 时释放，
/// 没有其他等待者时一并移除槽位
pub struct MutationPermit {
    principal: String,
    entity_id: String,
    slots: Arc<Slots>,
    guard: Option<OwnedMutexGuard<()>>,
}

impl MutationPermit {
    pub fn principal(&self) -> &str {
        &self.principal
    }

    pub fn entity_id(&self) -> &str {
        &self.entity_id
    }
}

impl std::fmt::Debug for MutationPermit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MutationPermit")
            .field("principal", &self.principal)
            .field("entity_id", &self.entity_id)
            .finish()
    }
}

impl Drop for MutationPermit {
    fn drop(&mut self) {
        drop(self.guard.take());
        prune(&self.slots, (self.principal.clone(), self.entity_id.clone()));
    }
}

/// 只剩映射表自身引用时移除槽位
fn prune(slots: &Slots, key: SlotKey) {
    slots.remove_if(&key, |_, slot| Arc::strong_count(slot) == 1);
}

/// 变更闸门
///
/// 每个 (principal, entity) 一把锁。槽位在首次使用时创建，最后一个持有者释放后移除
pub struct MutationGate {
    policy: ConflictPolicy,
    slots: Arc<Slots>,
}

impl MutationGate {
    pub fn new(policy: ConflictPolicy) -> Self {
        Self {
            policy,
            slots: Arc::new(DashMap::new()),
        }
    }

    pub fn policy(&self) -> ConflictPolicy {
        self.policy
    }

    /// 获取变更许可
    ///
    /// `Reject` 策略下已有进行中的变更时返回 `MutationInProgress`；
    /// `Queue` 策略下等待前一个变更结束
    #[instrument(skip(self, principal), level = "debug")]
    pub async fn acquire(&self, principal: &str, entity_id: &str) -> Result<MutationPermit> {
        let key = (principal.to_string(), entity_id.to_string());
        let slot = self.slots.entry(key.clone()).or_default().clone();

        let guard = match self.policy {
            ConflictPolicy::Reject => match slot.try_lock_owned() {
                Ok(guard) => guard,
                Err(_) => {
                    debug!("mutation rejected: entity={} already in flight", entity_id);
                    prune(&self.slots, key);
                    return Err(CacheError::MutationInProgress(entity_id.to_string()));
                }
            },
            ConflictPolicy::Queue => slot.lock_owned().await,
        };

        Ok(MutationPermit {
            principal: key.0,
            entity_id: key.1,
            slots: self.slots.clone(),
            guard: Some(guard),
        })
    }

    /// 是否有变更正在进行
    pub fn is_in_flight(&self, principal: &str, entity_id: &str) -> bool {
        self.slots
            .get(&(principal.to_string(), entity_id.to_string()))
            .map(|slot| slot.try_lock().is_err())
            .unwrap_or(false)
    }

    /// 当前保留的槽位数
    pub fn slot_count(&self) -> usize {
        self.slots.len()
    }
}
