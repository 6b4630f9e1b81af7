//! Copyright (c) 2025-2026, Kirky.X
//!
//! MIT License
//!
//! 该模块定义了目录缓存协调器：按主体划分命名空间，
//! 并为状态切换实现“投机修补 → 结算”的两阶段乐观更新协议。

use crate::client::{QueryCache, QueryCacheExt};
use crate::config::ConflictPolicy;
use crate::error::{CacheError, RemoteError, Result};
use crate::metrics::GLOBAL_METRICS;
use crate::model::CachedValue;
use crate::namespace::{self, principal_prefix, CacheNamespace, Scope};
use crate::sync::{MutationGate, MutationPermit};
use crate::utils::redaction::{redact_cache_key, redact_principal};
use dashmap::DashMap;
use std::future::Future;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

/// 被包装的远程调用的结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutationOutcome {
    Success,
    Failure,
}

/// 乐观快照
///
/// 在修补前拍下的缓存值副本，绑定到一次进行中的变更。
/// 由 [`DirectoryCacheCoordinator::commit_or_rollback`] 按值消费，只能使用一次
#[derive(Debug)]
pub struct OptimisticSnapshot {
    id: Uuid,
    namespace: CacheNamespace,
    entity_id: String,
    previous: Option<CachedValue>,
    epoch: u64,
    _permit: MutationPermit,
}

impl OptimisticSnapshot {
    /// 变更句柄标识
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn namespace(&self) -> &CacheNamespace {
        &self.namespace
    }

    pub fn entity_id(&self) -> &str {
        &self.entity_id
    }

    /// 修补前的缓存值，缓存未命中时为 `None`
    pub fn previous_value(&self) -> Option<&CachedValue> {
        self.previous.as_ref()
    }

    /// 缓存未命中时的快照：没有修补，也无需回滚
    pub fn is_empty(&self) -> bool {
        self.previous.is_none()
    }
}

/// 目录缓存协调器
///
/// 目录作用域缓存项的唯一写入者。其他代码只能通过
/// `begin_optimistic_toggle`/`commit_or_rollback` 或失效接口访问这些缓存项
pub struct DirectoryCacheCoordinator {
    cache: Arc<dyn QueryCache>,
    gate: MutationGate,
    /// 每个主体的驱逐代次，`evict_principal` 时递增
    epochs: DashMap<String, u64>,
}

impl DirectoryCacheCoordinator {
    /// 创建协调器
    ///
    /// # 参数
    ///
    /// * `cache` - 注入的查询缓存，应用启动时创建一次
    /// * `policy` - 同一实体并发切换的处理策略
    pub fn new(cache: Arc<dyn QueryCache>, policy: ConflictPolicy) -> Self {
        Self {
            cache,
            gate: MutationGate::new(policy),
            epochs: DashMap::new(),
        }
    }

    pub fn cache(&self) -> &Arc<dyn QueryCache> {
        &self.cache
    }

    pub fn gate(&self) -> &MutationGate {
        &self.gate
    }

    /// 构造命名空间，见 [`namespace::namespace_for`]
    pub fn namespace_for(
        &self,
        principal_id: Option<&str>,
        scope: Scope,
        entity_id: Option<&str>,
    ) -> CacheNamespace {
        namespace::namespace_for(principal_id, scope, entity_id)
    }

    /// 开始一次乐观切换
    ///
    /// 1. 获取 (principal, entity) 的变更许可
    /// 2. 取消 `namespace` 上进行中的拉取，避免旧响应覆盖补丁
    /// 3. 读取当前缓存值，未命中时返回空快照
    /// 4. 写入把匹配条目 `active` 取反后的副本
    #[instrument(
        skip(self, namespace),
        level = "debug",
        fields(key = %redact_cache_key(&namespace.key()))
    )]
    pub async fn begin_optimistic_toggle(
        &self,
        namespace: &CacheNamespace,
        entity_id: &str,
    ) -> Result<OptimisticSnapshot> {
        let permit = self.gate.acquire(namespace.principal(), entity_id).await?;
        let epoch = self.epoch(namespace.principal());
        let key = namespace.key();

        self.cache.cancel_in_flight(&key);

        let previous: Option<CachedValue> = self.cache.get(&key).await?;
        match &previous {
            Some(value) => {
                let (patched, matched) = value.with_toggled(entity_id);
                if !matched {
                    debug!("optimistic toggle: entity={} not present in cached value", entity_id);
                }
                self.cache.set(&key, &patched).await?;
                GLOBAL_METRICS.record_mutation("begin", "patched");
            }
            None => {
                debug!("optimistic toggle: cache miss, nothing to patch");
                GLOBAL_METRICS.record_mutation("begin", "miss");
            }
        }

        Ok(OptimisticSnapshot {
            id: Uuid::new_v4(),
            namespace: namespace.clone(),
            entity_id: entity_id.to_string(),
            previous,
            epoch,
            _permit: permit,
        })
    }

    /// 结算一次乐观切换
    ///
    /// 失败时写回快照值；无论结果如何都失效该主体的 list、directory
    /// 以及该实体的 detail 命名空间，随后释放变更许可。
    /// 快照之后主体已被驱逐时不写回，被驱逐的缓存项保持不存在
    #[instrument(
        skip(self, snapshot),
        level = "debug",
        fields(mutation = %snapshot.id, key = %redact_cache_key(&snapshot.namespace.key()))
    )]
    pub async fn commit_or_rollback(
        &self,
        snapshot: OptimisticSnapshot,
        outcome: MutationOutcome,
    ) -> Result<()> {
        let key = snapshot.namespace.key();

        match (outcome, &snapshot.previous) {
            (MutationOutcome::Failure, Some(_))
                if self.epoch(snapshot.namespace.principal()) != snapshot.epoch =>
            {
                debug!("principal evicted since snapshot, rollback skipped");
                GLOBAL_METRICS.record_mutation("settle", "rollback_evicted");
            }
            (MutationOutcome::Failure, Some(previous)) => {
                self.cache.set(&key, previous).await?;
                let principal = snapshot.namespace.principal();
                if self.epoch(principal) != snapshot.epoch {
                    // 写回期间被驱逐
                    self.cache
                        .remove_prefix(&principal_prefix(Some(principal)))
                        .await?;
                }
                debug!("optimistic toggle rolled back");
                GLOBAL_METRICS.record_mutation("settle", "rollback");
            }
            (MutationOutcome::Failure, None) => {
                GLOBAL_METRICS.record_mutation("settle", "rollback_noop");
            }
            (MutationOutcome::Success, _) => {
                GLOBAL_METRICS.record_mutation("settle", "commit");
            }
        }

        self.invalidate_entity(Some(snapshot.namespace.principal()), &snapshot.entity_id)
            .await?;
        if !Self::is_settle_target(&snapshot.namespace, &snapshot.entity_id) {
            self.cache.invalidate(&key).await?;
        }
        Ok(())
    }

    /// 完整执行一次乐观切换
    ///
    /// 成功时返回远程调用的结果，结算失败只记录日志；
    /// 失败时回滚并原样返回远程错误
    pub async fn run_toggle<T, F, Fut>(
        &self,
        namespace: &CacheNamespace,
        entity_id: &str,
        call: F,
    ) -> Result<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = std::result::Result<T, RemoteError>>,
    {
        let snapshot = self.begin_optimistic_toggle(namespace, entity_id).await?;
        match call().await {
            Ok(value) => {
                if let Err(e) = self
                    .commit_or_rollback(snapshot, MutationOutcome::Success)
                    .await
                {
                    warn!("settle after confirmed toggle failed: {}", e);
                }
                Ok(value)
            }
            Err(remote) => {
                warn!(
                    "toggle of entity={} failed ({}), rolling back",
                    entity_id, remote.kind
                );
                if let Err(e) = self
                    .commit_or_rollback(snapshot, MutationOutcome::Failure)
                    .await
                {
                    warn!("settle after failed toggle also failed: {}", e);
                }
                Err(CacheError::MutationFailed(remote))
            }
        }
    }

    /// 失效某主体下与实体相关的 list、directory、detail 命名空间
    #[instrument(skip(self, principal_id), level = "debug")]
    pub async fn invalidate_entity(&self, principal_id: Option<&str>, entity_id: &str) -> Result<()> {
        for ns in Self::settle_targets(principal_id, entity_id) {
            self.cache.invalidate(&ns.key()).await?;
        }
        Ok(())
    }

    /// 失效某主体下的 list 与 directory 命名空间
    #[instrument(skip(self, principal_id), level = "debug")]
    pub async fn invalidate_listings(&self, principal_id: Option<&str>) -> Result<()> {
        for scope in [Scope::List, Scope::Directory] {
            self.cache
                .invalidate(&namespace::namespace_for(principal_id, scope, None).key())
                .await?;
        }
        Ok(())
    }

    /// 只失效某实体的 detail 命名空间
    #[instrument(skip(self, principal_id), level = "debug")]
    pub async fn invalidate_detail(&self, principal_id: Option<&str>, entity_id: &str) -> Result<()> {
        let ns = namespace::namespace_for(principal_id, Scope::Detail, Some(entity_id));
        self.cache.invalidate(&ns.key()).await
    }

    /// 失效某主体的全部缓存项
    pub async fn invalidate_principal(&self, principal_id: Option<&str>) -> Result<usize> {
        let count = self
            .cache
            .invalidate_prefix(&principal_prefix(principal_id))
            .await?;
        info!(
            "invalidated {} entries for principal {}",
            count,
            redact_principal(principal_id.unwrap_or(namespace::ANONYMOUS_PRINCIPAL))
        );
        Ok(count)
    }

    /// 删除某主体的全部缓存项，并取消其进行中的拉取
    ///
    /// 之前开始、尚未结算的乐观切换不会再把快照写回
    pub async fn evict_principal(&self, principal_id: Option<&str>) -> Result<usize> {
        let principal = principal_id.unwrap_or(namespace::ANONYMOUS_PRINCIPAL);
        *self.epochs.entry(principal.to_string()).or_insert(0) += 1;
        self.cache
            .remove_prefix(&principal_prefix(principal_id))
            .await
    }

    fn epoch(&self, principal: &str) -> u64 {
        self.epochs.get(principal).map(|e| *e).unwrap_or(0)
    }

    fn settle_targets(principal_id: Option<&str>, entity_id: &str) -> [CacheNamespace; 3] {
        [
            namespace::namespace_for(principal_id, Scope::List, None),
            namespace::namespace_for(principal_id, Scope::Directory, None),
            namespace::namespace_for(principal_id, Scope::Detail, Some(entity_id)),
        ]
    }

    fn is_settle_target(ns: &CacheNamespace, entity_id: &str) -> bool {
        Self::settle_targets(Some(ns.principal()), entity_id).contains(ns)
    }
}
