//! Copyright (c) 2025-2026, Kirky.X
//!
//! MIT License
//!
//! 该模块实现了界面层调用的住户目录读写入口：解析主体、读穿缓存、
//! 过期时拉取，并把所有变更交给协调器处理。

use crate::client::QueryCacheExt;
use crate::coordinator::DirectoryCacheCoordinator;
use crate::error::{CacheError, RemoteError, Result};
use crate::identity::IdentityProvider;
use crate::metrics::GLOBAL_METRICS;
use crate::model::{
    CachedValue, CareRecord, CareRecordRequest, DirectoryEntry, DirectoryListing, RecordKind,
    ResidentRequest,
};
use crate::namespace::{CacheNamespace, Scope};
use crate::remote::{call_with_timeout, RemoteResult, ResidentService};
use crate::utils::redaction::redact_cache_key;
use chrono::{DateTime, Utc};
use secrecy::SecretString;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, instrument, warn};

/// 住户目录
pub struct ResidentDirectory {
    coordinator: Arc<DirectoryCacheCoordinator>,
    service: Arc<dyn ResidentService>,
    identity: Arc<dyn IdentityProvider>,
    list_timeout: Duration,
}

impl ResidentDirectory {
    /// 创建住户目录
    ///
    /// # 参数
    ///
    /// * `coordinator` - 共享的缓存协调器
    /// * `service` - 住户服务远程客户端
    /// * `identity` - 身份提供者，用于解析命名空间主体
    /// * `list_timeout` - 目录列表调用的客户端超时
    pub fn new(
        coordinator: Arc<DirectoryCacheCoordinator>,
        service: Arc<dyn ResidentService>,
        identity: Arc<dyn IdentityProvider>,
        list_timeout: Duration,
    ) -> Self {
        Self {
            coordinator,
            service,
            identity,
            list_timeout,
        }
    }

    pub fn coordinator(&self) -> &Arc<DirectoryCacheCoordinator> {
        &self.coordinator
    }

    fn principal(&self) -> Option<String> {
        self.identity.current_principal()
    }

    fn namespace(&self, scope: Scope, entity_id: Option<&str>) -> CacheNamespace {
        let principal = self.principal();
        self.coordinator
            .namespace_for(principal.as_deref(), scope, entity_id)
    }

    /// 完整住户列表（list 作用域）
    #[instrument(skip(self), level = "debug")]
    pub async fn residents(&self) -> Result<DirectoryListing> {
        let ns = self.namespace(Scope::List, None);
        let service = self.service.clone();
        let value = self
            .read_through(&ns, async move {
                let listing = DirectoryListing::new(service.list().await?);
                Ok::<_, RemoteError>(Some(CachedValue::Listing(listing)))
            })
            .await?;
        Ok(value.and_then(CachedValue::into_listing).unwrap_or_default())
    }

    /// 轻量目录列表（directory 作用域），带客户端超时
    #[instrument(skip(self), level = "debug")]
    pub async fn directory(&self) -> Result<DirectoryListing> {
        let ns = self.namespace(Scope::Directory, None);
        let service = self.service.clone();
        let fetch = call_with_timeout(self.list_timeout, async move {
            let listing = DirectoryListing::new(service.directory().await?);
            Ok::<_, RemoteError>(Some(CachedValue::Listing(listing)))
        });
        let value = self.read_through(&ns, fetch).await?;
        Ok(value.and_then(CachedValue::into_listing).unwrap_or_default())
    }

    /// 单个住户详情（detail 作用域），住户不存在时返回 `None`
    #[instrument(skip(self), level = "debug")]
    pub async fn resident(&self, id: &str) -> Result<Option<DirectoryEntry>> {
        let ns = self.namespace(Scope::Detail, Some(id));
        let service = self.service.clone();
        let value = self
            .read_through(&ns, async move {
                Ok::<_, RemoteError>(service.get(id).await?.map(CachedValue::Entry))
            })
            .await?;
        Ok(value.and_then(CachedValue::into_entry))
    }

    /// 读穿缓存
    ///
    /// 新鲜的缓存值直接返回；否则发起拉取。拉取期间如果被取消，
    /// 响应不写入缓存，调用方拿到当前缓存值（若有）
    async fn read_through<Fut>(
        &self,
        ns: &CacheNamespace,
        fetch: Fut,
    ) -> Result<Option<CachedValue>>
    where
        Fut: Future<Output = RemoteResult<Option<CachedValue>>>,
    {
        let cache = self.coordinator.cache();
        let key = ns.key();

        if !cache.is_stale(&key).await? {
            if let Some(value) = cache.get::<CachedValue>(&key).await? {
                return Ok(Some(value));
            }
        }

        let ticket = cache.begin_fetch(&key);
        let start = Instant::now();
        let result = fetch.await;
        cache.finish_fetch(&ticket);
        GLOBAL_METRICS.record_duration("directory", "fetch", start.elapsed().as_secs_f64());

        let fetched = match result {
            Ok(fetched) => fetched,
            Err(remote) => {
                warn!(
                    "fetch of {} failed: {}",
                    redact_cache_key(&key),
                    remote.kind
                );
                GLOBAL_METRICS.record_request("directory", "fetch", "error");
                return Err(CacheError::FetchFailed(remote));
            }
        };

        if ticket.is_cancelled() {
            debug!(
                "fetch of {} was cancelled, response discarded",
                redact_cache_key(&key)
            );
            GLOBAL_METRICS.record_request("directory", "fetch", "cancelled");
            let current = cache.get::<CachedValue>(&key).await?;
            return Ok(current.or(fetched));
        }

        GLOBAL_METRICS.record_request("directory", "fetch", "ok");
        if let Some(value) = &fetched {
            cache.set(&key, value).await?;
        }
        Ok(fetched)
    }

    /// 新建住户，结束后失效列表
    #[instrument(skip(self, request), level = "debug")]
    pub async fn create_resident(&self, request: ResidentRequest) -> Result<DirectoryEntry> {
        let principal = self.principal();
        let result = self.service.create(request).await;
        match &result {
            Ok(entry) => {
                self.coordinator
                    .invalidate_entity(principal.as_deref(), &entry.id)
                    .await?
            }
            Err(_) => self.coordinator.invalidate_listings(principal.as_deref()).await?,
        }
        result.map_err(mutation_failed)
    }

    /// 更新住户资料
    #[instrument(skip(self, request), level = "debug")]
    pub async fn update_resident(
        &self,
        id: &str,
        request: ResidentRequest,
    ) -> Result<DirectoryEntry> {
        let principal = self.principal();
        let result = self.service.update(id, request).await;
        self.coordinator
            .invalidate_entity(principal.as_deref(), id)
            .await?;
        result.map_err(mutation_failed)
    }

    /// 删除住户
    #[instrument(skip(self), level = "debug")]
    pub async fn delete_resident(&self, id: &str) -> Result<()> {
        let principal = self.principal();
        let result = self.service.delete(id).await;
        self.coordinator
            .invalidate_entity(principal.as_deref(), id)
            .await?;
        result.map_err(mutation_failed)
    }

    /// 切换住户在住状态
    ///
    /// 在 directory 命名空间上乐观修补，远程调用失败时回滚
    #[instrument(skip(self), level = "debug")]
    pub async fn toggle_resident_status(&self, id: &str) -> Result<DirectoryEntry> {
        let ns = self.namespace(Scope::Directory, None);
        let service = self.service.clone();
        self.coordinator
            .run_toggle(&ns, id, || async move { service.toggle_status(id).await })
            .await
    }

    /// 新建护理记录
    #[instrument(skip(self, request), level = "debug")]
    pub async fn create_record(
        &self,
        kind: RecordKind,
        entity_id: &str,
        request: CareRecordRequest,
    ) -> Result<CareRecord> {
        let principal = self.principal();
        let result = self.service.create_record(kind, entity_id, request).await;
        self.coordinator
            .invalidate_detail(principal.as_deref(), entity_id)
            .await?;
        result.map_err(mutation_failed)
    }

    /// 住户的某类护理记录
    #[instrument(skip(self), level = "debug")]
    pub async fn records(&self, kind: RecordKind, entity_id: &str) -> Result<Vec<CareRecord>> {
        self.service
            .list_records(kind, entity_id)
            .await
            .map_err(CacheError::FetchFailed)
    }

    /// 删除护理记录
    #[instrument(skip(self), level = "debug")]
    pub async fn delete_record(
        &self,
        kind: RecordKind,
        entity_id: &str,
        recorded_at: DateTime<Utc>,
    ) -> Result<()> {
        let principal = self.principal();
        let result = self
            .service
            .delete_record(kind, entity_id, recorded_at)
            .await;
        self.coordinator
            .invalidate_detail(principal.as_deref(), entity_id)
            .await?;
        result.map_err(mutation_failed)
    }

    /// 登录，之后的读写进入该主体的命名空间
    pub fn login(&self, principal: &str, token: SecretString) {
        self.identity.login(principal, token);
    }

    /// 退出登录并丢弃当前主体的全部缓存项
    pub async fn logout(&self) -> Result<()> {
        let principal = self.principal();
        let removed = self.coordinator.evict_principal(principal.as_deref()).await?;
        debug!("logout evicted {} entries", removed);
        self.identity.logout();
        Ok(())
    }
}

fn mutation_failed(remote: RemoteError) -> CacheError {
    warn!("mutation failed: {}", remote.kind);
    CacheError::MutationFailed(remote)
}
