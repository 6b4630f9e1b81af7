//! Copyright (c) 2025-2026, Kirky.X
//!
//! MIT License
//!
//! 该模块定义了缓存管理器，负责在应用启动时一次性创建查询缓存和协调器。

use crate::backend::memory::MemoryBackend;
use crate::client::{MemoryQueryCache, QueryCache};
use crate::config::Config;
use crate::coordinator::DirectoryCacheCoordinator;
use crate::directory::ResidentDirectory;
use crate::error::{CacheError, Result};
use crate::identity::IdentityProvider;
use crate::metrics::GLOBAL_METRICS;
use crate::remote::ResidentService;
use crate::serialization::{json::JsonSerializer, SerializerEnum};
use std::sync::Arc;
use tracing::{info, instrument};

/// 缓存管理器
///
/// 持有唯一的查询缓存实例，并把它显式注入给协调器和住户目录
pub struct CacheManager {
    cache: Arc<dyn QueryCache>,
    coordinator: Arc<DirectoryCacheCoordinator>,
    config: Config,
}

impl CacheManager {
    /// 初始化缓存管理器
    ///
    /// # 参数
    ///
    /// * `config` - 缓存系统配置
    ///
    /// # 返回值
    ///
    /// 配置校验失败时返回 `ConfigError`
    #[instrument(skip(config), level = "info", fields(service = %config.global.service_name))]
    pub fn init(config: Config) -> Result<Self> {
        config.validate().map_err(CacheError::ConfigError)?;
        GLOBAL_METRICS.set_enabled(config.global.enable_metrics);

        let backend = Arc::new(MemoryBackend::new(
            config.cache.max_capacity,
            config.cache.stale_time(),
        ));
        let cache: Arc<dyn QueryCache> = Arc::new(MemoryQueryCache::new(
            config.global.service_name.clone(),
            backend,
            SerializerEnum::Json(JsonSerializer::new()),
        ));
        let coordinator = Arc::new(DirectoryCacheCoordinator::new(
            cache.clone(),
            config.mutation.conflict_policy,
        ));

        info!(
            "CacheManager initialized: capacity={}, stale_time={:?}, conflict_policy={:?}",
            config.cache.max_capacity,
            config.cache.stale_time(),
            config.mutation.conflict_policy
        );

        Ok(Self {
            cache,
            coordinator,
            config,
        })
    }

    pub fn cache(&self) -> &Arc<dyn QueryCache> {
        &self.cache
    }

    pub fn coordinator(&self) -> &Arc<DirectoryCacheCoordinator> {
        &self.coordinator
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// 创建绑定到共享缓存的住户目录
    pub fn directory(
        &self,
        service: Arc<dyn ResidentService>,
        identity: Arc<dyn IdentityProvider>,
    ) -> ResidentDirectory {
        ResidentDirectory::new(
            self.coordinator.clone(),
            service,
            identity,
            self.config.remote.list_timeout(),
        )
    }

    /// 关闭：取消所有进行中的拉取并清空缓存
    #[instrument(skip(self), level = "info")]
    pub async fn shutdown(&self) -> Result<()> {
        self.cache.clear().await?;
        info!("CacheManager shut down");
        Ok(())
    }
}
