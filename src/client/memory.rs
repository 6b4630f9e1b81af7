//! Copyright (c) 2025-2026, Kirky.X
//!
//! MIT License
//!
//! 该模块定义了基于内存后端的查询缓存客户端。

use super::{FetchTicket, QueryCache};
use crate::backend::memory::MemoryBackend;
use crate::error::Result;
use crate::metrics::GLOBAL_METRICS;
use crate::serialization::SerializerEnum;
use crate::utils::redaction::redact_cache_key;
use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, instrument};

/// 内存查询缓存客户端
///
/// 在内存后端之上维护进行中拉取的登记表，使乐观更新可以取消
/// 会覆盖补丁的旧拉取
pub struct MemoryQueryCache {
    /// 缓存名称，用于指标标签
    name: String,
    /// 内存后端
    backend: Arc<MemoryBackend>,
    /// 进行中的拉取，按缓存键登记
    in_flight: DashMap<String, FetchTicket>,
    /// 拉取代次
    generation: AtomicU64,
    /// 序列化器
    serializer: SerializerEnum,
}

impl MemoryQueryCache {
    /// 创建新的内存查询缓存客户端
    pub fn new(
        name: impl Into<String>,
        backend: Arc<MemoryBackend>,
        serializer: SerializerEnum,
    ) -> Self {
        Self {
            name: name.into(),
            backend,
            in_flight: DashMap::new(),
            generation: AtomicU64::new(0),
            serializer,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// 当前进行中的拉取数量
    pub fn in_flight_count(&self) -> usize {
        self.in_flight.len()
    }
}

#[async_trait]
impl QueryCache for MemoryQueryCache {
    #[instrument(
        skip_all,
        level = "debug",
        fields(cache = %self.name, key = %redact_cache_key(key))
    )]
    async fn get_bytes(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let found = self.backend.get_bytes(key).await?;
        let result = if found.is_some() { "hit" } else { "miss" };
        GLOBAL_METRICS.record_request(&self.name, "get", result);
        Ok(found)
    }

    #[instrument(
        skip_all,
        level = "debug",
        fields(cache = %self.name, key = %redact_cache_key(key))
    )]
    async fn set_bytes(&self, key: &str, value: Vec<u8>) -> Result<()> {
        let start = std::time::Instant::now();
        self.backend.set_bytes(key, value).await?;
        GLOBAL_METRICS.record_duration(&self.name, "set", start.elapsed().as_secs_f64());
        Ok(())
    }

    #[instrument(
        skip_all,
        level = "debug",
        fields(cache = %self.name, key = %redact_cache_key(key))
    )]
    async fn invalidate(&self, key: &str) -> Result<()> {
        self.backend.invalidate(key).await?;
        GLOBAL_METRICS.record_request(&self.name, "invalidate", "success");
        Ok(())
    }

    #[instrument(
        skip_all,
        level = "debug",
        fields(cache = %self.name, prefix = %redact_cache_key(prefix))
    )]
    async fn invalidate_prefix(&self, prefix: &str) -> Result<usize> {
        self.backend.invalidate_prefix(prefix).await
    }

    #[instrument(
        skip_all,
        level = "debug",
        fields(cache = %self.name, prefix = %redact_cache_key(prefix))
    )]
    async fn remove_prefix(&self, prefix: &str) -> Result<usize> {
        let keys: Vec<String> = self
            .in_flight
            .iter()
            .filter(|entry| entry.key().starts_with(prefix))
            .map(|entry| entry.key().clone())
            .collect();
        for key in keys {
            self.cancel_in_flight(&key);
        }
        self.backend.delete_prefix(prefix).await
    }

    #[instrument(
        skip_all,
        level = "debug",
        fields(cache = %self.name, key = %redact_cache_key(key))
    )]
    async fn is_stale(&self, key: &str) -> Result<bool> {
        self.backend.is_stale(key).await
    }

    fn begin_fetch(&self, key: &str) -> FetchTicket {
        let generation = self.generation.fetch_add(1, Ordering::Relaxed);
        let ticket = FetchTicket::new(key, generation);
        // 同一个键上的新拉取取代旧拉取，旧拉取的结果不再写入
        if let Some(previous) = self.in_flight.insert(key.to_string(), ticket.clone()) {
            previous.cancel();
        }
        GLOBAL_METRICS.record_request(&self.name, "fetch", "begin");
        ticket
    }

    fn finish_fetch(&self, ticket: &FetchTicket) {
        self.in_flight.remove_if(ticket.key(), |_, current| {
            current.generation() == ticket.generation()
        });
    }

    fn cancel_in_flight(&self, key: &str) {
        if let Some((_, ticket)) = self.in_flight.remove(key) {
            ticket.cancel();
            debug!(
                "cancel_in_flight: key={}, generation={}",
                redact_cache_key(key),
                ticket.generation()
            );
            GLOBAL_METRICS.record_request(&self.name, "fetch", "cancelled");
        }
    }

    fn serializer(&self) -> &SerializerEnum {
        &self.serializer
    }

    #[instrument(skip_all, level = "debug", fields(cache = %self.name))]
    async fn clear(&self) -> Result<()> {
        let keys: Vec<String> = self.in_flight.iter().map(|e| e.key().clone()).collect();
        for key in keys {
            self.cancel_in_flight(&key);
        }
        self.backend.clear()
    }
}
