//! Copyright (c) 2025-2026, Kirky.X
//!
//! MIT License
//!
//! 该模块定义了内存缓存后端的实现，负责保存查询结果及其新鲜度。

use crate::error::Result;
use crate::utils::redaction::redact_cache_key;
use moka::future::Cache;
use moka::ops::compute::{CompResult, Op};
use std::time::{Duration, Instant};
use tracing::{debug, instrument};

/// 缓存槽
#[derive(Clone, Debug)]
struct Slot {
    bytes: Vec<u8>,
    fetched_at: Instant,
    invalidated: bool,
}

/// 内存缓存后端实现
///
/// 使用Moka作为底层缓存库。失效只标记为过期并保留数据，
/// 读取方可以继续展示旧数据直到重新拉取完成
#[derive(Clone)]
pub struct MemoryBackend {
    cache: Cache<String, Slot>,
    stale_time: Duration,
}

impl MemoryBackend {
    /// 创建新的内存缓存后端实例
    ///
    /// # 参数
    ///
    /// * `capacity` - 缓存最大条目数
    /// * `stale_time` - 数据写入后保持新鲜的时长，为零表示写入即过期
    pub fn new(capacity: u64, stale_time: Duration) -> Self {
        Self {
            cache: Cache::builder().max_capacity(capacity).build(),
            stale_time,
        }
    }

    /// 获取缓存值（字节形式）
    #[instrument(skip_all, level = "debug")]
    pub async fn get_bytes(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let found = self.cache.get(key).await.map(|slot| slot.bytes);
        debug!(
            "memory get_bytes: key={}, found={}",
            redact_cache_key(key),
            found.is_some()
        );
        Ok(found)
    }

    /// 设置缓存值，新写入的值总是新鲜的
    #[instrument(skip_all, level = "debug")]
    pub async fn set_bytes(&self, key: &str, value: Vec<u8>) -> Result<()> {
        debug!(
            "memory set_bytes: key={}, value_len={}",
            redact_cache_key(key),
            value.len()
        );
        self.cache
            .insert(
                key.to_string(),
                Slot {
                    bytes: value,
                    fetched_at: Instant::now(),
                    invalidated: false,
                },
            )
            .await;
        Ok(())
    }

    /// 判断缓存项是否过期，不存在的键视为过期
    #[instrument(skip_all, level = "debug")]
    pub async fn is_stale(&self, key: &str) -> Result<bool> {
        Ok(match self.cache.get(key).await {
            Some(slot) => slot.invalidated || slot.fetched_at.elapsed() >= self.stale_time,
            None => true,
        })
    }

    /// 将缓存项标记为过期
    ///
    /// 读取与写回在同一次原子计算中完成，不存在的键不会被重新创建。
    /// 返回是否存在该键
    #[instrument(skip_all, level = "debug")]
    pub async fn invalidate(&self, key: &str) -> Result<bool> {
        let result = self
            .cache
            .entry_by_ref(key)
            .and_compute_with(|existing| {
                let op = match existing {
                    Some(entry) => {
                        let mut slot = entry.into_value();
                        slot.invalidated = true;
                        Op::Put(slot)
                    }
                    None => Op::Nop,
                };
                std::future::ready(op)
            })
            .await;

        let found = matches!(result, CompResult::ReplacedWith(_));
        if found {
            debug!("memory invalidate: key={}", redact_cache_key(key));
        }
        Ok(found)
    }

    /// 将所有以 `prefix` 开头的缓存项标记为过期，返回受影响的条目数
    #[instrument(skip_all, level = "debug")]
    pub async fn invalidate_prefix(&self, prefix: &str) -> Result<usize> {
        let keys = self.keys_with_prefix(prefix);
        let mut count = 0;
        for key in keys {
            if self.invalidate(&key).await? {
                count += 1;
            }
        }
        debug!(
            "memory invalidate_prefix: prefix={}, count={}",
            redact_cache_key(prefix),
            count
        );
        Ok(count)
    }

    /// 删除缓存项
    #[instrument(skip_all, level = "debug")]
    pub async fn delete(&self, key: &str) -> Result<()> {
        self.cache.remove(key).await;
        debug!("memory delete: key={}", redact_cache_key(key));
        Ok(())
    }

    /// 删除所有以 `prefix` 开头的缓存项，返回删除的条目数
    #[instrument(skip_all, level = "debug")]
    pub async fn delete_prefix(&self, prefix: &str) -> Result<usize> {
        let keys = self.keys_with_prefix(prefix);
        let count = keys.len();
        for key in keys {
            self.cache.remove(&key).await;
        }
        debug!(
            "memory delete_prefix: prefix={}, count={}",
            redact_cache_key(prefix),
            count
        );
        Ok(count)
    }

    /// 清空缓存
    #[instrument(skip_all, level = "debug")]
    pub fn clear(&self) -> Result<()> {
        self.cache.invalidate_all();
        debug!("memory clear: 缓存已清空");
        Ok(())
    }

    fn keys_with_prefix(&self, prefix: &str) -> Vec<String> {
        self.cache
            .iter()
            .filter(|(key, _)| key.starts_with(prefix))
            .map(|(key, _)| (*key).clone())
            .collect()
    }
}
