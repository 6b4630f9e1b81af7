//! Copyright (c) 2025-2026, Kirky.X
//!
//! MIT License
//!
//! 该模块定义了查询缓存的接口和实现。

pub mod memory;

use crate::error::Result;
use crate::serialization::{Serializer, SerializerEnum};
use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::instrument;

pub use memory::MemoryQueryCache;

/// 一次进行中的拉取
///
/// 拉取期间如果对应键被 `cancel_in_flight`，令牌会被取消，
/// 拉取结果不得再写入缓存
#[derive(Debug, Clone)]
pub struct FetchTicket {
    key: String,
    generation: u64,
    token: CancellationToken,
}

impl FetchTicket {
    pub fn new(key: impl Into<String>, generation: u64) -> Self {
        Self {
            key: key.into(),
            generation,
            token: CancellationToken::new(),
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    pub fn cancel(&self) {
        self.token.cancel()
    }
}

/// 查询缓存扩展特征
///
/// 提供类型安全的缓存操作接口
#[async_trait]
pub trait QueryCacheExt: QueryCache {
    /// 获取缓存值（反序列化）
    #[instrument(skip(self), level = "debug")]
    async fn get<T: DeserializeOwned + Send>(&self, key: &str) -> Result<Option<T>> {
        let bytes = self.get_bytes(key).await?;
        match bytes {
            Some(data) => {
                let val = self.serializer().deserialize(&data)?;
                Ok(Some(val))
            }
            None => Ok(None),
        }
    }

    /// 设置缓存值（序列化）
    #[instrument(skip(self, value), level = "debug")]
    async fn set<T: Serialize + Send + Sync>(&self, key: &str, value: &T) -> Result<()> {
        let bytes = self.serializer().serialize(value)?;
        self.set_bytes(key, bytes).await
    }
}

impl<T: QueryCache + ?Sized> QueryCacheExt for T {}

/// 查询缓存特征
///
/// 键值缓存抽象：读写、失效、以及对进行中拉取的取消
#[async_trait]
pub trait QueryCache: Send + Sync {
    /// 获取缓存值
    ///
    /// # 参数
    ///
    /// * `key` - 缓存键
    ///
    /// # 返回值
    ///
    /// 返回缓存值，如果不存在则返回None。过期的值仍会返回
    async fn get_bytes(&self, key: &str) -> Result<Option<Vec<u8>>>;

    /// 设置缓存值，写入后该键为新鲜状态
    async fn set_bytes(&self, key: &str, value: Vec<u8>) -> Result<()>;

    /// 将缓存项标记为过期，触发下一次读取时重新拉取
    async fn invalidate(&self, key: &str) -> Result<()>;

    /// 将所有以 `prefix` 开头的缓存项标记为过期
    async fn invalidate_prefix(&self, prefix: &str) -> Result<usize>;

    /// 删除所有以 `prefix` 开头的缓存项
    async fn remove_prefix(&self, prefix: &str) -> Result<usize>;

    /// 缓存项是否需要重新拉取，不存在的键视为过期
    async fn is_stale(&self, key: &str) -> Result<bool>;

    /// 登记一次对 `key` 的拉取
    fn begin_fetch(&self, key: &str) -> FetchTicket;

    /// 拉取结束（无论成功、失败或取消）后注销
    fn finish_fetch(&self, ticket: &FetchTicket);

    /// 取消 `key` 上进行中的拉取
    ///
    /// 幂等，没有进行中的拉取时也可以安全调用
    fn cancel_in_flight(&self, key: &str);

    /// 获取序列化器
    fn serializer(&self) -> &SerializerEnum;

    /// 清空缓存并取消所有进行中的拉取
    async fn clear(&self) -> Result<()>;
}
