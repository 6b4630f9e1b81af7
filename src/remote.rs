//! Copyright (c) 2025-2026, Kirky.X
//!
//! MIT License
//!
//! 该模块定义了住户服务的远程调用接口以及客户端超时包装。

use crate::error::RemoteError;
use crate::model::{CareRecord, CareRecordRequest, DirectoryEntry, RecordKind, ResidentRequest};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::future::Future;
use std::time::Duration;
use tracing::warn;

/// 远程调用结果类型别名
pub type RemoteResult<T> = std::result::Result<T, RemoteError>;

/// 住户服务远程接口
///
/// 授权由远程服务自己负责，实现方应把服务端拒绝映射为结构化的 [`RemoteError`]
#[async_trait]
pub trait ResidentService: Send + Sync {
    /// 完整住户列表
    async fn list(&self) -> RemoteResult<Vec<DirectoryEntry>>;

    /// 轻量目录列表
    async fn directory(&self) -> RemoteResult<Vec<DirectoryEntry>>;

    async fn get(&self, id: &str) -> RemoteResult<Option<DirectoryEntry>>;

    async fn create(&self, request: ResidentRequest) -> RemoteResult<DirectoryEntry>;

    async fn update(&self, id: &str, request: ResidentRequest) -> RemoteResult<DirectoryEntry>;

    /// 切换住户的在住状态，返回服务端确认后的条目
    async fn toggle_status(&self, id: &str) -> RemoteResult<DirectoryEntry>;

    async fn delete(&self, id: &str) -> RemoteResult<()>;

    async fn create_record(
        &self,
        kind: RecordKind,
        entity_id: &str,
        request: CareRecordRequest,
    ) -> RemoteResult<CareRecord>;

    async fn list_records(&self, kind: RecordKind, entity_id: &str)
        -> RemoteResult<Vec<CareRecord>>;

    async fn delete_record(
        &self,
        kind: RecordKind,
        entity_id: &str,
        recorded_at: DateTime<Utc>,
    ) -> RemoteResult<()>;
}

/// 带客户端超时的远程调用
///
/// 调用被放到独立任务中执行并与计时器竞争。计时器先到时返回
/// `Timeout` 错误，但底层请求不会被取消，只是不再等待它
pub async fn call_with_timeout<T, F>(timeout: Duration, call: F) -> RemoteResult<T>
where
    F: Future<Output = RemoteResult<T>> + Send + 'static,
    T: Send + 'static,
{
    let handle = tokio::spawn(call);
    match tokio::time::timeout(timeout, handle).await {
        Ok(Ok(result)) => result,
        Ok(Err(join_err)) => Err(RemoteError::unknown(format!(
            "remote call task failed: {}",
            join_err
        ))),
        Err(_) => {
            warn!("remote call exceeded {}ms, no longer waiting", timeout.as_millis());
            Err(RemoteError::timeout(format!(
                "request timed out after {}ms",
                timeout.as_millis()
            )))
        }
    }
}
