//! Copyright (c) 2025, Kirky.X
//!
//! MIT License
//!
//! 该模块定义了缓存协调器和远程调用层的错误类型。

use std::fmt;
use thiserror::Error;

/// 远程调用错误分类
///
/// 由远程调用层直接给出，调用方通过结构化匹配区分错误，而不是解析错误消息
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RemoteErrorKind {
    /// 未授权
    Unauthorized,
    /// 资源不存在
    NotFound,
    /// 等待超时
    Timeout,
    /// 其他错误
    Unknown,
}

impl RemoteErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RemoteErrorKind::Unauthorized => "unauthorized",
            RemoteErrorKind::NotFound => "not_found",
            RemoteErrorKind::Timeout => "timeout",
            RemoteErrorKind::Unknown => "unknown",
        }
    }
}

impl fmt::Display for RemoteErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 远程调用错误
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{kind}: {message}")]
pub struct RemoteError {
    /// 错误分类
    pub kind: RemoteErrorKind,
    /// 原始错误消息，由上层翻译为用户可读文本
    pub message: String,
}

impl RemoteError {
    pub fn new(kind: RemoteErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(RemoteErrorKind::Unauthorized, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(RemoteErrorKind::NotFound, message)
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(RemoteErrorKind::Timeout, message)
    }

    pub fn unknown(message: impl Into<String>) -> Self {
        Self::new(RemoteErrorKind::Unknown, message)
    }
}

/// 缓存系统错误类型枚举
///
/// 定义了缓存协调器对调用方暴露的错误
#[derive(Error, Debug)]
pub enum CacheError {
    /// 序列化错误
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// 配置错误
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// 被包装的远程变更调用失败，回滚已执行
    #[error("Mutation failed: {0}")]
    MutationFailed(RemoteError),

    /// 同一实体已有变更在进行中
    #[error("Mutation already in progress: {0}")]
    MutationInProgress(String),

    /// 远程读取失败
    #[error("Fetch failed: {0}")]
    FetchFailed(RemoteError),

    /// IO错误
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl CacheError {
    /// 获取底层远程错误（如果有）
    pub fn remote(&self) -> Option<&RemoteError> {
        match self {
            CacheError::MutationFailed(e) | CacheError::FetchFailed(e) => Some(e),
            _ => None,
        }
    }
}

/// 缓存操作结果类型别名
///
/// 简化错误处理，所有缓存操作都返回此类型
pub type Result<T> = std::result::Result<T, CacheError>;
