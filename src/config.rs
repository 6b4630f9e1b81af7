//! Copyright (c) 2025, Kirky.X
//!
//! MIT License
//!
//! 该模块定义了缓存协调器的配置结构和解析逻辑。

use crate::error::{CacheError, Result};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

pub const CONFIG_VERSION: u32 = 1;

/// 目录列表调用的默认客户端超时（毫秒）
pub const DEFAULT_LIST_TIMEOUT_MS: u64 = 15_000;

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config_version: Option<u32>,
    #[serde(default)]
    pub global: GlobalConfig,
    #[serde(default)]
    pub cache: QueryCacheConfig,
    #[serde(default)]
    pub mutation: MutationConfig,
    #[serde(default)]
    pub remote: RemoteConfig,
}

/// 全局配置
#[derive(Deserialize, Clone, Debug)]
#[serde(default)]
pub struct GlobalConfig {
    /// 服务名称，用于链路追踪和指标标签
    pub service_name: String,
    /// 日志过滤表达式（EnvFilter 语法）
    pub log_filter: String,
    /// 是否启用指标收集
    pub enable_metrics: bool,
}

impl Default for GlobalConfig {
    fn default() -> Self {
        Self {
            service_name: "carecache".to_string(),
            log_filter: "info".to_string(),
            enable_metrics: true,
        }
    }
}

/// 查询缓存配置
#[derive(Deserialize, Clone, Debug)]
#[serde(default)]
pub struct QueryCacheConfig {
    /// 最大缓存条目数
    pub max_capacity: u64,
    /// 数据保持新鲜的时长（秒），0 表示写入即过期
    pub stale_time_secs: u64,
}

impl Default for QueryCacheConfig {
    fn default() -> Self {
        Self {
            max_capacity: 10_000,
            stale_time_secs: 30,
        }
    }
}

impl QueryCacheConfig {
    pub fn stale_time(&self) -> Duration {
        Duration::from_secs(self.stale_time_secs)
    }
}

/// 同一实体并发切换时的处理策略
#[derive(Deserialize, Clone, Copy, Debug, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum ConflictPolicy {
    /// 立即拒绝第二个切换
    #[default]
    Reject,
    /// 第二个切换排队等待第一个结束
    Queue,
}

/// 变更配置
#[derive(Deserialize, Clone, Debug, Default)]
#[serde(default)]
pub struct MutationConfig {
    pub conflict_policy: ConflictPolicy,
}

/// 远程调用配置
#[derive(Deserialize, Clone, Debug)]
#[serde(default)]
pub struct RemoteConfig {
    /// 目录列表调用的超时（毫秒）
    pub list_timeout_ms: u64,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            list_timeout_ms: DEFAULT_LIST_TIMEOUT_MS,
        }
    }
}

impl RemoteConfig {
    pub fn list_timeout(&self) -> Duration {
        Duration::from_millis(self.list_timeout_ms)
    }
}

impl Config {
    /// 从TOML字符串解析配置并验证
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Config =
            toml::from_str(content).map_err(|e| CacheError::ConfigError(e.to_string()))?;
        config.validate().map_err(CacheError::ConfigError)?;
        Ok(config)
    }

    /// 从TOML文件加载配置并验证
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// 验证配置
    ///
    /// 检查配置的有效性，确保所有值在合理范围内
    pub fn validate(&self) -> std::result::Result<(), String> {
        if let Some(version) = &self.config_version {
            if *version > CONFIG_VERSION {
                return Err(format!(
                    "Configuration version {} is not supported. Current version is {}.",
                    version, CONFIG_VERSION
                ));
            }
        }

        if self.global.service_name.is_empty() {
            return Err("Global service_name cannot be empty".to_string());
        }

        if self.global.service_name.len() > 64 {
            return Err(format!(
                "Service name '{}' exceeds maximum length of 64 characters",
                self.global.service_name
            ));
        }

        if self.global.service_name.contains(':') {
            return Err("Global service_name cannot contain ':'".to_string());
        }

        if self.cache.max_capacity == 0 {
            return Err("Cache max_capacity cannot be zero".to_string());
        }

        if self.cache.stale_time_secs > 86400 {
            return Err("Cache stale_time_secs cannot exceed 1 day (86400 seconds)".to_string());
        }

        if !(100..=120_000).contains(&self.remote.list_timeout_ms) {
            return Err("Remote list_timeout_ms must be between 100 and 120000 ms".to_string());
        }

        Ok(())
    }
}
