//! carecache - 住户目录客户端的按主体隔离查询缓存
//!
//! 提供按主体划分的缓存命名空间、状态切换的乐观更新与回滚，
//! 以及变更结束后的缓存失效。

#![doc(html_root_url = "https://docs.rs/carecache/0.1.0")]

pub use serde;
pub use serde::{Deserialize, Serialize};
pub use serde_json;
pub use tokio;

pub mod backend;
pub mod client;
pub mod config;
pub mod coordinator;
pub mod directory;
pub mod error;
pub mod identity;
pub mod manager;
pub mod metrics;
pub mod model;
pub mod namespace;
pub mod remote;
pub mod serialization;
pub mod sync;
pub mod telemetry;
pub mod utils;

// Re-export commonly used items
pub use client::{QueryCache, QueryCacheExt};
pub use config::Config;
pub use coordinator::{DirectoryCacheCoordinator, MutationOutcome, OptimisticSnapshot};
pub use directory::ResidentDirectory;
pub use error::{CacheError, RemoteError, RemoteErrorKind, Result};
pub use identity::{IdentityProvider, SessionIdentity};
pub use manager::CacheManager;
pub use namespace::{namespace_for, CacheNamespace, Scope};
pub use remote::{call_with_timeout, RemoteResult, ResidentService};

/// carecache 版本号
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
