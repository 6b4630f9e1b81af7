//! Copyright (c) 2025-2026, Kirky.X
//!
//! MIT License
//!
//! 该模块定义了按主体（principal）隔离的缓存命名空间。
//!
//! 每个缓存键都以解析后的主体作为前缀，未解析主体时使用 `"anonymous"`，
//! 因此不同主体永远不会读取或失效彼此的缓存项。

use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::fmt;

/// 未解析主体时使用的命名空间段
pub const ANONYMOUS_PRINCIPAL: &str = "anonymous";

/// 缓存键的固定前缀
pub const KEY_PREFIX: &str = "carecache";

/// 缓存作用域
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scope {
    /// 完整列表
    List,
    /// 轻量目录列表
    Directory,
    /// 单个实体详情
    Detail,
}

impl Scope {
    pub const ALL: [Scope; 3] = [Scope::List, Scope::Directory, Scope::Detail];

    pub fn as_str(&self) -> &'static str {
        match self {
            Scope::List => "list",
            Scope::Directory => "directory",
            Scope::Detail => "detail",
        }
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 缓存命名空间 `(principal, scope, [entity_id])`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheNamespace {
    principal: String,
    scope: Scope,
    entity_id: Option<String>,
}

impl CacheNamespace {
    /// 构造命名空间，`principal` 为 `None` 时映射为 `"anonymous"`
    pub fn new(principal: Option<&str>, scope: Scope, entity_id: Option<&str>) -> Self {
        Self {
            principal: resolve_principal(principal).to_string(),
            scope,
            entity_id: entity_id.map(str::to_string),
        }
    }

    pub fn principal(&self) -> &str {
        &self.principal
    }

    pub fn scope(&self) -> Scope {
        self.scope
    }

    pub fn entity_id(&self) -> Option<&str> {
        self.entity_id.as_deref()
    }

    /// 渲染为缓存键
    ///
    /// 格式为 `carecache:{principal}:{scope}[:{entity}]`，段内的 `%` 与 `:` 会被转义
    pub fn key(&self) -> String {
        let mut key = principal_prefix(Some(&self.principal));
        key.push_str(self.scope.as_str());
        if let Some(entity) = &self.entity_id {
            key.push(':');
            key.push_str(&escape_segment(entity));
        }
        key
    }
}

impl fmt::Display for CacheNamespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.key())
    }
}

/// 构造命名空间
///
/// 纯函数：相同输入总是得到相等的命名空间和缓存键
pub fn namespace_for(
    principal_id: Option<&str>,
    scope: Scope,
    entity_id: Option<&str>,
) -> CacheNamespace {
    CacheNamespace::new(principal_id, scope, entity_id)
}

/// 某个主体所有缓存键共享的前缀，以 `:` 结尾
pub fn principal_prefix(principal_id: Option<&str>) -> String {
    format!(
        "{}:{}:",
        KEY_PREFIX,
        escape_segment(resolve_principal(principal_id))
    )
}

fn resolve_principal(principal_id: Option<&str>) -> &str {
    principal_id.unwrap_or(ANONYMOUS_PRINCIPAL)
}

fn escape_segment(segment: &str) -> Cow<'_, str> {
    if !segment.contains(['%', ':']) {
        return Cow::Borrowed(segment);
    }
    let mut out = String::with_capacity(segment.len() + 4);
    for c in segment.chars() {
        match c {
            '%' => out.push_str("%25"),
            ':' => out.push_str("%3A"),
            _ => out.push(c),
        }
    }
    Cow::Owned(out)
}
