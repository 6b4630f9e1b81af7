//! Copyright (c) 2025-2026, Kirky.X
//!
//! MIT License
//!
//! 该模块定义了住户目录和护理记录的数据模型。

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// 实体标识
pub type EntityId = String;

/// 目录条目
///
/// 身份由 `id` 决定，缓存修补时按 `id` 字符串相等匹配
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectoryEntry {
    pub id: EntityId,
    #[serde(default)]
    pub display_fields: BTreeMap<String, String>,
    pub active: bool,
}

impl DirectoryEntry {
    pub fn new(id: impl Into<EntityId>, active: bool) -> Self {
        Self {
            id: id.into(),
            display_fields: BTreeMap::new(),
            active,
        }
    }

    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.display_fields.insert(name.into(), value.into());
        self
    }
}

/// 目录列表（list 与 directory 作用域缓存的值）
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DirectoryListing {
    pub residents: Vec<DirectoryEntry>,
}

impl DirectoryListing {
    pub fn new(residents: Vec<DirectoryEntry>) -> Self {
        Self { residents }
    }

    pub fn find(&self, entity_id: &str) -> Option<&DirectoryEntry> {
        self.residents.iter().find(|e| e.id == entity_id)
    }
}

/// 缓存槽中保存的值
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CachedValue {
    /// list / directory 作用域
    Listing(DirectoryListing),
    /// detail 作用域
    Entry(DirectoryEntry),
}

impl CachedValue {
    /// 返回把指定条目的 `active` 取反后的副本，以及是否命中了该条目
    pub fn with_toggled(&self, entity_id: &str) -> (CachedValue, bool) {
        match self {
            CachedValue::Listing(listing) => {
                let mut matched = false;
                let residents = listing
                    .residents
                    .iter()
                    .map(|entry| {
                        if entry.id == entity_id {
                            matched = true;
                            DirectoryEntry {
                                active: !entry.active,
                                ..entry.clone()
                            }
                        } else {
                            entry.clone()
                        }
                    })
                    .collect();
                (CachedValue::Listing(DirectoryListing { residents }), matched)
            }
            CachedValue::Entry(entry) if entry.id == entity_id => (
                CachedValue::Entry(DirectoryEntry {
                    active: !entry.active,
                    ..entry.clone()
                }),
                true,
            ),
            CachedValue::Entry(_) => (self.clone(), false),
        }
    }

    /// 查找指定条目
    pub fn entry(&self, entity_id: &str) -> Option<&DirectoryEntry> {
        match self {
            CachedValue::Listing(listing) => listing.find(entity_id),
            CachedValue::Entry(entry) => (entry.id == entity_id).then_some(entry),
        }
    }

    pub fn into_listing(self) -> Option<DirectoryListing> {
        match self {
            CachedValue::Listing(listing) => Some(listing),
            CachedValue::Entry(_) => None,
        }
    }

    pub fn into_entry(self) -> Option<DirectoryEntry> {
        match self {
            CachedValue::Entry(entry) => Some(entry),
            CachedValue::Listing(_) => None,
        }
    }
}

/// 住户创建/更新请求
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ResidentRequest {
    #[serde(default)]
    pub display_fields: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub active: Option<bool>,
}

/// 护理记录类别
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordKind {
    /// 生命体征
    Vitals,
    /// 给药记录
    MedicationAdministration,
    /// 日常生活活动
    DailyLiving,
}

impl RecordKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordKind::Vitals => "vitals",
            RecordKind::MedicationAdministration => "medication_administration",
            RecordKind::DailyLiving => "daily_living",
        }
    }
}

/// 护理记录，按 `(entity_id, recorded_at)` 寻址
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CareRecord {
    pub entity_id: EntityId,
    pub kind: RecordKind,
    pub recorded_at: DateTime<Utc>,
    #[serde(default)]
    pub fields: BTreeMap<String, String>,
}

/// 护理记录创建请求
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CareRecordRequest {
    pub recorded_at: DateTime<Utc>,
    #[serde(default)]
    pub fields: BTreeMap<String, String>,
}
