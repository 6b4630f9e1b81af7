//! Copyright (c) 2025-2026, Kirky.X
//!
//! MIT License
//!
//! 该模块定义了测试的通用工具函数和设置。

use async_trait::async_trait;
use carecache::model::{CareRecord, CareRecordRequest, DirectoryEntry, RecordKind, ResidentRequest};
use carecache::{
    CacheManager, Config, IdentityProvider, RemoteError, RemoteResult, ResidentDirectory,
    ResidentService, SessionIdentity,
};
use chrono::{DateTime, Utc};
use secrecy::SecretString;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, Once};
use std::time::Duration;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::EnvFilter;

static INIT: Once = Once::new();

pub fn setup_logging() {
    INIT.call_once(|| {
        tracing_subscriber::fmt()
            .with_span_events(FmtSpan::CLOSE)
            .with_env_filter(EnvFilter::new("debug"))
            .try_init()
            .ok();
    });
}

/// 生成唯一的主体名，避免测试之间共享命名空间
#[allow(dead_code)]
pub fn unique_principal(prefix: &str) -> String {
    format!("{}-{}", prefix, uuid::Uuid::new_v4().simple())
}

/// 使用给定配置初始化缓存管理器
#[allow(dead_code)]
pub fn setup_manager(config: Config) -> CacheManager {
    setup_logging();
    CacheManager::init(config).expect("CacheManager init failed")
}

/// 创建已登录指定主体的住户目录
#[allow(dead_code)]
pub fn login_directory(
    manager: &CacheManager,
    service: Arc<MockResidentService>,
    principal: Option<&str>,
) -> (ResidentDirectory, Arc<SessionIdentity>) {
    let identity = Arc::new(SessionIdentity::new());
    if let Some(principal) = principal {
        identity.login(principal, SecretString::from("test-token"));
    }
    let directory = manager.directory(service, identity.clone());
    (directory, identity)
}

/// 模拟住户服务
///
/// 在内存中保存住户和护理记录，可配置读写延迟和失败
#[derive(Default)]
#[allow(dead_code)]
pub struct MockResidentService {
    residents: Mutex<Vec<DirectoryEntry>>,
    records: Mutex<Vec<CareRecord>>,
    fetch_delay: Mutex<Duration>,
    toggle_delay: Mutex<Duration>,
    read_error: Mutex<Option<RemoteError>>,
    write_error: Mutex<Option<RemoteError>>,
    pub list_calls: AtomicUsize,
    pub directory_calls: AtomicUsize,
    pub directory_completed: AtomicUsize,
    pub get_calls: AtomicUsize,
    pub toggle_calls: AtomicUsize,
}

#[allow(dead_code)]
impl MockResidentService {
    pub fn with_residents(residents: Vec<DirectoryEntry>) -> Arc<Self> {
        let service = Self::default();
        *service.residents.lock().unwrap() = residents;
        Arc::new(service)
    }

    pub fn set_fetch_delay(&self, delay: Duration) {
        *self.fetch_delay.lock().unwrap() = delay;
    }

    pub fn set_toggle_delay(&self, delay: Duration) {
        *self.toggle_delay.lock().unwrap() = delay;
    }

    /// 之后的读取调用都返回该错误
    pub fn fail_reads_with(&self, error: Option<RemoteError>) {
        *self.read_error.lock().unwrap() = error;
    }

    /// 之后的写入调用都返回该错误
    pub fn fail_writes_with(&self, error: Option<RemoteError>) {
        *self.write_error.lock().unwrap() = error;
    }

    /// 服务端当前的住户状态
    pub fn server_entry(&self, id: &str) -> Option<DirectoryEntry> {
        self.residents
            .lock()
            .unwrap()
            .iter()
            .find(|e| e.id == id)
            .cloned()
    }

    async fn before_read(&self) -> RemoteResult<Vec<DirectoryEntry>> {
        // 先取快照再等待，模拟已经在路上的旧响应
        let snapshot = self.residents.lock().unwrap().clone();
        let error = self.read_error.lock().unwrap().clone();
        let delay = *self.fetch_delay.lock().unwrap();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        match error {
            Some(e) => Err(e),
            None => Ok(snapshot),
        }
    }

    fn check_write(&self) -> RemoteResult<()> {
        match self.write_error.lock().unwrap().clone() {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl ResidentService for MockResidentService {
    async fn list(&self) -> RemoteResult<Vec<DirectoryEntry>> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        self.before_read().await
    }

    async fn directory(&self) -> RemoteResult<Vec<DirectoryEntry>> {
        self.directory_calls.fetch_add(1, Ordering::SeqCst);
        let result = self.before_read().await;
        self.directory_completed.fetch_add(1, Ordering::SeqCst);
        result
    }

    async fn get(&self, id: &str) -> RemoteResult<Option<DirectoryEntry>> {
        self.get_calls.fetch_add(1, Ordering::SeqCst);
        let residents = self.before_read().await?;
        Ok(residents.into_iter().find(|e| e.id == id))
    }

    async fn create(&self, request: ResidentRequest) -> RemoteResult<DirectoryEntry> {
        self.check_write()?;
        let mut residents = self.residents.lock().unwrap();
        let entry = DirectoryEntry {
            id: format!("r-{}", residents.len() + 1),
            display_fields: request.display_fields,
            active: request.active.unwrap_or(true),
        };
        residents.push(entry.clone());
        Ok(entry)
    }

    async fn update(&self, id: &str, request: ResidentRequest) -> RemoteResult<DirectoryEntry> {
        self.check_write()?;
        let mut residents = self.residents.lock().unwrap();
        let entry = residents
            .iter_mut()
            .find(|e| e.id == id)
            .ok_or_else(|| RemoteError::not_found(format!("resident {} not found", id)))?;
        entry.display_fields.extend(request.display_fields);
        if let Some(active) = request.active {
            entry.active = active;
        }
        Ok(entry.clone())
    }

    async fn toggle_status(&self, id: &str) -> RemoteResult<DirectoryEntry> {
        self.toggle_calls.fetch_add(1, Ordering::SeqCst);
        let delay = *self.toggle_delay.lock().unwrap();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        self.check_write()?;
        let mut residents = self.residents.lock().unwrap();
        let entry = residents
            .iter_mut()
            .find(|e| e.id == id)
            .ok_or_else(|| RemoteError::not_found(format!("resident {} not found", id)))?;
        entry.active = !entry.active;
        Ok(entry.clone())
    }

    async fn delete(&self, id: &str) -> RemoteResult<()> {
        self.check_write()?;
        self.residents.lock().unwrap().retain(|e| e.id != id);
        Ok(())
    }

    async fn create_record(
        &self,
        kind: RecordKind,
        entity_id: &str,
        request: CareRecordRequest,
    ) -> RemoteResult<CareRecord> {
        self.check_write()?;
        let record = CareRecord {
            entity_id: entity_id.to_string(),
            kind,
            recorded_at: request.recorded_at,
            fields: request.fields,
        };
        self.records.lock().unwrap().push(record.clone());
        Ok(record)
    }

    async fn list_records(
        &self,
        kind: RecordKind,
        entity_id: &str,
    ) -> RemoteResult<Vec<CareRecord>> {
        if let Some(e) = self.read_error.lock().unwrap().clone() {
            return Err(e);
        }
        Ok(self
            .records
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.kind == kind && r.entity_id == entity_id)
            .cloned()
            .collect())
    }

    async fn delete_record(
        &self,
        kind: RecordKind,
        entity_id: &str,
        recorded_at: DateTime<Utc>,
    ) -> RemoteResult<()> {
        self.check_write()?;
        let mut records = self.records.lock().unwrap();
        let before = records.len();
        records.retain(|r| {
            !(r.kind == kind && r.entity_id == entity_id && r.recorded_at == recorded_at)
        });
        if records.len() == before {
            return Err(RemoteError::not_found("record not found"));
        }
        Ok(())
    }
}
