//! Secure storage factory with one-time validation.
//!
//! # 设计理念
//!
//! 工厂在进程生命周期内只构造并验证一个存储实例：
//!
//! 1. 按配置创建后端（系统钥匙串或内存存储）
//! 2. 执行连通性自检（写入随机探测值 → 读回 → 删除 → 比对）
//! 3. 自检失败时缓存错误，后续调用快速失败，不再重复昂贵的平台探测
//!
//! `provider()` 在并发首调用竞争下是安全的（`OnceLock` 保证），
//! 所有调用方拿到的都是同一个实例。

use std::sync::{Arc, OnceLock};
use uuid::Uuid;

use crate::core::config::{SecurityConfig, StorageType};

use super::keychain::KeyringStorageProvider;
use super::storage::{
    MemoryStorageProvider, SecureStorageError, SecureStorageProvider, SecureStorageResult,
};

/// Key used for the connectivity self-test. Always deleted afterwards.
const PROBE_KEY: &str = "connectivity.test";

/// Factory producing the process-wide validated storage provider.
///
/// 宿主应在启动时构造一次并向下传递（依赖注入），
/// 不要在多处各自构造工厂。
pub struct SecureStorageFactory {
    storage_type: StorageType,
    service_name: Option<String>,
    provider_override: Option<Arc<dyn SecureStorageProvider>>,
    slot: OnceLock<SecureStorageResult<Arc<dyn SecureStorageProvider>>>,
}

impl SecureStorageFactory {
    /// Creates a factory for the configured backend.
    pub fn new(config: &SecurityConfig) -> Self {
        Self {
            storage_type: config.storage,
            service_name: config.service_name.clone(),
            provider_override: None,
            slot: OnceLock::new(),
        }
    }

    /// Creates a factory around a pre-built provider.
    ///
    /// 测试（或需要自定义后端的宿主）用它注入实现；
    /// 注入的实例仍要通过同一套连通性自检。
    pub fn for_provider(provider: Arc<dyn SecureStorageProvider>) -> Self {
        Self {
            storage_type: StorageType::Memory,
            service_name: None,
            provider_override: Some(provider),
            slot: OnceLock::new(),
        }
    }

    /// Returns the validated provider, constructing it on first call.
    ///
    /// 首次失败会被缓存：之后的每次调用都直接返回同一个错误，
    /// 不会重新探测平台后端。
    pub fn provider(&self) -> SecureStorageResult<Arc<dyn SecureStorageProvider>> {
        self.slot
            .get_or_init(|| self.build_and_validate())
            .clone()
    }

    /// Checks availability without propagating the error.
    pub fn is_available(&self) -> bool {
        self.provider().is_ok()
    }

    fn build_and_validate(&self) -> SecureStorageResult<Arc<dyn SecureStorageProvider>> {
        let provider: Arc<dyn SecureStorageProvider> = match &self.provider_override {
            Some(provider) => Arc::clone(provider),
            None => match self.storage_type {
                StorageType::System => {
                    let store = match &self.service_name {
                        Some(service) => KeyringStorageProvider::with_service(service)?,
                        None => KeyringStorageProvider::new()?,
                    };
                    Arc::new(store)
                }
                StorageType::Memory => Arc::new(MemoryStorageProvider::new()),
            },
        };

        match Self::run_self_test(provider.as_ref()) {
            Ok(()) => {
                tracing::info!("secure storage initialized and self-test passed");
                Ok(provider)
            }
            Err(e) => {
                tracing::error!("secure storage self-test failed: {e}");
                Err(e)
            }
        }
    }

    /// Write a random probe value, read it back, delete it, compare.
    fn run_self_test(provider: &dyn SecureStorageProvider) -> SecureStorageResult<()> {
        let token = Uuid::new_v4().to_string();

        provider.store(PROBE_KEY, &token)?;
        let read_back = provider.retrieve(PROBE_KEY)?;
        provider.delete(PROBE_KEY)?;

        if read_back.as_deref() == Some(token.as_str()) {
            Ok(())
        } else {
            Err(SecureStorageError::Unavailable(
                "secure storage connectivity test failed".to_string(),
            ))
        }
    }
}
