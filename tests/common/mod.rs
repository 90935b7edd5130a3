#![allow(dead_code)]
//! 公共测试支撑
//!
//! 把“内存存储 + 内存安装配置 + 管理器”组装成一个测试网关，
//! 各测试文件共享，避免重复搭建。

use std::sync::Arc;

use casenotes_security::core::config::{
    MemorySetupConfig, SecurityConfig, SetupConfig, StorageType,
};
use casenotes_security::core::pin::PinManager;
use casenotes_security::core::security::{MemoryStorageProvider, SecureStorageProvider};

/// 组装好的测试网关
pub struct TestGate {
    pub storage: Arc<MemoryStorageProvider>,
    pub setup: Arc<MemorySetupConfig>,
    pub manager: Arc<PinManager>,
}

/// 默认配置（5 次失败 / 15 分钟锁定）的内存网关
pub fn memory_gate() -> TestGate {
    memory_gate_with_config(SecurityConfig::new().with_storage(StorageType::Memory))
}

/// 指定配置的内存网关
pub fn memory_gate_with_config(config: SecurityConfig) -> TestGate {
    let storage = Arc::new(MemoryStorageProvider::new());
    let setup = Arc::new(MemorySetupConfig::new());

    let manager = Arc::new(PinManager::with_provider(
        Arc::clone(&storage) as Arc<dyn SecureStorageProvider>,
        Arc::clone(&setup) as Arc<dyn SetupConfig>,
        &config,
    ));

    TestGate {
        storage,
        setup,
        manager,
    }
}

/// 遗留安装配置的六个键，按 enabled/hash/salt/hint/attempts/lockout 的顺序
pub const LEGACY_KEYS: &[&str] = &[
    "security.pin.enabled",
    "security.pin.hash",
    "security.pin.salt",
    "security.pin.hint",
    "security.failed.attempts",
    "security.lockout.until",
];
