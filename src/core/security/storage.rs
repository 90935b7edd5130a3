//! 安全存储抽象层
//!
//! 定义安全键值存储的 trait 接口，支持多种存储实现（系统钥匙串、内存）。
//!
//! # 架构概述
//!
//! 应用的凭证数据（PIN 哈希、盐值、提示语、锁定状态）以不透明的字符串键值对
//! 形式存放。本模块提供统一的存储抽象，允许在不同后端之间无缝切换：
//!
//! - **系统钥匙串**：Windows Credential Manager、macOS Keychain、Linux Secret Service
//! - **内存存储**：进程内临时存储（用于测试，可按需模拟故障）
//!
//! # 线程安全
//!
//! 所有 `SecureStorageProvider` 实现都是线程安全的（`Send + Sync`）。
//! 不同键上的并发操作互不干扰；同一键上的并发写采用“最后写入者胜出”，
//! 这对单用户桌面场景已经足够。

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::RwLock;

/// 安全存储错误类型
#[derive(Debug, Clone, thiserror::Error)]
pub enum SecureStorageError {
    /// 平台凭证库不可达（后端缺失、权限被拒、探测失败）
    #[error("secure storage unavailable: {0}")]
    Unavailable(String),

    /// 单次读/写/删除操作失败
    #[error("secure storage operation failed: {0}")]
    Operation(String),
}

pub type SecureStorageResult<T> = Result<T, SecureStorageError>;

/// 安全存储抽象接口
///
/// 所有实现必须保证线程安全。`delete` 是幂等的：删除不存在的键不算错误。
pub trait SecureStorageProvider: Send + Sync {
    /// 写入键值（存在则覆盖）
    fn store(&self, key: &str, value: &str) -> SecureStorageResult<()>;

    /// 读取键值，键不存在时返回 `None`
    fn retrieve(&self, key: &str) -> SecureStorageResult<Option<String>>;

    /// 删除键（幂等）
    fn delete(&self, key: &str) -> SecureStorageResult<()>;

    /// 检查键是否存在；存储故障时返回 false
    fn exists(&self, key: &str) -> bool;

    /// 后端当前是否可用
    fn is_available(&self) -> bool;
}

/// 内存安全存储（测试用）
///
/// 不落盘、不加密，仅用于测试与故障注入。支持两个开关：
/// `set_available` 模拟后端整体不可用，`set_simulate_failures`
/// 让每个操作都返回错误，用于验证上层的降级路径。
pub struct MemoryStorageProvider {
    entries: RwLock<HashMap<String, String>>,
    available: AtomicBool,
    simulate_failures: AtomicBool,
}

impl MemoryStorageProvider {
    /// 创建新的内存存储
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            available: AtomicBool::new(true),
            simulate_failures: AtomicBool::new(false),
        }
    }

    /// 设置可用性，用于测试失败场景
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    /// 开启/关闭模拟故障，用于测试错误处理
    pub fn set_simulate_failures(&self, simulate: bool) {
        self.simulate_failures.store(simulate, Ordering::SeqCst);
    }

    /// 清空所有条目，便于测试清理
    pub fn clear(&self) {
        if let Ok(mut entries) = self.entries.write() {
            entries.clear();
        }
    }

    /// 当前条目数量，便于测试断言
    pub fn len(&self) -> usize {
        self.entries.read().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn fail_if_simulating(&self, what: &str) -> SecureStorageResult<()> {
        if self.simulate_failures.load(Ordering::SeqCst) {
            return Err(SecureStorageError::Operation(format!(
                "simulated {what} failure"
            )));
        }
        Ok(())
    }
}

impl Default for MemoryStorageProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl SecureStorageProvider for MemoryStorageProvider {
    fn store(&self, key: &str, value: &str) -> SecureStorageResult<()> {
        self.fail_if_simulating("store")?;

        let mut entries = self
            .entries
            .write()
            .map_err(|e| SecureStorageError::Operation(format!("写锁获取失败: {e}")))?;

        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn retrieve(&self, key: &str) -> SecureStorageResult<Option<String>> {
        self.fail_if_simulating("retrieve")?;

        let entries = self
            .entries
            .read()
            .map_err(|e| SecureStorageError::Operation(format!("读锁获取失败: {e}")))?;

        Ok(entries.get(key).cloned())
    }

    fn delete(&self, key: &str) -> SecureStorageResult<()> {
        self.fail_if_simulating("delete")?;

        let mut entries = self
            .entries
            .write()
            .map_err(|e| SecureStorageError::Operation(format!("写锁获取失败: {e}")))?;

        // 幂等：键不存在也视为成功
        entries.remove(key);
        Ok(())
    }

    fn exists(&self, key: &str) -> bool {
        self.entries
            .read()
            .map(|entries| entries.contains_key(key))
            .unwrap_or(false)
    }

    fn is_available(&self) -> bool {
        self.available.load(Ordering::SeqCst)
    }
}
