//! 安全网关配置
//!
//! 定义 PIN 访问控制与安全存储相关的配置结构。

use serde::{Deserialize, Serialize};

/// 安全存储类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageType {
    /// 系统钥匙串（macOS Keychain、Windows Credential Manager、Linux Secret Service）
    System,
    /// 内存临时存储（进程重启后丢失，用于测试）
    Memory,
}

impl Default for StorageType {
    fn default() -> Self {
        StorageType::System
    }
}

/// 安全网关配置
///
/// 锁定策略默认值与产品要求一致：连续 5 次失败后锁定 15 分钟。
/// 密钥派生参数（迭代次数、盐长度）是安全常量，不在此暴露。
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SecurityConfig {
    /// 存储类型（system/memory）
    #[serde(default)]
    pub storage: StorageType,

    /// 触发锁定的连续失败次数上限
    #[serde(default = "default_max_failed_attempts")]
    pub max_failed_attempts: u32,

    /// 锁定时长（分钟）
    #[serde(default = "default_lockout_minutes")]
    pub lockout_minutes: i64,

    /// 系统钥匙串中使用的服务名（默认 "CaseNotes"）
    #[serde(skip_serializing_if = "Option::is_none")]
    pub service_name: Option<String>,
}

fn default_max_failed_attempts() -> u32 {
    5
}

fn default_lockout_minutes() -> i64 {
    15
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            storage: StorageType::default(),
            max_failed_attempts: default_max_failed_attempts(),
            lockout_minutes: default_lockout_minutes(),
            service_name: None,
        }
    }
}

impl SecurityConfig {
    /// 创建新的配置
    pub fn new() -> Self {
        Self::default()
    }

    /// 设置存储类型
    pub fn with_storage(mut self, storage: StorageType) -> Self {
        self.storage = storage;
        self
    }

    /// 设置失败次数上限
    pub fn with_max_failed_attempts(mut self, attempts: u32) -> Self {
        self.max_failed_attempts = attempts;
        self
    }

    /// 设置锁定时长（分钟）
    pub fn with_lockout_minutes(mut self, minutes: i64) -> Self {
        self.lockout_minutes = minutes;
        self
    }

    /// 设置钥匙串服务名
    pub fn with_service_name(mut self, name: impl Into<String>) -> Self {
        self.service_name = Some(name.into());
        self
    }

    /// 验证配置的有效性
    pub fn validate(&self) -> Result<(), String> {
        if self.max_failed_attempts == 0 {
            return Err("maxFailedAttempts 必须大于 0".to_string());
        }

        if self.lockout_minutes <= 0 {
            return Err("lockoutMinutes 必须大于 0".to_string());
        }

        if let Some(name) = &self.service_name {
            if name.trim().is_empty() {
                return Err("serviceName 不能为空白".to_string());
            }
        }

        Ok(())
    }
}
