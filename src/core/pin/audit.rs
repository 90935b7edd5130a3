//! 安全审计日志模块
//!
//! 记录 PIN 相关操作的审计轨迹（操作类型、时间、结果、是否处于锁定），
//! 供宿主应用写入自己的日志存储或导出合规报告。
//!
//! # 安全性
//!
//! - 永远不记录 PIN 内容，也不记录其任何形式的摘要——短 PIN 的快速哈希
//!   可以被穷举还原，记录摘要等于记录明文
//! - 事件消息只包含已脱敏的用户可见文案

use chrono::{Local, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::{Arc, Mutex};

/// PIN 操作类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SecurityOperation {
    /// 设置 PIN
    Setup,
    /// 验证 PIN
    Verify,
    /// 修改 PIN
    Change,
    /// 移除 PIN
    Remove,
    /// 遗留配置迁移
    Migrate,
}

impl fmt::Display for SecurityOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SecurityOperation::Setup => write!(f, "setup"),
            SecurityOperation::Verify => write!(f, "verify"),
            SecurityOperation::Change => write!(f, "change"),
            SecurityOperation::Remove => write!(f, "remove"),
            SecurityOperation::Migrate => write!(f, "migrate"),
        }
    }
}

/// 审计事件
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SecurityEvent {
    /// 操作类型
    pub operation: SecurityOperation,

    /// 操作是否成功
    pub success: bool,

    /// 操作时是否处于锁定状态
    pub locked_out: bool,

    /// 补充说明（用户可见文案或脱敏后的错误摘要）
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,

    /// 操作时间（本地时间）
    pub timestamp: NaiveDateTime,
}

/// 线程安全的审计日志记录器
///
/// `Clone` 共享同一事件缓冲区，管理器与宿主可各持一份句柄。
pub struct SecurityAuditLog {
    events: Arc<Mutex<Vec<SecurityEvent>>>,
}

impl SecurityAuditLog {
    /// 创建新的审计日志
    pub fn new() -> Self {
        Self {
            events: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// 记录一次操作
    pub fn record(
        &self,
        operation: SecurityOperation,
        success: bool,
        locked_out: bool,
        detail: Option<String>,
    ) {
        let event = SecurityEvent {
            operation,
            success,
            locked_out,
            detail,
            timestamp: Local::now().naive_local(),
        };

        if let Ok(mut events) = self.events.lock() {
            events.push(event);
        }
    }

    /// 获取所有事件（克隆）
    pub fn events(&self) -> Vec<SecurityEvent> {
        self.events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }

    /// 事件数量
    pub fn event_count(&self) -> usize {
        self.events.lock().map(|events| events.len()).unwrap_or(0)
    }

    /// 清除所有事件
    pub fn clear(&self) {
        if let Ok(mut events) = self.events.lock() {
            events.clear();
        }
    }

    /// 导出为 JSON，供合规审查
    pub fn export_to_json(&self) -> Result<String, String> {
        let events = self.events();
        serde_json::to_string_pretty(&events).map_err(|e| format!("serialize audit log: {e}"))
    }
}

impl Default for SecurityAuditLog {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for SecurityAuditLog {
    fn clone(&self) -> Self {
        Self {
            events: Arc::clone(&self.events),
        }
    }
}
