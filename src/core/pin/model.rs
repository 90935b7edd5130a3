//! PIN 验证结果模型

use serde::Serialize;

/// 单次 PIN 验证的结果
///
/// 瞬态值，从不落盘。`message` 面向最终用户，
/// 不包含任何内部错误细节。
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VerificationResult {
    /// 验证是否通过
    pub success: bool,

    /// 面向用户的说明（失败时给出原因或剩余次数）
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,

    /// 当前是否处于锁定状态
    pub locked_out: bool,
}

impl VerificationResult {
    /// 验证通过
    pub fn success() -> Self {
        Self {
            success: true,
            message: None,
            locked_out: false,
        }
    }

    /// 验证失败
    pub fn failure(message: impl Into<String>, locked_out: bool) -> Self {
        Self {
            success: false,
            message: Some(message.into()),
            locked_out,
        }
    }
}
