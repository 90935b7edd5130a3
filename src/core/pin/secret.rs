//! PIN 秘密缓冲区
//!
//! 原始 PIN 在内存中只存在于 [`PinBuffer`] 里：析构时无条件清零，
//! 因此调用方无需在每个返回路径上手动擦除。管理器的接口按值接收
//! `PinBuffer`，离开作用域（包括错误与 panic 展开路径）即完成清理。

use std::fmt;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// 持有原始 PIN 的缓冲区，Drop 时清零
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct PinBuffer(String);

impl PinBuffer {
    /// 从用户输入创建缓冲区
    pub fn new(pin: impl Into<String>) -> Self {
        Self(pin.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// 字符数（按 Unicode 标量计，用于强度评估的长度计分）
    pub fn char_len(&self) -> usize {
        self.0.chars().count()
    }
}

impl From<&str> for PinBuffer {
    fn from(pin: &str) -> Self {
        Self::new(pin)
    }
}

impl From<String> for PinBuffer {
    fn from(pin: String) -> Self {
        Self::new(pin)
    }
}

/// Debug 输出脱敏，防止 PIN 泄露到日志
impl fmt::Debug for PinBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PinBuffer(***)")
    }
}

/// 常数时间字节比较（XOR 累积，不短路）
///
/// 长度不同直接返回 false；长度相同时耗时只与长度相关，
/// 与首个差异字节的位置无关。
pub(crate) fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }

    let mut diff = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        diff |= x ^ y;
    }
    diff == 0
}
