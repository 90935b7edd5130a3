//! PIN 强度评估
//!
//! 纯函数评分：只看 PIN 内容，不依赖任何存储状态，同一输入永远得到
//! 同一结果。评分表与下游 UI 的阈值耦合，修改任何加减分都要同步确认
//! 设置界面的强度条展示。
//!
//! 展示层映射（标签 + 视觉严重级别）与领域评分分离，见 [`StrengthBadge`]。

use serde::{Deserialize, Serialize};
use std::fmt;
use zeroize::Zeroizing;

use super::secret::PinBuffer;

/// 常见弱 PIN/口令黑名单，命中即判 WEAK（不再继续计分）
const COMMON_PINS: &[&str] = &[
    "0000", "1111", "2222", "3333", "4444", "5555", "6666", "7777", "8888", "9999", "1234", "4321",
    "1212", "2121", "0123", "3210", "1357", "2468", "password", "pass", "admin", "login",
];

/// PIN 强度等级
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PinStrength {
    /// 空输入
    None,
    Weak,
    Fair,
    Good,
    Strong,
}

impl PinStrength {
    /// 展示标签
    pub fn label(&self) -> &'static str {
        match self {
            PinStrength::None => "",
            PinStrength::Weak => "Weak",
            PinStrength::Fair => "Fair",
            PinStrength::Good => "Good",
            PinStrength::Strong => "Strong",
        }
    }
}

impl fmt::Display for PinStrength {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// 强度徽标的视觉严重级别
///
/// 纯展示元数据：UI 层据此选择颜色/图标，领域逻辑不使用。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StrengthSeverity {
    Neutral,
    Danger,
    Warning,
    Positive,
    Strong,
}

/// 强度展示徽标（标签 + 严重级别）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StrengthBadge {
    pub label: &'static str,
    pub severity: StrengthSeverity,
}

/// 领域强度 → 展示徽标的映射表
pub fn badge(strength: PinStrength) -> StrengthBadge {
    let severity = match strength {
        PinStrength::None => StrengthSeverity::Neutral,
        PinStrength::Weak => StrengthSeverity::Danger,
        PinStrength::Fair => StrengthSeverity::Warning,
        PinStrength::Good => StrengthSeverity::Positive,
        PinStrength::Strong => StrengthSeverity::Strong,
    };
    StrengthBadge {
        label: strength.label(),
        severity,
    }
}

/// 评估 PIN 强度
///
/// 计分规则：
/// - 长度 ≥4 / ≥6 / ≥8 各 +1（最多 +3）
/// - 同时包含数字和字母 +1
/// - 包含既非数字也非字母的字符 +1
/// - 任一相邻字符对按码位严格递增（"12"、"bc"）−1
/// - 任一相邻字符对相同（"11"、"aa"）−1
///
/// 总分 ≤1 → WEAK，2 → FAIR，3 → GOOD，≥4 → STRONG。
/// 黑名单命中（大小写不敏感）直接 WEAK。
pub fn evaluate_strength(pin: &PinBuffer) -> PinStrength {
    if pin.is_empty() {
        return PinStrength::None;
    }

    // 临时小写副本同样属于 PIN 材料，用完清零
    let lowered = Zeroizing::new(pin.as_str().to_lowercase());
    if COMMON_PINS.contains(&lowered.as_str()) {
        return PinStrength::Weak;
    }

    let mut has_digit = false;
    let mut has_letter = false;
    let mut has_special = false;
    let mut has_sequential = false;
    let mut has_repeating = false;

    let mut prev: Option<char> = None;
    for c in pin.as_str().chars() {
        if c.is_numeric() {
            has_digit = true;
        } else if c.is_alphabetic() {
            has_letter = true;
        } else {
            has_special = true;
        }

        if let Some(p) = prev {
            if c as u32 == p as u32 + 1 {
                has_sequential = true;
            }
            if c == p {
                has_repeating = true;
            }
        }
        prev = Some(c);
    }

    let length = pin.char_len();
    let mut score: i32 = 0;

    if length >= 4 {
        score += 1;
    }
    if length >= 6 {
        score += 1;
    }
    if length >= 8 {
        score += 1;
    }

    if has_digit && has_letter {
        score += 1;
    }
    if has_special {
        score += 1;
    }

    if has_sequential {
        score -= 1;
    }
    if has_repeating {
        score -= 1;
    }

    match score {
        i32::MIN..=1 => PinStrength::Weak,
        2 => PinStrength::Fair,
        3 => PinStrength::Good,
        _ => PinStrength::Strong,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strength(pin: &str) -> PinStrength {
        evaluate_strength(&PinBuffer::from(pin))
    }

    #[test]
    fn test_empty_pin_is_none() {
        assert_eq!(strength(""), PinStrength::None);
    }

    #[test]
    fn test_blacklisted_pins_are_weak() {
        assert_eq!(strength("1234"), PinStrength::Weak);
        assert_eq!(strength("0000"), PinStrength::Weak);
        assert_eq!(strength("password"), PinStrength::Weak);
        // 大小写不敏感
        assert_eq!(strength("PaSsWoRd"), PinStrength::Weak);
        assert_eq!(strength("ADMIN"), PinStrength::Weak);
    }

    #[test]
    fn test_mixed_six_chars_is_good() {
        // 6 字符 +2，数字+字母 +1 ⇒ 3
        assert_eq!(strength("ace135"), PinStrength::Good);
    }

    #[test]
    fn test_full_complexity_is_strong() {
        // 8 字符 +3，数字+字母 +1，特殊字符 +1，无扣分 ⇒ 5
        assert_eq!(strength("Th3r@py!"), PinStrength::Strong);
    }

    #[test]
    fn test_repeating_pairs_drag_down_to_weak() {
        // 6 字符 +2，相邻重复 −1，相邻递增("ab","bc") −1 ⇒ 0
        assert_eq!(strength("aabbcc"), PinStrength::Weak);
    }

    #[test]
    fn test_short_non_blacklisted_digits_are_weak() {
        // 4 字符 +1，纯数字无加分 ⇒ 1
        assert_eq!(strength("7294"), PinStrength::Weak);
    }

    #[test]
    fn test_fair_boundary() {
        // 6 字符 +2，纯数字、无相邻递增/重复 ⇒ 2
        assert_eq!(strength("729463"), PinStrength::Fair);
    }

    #[test]
    fn test_sequential_penalty() {
        // "124875"：6 字符 +2，"12" 相邻递增 −1 ⇒ 1
        assert_eq!(strength("124875"), PinStrength::Weak);
    }

    #[test]
    fn test_special_only_bonus_is_independent() {
        // "#!92#@xq"（8 字符 +3，数字+字母 +1，特殊 +1，无扣分）⇒ 5
        assert_eq!(strength("#!92#@xq"), PinStrength::Strong);
    }

    #[test]
    fn test_evaluation_is_deterministic() {
        // 纯函数：重复调用结果不变
        for _ in 0..5 {
            assert_eq!(strength("ace135"), PinStrength::Good);
            assert_eq!(strength("1234"), PinStrength::Weak);
        }
    }

    #[test]
    fn test_labels() {
        assert_eq!(PinStrength::None.label(), "");
        assert_eq!(PinStrength::Weak.label(), "Weak");
        assert_eq!(PinStrength::Strong.to_string(), "Strong");
    }

    #[test]
    fn test_strength_ordering() {
        assert!(PinStrength::None < PinStrength::Weak);
        assert!(PinStrength::Weak < PinStrength::Fair);
        assert!(PinStrength::Fair < PinStrength::Good);
        assert!(PinStrength::Good < PinStrength::Strong);
    }

    #[test]
    fn test_badge_mapping() {
        assert_eq!(badge(PinStrength::None).severity, StrengthSeverity::Neutral);
        assert_eq!(badge(PinStrength::Weak).severity, StrengthSeverity::Danger);
        assert_eq!(badge(PinStrength::Fair).severity, StrengthSeverity::Warning);
        assert_eq!(badge(PinStrength::Good).severity, StrengthSeverity::Positive);
        assert_eq!(
            badge(PinStrength::Strong).severity,
            StrengthSeverity::Strong
        );
        assert_eq!(badge(PinStrength::Weak).label, "Weak");
    }
}
