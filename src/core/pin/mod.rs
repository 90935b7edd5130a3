//! PIN 访问控制模块
//!
//! 本模块是应用的访问控制核心：PIN 的派生与验证、失败锁定策略、
//! 提示语与强度评估，以及遗留明文配置到安全存储的一次性迁移。
//! 宿主应用只通过 [`PinManager`] 的公开接口与本模块交互。

pub mod audit;
pub mod manager;
pub mod model;
pub mod secret;
pub mod strength;

pub use audit::{SecurityAuditLog, SecurityEvent, SecurityOperation};
pub use manager::{PinManager, SecurityError};
pub use model::VerificationResult;
pub use secret::PinBuffer;
pub use strength::{evaluate_strength, PinStrength};
