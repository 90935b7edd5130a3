//! PIN 管理核心
//!
//! 应用访问控制的业务规则都集中在 [`PinManager`]：PIN 设置、验证（含失败
//! 锁定）、修改与移除、提示语、强度评估，以及遗留明文配置的一次性迁移。
//! 存储后端与安装配置通过依赖注入传入，本模块不持有任何全局状态。
//!
//! # 安全特性
//!
//! - 加盐哈希（每次安装唯一的 32 字节随机盐）
//! - PBKDF2-HMAC-SHA256，310,000 次迭代（OWASP 2023 建议）
//! - 失败尝试跟踪：连续失败达到上限后临时锁定
//! - 常数时间哈希比较
//! - PIN 缓冲区在所有退出路径上清零（由 [`PinBuffer`] 的 Drop 保证）
//! - `pin.hash` 是否存在是“需要 PIN”的唯一事实来源，不存在可分离的开关位
//!
//! # 锁定状态机（仅验证路径触达）
//!
//! `Unlocked(attempts)` --失败且 attempts+1 < max--> `Unlocked(attempts+1)`
//! `Unlocked(attempts)` --失败且 attempts+1 == max--> `LockedOut(until)`
//! `LockedOut(until)` --时间越过 until（惰性观察）--> `Unlocked(0)`
//! 任意状态 --验证成功--> `Unlocked(0)`

use base64::{engine::general_purpose, Engine as _};
use chrono::{Duration, Local, NaiveDateTime};
use pbkdf2::pbkdf2_hmac;
use rand::{rngs::OsRng, RngCore};
use sha2::Sha256;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::core::config::{SecurityConfig, SetupConfig};
use crate::core::security::{SecureStorageError, SecureStorageFactory, SecureStorageProvider};

use super::audit::{SecurityAuditLog, SecurityOperation};
use super::model::VerificationResult;
use super::secret::{constant_time_eq, PinBuffer};
use super::strength::{self, PinStrength};

/// PBKDF2 configuration (OWASP 2023 recommendations).
const PBKDF2_ITERATIONS: u32 = 310_000;
const KEY_LENGTH: usize = 32;
const SALT_LENGTH: usize = 32;

/// Secure storage keys.
const KEY_PIN_HASH: &str = "pin.hash";
const KEY_PIN_SALT: &str = "pin.salt";
const KEY_PIN_HINT: &str = "pin.hint";
const KEY_FAILED_ATTEMPTS: &str = "failed.attempts";
const KEY_LOCKOUT_UNTIL: &str = "lockout.until";

/// Legacy plaintext configuration keys, consumed only during migration.
const LEGACY_KEY_PIN_ENABLED: &str = "security.pin.enabled";
const LEGACY_KEY_PIN_HASH: &str = "security.pin.hash";
const LEGACY_KEY_PIN_SALT: &str = "security.pin.salt";
const LEGACY_KEY_PIN_HINT: &str = "security.pin.hint";
const LEGACY_KEY_FAILED_ATTEMPTS: &str = "security.failed.attempts";
const LEGACY_KEY_LOCKOUT_UNTIL: &str = "security.lockout.until";

const ALL_LEGACY_KEYS: &[&str] = &[
    LEGACY_KEY_PIN_ENABLED,
    LEGACY_KEY_PIN_HASH,
    LEGACY_KEY_PIN_SALT,
    LEGACY_KEY_PIN_HINT,
    LEGACY_KEY_FAILED_ATTEMPTS,
    LEGACY_KEY_LOCKOUT_UNTIL,
];

/// 锁定时间戳的序列化格式（ISO-8601 本地时间）
const DATETIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";
/// 解析时容忍小数秒（旧版本写入过带毫秒的值）
const DATETIME_PARSE_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.f";

/// 安全子系统错误
#[derive(Debug, thiserror::Error)]
pub enum SecurityError {
    /// 安全存储不可用或操作失败
    #[error(transparent)]
    Storage(#[from] SecureStorageError),

    /// 存储中的凭证数据无法解码
    #[error("stored credential is corrupt: {0}")]
    CorruptCredential(String),
}

/// PIN 管理器
///
/// 宿主应用在启动时构造一次（经由 [`PinManager::initialize`]），
/// 之后通过 `Arc` 共享给需要的界面层。
pub struct PinManager {
    storage: Arc<dyn SecureStorageProvider>,
    setup_config: Arc<dyn SetupConfig>,
    audit: SecurityAuditLog,
    max_failed_attempts: u32,
    lockout_minutes: i64,
    migration_attempted: AtomicBool,
}

impl PinManager {
    /// 启动入口：从工厂获取已验证的存储后端并触发一次性迁移
    ///
    /// 存储不可用是硬失败，宿主必须处理（拒绝启动或降级警告）。
    /// 迁移失败则只记录日志，绝不阻塞启动。
    pub fn initialize(
        factory: &SecureStorageFactory,
        setup_config: Arc<dyn SetupConfig>,
        config: &SecurityConfig,
    ) -> Result<Self, SecurityError> {
        let storage = factory.provider()?;
        let manager = Self::with_provider(storage, setup_config, config);
        manager.run_startup_migration();
        Ok(manager)
    }

    /// 用现成的存储实例构造管理器，不触发迁移
    ///
    /// 供测试与需要自定义后端的宿主使用；正常启动路径请用
    /// [`PinManager::initialize`]。
    pub fn with_provider(
        storage: Arc<dyn SecureStorageProvider>,
        setup_config: Arc<dyn SetupConfig>,
        config: &SecurityConfig,
    ) -> Self {
        Self {
            storage,
            setup_config,
            audit: SecurityAuditLog::new(),
            max_failed_attempts: config.max_failed_attempts,
            lockout_minutes: config.lockout_minutes,
            migration_attempted: AtomicBool::new(false),
        }
    }

    /// 审计日志句柄（与管理器共享同一缓冲区）
    pub fn audit_log(&self) -> SecurityAuditLog {
        self.audit.clone()
    }

    /// 检查是否已配置 PIN
    ///
    /// `pin.hash` 存在且非空即视为已配置。存储读取失败时按“已配置”
    /// 处理（fail secure）：宁可多弹一次输入框，也不能静默放行。
    pub fn is_pin_configured(&self) -> bool {
        match self.storage.retrieve(KEY_PIN_HASH) {
            Ok(Some(hash)) => !hash.is_empty(),
            Ok(None) => false,
            Err(e) => {
                tracing::warn!("failed to read PIN hash, failing secure: {e}");
                true
            }
        }
    }

    /// 设置新 PIN
    ///
    /// 生成新盐、派生哈希、存储，并把锁定状态清零。`hint` 去除首尾空白后
    /// 存储，空白提示语会删除已有提示。PIN 缓冲区在函数返回时清零，
    /// 包括错误路径。
    pub fn setup_pin(&self, pin: PinBuffer, hint: Option<&str>) -> Result<(), SecurityError> {
        let outcome = self.store_credential(&pin, hint);

        match &outcome {
            Ok(()) => {
                tracing::info!("PIN configured");
                self.audit
                    .record(SecurityOperation::Setup, true, false, None);
            }
            Err(e) => {
                tracing::error!("failed to set up PIN: {e}");
                self.audit
                    .record(SecurityOperation::Setup, false, false, Some(e.to_string()));
            }
        }

        outcome
        // `pin` 在此离开作用域，缓冲区清零
    }

    /// 验证 PIN
    ///
    /// 锁定期间直接拒绝（不触碰失败计数，也不做昂贵的哈希计算）。
    /// 任何内部错误都转换为不泄露细节的通用失败结果。
    pub fn verify_pin(&self, pin: PinBuffer) -> VerificationResult {
        let result = self.verify_pin_inner(&pin);
        self.audit.record(
            SecurityOperation::Verify,
            result.success,
            result.locked_out,
            result.message.clone(),
        );
        result
        // `pin` 在此离开作用域，缓冲区清零
    }

    /// 在后台线程执行验证，避免阻塞 UI 线程
    ///
    /// 密钥派生刻意耗时数百毫秒；宿主在等待期间应禁用输入控件，
    /// 完成后依据返回值恢复。
    pub async fn verify_pin_async(self: Arc<Self>, pin: PinBuffer) -> VerificationResult {
        match tokio::task::spawn_blocking(move || self.verify_pin(pin)).await {
            Ok(result) => result,
            Err(e) => {
                tracing::error!("background PIN verification task failed: {e}");
                VerificationResult::failure("Verification error.", false)
            }
        }
    }

    /// 修改 PIN（需先通过当前 PIN 验证）
    ///
    /// 验证失败时返回 `Ok(false)`，不修改任何已存状态；
    /// `new_pin` 无论走哪条路径都会被清零。
    pub fn change_pin(
        &self,
        current_pin: PinBuffer,
        new_pin: PinBuffer,
        new_hint: Option<&str>,
    ) -> Result<bool, SecurityError> {
        let verification = self.verify_pin(current_pin);
        if !verification.success {
            self.audit.record(
                SecurityOperation::Change,
                false,
                verification.locked_out,
                verification.message.clone(),
            );
            return Ok(false);
            // `new_pin` 在此离开作用域，缓冲区清零
        }

        self.setup_pin(new_pin, new_hint)?;
        self.audit
            .record(SecurityOperation::Change, true, false, None);
        Ok(true)
    }

    /// 移除 PIN 保护（需先通过当前 PIN 验证）
    ///
    /// 成功时删除全部凭证键并清零锁定状态；验证失败时什么都不删。
    pub fn remove_pin(&self, current_pin: PinBuffer) -> Result<bool, SecurityError> {
        let verification = self.verify_pin(current_pin);
        if !verification.success {
            self.audit.record(
                SecurityOperation::Remove,
                false,
                verification.locked_out,
                verification.message.clone(),
            );
            return Ok(false);
        }

        self.storage.delete(KEY_PIN_HASH)?;
        self.storage.delete(KEY_PIN_SALT)?;
        self.storage.delete(KEY_PIN_HINT)?;
        self.reset_lockout_state()?;

        tracing::info!("PIN protection removed");
        self.audit
            .record(SecurityOperation::Remove, true, false, None);
        Ok(true)
    }

    /// 读取 PIN 提示语；未设置或读取失败时返回空字符串
    pub fn get_pin_hint(&self) -> String {
        match self.storage.retrieve(KEY_PIN_HINT) {
            Ok(Some(hint)) => hint,
            Ok(None) => String::new(),
            Err(e) => {
                tracing::warn!("failed to read PIN hint: {e}");
                String::new()
            }
        }
    }

    /// 当前是否处于锁定状态
    pub fn is_locked_out(&self) -> bool {
        self.lockout_until()
            .is_some_and(|until| Local::now().naive_local() < until)
    }

    /// 锁定剩余分钟数（向上取整），未锁定时为 0
    pub fn lockout_minutes_remaining(&self) -> i64 {
        match self.lockout_until() {
            Some(until) => {
                let now = Local::now().naive_local();
                if now >= until {
                    0
                } else {
                    minutes_remaining(now, until)
                }
            }
            None => 0,
        }
    }

    /// 评估 PIN 强度（纯函数，不访问存储）
    pub fn evaluate_strength(&self, pin: &PinBuffer) -> PinStrength {
        strength::evaluate_strength(pin)
    }

    /// 执行一次性遗留迁移（进程内至多一次）
    ///
    /// 重复调用是无害的空操作。所有失败都被吞掉并记录日志：
    /// 迁移失败的用户丢失旧 PIN，但仍可设置新 PIN。
    pub fn run_startup_migration(&self) {
        if self.migration_attempted.swap(true, Ordering::SeqCst) {
            return;
        }

        match self.migrate_from_legacy_storage() {
            Ok(migrated) => {
                if migrated {
                    self.audit
                        .record(SecurityOperation::Migrate, true, false, None);
                }
            }
            Err(e) => {
                tracing::warn!(
                    "legacy credential migration failed: {e}; continuing without migrated data"
                );
                self.audit.record(
                    SecurityOperation::Migrate,
                    false,
                    false,
                    Some(e.to_string()),
                );
            }
        }
    }

    // ------------------------------------------------------------------
    // 内部实现
    // ------------------------------------------------------------------

    fn store_credential(&self, pin: &PinBuffer, hint: Option<&str>) -> Result<(), SecurityError> {
        let mut salt = [0u8; SALT_LENGTH];
        OsRng.fill_bytes(&mut salt);

        let hash = hash_pin(pin, &salt);

        self.storage
            .store(KEY_PIN_SALT, &general_purpose::STANDARD.encode(salt))?;
        self.storage
            .store(KEY_PIN_HASH, &general_purpose::STANDARD.encode(hash))?;

        match hint.map(str::trim) {
            Some(h) if !h.is_empty() => self.storage.store(KEY_PIN_HINT, h)?,
            _ => self.storage.delete(KEY_PIN_HINT)?,
        }

        self.reset_lockout_state()?;
        Ok(())
    }

    fn verify_pin_inner(&self, pin: &PinBuffer) -> VerificationResult {
        // 锁定检查放在最前面：省掉一次昂贵的哈希计算
        if let Some(until) = self.lockout_until() {
            let now = Local::now().naive_local();
            if now < until {
                let minutes = minutes_remaining(now, until);
                tracing::warn!("PIN verification rejected: locked out for {minutes} more minute(s)");
                return VerificationResult::failure(
                    format!(
                        "Too many failed attempts. Please wait {minutes} minute(s) before trying again."
                    ),
                    true,
                );
            }
        }

        match self.check_pin(pin) {
            Ok(result) => result,
            Err(e) => {
                tracing::error!("PIN verification failed unexpectedly: {e}");
                // 通用失败文案，不向用户暴露内部细节
                VerificationResult::failure("Verification error.", false)
            }
        }
    }

    fn check_pin(&self, pin: &PinBuffer) -> Result<VerificationResult, SecurityError> {
        let salt_b64 = self.storage.retrieve(KEY_PIN_SALT)?;
        let hash_b64 = self.storage.retrieve(KEY_PIN_HASH)?;

        let (salt_b64, hash_b64) = match (salt_b64, hash_b64) {
            (Some(s), Some(h)) if !s.is_empty() && !h.is_empty() => (s, h),
            _ => {
                tracing::warn!("PIN verification attempted but PIN not configured");
                return Ok(VerificationResult::failure("PIN not configured.", false));
            }
        };

        let salt = general_purpose::STANDARD
            .decode(&salt_b64)
            .map_err(|e| SecurityError::CorruptCredential(format!("salt: {e}")))?;
        let stored_hash = general_purpose::STANDARD
            .decode(&hash_b64)
            .map_err(|e| SecurityError::CorruptCredential(format!("hash: {e}")))?;

        let provided_hash = hash_pin(pin, &salt);

        if constant_time_eq(&stored_hash, &provided_hash) {
            if let Err(e) = self.reset_lockout_state() {
                tracing::warn!("failed to reset lockout state after successful verification: {e}");
            }
            tracing::info!("PIN verification passed");
            return Ok(VerificationResult::success());
        }

        let attempts = self.increment_failed_attempts();
        let remaining = self.max_failed_attempts.saturating_sub(attempts);

        if remaining == 0 {
            self.set_lockout();
            tracing::warn!(
                "incorrect PIN; lockout engaged for {} minute(s)",
                self.lockout_minutes
            );
            Ok(VerificationResult::failure(
                format!(
                    "Too many failed attempts. Account locked for {} minutes.",
                    self.lockout_minutes
                ),
                true,
            ))
        } else {
            tracing::warn!("incorrect PIN; {remaining} attempt(s) remaining");
            Ok(VerificationResult::failure(
                format!("Incorrect PIN. {remaining} attempt(s) remaining."),
                false,
            ))
        }
    }

    fn failed_attempts(&self) -> u32 {
        match self.storage.retrieve(KEY_FAILED_ATTEMPTS) {
            Ok(Some(raw)) => raw.trim().parse().unwrap_or(0),
            _ => 0,
        }
    }

    fn increment_failed_attempts(&self) -> u32 {
        let attempts = self.failed_attempts() + 1;
        if let Err(e) = self
            .storage
            .store(KEY_FAILED_ATTEMPTS, &attempts.to_string())
        {
            tracing::warn!("failed to persist failed-attempt counter: {e}");
        }
        attempts
    }

    fn reset_lockout_state(&self) -> Result<(), SecureStorageError> {
        self.storage.delete(KEY_FAILED_ATTEMPTS)?;
        self.storage.delete(KEY_LOCKOUT_UNTIL)?;
        Ok(())
    }

    fn set_lockout(&self) {
        let until = Local::now().naive_local() + Duration::minutes(self.lockout_minutes);
        if let Err(e) = self
            .storage
            .store(KEY_LOCKOUT_UNTIL, &until.format(DATETIME_FORMAT).to_string())
        {
            tracing::warn!("failed to persist lockout timestamp: {e}");
        }
    }

    fn lockout_until(&self) -> Option<NaiveDateTime> {
        let raw = self.storage.retrieve(KEY_LOCKOUT_UNTIL).ok().flatten()?;
        if raw.is_empty() {
            return None;
        }
        match NaiveDateTime::parse_from_str(&raw, DATETIME_PARSE_FORMAT) {
            Ok(until) => Some(until),
            Err(e) => {
                tracing::warn!("unparseable lockout timestamp {raw:?}: {e}");
                None
            }
        }
    }

    fn legacy_value(&self, key: &str) -> String {
        self.setup_config.get_value(key).unwrap_or_default()
    }

    /// 遗留明文配置 → 安全存储的一次性迁移
    ///
    /// - 没有遗留哈希：什么都不做
    /// - 安全存储已有哈希：跳过复制，但仍清空遗留键
    /// - 否则复制哈希+盐（两者都非空才算有效凭证）、提示语、失败计数、
    ///   锁定时间戳，然后清空全部六个遗留键
    ///
    /// 旧的 `security.pin.enabled` 开关位被有意丢弃：新系统里
    /// “需要 PIN”只由哈希是否存在决定。
    fn migrate_from_legacy_storage(&self) -> Result<bool, SecureStorageError> {
        let legacy_hash = self.legacy_value(LEGACY_KEY_PIN_HASH);
        if legacy_hash.is_empty() {
            return Ok(false);
        }

        let already_configured = matches!(
            self.storage.retrieve(KEY_PIN_HASH)?,
            Some(hash) if !hash.is_empty()
        );

        if already_configured {
            tracing::info!("secure storage already holds a PIN hash; skipping legacy copy");
        } else {
            let legacy_salt = self.legacy_value(LEGACY_KEY_PIN_SALT);
            if legacy_salt.is_empty() {
                // 有哈希没有盐的凭证无法验证，不迁移
                tracing::warn!("legacy PIN hash present without a salt; credential not migrated");
            } else {
                self.storage.store(KEY_PIN_HASH, &legacy_hash)?;
                self.storage.store(KEY_PIN_SALT, &legacy_salt)?;
            }

            let hint = self.legacy_value(LEGACY_KEY_PIN_HINT);
            if !hint.is_empty() {
                self.storage.store(KEY_PIN_HINT, &hint)?;
            }

            let attempts = self.legacy_value(LEGACY_KEY_FAILED_ATTEMPTS);
            if !attempts.is_empty() {
                self.storage.store(KEY_FAILED_ATTEMPTS, &attempts)?;
            }

            let lockout = self.legacy_value(LEGACY_KEY_LOCKOUT_UNTIL);
            if !lockout.is_empty() {
                self.storage.store(KEY_LOCKOUT_UNTIL, &lockout)?;
            }

            tracing::info!("migrated legacy PIN configuration into secure storage");
        }

        // 无论是否复制都清空遗留键：明文文件里不能留下旧的密钥材料
        self.clear_legacy_keys();
        Ok(true)
    }

    fn clear_legacy_keys(&self) {
        for key in ALL_LEGACY_KEYS {
            if let Err(e) = self.setup_config.set_value(key, "") {
                tracing::warn!("failed to clear legacy key {key}: {e}");
            }
        }
    }
}

/// PBKDF2-HMAC-SHA256 派生
fn hash_pin(pin: &PinBuffer, salt: &[u8]) -> [u8; KEY_LENGTH] {
    let mut output = [0u8; KEY_LENGTH];
    pbkdf2_hmac::<Sha256>(pin.as_bytes(), salt, PBKDF2_ITERATIONS, &mut output);
    output
}

/// 剩余分钟数，向上取整；锁定期间绝不返回 0
fn minutes_remaining(now: NaiveDateTime, until: NaiveDateTime) -> i64 {
    let secs = (until - now).num_seconds().max(1);
    (secs + 59) / 60
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn dt(h: u32, m: u32, s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 3, 14)
            .unwrap()
            .and_hms_opt(h, m, s)
            .unwrap()
    }

    #[test]
    fn test_minutes_remaining_rounds_up() {
        // 14 分 01 秒 → 15 分钟
        assert_eq!(minutes_remaining(dt(10, 0, 0), dt(10, 14, 1)), 15);
        // 整 15 分钟 → 15 分钟
        assert_eq!(minutes_remaining(dt(10, 0, 0), dt(10, 15, 0)), 15);
        // 59 秒 → 1 分钟
        assert_eq!(minutes_remaining(dt(10, 0, 0), dt(10, 0, 59)), 1);
    }

    #[test]
    fn test_minutes_remaining_never_zero_while_locked() {
        // 亚秒级剩余时间也要显示 1 分钟
        assert_eq!(minutes_remaining(dt(10, 0, 0), dt(10, 0, 0)), 1);
    }

    #[test]
    fn test_lockout_timestamp_roundtrip() {
        let until = dt(23, 59, 59);
        let formatted = until.format(DATETIME_FORMAT).to_string();
        assert_eq!(formatted, "2026-03-14T23:59:59");

        let parsed = NaiveDateTime::parse_from_str(&formatted, DATETIME_PARSE_FORMAT).unwrap();
        assert_eq!(parsed, until);
    }

    #[test]
    fn test_lockout_timestamp_parse_tolerates_fractional_seconds() {
        let parsed =
            NaiveDateTime::parse_from_str("2026-03-14T12:00:00.500", DATETIME_PARSE_FORMAT);
        assert!(parsed.is_ok());
    }

    #[test]
    fn test_hash_pin_is_deterministic_per_salt() {
        let pin = PinBuffer::from("4821");
        let salt_a = [7u8; SALT_LENGTH];
        let salt_b = [9u8; SALT_LENGTH];

        let first = hash_pin(&pin, &salt_a);
        let second = hash_pin(&pin, &salt_a);
        let other_salt = hash_pin(&pin, &salt_b);

        assert_eq!(first, second);
        // 相同 PIN 配不同盐必须得到不同哈希
        assert_ne!(first, other_salt);
    }

    #[test]
    fn test_hash_pin_differs_between_pins() {
        let salt = [3u8; SALT_LENGTH];
        let a = hash_pin(&PinBuffer::from("4821"), &salt);
        let b = hash_pin(&PinBuffer::from("4822"), &salt);
        assert_ne!(a, b);
    }
}
