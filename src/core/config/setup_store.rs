//! 遗留安装配置存储
//!
//! 早期版本把 PIN 哈希等安全数据和其它安装参数一起写在明文配置文件里。
//! 本模块保留对该文件的最小访问能力：迁移流程读取其中的 `security.*` 键，
//! 并在迁移后将其清空。该存储不提供显式删除，约定“写入空字符串”即删除。

use anyhow::{Context, Result};
use dirs_next as dirs;
use std::collections::BTreeMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::{env, fs};

/// 安装配置访问接口
///
/// 迁移代码只依赖这个最小接口，测试可注入内存实现。
pub trait SetupConfig: Send + Sync {
    /// 读取键值，键不存在时返回 None
    fn get_value(&self, key: &str) -> Option<String>;

    /// 写入键值；空字符串表示删除该键
    fn set_value(&self, key: &str, value: &str) -> io::Result<()>;
}

fn join_default_path(base: &Path) -> PathBuf {
    let mut p = base.to_path_buf();
    p.push("setup-config.json");
    p
}

fn default_config_path() -> PathBuf {
    // Windows: %APPDATA%\casenotes
    // macOS: ~/Library/Application Support/casenotes
    // Linux: ~/.config/casenotes
    let base = if let Some(mut dir) = dirs::config_dir() {
        dir.push("casenotes");
        dir
    } else {
        // 极端环境下获取失败，才回退到当前目录
        env::current_dir().unwrap_or_else(|_| PathBuf::from("."))
    };
    join_default_path(&base)
}

/// 文件型安装配置存储
///
/// 扁平的 JSON 字符串映射，写操作直接落盘（最后写入者胜出即可，
/// 单用户桌面场景不需要更强的一致性）。
pub struct SetupConfigFile {
    path: PathBuf,
    entries: Mutex<BTreeMap<String, String>>,
}

impl SetupConfigFile {
    /// 从默认应用配置目录加载
    pub fn load_default() -> Result<Self> {
        Self::load_from(default_config_path())
    }

    /// 从指定路径加载；文件不存在视为空配置
    pub fn load_from(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let entries = if path.exists() {
            let raw = fs::read_to_string(&path)
                .with_context(|| format!("read setup config: {}", path.display()))?;
            serde_json::from_str::<BTreeMap<String, String>>(&raw)
                .with_context(|| format!("parse setup config: {}", path.display()))?
        } else {
            BTreeMap::new()
        };

        Ok(Self {
            path,
            entries: Mutex::new(entries),
        })
    }

    /// 配置文件路径
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn persist(&self, entries: &BTreeMap<String, String>) -> io::Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let raw = serde_json::to_string_pretty(entries)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        fs::write(&self.path, raw)
    }
}

impl SetupConfig for SetupConfigFile {
    fn get_value(&self, key: &str) -> Option<String> {
        let entries = self.entries.lock().ok()?;
        entries.get(key).cloned()
    }

    fn set_value(&self, key: &str, value: &str) -> io::Result<()> {
        let mut entries = self
            .entries
            .lock()
            .map_err(|e| io::Error::new(io::ErrorKind::Other, e.to_string()))?;

        if value.is_empty() {
            entries.remove(key);
        } else {
            entries.insert(key.to_string(), value.to_string());
        }

        self.persist(&entries)
    }
}

/// 内存安装配置（测试用）
#[derive(Default)]
pub struct MemorySetupConfig {
    entries: Mutex<BTreeMap<String, String>>,
}

impl MemorySetupConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// 当前条目数量，便于测试断言
    pub fn len(&self) -> usize {
        self.entries.lock().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl SetupConfig for MemorySetupConfig {
    fn get_value(&self, key: &str) -> Option<String> {
        let entries = self.entries.lock().ok()?;
        entries.get(key).cloned()
    }

    fn set_value(&self, key: &str, value: &str) -> io::Result<()> {
        let mut entries = self
            .entries
            .lock()
            .map_err(|e| io::Error::new(io::ErrorKind::Other, e.to_string()))?;

        if value.is_empty() {
            entries.remove(key);
        } else {
            entries.insert(key.to_string(), value.to_string());
        }

        Ok(())
    }
}
