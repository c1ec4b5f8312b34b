//! 应用配置模块
//!
//! 提供应用程序配置的加载、保存和管理功能
//!
//! # 配置存储位置
//!
//! - Windows: `%APPDATA%/hotbind/config.json`
//! - macOS: `~/Library/Application Support/hotbind/config.json`
//! - Linux: `~/.config/hotbind/config.json`
//!
//! # 使用示例
//!
//! ```no_run
//! use hotbind_lib::state::{AppConfig, ConfigManager};
//!
//! // 加载配置
//! let mut config = ConfigManager::load().unwrap();
//!
//! // 修改配置
//! config.strict = true;
//!
//! // 保存配置
//! ConfigManager::save(&config).unwrap();
//! ```

use std::path::{Path, PathBuf};
use std::sync::Arc;

use arc_swap::ArcSwap;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::hotkey::{BackendKind, HotkeyConfig};

/// 配置目录名
const APP_DIR_NAME: &str = "hotbind";

/// 配置文件名
const CONFIG_FILE_NAME: &str = "config.json";

/// 默认日志过滤器
pub const DEFAULT_LOG_FILTER: &str = "hotbind=debug,warn";

/// 脚本分配标识符的默认起点
pub const DEFAULT_SCRIPT_ID_BASE: u32 = 1000;

/// 严格模式默认值：调试构建中编程错误直接 panic
pub const DEFAULT_STRICT: bool = cfg!(debug_assertions);

/// 配置错误类型
#[derive(Error, Debug)]
pub enum ConfigError {
    /// IO 错误
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON 序列化/反序列化错误
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// 路径错误
    #[error("Path error: {0}")]
    Path(String),

    /// 配置内容无效
    #[error("Invalid config: {0}")]
    Invalid(String),
}

/// 配置结果类型
pub type ConfigResult<T> = Result<T, ConfigError>;

/// 应用配置
///
/// 包含所有应用程序设置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// 热键后端
    pub backend: BackendKind,
    /// 严格模式：编程错误直接 panic（调试构建默认开启）
    pub strict: bool,
    /// 脚本配置
    pub script: ScriptConfig,
    /// 日志配置
    pub logging: LoggingConfig,
    /// 热键配置
    pub hotkeys: HotkeyConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            backend: BackendKind::default(),
            strict: DEFAULT_STRICT,
            script: ScriptConfig::default(),
            logging: LoggingConfig::default(),
            hotkeys: HotkeyConfig::default(),
        }
    }
}

impl AppConfig {
    /// 校验配置
    ///
    /// 原生绑定的标识符必须低于脚本标识符起点，避免与脚本分配的标识符冲突
    pub fn validate(&self) -> ConfigResult<()> {
        self.hotkeys
            .validate()
            .map_err(|e| ConfigError::Invalid(e.to_string()))?;

        if let Some(binding) = self
            .hotkeys
            .bindings
            .iter()
            .find(|b| b.id >= self.script.script_id_base)
        {
            return Err(ConfigError::Invalid(format!(
                "binding id {} collides with script id range starting at {}",
                binding.id, self.script.script_id_base
            )));
        }
        Ok(())
    }
}

/// 脚本配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScriptConfig {
    /// 启动时加载的 Lua 脚本（None 表示不加载）
    pub path: Option<PathBuf>,
    /// 脚本分配标识符的起点
    pub script_id_base: u32,
}

impl Default for ScriptConfig {
    fn default() -> Self {
        Self {
            path: None,
            script_id_base: DEFAULT_SCRIPT_ID_BASE,
        }
    }
}

/// 日志配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// `EnvFilter` 过滤规则（`RUST_LOG` 优先）
    pub filter: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: DEFAULT_LOG_FILTER.to_string(),
        }
    }
}

/// 配置管理器
///
/// 提供配置的加载、保存和管理功能
pub struct ConfigManager;

impl ConfigManager {
    /// 从默认位置加载配置
    ///
    /// 文件不存在时返回默认配置
    pub fn load() -> ConfigResult<AppConfig> {
        Self::load_from(&Self::config_path()?)
    }

    /// 从指定路径加载配置
    ///
    /// 文件不存在时返回默认配置
    pub fn load_from(path: &Path) -> ConfigResult<AppConfig> {
        tracing::debug!(path = %path.display(), "Loading config");

        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            let config: AppConfig = serde_json::from_str(&content)?;
            config.validate()?;
            tracing::info!(path = %path.display(), "Config loaded successfully");
            Ok(config)
        } else {
            tracing::info!(path = %path.display(), "Config file not found, using defaults");
            Ok(AppConfig::default())
        }
    }

    /// 保存配置到默认位置
    pub fn save(config: &AppConfig) -> ConfigResult<()> {
        Self::save_to(&Self::config_path()?, config)
    }

    /// 保存配置到指定路径
    pub fn save_to(path: &Path, config: &AppConfig) -> ConfigResult<()> {
        tracing::debug!(path = %path.display(), "Saving config");

        // 确保目录存在
        if let Some(parent) = path.parent() {
            if !parent.exists() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let content = serde_json::to_string_pretty(config)?;
        std::fs::write(path, content)?;

        tracing::info!(path = %path.display(), "Config saved successfully");
        Ok(())
    }

    /// 获取配置文件路径
    pub fn config_path() -> ConfigResult<PathBuf> {
        Ok(Self::config_dir()?.join(CONFIG_FILE_NAME))
    }

    /// 获取配置目录路径
    pub fn config_dir() -> ConfigResult<PathBuf> {
        dirs::config_dir()
            .map(|dir| dir.join(APP_DIR_NAME))
            .ok_or_else(|| ConfigError::Path("no config directory for this platform".to_string()))
    }

    /// 检查配置文件是否存在
    pub fn exists() -> ConfigResult<bool> {
        Ok(Self::config_path()?.exists())
    }

    /// 删除配置文件
    pub fn delete() -> ConfigResult<()> {
        Self::delete_at(&Self::config_path()?)
    }

    /// 删除指定路径的配置文件
    pub fn delete_at(path: &Path) -> ConfigResult<()> {
        if path.exists() {
            std::fs::remove_file(path)?;
            tracing::info!(path = %path.display(), "Config deleted");
        }
        Ok(())
    }

    /// 重置为默认配置
    pub fn reset() -> ConfigResult<AppConfig> {
        let config = AppConfig::default();
        Self::save(&config)?;
        tracing::info!("Config reset to defaults");
        Ok(config)
    }
}

/// 全局配置状态
///
/// 使用 ArcSwap 实现无锁读取
pub struct GlobalConfig {
    config: ArcSwap<AppConfig>,
}

impl GlobalConfig {
    /// 创建新的全局配置
    pub fn new(config: AppConfig) -> Self {
        Self {
            config: ArcSwap::new(Arc::new(config)),
        }
    }

    /// 获取当前配置
    pub fn get(&self) -> Arc<AppConfig> {
        self.config.load_full()
    }

    /// 更新配置
    pub fn update(&self, config: AppConfig) {
        self.config.store(Arc::new(config));
    }

    /// 是否为严格模式
    pub fn strict(&self) -> bool {
        self.config.load().strict
    }

    /// 切换严格模式
    pub fn set_strict(&self, strict: bool) {
        let mut config = (*self.config.load_full()).clone();
        config.strict = strict;
        self.config.store(Arc::new(config));
    }
}

impl Default for GlobalConfig {
    fn default() -> Self {
        Self::new(AppConfig::default())
    }
}
