//! 状态管理模块
//!
//! 提供热键生命周期状态机和应用配置
//!
//! # 模块结构
//!
//! - `lifecycle` - 每个热键标识符的阶段与转换规则
//! - `config` - 应用配置的加载、保存和全局访问
//! - `error` - 状态相关错误类型

pub mod config;
mod error;
mod lifecycle;

pub use config::{
    AppConfig, ConfigError, ConfigManager, ConfigResult, GlobalConfig, LoggingConfig,
    ScriptConfig, DEFAULT_LOG_FILTER, DEFAULT_SCRIPT_ID_BASE, DEFAULT_STRICT,
};
pub use error::{StateError, StateResult};
pub use lifecycle::{is_valid_transition, HotkeyPhase};
