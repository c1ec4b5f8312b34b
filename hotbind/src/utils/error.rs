//! 全局错误处理模块
//!
//! 提供统一的应用错误类型和用户友好的错误消息
//!
//! # 功能
//!
//! - 统一的 `AppError` 类型，聚合所有模块错误
//! - 用户友好的错误消息
//! - 错误代码用于日志和宿主程序处理
//! - 错误恢复建议
//!
//! # 使用示例
//!
//! ```
//! use hotbind_lib::hotkey::HotkeyError;
//! use hotbind_lib::utils::error::{AppError, ErrorCode};
//!
//! let err: AppError = HotkeyError::DuplicateIdentifier(1).into();
//! assert_eq!(err.code(), ErrorCode::HotkeyDuplicateIdentifier);
//! ```

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::hotkey::HotkeyError;
use crate::script::ScriptError;
use crate::state::{ConfigError, StateError};

/// 应用错误类型
///
/// 聚合所有模块的错误类型，提供统一的错误处理接口
#[derive(Error, Debug)]
pub enum AppError {
    /// 热键错误
    #[error("Hotkey error: {0}")]
    Hotkey(#[from] HotkeyError),

    /// 配置错误
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    /// 脚本错误
    #[error("Script error: {0}")]
    Script(#[from] ScriptError),

    /// 状态错误
    #[error("State error: {0}")]
    State(#[from] StateError),

    /// 内部错误
    #[error("Internal error: {0}")]
    Internal(String),
}

/// 错误代码
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    // 热键错误 (1xxx)
    /// 系统拒绝注册
    HotkeyRegistrationFailed,
    /// 系统注销失败
    HotkeyUnregistrationFailed,
    /// 按键或修饰键无效
    HotkeyInvalidKey,
    /// 标识符重复
    HotkeyDuplicateIdentifier,
    /// 标识符未注册
    HotkeyUnknownIdentifier,
    /// 已绑定处理器
    HotkeyAlreadyBound,
    /// 后端不可用
    HotkeyBackendUnavailable,
    /// 处理器存储失败
    HotkeySlotAllocationFailed,

    // 脚本错误 (2xxx)
    /// 脚本文件读取失败
    ScriptLoadFailed,
    /// 脚本执行出错
    ScriptRuntimeError,

    // 配置错误 (4xxx)
    /// 配置加载失败
    ConfigLoadFailed,
    /// 配置无效
    ConfigInvalid,

    // 通用错误 (9xxx)
    /// 状态不一致（编程错误）
    InconsistentState,
    /// 内部错误
    InternalError,
}

/// 错误上下文信息
///
/// 提供用户友好的错误信息和恢复建议
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorContext {
    /// 错误代码
    pub code: ErrorCode,
    /// 用户友好的错误消息
    pub message: String,
    /// 详细错误信息（用于日志）
    pub detail: Option<String>,
    /// 恢复建议
    pub recovery_hint: Option<String>,
    /// 是否可恢复
    pub recoverable: bool,
}

impl ErrorContext {
    /// 创建新的错误上下文
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            detail: None,
            recovery_hint: None,
            recoverable: true,
        }
    }

    /// 设置详细信息
    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    /// 设置恢复建议
    pub fn with_recovery_hint(mut self, hint: impl Into<String>) -> Self {
        self.recovery_hint = Some(hint.into());
        self
    }

    /// 标记为不可恢复
    pub fn not_recoverable(mut self) -> Self {
        self.recoverable = false;
        self
    }
}

/// 终端输出格式：消息后附恢复建议
impl fmt::Display for ErrorContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)?;
        if let Some(detail) = &self.detail {
            write!(f, " ({})", detail)?;
        }
        if let Some(hint) = &self.recovery_hint {
            write!(f, "\n建议: {}", hint)?;
        }
        Ok(())
    }
}

impl AppError {
    /// 获取错误代码
    pub fn code(&self) -> ErrorCode {
        match self {
            AppError::Hotkey(e) => match e {
                HotkeyError::Registration { .. } => ErrorCode::HotkeyRegistrationFailed,
                HotkeyError::Unregistration { .. } => ErrorCode::HotkeyUnregistrationFailed,
                HotkeyError::InvalidKey(_) | HotkeyError::InvalidModifier(_) => {
                    ErrorCode::HotkeyInvalidKey
                }
                HotkeyError::DuplicateIdentifier(_) => ErrorCode::HotkeyDuplicateIdentifier,
                HotkeyError::UnknownIdentifier(_) => ErrorCode::HotkeyUnknownIdentifier,
                HotkeyError::AlreadyBound(_) => ErrorCode::HotkeyAlreadyBound,
                HotkeyError::SlotAllocation { .. } => ErrorCode::HotkeySlotAllocationFailed,
                HotkeyError::Backend(_) => ErrorCode::HotkeyBackendUnavailable,
                HotkeyError::DoubleRelease(_) | HotkeyError::InconsistentState(_) => {
                    ErrorCode::InconsistentState
                }
            },

            AppError::Script(ScriptError::Io { .. }) => ErrorCode::ScriptLoadFailed,
            AppError::Script(ScriptError::Hotkey(e)) => AppError::Hotkey(e.clone()).code(),
            AppError::Script(_) => ErrorCode::ScriptRuntimeError,

            AppError::Config(ConfigError::Json(_)) | AppError::Config(ConfigError::Invalid(_)) => {
                ErrorCode::ConfigInvalid
            }
            AppError::Config(_) => ErrorCode::ConfigLoadFailed,

            AppError::State(_) => ErrorCode::InconsistentState,
            AppError::Internal(_) => ErrorCode::InternalError,
        }
    }

    /// 获取用户友好的错误消息
    pub fn user_message(&self) -> String {
        match self.code() {
            ErrorCode::HotkeyRegistrationFailed => {
                "无法注册热键，该组合可能已被其他程序占用".to_string()
            }
            ErrorCode::HotkeyUnregistrationFailed => "注销热键失败".to_string(),
            ErrorCode::HotkeyInvalidKey => "热键格式无效".to_string(),
            ErrorCode::HotkeyDuplicateIdentifier => "热键标识符重复".to_string(),
            ErrorCode::HotkeyUnknownIdentifier => "热键未注册".to_string(),
            ErrorCode::HotkeyAlreadyBound => "热键已绑定处理函数".to_string(),
            ErrorCode::HotkeyBackendUnavailable => "热键后端不可用".to_string(),
            ErrorCode::HotkeySlotAllocationFailed => "无法保存热键处理函数".to_string(),
            ErrorCode::ScriptLoadFailed => "无法读取脚本文件".to_string(),
            ErrorCode::ScriptRuntimeError => "脚本执行出错".to_string(),
            ErrorCode::ConfigLoadFailed => "无法读取配置文件".to_string(),
            ErrorCode::ConfigInvalid => "配置文件格式错误".to_string(),
            ErrorCode::InconsistentState => "热键状态不一致".to_string(),
            ErrorCode::InternalError => match self {
                AppError::Internal(msg) => format!("内部错误: {}", msg),
                _ => "内部错误".to_string(),
            },
        }
    }

    /// 获取完整的错误上下文
    pub fn context(&self) -> ErrorContext {
        let mut ctx = ErrorContext::new(self.code(), self.user_message()).with_detail(self.to_string());

        if let Some(hint) = self.recovery_hint() {
            ctx = ctx.with_recovery_hint(hint);
        }

        if !self.is_recoverable() {
            ctx = ctx.not_recoverable();
        }

        ctx
    }

    /// 获取恢复建议
    pub fn recovery_hint(&self) -> Option<String> {
        match self.code() {
            ErrorCode::HotkeyRegistrationFailed => {
                Some("请换一个按键组合，或关闭占用该组合的程序".to_string())
            }
            ErrorCode::HotkeyInvalidKey => {
                Some("使用 `cmd+shift+a` 这样的格式，修饰键为 cmd、ctrl、opt、shift".to_string())
            }
            ErrorCode::HotkeyBackendUnavailable => {
                Some("请在配置中把 backend 设置为 portable 或 simulated".to_string())
            }
            ErrorCode::ConfigInvalid => Some("请检查配置文件的 JSON 格式".to_string()),
            _ => None,
        }
    }

    /// 检查错误是否可恢复
    pub fn is_recoverable(&self) -> bool {
        !matches!(
            self.code(),
            ErrorCode::InconsistentState | ErrorCode::InternalError | ErrorCode::ConfigInvalid
        )
    }

    /// 检查是否是调用方的编程错误
    pub fn is_programming_error(&self) -> bool {
        match self {
            AppError::Hotkey(e) | AppError::Script(ScriptError::Hotkey(e)) => e.is_programming_error(),
            AppError::State(_) => true,
            _ => false,
        }
    }
}

/// 应用结果类型
pub type AppResult<T> = Result<T, AppError>;

/// 将任意错误转换为内部错误
impl From<String> for AppError {
    fn from(msg: String) -> Self {
        AppError::Internal(msg)
    }
}

impl From<&str> for AppError {
    fn from(msg: &str) -> Self {
        AppError::Internal(msg.to_string())
    }
}
