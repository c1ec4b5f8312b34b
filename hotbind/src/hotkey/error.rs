//! 热键相关错误类型

use thiserror::Error;

use super::HotkeyId;

/// 热键相关错误
#[derive(Error, Debug, Clone, PartialEq)]
pub enum HotkeyError {
    /// 无效的按键名称
    #[error("Invalid key: {0}")]
    InvalidKey(String),

    /// 无效的修饰键名称
    #[error("Invalid modifier: {0}")]
    InvalidModifier(String),

    /// 系统拒绝注册热键（被其他进程独占、键码无效、资源耗尽）
    #[error("Failed to register hotkey '{key}': {reason}")]
    Registration { key: String, reason: String },

    /// 系统注销热键失败
    #[error("Failed to unregister hotkey {id}: {reason}")]
    Unregistration { id: HotkeyId, reason: String },

    /// 标识符已被占用
    #[error("Hotkey identifier {0} is already registered")]
    DuplicateIdentifier(HotkeyId),

    /// 标识符没有对应的已注册热键
    #[error("Hotkey identifier {0} is not registered")]
    UnknownIdentifier(HotkeyId),

    /// 标识符已经绑定了处理器
    #[error("Hotkey identifier {0} already has a bound handler")]
    AlreadyBound(HotkeyId),

    /// 同一句柄被释放两次
    #[error("Hotkey handle {0} was already released")]
    DoubleRelease(HotkeyId),

    /// 句柄与槽位配对被破坏
    #[error("Inconsistent hotkey state: {0}")]
    InconsistentState(String),

    /// 无法为处理器分配槽位
    #[error("Failed to store handler for hotkey {id}: {reason}")]
    SlotAllocation { id: HotkeyId, reason: String },

    /// 后端不可用
    #[error("Hotkey backend error: {0}")]
    Backend(String),
}

impl HotkeyError {
    /// 是否为调用方的编程错误（重复释放、配对破坏）
    ///
    /// 这类错误不可恢复，只能记录或在严格模式下中止
    pub fn is_programming_error(&self) -> bool {
        matches!(
            self,
            HotkeyError::DoubleRelease(_) | HotkeyError::InconsistentState(_)
        )
    }
}

/// 热键模块的结果类型
pub type HotkeyResult<T> = Result<T, HotkeyError>;
