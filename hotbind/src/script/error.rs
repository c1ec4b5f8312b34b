//! 脚本相关错误类型

use std::path::PathBuf;

use thiserror::Error;

use crate::hotkey::HotkeyError;

/// 脚本相关错误
#[derive(Error, Debug)]
pub enum ScriptError {
    /// Lua 运行时错误（语法错误、脚本抛出的错误）
    #[error("Lua error: {0}")]
    Lua(#[from] mlua::Error),

    /// 读取脚本文件失败
    #[error("Failed to read script {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// 热键操作失败
    #[error("Hotkey error: {0}")]
    Hotkey(#[from] HotkeyError),

    /// 脚本标识符已用尽
    #[error("No free script hotkey identifier at or above {0}")]
    IdsExhausted(u32),
}

/// 脚本模块的结果类型
pub type ScriptResult<T> = Result<T, ScriptError>;
