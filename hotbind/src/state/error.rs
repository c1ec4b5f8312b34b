use thiserror::Error;

use super::lifecycle::HotkeyPhase;
use crate::hotkey::{HotkeyError, HotkeyId};

/// 状态相关错误
#[derive(Error, Debug, Clone, PartialEq)]
pub enum StateError {
    /// 无效的状态转换
    #[error("Invalid transition for hotkey {id} from {from} to {to}")]
    InvalidTransition {
        id: HotkeyId,
        from: HotkeyPhase,
        to: HotkeyPhase,
    },

    /// 槽位存在但句柄已不存在
    #[error("Hotkey {0} has a handler slot but no live handle")]
    DanglingSlot(HotkeyId),
}

/// 状态模块的结果类型
pub type StateResult<T> = Result<T, StateError>;

impl From<StateError> for HotkeyError {
    fn from(err: StateError) -> Self {
        HotkeyError::InconsistentState(err.to_string())
    }
}
