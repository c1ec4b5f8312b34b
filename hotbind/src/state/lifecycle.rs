//! 热键生命周期
//!
//! 每个标识符的状态机：
//!
//! ```text
//! Unregistered ──register──▶ Registered ──bind──▶ Bound
//!      ▲                        │   ▲               │
//!      └────────unregister──────┘   └────unbind─────┤
//!      ▲                                            │
//!      └──────────────────unregister────────────────┘
//! ```

use serde::Serialize;

use super::error::{StateError, StateResult};
use crate::hotkey::HotkeyId;

/// 热键阶段
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Default)]
pub enum HotkeyPhase {
    /// 未注册
    #[default]
    Unregistered,
    /// 已注册，没有处理器槽位
    Registered,
    /// 已注册并绑定处理器槽位
    Bound,
}

impl HotkeyPhase {
    /// 是否持有系统资源
    pub fn is_registered(&self) -> bool {
        !matches!(self, Self::Unregistered)
    }

    /// 是否持有处理器槽位
    pub fn is_bound(&self) -> bool {
        matches!(self, Self::Bound)
    }

    /// 获取阶段名称（用于日志和调试）
    pub fn name(&self) -> &'static str {
        match self {
            Self::Unregistered => "Unregistered",
            Self::Registered => "Registered",
            Self::Bound => "Bound",
        }
    }

    /// 根据句柄和槽位的存在情况推导阶段
    ///
    /// 只有槽位没有句柄是非法组合
    pub fn from_parts(id: HotkeyId, has_handle: bool, has_slot: bool) -> StateResult<Self> {
        match (has_handle, has_slot) {
            (false, false) => Ok(Self::Unregistered),
            (true, false) => Ok(Self::Registered),
            (true, true) => Ok(Self::Bound),
            (false, true) => Err(StateError::DanglingSlot(id)),
        }
    }

    /// 检查转换是否合法
    ///
    /// # Examples
    ///
    /// ```
    /// use hotbind_lib::state::HotkeyPhase;
    ///
    /// assert!(HotkeyPhase::check_transition(1, HotkeyPhase::Registered, HotkeyPhase::Bound).is_ok());
    /// assert!(HotkeyPhase::check_transition(1, HotkeyPhase::Unregistered, HotkeyPhase::Bound).is_err());
    /// ```
    pub fn check_transition(id: HotkeyId, from: Self, to: Self) -> StateResult<()> {
        if is_valid_transition(from, to) {
            Ok(())
        } else {
            Err(StateError::InvalidTransition { id, from, to })
        }
    }
}

impl std::fmt::Display for HotkeyPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// 验证状态转换是否合法
pub fn is_valid_transition(from: HotkeyPhase, to: HotkeyPhase) -> bool {
    use HotkeyPhase::*;

    match (from, to) {
        // 注册
        (Unregistered, Registered) => true,

        // 绑定与解绑
        (Registered, Bound) => true,
        (Bound, Registered) => true,

        // 注销（句柄和槽位一起释放）
        (Registered, Unregistered) => true,
        (Bound, Unregistered) => true,

        // 其他转换不合法
        _ => false,
    }
}
