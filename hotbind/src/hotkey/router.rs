//! 分发路由模块
//!
//! 系统按键事件的唯一入口。所有后端都把 `(标识符, 按下/松开)` 交给
//! 同一个路由器，路由器再转交给当前安装的唯一回调。
//!
//! 回调槽位使用 `ArcSwapOption`，分发路径无锁读取；重新安装会直接替换旧回调。

use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, OnceLock};

use arc_swap::ArcSwapOption;
use serde::Serialize;

use super::HotkeyId;

/// 分发回调类型
///
/// 参数为 `(标识符, 是否按下)`，返回值表示事件是否被消费
pub type DispatchCallback = Arc<dyn Fn(HotkeyId, bool) -> bool + Send + Sync>;

/// 热键事件
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct HotkeyEvent {
    /// 注册时提供的标识符
    pub id: HotkeyId,
    /// 按下为 `true`，松开为 `false`
    pub is_down: bool,
}

impl HotkeyEvent {
    /// 按下事件
    pub fn down(id: HotkeyId) -> Self {
        Self { id, is_down: true }
    }

    /// 松开事件
    pub fn up(id: HotkeyId) -> Self {
        Self { id, is_down: false }
    }
}

static GLOBAL_ROUTER: OnceLock<Arc<DispatchRouter>> = OnceLock::new();

/// 分发路由器
pub struct DispatchRouter {
    callback: ArcSwapOption<DispatchCallback>,
}

impl DispatchRouter {
    /// 创建独立的路由器（测试或嵌入场景）
    ///
    /// # Examples
    ///
    /// ```
    /// use hotbind_lib::hotkey::DispatchRouter;
    ///
    /// let router = DispatchRouter::new();
    /// assert!(!router.has_callback());
    /// assert!(!router.dispatch(1, true));
    /// ```
    pub fn new() -> Self {
        Self {
            callback: ArcSwapOption::const_empty(),
        }
    }

    /// 进程级路由器
    ///
    /// 系统后端在宿主进程中使用这个实例
    pub fn global() -> Arc<DispatchRouter> {
        Arc::clone(GLOBAL_ROUTER.get_or_init(|| Arc::new(DispatchRouter::new())))
    }

    /// 安装回调，替换已有回调
    pub fn set_callback(&self, callback: DispatchCallback) {
        let previous = self.callback.swap(Some(Arc::new(callback)));
        if previous.is_some() {
            tracing::debug!("Dispatch callback replaced");
        } else {
            tracing::debug!("Dispatch callback installed");
        }
    }

    /// 移除回调，之后的事件全部丢弃
    pub fn clear_callback(&self) {
        self.callback.store(None);
        tracing::debug!("Dispatch callback cleared");
    }

    /// 是否已安装回调
    pub fn has_callback(&self) -> bool {
        self.callback.load().is_some()
    }

    /// 系统事件入口
    ///
    /// 没有回调时事件被丢弃并返回 `false`；回调 panic 在此处截获，
    /// 不会展开到系统的调用栈中
    pub fn dispatch(&self, id: HotkeyId, is_down: bool) -> bool {
        let Some(callback) = self.callback.load_full() else {
            tracing::trace!(id, is_down, "No dispatch callback installed, dropping event");
            return false;
        };

        match panic::catch_unwind(AssertUnwindSafe(|| (**callback)(id, is_down))) {
            Ok(consumed) => {
                tracing::trace!(id, is_down, consumed, "Hotkey event dispatched");
                consumed
            }
            Err(_) => {
                tracing::error!(id, is_down, "Dispatch callback panicked, event not consumed");
                false
            }
        }
    }
}

impl Default for DispatchRouter {
    fn default() -> Self {
        Self::new()
    }
}
