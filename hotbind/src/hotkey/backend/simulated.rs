//! 进程内模拟后端
//!
//! 行为与系统后端一致：同一个按键组合只能被注册一次，键码越界会被拒绝，
//! 注销后的资源不再产生事件。`fire` 用来模拟系统投递按键事件。

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;

use super::{HotkeyBackend, OsHandle};
use crate::hotkey::error::{HotkeyError, HotkeyResult};
use crate::hotkey::keys::KeySpec;
use crate::hotkey::router::DispatchRouter;
use crate::hotkey::HotkeyId;

#[derive(Debug, Clone, Copy)]
struct SimulatedHotkey {
    id: HotkeyId,
    spec: KeySpec,
}

/// 模拟后端
pub struct SimulatedBackend {
    router: Arc<DispatchRouter>,
    next_raw: AtomicU64,
    live: Mutex<HashMap<u64, SimulatedHotkey>>,
}

impl SimulatedBackend {
    /// 创建模拟后端，事件投递给 `router`
    pub fn new(router: Arc<DispatchRouter>) -> Self {
        Self {
            router,
            next_raw: AtomicU64::new(1),
            live: Mutex::new(HashMap::new()),
        }
    }

    /// 模拟系统投递一次按键事件
    ///
    /// 与真实系统一致，只有仍然有效的注册才会产生事件；
    /// 返回路由器报告的消费结果
    pub fn fire(&self, id: HotkeyId, is_down: bool) -> bool {
        let registered = self.live.lock().values().any(|hk| hk.id == id);
        if !registered {
            tracing::trace!(id, "Simulated event for inactive hotkey ignored");
            return false;
        }
        self.router.dispatch(id, is_down)
    }

    /// 模拟一次完整的按下和松开
    pub fn press(&self, id: HotkeyId) -> (bool, bool) {
        (self.fire(id, true), self.fire(id, false))
    }

    /// 绕过注册检查直接投递，模拟注销过程中仍在途的系统事件
    pub fn fire_in_flight(&self, id: HotkeyId, is_down: bool) -> bool {
        self.router.dispatch(id, is_down)
    }

    /// 当前有效的系统注册数量
    pub fn live_count(&self) -> usize {
        self.live.lock().len()
    }

    /// 按键组合是否已被注册
    pub fn is_bound(&self, spec: &KeySpec) -> bool {
        self.live.lock().values().any(|hk| hk.spec == *spec)
    }
}

impl HotkeyBackend for SimulatedBackend {
    fn name(&self) -> &'static str {
        "simulated"
    }

    fn register(&self, id: HotkeyId, spec: &KeySpec) -> HotkeyResult<OsHandle> {
        if !spec.is_valid() {
            return Err(HotkeyError::Registration {
                key: spec.to_string(),
                reason: format!("keycode 0x{:02X} is out of range", spec.keycode()),
            });
        }

        let mut live = self.live.lock();
        if live.values().any(|hk| hk.spec == *spec) {
            return Err(HotkeyError::Registration {
                key: spec.to_string(),
                reason: "key combination is already bound".to_string(),
            });
        }

        let raw = self.next_raw.fetch_add(1, Ordering::Relaxed);
        live.insert(raw, SimulatedHotkey { id, spec: *spec });
        Ok(OsHandle::new(raw))
    }

    fn unregister(&self, id: HotkeyId, handle: &OsHandle) -> HotkeyResult<()> {
        match self.live.lock().remove(&handle.raw()) {
            Some(_) => Ok(()),
            None => Err(HotkeyError::Unregistration {
                id,
                reason: "handle is not live".to_string(),
            }),
        }
    }
}
