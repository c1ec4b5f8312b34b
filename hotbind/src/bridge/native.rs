//! Rust 闭包处理器

use std::convert::Infallible;
use std::sync::Arc;

use super::{HandlerStore, SlotCounter, SlotToken};
use crate::hotkey::HotkeyId;

/// 原生处理器，参数为是否按下
pub type NativeHandler = Arc<dyn Fn(bool) + Send + Sync>;

/// 原生处理器槽位
pub struct NativeSlot {
    handler: NativeHandler,
    _token: SlotToken,
}

/// 原生处理器存储
#[derive(Debug, Default)]
pub struct NativeHandlers {
    counter: SlotCounter,
}

impl NativeHandlers {
    /// 创建存储
    pub fn new() -> Self {
        Self::default()
    }

    /// 把闭包包装为处理器
    pub fn handler<F>(f: F) -> NativeHandler
    where
        F: Fn(bool) + Send + Sync + 'static,
    {
        Arc::new(f)
    }
}

impl HandlerStore for NativeHandlers {
    type Handler = NativeHandler;
    type Slot = NativeSlot;
    type Error = Infallible;

    fn store(&self, _id: HotkeyId, handler: NativeHandler) -> Result<NativeSlot, Infallible> {
        Ok(NativeSlot {
            handler,
            _token: self.counter.token(),
        })
    }

    fn invoke(&self, _id: HotkeyId, slot: &NativeSlot, is_down: bool) -> Result<(), Infallible> {
        (slot.handler)(is_down);
        Ok(())
    }

    fn live_slots(&self) -> usize {
        self.counter.count()
    }
}
