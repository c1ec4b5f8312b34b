//! Lua 注册表槽位处理器
//!
//! 处理器函数保存在 Lua 注册表中（`RegistryKey`），保证在槽位存在期间
//! 不会被垃圾回收。释放时立即从注册表移除；如果仍有在途分发持有槽位，
//! 由最后一个持有者析构 `RegistryKey`，下次 `expire_registry_values` 时回收。

use mlua::{Function, Lua, RegistryKey};

use super::{HandlerStore, SlotCounter, SlotToken};
use crate::hotkey::HotkeyId;

/// Lua 处理器槽位
pub struct LuaSlot {
    key: RegistryKey,
    _token: SlotToken,
}

/// Lua 处理器存储
pub struct LuaHandlers {
    lua: Lua,
    counter: SlotCounter,
}

impl LuaHandlers {
    /// 创建存储，`lua` 为共享的解释器句柄
    pub fn new(lua: Lua) -> Self {
        Self {
            lua,
            counter: SlotCounter::new(),
        }
    }

    /// 回收已析构但尚未移除的注册表项
    pub fn expire(&self) {
        self.lua.expire_registry_values();
    }
}

impl HandlerStore for LuaHandlers {
    type Handler = Function;
    type Slot = LuaSlot;
    type Error = mlua::Error;

    fn store(&self, id: HotkeyId, handler: Function) -> mlua::Result<LuaSlot> {
        let key = self.lua.create_registry_value(handler)?;
        tracing::trace!(id, "Lua handler stored in registry");
        Ok(LuaSlot {
            key,
            _token: self.counter.token(),
        })
    }

    fn invoke(&self, _id: HotkeyId, slot: &LuaSlot, is_down: bool) -> mlua::Result<()> {
        let handler: Function = self.lua.registry_value(&slot.key)?;
        handler.call::<()>(is_down)
    }

    fn release(&self, slot: LuaSlot) {
        let LuaSlot { key, _token } = slot;
        if let Err(e) = self.lua.remove_registry_value(key) {
            tracing::warn!(error = %e, "Failed to remove Lua registry value");
        }
    }

    fn live_slots(&self) -> usize {
        self.counter.count()
    }
}
