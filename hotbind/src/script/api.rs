//! Lua `hotkey` 库
//!
//! ```lua
//! local hk = hotkey.new("a", {"cmd", "shift"}, function(down) print(down) end)
//! local ok, err = hk:enable()
//! hk:disable()
//!
//! hotkey.bind("f5", nil, function(down) end)   -- 创建并立即启用，失败时抛出错误
//! ```
//!
//! `Hotkey` 对象被垃圾回收时，如果仍处于启用状态，会自动注销。

use std::collections::HashSet;
use std::sync::{Arc, Weak};

use mlua::{AnyUserData, Function, Lua, MetaMethod, UserData, UserDataMethods, Value};
use parking_lot::Mutex;

use super::error::ScriptError;
use crate::bridge::{HotkeyBridge, LuaHandlers};
use crate::hotkey::{keycode_for, HotkeyHandle, HotkeyId, KeySpec};

/// 脚本使用的桥
pub type ScriptBridge = HotkeyBridge<LuaHandlers>;

/// `hotkey` 库共享的上下文
pub struct ApiContext {
    bridge: Weak<ScriptBridge>,
    id_base: HotkeyId,
    reserved: Mutex<HashSet<HotkeyId>>,
}

impl ApiContext {
    /// 创建上下文，脚本标识符从 `id_base` 开始分配
    pub fn new(bridge: Weak<ScriptBridge>, id_base: HotkeyId) -> Self {
        Self {
            bridge,
            id_base,
            reserved: Mutex::new(HashSet::new()),
        }
    }

    /// 分配标识符，跳过已注册的和其他 `Hotkey` 对象持有的标识符
    fn allocate_id(&self) -> Result<HotkeyId, ScriptError> {
        let bridge = self.bridge.upgrade();
        let mut reserved = self.reserved.lock();

        let id = (self.id_base..=HotkeyId::MAX)
            .find(|id| {
                !reserved.contains(id) && !bridge.as_ref().is_some_and(|b| b.is_registered(*id))
            })
            .ok_or(ScriptError::IdsExhausted(self.id_base))?;

        reserved.insert(id);
        Ok(id)
    }

    fn free_id(&self, id: HotkeyId) {
        self.reserved.lock().remove(&id);
    }

    /// 被 `Hotkey` 对象持有的标识符数量
    pub fn reserved_count(&self) -> usize {
        self.reserved.lock().len()
    }
}

/// Lua 中的 `Hotkey` 对象
pub struct LuaHotkey {
    id: HotkeyId,
    spec: KeySpec,
    handler: Function,
    handle: Option<HotkeyHandle>,
    ctx: Arc<ApiContext>,
}

impl LuaHotkey {
    fn is_enabled(&self) -> bool {
        match (self.handle, self.ctx.bridge.upgrade()) {
            (Some(handle), Some(bridge)) => bridge.handle(self.id) == Some(handle),
            _ => false,
        }
    }

    fn enable(&mut self) -> Result<(), String> {
        if self.is_enabled() {
            return Ok(());
        }
        let bridge = self
            .ctx
            .bridge
            .upgrade()
            .ok_or_else(|| "hotkey runtime is shut down".to_string())?;

        let handle = bridge
            .register_and_bind(self.id, self.spec, self.handler.clone())
            .map_err(|e| e.to_string())?;
        self.handle = Some(handle);
        Ok(())
    }

    fn disable(&mut self) {
        let Some(handle) = self.handle.take() else {
            return;
        };
        let Some(bridge) = self.ctx.bridge.upgrade() else {
            return;
        };

        // 运行时关闭时可能已经被统一注销
        if bridge.handle(self.id) != Some(handle) {
            return;
        }
        if let Err(e) = bridge.unregister_handle(handle) {
            tracing::warn!(id = self.id, error = %e, "Failed to disable script hotkey");
        }
    }
}

impl UserData for LuaHotkey {
    fn add_methods<M: UserDataMethods<Self>>(methods: &mut M) {
        methods.add_method_mut("enable", |_, this, ()| match this.enable() {
            Ok(()) => Ok((Some(true), None)),
            Err(e) => Ok((None, Some(e))),
        });

        methods.add_method_mut("disable", |_, this, ()| {
            this.disable();
            Ok(())
        });

        methods.add_method("enabled", |_, this, ()| Ok(this.is_enabled()));
        methods.add_method("id", |_, this, ()| Ok(this.id));
        methods.add_method("key", |_, this, ()| Ok(this.spec.to_string()));

        methods.add_meta_method(MetaMethod::Eq, |_, this, other: AnyUserData| {
            Ok(other
                .borrow::<LuaHotkey>()
                .map(|other| other.id == this.id)
                .unwrap_or(false))
        });

        methods.add_meta_method(MetaMethod::ToString, |_, this, ()| {
            let state = if this.is_enabled() { "enabled" } else { "disabled" };
            Ok(format!("hotkey {}: {} ({})", this.id, this.spec, state))
        });
    }
}

impl Drop for LuaHotkey {
    fn drop(&mut self) {
        if self.handle.is_some() {
            tracing::debug!(id = self.id, "Releasing collected script hotkey");
            self.disable();
        }
        self.ctx.free_id(self.id);
    }
}

/// 解析修饰键参数：`nil`、`"cmd+shift"` 或 `{"cmd", "shift"}`
fn parse_modifiers(value: Value) -> mlua::Result<Vec<String>> {
    match value {
        Value::Nil => Ok(Vec::new()),
        Value::String(s) => Ok(s
            .to_str()?
            .split('+')
            .map(str::trim)
            .filter(|m| !m.is_empty())
            .map(str::to_string)
            .collect()),
        Value::Table(t) => t.sequence_values::<String>().collect(),
        other => Err(mlua::Error::runtime(format!(
            "modifiers must be a string or a table, got {}",
            other.type_name()
        ))),
    }
}

fn new_hotkey(
    ctx: &Arc<ApiContext>,
    key: String,
    mods: Value,
    handler: Function,
) -> mlua::Result<LuaHotkey> {
    let mods = parse_modifiers(mods)?;
    let spec = KeySpec::from_parts(&key, &mods).map_err(mlua::Error::external)?;
    let id = ctx.allocate_id().map_err(mlua::Error::external)?;

    Ok(LuaHotkey {
        id,
        spec,
        handler,
        handle: None,
        ctx: Arc::clone(ctx),
    })
}

/// 在 `lua` 中注册全局 `hotkey` 表
pub fn register(lua: &Lua, ctx: Arc<ApiContext>) -> mlua::Result<()> {
    let table = lua.create_table()?;

    let new_ctx = Arc::clone(&ctx);
    table.set(
        "new",
        lua.create_function(move |_, (key, mods, handler): (String, Value, Function)| {
            new_hotkey(&new_ctx, key, mods, handler)
        })?,
    )?;

    let bind_ctx = Arc::clone(&ctx);
    table.set(
        "bind",
        lua.create_function(move |_, (key, mods, handler): (String, Value, Function)| {
            let mut hotkey = new_hotkey(&bind_ctx, key, mods, handler)?;
            hotkey.enable().map_err(mlua::Error::runtime)?;
            Ok(hotkey)
        })?,
    )?;

    table.set(
        "keycode",
        lua.create_function(|_, name: String| Ok(keycode_for(&name)))?,
    )?;

    table.set(
        "ids",
        lua.create_function(move |_, ()| {
            Ok(ctx
                .bridge
                .upgrade()
                .map(|bridge| bridge.ids())
                .unwrap_or_default())
        })?,
    )?;

    lua.globals().set("hotkey", table)?;
    Ok(())
}
