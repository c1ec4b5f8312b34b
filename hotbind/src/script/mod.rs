//! 脚本运行时模块
//!
//! 内嵌 Lua 解释器，脚本通过全局 `hotkey` 库注册热键，
//! 处理器函数保存在 Lua 注册表槽位中，由回调注册桥在按键时调用。
//!
//! # 模块结构
//!
//! - `api` - Lua `hotkey` 库与 `Hotkey` 对象
//! - `error` - 脚本相关错误类型

mod api;
mod error;

use std::path::Path;
use std::sync::Arc;

use mlua::Lua;

use crate::bridge::{BridgeOptions, HandlerStore, HotkeyBridge, LuaHandlers};
use crate::hotkey::{DispatchRouter, HotkeyBackend, HotkeyId};
use crate::state::{DEFAULT_SCRIPT_ID_BASE, DEFAULT_STRICT};

pub use api::{ApiContext, LuaHotkey, ScriptBridge};
pub use error::{ScriptError, ScriptResult};

/// 脚本运行时配置
#[derive(Debug, Clone, Copy)]
pub struct ScriptOptions {
    /// 严格模式：编程错误直接 panic
    pub strict: bool,
    /// 脚本分配标识符的起点
    pub script_id_base: HotkeyId,
}

impl Default for ScriptOptions {
    fn default() -> Self {
        Self {
            strict: DEFAULT_STRICT,
            script_id_base: DEFAULT_SCRIPT_ID_BASE,
        }
    }
}

/// 脚本运行时
///
/// 持有 Lua 解释器和脚本专用的回调注册桥，创建时把桥安装为路由器回调
pub struct ScriptRuntime {
    lua: Lua,
    bridge: Arc<ScriptBridge>,
    ctx: Arc<ApiContext>,
}

impl ScriptRuntime {
    /// 创建运行时并注册 `hotkey` 库
    ///
    /// # Errors
    ///
    /// 注册 Lua 库失败时返回错误
    pub fn new(
        backend: Arc<dyn HotkeyBackend>,
        router: Arc<DispatchRouter>,
        options: ScriptOptions,
    ) -> ScriptResult<Self> {
        let lua = Lua::new();

        let bridge = HotkeyBridge::new(
            backend,
            router,
            LuaHandlers::new(lua.clone()),
            BridgeOptions {
                strict: options.strict,
            },
        );

        let ctx = Arc::new(ApiContext::new(Arc::downgrade(&bridge), options.script_id_base));
        api::register(&lua, Arc::clone(&ctx))?;

        tracing::info!(
            strict = options.strict,
            script_id_base = options.script_id_base,
            "Lua runtime created"
        );

        Ok(Self { lua, bridge, ctx })
    }

    /// 加载并执行 Lua 文件
    pub fn load_file(&self, path: &Path) -> ScriptResult<()> {
        let source = std::fs::read_to_string(path).map_err(|source| ScriptError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        self.lua
            .load(&source)
            .set_name(format!("@{}", path.display()))
            .exec()?;

        self.bridge.store().expire();
        tracing::info!(path = %path.display(), hotkeys = self.bridge.len(), "Script loaded");
        Ok(())
    }

    /// 执行一段 Lua 代码
    pub fn exec(&self, name: &str, chunk: &str) -> ScriptResult<()> {
        self.lua.load(chunk).set_name(name).exec()?;
        self.bridge.store().expire();
        tracing::debug!(name, "Lua chunk executed");
        Ok(())
    }

    /// 执行完整的垃圾回收，回收不再被引用的 `Hotkey` 对象
    pub fn collect_garbage(&self) -> ScriptResult<()> {
        self.lua.gc_collect()?;
        self.lua.gc_collect()?;
        self.bridge.store().expire();
        Ok(())
    }

    /// 注销脚本注册的全部热键，返回注销的数量
    pub fn shutdown(&self) -> usize {
        let count = self.bridge.shutdown();
        self.bridge.store().expire();
        tracing::info!(count, "Lua runtime shut down");
        count
    }

    /// 仍然存活的处理器槽位数量
    pub fn live_slots(&self) -> usize {
        self.bridge.store().live_slots()
    }

    /// 被 `Hotkey` 对象持有的标识符数量
    pub fn reserved_ids(&self) -> usize {
        self.ctx.reserved_count()
    }

    /// 脚本使用的回调注册桥
    pub fn bridge(&self) -> &Arc<ScriptBridge> {
        &self.bridge
    }

    /// Lua 解释器
    pub fn lua(&self) -> &Lua {
        &self.lua
    }
}

impl Drop for ScriptRuntime {
    fn drop(&mut self) {
        self.bridge.shutdown();
    }
}
