//! 热键管理模块
//!
//! 提供全局热键的注册、注销和事件分发
//!
//! # 模块结构
//!
//! - `keys` - 按键名称、修饰键与按键规格
//! - `table` - 热键句柄表，独占持有系统资源
//! - `router` - 分发路由器，系统事件的唯一入口
//! - `backend` - 系统后端（Carbon、global-hotkey、模拟）
//! - `config` - 配置文件中的热键绑定
//! - `error` - 热键相关错误类型
//!
//! # 使用方法
//!
//! ```
//! use std::sync::Arc;
//! use hotbind_lib::hotkey::{DispatchRouter, HandleTable, SimulatedBackend};
//!
//! let router = Arc::new(DispatchRouter::new());
//! let backend = Arc::new(SimulatedBackend::new(Arc::clone(&router)));
//! let mut table = HandleTable::new(backend.clone());
//!
//! router.set_callback(Arc::new(|id, is_down| id == 1 && is_down));
//!
//! let handle = table.register(1, "cmd+a".parse().unwrap()).unwrap();
//! assert!(backend.fire(1, true));
//!
//! table.unregister(handle).unwrap();
//! assert!(!backend.fire(1, true));
//! ```

pub mod backend;
mod config;
mod error;
mod keys;
mod router;
mod table;

/// 调用方选择的热键标识符
///
/// 在当前已注册的热键中唯一，注销后可以复用
pub type HotkeyId = u32;

pub use backend::{create_backend, BackendKind, HotkeyBackend, OsHandle, PortableBackend, SimulatedBackend};
#[cfg(target_os = "macos")]
pub use backend::CarbonBackend;
pub use config::{HotkeyBinding, HotkeyConfig};
pub use error::{HotkeyError, HotkeyResult};
pub use keys::{key_name, keycode_for, KeySpec, Modifier, ModifierSet, MAX_KEYCODE};
pub use router::{DispatchCallback, DispatchRouter, HotkeyEvent};
pub use table::{Detached, HandleTable, HotkeyHandle};
