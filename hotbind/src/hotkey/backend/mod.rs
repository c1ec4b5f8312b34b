//! 系统热键后端
//!
//! 后端负责与操作系统的事件管理器交互：创建/释放全局热键资源，
//! 并把系统的按键事件投递给 [`DispatchRouter`]。
//!
//! # 架构
//!
//! ```text
//! backend/
//! ├── mod.rs        - 后端抽象与选择
//! ├── carbon.rs     - macOS Carbon Event Manager
//! ├── portable.rs   - global-hotkey crate（跨平台）
//! └── simulated.rs  - 进程内模拟后端（测试与演练）
//! ```

#[cfg(target_os = "macos")]
mod carbon;
mod portable;
mod simulated;

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::error::HotkeyResult;
use super::keys::KeySpec;
use super::router::DispatchRouter;
use super::HotkeyId;

#[cfg(target_os = "macos")]
pub use carbon::CarbonBackend;
pub use portable::PortableBackend;
pub use simulated::SimulatedBackend;

/// 系统热键资源的不透明句柄
///
/// 只能由后端创建，不可复制；由句柄表独占持有，直到显式注销
#[derive(Debug, PartialEq, Eq)]
pub struct OsHandle(u64);

impl OsHandle {
    pub(crate) fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub(crate) fn raw(&self) -> u64 {
        self.0
    }
}

/// 系统热键后端
///
/// 注册时传入的 `id` 必须在事件投递时原样交回路由器
pub trait HotkeyBackend: Send + Sync {
    /// 后端名称（用于日志）
    fn name(&self) -> &'static str;

    /// 向系统注册全局热键
    ///
    /// # Errors
    ///
    /// 系统拒绝时返回 [`HotkeyError::Registration`](super::HotkeyError::Registration)
    fn register(&self, id: HotkeyId, spec: &KeySpec) -> HotkeyResult<OsHandle>;

    /// 释放系统热键资源
    ///
    /// 返回后该资源不再产生事件（已在途的事件除外）
    fn unregister(&self, id: HotkeyId, handle: &OsHandle) -> HotkeyResult<()>;
}

/// 后端类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// 按平台自动选择
    #[default]
    Auto,
    /// macOS Carbon Event Manager
    Carbon,
    /// global-hotkey crate
    Portable,
    /// 进程内模拟
    Simulated,
}

impl BackendKind {
    /// 解析 `Auto` 为当前平台的具体后端
    pub fn resolve(self) -> Self {
        match self {
            BackendKind::Auto => {
                if cfg!(target_os = "macos") {
                    BackendKind::Carbon
                } else {
                    BackendKind::Portable
                }
            }
            other => other,
        }
    }
}

/// 创建后端实例
///
/// 后端把事件投递给 `router`
///
/// # Errors
///
/// 当前平台不支持所选后端或系统初始化失败时返回错误
pub fn create_backend(
    kind: BackendKind,
    router: Arc<DispatchRouter>,
) -> HotkeyResult<Arc<dyn HotkeyBackend>> {
    let kind = kind.resolve();
    tracing::debug!(backend = ?kind, "Creating hotkey backend");

    match kind {
        #[cfg(target_os = "macos")]
        BackendKind::Carbon => Ok(Arc::new(CarbonBackend::new(router)?)),
        #[cfg(not(target_os = "macos"))]
        BackendKind::Carbon => Err(super::HotkeyError::Backend(
            "Carbon backend is only available on macOS".to_string(),
        )),
        BackendKind::Portable | BackendKind::Auto => Ok(Arc::new(PortableBackend::new(router)?)),
        BackendKind::Simulated => Ok(Arc::new(SimulatedBackend::new(router))),
    }
}
