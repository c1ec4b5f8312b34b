//! 平台特定实现模块
//!
//! 全局热键事件由系统投递到注册热键的线程，宿主程序必须在该线程上
//! 运行系统事件循环。
//!
//! # 架构
//!
//! ```text
//! platform/
//! ├── mod.rs          - 平台抽象和事件循环入口
//! ├── macos.rs        - CFRunLoop
//! └── windows.rs      - Win32 消息循环
//! ```
//!
//! 其他平台上 `global-hotkey` 自带事件线程，主线程只需等待 Ctrl-C。

#[cfg(target_os = "macos")]
mod macos;

#[cfg(target_os = "windows")]
mod windows;

use serde::{Deserialize, Serialize};

use crate::utils::error::AppResult;

/// 平台类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    /// Windows
    Windows,
    /// macOS
    MacOS,
    /// Linux
    Linux,
    /// 未知平台
    Unknown,
}

impl Platform {
    /// 获取当前平台
    pub fn current() -> Self {
        #[cfg(target_os = "windows")]
        return Platform::Windows;

        #[cfg(target_os = "macos")]
        return Platform::MacOS;

        #[cfg(target_os = "linux")]
        return Platform::Linux;

        #[cfg(not(any(target_os = "windows", target_os = "macos", target_os = "linux")))]
        return Platform::Unknown;
    }

    /// 获取平台名称
    pub fn name(&self) -> &'static str {
        match self {
            Platform::Windows => "Windows",
            Platform::MacOS => "macOS",
            Platform::Linux => "Linux",
            Platform::Unknown => "Unknown",
        }
    }

    /// 热键事件是否需要在注册线程上运行系统事件循环
    pub fn needs_event_loop(&self) -> bool {
        matches!(self, Platform::Windows | Platform::MacOS)
    }
}

/// 在当前线程上运行系统事件循环，直到收到 Ctrl-C
///
/// 必须在创建热键后端的线程上调用
///
/// # Errors
///
/// 无法安装信号处理或创建运行时时返回错误
pub fn run_event_loop() -> AppResult<()> {
    tracing::info!(platform = Platform::current().name(), "Entering event loop");

    #[cfg(target_os = "macos")]
    macos::run_event_loop()?;

    #[cfg(target_os = "windows")]
    windows::run_event_loop()?;

    #[cfg(not(any(target_os = "macos", target_os = "windows")))]
    wait_for_ctrl_c()?;

    tracing::info!("Event loop finished");
    Ok(())
}

/// 在单独的线程上等待 Ctrl-C，收到后调用 `on_signal`
#[cfg(any(target_os = "macos", target_os = "windows"))]
fn spawn_ctrl_c_watcher<F>(on_signal: F) -> AppResult<()>
where
    F: FnOnce() + Send + 'static,
{
    let runtime = signal_runtime()?;
    std::thread::Builder::new()
        .name("hotbind-signal".to_string())
        .spawn(move || {
            runtime.block_on(async {
                match tokio::signal::ctrl_c().await {
                    Ok(()) => tracing::info!("Ctrl-C received"),
                    Err(e) => tracing::error!(error = %e, "Failed to listen for Ctrl-C"),
                }
            });
            on_signal();
        })
        .map_err(|e| format!("Failed to spawn signal thread: {}", e))?;
    Ok(())
}

#[cfg(not(any(target_os = "macos", target_os = "windows")))]
fn wait_for_ctrl_c() -> AppResult<()> {
    signal_runtime()?
        .block_on(tokio::signal::ctrl_c())
        .map_err(|e| format!("Failed to listen for Ctrl-C: {}", e))?;
    tracing::info!("Ctrl-C received");
    Ok(())
}

fn signal_runtime() -> AppResult<tokio::runtime::Runtime> {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|e| format!("Failed to create signal runtime: {}", e).into())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_platform_current() {
        let platform = Platform::current();

        #[cfg(target_os = "windows")]
        assert_eq!(platform, Platform::Windows);

        #[cfg(target_os = "macos")]
        assert_eq!(platform, Platform::MacOS);

        #[cfg(target_os = "linux")]
        assert_eq!(platform, Platform::Linux);

        let _ = platform;
    }

    #[test]
    fn test_platform_name() {
        assert_eq!(Platform::Windows.name(), "Windows");
        assert_eq!(Platform::MacOS.name(), "macOS");
        assert_eq!(Platform::Linux.name(), "Linux");
    }

    #[test]
    fn test_needs_event_loop() {
        assert!(Platform::MacOS.needs_event_loop());
        assert!(Platform::Windows.needs_event_loop());
        assert!(!Platform::Linux.needs_event_loop());
    }

    #[test]
    fn test_platform_serialization() {
        let json = serde_json::to_string(&Platform::MacOS).unwrap();
        assert_eq!(json, "\"macos\"");
    }
}
