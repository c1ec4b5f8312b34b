//! Windows 消息循环
//!
//! `RegisterHotKey` 产生的 `WM_HOTKEY` 投递到注册线程的消息队列

use windows::Win32::Foundation::{LPARAM, WPARAM};
use windows::Win32::System::Threading::GetCurrentThreadId;
use windows::Win32::UI::WindowsAndMessaging::{
    DispatchMessageW, GetMessageW, PostThreadMessageW, TranslateMessage, MSG, WM_QUIT,
};

use crate::utils::error::AppResult;

/// 运行当前线程的消息循环，收到 Ctrl-C 后退出
pub(super) fn run_event_loop() -> AppResult<()> {
    let thread_id = unsafe { GetCurrentThreadId() };

    super::spawn_ctrl_c_watcher(move || {
        if let Err(e) = unsafe { PostThreadMessageW(thread_id, WM_QUIT, WPARAM(0), LPARAM(0)) } {
            tracing::error!(error = %e, "Failed to post WM_QUIT");
        }
    })?;

    let mut msg = MSG::default();
    loop {
        let ret = unsafe { GetMessageW(&mut msg, None, 0, 0) };
        match ret.0 {
            0 => break,
            -1 => return Err(format!("GetMessageW failed: {}", windows::core::Error::from_win32()).into()),
            _ => unsafe {
                let _ = TranslateMessage(&msg);
                let _ = DispatchMessageW(&msg);
            },
        }
    }
    Ok(())
}
