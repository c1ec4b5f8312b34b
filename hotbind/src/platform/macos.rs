//! macOS 事件循环
//!
//! Carbon 热键事件通过主线程的 CFRunLoop 投递

use std::ffi::c_void;

use crate::utils::error::AppResult;

type CFRunLoopRef = *mut c_void;

#[link(name = "CoreFoundation", kind = "framework")]
unsafe extern "C" {
    fn CFRunLoopGetMain() -> CFRunLoopRef;
    fn CFRunLoopRun();
    fn CFRunLoopStop(run_loop: CFRunLoopRef);
}

/// 运行主线程 CFRunLoop，收到 Ctrl-C 后停止
pub(super) fn run_event_loop() -> AppResult<()> {
    super::spawn_ctrl_c_watcher(|| {
        // CFRunLoopStop 可以从任意线程调用
        unsafe { CFRunLoopStop(CFRunLoopGetMain()) };
    })?;

    unsafe { CFRunLoopRun() };
    Ok(())
}
