//! macOS Carbon Event Manager 后端
//!
//! 整个进程只安装一个事件处理器，同时监听按下和松开事件；
//! 调用方标识符放在 `EventHotKeyID.id` 中，由系统在事件里原样带回。

use std::collections::HashSet;
use std::ffi::c_void;
use std::sync::Arc;

use parking_lot::Mutex;

use super::{HotkeyBackend, OsHandle};
use crate::hotkey::error::{HotkeyError, HotkeyResult};
use crate::hotkey::keys::KeySpec;
use crate::hotkey::router::DispatchRouter;
use crate::hotkey::HotkeyId;

type EventTargetRef = *mut c_void;
type EventHandlerRef = *mut c_void;
type EventHandlerCallRef = *mut c_void;
type EventRef = *mut c_void;
type EventHotKeyRef = *mut c_void;
type EventHandlerUPP = extern "C" fn(EventHandlerCallRef, EventRef, *mut c_void) -> i32;

#[repr(C)]
#[derive(Copy, Clone)]
struct EventTypeSpec {
    event_class: u32,
    event_kind: u32,
}

#[repr(C)]
#[derive(Copy, Clone)]
struct EventHotKeyID {
    signature: u32,
    id: u32,
}

const NO_ERR: i32 = 0;
const EVENT_NOT_HANDLED_ERR: i32 = -9874;
const K_EVENT_CLASS_KEYBOARD: u32 = 0x6B65_7962; // 'keyb'
const K_EVENT_HOTKEY_PRESSED: u32 = 5;
const K_EVENT_HOTKEY_RELEASED: u32 = 6;
const K_EVENT_PARAM_DIRECT_OBJECT: u32 = 0x2D2D_2D2D; // '----'
const TYPE_EVENT_HOTKEY_ID: u32 = 0x686B_6964; // 'hkid'

// 'htbd'
const SIGNATURE: u32 = 0x6874_6264;

#[link(name = "Carbon", kind = "framework")]
unsafe extern "C" {
    fn RegisterEventHotKey(
        key_code: u32,
        modifiers: u32,
        hotkey_id: EventHotKeyID,
        target: EventTargetRef,
        options: u32,
        out_ref: *mut EventHotKeyRef,
    ) -> i32;

    fn UnregisterEventHotKey(hotkey_ref: EventHotKeyRef) -> i32;

    fn InstallEventHandler(
        target: EventTargetRef,
        handler: EventHandlerUPP,
        num_types: u32,
        list: *const EventTypeSpec,
        user_data: *mut c_void,
        out_ref: *mut EventHandlerRef,
    ) -> i32;

    fn RemoveEventHandler(handler_ref: EventHandlerRef) -> i32;

    fn GetApplicationEventTarget() -> EventTargetRef;

    fn GetEventKind(event: EventRef) -> u32;

    fn GetEventParameter(
        event: EventRef,
        name: u32,
        desired_type: u32,
        actual_type: *mut u32,
        buffer_size: u32,
        actual_size: *mut u32,
        data: *mut c_void,
    ) -> i32;
}

/// Carbon 后端
pub struct CarbonBackend {
    handler: EventHandlerRef,
    router: *const DispatchRouter,
    live: Mutex<HashSet<u64>>,
}

// SAFETY: `handler` 只在 Drop 中使用一次；`router` 来自 `Arc::into_raw`，
// 在 Drop 之前始终有效，且 `DispatchRouter` 本身是 Send + Sync
unsafe impl Send for CarbonBackend {}
unsafe impl Sync for CarbonBackend {}

impl CarbonBackend {
    /// 安装进程级事件处理器
    ///
    /// 事件在主线程的 run loop 上投递
    pub fn new(router: Arc<DispatchRouter>) -> HotkeyResult<Self> {
        let types = [
            EventTypeSpec {
                event_class: K_EVENT_CLASS_KEYBOARD,
                event_kind: K_EVENT_HOTKEY_PRESSED,
            },
            EventTypeSpec {
                event_class: K_EVENT_CLASS_KEYBOARD,
                event_kind: K_EVENT_HOTKEY_RELEASED,
            },
        ];

        let router = Arc::into_raw(router);
        let mut handler: EventHandlerRef = std::ptr::null_mut();
        let status = unsafe {
            InstallEventHandler(
                GetApplicationEventTarget(),
                hotkey_event_handler,
                types.len() as u32,
                types.as_ptr(),
                router as *mut c_void,
                &mut handler,
            )
        };

        if status != NO_ERR {
            // SAFETY: 安装失败，系统没有持有该指针
            drop(unsafe { Arc::from_raw(router) });
            return Err(HotkeyError::Backend(format!(
                "InstallEventHandler failed: {}",
                status
            )));
        }

        tracing::info!("Carbon hotkey event handler installed");
        Ok(Self {
            handler,
            router,
            live: Mutex::new(HashSet::new()),
        })
    }
}

impl HotkeyBackend for CarbonBackend {
    fn name(&self) -> &'static str {
        "carbon"
    }

    fn register(&self, id: HotkeyId, spec: &KeySpec) -> HotkeyResult<OsHandle> {
        if !spec.is_valid() {
            return Err(HotkeyError::Registration {
                key: spec.to_string(),
                reason: format!("keycode 0x{:02X} is out of range", spec.keycode()),
            });
        }

        let hotkey_id = EventHotKeyID {
            signature: SIGNATURE,
            id,
        };
        let mut out_ref: EventHotKeyRef = std::ptr::null_mut();
        let status = unsafe {
            RegisterEventHotKey(
                spec.keycode(),
                spec.modifiers().bits(),
                hotkey_id,
                GetApplicationEventTarget(),
                0,
                &mut out_ref,
            )
        };

        if status != NO_ERR || out_ref.is_null() {
            return Err(HotkeyError::Registration {
                key: spec.to_string(),
                reason: format!("RegisterEventHotKey returned {}", status),
            });
        }

        let raw = out_ref as usize as u64;
        self.live.lock().insert(raw);
        Ok(OsHandle::new(raw))
    }

    fn unregister(&self, id: HotkeyId, handle: &OsHandle) -> HotkeyResult<()> {
        if !self.live.lock().remove(&handle.raw()) {
            return Err(HotkeyError::Unregistration {
                id,
                reason: "handle is not live".to_string(),
            });
        }

        let status = unsafe { UnregisterEventHotKey(handle.raw() as usize as EventHotKeyRef) };
        if status != NO_ERR {
            return Err(HotkeyError::Unregistration {
                id,
                reason: format!("UnregisterEventHotKey returned {}", status),
            });
        }
        Ok(())
    }
}

impl Drop for CarbonBackend {
    fn drop(&mut self) {
        for raw in self.live.lock().drain() {
            unsafe { UnregisterEventHotKey(raw as usize as EventHotKeyRef) };
        }

        let status = unsafe { RemoveEventHandler(self.handler) };
        if status != NO_ERR {
            tracing::warn!(status, "RemoveEventHandler failed");
        }

        // SAFETY: 处理器已移除，不会再有回调读取该指针
        drop(unsafe { Arc::from_raw(self.router) });
        tracing::debug!("Carbon hotkey event handler removed");
    }
}

/// 系统事件回调
///
/// 未被消费的事件返回 `eventNotHandledErr`，让系统继续传递
extern "C" fn hotkey_event_handler(
    _call: EventHandlerCallRef,
    event: EventRef,
    user_data: *mut c_void,
) -> i32 {
    if event.is_null() || user_data.is_null() {
        return EVENT_NOT_HANDLED_ERR;
    }

    let mut hotkey_id = EventHotKeyID {
        signature: 0,
        id: 0,
    };
    let status = unsafe {
        GetEventParameter(
            event,
            K_EVENT_PARAM_DIRECT_OBJECT,
            TYPE_EVENT_HOTKEY_ID,
            std::ptr::null_mut(),
            std::mem::size_of::<EventHotKeyID>() as u32,
            std::ptr::null_mut(),
            &mut hotkey_id as *mut EventHotKeyID as *mut c_void,
        )
    };
    if status != NO_ERR || hotkey_id.signature != SIGNATURE {
        return EVENT_NOT_HANDLED_ERR;
    }

    let is_down = match unsafe { GetEventKind(event) } {
        K_EVENT_HOTKEY_PRESSED => true,
        K_EVENT_HOTKEY_RELEASED => false,
        _ => return EVENT_NOT_HANDLED_ERR,
    };

    // SAFETY: user_data 是 CarbonBackend 持有的 Arc<DispatchRouter>
    let router = unsafe { &*(user_data as *const DispatchRouter) };
    if router.dispatch(hotkey_id.id, is_down) {
        NO_ERR
    } else {
        EVENT_NOT_HANDLED_ERR
    }
}
