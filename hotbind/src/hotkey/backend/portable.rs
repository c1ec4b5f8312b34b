//! global-hotkey 后端
//!
//! 基于 `global-hotkey` crate，支持 Windows、macOS 和 Linux (X11)。
//!
//! # 注意
//!
//! - `GlobalHotKeyManager` 绑定创建它的线程（Windows 上热键消息投递到该线程的
//!   消息队列），注册和注销必须在同一线程调用，否则返回错误
//! - 系统分配的热键 ID 由按键组合计算得出，这里维护系统 ID 到调用方标识符的映射
//! - 事件处理器是进程级的，创建新的后端实例会替换旧的处理器

use std::collections::HashMap;
use std::mem::ManuallyDrop;
use std::sync::Arc;
use std::thread::{self, ThreadId};

use global_hotkey::hotkey::{Code, HotKey, Modifiers};
use global_hotkey::{GlobalHotKeyEvent, GlobalHotKeyManager, HotKeyState};
use parking_lot::Mutex;

use super::{HotkeyBackend, OsHandle};
use crate::hotkey::error::{HotkeyError, HotkeyResult};
use crate::hotkey::keys::{KeySpec, Modifier};
use crate::hotkey::router::DispatchRouter;
use crate::hotkey::HotkeyId;

/// 系统热键 ID -> (调用方标识符, 热键)
type IdMap = Arc<Mutex<HashMap<u32, (HotkeyId, HotKey)>>>;

/// 绑定到创建线程的热键管理器
struct ThreadBoundManager {
    owner: ThreadId,
    manager: ManuallyDrop<GlobalHotKeyManager>,
}

// SAFETY: 只有 `get` 暴露内部管理器，且仅在所有者线程上返回；
// 其他线程上的析构会直接泄漏管理器而不触碰它
unsafe impl Send for ThreadBoundManager {}
unsafe impl Sync for ThreadBoundManager {}

impl ThreadBoundManager {
    fn new() -> HotkeyResult<Self> {
        let manager = GlobalHotKeyManager::new().map_err(|e| HotkeyError::Backend(e.to_string()))?;
        Ok(Self {
            owner: thread::current().id(),
            manager: ManuallyDrop::new(manager),
        })
    }

    fn get(&self) -> HotkeyResult<&GlobalHotKeyManager> {
        if thread::current().id() != self.owner {
            return Err(HotkeyError::Backend(
                "global-hotkey manager must be used from the thread that created it".to_string(),
            ));
        }
        Ok(&self.manager)
    }
}

impl Drop for ThreadBoundManager {
    fn drop(&mut self) {
        if thread::current().id() == self.owner {
            // SAFETY: 仅在此处释放一次
            unsafe { ManuallyDrop::drop(&mut self.manager) };
        } else {
            tracing::warn!("Hotkey manager dropped off its owner thread, leaking it");
        }
    }
}

/// global-hotkey 后端
pub struct PortableBackend {
    manager: ThreadBoundManager,
    ids: IdMap,
}

impl PortableBackend {
    /// 创建后端并安装进程级事件处理器
    ///
    /// 在 macOS 上必须在主线程调用
    pub fn new(router: Arc<DispatchRouter>) -> HotkeyResult<Self> {
        let manager = ThreadBoundManager::new()?;
        let ids: IdMap = Arc::new(Mutex::new(HashMap::new()));

        let handler_ids = Arc::clone(&ids);
        GlobalHotKeyEvent::set_event_handler(Some(move |event: GlobalHotKeyEvent| {
            let id = handler_ids.lock().get(&event.id).map(|(id, _)| *id);
            match id {
                Some(id) => {
                    router.dispatch(id, event.state == HotKeyState::Pressed);
                }
                None => tracing::trace!(os_id = event.id, "Event for unknown OS hotkey dropped"),
            }
        }));

        tracing::info!("global-hotkey backend initialized");
        Ok(Self { manager, ids })
    }
}

impl HotkeyBackend for PortableBackend {
    fn name(&self) -> &'static str {
        "portable"
    }

    fn register(&self, id: HotkeyId, spec: &KeySpec) -> HotkeyResult<OsHandle> {
        let manager = self.manager.get()?;
        let hotkey = to_hotkey(spec)?;
        let os_id = hotkey.id();

        manager
            .register(hotkey)
            .map_err(|e| HotkeyError::Registration {
                key: spec.to_string(),
                reason: e.to_string(),
            })?;

        self.ids.lock().insert(os_id, (id, hotkey));
        Ok(OsHandle::new(u64::from(os_id)))
    }

    fn unregister(&self, id: HotkeyId, handle: &OsHandle) -> HotkeyResult<()> {
        let manager = self.manager.get()?;
        release_entry(&self.ids, id, handle.raw() as u32, |hotkey| {
            manager.unregister(hotkey).map_err(|e| e.to_string())
        })
    }
}

/// 调用系统注销，成功后才移除映射条目
///
/// 系统拒绝时条目保留，句柄仍然有效，可以重试
fn release_entry(
    ids: &Mutex<HashMap<u32, (HotkeyId, HotKey)>>,
    id: HotkeyId,
    os_id: u32,
    os_unregister: impl FnOnce(HotKey) -> Result<(), String>,
) -> HotkeyResult<()> {
    let hotkey = ids
        .lock()
        .get(&os_id)
        .map(|(_, hotkey)| *hotkey)
        .ok_or_else(|| HotkeyError::Unregistration {
            id,
            reason: "handle is not live".to_string(),
        })?;

    os_unregister(hotkey).map_err(|reason| HotkeyError::Unregistration { id, reason })?;
    ids.lock().remove(&os_id);
    Ok(())
}

/// 将 `KeySpec` 转换为 global-hotkey 的 `HotKey`
fn to_hotkey(spec: &KeySpec) -> HotkeyResult<HotKey> {
    let code = code_for_keycode(spec.keycode()).ok_or_else(|| HotkeyError::Registration {
        key: spec.to_string(),
        reason: "key is not supported by the global-hotkey backend".to_string(),
    })?;

    let mut mods = Modifiers::empty();
    for modifier in spec.modifiers().iter() {
        mods |= match modifier {
            Modifier::Command => Modifiers::SUPER,
            Modifier::Control => Modifiers::CONTROL,
            Modifier::Option => Modifiers::ALT,
            Modifier::Shift => Modifiers::SHIFT,
        };
    }

    let mods = if mods.is_empty() { None } else { Some(mods) };
    Ok(HotKey::new(mods, code))
}

/// 虚拟键码到 `Code` 的映射
fn code_for_keycode(keycode: u32) -> Option<Code> {
    let code = match keycode {
        0x00 => Code::KeyA,
        0x01 => Code::KeyS,
        0x02 => Code::KeyD,
        0x03 => Code::KeyF,
        0x04 => Code::KeyH,
        0x05 => Code::KeyG,
        0x06 => Code::KeyZ,
        0x07 => Code::KeyX,
        0x08 => Code::KeyC,
        0x09 => Code::KeyV,
        0x0B => Code::KeyB,
        0x0C => Code::KeyQ,
        0x0D => Code::KeyW,
        0x0E => Code::KeyE,
        0x0F => Code::KeyR,
        0x10 => Code::KeyY,
        0x11 => Code::KeyT,
        0x12 => Code::Digit1,
        0x13 => Code::Digit2,
        0x14 => Code::Digit3,
        0x15 => Code::Digit4,
        0x16 => Code::Digit6,
        0x17 => Code::Digit5,
        0x18 => Code::Equal,
        0x19 => Code::Digit9,
        0x1A => Code::Digit7,
        0x1B => Code::Minus,
        0x1C => Code::Digit8,
        0x1D => Code::Digit0,
        0x1E => Code::BracketRight,
        0x1F => Code::KeyO,
        0x20 => Code::KeyU,
        0x21 => Code::BracketLeft,
        0x22 => Code::KeyI,
        0x23 => Code::KeyP,
        0x24 => Code::Enter,
        0x25 => Code::KeyL,
        0x26 => Code::KeyJ,
        0x27 => Code::Quote,
        0x28 => Code::KeyK,
        0x29 => Code::Semicolon,
        0x2A => Code::Backslash,
        0x2B => Code::Comma,
        0x2C => Code::Slash,
        0x2D => Code::KeyN,
        0x2E => Code::KeyM,
        0x2F => Code::Period,
        0x30 => Code::Tab,
        0x31 => Code::Space,
        0x32 => Code::Backquote,
        0x33 => Code::Backspace,
        0x35 => Code::Escape,
        0x40 => Code::F17,
        0x41 => Code::NumpadDecimal,
        0x43 => Code::NumpadMultiply,
        0x45 => Code::NumpadAdd,
        0x47 => Code::NumLock,
        0x4B => Code::NumpadDivide,
        0x4C => Code::NumpadEnter,
        0x4E => Code::NumpadSubtract,
        0x4F => Code::F18,
        0x50 => Code::F19,
        0x51 => Code::NumpadEqual,
        0x52 => Code::Numpad0,
        0x53 => Code::Numpad1,
        0x54 => Code::Numpad2,
        0x55 => Code::Numpad3,
        0x56 => Code::Numpad4,
        0x57 => Code::Numpad5,
        0x58 => Code::Numpad6,
        0x59 => Code::Numpad7,
        0x5A => Code::F20,
        0x5B => Code::Numpad8,
        0x5C => Code::Numpad9,
        0x60 => Code::F5,
        0x61 => Code::F6,
        0x62 => Code::F7,
        0x63 => Code::F3,
        0x64 => Code::F8,
        0x65 => Code::F9,
        0x67 => Code::F11,
        0x69 => Code::F13,
        0x6A => Code::F16,
        0x6B => Code::F14,
        0x6D => Code::F10,
        0x6F => Code::F12,
        0x71 => Code::F15,
        0x72 => Code::Help,
        0x73 => Code::Home,
        0x74 => Code::PageUp,
        0x75 => Code::Delete,
        0x76 => Code::F4,
        0x77 => Code::End,
        0x78 => Code::F2,
        0x79 => Code::PageDown,
        0x7A => Code::F1,
        0x7B => Code::ArrowLeft,
        0x7C => Code::ArrowRight,
        0x7D => Code::ArrowDown,
        0x7E => Code::ArrowUp,
        _ => return None,
    };
    Some(code)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hotkey::keys::keycode_for;

    #[test]
    fn test_every_named_key_has_a_code() {
        for name in ["a", "z", "0", "9", "f1", "f20", "space", "return", "escape", "left", "pad5"] {
            let keycode = keycode_for(name).unwrap();
            assert!(code_for_keycode(keycode).is_some(), "no code for {}", name);
        }
        assert!(code_for_keycode(0x7F).is_none());
    }

    #[test]
    fn test_to_hotkey_modifiers() {
        let spec: KeySpec = "cmd+shift+a".parse().unwrap();
        let hotkey = to_hotkey(&spec).unwrap();
        assert_eq!(hotkey, HotKey::new(Some(Modifiers::SUPER | Modifiers::SHIFT), Code::KeyA));

        let bare: KeySpec = "f5".parse().unwrap();
        assert_eq!(to_hotkey(&bare).unwrap(), HotKey::new(None, Code::F5));
    }

    #[test]
    fn test_failed_unregister_keeps_entry() {
        let hotkey = to_hotkey(&"cmd+a".parse().unwrap()).unwrap();
        let os_id = hotkey.id();
        let ids = Mutex::new(HashMap::from([(os_id, (7, hotkey))]));

        let result = release_entry(&ids, 7, os_id, |_| Err("busy".to_string()));
        assert!(matches!(result, Err(HotkeyError::Unregistration { id: 7, .. })));
        assert_eq!(ids.lock().get(&os_id), Some(&(7, hotkey)));

        let mut released = None;
        release_entry(&ids, 7, os_id, |h| {
            released = Some(h);
            Ok(())
        })
        .unwrap();
        assert_eq!(released, Some(hotkey));
        assert!(ids.lock().is_empty());

        let result = release_entry(&ids, 7, os_id, |_| Ok(()));
        assert!(matches!(result, Err(HotkeyError::Unregistration { id: 7, .. })));
    }

    #[test]
    fn test_distinct_specs_have_distinct_os_ids() {
        let a = to_hotkey(&"cmd+a".parse().unwrap()).unwrap();
        let b = to_hotkey(&"cmd+b".parse().unwrap()).unwrap();
        assert_ne!(a.id(), b.id());
    }
}
