//! 热键模块集成测试

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use hotbind_lib::hotkey::{
    DispatchRouter, HandleTable, HotkeyBackend, HotkeyError, HotkeyEvent, KeySpec, Modifier,
    ModifierSet, SimulatedBackend, key_name, keycode_for,
};

fn simulated() -> (Arc<DispatchRouter>, Arc<SimulatedBackend>) {
    let router = Arc::new(DispatchRouter::new());
    let backend = Arc::new(SimulatedBackend::new(Arc::clone(&router)));
    (router, backend)
}

// ============================================================================
// KeySpec 测试
// ============================================================================

#[test]
fn test_key_spec_parse_and_display() {
    let spec: KeySpec = "Shift+Cmd+A".parse().unwrap();
    assert_eq!(spec.keycode(), 0x00);
    assert!(spec.modifiers().contains(Modifier::Command));
    assert!(spec.modifiers().contains(Modifier::Shift));
    assert!(!spec.modifiers().contains(Modifier::Control));
    assert_eq!(spec.to_string(), "cmd+shift+a");
}

#[test]
fn test_key_spec_from_parts() {
    let spec = KeySpec::from_parts("f5", &["ctrl", "alt"]).unwrap();
    assert_eq!(Some(spec.keycode()), keycode_for("f5"));
    assert!(spec.modifiers().contains(Modifier::Control));
    assert!(spec.modifiers().contains(Modifier::Option));
}

#[test]
fn test_key_spec_rejects_bad_input() {
    assert!(matches!(
        "cmd+nokey".parse::<KeySpec>(),
        Err(HotkeyError::InvalidKey(_))
    ));
    assert!(matches!(
        "cmd+a+b".parse::<KeySpec>(),
        Err(HotkeyError::InvalidKey(_))
    ));
    assert!(matches!(
        "cmd++a".parse::<KeySpec>(),
        Err(HotkeyError::InvalidKey(_))
    ));
    assert!(matches!(
        KeySpec::from_parts("a", &["hyper"]),
        Err(HotkeyError::InvalidModifier(_))
    ));
}

#[test]
fn test_modifier_mask_bits() {
    let set = ModifierSet::from_modifiers(&[Modifier::Command, Modifier::Shift]);
    assert_eq!(set.bits(), (1 << 8) | (1 << 9));
    assert_eq!(ModifierSet::from_bits(set.bits()), Some(set));
    assert_eq!(ModifierSet::from_bits(1), None);
}

#[test]
fn test_key_name_round_trip() {
    for name in ["a", "space", "escape", "f1", "left"] {
        let code = keycode_for(name).unwrap();
        assert_eq!(key_name(code), Some(name));
    }
}

// ============================================================================
// HandleTable 测试
// ============================================================================

#[test]
fn test_table_register_and_unregister() {
    let (_router, backend) = simulated();
    let mut table = HandleTable::new(backend.clone());

    let handle = table.register(1, "cmd+a".parse().unwrap()).unwrap();
    assert_eq!(handle.id(), 1);
    assert!(table.is_live(handle));
    assert_eq!(table.len(), 1);
    assert_eq!(backend.live_count(), 1);

    table.unregister(handle).unwrap();
    assert!(table.is_empty());
    assert!(!table.is_live(handle));
    assert_eq!(backend.live_count(), 0);
}

#[test]
fn test_table_duplicate_id_keeps_original() {
    let (_router, backend) = simulated();
    let mut table = HandleTable::new(backend.clone());

    table.register(1, "cmd+a".parse().unwrap()).unwrap();
    let err = table.register(1, "cmd+b".parse().unwrap()).unwrap_err();
    assert_eq!(err, HotkeyError::DuplicateIdentifier(1));

    assert_eq!(table.key_spec(1), Some("cmd+a".parse().unwrap()));
    assert_eq!(backend.live_count(), 1);
}

#[test]
fn test_table_stale_handle_is_double_release() {
    let (_router, backend) = simulated();
    let mut table = HandleTable::new(backend);

    let old = table.register(1, "cmd+a".parse().unwrap()).unwrap();
    table.unregister(old).unwrap();
    let new = table.register(1, "cmd+a".parse().unwrap()).unwrap();

    assert_ne!(old, new);
    assert_eq!(table.unregister(old), Err(HotkeyError::DoubleRelease(1)));
    assert!(table.is_live(new));
}

#[test]
fn test_table_os_rejection_leaves_no_entry() {
    let (_router, backend) = simulated();
    let mut table = HandleTable::new(backend.clone());

    table.register(1, "cmd+a".parse().unwrap()).unwrap();
    let err = table.register(2, "cmd+a".parse().unwrap()).unwrap_err();
    assert!(matches!(err, HotkeyError::Registration { .. }));
    assert!(!table.contains(2));
    assert_eq!(table.ids(), vec![1]);
}

#[test]
fn test_table_detach_all() {
    let (_router, backend) = simulated();
    let mut table = HandleTable::new(backend.clone());

    table.register(3, "f3".parse().unwrap()).unwrap();
    table.register(1, "f1".parse().unwrap()).unwrap();
    assert_eq!(table.ids(), vec![1, 3]);

    let detached = table.detach_all();
    assert_eq!(detached.len(), 2);
    assert!(table.is_empty());

    for item in detached {
        HandleTable::release(&*backend, item).unwrap();
    }
    assert_eq!(backend.live_count(), 0);
}

// ============================================================================
// DispatchRouter 测试
// ============================================================================

#[test]
fn test_router_without_callback_drops_events() {
    let (router, backend) = simulated();
    backend.register(1, &"f1".parse().unwrap()).unwrap();
    assert!(!router.has_callback());
    assert_eq!(backend.press(1), (false, false));
}

#[test]
fn test_router_replaces_callback() {
    let router = DispatchRouter::new();
    let first = Arc::new(AtomicUsize::new(0));
    let second = Arc::new(AtomicUsize::new(0));

    let counter = Arc::clone(&first);
    router.set_callback(Arc::new(move |_, _| {
        counter.fetch_add(1, Ordering::SeqCst);
        true
    }));
    assert!(router.dispatch(1, true));

    let counter = Arc::clone(&second);
    router.set_callback(Arc::new(move |_, _| {
        counter.fetch_add(1, Ordering::SeqCst);
        false
    }));
    assert!(!router.dispatch(1, true));

    assert_eq!(first.load(Ordering::SeqCst), 1);
    assert_eq!(second.load(Ordering::SeqCst), 1);

    router.clear_callback();
    assert!(!router.dispatch(1, true));
}

#[test]
fn test_router_contains_callback_panic() {
    let router = DispatchRouter::new();
    router.set_callback(Arc::new(|_, _| panic!("handler exploded")));
    assert!(!router.dispatch(7, true));
}

#[test]
fn test_hotkey_event_constructors() {
    assert_eq!(HotkeyEvent::down(3), HotkeyEvent { id: 3, is_down: true });
    assert_eq!(HotkeyEvent::up(3), HotkeyEvent { id: 3, is_down: false });
}

#[test]
fn test_backend_name() {
    let (_router, backend) = simulated();
    assert_eq!(backend.name(), "simulated");
}
