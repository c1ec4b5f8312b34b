//! 生命周期与配置集成测试

use std::path::PathBuf;

use hotbind_lib::hotkey::{BackendKind, HotkeyBinding, HotkeyError};
use hotbind_lib::state::{
    AppConfig, ConfigError, ConfigManager, DEFAULT_LOG_FILTER, DEFAULT_SCRIPT_ID_BASE, DEFAULT_STRICT,
    GlobalConfig, HotkeyPhase, StateError, is_valid_transition,
};

fn temp_config_path(name: &str) -> PathBuf {
    std::env::temp_dir()
        .join(format!("hotbind-test-{}-{}", std::process::id(), name))
        .join("config.json")
}

// ============================================================================
// 生命周期
// ============================================================================

#[test]
fn test_phase_default_is_unregistered() {
    assert_eq!(HotkeyPhase::default(), HotkeyPhase::Unregistered);
    assert!(!HotkeyPhase::default().is_registered());
}

#[test]
fn test_complete_lifecycle() {
    use HotkeyPhase::*;

    // register -> bind -> unbind -> bind -> unregister
    let path = [Unregistered, Registered, Bound, Registered, Bound, Unregistered];
    for pair in path.windows(2) {
        assert!(
            HotkeyPhase::check_transition(1, pair[0], pair[1]).is_ok(),
            "{} -> {} should be valid",
            pair[0],
            pair[1]
        );
    }
}

#[test]
fn test_bind_requires_registration() {
    let err = HotkeyPhase::check_transition(4, HotkeyPhase::Unregistered, HotkeyPhase::Bound)
        .unwrap_err();
    assert_eq!(
        err,
        StateError::InvalidTransition {
            id: 4,
            from: HotkeyPhase::Unregistered,
            to: HotkeyPhase::Bound,
        }
    );
    assert!(!is_valid_transition(HotkeyPhase::Bound, HotkeyPhase::Bound));
}

#[test]
fn test_dangling_slot_is_inconsistent() {
    let err = HotkeyPhase::from_parts(3, false, true).unwrap_err();
    assert_eq!(err, StateError::DanglingSlot(3));

    let hotkey_err: HotkeyError = err.into();
    assert!(hotkey_err.is_programming_error());
}

#[test]
fn test_phase_from_parts() {
    assert_eq!(HotkeyPhase::from_parts(1, false, false).unwrap(), HotkeyPhase::Unregistered);
    assert_eq!(HotkeyPhase::from_parts(1, true, false).unwrap(), HotkeyPhase::Registered);
    assert_eq!(HotkeyPhase::from_parts(1, true, true).unwrap(), HotkeyPhase::Bound);
}

// ============================================================================
// 配置
// ============================================================================

#[test]
fn test_app_config_defaults() {
    let config = AppConfig::default();
    assert_eq!(config.backend, BackendKind::Auto);
    assert_eq!(config.strict, cfg!(debug_assertions));
    assert_eq!(config.script.script_id_base, DEFAULT_SCRIPT_ID_BASE);
    assert_eq!(config.logging.filter, DEFAULT_LOG_FILTER);
    assert!(config.hotkeys.bindings.is_empty());
}

#[test]
fn test_config_save_and_load() {
    let path = temp_config_path("roundtrip");

    let mut config = AppConfig::default();
    config.backend = BackendKind::Simulated;
    config.strict = true;
    config.hotkeys = config
        .hotkeys
        .with_binding(HotkeyBinding::new(1, "cmd+shift+r").unwrap().with_label("reload"));

    ConfigManager::save_to(&path, &config).unwrap();
    let loaded = ConfigManager::load_from(&path).unwrap();
    assert_eq!(loaded, config);

    ConfigManager::delete_at(&path).unwrap();
    assert!(!path.exists());
}

#[test]
fn test_missing_config_uses_defaults() {
    let path = temp_config_path("missing");
    assert_eq!(ConfigManager::load_from(&path).unwrap(), AppConfig::default());
}

#[test]
fn test_partial_config_fills_defaults() {
    let path = temp_config_path("partial");
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(
        &path,
        r#"{ "backend": "simulated", "hotkeys": { "bindings": [ { "id": 2, "keys": "ctrl+f5" } ] } }"#,
    )
    .unwrap();

    let config = ConfigManager::load_from(&path).unwrap();
    assert_eq!(config.backend, BackendKind::Simulated);
    assert_eq!(config.hotkeys.bindings.len(), 1);
    assert_eq!(config.hotkeys.bindings[0].keys.to_string(), "ctrl+f5");
    assert_eq!(config.script.script_id_base, DEFAULT_SCRIPT_ID_BASE);

    ConfigManager::delete_at(&path).unwrap();
}

#[test]
fn test_invalid_configs_rejected() {
    let path = temp_config_path("invalid");
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();

    std::fs::write(&path, r#"{ "hotkeys": { "bindings": [ { "id": 1, "keys": "cmd+nokey" } ] } }"#)
        .unwrap();
    assert!(matches!(ConfigManager::load_from(&path), Err(ConfigError::Json(_))));

    std::fs::write(
        &path,
        r#"{ "hotkeys": { "bindings": [ { "id": 1, "keys": "f1" }, { "id": 1, "keys": "f2" } ] } }"#,
    )
    .unwrap();
    assert!(matches!(ConfigManager::load_from(&path), Err(ConfigError::Invalid(_))));

    std::fs::write(
        &path,
        r#"{ "hotkeys": { "bindings": [ { "id": 1000, "keys": "f1" } ] } }"#,
    )
    .unwrap();
    assert!(matches!(ConfigManager::load_from(&path), Err(ConfigError::Invalid(_))));

    ConfigManager::delete_at(&path).unwrap();
}

#[test]
fn test_global_config_updates() {
    let global = GlobalConfig::new(AppConfig::default());
    assert_eq!(global.strict(), DEFAULT_STRICT);

    global.set_strict(false);
    assert!(!global.strict());

    let mut config = AppConfig::default();
    config.backend = BackendKind::Portable;
    config.strict = true;
    global.update(config);
    assert_eq!(global.get().backend, BackendKind::Portable);
    assert!(global.strict());
}
