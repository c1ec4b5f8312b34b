/// Callback registry bridge between OS hotkeys and handler slots
pub mod bridge;

/// Hotkey handle table, dispatch router and OS backends
pub mod hotkey;

/// Platform event loops
pub mod platform;

/// Embedded Lua runtime
pub mod script;

/// Configuration and hotkey lifecycle state
pub mod state;

/// Utility modules
pub mod utils;
