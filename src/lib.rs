// ABOUTME: Platform backends for a pie-menu launcher: window info, pointer, keys and global shortcuts
// ABOUTME: One backend is chosen per desktop session and used through the Backend trait

pub mod accelerator;
pub mod config;
pub mod error;
#[cfg(any(target_os = "windows", target_os = "macos"))]
pub mod hotkey;
pub mod keys;
pub mod platform;

pub use config::Config;
pub use error::{BackendError, backend_error};
pub use keys::KeyEvent;
pub use platform::{
    Backend, BackendInfo, BackendKind, Environment, Rect, Shortcut, ShortcutTable, WmInfo,
    create_backend, select_kind,
};
