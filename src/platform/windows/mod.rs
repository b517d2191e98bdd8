// ABOUTME: Windows backend: Win32 window queries, SendInput for pointer and keys
// ABOUTME: Shortcuts are registered system-wide through the global-hotkey crate

pub mod backend;

pub use backend::WindowsBackend;
