// ABOUTME: macOS backend: NSWorkspace for the frontmost app, CoreGraphics for pointer and keys
// ABOUTME: Shortcuts are registered system-wide through the global-hotkey crate

pub mod backend;

pub use backend::MacBackend;
