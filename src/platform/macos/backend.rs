// ABOUTME: CoreGraphics and AppKit implementation of the backend contract
// ABOUTME: Posting events needs the Accessibility permission, which is checked at init

use crate::hotkey::HotkeyRegistry;
use crate::keys::{KeyEvent, KeyPlatform, dispatch_key_sequence};
use crate::platform::{Backend, BackendInfo, Shortcut, WmInfo};
use anyhow::{Result, anyhow};
use async_trait::async_trait;
use objc2_app_kit::NSWorkspace;
use objc2_core_foundation::CGPoint;
use std::ffi::c_void;
use tokio::sync::OnceCell;

// kCGHIDEventTap
const HID_EVENT_TAP: u32 = 0;

#[link(name = "ApplicationServices", kind = "framework")]
unsafe extern "C" {
    fn AXIsProcessTrusted() -> bool;
}

#[link(name = "CoreGraphics", kind = "framework")]
unsafe extern "C" {
    fn CGEventCreate(source: *const c_void) -> *mut c_void;
    fn CGEventGetLocation(event: *mut c_void) -> CGPoint;
    fn CGWarpMouseCursorPosition(point: CGPoint) -> i32;
    fn CGEventCreateKeyboardEvent(source: *const c_void, keycode: u16, key_down: bool) -> *mut c_void;
    fn CGEventPost(tap: u32, event: *mut c_void);
}

#[link(name = "CoreFoundation", kind = "framework")]
unsafe extern "C" {
    fn CFRelease(object: *const c_void);
}

fn pointer_location() -> Result<CGPoint> {
    unsafe {
        let event = CGEventCreate(std::ptr::null());
        if event.is_null() {
            return Err(anyhow!("CGEventCreate returned null"));
        }
        let location = CGEventGetLocation(event);
        CFRelease(event);
        Ok(location)
    }
}

fn warp_pointer(dx: i32, dy: i32) -> Result<()> {
    let current = pointer_location()?;
    let target = CGPoint {
        x: current.x + f64::from(dx),
        y: current.y + f64::from(dy),
    };
    let status = unsafe { CGWarpMouseCursorPosition(target) };
    if status != 0 {
        return Err(anyhow!("CGWarpMouseCursorPosition failed with {}", status));
    }
    Ok(())
}

fn post_key(code: u32, down: bool) -> Result<()> {
    let keycode = u16::try_from(code).map_err(|_| anyhow!("Key code {} is out of range", code))?;
    unsafe {
        let event = CGEventCreateKeyboardEvent(std::ptr::null(), keycode, down);
        if event.is_null() {
            return Err(anyhow!("CGEventCreateKeyboardEvent returned null"));
        }
        CGEventPost(HID_EVENT_TAP, event);
        CFRelease(event);
    }
    Ok(())
}

#[allow(unused_unsafe)]
fn frontmost_app_name() -> String {
    unsafe {
        NSWorkspace::sharedWorkspace()
            .frontmostApplication()
            .and_then(|app| app.localizedName())
            .map(|name| name.to_string())
            .unwrap_or_default()
    }
}

pub struct MacBackend {
    hotkeys: OnceCell<HotkeyRegistry>,
}

impl MacBackend {
    pub fn new() -> Self {
        Self {
            hotkeys: OnceCell::new(),
        }
    }

    async fn hotkeys(&self) -> Result<&HotkeyRegistry> {
        self.hotkeys
            .get_or_try_init(|| async { HotkeyRegistry::start() })
            .await
    }
}

impl Default for MacBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Backend for MacBackend {
    async fn init(&self) -> Result<()> {
        if !unsafe { AXIsProcessTrusted() } {
            tracing::warn!(
                "Accessibility access is not granted. Enable it in System Settings > Privacy & Security > Accessibility to simulate keys"
            );
        }
        self.hotkeys().await?;
        tracing::info!("macOS backend ready");
        Ok(())
    }

    fn backend_info(&self) -> BackendInfo {
        BackendInfo {
            name: "macOS".to_string(),
            window_type: "normal".to_string(),
            supports_shortcuts: true,
            shortcut_hint: None,
        }
    }

    async fn wm_info(&self) -> Result<WmInfo> {
        let app_name = frontmost_app_name();
        let pointer = pointer_location()?;
        Ok(WmInfo {
            // Window titles need the screen recording permission; the app name stands in.
            window_name: app_name.clone(),
            app_name,
            pointer_x: pointer.x.round() as i32,
            pointer_y: pointer.y.round() as i32,
            work_area: None,
        })
    }

    async fn move_pointer(&self, dx: i32, dy: i32) -> Result<()> {
        warp_pointer(dx, dy)
    }

    async fn simulate_keys(&self, keys: &[KeyEvent]) -> Result<()> {
        dispatch_key_sequence(keys, KeyPlatform::Macos, |code, down| async move { post_key(code, down) })
            .await
    }

    async fn bind_shortcut(&self, shortcut: Shortcut) -> Result<()> {
        self.hotkeys().await?.bind(shortcut).await
    }

    async fn unbind_shortcut(&self, id: &str) -> Result<()> {
        match self.hotkeys.get() {
            Some(hotkeys) => hotkeys.unbind(id).await,
            None => Ok(()),
        }
    }

    async fn unbind_all_shortcuts(&self) -> Result<()> {
        match self.hotkeys.get() {
            Some(hotkeys) if !hotkeys.table().is_empty() => hotkeys.unbind_all().await,
            Some(_) | None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_info() {
        let info = MacBackend::new().backend_info();
        assert_eq!(info.name, "macOS");
        assert_eq!(info.window_type, "normal");
        assert!(info.supports_shortcuts);
    }
}
