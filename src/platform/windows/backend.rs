// ABOUTME: Win32 implementation of the backend contract
// ABOUTME: Foreground window, cursor and work area queries plus SendInput injection

use crate::hotkey::HotkeyRegistry;
use crate::keys::{KeyEvent, KeyPlatform, dispatch_key_sequence};
use crate::platform::{Backend, BackendInfo, Rect, Shortcut, WmInfo};
use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use std::ffi::c_void;
use std::mem;
use std::path::Path;
use tokio::sync::OnceCell;
use windows::Win32::Foundation::{CloseHandle, POINT, RECT};
use windows::Win32::System::Threading::{
    OpenProcess, PROCESS_NAME_WIN32, PROCESS_QUERY_LIMITED_INFORMATION, QueryFullProcessImageNameW,
};
use windows::Win32::UI::Input::KeyboardAndMouse::{
    INPUT, INPUT_0, INPUT_KEYBOARD, INPUT_MOUSE, KEYBD_EVENT_FLAGS, KEYBDINPUT, KEYEVENTF_EXTENDEDKEY,
    KEYEVENTF_KEYUP, KEYEVENTF_SCANCODE, MOUSEEVENTF_MOVE, MOUSEINPUT, SendInput, VIRTUAL_KEY,
};
use windows::Win32::UI::WindowsAndMessaging::{
    GetCursorPos, GetForegroundWindow, GetWindowTextW, GetWindowThreadProcessId, SPI_GETWORKAREA,
    SYSTEM_PARAMETERS_INFO_UPDATE_FLAGS, SystemParametersInfoW,
};
use windows::core::PWSTR;

const EXTENDED_PREFIX: u32 = 0xe000;

/// Splits a table scan code into the 8-bit scan code and the extended-key flag.
fn scan_code(code: u32) -> (u16, bool) {
    ((code & 0xff) as u16, code & EXTENDED_PREFIX == EXTENDED_PREFIX)
}

fn send(inputs: &[INPUT]) -> Result<()> {
    let sent = unsafe { SendInput(inputs, mem::size_of::<INPUT>() as i32) };
    if sent as usize != inputs.len() {
        return Err(anyhow!(
            "SendInput injected {} of {} events: {}",
            sent,
            inputs.len(),
            windows::core::Error::from_win32()
        ));
    }
    Ok(())
}

fn send_key(code: u32, down: bool) -> Result<()> {
    let (scan, extended) = scan_code(code);
    let mut flags = KEYEVENTF_SCANCODE;
    if !down {
        flags |= KEYEVENTF_KEYUP;
    }
    if extended {
        flags |= KEYEVENTF_EXTENDEDKEY;
    }

    send(&[INPUT {
        r#type: INPUT_KEYBOARD,
        Anonymous: INPUT_0 {
            ki: KEYBDINPUT {
                wVk: VIRTUAL_KEY(0),
                wScan: scan,
                dwFlags: KEYBD_EVENT_FLAGS(flags.0),
                time: 0,
                dwExtraInfo: 0,
            },
        },
    }])
}

fn send_pointer_motion(dx: i32, dy: i32) -> Result<()> {
    send(&[INPUT {
        r#type: INPUT_MOUSE,
        Anonymous: INPUT_0 {
            mi: MOUSEINPUT {
                dx,
                dy,
                mouseData: 0,
                dwFlags: MOUSEEVENTF_MOVE,
                time: 0,
                dwExtraInfo: 0,
            },
        },
    }])
}

fn process_name(pid: u32) -> Option<String> {
    unsafe {
        let process = OpenProcess(PROCESS_QUERY_LIMITED_INFORMATION, false, pid).ok()?;
        let mut buffer = [0u16; 1024];
        let mut size = buffer.len() as u32;
        let queried = QueryFullProcessImageNameW(
            process,
            PROCESS_NAME_WIN32,
            PWSTR(buffer.as_mut_ptr()),
            &mut size,
        );
        let _ = CloseHandle(process);
        queried.ok()?;

        let path = String::from_utf16_lossy(&buffer[..size as usize]);
        Path::new(&path)
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
    }
}

fn query_wm_info() -> Result<WmInfo> {
    let mut window_name = String::new();
    let mut app_name = String::new();

    unsafe {
        let window = GetForegroundWindow();
        if !window.is_invalid() {
            let mut title = [0u16; 512];
            let length = GetWindowTextW(window, &mut title);
            window_name = String::from_utf16_lossy(&title[..length.max(0) as usize]);

            let mut pid = 0u32;
            GetWindowThreadProcessId(window, Some(&mut pid));
            if let Some(name) = process_name(pid) {
                app_name = name;
            }
        }
    }

    let mut point = POINT::default();
    unsafe { GetCursorPos(&mut point) }.context("GetCursorPos failed")?;

    let mut area = RECT::default();
    let work_area = unsafe {
        SystemParametersInfoW(
            SPI_GETWORKAREA,
            0,
            Some(&mut area as *mut RECT as *mut c_void),
            SYSTEM_PARAMETERS_INFO_UPDATE_FLAGS(0),
        )
    }
    .ok()
    .map(|_| Rect {
        x: area.left,
        y: area.top,
        width: area.right - area.left,
        height: area.bottom - area.top,
    });

    Ok(WmInfo {
        window_name,
        app_name,
        pointer_x: point.x,
        pointer_y: point.y,
        work_area,
    })
}

pub struct WindowsBackend {
    hotkeys: OnceCell<HotkeyRegistry>,
}

impl WindowsBackend {
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

impl Default for WindowsBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Backend for WindowsBackend {
    async fn init(&self) -> Result<()> {
        self.hotkeys().await?;
        tracing::info!("Windows backend ready");
        Ok(())
    }

    fn backend_info(&self) -> BackendInfo {
        BackendInfo {
            name: "Windows".to_string(),
            window_type: "toolbar".to_string(),
            supports_shortcuts: true,
            shortcut_hint: None,
        }
    }

    async fn wm_info(&self) -> Result<WmInfo> {
        query_wm_info()
    }

    async fn move_pointer(&self, dx: i32, dy: i32) -> Result<()> {
        send_pointer_motion(dx, dy)
    }

    async fn simulate_keys(&self, keys: &[KeyEvent]) -> Result<()> {
        dispatch_key_sequence(keys, KeyPlatform::Windows, |code, down| async move {
            send_key(code, down)
        })
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
    fn test_scan_code_splits_extended_prefix() {
        assert_eq!(scan_code(0x1d), (0x1d, false));
        assert_eq!(scan_code(0xe01d), (0x1d, true));
        assert_eq!(scan_code(0xe048), (0x48, true));
    }

    #[test]
    fn test_backend_info() {
        let info = WindowsBackend::new().backend_info();
        assert_eq!(info.window_type, "toolbar");
        assert!(info.supports_shortcuts);
    }
}
