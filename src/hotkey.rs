// ABOUTME: System-wide shortcuts on Windows and macOS through the global-hotkey crate
// ABOUTME: One thread owns the hotkey manager, another dispatches presses to the shortcut table

use crate::accelerator::Accelerator;
use crate::error::BackendError;
use crate::platform::{Shortcut, ShortcutTable};
use anyhow::{Result, anyhow};
use global_hotkey::hotkey::HotKey;
use global_hotkey::{GlobalHotKeyEvent, GlobalHotKeyManager, HotKeyState};
use std::collections::HashMap;
use std::str::FromStr;
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread;
use std::time::Duration;
use tokio::sync::oneshot;

type Reply = oneshot::Sender<std::result::Result<(), Failure>>;

#[derive(Debug)]
enum Failure {
    // Another hotkey or application already holds the combination
    Conflict(String),
    Other(String),
}

impl std::fmt::Display for Failure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Failure::Conflict(message) | Failure::Other(message) => f.write_str(message),
        }
    }
}

impl From<global_hotkey::Error> for Failure {
    fn from(e: global_hotkey::Error) -> Self {
        match e {
            global_hotkey::Error::AlreadyRegistered(_) | global_hotkey::Error::FailedToRegister(_) => {
                Failure::Conflict(e.to_string())
            }
            other => Failure::Other(other.to_string()),
        }
    }
}

fn thread_gone() -> Failure {
    Failure::Other("hotkey thread is gone".to_string())
}

/// Only a conflicting registration is reported as `ShortcutInUse`.
fn registration_error(trigger: &str, failure: Failure) -> anyhow::Error {
    match failure {
        Failure::Conflict(_) => BackendError::ShortcutInUse {
            trigger: trigger.to_string(),
        }
        .into(),
        Failure::Other(message) => anyhow!("Failed to register hotkey {}: {}", trigger, message),
    }
}

enum Command {
    Register(HotKey, Reply),
    Unregister(HotKey, Reply),
}

// id -> registered hotkey
type Registered = Arc<Mutex<HashMap<String, HotKey>>>;

fn lock(registered: &Registered) -> MutexGuard<'_, HashMap<String, HotKey>> {
    registered.lock().unwrap_or_else(|p| p.into_inner())
}

/// Converts an accelerator like `CommandOrControl+Shift+K` into a `global-hotkey` key.
pub fn parse_hotkey(trigger: &str) -> Result<HotKey> {
    let hotkey = Accelerator::parse(trigger)?.to_hotkey_string()?;
    HotKey::from_str(&hotkey)
        .map_err(|e| BackendError::invalid_shortcut(trigger, e.to_string()).into())
}

pub struct HotkeyRegistry {
    commands: mpsc::Sender<Command>,
    table: ShortcutTable,
    registered: Registered,
}

impl HotkeyRegistry {
    /// Spawns the manager and dispatch threads.
    pub fn start() -> Result<Self> {
        let (commands, receiver) = mpsc::channel();
        let (ready_tx, ready_rx) = mpsc::channel();
        thread::Builder::new()
            .name("global-hotkeys".to_string())
            .spawn(move || run_manager(receiver, ready_tx))?;
        ready_rx
            .recv()
            .map_err(|_| anyhow!("Hotkey thread exited during startup"))?
            .map_err(|e| anyhow!("Failed to create hotkey manager: {}", e))?;

        let table = ShortcutTable::new();
        let registered = Registered::default();
        let dispatch_table = table.clone();
        let dispatch_registered = registered.clone();
        thread::Builder::new()
            .name("global-hotkey-events".to_string())
            .spawn(move || {
                let events = GlobalHotKeyEvent::receiver();
                while let Ok(event) = events.recv() {
                    if event.state != HotKeyState::Pressed {
                        continue;
                    }
                    let id = lock(&dispatch_registered)
                        .iter()
                        .find(|(_, hotkey)| hotkey.id() == event.id)
                        .map(|(id, _)| id.clone());
                    if let Some(id) = id {
                        dispatch_table.trigger(&id);
                    }
                }
                tracing::debug!("Global hotkey event channel closed");
            })?;

        Ok(Self {
            commands,
            table,
            registered,
        })
    }

    async fn send(&self, command: impl FnOnce(Reply) -> Command) -> std::result::Result<(), Failure> {
        let (reply, response) = oneshot::channel();
        if self.commands.send(command(reply)).is_err() {
            return Err(thread_gone());
        }
        response.await.unwrap_or_else(|_| Err(thread_gone()))
    }

    pub async fn bind(&self, shortcut: Shortcut) -> Result<()> {
        let hotkey = parse_hotkey(&shortcut.trigger)?;
        let previous = lock(&self.registered).get(&shortcut.id).copied();

        if previous != Some(hotkey) {
            if let Err(e) = self.send(|reply| Command::Register(hotkey, reply)).await {
                tracing::warn!("Failed to register '{}': {}", shortcut.trigger, e);
                return Err(registration_error(&shortcut.trigger, e));
            }
            if let Some(previous) = previous {
                if let Err(e) = self.send(|reply| Command::Unregister(previous, reply)).await {
                    tracing::warn!("Failed to release the previous hotkey of '{}': {}", shortcut.id, e);
                }
            }
            lock(&self.registered).insert(shortcut.id.clone(), hotkey);
        }

        tracing::info!("Registered global hotkey {} for '{}'", shortcut.trigger, shortcut.id);
        self.table.insert(shortcut);
        Ok(())
    }

    pub async fn unbind(&self, id: &str) -> Result<()> {
        self.table.remove(id);
        let hotkey = lock(&self.registered).remove(id);
        if let Some(hotkey) = hotkey {
            self.send(|reply| Command::Unregister(hotkey, reply))
                .await
                .map_err(|e| anyhow!("Failed to unregister hotkey for '{}': {}", id, e))?;
        }
        Ok(())
    }

    pub async fn unbind_all(&self) -> Result<()> {
        self.table.clear();
        let hotkeys: Vec<HotKey> = lock(&self.registered).drain().map(|(_, hotkey)| hotkey).collect();
        for hotkey in hotkeys {
            if let Err(e) = self.send(|reply| Command::Unregister(hotkey, reply)).await {
                tracing::warn!("Failed to unregister hotkey {}: {}", hotkey.id(), e);
            }
        }
        Ok(())
    }

    pub fn table(&self) -> &ShortcutTable {
        &self.table
    }
}

fn run_manager(
    commands: mpsc::Receiver<Command>,
    ready: mpsc::Sender<std::result::Result<(), String>>,
) {
    let manager = match GlobalHotKeyManager::new() {
        Ok(manager) => {
            let _ = ready.send(Ok(()));
            manager
        }
        Err(e) => {
            let _ = ready.send(Err(e.to_string()));
            return;
        }
    };

    loop {
        match commands.recv_timeout(Duration::from_millis(16)) {
            Ok(Command::Register(hotkey, reply)) => {
                let _ = reply.send(manager.register(hotkey).map_err(Failure::from));
            }
            Ok(Command::Unregister(hotkey, reply)) => {
                let _ = reply.send(manager.unregister(hotkey).map_err(Failure::from));
            }
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => break,
        }
        #[cfg(target_os = "windows")]
        pump_messages();
    }
    tracing::debug!("Hotkey manager thread stopped");
}

// The manager's hidden window only receives WM_HOTKEY while its thread pumps messages.
#[cfg(target_os = "windows")]
fn pump_messages() {
    use windows::Win32::Foundation::HWND;
    use windows::Win32::UI::WindowsAndMessaging::{DispatchMessageW, MSG, PM_REMOVE, PeekMessageW, TranslateMessage};

    let mut msg = MSG::default();
    unsafe {
        while PeekMessageW(&mut msg, HWND::default(), 0, 0, PM_REMOVE).as_bool() {
            let _ = TranslateMessage(&msg);
            DispatchMessageW(&msg);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use global_hotkey::hotkey::{Code, Modifiers};

    #[test]
    fn test_parse_hotkey() {
        let hotkey = parse_hotkey("Ctrl+Shift+K").unwrap();
        assert_eq!(hotkey, HotKey::new(Some(Modifiers::CONTROL | Modifiers::SHIFT), Code::KeyK));

        let hotkey = parse_hotkey("Alt+F5").unwrap();
        assert_eq!(hotkey, HotKey::new(Some(Modifiers::ALT), Code::F5));
    }

    #[test]
    fn test_parse_hotkey_rejects_bad_triggers() {
        let error = parse_hotkey("Ctrl+Shift").unwrap_err();
        assert!(matches!(
            crate::error::backend_error(&error),
            Some(BackendError::InvalidShortcut { .. })
        ));
    }

    #[test]
    fn test_only_conflicts_are_shortcut_in_use() {
        let hotkey = parse_hotkey("Ctrl+Shift+K").unwrap();
        let conflict = Failure::from(global_hotkey::Error::AlreadyRegistered(hotkey));
        assert!(matches!(conflict, Failure::Conflict(_)));

        let error = registration_error("Ctrl+Shift+K", conflict);
        assert!(matches!(
            crate::error::backend_error(&error),
            Some(BackendError::ShortcutInUse { trigger }) if trigger == "Ctrl+Shift+K"
        ));

        let error = registration_error("Ctrl+Shift+K", thread_gone());
        assert!(crate::error::backend_error(&error).is_none());
        assert!(error.to_string().contains("hotkey thread is gone"));
    }
}
