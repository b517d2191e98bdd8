// ABOUTME: GNOME Shell backend: a shell extension answers window queries and grabs shortcuts over D-Bus
// ABOUTME: Pointer motion and key presses go through the remote desktop portal

use crate::accelerator::Accelerator;
use crate::error::BackendError;
use crate::keys::{KeyEvent, KeyPlatform, dispatch_key_sequence};
use crate::platform::unix::portal::remote_desktop::RemoteDesktop;
use crate::platform::{Backend, BackendInfo, Shortcut, ShortcutTable, WmInfo};
use anyhow::{Context, Result};
use async_trait::async_trait;
use futures_util::StreamExt;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use zbus::Connection;

#[zbus::proxy(
    interface = "org.gnome.Shell.Extensions.PieBackend",
    default_service = "org.gnome.Shell",
    default_path = "/org/gnome/shell/extensions/PieBackend"
)]
trait PieBackendExtension {
    #[zbus(name = "GetWMInfo")]
    fn get_wm_info(&self) -> zbus::Result<(String, String, i32, i32)>;

    fn bind_shortcut(&self, accelerator: &str) -> zbus::Result<bool>;

    fn unbind_shortcut(&self, accelerator: &str) -> zbus::Result<bool>;

    fn unbind_all_shortcuts(&self) -> zbus::Result<()>;

    #[zbus(signal)]
    fn shortcut_pressed(&self, accelerator: String) -> zbus::Result<()>;
}

pub type PressedHandler = Arc<dyn Fn(String) + Send + Sync>;

/// What the backend needs from the shell extension.
#[async_trait]
pub trait ShellExtension: Send + Sync {
    async fn wm_info(&self) -> Result<(String, String, i32, i32)>;
    /// False if the accelerator is already taken.
    async fn bind_shortcut(&self, accelerator: &str) -> Result<bool>;
    async fn unbind_shortcut(&self, accelerator: &str) -> Result<bool>;
    async fn unbind_all_shortcuts(&self) -> Result<()>;
    /// Calls `handler` with the GDK accelerator of every pressed shortcut.
    async fn subscribe(&self, handler: PressedHandler) -> Result<()>;
}

pub struct ZbusShellExtension {
    proxy: PieBackendExtensionProxy<'static>,
}

impl ZbusShellExtension {
    pub async fn connect(connection: &Connection) -> Result<Self> {
        let proxy = PieBackendExtensionProxy::new(connection).await?;
        Ok(Self { proxy })
    }
}

#[async_trait]
impl ShellExtension for ZbusShellExtension {
    async fn wm_info(&self) -> Result<(String, String, i32, i32)> {
        Ok(self.proxy.get_wm_info().await?)
    }

    async fn bind_shortcut(&self, accelerator: &str) -> Result<bool> {
        Ok(self.proxy.bind_shortcut(accelerator).await?)
    }

    async fn unbind_shortcut(&self, accelerator: &str) -> Result<bool> {
        Ok(self.proxy.unbind_shortcut(accelerator).await?)
    }

    async fn unbind_all_shortcuts(&self) -> Result<()> {
        Ok(self.proxy.unbind_all_shortcuts().await?)
    }

    async fn subscribe(&self, handler: PressedHandler) -> Result<()> {
        let mut pressed = self.proxy.receive_shortcut_pressed().await?;
        tokio::spawn(async move {
            while let Some(signal) = pressed.next().await {
                match signal.args() {
                    Ok(args) => handler(args.accelerator().to_string()),
                    Err(e) => tracing::warn!("Malformed ShortcutPressed signal: {}", e),
                }
            }
            tracing::debug!("ShortcutPressed stream ended");
        });
        Ok(())
    }
}

type AcceleratorMap = Arc<Mutex<HashMap<String, String>>>;

fn lock(map: &AcceleratorMap) -> MutexGuard<'_, HashMap<String, String>> {
    map.lock().unwrap_or_else(|p| p.into_inner())
}

pub struct GnomeBackend {
    extension: Arc<dyn ShellExtension>,
    input: RemoteDesktop,
    table: ShortcutTable,
    // id -> GDK accelerator
    accelerators: AcceleratorMap,
}

impl GnomeBackend {
    pub fn new(extension: Arc<dyn ShellExtension>, input: RemoteDesktop) -> Self {
        Self {
            extension,
            input,
            table: ShortcutTable::new(),
            accelerators: AcceleratorMap::default(),
        }
    }
}

#[async_trait]
impl Backend for GnomeBackend {
    async fn init(&self) -> Result<()> {
        self.extension
            .wm_info()
            .await
            .context("Could not reach the PieBackend GNOME Shell extension. Is it installed and enabled?")?;

        let table = self.table.clone();
        let accelerators = self.accelerators.clone();
        self.extension
            .subscribe(Arc::new(move |pressed| {
                let id = lock(&accelerators)
                    .iter()
                    .find(|(_, gdk)| **gdk == pressed)
                    .map(|(id, _)| id.clone());
                match id {
                    Some(id) => {
                        table.trigger(&id);
                    }
                    None => tracing::debug!("Ignoring press of unknown accelerator {}", pressed),
                }
            }))
            .await?;

        tracing::info!("GNOME Shell backend ready");
        Ok(())
    }

    fn backend_info(&self) -> BackendInfo {
        BackendInfo {
            name: "GNOME Shell".to_string(),
            window_type: "dock".to_string(),
            supports_shortcuts: true,
            shortcut_hint: None,
        }
    }

    async fn wm_info(&self) -> Result<WmInfo> {
        let (window_name, app_name, pointer_x, pointer_y) = self.extension.wm_info().await?;
        Ok(WmInfo {
            window_name,
            app_name,
            pointer_x,
            pointer_y,
            work_area: None,
        })
    }

    async fn move_pointer(&self, dx: i32, dy: i32) -> Result<()> {
        self.input.move_pointer(dx, dy).await
    }

    async fn simulate_keys(&self, keys: &[KeyEvent]) -> Result<()> {
        dispatch_key_sequence(keys, KeyPlatform::Linux, |code, down| {
            self.input.simulate_key(code, down)
        })
        .await
    }

    async fn bind_shortcut(&self, shortcut: Shortcut) -> Result<()> {
        let gdk = Accelerator::parse(&shortcut.trigger)?.to_gdk()?;
        let previous = lock(&self.accelerators).get(&shortcut.id).cloned();

        if previous.as_deref() != Some(gdk.as_str()) {
            if !self.extension.bind_shortcut(&gdk).await? {
                return Err(BackendError::ShortcutInUse {
                    trigger: shortcut.trigger.clone(),
                }
                .into());
            }
            if let Some(previous) = previous {
                if !self.extension.unbind_shortcut(&previous).await? {
                    tracing::warn!("Shell had no binding for {}", previous);
                }
            }
            lock(&self.accelerators).insert(shortcut.id.clone(), gdk);
        }

        self.table.insert(shortcut);
        Ok(())
    }

    async fn unbind_shortcut(&self, id: &str) -> Result<()> {
        self.table.remove(id);
        let gdk = lock(&self.accelerators).remove(id);
        if let Some(gdk) = gdk {
            if !self.extension.unbind_shortcut(&gdk).await? {
                tracing::warn!("Shell had no binding for {}", gdk);
            }
        }
        Ok(())
    }

    async fn unbind_all_shortcuts(&self) -> Result<()> {
        if self.table.clear().is_empty() && lock(&self.accelerators).is_empty() {
            return Ok(());
        }
        lock(&self.accelerators).clear();
        self.extension.unbind_all_shortcuts().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::backend_error;
    use crate::platform::unix::portal::PortalCall;
    use crate::platform::unix::portal::testing::MockPortalBus;
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct MockExtension {
        taken: HashSet<String>,
        bound: Mutex<Vec<String>>,
        unbind_all_calls: AtomicUsize,
        handler: Mutex<Option<PressedHandler>>,
    }

    impl MockExtension {
        fn press(&self, accelerator: &str) {
            let handler = self.handler.lock().unwrap().clone();
            handler.expect("subscribed")(accelerator.to_string());
        }
    }

    #[async_trait]
    impl ShellExtension for MockExtension {
        async fn wm_info(&self) -> Result<(String, String, i32, i32)> {
            Ok(("Files".into(), "org.gnome.Nautilus".into(), 5, 6))
        }

        async fn bind_shortcut(&self, accelerator: &str) -> Result<bool> {
            if self.taken.contains(accelerator) {
                return Ok(false);
            }
            self.bound.lock().unwrap().push(accelerator.to_string());
            Ok(true)
        }

        async fn unbind_shortcut(&self, accelerator: &str) -> Result<bool> {
            let mut bound = self.bound.lock().unwrap();
            let before = bound.len();
            bound.retain(|a| a != accelerator);
            Ok(bound.len() != before)
        }

        async fn unbind_all_shortcuts(&self) -> Result<()> {
            self.unbind_all_calls.fetch_add(1, Ordering::SeqCst);
            self.bound.lock().unwrap().clear();
            Ok(())
        }

        async fn subscribe(&self, handler: PressedHandler) -> Result<()> {
            *self.handler.lock().unwrap() = Some(handler);
            Ok(())
        }
    }

    async fn backend(extension: Arc<MockExtension>) -> (GnomeBackend, Arc<MockPortalBus>) {
        let bus = Arc::new(MockPortalBus::new());
        let backend = GnomeBackend::new(extension, RemoteDesktop::new(bus.clone(), "pie_backend"));
        backend.init().await.unwrap();
        (backend, bus)
    }

    #[tokio::test]
    async fn test_backend_info() {
        let (backend, _) = backend(Arc::new(MockExtension::default())).await;
        let info = backend.backend_info();
        assert_eq!(info.window_type, "dock");
        assert!(info.supports_shortcuts);
    }

    #[tokio::test]
    async fn test_pressed_accelerator_runs_action() {
        let extension = Arc::new(MockExtension::default());
        let (backend, _) = backend(extension.clone()).await;
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = hits.clone();

        backend
            .bind_shortcut(Shortcut::new("main", "Ctrl+Shift+K", "Main menu", move || {
                counter.fetch_add(1, Ordering::SeqCst);
            }))
            .await
            .unwrap();

        extension.press("<Ctrl><Shift>k");
        extension.press("<Alt>x");
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_taken_accelerator_is_in_use() {
        let extension = Arc::new(MockExtension {
            taken: HashSet::from(["<Ctrl>space".to_string()]),
            ..MockExtension::default()
        });
        let (backend, _) = backend(extension).await;

        let error = backend
            .bind_shortcut(Shortcut::new("main", "Ctrl+Space", "", || {}))
            .await
            .unwrap_err();
        assert!(matches!(
            backend_error(&error),
            Some(BackendError::ShortcutInUse { .. })
        ));
        assert!(!backend.table.contains("main"));
    }

    #[tokio::test]
    async fn test_rebinding_replaces_the_trigger() {
        let extension = Arc::new(MockExtension::default());
        let (backend, _) = backend(extension.clone()).await;

        backend.bind_shortcut(Shortcut::new("main", "Ctrl+K", "", || {})).await.unwrap();
        backend.bind_shortcut(Shortcut::new("main", "Alt+K", "", || {})).await.unwrap();

        assert_eq!(*extension.bound.lock().unwrap(), vec!["<Alt>k".to_string()]);
        assert_eq!(backend.table.len(), 1);
    }

    #[tokio::test]
    async fn test_unbind_all_on_empty_table_is_noop() {
        let extension = Arc::new(MockExtension::default());
        let (backend, _) = backend(extension.clone()).await;

        backend.unbind_all_shortcuts().await.unwrap();
        assert_eq!(extension.unbind_all_calls.load(Ordering::SeqCst), 0);

        backend.bind_shortcut(Shortcut::new("main", "Ctrl+K", "", || {})).await.unwrap();
        backend.unbind_all_shortcuts().await.unwrap();
        assert_eq!(extension.unbind_all_calls.load(Ordering::SeqCst), 1);
        assert!(backend.table.is_empty());
    }

    #[tokio::test]
    async fn test_unknown_key_sends_nothing() {
        let (backend, bus) = backend(Arc::new(MockExtension::default())).await;
        let keys = [KeyEvent::new("ControlLeft", true, 0), KeyEvent::new("NoSuchKey", true, 0)];

        assert!(backend.simulate_keys(&keys).await.is_err());
        assert_eq!(bus.count(|c| matches!(c, PortalCall::NotifyKeyboardKeycode { .. })), 0);
    }

    #[tokio::test]
    async fn test_wm_info_from_extension() {
        let (backend, _) = backend(Arc::new(MockExtension::default())).await;
        let info = backend.wm_info().await.unwrap();
        assert_eq!(info.app_name, "org.gnome.Nautilus");
        assert_eq!((info.pointer_x, info.pointer_y), (5, 6));
        assert!(info.work_area.is_none());
    }
}
