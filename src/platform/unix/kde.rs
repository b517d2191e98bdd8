// ABOUTME: KDE Plasma on Wayland: KWin scripts report the active window and register shortcuts
// ABOUTME: Input goes through the remote desktop portal; shortcuts prefer the global shortcuts portal

use crate::keys::{KeyEvent, KeyPlatform, dispatch_key_sequence};
use crate::platform::unix::kwin::ScriptingClient;
use crate::platform::unix::portal::global_shortcuts::PortalShortcuts;
use crate::platform::unix::portal::remote_desktop::RemoteDesktop;
use crate::platform::{Backend, BackendInfo, Shortcut, ShortcutTable, WmInfo};
use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::OnceCell;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ShortcutRoute {
    Portal,
    Script,
}

pub struct KdeWaylandBackend {
    input: RemoteDesktop,
    scripting: Arc<ScriptingClient>,
    portal: PortalShortcuts,
    // Shortcuts registered through KWin scripts.
    scripted: ShortcutTable,
    route: OnceCell<ShortcutRoute>,
}

impl KdeWaylandBackend {
    pub fn new(input: RemoteDesktop, scripting: Arc<ScriptingClient>, portal: PortalShortcuts) -> Self {
        let scripted = ShortcutTable::new();
        let dispatch = scripted.clone();
        scripting.callbacks().set_trigger_handler(Arc::new(move |id| {
            if !dispatch.trigger(&id) {
                tracing::debug!("KWin triggered unknown shortcut '{}'", id);
            }
        }));

        Self {
            input,
            scripting,
            portal,
            scripted,
            route: OnceCell::new(),
        }
    }

    async fn route(&self) -> ShortcutRoute {
        *self
            .route
            .get_or_init(|| async {
                if self.portal.portal().version().await >= 1 {
                    ShortcutRoute::Portal
                } else {
                    tracing::info!("Global shortcuts portal missing, registering shortcuts with KWin scripts");
                    ShortcutRoute::Script
                }
            })
            .await
    }
}

#[async_trait]
impl Backend for KdeWaylandBackend {
    async fn init(&self) -> Result<()> {
        let route = self.route().await;
        tracing::info!("KDE Wayland backend ready, shortcuts via {:?}", route);
        Ok(())
    }

    fn backend_info(&self) -> BackendInfo {
        BackendInfo {
            name: "KDE Wayland".to_string(),
            window_type: "toolbar".to_string(),
            supports_shortcuts: false,
            shortcut_hint: Some(
                "Assign the key combination in System Settings under Keyboard > Shortcuts.".to_string(),
            ),
        }
    }

    async fn wm_info(&self) -> Result<WmInfo> {
        let info = self.scripting.query_wm_info().await?;
        Ok(WmInfo {
            window_name: info.window_name,
            app_name: info.app_name,
            pointer_x: info.pointer_x,
            pointer_y: info.pointer_y,
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
        match self.route().await {
            ShortcutRoute::Portal => self.portal.bind(shortcut).await,
            ShortcutRoute::Script => {
                let id = shortcut.id.clone();
                let description = shortcut.description.clone();
                let previous = self.scripted.insert(shortcut);
                if let Err(e) = self.scripting.bind_shortcut(&id, &description).await {
                    match previous {
                        Some(previous) => {
                            self.scripted.insert(previous);
                        }
                        None => {
                            self.scripted.remove(&id);
                        }
                    }
                    return Err(e);
                }
                Ok(())
            }
        }
    }

    async fn unbind_shortcut(&self, id: &str) -> Result<()> {
        match self.route().await {
            ShortcutRoute::Portal => {
                self.portal.unbind(id);
                Ok(())
            }
            ShortcutRoute::Script => {
                if self.scripted.remove(id).is_none() {
                    return Ok(());
                }
                self.scripting.unbind_shortcut(id).await
            }
        }
    }

    async fn unbind_all_shortcuts(&self) -> Result<()> {
        match self.route().await {
            ShortcutRoute::Portal => {
                self.portal.unbind_all();
                Ok(())
            }
            ShortcutRoute::Script => {
                if self.scripted.clear().is_empty() {
                    return Ok(());
                }
                self.scripting.unbind_all_shortcuts().await
            }
        }
    }
}
