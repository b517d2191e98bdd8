// ABOUTME: Hyprland backend: hyprctl for window info, wlroots protocols for input
// ABOUTME: Shortcuts go through the global shortcuts portal and are bound to keys in hyprland.conf

use crate::keys::KeyEvent;
use crate::platform::unix::cli::{JsonTool, hyprland_wm_info};
use crate::platform::unix::portal::global_shortcuts::PortalShortcuts;
use crate::platform::unix::wlroots::VirtualInput;
use crate::platform::{Backend, BackendInfo, Shortcut, WmInfo};
use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;

pub struct HyprlandBackend {
    hyprctl: JsonTool,
    input: Arc<dyn VirtualInput>,
    shortcuts: PortalShortcuts,
}

impl HyprlandBackend {
    pub fn new(hyprctl: JsonTool, input: Arc<dyn VirtualInput>, shortcuts: PortalShortcuts) -> Self {
        Self {
            hyprctl,
            input,
            shortcuts,
        }
    }
}

#[async_trait]
impl Backend for HyprlandBackend {
    async fn init(&self) -> Result<()> {
        tracing::info!(
            "Hyprland backend ready. Shortcuts need a `global` bind in hyprland.conf to fire."
        );
        Ok(())
    }

    fn backend_info(&self) -> BackendInfo {
        BackendInfo {
            name: "Hyprland".to_string(),
            window_type: "splash".to_string(),
            supports_shortcuts: false,
            // The portal picks the app id part of the name, so point at where it is listed.
            shortcut_hint: Some(
                "Run `hyprctl globalshortcuts` to see the name of each menu shortcut, then add a line like \
                 `bind = CTRL, Space, global, <name>` to hyprland.conf."
                    .to_string(),
            ),
        }
    }

    async fn wm_info(&self) -> Result<WmInfo> {
        hyprland_wm_info(&self.hyprctl).await
    }

    async fn move_pointer(&self, dx: i32, dy: i32) -> Result<()> {
        self.input.move_pointer(dx, dy).await
    }

    async fn simulate_keys(&self, keys: &[KeyEvent]) -> Result<()> {
        self.input.simulate_keys(keys).await
    }

    async fn bind_shortcut(&self, shortcut: Shortcut) -> Result<()> {
        self.shortcuts.bind(shortcut).await
    }

    async fn unbind_shortcut(&self, id: &str) -> Result<()> {
        self.shortcuts.unbind(id);
        Ok(())
    }

    async fn unbind_all_shortcuts(&self) -> Result<()> {
        self.shortcuts.unbind_all();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::Rect;
    use crate::platform::unix::cli::testing::MockRunner;
    use crate::platform::unix::portal::PortalCall;
    use crate::platform::unix::portal::global_shortcuts::GlobalShortcuts;
    use crate::platform::unix::portal::testing::MockPortalBus;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[derive(Default)]
    struct RecordingInput {
        motions: Mutex<Vec<(i32, i32)>>,
        keys: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl VirtualInput for RecordingInput {
        async fn move_pointer(&self, dx: i32, dy: i32) -> Result<()> {
            self.motions.lock().unwrap().push((dx, dy));
            Ok(())
        }

        async fn simulate_keys(&self, keys: &[KeyEvent]) -> Result<()> {
            self.keys
                .lock()
                .unwrap()
                .extend(keys.iter().map(|key| key.name.clone()));
            Ok(())
        }
    }

    fn hyprctl() -> JsonTool {
        JsonTool::hyprctl(Arc::new(MockRunner::with(&[
            ("activewindow", r#"{"title": "Dolphin", "class": "org.kde.dolphin"}"#),
            ("cursorpos", r#"{"x": 640, "y": 360}"#),
            ("activeworkspace", r#"{"id": 1, "monitorID": 0}"#),
            (
                "monitors",
                r#"[{"id": 0, "x": 0, "y": 0, "width": 1920, "height": 1080, "scale": 1.0, "reserved": [0, 40, 0, 0]}]"#,
            ),
        ])))
    }

    fn backend(bus: Arc<MockPortalBus>, input: Arc<RecordingInput>) -> HyprlandBackend {
        HyprlandBackend::new(
            hyprctl(),
            input,
            PortalShortcuts::new(Arc::new(GlobalShortcuts::new(bus, "pie_backend"))),
        )
    }

    #[tokio::test]
    async fn test_wm_info_comes_from_hyprctl() {
        let backend = backend(Arc::new(MockPortalBus::new()), Arc::default());
        let info = backend.wm_info().await.unwrap();

        assert_eq!(info.window_name, "Dolphin");
        assert_eq!(info.app_name, "org.kde.dolphin");
        assert_eq!((info.pointer_x, info.pointer_y), (640, 360));
        assert_eq!(
            info.work_area,
            Some(Rect {
                x: 0,
                y: 40,
                width: 1920,
                height: 1040
            })
        );
    }

    #[tokio::test]
    async fn test_shortcuts_bind_through_portal() {
        let bus = Arc::new(MockPortalBus::new());
        let backend = backend(bus.clone(), Arc::default());
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = hits.clone();

        backend
            .bind_shortcut(Shortcut::new("menu-1", "Ctrl+Space", "Open menu", move || {
                counter.fetch_add(1, Ordering::SeqCst);
            }))
            .await
            .unwrap();
        assert_eq!(bus.count(|c| matches!(c, PortalCall::BindShortcuts { .. })), 1);

        bus.activate("menu-1");
        tokio::time::timeout(Duration::from_secs(1), async {
            while hits.load(Ordering::SeqCst) == 0 {
                tokio::task::yield_now().await;
            }
        })
        .await
        .unwrap();

        backend.unbind_shortcut("menu-1").await.unwrap();
        bus.activate("menu-1");
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_input_goes_to_virtual_devices() {
        let input = Arc::new(RecordingInput::default());
        let backend = backend(Arc::new(MockPortalBus::new()), input.clone());

        backend.move_pointer(5, -3).await.unwrap();
        backend
            .simulate_keys(&[KeyEvent::new("KeyA", true, 0), KeyEvent::new("KeyA", false, 0)])
            .await
            .unwrap();

        assert_eq!(*input.motions.lock().unwrap(), vec![(5, -3)]);
        assert_eq!(input.keys.lock().unwrap().len(), 2);
    }

    #[test]
    fn test_hint_points_at_globalshortcuts() {
        let info = backend(Arc::new(MockPortalBus::new()), Arc::default()).backend_info();
        assert!(!info.supports_shortcuts);
        assert!(info.shortcut_hint.unwrap().contains("hyprctl globalshortcuts"));
    }
}
