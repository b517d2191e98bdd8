// ABOUTME: Niri backend: `niri msg` for the focused window and output, overlay sampling for the pointer
// ABOUTME: Input uses wlroots protocols and shortcuts go through the global shortcuts portal

use crate::keys::KeyEvent;
use crate::platform::unix::cli::{JsonTool, niri_focused_window, niri_output_origin};
use crate::platform::unix::portal::global_shortcuts::PortalShortcuts;
use crate::platform::unix::wlroots::{PointerSample, WlrootsClient};
use crate::platform::{Backend, BackendInfo, Rect, Shortcut, WmInfo};
use anyhow::Result;
use async_trait::async_trait;

pub struct NiriBackend {
    niri: JsonTool,
    input: WlrootsClient,
    shortcuts: PortalShortcuts,
}

impl NiriBackend {
    pub fn new(niri: JsonTool, input: WlrootsClient, shortcuts: PortalShortcuts) -> Self {
        Self {
            niri,
            input,
            shortcuts,
        }
    }
}

/// The overlay reports output-local coordinates; shift them by the output's logical origin.
fn place_sample(origin: (i32, i32), sample: PointerSample) -> (i32, i32, Option<Rect>) {
    let (x, y) = origin;
    let work_area = (!sample.degraded).then_some(Rect {
        x,
        y,
        width: sample.width,
        height: sample.height,
    });
    (x + sample.x, y + sample.y, work_area)
}

#[async_trait]
impl Backend for NiriBackend {
    async fn init(&self) -> Result<()> {
        tracing::info!("Niri backend ready");
        Ok(())
    }

    fn backend_info(&self) -> BackendInfo {
        BackendInfo {
            name: "Niri".to_string(),
            window_type: "splash".to_string(),
            supports_shortcuts: false,
            shortcut_hint: Some(
                "Assign keys to the menu shortcuts in the dialog niri shows after binding, or add a bind to config.kdl."
                    .to_string(),
            ),
        }
    }

    async fn wm_info(&self) -> Result<WmInfo> {
        let (window, origin) =
            tokio::try_join!(niri_focused_window(&self.niri), niri_output_origin(&self.niri))?;
        let sample = self.input.sample_pointer().await?;
        let (pointer_x, pointer_y, work_area) = place_sample(origin, sample);

        Ok(WmInfo {
            window_name: window.title.unwrap_or_default(),
            app_name: window.app_id.unwrap_or_default(),
            pointer_x,
            pointer_y,
            work_area,
        })
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

    #[test]
    fn test_sample_is_offset_by_output_origin() {
        let sample = PointerSample {
            x: 10,
            y: 20,
            width: 1920,
            height: 1080,
            degraded: false,
        };
        let (x, y, area) = place_sample((2560, 0), sample);
        assert_eq!((x, y), (2570, 20));
        assert_eq!(area.map(|a| (a.x, a.width)), Some((2560, 1920)));
    }

    #[test]
    fn test_degraded_sample_has_no_work_area() {
        let sample = PointerSample {
            x: 0,
            y: 0,
            width: 0,
            height: 0,
            degraded: true,
        };
        let (x, y, area) = place_sample((100, 50), sample);
        assert_eq!((x, y), (100, 50));
        assert!(area.is_none());
    }
}
