// ABOUTME: wlroots-style Wayland client: virtual pointer and keyboard, foreign toplevels, pointer sampling
// ABOUTME: The pointer is sampled by briefly mapping a transparent full-screen layer-shell overlay

use crate::error::BackendError;
use crate::keys::{KeyEvent, KeyPlatform, dispatch_key_sequence, key_code};
use crate::platform::{Backend, BackendInfo, Rect, Shortcut, WmInfo};
use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::os::fd::{AsFd, AsRawFd, OwnedFd, RawFd};
use std::sync::LazyLock;
use std::time::Duration;
use tokio::io::unix::AsyncFd;
use tokio::sync::Mutex as TokioMutex;
use tokio::time::Instant;
use wayland_client::backend::{ObjectId, WaylandError};
use wayland_client::globals::{GlobalListContents, registry_queue_init};
use wayland_client::protocol::{
    wl_buffer::WlBuffer, wl_callback, wl_callback::WlCallback, wl_compositor::WlCompositor,
    wl_keyboard, wl_keyboard::WlKeyboard, wl_pointer, wl_pointer::WlPointer, wl_registry, wl_seat,
    wl_seat::WlSeat, wl_shm, wl_shm::WlShm, wl_shm_pool::WlShmPool, wl_surface::WlSurface,
};
use wayland_client::{Connection, Dispatch, EventQueue, Proxy, QueueHandle, WEnum, delegate_noop};
use wayland_protocols_misc::zwp_virtual_keyboard_v1::client::{
    zwp_virtual_keyboard_manager_v1::ZwpVirtualKeyboardManagerV1,
    zwp_virtual_keyboard_v1::ZwpVirtualKeyboardV1,
};
use wayland_protocols_wlr::foreign_toplevel::v1::client::{
    zwlr_foreign_toplevel_handle_v1::{self, ZwlrForeignToplevelHandleV1},
    zwlr_foreign_toplevel_manager_v1::{self, ZwlrForeignToplevelManagerV1},
};
use wayland_protocols_wlr::layer_shell::v1::client::{
    zwlr_layer_shell_v1::{self, ZwlrLayerShellV1},
    zwlr_layer_surface_v1::{self, ZwlrLayerSurfaceV1},
};
use wayland_protocols_wlr::virtual_pointer::v1::client::{
    zwlr_virtual_pointer_manager_v1::ZwlrVirtualPointerManagerV1,
    zwlr_virtual_pointer_v1::ZwlrVirtualPointerV1,
};

const ROUNDTRIP_TIMEOUT: Duration = Duration::from_secs(1);

/// Pointer position and output size seen by the sampling overlay.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PointerSample {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
    /// True when no pointer event arrived in time and the other fields are defaults.
    pub degraded: bool,
}

impl PointerSample {
    fn degraded() -> Self {
        Self {
            x: 0,
            y: 0,
            width: 0,
            height: 0,
            degraded: true,
        }
    }
}

#[derive(Default)]
struct Toplevel {
    app_id: String,
    title: String,
}

#[derive(Default)]
struct Sampling {
    size: Option<(u32, u32)>,
    pointer: Option<(f64, f64)>,
}

impl Sampling {
    fn finish(&self) -> PointerSample {
        match self.pointer {
            Some((x, y)) => {
                let (width, height) = self.size.unwrap_or_default();
                PointerSample {
                    x: x.round() as i32,
                    y: y.round() as i32,
                    width: width as i32,
                    height: height as i32,
                    degraded: false,
                }
            }
            None => PointerSample::degraded(),
        }
    }
}

struct Overlay {
    surface: WlSurface,
    layer: ZwlrLayerSurfaceV1,
}

struct Keymap {
    format: u32,
    fd: OwnedFd,
    size: u32,
}

#[derive(Default)]
struct WlrState {
    shm: Option<WlShm>,
    keyboard: Option<WlKeyboard>,
    pointer: Option<WlPointer>,
    keymap: Option<Keymap>,
    toplevels: HashMap<ObjectId, Toplevel>,
    active: Option<ObjectId>,
    overlay: Option<Overlay>,
    buffer: Option<WlBuffer>,
    sampling: Option<Sampling>,
    synced: bool,
}

impl WlrState {
    fn active_window(&self) -> (String, String) {
        self.active
            .as_ref()
            .and_then(|id| self.toplevels.get(id))
            .map(|t| (t.title.clone(), t.app_id.clone()))
            .unwrap_or_default()
    }

    fn attach_transparent_buffer(&mut self, width: u32, height: u32, qh: &QueueHandle<Self>) -> Result<()> {
        let (Some(shm), Some(overlay)) = (&self.shm, &self.overlay) else {
            return Err(anyhow!("overlay is gone"));
        };
        let (width, height) = (width.max(1) as i32, height.max(1) as i32);
        let stride = width * 4;
        let size = stride * height;

        // A fresh memfd is zero-filled, which is fully transparent ARGB.
        let memfd = memfd::MemfdOptions::default()
            .create("pie-backend-overlay")
            .context("Failed to create shm buffer")?;
        memfd.as_file().set_len(size as u64)?;

        let pool = shm.create_pool(memfd.as_file().as_fd(), size, qh, ());
        let buffer = pool.create_buffer(0, width, height, stride, wl_shm::Format::Argb8888, qh, ());
        pool.destroy();

        overlay.surface.attach(Some(&buffer), 0, 0);
        overlay.surface.damage(0, 0, width, height);
        overlay.surface.commit();
        if let Some(old) = self.buffer.replace(buffer) {
            old.destroy();
        }
        Ok(())
    }
}

impl Dispatch<wl_registry::WlRegistry, GlobalListContents> for WlrState {
    fn event(
        _: &mut Self,
        _: &wl_registry::WlRegistry,
        _: wl_registry::Event,
        _: &GlobalListContents,
        _: &Connection,
        _: &QueueHandle<Self>,
    ) {
    }
}

impl Dispatch<WlSeat, ()> for WlrState {
    fn event(
        state: &mut Self,
        seat: &WlSeat,
        event: wl_seat::Event,
        _: &(),
        _: &Connection,
        qh: &QueueHandle<Self>,
    ) {
        if let wl_seat::Event::Capabilities {
            capabilities: WEnum::Value(capabilities),
        } = event
        {
            if capabilities.contains(wl_seat::Capability::Keyboard) && state.keyboard.is_none() {
                state.keyboard = Some(seat.get_keyboard(qh, ()));
            }
            if capabilities.contains(wl_seat::Capability::Pointer) && state.pointer.is_none() {
                state.pointer = Some(seat.get_pointer(qh, ()));
            }
        }
    }
}

impl Dispatch<WlKeyboard, ()> for WlrState {
    fn event(
        state: &mut Self,
        _: &WlKeyboard,
        event: wl_keyboard::Event,
        _: &(),
        _: &Connection,
        _: &QueueHandle<Self>,
    ) {
        if let wl_keyboard::Event::Keymap { format, fd, size } = event {
            state.keymap = Some(Keymap {
                format: format.into(),
                fd,
                size,
            });
        }
    }
}

impl Dispatch<WlPointer, ()> for WlrState {
    fn event(
        state: &mut Self,
        _: &WlPointer,
        event: wl_pointer::Event,
        _: &(),
        _: &Connection,
        _: &QueueHandle<Self>,
    ) {
        let Some(sampling) = state.sampling.as_mut() else {
            return;
        };
        match event {
            wl_pointer::Event::Enter {
                surface_x, surface_y, ..
            }
            | wl_pointer::Event::Motion {
                surface_x, surface_y, ..
            } => {
                sampling.pointer = Some((surface_x, surface_y));
            }
            _ => {}
        }
    }
}

impl Dispatch<ZwlrLayerSurfaceV1, ()> for WlrState {
    fn event(
        state: &mut Self,
        layer: &ZwlrLayerSurfaceV1,
        event: zwlr_layer_surface_v1::Event,
        _: &(),
        _: &Connection,
        qh: &QueueHandle<Self>,
    ) {
        match event {
            zwlr_layer_surface_v1::Event::Configure {
                serial,
                width,
                height,
            } => {
                layer.ack_configure(serial);
                if let Some(sampling) = state.sampling.as_mut() {
                    sampling.size = Some((width, height));
                }
                if let Err(e) = state.attach_transparent_buffer(width, height, qh) {
                    tracing::warn!("Failed to attach overlay buffer: {:#}", e);
                }
            }
            zwlr_layer_surface_v1::Event::Closed => {
                tracing::debug!("Compositor closed the sampling overlay");
            }
            _ => {}
        }
    }
}

impl Dispatch<WlCallback, ()> for WlrState {
    fn event(
        state: &mut Self,
        _: &WlCallback,
        event: wl_callback::Event,
        _: &(),
        _: &Connection,
        _: &QueueHandle<Self>,
    ) {
        if let wl_callback::Event::Done { .. } = event {
            state.synced = true;
        }
    }
}

impl Dispatch<ZwlrForeignToplevelManagerV1, ()> for WlrState {
    fn event(
        state: &mut Self,
        _: &ZwlrForeignToplevelManagerV1,
        event: zwlr_foreign_toplevel_manager_v1::Event,
        _: &(),
        _: &Connection,
        _: &QueueHandle<Self>,
    ) {
        if let zwlr_foreign_toplevel_manager_v1::Event::Toplevel { toplevel } = event {
            state.toplevels.insert(toplevel.id(), Toplevel::default());
        }
    }

    wayland_client::event_created_child!(WlrState, ZwlrForeignToplevelManagerV1, [
        zwlr_foreign_toplevel_manager_v1::EVT_TOPLEVEL_OPCODE => (ZwlrForeignToplevelHandleV1, ())
    ]);
}

impl Dispatch<ZwlrForeignToplevelHandleV1, ()> for WlrState {
    fn event(
        state: &mut Self,
        handle: &ZwlrForeignToplevelHandleV1,
        event: zwlr_foreign_toplevel_handle_v1::Event,
        _: &(),
        _: &Connection,
        _: &QueueHandle<Self>,
    ) {
        match event {
            zwlr_foreign_toplevel_handle_v1::Event::AppId { app_id } => {
                if let Some(t) = state.toplevels.get_mut(&handle.id()) {
                    t.app_id = app_id;
                }
            }
            zwlr_foreign_toplevel_handle_v1::Event::Title { title } => {
                if let Some(t) = state.toplevels.get_mut(&handle.id()) {
                    t.title = title;
                }
            }
            zwlr_foreign_toplevel_handle_v1::Event::State { state: flags } => {
                let activated = zwlr_foreign_toplevel_handle_v1::State::Activated as u8;
                if flags.contains(&activated) {
                    state.active = Some(handle.id());
                } else if state.active.as_ref() == Some(&handle.id()) {
                    state.active = None;
                }
            }
            zwlr_foreign_toplevel_handle_v1::Event::Closed => {
                state.toplevels.remove(&handle.id());
                if state.active.as_ref() == Some(&handle.id()) {
                    state.active = None;
                }
                handle.destroy();
            }
            _ => {}
        }
    }
}

delegate_noop!(WlrState: WlCompositor);
delegate_noop!(WlrState: WlShmPool);
delegate_noop!(WlrState: ZwlrLayerShellV1);
delegate_noop!(WlrState: ZwlrVirtualPointerManagerV1);
delegate_noop!(WlrState: ZwlrVirtualPointerV1);
delegate_noop!(WlrState: ZwpVirtualKeyboardManagerV1);
delegate_noop!(WlrState: ZwpVirtualKeyboardV1);
delegate_noop!(WlrState: ignore WlShm);
delegate_noop!(WlrState: ignore WlBuffer);
delegate_noop!(WlrState: ignore WlSurface);

struct RawFdWatcher(RawFd);

impl AsRawFd for RawFdWatcher {
    fn as_raw_fd(&self) -> RawFd {
        self.0
    }
}

// xkb modifier bits: Shift, Control, Mod1 (Alt), Mod4 (Super), Mod5 (AltGr).
static MODIFIER_BITS: LazyLock<Vec<(u32, u32)>> = LazyLock::new(|| {
    [
        ("ShiftLeft", 1),
        ("ShiftRight", 1),
        ("ControlLeft", 4),
        ("ControlRight", 4),
        ("AltLeft", 8),
        ("AltRight", 128),
        ("MetaLeft", 64),
        ("MetaRight", 64),
    ]
    .iter()
    .filter_map(|(name, bit)| key_code(name, KeyPlatform::Linux).ok().map(|code| (code, *bit)))
    .collect()
});

fn modifier_bit(x11_keycode: u32) -> u32 {
    MODIFIER_BITS
        .iter()
        .find(|(code, _)| *code == x11_keycode)
        .map(|(_, bit)| *bit)
        .unwrap_or(0)
}

/// Modifier keys held by the virtual keyboard. Left and right keys share a bit, so the
/// bit stays set until both are released.
#[derive(Default)]
struct HeldModifiers {
    keys: HashSet<u32>,
}

impl HeldModifiers {
    fn mask(&self) -> u32 {
        self.keys.iter().fold(0, |mask, code| mask | modifier_bit(*code))
    }

    /// Records a key change and returns the new depressed mask if it changed.
    fn update(&mut self, x11_keycode: u32, down: bool) -> Option<u32> {
        if modifier_bit(x11_keycode) == 0 {
            return None;
        }
        let before = self.mask();
        if down {
            self.keys.insert(x11_keycode);
        } else {
            self.keys.remove(&x11_keycode);
        }
        let after = self.mask();
        (after != before).then_some(after)
    }
}

/// Interprets a socket read. Returns true once the socket is drained, which is the only
/// point where edge-triggered readiness may be cleared.
fn socket_drained(read: std::result::Result<usize, WaylandError>) -> Result<bool> {
    match read {
        Ok(_) => Ok(false),
        Err(WaylandError::Io(e)) if e.kind() == std::io::ErrorKind::WouldBlock => Ok(true),
        Err(e) => Err(e.into()),
    }
}

struct Session {
    connection: Connection,
    queue: EventQueue<WlrState>,
    state: WlrState,
    fd: AsyncFd<RawFdWatcher>,
    compositor: WlCompositor,
    layer_shell: Option<ZwlrLayerShellV1>,
    virtual_pointer: Option<ZwlrVirtualPointerV1>,
    virtual_keyboard: Option<ZwpVirtualKeyboardV1>,
    keymap_sent: bool,
    modifiers: HeldModifiers,
    epoch: std::time::Instant,
}

impl Session {
    /// Dispatches events until `done` holds or `deadline` passes. Returns whether `done` held.
    async fn pump_until(&mut self, deadline: Instant, done: impl Fn(&WlrState) -> bool) -> Result<bool> {
        loop {
            self.queue.dispatch_pending(&mut self.state)?;
            if done(&self.state) {
                return Ok(true);
            }

            self.connection.flush()?;
            let Some(guard) = self.queue.prepare_read() else {
                continue;
            };

            let mut readiness = match tokio::time::timeout_at(deadline, self.fd.readable()).await {
                Ok(readiness) => readiness?,
                Err(_) => return Ok(false),
            };

            // Leftover bytes keep the fd ready, so the next pass reads again without waiting.
            if socket_drained(guard.read())? {
                readiness.clear_ready();
            }
        }
    }

    async fn roundtrip(&mut self) -> Result<()> {
        self.state.synced = false;
        self.connection.display().sync(&self.queue.handle(), ());
        let deadline = Instant::now() + ROUNDTRIP_TIMEOUT;
        if !self.pump_until(deadline, |state| state.synced).await? {
            return Err(anyhow!("Wayland compositor did not answer a sync request"));
        }
        Ok(())
    }

    fn timestamp(&self) -> u32 {
        self.epoch.elapsed().as_millis() as u32
    }

    fn move_pointer(&mut self, dx: i32, dy: i32) -> Result<()> {
        let pointer = self
            .virtual_pointer
            .as_ref()
            .ok_or(BackendError::Unsupported("wlr-virtual-pointer"))?;
        pointer.motion(self.timestamp(), f64::from(dx), f64::from(dy));
        pointer.frame();
        self.connection.flush()?;
        Ok(())
    }

    fn send_key(&mut self, keycode: u32, down: bool) -> Result<()> {
        let keyboard = self
            .virtual_keyboard
            .clone()
            .ok_or(BackendError::Unsupported("virtual-keyboard"))?;

        if !self.keymap_sent {
            let keymap = self
                .state
                .keymap
                .as_ref()
                .ok_or_else(|| anyhow!("The seat has no keyboard keymap to forward"))?;
            keyboard.keymap(keymap.format, keymap.fd.as_fd(), keymap.size);
            self.keymap_sent = true;
        }

        let evdev = keycode
            .checked_sub(8)
            .ok_or_else(|| anyhow!("Keycode {} is not an X11 keycode", keycode))?;
        keyboard.key(self.timestamp(), evdev, u32::from(down));

        if let Some(mask) = self.modifiers.update(keycode, down) {
            keyboard.modifiers(mask, 0, 0, 0);
        }
        self.connection.flush()?;
        Ok(())
    }

    async fn sample_pointer(&mut self, timeout: Duration) -> Result<PointerSample> {
        let Some(layer_shell) = self.layer_shell.clone() else {
            tracing::warn!("Compositor lacks wlr-layer-shell, cannot sample the pointer");
            return Ok(PointerSample::degraded());
        };
        if self.state.pointer.is_none() || self.state.shm.is_none() {
            tracing::warn!("No pointer or shm available, cannot sample the pointer");
            return Ok(PointerSample::degraded());
        }

        let qh = self.queue.handle();
        let surface = self.compositor.create_surface(&qh, ());
        let layer = layer_shell.get_layer_surface(
            &surface,
            None,
            zwlr_layer_shell_v1::Layer::Overlay,
            "pie-backend-pointer".to_string(),
            &qh,
            (),
        );
        layer.set_size(0, 0);
        layer.set_anchor(
            zwlr_layer_surface_v1::Anchor::Top
                | zwlr_layer_surface_v1::Anchor::Bottom
                | zwlr_layer_surface_v1::Anchor::Left
                | zwlr_layer_surface_v1::Anchor::Right,
        );
        surface.commit();

        self.state.overlay = Some(Overlay { surface, layer });
        self.state.sampling = Some(Sampling::default());

        let deadline = Instant::now() + timeout;
        let outcome = self
            .pump_until(deadline, |state| {
                state.sampling.as_ref().is_some_and(|s| s.pointer.is_some())
            })
            .await;

        let sample = self
            .state
            .sampling
            .take()
            .map(|s| s.finish())
            .unwrap_or_else(PointerSample::degraded);
        self.destroy_overlay();

        match outcome {
            Ok(true) => Ok(sample),
            Ok(false) => {
                tracing::warn!("No pointer event within {:?}, using defaults", timeout);
                Ok(sample)
            }
            Err(e) => Err(e),
        }
    }

    fn destroy_overlay(&mut self) {
        if let Some(buffer) = self.state.buffer.take() {
            buffer.destroy();
        }
        if let Some(overlay) = self.state.overlay.take() {
            overlay.layer.destroy();
            overlay.surface.destroy();
        }
        if let Err(e) = self.connection.flush() {
            tracing::debug!("Failed to flush after removing the overlay: {}", e);
        }
    }
}

/// Connection to a wlroots-style compositor, shared by the Hyprland, Niri and generic backends.
pub struct WlrootsClient {
    session: TokioMutex<Session>,
    sample_timeout: Duration,
}

impl WlrootsClient {
    pub async fn connect(sample_timeout: Duration) -> Result<Self> {
        let connection = Connection::connect_to_env().context("Failed to connect to Wayland display")?;
        let (globals, queue) = registry_queue_init::<WlrState>(&connection)?;
        let qh = queue.handle();

        let seat: WlSeat = globals.bind(&qh, 1..=7, ()).context("Compositor has no wl_seat")?;
        let compositor: WlCompositor = globals
            .bind(&qh, 1..=4, ())
            .context("Compositor has no wl_compositor")?;
        let shm: Option<WlShm> = globals.bind(&qh, 1..=1, ()).ok();
        let layer_shell: Option<ZwlrLayerShellV1> = globals.bind(&qh, 1..=4, ()).ok();

        let virtual_pointer = globals
            .bind::<ZwlrVirtualPointerManagerV1, _, _>(&qh, 1..=2, ())
            .ok()
            .map(|manager| manager.create_virtual_pointer(Some(&seat), &qh, ()));
        let virtual_keyboard = globals
            .bind::<ZwpVirtualKeyboardManagerV1, _, _>(&qh, 1..=1, ())
            .ok()
            .map(|manager| manager.create_virtual_keyboard(&seat, &qh, ()));
        if globals
            .bind::<ZwlrForeignToplevelManagerV1, _, _>(&qh, 1..=3, ())
            .is_err()
        {
            tracing::warn!("Compositor lacks wlr-foreign-toplevel-management, window info will be empty");
        }
        if virtual_pointer.is_none() {
            tracing::warn!("Compositor lacks wlr-virtual-pointer, pointer warping is unavailable");
        }
        if virtual_keyboard.is_none() {
            tracing::warn!("Compositor lacks virtual-keyboard, key simulation is unavailable");
        }

        let fd = AsyncFd::new(RawFdWatcher(connection.as_fd().as_raw_fd()))?;
        let mut session = Session {
            connection,
            queue,
            state: WlrState {
                shm,
                ..WlrState::default()
            },
            fd,
            compositor,
            layer_shell,
            virtual_pointer,
            virtual_keyboard,
            keymap_sent: false,
            modifiers: HeldModifiers::default(),
            epoch: std::time::Instant::now(),
        };

        // One round for seat capabilities, one for the keymap and the toplevel list.
        session.roundtrip().await?;
        session.roundtrip().await?;

        Ok(Self {
            session: TokioMutex::new(session),
            sample_timeout,
        })
    }

    /// Title and app id of the activated toplevel.
    pub async fn active_window(&self) -> Result<(String, String)> {
        let mut session = self.session.lock().await;
        session.roundtrip().await?;
        Ok(session.state.active_window())
    }

    pub async fn move_pointer(&self, dx: i32, dy: i32) -> Result<()> {
        self.session.lock().await.move_pointer(dx, dy)
    }

    pub async fn simulate_keys(&self, keys: &[KeyEvent]) -> Result<()> {
        dispatch_key_sequence(keys, KeyPlatform::Linux, |code, down| async move {
            self.session.lock().await.send_key(code, down)
        })
        .await
    }

    /// Samples pointer position and output size. Never fails on timeout; see `PointerSample::degraded`.
    pub async fn sample_pointer(&self) -> Result<PointerSample> {
        self.session.lock().await.sample_pointer(self.sample_timeout).await
    }
}

/// Pointer motion and key injection through virtual input devices.
#[async_trait]
pub trait VirtualInput: Send + Sync {
    async fn move_pointer(&self, dx: i32, dy: i32) -> Result<()>;

    async fn simulate_keys(&self, keys: &[KeyEvent]) -> Result<()>;
}

#[async_trait]
impl VirtualInput for WlrootsClient {
    async fn move_pointer(&self, dx: i32, dy: i32) -> Result<()> {
        WlrootsClient::move_pointer(self, dx, dy).await
    }

    async fn simulate_keys(&self, keys: &[KeyEvent]) -> Result<()> {
        WlrootsClient::simulate_keys(self, keys).await
    }
}

/// Fallback for wlroots compositors without a dedicated backend.
pub struct WlrootsBackend {
    client: WlrootsClient,
}

impl WlrootsBackend {
    pub fn new(client: WlrootsClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Backend for WlrootsBackend {
    async fn init(&self) -> Result<()> {
        tracing::info!("Generic wlroots backend ready");
        Ok(())
    }

    fn backend_info(&self) -> BackendInfo {
        BackendInfo {
            name: "wlroots".to_string(),
            window_type: "normal".to_string(),
            supports_shortcuts: false,
            shortcut_hint: Some(
                "Bind a key in your compositor's configuration to run the menu command.".to_string(),
            ),
        }
    }

    async fn wm_info(&self) -> Result<WmInfo> {
        let (window_name, app_name) = self.client.active_window().await?;
        let sample = self.client.sample_pointer().await?;
        Ok(WmInfo {
            window_name,
            app_name,
            pointer_x: sample.x,
            pointer_y: sample.y,
            work_area: (!sample.degraded).then_some(Rect {
                x: 0,
                y: 0,
                width: sample.width,
                height: sample.height,
            }),
        })
    }

    async fn move_pointer(&self, dx: i32, dy: i32) -> Result<()> {
        self.client.move_pointer(dx, dy).await
    }

    async fn simulate_keys(&self, keys: &[KeyEvent]) -> Result<()> {
        self.client.simulate_keys(keys).await
    }

    async fn bind_shortcut(&self, _shortcut: Shortcut) -> Result<()> {
        Err(BackendError::Unsupported("global shortcuts on generic wlroots compositors").into())
    }

    async fn unbind_shortcut(&self, _id: &str) -> Result<()> {
        Err(BackendError::Unsupported("global shortcuts on generic wlroots compositors").into())
    }

    async fn unbind_all_shortcuts(&self) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sample_without_pointer_is_degraded() {
        let sampling = Sampling {
            size: Some((1920, 1080)),
            pointer: None,
        };
        assert_eq!(sampling.finish(), PointerSample::degraded());
    }

    #[test]
    fn test_sample_with_pointer() {
        let sampling = Sampling {
            size: Some((2560, 1410)),
            pointer: Some((100.4, 200.6)),
        };
        assert_eq!(
            sampling.finish(),
            PointerSample {
                x: 100,
                y: 201,
                width: 2560,
                height: 1410,
                degraded: false
            }
        );
    }

    #[test]
    fn test_modifier_mask_tracking() {
        let shift = key_code("ShiftLeft", KeyPlatform::Linux).unwrap();
        let ctrl = key_code("ControlRight", KeyPlatform::Linux).unwrap();
        let a = key_code("KeyA", KeyPlatform::Linux).unwrap();

        let mut held = HeldModifiers::default();
        assert_eq!(held.update(shift, true), Some(1));
        assert_eq!(held.update(ctrl, true), Some(5));
        assert_eq!(held.update(a, true), None);
        assert_eq!(held.update(shift, false), Some(4));
        assert_eq!(held.mask(), 4);
    }

    #[test]
    fn test_shared_modifier_bit_needs_both_keys_released() {
        let left = key_code("ShiftLeft", KeyPlatform::Linux).unwrap();
        let right = key_code("ShiftRight", KeyPlatform::Linux).unwrap();

        let mut held = HeldModifiers::default();
        assert_eq!(held.update(left, true), Some(1));
        assert_eq!(held.update(right, true), None);
        assert_eq!(held.update(left, false), None);
        assert_eq!(held.mask(), 1);
        assert_eq!(held.update(right, false), Some(0));
    }

    #[test]
    fn test_readiness_cleared_only_when_drained() {
        assert!(!socket_drained(Ok(4096)).unwrap());
        assert!(!socket_drained(Ok(0)).unwrap());

        let would_block = std::io::Error::from(std::io::ErrorKind::WouldBlock);
        assert!(socket_drained(Err(WaylandError::Io(would_block))).unwrap());

        let broken = std::io::Error::from(std::io::ErrorKind::BrokenPipe);
        assert!(socket_drained(Err(WaylandError::Io(broken))).is_err());
    }

    #[test]
    fn test_active_window_lookup() {
        let state = WlrState::default();
        assert_eq!(state.active_window(), (String::new(), String::new()));
    }
}
