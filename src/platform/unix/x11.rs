// ABOUTME: X11 backend: EWMH window queries, XTEST input injection and XGrabKey global shortcuts
// ABOUTME: Used directly on X11 sessions and, with a different menu window type, for KDE and Cinnamon

use crate::accelerator::{Accelerator, Modifiers};
use crate::error::BackendError;
use crate::keys::{KeyEvent, KeyPlatform, dispatch_key_sequence, key_code};
use crate::platform::{Backend, BackendInfo, Rect, Shortcut, ShortcutTable, WmInfo};
use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use x11rb::connection::{Connection, RequestConnection};
use x11rb::errors::ReplyError;
use x11rb::protocol::ErrorKind;
use x11rb::protocol::Event;
use x11rb::protocol::xproto::{
    AtomEnum, ConnectionExt as _, GrabMode, KEY_PRESS_EVENT, KEY_RELEASE_EVENT, ModMask, Window,
};
use x11rb::protocol::xtest::ConnectionExt as _;
use x11rb::rust_connection::RustConnection;

x11rb::atom_manager! {
    pub Atoms: AtomsCookie {
        _NET_ACTIVE_WINDOW,
        _NET_CURRENT_DESKTOP,
        _NET_WM_NAME,
        _NET_WORKAREA,
        UTF8_STRING,
    }
}

/// Which desktop the X11 backend is serving. Only the menu window type differs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum X11Flavor {
    Generic,
    Kde,
    Cinnamon,
}

impl X11Flavor {
    fn name(self) -> &'static str {
        match self {
            X11Flavor::Generic => "X11",
            X11Flavor::Kde => "KDE X11",
            X11Flavor::Cinnamon => "Cinnamon X11",
        }
    }

    fn window_type(self) -> &'static str {
        match self {
            X11Flavor::Generic => "dock",
            X11Flavor::Kde => "toolbar",
            X11Flavor::Cinnamon => "utility",
        }
    }
}

struct X11Session {
    conn: RustConnection,
    root: Window,
    atoms: Atoms,
}

impl X11Session {
    fn connect() -> Result<Self> {
        let (conn, screen_num) = x11rb::connect(None)
            .map_err(|e| anyhow!("Failed to connect to X11 display: {}. Ensure DISPLAY is set.", e))?;
        let root = conn
            .setup()
            .roots
            .get(screen_num)
            .map(|screen| screen.root)
            .ok_or_else(|| anyhow!("X11 screen {} does not exist", screen_num))?;
        let atoms = Atoms::new(&conn)?.reply()?;
        Ok(Self { conn, root, atoms })
    }

    fn cardinals(&self, window: Window, property: u32, kind: impl Into<u32>) -> Result<Vec<u32>> {
        let reply = self
            .conn
            .get_property(false, window, property, kind, 0, 1024)?
            .reply()?;
        Ok(reply.value32().map(|values| values.collect()).unwrap_or_default())
    }

    fn active_window(&self) -> Result<Option<Window>> {
        let ids = self.cardinals(self.root, self.atoms._NET_ACTIVE_WINDOW, AtomEnum::WINDOW)?;
        Ok(ids.first().copied().filter(|id| *id != x11rb::NONE))
    }

    fn text_property(&self, window: Window, property: u32, kind: impl Into<u32>) -> Result<Option<Vec<u8>>> {
        let reply = self
            .conn
            .get_property(false, window, property, kind, 0, u32::MAX)?
            .reply()?;
        if reply.type_ == x11rb::NONE {
            return Ok(None);
        }
        Ok(Some(reply.value))
    }

    fn window_title(&self, window: Window) -> Result<String> {
        if let Some(title) =
            self.text_property(window, self.atoms._NET_WM_NAME, self.atoms.UTF8_STRING)?
        {
            return Ok(String::from_utf8_lossy(&title).into_owned());
        }
        // WM_NAME is Latin-1.
        let title = self
            .text_property(window, AtomEnum::WM_NAME.into(), AtomEnum::STRING)?
            .unwrap_or_default();
        Ok(title.iter().map(|b| char::from(*b)).collect())
    }

    fn window_class(&self, window: Window) -> Result<String> {
        let value = self
            .text_property(window, AtomEnum::WM_CLASS.into(), AtomEnum::STRING)?
            .unwrap_or_default();
        Ok(class_from_wm_class(&value))
    }

    fn work_area(&self) -> Result<Option<Rect>> {
        let desktop = self
            .cardinals(self.root, self.atoms._NET_CURRENT_DESKTOP, AtomEnum::CARDINAL)?
            .first()
            .copied()
            .unwrap_or(0) as usize;
        let areas = self.cardinals(self.root, self.atoms._NET_WORKAREA, AtomEnum::CARDINAL)?;
        Ok(work_area_for_desktop(&areas, desktop))
    }

    fn wm_info(&self) -> Result<WmInfo> {
        let pointer = self.conn.query_pointer(self.root)?.reply()?;

        let (window_name, app_name) = match self.active_window()? {
            Some(window) => (self.window_title(window)?, self.window_class(window)?),
            None => (String::new(), String::new()),
        };

        Ok(WmInfo {
            window_name,
            app_name,
            pointer_x: i32::from(pointer.root_x),
            pointer_y: i32::from(pointer.root_y),
            work_area: self.work_area()?,
        })
    }

    fn warp_pointer(&self, dx: i32, dy: i32) -> Result<()> {
        let dx = dx.clamp(i16::MIN.into(), i16::MAX.into()) as i16;
        let dy = dy.clamp(i16::MIN.into(), i16::MAX.into()) as i16;
        self.conn
            .warp_pointer(x11rb::NONE, x11rb::NONE, 0, 0, 0, 0, dx, dy)?
            .check()?;
        self.conn.flush()?;
        Ok(())
    }

    fn fake_key(&self, keycode: u32, down: bool) -> Result<()> {
        let keycode = u8::try_from(keycode).context("X11 keycodes fit in a byte")?;
        let kind = if down { KEY_PRESS_EVENT } else { KEY_RELEASE_EVENT };
        self.conn
            .xtest_fake_input(kind, keycode, x11rb::CURRENT_TIME, self.root, 0, 0, 0)?
            .check()?;
        self.conn.flush()?;
        Ok(())
    }
}

// WM_CLASS is "instance\0class\0"; the class part names the application.
fn class_from_wm_class(value: &[u8]) -> String {
    let mut parts = value.split(|b| *b == 0).filter(|p| !p.is_empty());
    let instance = parts.next();
    let class = parts.next().or(instance).unwrap_or_default();
    String::from_utf8_lossy(class).into_owned()
}

// _NET_WORKAREA holds x, y, width, height for every desktop.
fn work_area_for_desktop(areas: &[u32], desktop: usize) -> Option<Rect> {
    let area = areas.chunks_exact(4).nth(desktop).or_else(|| areas.chunks_exact(4).next())?;
    Some(Rect {
        x: area[0] as i32,
        y: area[1] as i32,
        width: area[2] as i32,
        height: area[3] as i32,
    })
}

// Shift | Control | Mod1 | Mod4 | Mod5. NumLock (Mod2) and CapsLock are ignored.
const RELEVANT_MODIFIERS: u16 = 1 | 4 | 8 | 64 | 128;

fn grab_mask(modifiers: &Modifiers) -> ModMask {
    let mut mask = ModMask::from(0u16);
    if modifiers.shift {
        mask = mask | ModMask::SHIFT;
    }
    if modifiers.control {
        mask = mask | ModMask::CONTROL;
    }
    if modifiers.alt || modifiers.option {
        mask = mask | ModMask::M1;
    }
    if modifiers.meta {
        mask = mask | ModMask::M4;
    }
    if modifiers.alt_gr {
        mask = mask | ModMask::M5;
    }
    mask
}

/// The mask plus its NumLock and CapsLock variants, which all need their own grab.
fn lock_variants(mask: ModMask) -> [ModMask; 4] {
    [
        mask,
        mask | ModMask::M2,
        mask | ModMask::LOCK,
        mask | ModMask::M2 | ModMask::LOCK,
    ]
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Grab {
    keycode: u8,
    modifiers: u16,
}

impl Grab {
    fn matches(&self, keycode: u8, state: u16) -> bool {
        self.keycode == keycode && state & RELEVANT_MODIFIERS == self.modifiers
    }
}

/// Issues grab requests for one key combination on the root window.
trait KeyGrab: Send + Sync {
    /// Grabs every lock variant. Fails with `ShortcutInUse` if another client holds one.
    fn grab_key(&self, keycode: u8, mask: ModMask, trigger: &str) -> Result<()>;

    fn ungrab_key(&self, keycode: u8, mask: ModMask) -> Result<()>;
}

struct RootGrab {
    conn: Arc<RustConnection>,
    root: Window,
}

impl KeyGrab for RootGrab {
    fn grab_key(&self, keycode: u8, mask: ModMask, trigger: &str) -> Result<()> {
        let variants = lock_variants(mask);
        for (done, variant) in variants.iter().enumerate() {
            let result = self
                .conn
                .grab_key(false, self.root, *variant, keycode, GrabMode::ASYNC, GrabMode::ASYNC)?
                .check();
            if let Err(e) = result {
                for grabbed in &variants[..done] {
                    let _ = self.conn.ungrab_key(keycode, self.root, *grabbed);
                }
                let _ = self.conn.flush();
                return Err(match e {
                    ReplyError::X11Error(ref error) if error.error_kind == ErrorKind::Access => {
                        BackendError::ShortcutInUse {
                            trigger: trigger.to_string(),
                        }
                        .into()
                    }
                    other => anyhow!(other).context(format!("Failed to grab '{}'", trigger)),
                });
            }
        }
        self.conn.flush()?;
        Ok(())
    }

    fn ungrab_key(&self, keycode: u8, mask: ModMask) -> Result<()> {
        for variant in lock_variants(mask) {
            self.conn.ungrab_key(keycode, self.root, variant)?;
        }
        self.conn.flush()?;
        Ok(())
    }
}

/// Grabbed shortcuts by id, kept in step with the shortcut table.
struct ShortcutGrabs<G> {
    keys: G,
    grabs: Arc<Mutex<HashMap<String, Grab>>>,
    table: ShortcutTable,
}

impl<G: KeyGrab> ShortcutGrabs<G> {
    fn new(keys: G, table: ShortcutTable) -> Self {
        Self {
            keys,
            grabs: Arc::default(),
            table,
        }
    }

    fn bind(&self, shortcut: Shortcut) -> Result<()> {
        let accelerator = Accelerator::parse(&shortcut.trigger)?;
        let keycode = u8::try_from(key_code(accelerator.key, KeyPlatform::Linux)?)
            .context("X11 keycodes fit in a byte")?;
        let mask = grab_mask(&accelerator.modifiers);
        let grab = Grab {
            keycode,
            modifiers: u16::from(mask),
        };

        let previous = lock_grabs(&self.grabs).get(&shortcut.id).copied();
        if previous != Some(grab) {
            // The old combination stays grabbed until the new one is held.
            self.keys.grab_key(keycode, mask, &accelerator.trigger)?;
            if let Some(old) = previous {
                if let Err(e) = self.keys.ungrab_key(old.keycode, ModMask::from(old.modifiers)) {
                    tracing::warn!("Failed to release the previous grab of '{}': {}", shortcut.id, e);
                }
            }
        }

        lock_grabs(&self.grabs).insert(shortcut.id.clone(), grab);
        tracing::info!("Grabbed X11 shortcut '{}' for {}", accelerator.trigger, shortcut.id);
        self.table.insert(shortcut);
        Ok(())
    }

    fn unbind(&self, id: &str) -> Result<()> {
        let removed = lock_grabs(&self.grabs).remove(id);
        self.table.remove(id);
        match removed {
            Some(grab) => self.keys.ungrab_key(grab.keycode, ModMask::from(grab.modifiers)),
            None => Ok(()),
        }
    }

    fn unbind_all(&self) -> Result<()> {
        let grabs: Vec<Grab> = lock_grabs(&self.grabs).drain().map(|(_, grab)| grab).collect();
        self.table.clear();
        for grab in grabs {
            self.keys.ungrab_key(grab.keycode, ModMask::from(grab.modifiers))?;
        }
        Ok(())
    }
}

/// Opens the grab connection and starts the thread that turns key presses into activations.
fn start_grabs(table: ShortcutTable) -> Result<ShortcutGrabs<RootGrab>> {
    let (conn, screen_num) =
        x11rb::connect(None).map_err(|e| anyhow!("Failed to open X11 grab connection: {}", e))?;
    let root = conn
        .setup()
        .roots
        .get(screen_num)
        .map(|screen| screen.root)
        .ok_or_else(|| anyhow!("X11 screen {} does not exist", screen_num))?;

    let conn = Arc::new(conn);
    let grabs = ShortcutGrabs::new(
        RootGrab {
            conn: conn.clone(),
            root,
        },
        table.clone(),
    );

    let lookup = grabs.grabs.clone();
    std::thread::Builder::new()
        .name("x11-shortcuts".to_string())
        .spawn(move || {
            tracing::debug!("X11 shortcut event loop started");
            loop {
                match conn.wait_for_event() {
                    Ok(Event::KeyPress(event)) => {
                        let state = u16::from(event.state);
                        let id = lock_grabs(&lookup)
                            .iter()
                            .find(|(_, grab)| grab.matches(event.detail, state))
                            .map(|(id, _)| id.clone());
                        if let Some(id) = id {
                            table.trigger(&id);
                        }
                    }
                    Ok(_) => {}
                    Err(e) => {
                        tracing::debug!("X11 event loop error: {:?}", e);
                        break;
                    }
                }
            }
            tracing::debug!("X11 shortcut event loop ended");
        })
        .context("Failed to spawn X11 shortcut thread")?;

    Ok(grabs)
}

fn lock_grabs(grabs: &Mutex<HashMap<String, Grab>>) -> MutexGuard<'_, HashMap<String, Grab>> {
    grabs.lock().unwrap_or_else(|p| p.into_inner())
}

pub struct X11Backend {
    flavor: X11Flavor,
    session: Arc<X11Session>,
    shortcuts: ShortcutGrabs<RootGrab>,
}

impl X11Backend {
    pub fn connect(flavor: X11Flavor) -> Result<Self> {
        let session = Arc::new(X11Session::connect()?);
        let shortcuts = start_grabs(ShortcutTable::new())?;
        Ok(Self {
            flavor,
            session,
            shortcuts,
        })
    }

    async fn blocking<T, F>(&self, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&X11Session) -> Result<T> + Send + 'static,
    {
        let session = self.session.clone();
        tokio::task::spawn_blocking(move || f(&session)).await?
    }
}

#[async_trait]
impl Backend for X11Backend {
    async fn init(&self) -> Result<()> {
        let present = self
            .session
            .conn
            .extension_information(x11rb::protocol::xtest::X11_EXTENSION_NAME)?
            .is_some();
        if !present {
            tracing::warn!("XTEST extension not available, key and pointer simulation will fail");
        }
        tracing::info!("{} backend ready", self.flavor.name());
        Ok(())
    }

    fn backend_info(&self) -> BackendInfo {
        BackendInfo {
            name: self.flavor.name().to_string(),
            window_type: self.flavor.window_type().to_string(),
            supports_shortcuts: true,
            shortcut_hint: None,
        }
    }

    async fn wm_info(&self) -> Result<WmInfo> {
        self.blocking(|session| session.wm_info()).await
    }

    async fn move_pointer(&self, dx: i32, dy: i32) -> Result<()> {
        self.blocking(move |session| session.warp_pointer(dx, dy)).await
    }

    async fn simulate_keys(&self, keys: &[KeyEvent]) -> Result<()> {
        dispatch_key_sequence(keys, KeyPlatform::Linux, |code, down| {
            let session = self.session.clone();
            async move { session.fake_key(code, down) }
        })
        .await
    }

    async fn bind_shortcut(&self, shortcut: Shortcut) -> Result<()> {
        self.shortcuts.bind(shortcut)
    }

    async fn unbind_shortcut(&self, id: &str) -> Result<()> {
        self.shortcuts.unbind(id)
    }

    async fn unbind_all_shortcuts(&self) -> Result<()> {
        self.shortcuts.unbind_all()
    }
}
