// ABOUTME: Picks a backend from the OS, desktop and session type, or from the config override
// ABOUTME: Also wires each backend to its D-Bus, Wayland and subprocess clients

use crate::config::Config;
use crate::error::BackendError;
use crate::platform::Backend;
use anyhow::Result;
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Environment {
    pub os: String,
    /// `XDG_CURRENT_DESKTOP`, possibly a colon-separated list.
    pub desktop: String,
    /// `XDG_SESSION_TYPE`
    pub session: String,
}

impl Environment {
    pub fn new(os: &str, desktop: &str, session: &str) -> Self {
        Self {
            os: os.to_string(),
            desktop: desktop.to_string(),
            session: session.to_string(),
        }
    }

    pub fn from_env() -> Self {
        Self {
            os: std::env::consts::OS.to_string(),
            desktop: std::env::var("XDG_CURRENT_DESKTOP").unwrap_or_default(),
            session: std::env::var("XDG_SESSION_TYPE").unwrap_or_default(),
        }
    }

    /// True if any entry of the desktop list equals one of `names`, ignoring case and an `X-` prefix.
    pub fn desktop_is(&self, names: &[&str]) -> bool {
        self.desktop.split(':').any(|entry| {
            let entry = entry.trim();
            let entry = entry
                .strip_prefix("X-")
                .or_else(|| entry.strip_prefix("x-"))
                .unwrap_or(entry);
            names.iter().any(|name| entry.eq_ignore_ascii_case(name))
        })
    }

    fn session_is(&self, session: &str) -> bool {
        self.session.eq_ignore_ascii_case(session)
    }

    fn is_unix_desktop(&self) -> bool {
        matches!(self.os.as_str(), "linux" | "freebsd")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BackendKind {
    Windows,
    Macos,
    X11,
    /// X11 with the window type KWin expects for the menu.
    X11Kde,
    /// X11 with the window type Muffin expects for the menu.
    X11Cinnamon,
    Gnome,
    KdeWayland,
    Hyprland,
    Niri,
    Wlroots,
}

impl BackendKind {
    /// Parses a `backend.force` value.
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "windows" => Some(Self::Windows),
            "macos" => Some(Self::Macos),
            "x11" => Some(Self::X11),
            "gnome" => Some(Self::Gnome),
            "kde-wayland" => Some(Self::KdeWayland),
            "hyprland" => Some(Self::Hyprland),
            "niri" => Some(Self::Niri),
            "wlroots" => Some(Self::Wlroots),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Windows => "windows",
            Self::Macos => "macos",
            Self::X11 => "x11",
            Self::X11Kde => "x11 (kde)",
            Self::X11Cinnamon => "x11 (cinnamon)",
            Self::Gnome => "gnome",
            Self::KdeWayland => "kde-wayland",
            Self::Hyprland => "hyprland",
            Self::Niri => "niri",
            Self::Wlroots => "wlroots",
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// First matching row wins. The generic wlroots backend is never chosen here.
pub fn select_kind(env: &Environment) -> Option<BackendKind> {
    match env.os.as_str() {
        "windows" => return Some(BackendKind::Windows),
        "macos" => return Some(BackendKind::Macos),
        _ if env.is_unix_desktop() => {}
        _ => return None,
    }

    let wayland = env.session_is("wayland");
    let x11 = env.session_is("x11");

    if env.desktop_is(&["GNOME", "Unity"]) && wayland {
        Some(BackendKind::Gnome)
    } else if env.desktop_is(&["KDE"]) && x11 {
        Some(BackendKind::X11Kde)
    } else if env.desktop_is(&["KDE"]) && wayland {
        Some(BackendKind::KdeWayland)
    } else if env.desktop_is(&["Hyprland"]) {
        Some(BackendKind::Hyprland)
    } else if env.desktop_is(&["niri"]) {
        Some(BackendKind::Niri)
    } else if env.desktop_is(&["Cinnamon"]) && x11 {
        Some(BackendKind::X11Cinnamon)
    } else if x11 {
        Some(BackendKind::X11)
    } else if env.session_is("tty") {
        tracing::warn!(
            "Session type is 'tty', trying X11. Set XDG_SESSION_TYPE if this is a graphical session"
        );
        Some(BackendKind::X11)
    } else {
        None
    }
}

/// Resolves the backend kind and builds it. The caller still has to `init` it.
pub async fn create_backend(config: &Config) -> Result<Box<dyn Backend>> {
    let env = Environment::from_env();
    let unsupported = || BackendError::UnsupportedPlatform {
        os: env.os.clone(),
        desktop: env.desktop.clone(),
        session: env.session.clone(),
    };

    let kind = match config.backend.force.as_deref() {
        Some(name) => {
            let kind = BackendKind::from_name(name).ok_or_else(unsupported)?;
            tracing::info!("Using forced backend {}", kind);
            kind
        }
        None => match select_kind(&env) {
            Some(kind) => {
                tracing::info!(
                    "Selected backend {} for {} (desktop: {:?}, session: {:?})",
                    kind,
                    env.os,
                    env.desktop,
                    env.session
                );
                kind
            }
            None => {
                tracing::error!(
                    "No backend for {} (desktop: {:?}, session: {:?})",
                    env.os,
                    env.desktop,
                    env.session
                );
                return Err(unsupported().into());
            }
        },
    };

    instantiate(kind, config).await.map_err(|e| {
        if crate::error::backend_error(&e).is_some() {
            e
        } else {
            e.context(format!("Failed to start the {} backend", kind))
        }
    })
}

#[allow(unused_variables)]
async fn instantiate(kind: BackendKind, config: &Config) -> Result<Box<dyn Backend>> {
    match kind {
        #[cfg(target_os = "windows")]
        BackendKind::Windows => Ok(Box::new(super::windows::WindowsBackend::new())),
        #[cfg(target_os = "macos")]
        BackendKind::Macos => Ok(Box::new(super::macos::MacBackend::new())),
        #[cfg(any(target_os = "linux", target_os = "freebsd"))]
        BackendKind::X11
        | BackendKind::X11Kde
        | BackendKind::X11Cinnamon
        | BackendKind::Gnome
        | BackendKind::KdeWayland
        | BackendKind::Hyprland
        | BackendKind::Niri
        | BackendKind::Wlroots => unix::instantiate(kind, config).await,
        #[allow(unreachable_patterns)]
        _ => Err(not_buildable_here(kind).into()),
    }
}

/// A kind this build has no backend for, e.g. a forced `windows` on Linux.
fn not_buildable_here(kind: BackendKind) -> BackendError {
    BackendError::UnsupportedPlatform {
        os: std::env::consts::OS.to_string(),
        desktop: kind.name().to_string(),
        session: String::new(),
    }
}

#[cfg(any(target_os = "linux", target_os = "freebsd"))]
mod unix {
    use super::{BackendKind, not_buildable_here};
    use crate::config::Config;
    use crate::platform::Backend;
    use crate::platform::unix::cli::{CommandRunner, JsonTool};
    use crate::platform::unix::gnome::{GnomeBackend, ZbusShellExtension};
    use crate::platform::unix::hyprland::HyprlandBackend;
    use crate::platform::unix::kde::KdeWaylandBackend;
    use crate::platform::unix::kwin::{
        KwinScriptHost, ScriptCallbacks, ScriptSettings, ScriptingClient, detect_kwin_major_version,
        serve_callbacks,
    };
    use crate::platform::unix::niri::NiriBackend;
    use crate::platform::unix::portal::global_shortcuts::PortalShortcuts;
    use crate::platform::unix::portal::{GlobalShortcuts, PortalBus, RemoteDesktop, ZbusPortalBus};
    use crate::platform::unix::wlroots::{WlrootsBackend, WlrootsClient};
    use crate::platform::unix::x11::{X11Backend, X11Flavor};
    use anyhow::{Context, Result};
    use std::sync::Arc;
    use zbus::Connection;

    /// Name KWin shows next to script-registered shortcuts.
    const SHORTCUT_APP_NAME: &str = "Pie Menu";

    async fn session_bus() -> Result<Connection> {
        Connection::session()
            .await
            .context("Failed to connect to the session bus")
    }

    async fn portal_shortcuts(config: &Config) -> Result<PortalShortcuts> {
        let bus: Arc<dyn PortalBus> = Arc::new(ZbusPortalBus::from_connection(session_bus().await?));
        Ok(PortalShortcuts::new(Arc::new(GlobalShortcuts::new(
            bus,
            &config.portal.app_id,
        ))))
    }

    async fn x11(flavor: X11Flavor) -> Result<Box<dyn Backend>> {
        let backend = tokio::task::spawn_blocking(move || X11Backend::connect(flavor)).await??;
        Ok(Box::new(backend))
    }

    pub(super) async fn instantiate(kind: BackendKind, config: &Config) -> Result<Box<dyn Backend>> {
        let app_id = config.portal.app_id.as_str();
        let sample_timeout = config.wayland.pointer_sample_timeout();

        match kind {
            BackendKind::X11Kde => x11(X11Flavor::Kde).await,
            BackendKind::X11Cinnamon => x11(X11Flavor::Cinnamon).await,
            BackendKind::Gnome => {
                let connection = session_bus().await?;
                let extension = ZbusShellExtension::connect(&connection).await?;
                let bus: Arc<dyn PortalBus> = Arc::new(ZbusPortalBus::from_connection(connection));
                Ok(Box::new(GnomeBackend::new(
                    Arc::new(extension),
                    RemoteDesktop::new(bus, app_id),
                )))
            }
            BackendKind::KdeWayland => {
                let connection = session_bus().await?;
                let callbacks = Arc::new(ScriptCallbacks::new());
                serve_callbacks(
                    &connection,
                    &config.scripting.bus_name,
                    &config.scripting.object_path,
                    callbacks.clone(),
                )
                .await?;

                let kwin_major_version = detect_kwin_major_version().await;
                let settings = ScriptSettings {
                    script_dir: config.scripting.script_dir()?,
                    bus_name: config.scripting.bus_name.clone(),
                    object_path: config.scripting.object_path.clone(),
                    kwin_major_version,
                    query_timeout: config.scripting.query_timeout(),
                    app_name: SHORTCUT_APP_NAME.to_string(),
                };
                let host = Arc::new(KwinScriptHost::new(connection.clone(), kwin_major_version));
                let scripting = Arc::new(ScriptingClient::new(host, callbacks, settings));

                let bus: Arc<dyn PortalBus> = Arc::new(ZbusPortalBus::from_connection(connection));
                let shortcuts = PortalShortcuts::new(Arc::new(GlobalShortcuts::new(bus.clone(), app_id)));
                Ok(Box::new(KdeWaylandBackend::new(
                    RemoteDesktop::new(bus, app_id),
                    scripting,
                    shortcuts,
                )))
            }
            BackendKind::Hyprland => {
                let input = WlrootsClient::connect(sample_timeout).await?;
                let hyprctl = JsonTool::hyprctl(Arc::new(CommandRunner));
                Ok(Box::new(HyprlandBackend::new(
                    hyprctl,
                    Arc::new(input),
                    portal_shortcuts(config).await?,
                )))
            }
            BackendKind::Niri => {
                let input = WlrootsClient::connect(sample_timeout).await?;
                let niri = JsonTool::niri(Arc::new(CommandRunner));
                Ok(Box::new(NiriBackend::new(niri, input, portal_shortcuts(config).await?)))
            }
            BackendKind::Wlroots => {
                let client = WlrootsClient::connect(sample_timeout).await?;
                Ok(Box::new(WlrootsBackend::new(client)))
            }
            BackendKind::X11 => x11(X11Flavor::Generic).await,
            BackendKind::Windows | BackendKind::Macos => Err(not_buildable_here(kind).into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gnome_wayland_selects_gnome() {
        let env = Environment::new("linux", "GNOME", "wayland");
        assert_eq!(select_kind(&env), Some(BackendKind::Gnome));
    }

    #[test]
    fn test_desktop_list_matches_any_entry() {
        let env = Environment::new("linux", "ubuntu:GNOME", "wayland");
        assert_eq!(select_kind(&env), Some(BackendKind::Gnome));

        let env = Environment::new("linux", "X-Cinnamon", "x11");
        assert_eq!(select_kind(&env), Some(BackendKind::X11Cinnamon));
    }

    #[test]
    fn test_gnome_on_x11_uses_plain_x11() {
        let env = Environment::new("linux", "GNOME", "x11");
        assert_eq!(select_kind(&env), Some(BackendKind::X11));
    }

    #[test]
    fn test_kde_depends_on_session() {
        assert_eq!(
            select_kind(&Environment::new("linux", "KDE", "x11")),
            Some(BackendKind::X11Kde)
        );
        assert_eq!(
            select_kind(&Environment::new("linux", "KDE", "wayland")),
            Some(BackendKind::KdeWayland)
        );
    }

    #[test]
    fn test_compositors_ignore_session() {
        assert_eq!(
            select_kind(&Environment::new("linux", "Hyprland", "")),
            Some(BackendKind::Hyprland)
        );
        assert_eq!(
            select_kind(&Environment::new("linux", "niri", "wayland")),
            Some(BackendKind::Niri)
        );
    }

    #[test]
    fn test_unknown_wayland_desktop_is_unsupported() {
        let env = Environment::new("linux", "sway", "wayland");
        assert_eq!(select_kind(&env), None);
    }

    #[test]
    fn test_tty_falls_back_to_x11() {
        let env = Environment::new("linux", "", "tty");
        assert_eq!(select_kind(&env), Some(BackendKind::X11));
    }

    #[test]
    fn test_native_platforms_ignore_desktop() {
        assert_eq!(
            select_kind(&Environment::new("windows", "KDE", "wayland")),
            Some(BackendKind::Windows)
        );
        assert_eq!(
            select_kind(&Environment::new("macos", "", "")),
            Some(BackendKind::Macos)
        );
        assert_eq!(select_kind(&Environment::new("openbsd", "GNOME", "x11")), None);
    }

    async fn forced(name: &str) -> Result<Box<dyn Backend>> {
        let mut config = Config::default();
        config.backend.force = Some(name.to_string());
        create_backend(&config).await
    }

    fn unsupported_desktop(result: Result<Box<dyn Backend>>) -> Option<String> {
        match result {
            Ok(_) => None,
            Err(e) => match crate::error::backend_error(&e) {
                Some(BackendError::UnsupportedPlatform { desktop, .. }) => Some(desktop.clone()),
                _ => None,
            },
        }
    }

    #[cfg(any(target_os = "linux", target_os = "freebsd"))]
    #[tokio::test]
    async fn test_forcing_another_os_fails_on_unix() {
        assert_eq!(unsupported_desktop(forced("windows").await).as_deref(), Some("windows"));
        assert_eq!(unsupported_desktop(forced("macos").await).as_deref(), Some("macos"));
    }

    #[cfg(any(target_os = "linux", target_os = "freebsd"))]
    #[tokio::test]
    async fn test_unix_instantiate_rejects_other_os_kinds() {
        let config = Config::default();
        for kind in [BackendKind::Windows, BackendKind::Macos] {
            assert!(unsupported_desktop(unix::instantiate(kind, &config).await).is_some());
        }
    }

    #[tokio::test]
    async fn test_unknown_forced_name_is_unsupported() {
        assert!(unsupported_desktop(forced("sway").await).is_some());
    }

    #[test]
    fn test_force_names() {
        assert_eq!(BackendKind::from_name("kde-wayland"), Some(BackendKind::KdeWayland));
        assert_eq!(BackendKind::from_name(" Wlroots "), Some(BackendKind::Wlroots));
        assert_eq!(BackendKind::from_name("sway"), None);
    }
}
