// ABOUTME: Linux and FreeBSD backends: X11, GNOME, KDE Wayland, Hyprland, niri and generic wlroots
// ABOUTME: Also the D-Bus portal, KWin scripting and compositor CLI clients they are built from

pub mod cli;
pub mod gnome;
pub mod hyprland;
pub mod icons;
pub mod kde;
pub mod kwin;
pub mod niri;
pub mod portal;
pub mod wlroots;
pub mod x11;

#[cfg(target_os = "linux")]
pub mod apps;

pub use gnome::GnomeBackend;
pub use hyprland::HyprlandBackend;
pub use kde::KdeWaylandBackend;
pub use niri::NiriBackend;
pub use wlroots::WlrootsBackend;
pub use x11::{X11Backend, X11Flavor};
