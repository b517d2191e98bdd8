// ABOUTME: Configuration structures and parsing for backend selection and per-backend tuning
// ABOUTME: Every field has a default so a missing file or section still yields a usable setup

use crate::platform::BackendKind;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct Config {
    pub backend: BackendConfig,
    pub portal: PortalConfig,
    pub scripting: ScriptingConfig,
    pub wayland: WaylandConfig,
    pub icons: IconsConfig,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct BackendConfig {
    /// Skips auto-detection. Takes the same names as `BackendKind::from_name`.
    pub force: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct PortalConfig {
    pub app_id: String,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ScriptingConfig {
    pub bus_name: String,
    pub object_path: String,
    pub query_timeout_ms: u64,
    pub script_dir: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct WaylandConfig {
    pub pointer_sample_timeout_ms: u64,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct IconsConfig {
    pub theme: Option<String>,
}

impl Default for PortalConfig {
    fn default() -> Self {
        Self {
            app_id: "pie_backend".to_string(),
        }
    }
}

impl Default for ScriptingConfig {
    fn default() -> Self {
        Self {
            bus_name: "io.github.PieBackend".to_string(),
            object_path: "/io/github/PieBackend".to_string(),
            query_timeout_ms: 1000,
            script_dir: None,
        }
    }
}

impl Default for WaylandConfig {
    fn default() -> Self {
        Self {
            pointer_sample_timeout_ms: 250,
        }
    }
}

impl ScriptingConfig {
    pub fn query_timeout(&self) -> Duration {
        Duration::from_millis(self.query_timeout_ms)
    }

    /// Where generated KWin scripts are written.
    pub fn script_dir(&self) -> Result<PathBuf> {
        if let Some(dir) = &self.script_dir {
            return expand_tilde(dir).map(PathBuf::from);
        }
        let base = dirs::runtime_dir()
            .or_else(dirs::cache_dir)
            .context("Failed to determine a runtime or cache directory")?;
        Ok(base.join("pie-backend").join("kwin"))
    }
}

impl WaylandConfig {
    pub fn pointer_sample_timeout(&self) -> Duration {
        Duration::from_millis(self.pointer_sample_timeout_ms)
    }
}

impl Config {
    pub fn default_config_content() -> &'static str {
        r#"# Pie Backend Configuration

[backend]
# Skip auto-detection and always use one backend. One of:
# windows, macos, x11, gnome, kde-wayland, hyprland, niri, wlroots
# The generic wlroots backend is only used when forced.
# force = "x11"

[portal]
# Prefix for desktop portal request tokens
app_id = "pie_backend"

[scripting]
# D-Bus name and object that KWin scripts report back to
bus_name = "io.github.PieBackend"
object_path = "/io/github/PieBackend"
# How long to wait for a KWin script to report the active window
query_timeout_ms = 1000
# Where generated scripts are written (defaults to the runtime directory)
# script_dir = "~/.cache/pie-backend/kwin"

[wayland]
# How long the overlay waits for the pointer to enter it
pointer_sample_timeout_ms = 250

[icons]
# Icon theme to search first. The ICON_THEME environment variable wins over this.
# theme = "Papirus"
"#
    }

    pub fn load_from_str(content: &str) -> Result<Self> {
        toml::from_str(content).context("Failed to parse configuration")
    }

    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read configuration file: {}", path.display()))?;
        Self::load_from_str(&content)
    }

    /// Loads `path` if it exists, otherwise returns the defaults.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::load_from_file(path)
        } else {
            tracing::debug!("No configuration at {}, using defaults", path.display());
            Ok(Self::default())
        }
    }

    pub fn default_config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir().context("Failed to determine config directory")?;
        Ok(config_dir.join("pie-backend").join("config.toml"))
    }

    pub fn validate(&self) -> Result<()> {
        if let Some(force) = &self.backend.force {
            if BackendKind::from_name(force).is_none() {
                anyhow::bail!("Unknown backend '{}' in backend.force", force);
            }
        }

        if self.portal.app_id.is_empty() {
            anyhow::bail!("portal.app_id cannot be empty");
        }

        if !is_valid_bus_name(&self.scripting.bus_name) {
            anyhow::bail!("Invalid D-Bus name in scripting.bus_name: '{}'", self.scripting.bus_name);
        }
        if !is_valid_object_path(&self.scripting.object_path) {
            anyhow::bail!(
                "Invalid D-Bus object path in scripting.object_path: '{}'",
                self.scripting.object_path
            );
        }

        if self.scripting.query_timeout_ms == 0 {
            anyhow::bail!("query_timeout_ms must be greater than 0");
        }
        if self.wayland.pointer_sample_timeout_ms == 0 {
            anyhow::bail!("pointer_sample_timeout_ms must be greater than 0");
        }

        Ok(())
    }

    pub fn save_default_config(path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create config directory: {}", parent.display()))?;
        }

        fs::write(path, Self::default_config_content())
            .with_context(|| format!("Failed to write default config to: {}", path.display()))?;

        Ok(())
    }
}

fn expand_tilde(path: &str) -> Result<String> {
    if let Some(rest) = path.strip_prefix("~/") {
        let home = dirs::home_dir().context("Failed to determine home directory")?;
        Ok(home.join(rest).to_string_lossy().into_owned())
    } else {
        Ok(path.to_string())
    }
}

// Well-known names only: two or more dot-separated elements, none starting with a digit.
fn is_valid_bus_name(name: &str) -> bool {
    if name.is_empty() || name.len() > 255 || name.starts_with(':') {
        return false;
    }
    let elements: Vec<&str> = name.split('.').collect();
    elements.len() >= 2
        && elements.iter().all(|element| {
            !element.is_empty()
                && !element.starts_with(|c: char| c.is_ascii_digit())
                && element
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
        })
}

fn is_valid_object_path(path: &str) -> bool {
    if path == "/" {
        return true;
    }
    let Some(rest) = path.strip_prefix('/') else {
        return false;
    };
    rest.split('/').all(|element| {
        !element.is_empty() && element.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
    })
}
