// ABOUTME: Finds the icons of the active freedesktop icon theme, following theme inheritance
// ABOUTME: The theme comes from config, ICON_THEME, the desktop's own settings or GTK settings

use crate::config::IconsConfig;
use crate::platform::Environment;
use crate::platform::unix::cli::host_command;
use anyhow::Result;
use freedesktop_desktop_entry::DesktopEntry;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

const FALLBACK_THEME: &str = "hicolor";
const CONTEXTS: &[&str] = &["apps", "actions", "devices", "mimetypes"];
// Highest priority first.
const SIZES: &[&str] = &["scalable", "48x48", "48"];
const EXTENSIONS: &[&str] = &["svg", "png"];

/// Value of `key` in `[section]` of a freedesktop key-file such as `index.theme`.
pub fn key_file_value(path: &Path, content: &str, section: &str, key: &str) -> Option<String> {
    let file = match DesktopEntry::from_str(path, content, None::<&[&str]>) {
        Ok(file) => file,
        Err(e) => {
            tracing::debug!("Cannot parse {}: {}", path.display(), e);
            return None;
        }
    };
    let value = file.groups.group(section)?.entry(key)?.trim();
    (!value.is_empty()).then(|| value.to_string())
}

fn read_key_file_value(path: &Path, section: &str, key: &str) -> Option<String> {
    let content = fs::read_to_string(path).ok()?;
    key_file_value(path, &content, section, key)
}

async fn command_output(program: &str, args: &[&str]) -> Option<String> {
    let output = host_command(program, args).output().await.ok()?;
    if !output.status.success() {
        return None;
    }
    let text = String::from_utf8_lossy(&output.stdout).trim().to_string();
    (!text.is_empty()).then_some(text)
}

async fn gnome_theme() -> Option<String> {
    let output = command_output("gsettings", &["get", "org.gnome.desktop.interface", "icon-theme"]).await?;
    let theme = output.trim_matches('\'').to_string();
    (!theme.is_empty()).then_some(theme)
}

fn kde_theme(config_dir: &Path) -> Option<String> {
    read_key_file_value(&config_dir.join("kdeglobals"), "Icons", "Theme")
}

async fn xfce_theme() -> Option<String> {
    command_output("xfconf-query", &["-c", "xsettings", "-p", "/Net/IconThemeName"]).await
}

fn gtk_theme(config_dir: &Path) -> Option<String> {
    read_key_file_value(
        &config_dir.join("gtk-3.0").join("settings.ini"),
        "Settings",
        "gtk-icon-theme-name",
    )
}

/// The icon theme to search, most specific source first.
pub async fn current_icon_theme(config: &IconsConfig, env: &Environment) -> String {
    if let Ok(theme) = std::env::var("ICON_THEME") {
        if !theme.is_empty() {
            return theme;
        }
    }
    if let Some(theme) = &config.theme {
        return theme.clone();
    }

    let config_dir = dirs::config_dir().unwrap_or_default();
    let desktop_theme = if env.desktop_is(&["GNOME"]) {
        gnome_theme().await
    } else if env.desktop_is(&["KDE"]) {
        kde_theme(&config_dir)
    } else if env.desktop_is(&["XFCE"]) {
        xfce_theme().await
    } else {
        let mut theme = gnome_theme().await;
        if theme.is_none() {
            theme = kde_theme(&config_dir);
        }
        if theme.is_none() {
            theme = xfce_theme().await;
        }
        theme
    };

    desktop_theme
        .or_else(|| gtk_theme(&config_dir))
        .unwrap_or_else(|| FALLBACK_THEME.to_string())
}

/// Base directories that may contain icon themes, in priority order.
pub fn default_search_paths() -> Vec<PathBuf> {
    let mut paths = Vec::new();
    if let Some(home) = dirs::home_dir() {
        paths.push(home.join(".icons"));
        paths.push(home.join(".local/share/icons"));
        paths.push(home.join(".local/share/pixmaps"));
        paths.push(home.join(".pixmaps"));
    }
    if let Ok(data_dirs) = std::env::var("XDG_DATA_DIRS") {
        paths.extend(
            data_dirs
                .split(':')
                .filter(|dir| !dir.is_empty())
                .map(|dir| Path::new(dir).join("icons")),
        );
    }
    paths.extend(
        [
            "/usr/share/icons",
            "/usr/local/share/icons",
            "/usr/share/pixmaps",
            "/usr/local/share/pixmaps",
        ]
        .iter()
        .map(PathBuf::from),
    );
    paths
}

pub struct IconLocator {
    search_paths: Vec<PathBuf>,
}

impl IconLocator {
    pub fn new() -> Self {
        Self::with_search_paths(default_search_paths())
    }

    /// Duplicates are dropped, keeping the first occurrence.
    pub fn with_search_paths(paths: Vec<PathBuf>) -> Self {
        let mut search_paths: Vec<PathBuf> = Vec::with_capacity(paths.len());
        for path in paths {
            if !search_paths.contains(&path) {
                search_paths.push(path);
            }
        }
        Self { search_paths }
    }

    pub fn search_paths(&self) -> &[PathBuf] {
        &self.search_paths
    }

    /// Every directory holding an `index.theme` for `theme`.
    pub fn theme_directories(&self, theme: &str) -> Vec<PathBuf> {
        self.search_paths
            .iter()
            .map(|base| base.join(theme))
            .filter(|dir| dir.join("index.theme").is_file())
            .collect()
    }

    fn inherited_themes(&self, theme: &str) -> Vec<String> {
        let directories = self.theme_directories(theme);
        if directories.is_empty() {
            return Vec::new();
        }

        let mut inherited: Vec<String> = Vec::new();
        for dir in directories {
            let Some(inherits) = read_key_file_value(&dir.join("index.theme"), "Icon Theme", "Inherits") else {
                continue;
            };
            for name in inherits.split(',').map(str::trim).filter(|n| !n.is_empty()) {
                if !inherited.iter().any(|known| known == name) {
                    inherited.push(name.to_string());
                }
            }
        }

        if inherited.is_empty() {
            vec![FALLBACK_THEME.to_string()]
        } else {
            inherited
        }
    }

    /// `theme` followed by everything it inherits from, breadth first, without repeats.
    pub fn theme_chain(&self, theme: &str) -> Vec<String> {
        let mut chain = vec![theme.to_string()];
        let mut pending = self.inherited_themes(theme);
        while !pending.is_empty() {
            let fresh: Vec<String> = pending
                .into_iter()
                .filter(|name| !chain.contains(name))
                .fold(Vec::new(), |mut acc, name| {
                    if !acc.contains(&name) {
                        acc.push(name);
                    }
                    acc
                });
            chain.extend(fresh.iter().cloned());
            pending = fresh.iter().flat_map(|name| self.inherited_themes(name)).collect();
        }
        chain
    }

    /// Icon files of `theme` and its ancestors, one per icon name, sorted by name.
    ///
    /// Earlier themes and search paths win name clashes, larger sizes beat smaller ones
    /// and SVG beats PNG.
    pub fn collect_icons(&self, theme: &str) -> Vec<PathBuf> {
        let directories: Vec<PathBuf> = self
            .theme_chain(theme)
            .iter()
            .flat_map(|name| self.theme_directories(name))
            .collect();

        let mut icons: BTreeMap<String, PathBuf> = BTreeMap::new();
        // Lowest priority first, so later inserts overwrite.
        for base in directories.iter().rev() {
            for size in SIZES.iter().rev() {
                for context in CONTEXTS {
                    for dir in [base.join(context).join(size), base.join(size).join(context)] {
                        collect_directory(&dir, &mut icons);
                    }
                }
            }
        }

        icons.into_values().collect()
    }
}

impl Default for IconLocator {
    fn default() -> Self {
        Self::new()
    }
}

fn collect_directory(dir: &Path, icons: &mut BTreeMap<String, PathBuf>) {
    let Ok(entries) = fs::read_dir(dir) else {
        return;
    };

    let mut files: Vec<(String, usize, PathBuf)> = entries
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter_map(|path| {
            let extension = path.extension()?.to_str()?.to_ascii_lowercase();
            let rank = EXTENSIONS.iter().position(|e| *e == extension)?;
            let stem = path.file_stem()?.to_str()?.to_string();
            Some((stem, rank, path))
        })
        .collect();
    // PNG before SVG so the SVG lands last.
    files.sort_by(|a, b| a.0.cmp(&b.0).then(b.1.cmp(&a.1)));

    for (stem, _, path) in files {
        icons.insert(stem, path);
    }
}

/// Resolves the theme and lists its icons.
pub async fn system_icons(config: &IconsConfig) -> Result<Vec<PathBuf>> {
    let env = Environment::from_env();
    let theme = current_icon_theme(config, &env).await;
    let started = std::time::Instant::now();

    let search_theme = theme.clone();
    let icons = tokio::task::spawn_blocking(move || IconLocator::new().collect_icons(&search_theme)).await?;

    tracing::info!(
        "Found {} {} icons in {:.2?}",
        icons.len(),
        theme,
        started.elapsed()
    );
    Ok(icons)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write(path: &Path, content: &str) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    fn theme(base: &Path, name: &str, inherits: Option<&str>) {
        let mut index = String::from("[Icon Theme]\nName=Test\n");
        if let Some(inherits) = inherits {
            index.push_str(&format!("Inherits={}\n", inherits));
        }
        write(&base.join(name).join("index.theme"), &index);
    }

    fn file_names(paths: &[PathBuf]) -> Vec<String> {
        paths
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect()
    }

    #[test]
    fn test_key_file_value() {
        let path = Path::new("settings.ini");
        let content = "# comment\n[Settings]\ngtk-theme-name = Adwaita\ngtk-icon-theme-name = Papirus\n[Other]\ngtk-icon-theme-name=Wrong\n";
        assert_eq!(
            key_file_value(path, content, "Settings", "gtk-icon-theme-name").as_deref(),
            Some("Papirus")
        );
        assert_eq!(
            key_file_value(path, content, "Other", "gtk-icon-theme-name").as_deref(),
            Some("Wrong")
        );
        assert_eq!(key_file_value(path, content, "Settings", "missing"), None);
        assert_eq!(key_file_value(path, content, "Missing", "gtk-theme-name"), None);
    }

    #[test]
    fn test_kde_and_gtk_settings_files() {
        let dir = TempDir::new().unwrap();
        write(&dir.path().join("kdeglobals"), "[General]\nColorScheme=Breeze\n\n[Icons]\nTheme=breeze-dark\n");
        write(
            &dir.path().join("gtk-3.0/settings.ini"),
            "[Settings]\ngtk-icon-theme-name=Adwaita\n",
        );

        assert_eq!(kde_theme(dir.path()).as_deref(), Some("breeze-dark"));
        assert_eq!(gtk_theme(dir.path()).as_deref(), Some("Adwaita"));
        assert_eq!(kde_theme(&dir.path().join("missing")), None);
    }

    #[test]
    fn test_search_paths_are_deduplicated() {
        let locator = IconLocator::with_search_paths(vec![
            PathBuf::from("/a"),
            PathBuf::from("/b"),
            PathBuf::from("/a"),
        ]);
        assert_eq!(locator.search_paths(), &[PathBuf::from("/a"), PathBuf::from("/b")]);
    }

    #[test]
    fn test_theme_without_inherits_implies_hicolor() {
        let dir = TempDir::new().unwrap();
        theme(dir.path(), "Papirus", None);
        theme(dir.path(), "hicolor", None);
        let locator = IconLocator::with_search_paths(vec![dir.path().to_path_buf()]);

        assert_eq!(locator.theme_chain("Papirus"), vec!["Papirus", "hicolor"]);
    }

    #[test]
    fn test_inheritance_is_followed_once() {
        let dir = TempDir::new().unwrap();
        theme(dir.path(), "Papirus-Dark", Some("Papirus, breeze"));
        theme(dir.path(), "Papirus", Some("breeze,hicolor"));
        theme(dir.path(), "breeze", Some("hicolor"));
        theme(dir.path(), "hicolor", None);
        let locator = IconLocator::with_search_paths(vec![dir.path().to_path_buf()]);

        assert_eq!(
            locator.theme_chain("Papirus-Dark"),
            vec!["Papirus-Dark", "Papirus", "breeze", "hicolor"]
        );
    }

    #[test]
    fn test_missing_theme_has_no_ancestors() {
        let dir = TempDir::new().unwrap();
        let locator = IconLocator::with_search_paths(vec![dir.path().to_path_buf()]);
        assert_eq!(locator.theme_chain("Nope"), vec!["Nope"]);
        assert!(locator.collect_icons("Nope").is_empty());
    }

    #[test]
    fn test_collect_icons_priorities() {
        let user = TempDir::new().unwrap();
        let system = TempDir::new().unwrap();

        theme(system.path(), "Papirus", None);
        theme(system.path(), "hicolor", None);
        theme(user.path(), "Papirus", None);

        // Child theme beats parent.
        write(&system.path().join("Papirus/apps/scalable/firefox.svg"), "");
        write(&system.path().join("hicolor/48x48/apps/firefox.png"), "");
        // Parent fills gaps.
        write(&system.path().join("hicolor/48x48/apps/gimp.png"), "");
        // Scalable beats 48x48, SVG beats PNG.
        write(&system.path().join("Papirus/48x48/devices/drive.png"), "");
        write(&system.path().join("Papirus/scalable/devices/drive.svg"), "");
        write(&system.path().join("Papirus/apps/48/term.png"), "");
        write(&system.path().join("Papirus/apps/48/term.svg"), "");
        // Earlier search path beats later.
        write(&user.path().join("Papirus/actions/48x48/edit.png"), "");
        write(&system.path().join("Papirus/actions/scalable/edit.svg"), "");
        // Ignored context, size and type.
        write(&system.path().join("Papirus/emblems/scalable/star.svg"), "");
        write(&system.path().join("Papirus/apps/16x16/tiny.png"), "");
        write(&system.path().join("Papirus/apps/scalable/notes.txt"), "");

        let locator = IconLocator::with_search_paths(vec![
            user.path().to_path_buf(),
            system.path().to_path_buf(),
        ]);
        let icons = locator.collect_icons("Papirus");

        assert_eq!(
            file_names(&icons),
            vec!["drive.svg", "edit.png", "firefox.svg", "gimp.png", "term.svg"]
        );
        assert!(icons[1].starts_with(user.path()));
        assert!(icons[2].starts_with(system.path().join("Papirus")));
    }
}
