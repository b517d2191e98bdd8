// ABOUTME: Lists launchable applications from the .desktop files in the XDG application directories
// ABOUTME: Hidden entries and entries without a command are skipped

use freedesktop_desktop_entry::{DesktopEntry, Iter, default_paths, get_languages_from_env};
use serde::Serialize;
use std::collections::HashSet;
use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AppEntry {
    /// Desktop file id, e.g. `org.gnome.Nautilus`.
    pub id: String,
    pub name: String,
    /// `Exec` without field codes.
    pub command: String,
    pub icon: Option<String>,
    pub path: PathBuf,
}

/// Removes `%f`, `%U` and the other field codes from an `Exec` value. `%%` becomes `%`.
pub fn strip_field_codes(exec: &str) -> String {
    let mut stripped = String::with_capacity(exec.len());
    let mut chars = exec.chars();
    while let Some(c) = chars.next() {
        if c != '%' {
            stripped.push(c);
            continue;
        }
        match chars.next() {
            Some('%') => stripped.push('%'),
            Some(_) | None => {}
        }
    }
    stripped.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Applications from the default XDG directories, sorted by name.
pub fn installed_apps() -> Vec<AppEntry> {
    apps_in(default_paths().collect())
}

/// Applications from `directories`. A desktop id seen twice keeps its first entry.
pub fn apps_in(directories: Vec<PathBuf>) -> Vec<AppEntry> {
    let locales = get_languages_from_env();
    let mut seen = HashSet::new();
    let mut apps = Vec::new();

    for path in Iter::new(directories.into_iter()) {
        let entry = match DesktopEntry::from_path(path.clone(), Some(locales.as_slice())) {
            Ok(entry) => entry,
            Err(e) => {
                tracing::debug!("Skipping {}: {}", path.display(), e);
                continue;
            }
        };

        if !seen.insert(entry.id().to_string()) || entry.no_display() {
            continue;
        }
        let Some(exec) = entry.exec() else {
            continue;
        };
        let command = strip_field_codes(exec);
        if command.is_empty() {
            continue;
        }

        let id = entry.id().to_string();
        let name = entry
            .name(&locales)
            .map(|name| name.to_string())
            .unwrap_or_else(|| id.clone());
        apps.push(AppEntry {
            name,
            command,
            icon: entry.icon().map(str::to_string),
            path: path.clone(),
            id,
        });
    }

    apps.sort_by(|a, b| a.name.to_lowercase().cmp(&b.name.to_lowercase()));
    tracing::debug!("Found {} applications", apps.len());
    apps
}
