// ABOUTME: Backend contract shared by every platform: pointer, keys, window info and shortcuts
// ABOUTME: Also holds the per-backend shortcut table that activation handlers dispatch through

use crate::keys::KeyEvent;
use anyhow::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};

pub mod selector;

#[cfg(target_os = "macos")]
pub mod macos;
#[cfg(any(target_os = "linux", target_os = "freebsd"))]
pub mod unix;
#[cfg(target_os = "windows")]
pub mod windows;

pub use selector::{BackendKind, Environment, create_backend, select_kind};

/// Static facts about a backend, used by the menu window and the settings UI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendInfo {
    pub name: String,
    /// Window type hint for the menu window (`dock`, `toolbar`, `splash`, ...).
    pub window_type: String,
    /// Whether shortcut triggers are bound by this process. If false, the user binds
    /// them in the desktop's own settings and `shortcut_hint` explains how.
    pub supports_shortcuts: bool,
    pub shortcut_hint: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

/// Snapshot of the focused window and pointer, taken when a menu is opened.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WmInfo {
    pub window_name: String,
    pub app_name: String,
    pub pointer_x: i32,
    pub pointer_y: i32,
    pub work_area: Option<Rect>,
}

pub type ShortcutAction = Arc<dyn Fn() + Send + Sync>;

#[derive(Clone)]
pub struct Shortcut {
    pub id: String,
    /// Accelerator such as `Ctrl+Alt+Space`.
    pub trigger: String,
    pub description: String,
    pub action: ShortcutAction,
}

impl Shortcut {
    pub fn new<F>(id: &str, trigger: &str, description: &str, action: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        Self {
            id: id.to_string(),
            trigger: trigger.to_string(),
            description: description.to_string(),
            action: Arc::new(action),
        }
    }
}

impl fmt::Debug for Shortcut {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Shortcut")
            .field("id", &self.id)
            .field("trigger", &self.trigger)
            .field("description", &self.description)
            .finish_non_exhaustive()
    }
}

/// The set of currently bound shortcuts, keyed by id.
///
/// Cloning shares the table, so activation handlers running on other tasks or threads
/// see the same entries as the backend that owns it.
#[derive(Clone, Default)]
pub struct ShortcutTable {
    inner: Arc<Mutex<HashMap<String, Shortcut>>>,
}

impl ShortcutTable {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, Shortcut>> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Stores the shortcut and returns the entry it replaced, if any.
    pub fn insert(&self, shortcut: Shortcut) -> Option<Shortcut> {
        self.lock().insert(shortcut.id.clone(), shortcut)
    }

    pub fn remove(&self, id: &str) -> Option<Shortcut> {
        self.lock().remove(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.lock().contains_key(id)
    }

    /// Removes every entry and returns them.
    pub fn clear(&self) -> Vec<Shortcut> {
        self.lock().drain().map(|(_, shortcut)| shortcut).collect()
    }

    /// Ids in sorted order.
    pub fn ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.lock().keys().cloned().collect();
        ids.sort();
        ids
    }

    pub fn shortcuts(&self) -> Vec<Shortcut> {
        let mut shortcuts: Vec<Shortcut> = self.lock().values().cloned().collect();
        shortcuts.sort_by(|a, b| a.id.cmp(&b.id));
        shortcuts
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Runs the action bound to `id`. Unknown ids are ignored and return false.
    pub fn trigger(&self, id: &str) -> bool {
        // Clone the action out so it runs without the lock held.
        let action = self.lock().get(id).map(|s| s.action.clone());
        match action {
            Some(action) => {
                tracing::debug!("Shortcut '{}' activated", id);
                action();
                true
            }
            None => {
                tracing::debug!("Ignoring activation of unbound shortcut '{}'", id);
                false
            }
        }
    }
}

/// One concrete way of talking to the desktop. Exactly one exists per process.
#[async_trait]
pub trait Backend: Send + Sync {
    /// Prepares the backend. Mechanisms that would show a permission prompt stay lazy.
    async fn init(&self) -> Result<()>;

    fn backend_info(&self) -> BackendInfo;

    async fn wm_info(&self) -> Result<WmInfo>;

    /// Moves the pointer relative to its current position.
    async fn move_pointer(&self, dx: i32, dy: i32) -> Result<()>;

    /// Sends the sequence in order. Fails before sending anything if a key name is unknown.
    async fn simulate_keys(&self, keys: &[KeyEvent]) -> Result<()>;

    async fn bind_shortcut(&self, shortcut: Shortcut) -> Result<()>;

    async fn unbind_shortcut(&self, id: &str) -> Result<()>;

    async fn unbind_all_shortcuts(&self) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counting_shortcut(id: &str, counter: &Arc<AtomicUsize>) -> Shortcut {
        let counter = counter.clone();
        Shortcut::new(id, "Ctrl+Space", "test", move || {
            counter.fetch_add(1, Ordering::SeqCst);
        })
    }

    #[test]
    fn test_table_trigger_runs_action() {
        let table = ShortcutTable::new();
        let counter = Arc::new(AtomicUsize::new(0));
        table.insert(counting_shortcut("main", &counter));

        assert!(table.trigger("main"));
        assert!(table.trigger("main"));
        assert_eq!(counter.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_table_ignores_unknown_ids() {
        let table = ShortcutTable::new();
        assert!(!table.trigger("missing"));
    }

    #[test]
    fn test_table_insert_replaces() {
        let table = ShortcutTable::new();
        let counter = Arc::new(AtomicUsize::new(0));
        assert!(table.insert(counting_shortcut("main", &counter)).is_none());
        assert!(table.insert(counting_shortcut("main", &counter)).is_some());
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_table_clear_and_ids() {
        let table = ShortcutTable::new();
        let counter = Arc::new(AtomicUsize::new(0));
        table.insert(counting_shortcut("b", &counter));
        table.insert(counting_shortcut("a", &counter));

        assert_eq!(table.ids(), vec!["a".to_string(), "b".to_string()]);
        assert_eq!(table.clear().len(), 2);
        assert!(table.is_empty());
    }

    #[test]
    fn test_clones_share_entries() {
        let table = ShortcutTable::new();
        let handle = table.clone();
        let counter = Arc::new(AtomicUsize::new(0));
        table.insert(counting_shortcut("main", &counter));

        assert!(handle.contains("main"));
        assert_eq!(handle.shortcuts()[0].trigger, "Ctrl+Space");
        handle.remove("main");
        assert!(table.is_empty());
    }

    #[test]
    fn test_action_may_touch_the_table() {
        // The action runs without the lock held, so it can unbind itself.
        let table = ShortcutTable::new();
        let inner = table.clone();
        table.insert(Shortcut::new("once", "Ctrl+1", "", move || {
            inner.remove("once");
        }));

        assert!(table.trigger("once"));
        assert!(table.is_empty());
    }
}
