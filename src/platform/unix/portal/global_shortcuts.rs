// ABOUTME: GlobalShortcuts portal client for compositors without their own shortcut hook
// ABOUTME: Degrades to "unavailable" instead of failing when the portal is missing

use super::{GLOBAL_SHORTCUTS_INTERFACE, PortalBus, PortalCall, RequestCorrelator};
use crate::error::BackendError;
use crate::platform::{Shortcut, ShortcutTable};
use anyhow::Result;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::OnceCell;
use zbus::zvariant::{OwnedValue, Value};

/// Receives the id of every activated shortcut.
pub type ActivationHandler = Arc<dyn Fn(String) + Send + Sync>;

#[derive(Debug, Clone)]
struct Connected {
    session: String,
    version: u32,
}

pub struct GlobalShortcuts {
    correlator: RequestCorrelator,
    // None once a connection attempt has failed.
    state: OnceCell<Option<Connected>>,
    handler: Arc<Mutex<Option<ActivationHandler>>>,
}

impl GlobalShortcuts {
    pub fn new(bus: Arc<dyn PortalBus>, app_id: &str) -> Self {
        Self {
            correlator: RequestCorrelator::new(bus, app_id),
            state: OnceCell::new(),
            handler: Arc::new(Mutex::new(None)),
        }
    }

    /// Registers the callback for `Activated` signals, replacing any previous one.
    pub fn set_activation_handler(&self, handler: ActivationHandler) {
        let mut slot = self.handler.lock().unwrap_or_else(|p| p.into_inner());
        *slot = Some(handler);
    }

    async fn connect(&self) -> Option<&Connected> {
        self.state
            .get_or_init(|| async {
                match self.open_session().await {
                    Ok(connected) => {
                        tracing::info!(
                            "Global shortcuts portal v{} session at {}",
                            connected.version,
                            connected.session
                        );
                        Some(connected)
                    }
                    Err(e) => {
                        tracing::warn!("Global shortcuts portal is unavailable: {:#}", e);
                        None
                    }
                }
            })
            .await
            .as_ref()
    }

    async fn open_session(&self) -> Result<Connected> {
        let bus = self.correlator.bus().clone();
        let version = bus.interface_version(GLOBAL_SHORTCUTS_INTERFACE).await?;

        let session = self.correlator.session_handle()?;
        let session_token = session.token.clone();
        let create = bus.clone();
        let response = self
            .correlator
            .make_request(move |request| async move {
                create
                    .call(PortalCall::CreateSession {
                        interface: GLOBAL_SHORTCUTS_INTERFACE,
                        handle_token: request.token,
                        session_handle_token: session_token,
                    })
                    .await
            })
            .await?;
        let session_path = response
            .string_result("session_handle")
            .unwrap_or(session.path);

        let mut activations = bus.shortcut_activations(&session_path).await?;
        let handler = self.handler.clone();
        tokio::spawn(async move {
            while let Some(id) = activations.next_activation().await {
                let current = handler.lock().unwrap_or_else(|p| p.into_inner()).clone();
                match current {
                    Some(handler) => handler(id),
                    None => tracing::debug!("Shortcut '{}' activated without a handler", id),
                }
            }
            tracing::debug!("Global shortcuts activation stream ended");
        });

        Ok(Connected {
            session: session_path,
            version,
        })
    }

    pub async fn is_available(&self) -> bool {
        self.connect().await.is_some()
    }

    /// Interface version, or 0 when the portal is unavailable.
    pub async fn version(&self) -> u32 {
        self.connect().await.map(|c| c.version).unwrap_or(0)
    }

    /// Ids of the shortcuts currently bound to our session.
    pub async fn list_shortcuts(&self) -> Vec<String> {
        let Some(connected) = self.connect().await else {
            return Vec::new();
        };

        let bus = self.correlator.bus().clone();
        let session = connected.session.clone();
        let result = self
            .correlator
            .make_request(move |request| async move {
                bus.call(PortalCall::ListShortcuts {
                    session,
                    handle_token: request.token,
                })
                .await
            })
            .await;

        match result {
            Ok(response) => shortcut_ids(&response.results),
            Err(e) => {
                tracing::warn!("Failed to list global shortcuts: {:#}", e);
                Vec::new()
            }
        }
    }

    /// Binds `(id, description)` pairs. Returns false if nothing could be bound.
    pub async fn bind_shortcuts(&self, shortcuts: &[(String, String)]) -> bool {
        let Some(connected) = self.connect().await else {
            return false;
        };

        let bus = self.correlator.bus().clone();
        let session = connected.session.clone();
        let shortcuts = shortcuts.to_vec();
        let result = self
            .correlator
            .make_request(move |request| async move {
                bus.call(PortalCall::BindShortcuts {
                    session,
                    shortcuts,
                    handle_token: request.token,
                })
                .await
            })
            .await;

        match result {
            Ok(_) => true,
            Err(e) => {
                tracing::warn!("Failed to bind global shortcuts: {:#}", e);
                false
            }
        }
    }
}

/// Keeps a shortcut table in sync with the portal session.
///
/// The portal has no per-shortcut unbind. Unbinding only drops the table entry, so a
/// later activation of that id finds nothing to run.
pub struct PortalShortcuts {
    portal: Arc<GlobalShortcuts>,
    table: ShortcutTable,
}

impl PortalShortcuts {
    pub fn new(portal: Arc<GlobalShortcuts>) -> Self {
        let table = ShortcutTable::new();
        let dispatch = table.clone();
        portal.set_activation_handler(Arc::new(move |id| {
            dispatch.trigger(&id);
        }));
        Self { portal, table }
    }

    pub fn portal(&self) -> &Arc<GlobalShortcuts> {
        &self.portal
    }

    /// Adds the shortcut and re-sends the whole set, which is how the portal expects it.
    ///
    /// Nothing is sent when the portal already knows every id, since each `BindShortcuts`
    /// call may show the user a dialog.
    pub async fn bind(&self, shortcut: Shortcut) -> Result<()> {
        let id = shortcut.id.clone();
        let previous = self.table.insert(shortcut);

        let known = self.portal.list_shortcuts().await;
        if self.table.ids().iter().all(|id| known.contains(id)) {
            return Ok(());
        }

        let pairs: Vec<(String, String)> = self
            .table
            .shortcuts()
            .into_iter()
            .map(|s| (s.id, s.description))
            .collect();
        if self.portal.bind_shortcuts(&pairs).await {
            return Ok(());
        }

        match previous {
            Some(previous) => {
                self.table.insert(previous);
            }
            None => {
                self.table.remove(&id);
            }
        }
        Err(BackendError::PortalUnavailable(format!(
            "the global shortcuts portal did not bind '{}'",
            id
        ))
        .into())
    }

    pub fn unbind(&self, id: &str) {
        if self.table.remove(id).is_some() {
            tracing::debug!("Shortcut '{}' stays registered with the portal but is now ignored", id);
        }
    }

    pub fn unbind_all(&self) {
        self.table.clear();
    }

    pub fn table(&self) -> &ShortcutTable {
        &self.table
    }
}

/// Extracts ids from the `shortcuts` result, an `a(sa{sv})`.
fn shortcut_ids(results: &HashMap<String, OwnedValue>) -> Vec<String> {
    let Some(Value::Array(shortcuts)) = results.get("shortcuts").map(|v| &**v) else {
        return Vec::new();
    };

    shortcuts
        .iter()
        .filter_map(|entry| match entry {
            Value::Structure(fields) => match fields.fields().first() {
                Some(Value::Str(id)) => Some(id.as_str().to_string()),
                _ => None,
            },
            _ => None,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::super::testing::MockPortalBus;
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_unavailable_portal_degrades() {
        let bus = Arc::new(MockPortalBus::unavailable());
        let client = GlobalShortcuts::new(bus.clone(), "pie_backend");

        assert!(!client.is_available().await);
        assert_eq!(client.version().await, 0);
        assert!(client.list_shortcuts().await.is_empty());
        assert!(!client.bind_shortcuts(&[("a".into(), "A".into())]).await);
        assert!(bus.calls().is_empty());
    }

    #[tokio::test]
    async fn test_concurrent_connect_creates_one_session() {
        let bus = Arc::new(MockPortalBus::new());
        let client = GlobalShortcuts::new(bus.clone(), "pie_backend");

        let (a, b, c) = tokio::join!(client.is_available(), client.version(), client.is_available());
        assert!(a && c);
        assert_eq!(b, 1);
        assert_eq!(
            bus.count(|call| matches!(call, PortalCall::CreateSession { .. })),
            1
        );
    }

    #[tokio::test]
    async fn test_bind_shortcuts_sends_pairs() {
        let bus = Arc::new(MockPortalBus::new());
        let client = GlobalShortcuts::new(bus.clone(), "pie_backend");
        let shortcuts = vec![
            ("menu-1".to_string(), "Open menu 1".to_string()),
            ("menu-2".to_string(), "Open menu 2".to_string()),
        ];

        assert!(client.bind_shortcuts(&shortcuts).await);

        let bound = bus.calls().into_iter().find_map(|call| match call {
            PortalCall::BindShortcuts { shortcuts, .. } => Some(shortcuts),
            _ => None,
        });
        assert_eq!(bound, Some(shortcuts));
        assert_eq!(bus.listener_count(), 0);
    }

    #[tokio::test]
    async fn test_activations_reach_the_handler() {
        let bus = Arc::new(MockPortalBus::new());
        let client = GlobalShortcuts::new(bus.clone(), "pie_backend");
        let (sender, mut receiver) = tokio::sync::mpsc::unbounded_channel();
        client.set_activation_handler(Arc::new(move |id| {
            let _ = sender.send(id);
        }));

        assert!(client.is_available().await);
        bus.activate("menu-1");
        bus.activate("menu-2");

        let first = tokio::time::timeout(Duration::from_secs(1), receiver.recv()).await.unwrap();
        let second = tokio::time::timeout(Duration::from_secs(1), receiver.recv()).await.unwrap();
        assert_eq!(first.as_deref(), Some("menu-1"));
        assert_eq!(second.as_deref(), Some("menu-2"));
    }

    #[tokio::test]
    async fn test_unbound_shortcut_activation_is_ignored() {
        use std::sync::atomic::{AtomicUsize, Ordering};

        let bus = Arc::new(MockPortalBus::new());
        let shortcuts = PortalShortcuts::new(Arc::new(GlobalShortcuts::new(bus.clone(), "pie_backend")));
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = hits.clone();
        shortcuts
            .bind(Shortcut::new("menu-1", "Ctrl+Space", "Open menu 1", move || {
                counter.fetch_add(1, Ordering::SeqCst);
            }))
            .await
            .unwrap();

        shortcuts.unbind("menu-1");
        bus.activate("menu-1");
        tokio::time::sleep(Duration::from_millis(10)).await;

        assert_eq!(hits.load(Ordering::SeqCst), 0);
        assert!(shortcuts.table().is_empty());
    }

    #[tokio::test]
    async fn test_bind_without_portal_fails_and_rolls_back() {
        let bus = Arc::new(MockPortalBus::unavailable());
        let shortcuts = PortalShortcuts::new(Arc::new(GlobalShortcuts::new(bus, "pie_backend")));

        let error = shortcuts
            .bind(Shortcut::new("menu-1", "Ctrl+Space", "Open menu 1", || {}))
            .await
            .unwrap_err();
        assert!(matches!(
            crate::error::backend_error(&error),
            Some(BackendError::PortalUnavailable(_))
        ));
        assert!(shortcuts.table().is_empty());
    }

    #[test]
    fn test_shortcut_ids_missing_key() {
        assert!(shortcut_ids(&HashMap::new()).is_empty());
    }
}
