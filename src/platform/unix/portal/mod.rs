// ABOUTME: Request/response correlation for xdg-desktop-portal calls over the session bus
// ABOUTME: Subscribes to the Request.Response signal before issuing the call that triggers it

pub mod global_shortcuts;
pub mod remote_desktop;

pub use global_shortcuts::GlobalShortcuts;
pub use remote_desktop::RemoteDesktop;

use crate::error::BackendError;
use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use futures_util::StreamExt;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use zbus::message::Type as MessageType;
use zbus::names::InterfaceName;
use zbus::zvariant::{ObjectPath, OwnedObjectPath, OwnedValue, Value};
use zbus::{Connection, MatchRule, MessageStream};

pub const PORTAL_BUS_NAME: &str = "org.freedesktop.portal.Desktop";
pub const PORTAL_OBJECT_PATH: &str = "/org/freedesktop/portal/desktop";
pub const REQUEST_INTERFACE: &str = "org.freedesktop.portal.Request";
pub const REMOTE_DESKTOP_INTERFACE: &str = "org.freedesktop.portal.RemoteDesktop";
pub const GLOBAL_SHORTCUTS_INTERFACE: &str = "org.freedesktop.portal.GlobalShortcuts";

/// A token and the object path the portal derives from it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Handle {
    pub token: String,
    pub path: String,
}

/// Payload of an `org.freedesktop.portal.Request.Response` signal.
#[derive(Debug, Default)]
pub struct PortalResponse {
    /// 0 = success, 1 = cancelled by the user, 2 = other failure.
    pub code: u32,
    pub results: HashMap<String, OwnedValue>,
}

impl PortalResponse {
    pub fn success() -> Self {
        Self::default()
    }

    pub fn string_result(&self, key: &str) -> Option<String> {
        match self.results.get(key).map(|v| &**v) {
            Some(Value::Str(s)) => Some(s.as_str().to_string()),
            Some(Value::ObjectPath(p)) => Some(p.as_str().to_string()),
            _ => None,
        }
    }
}

/// Portal methods this crate calls. The bus implementation owns the wire encoding.
#[derive(Debug, Clone, PartialEq)]
pub enum PortalCall {
    CreateSession {
        interface: &'static str,
        handle_token: String,
        session_handle_token: String,
    },
    SelectDevices {
        session: String,
        handle_token: String,
        types: u32,
    },
    Start {
        session: String,
        handle_token: String,
    },
    NotifyPointerMotion {
        session: String,
        dx: f64,
        dy: f64,
    },
    NotifyKeyboardKeycode {
        session: String,
        keycode: i32,
        state: u32,
    },
    ListShortcuts {
        session: String,
        handle_token: String,
    },
    BindShortcuts {
        session: String,
        /// `(id, description)` pairs.
        shortcuts: Vec<(String, String)>,
        handle_token: String,
    },
}

impl PortalCall {
    pub fn handle_token(&self) -> Option<&str> {
        match self {
            PortalCall::CreateSession { handle_token, .. }
            | PortalCall::SelectDevices { handle_token, .. }
            | PortalCall::Start { handle_token, .. }
            | PortalCall::ListShortcuts { handle_token, .. }
            | PortalCall::BindShortcuts { handle_token, .. } => Some(handle_token),
            PortalCall::NotifyPointerMotion { .. } | PortalCall::NotifyKeyboardKeycode { .. } => {
                None
            }
        }
    }
}

/// A live subscription to one request's `Response` signal. Dropping it unsubscribes.
#[async_trait]
pub trait ResponseSubscription: Send {
    async fn next_response(&mut self) -> Option<PortalResponse>;
}

/// A live subscription to `GlobalShortcuts.Activated` for one session. Yields shortcut ids.
#[async_trait]
pub trait ActivationSubscription: Send {
    async fn next_activation(&mut self) -> Option<String>;
}

/// The slice of the session bus the portal clients need.
#[async_trait]
pub trait PortalBus: Send + Sync {
    /// Our unique connection name, e.g. `:1.42`.
    fn unique_name(&self) -> Option<String>;

    async fn listen_for_response(&self, request_path: &str)
    -> Result<Box<dyn ResponseSubscription>>;

    async fn call(&self, call: PortalCall) -> Result<()>;

    /// Reads the `version` property of a portal interface.
    async fn interface_version(&self, interface: &str) -> Result<u32>;

    async fn shortcut_activations(&self, session: &str) -> Result<Box<dyn ActivationSubscription>>;
}

/// Turns `:1.42` into `1_42`, the form portals use in request and session paths.
pub fn sender_path_component(unique_name: &str) -> String {
    unique_name.trim_start_matches(':').replace('.', "_")
}

/// Issues portal requests and waits for their matching `Response` signal.
pub struct RequestCorrelator {
    bus: Arc<dyn PortalBus>,
    app_id: String,
}

impl RequestCorrelator {
    pub fn new(bus: Arc<dyn PortalBus>, app_id: &str) -> Self {
        Self {
            bus,
            app_id: app_id.to_string(),
        }
    }

    pub fn bus(&self) -> &Arc<dyn PortalBus> {
        &self.bus
    }

    pub fn new_token(&self) -> String {
        format!("{}_{}", self.app_id, rand::random::<u32>())
    }

    fn handle(&self, kind: &str) -> Result<Handle> {
        let unique_name = self
            .bus
            .unique_name()
            .ok_or_else(|| anyhow!("Session bus connection has no unique name"))?;
        let token = self.new_token();
        let path = format!(
            "{}/{}/{}/{}",
            PORTAL_OBJECT_PATH,
            kind,
            sender_path_component(&unique_name),
            token
        );
        Ok(Handle { token, path })
    }

    pub fn request_handle(&self) -> Result<Handle> {
        self.handle("request")
    }

    pub fn session_handle(&self) -> Result<Handle> {
        self.handle("session")
    }

    /// Runs `issue` with a fresh request handle and resolves with the portal's response.
    ///
    /// The subscription exists before `issue` runs and is dropped on every exit path.
    /// There is no timeout here; callers that need one wrap this future.
    pub async fn make_request<F, Fut>(&self, issue: F) -> Result<PortalResponse>
    where
        F: FnOnce(Handle) -> Fut + Send,
        Fut: Future<Output = Result<()>> + Send,
    {
        let request = self.request_handle()?;
        let mut subscription = self.bus.listen_for_response(&request.path).await?;
        tracing::debug!("Waiting for portal response on {}", request.path);

        issue(request.clone()).await?;

        let response = subscription
            .next_response()
            .await
            .ok_or_else(|| anyhow!("Response stream for {} ended early", request.path))?;
        drop(subscription);

        if response.code != 0 {
            return Err(BackendError::PortalRequest {
                code: response.code,
            }
            .into());
        }
        Ok(response)
    }
}

/// `PortalBus` over a real zbus session connection.
pub struct ZbusPortalBus {
    connection: Connection,
}

impl ZbusPortalBus {
    pub async fn connect() -> Result<Self> {
        let connection = Connection::session()
            .await
            .context("Failed to connect to the session bus")?;
        Ok(Self { connection })
    }

    pub fn from_connection(connection: Connection) -> Self {
        Self { connection }
    }

    async fn call_portal<B>(&self, interface: &str, method: &str, body: &B) -> Result<()>
    where
        B: serde::Serialize + zbus::zvariant::DynamicType,
    {
        self.connection
            .call_method(
                Some(PORTAL_BUS_NAME),
                PORTAL_OBJECT_PATH,
                Some(interface),
                method,
                body,
            )
            .await
            .with_context(|| format!("Portal call {}.{} failed", interface, method))?;
        Ok(())
    }
}

fn token_options<'a>(pairs: &[(&'static str, &'a str)]) -> HashMap<&'static str, Value<'a>> {
    pairs
        .iter()
        .map(|(key, value)| (*key, Value::from(*value)))
        .collect()
}

#[async_trait]
impl PortalBus for ZbusPortalBus {
    fn unique_name(&self) -> Option<String> {
        self.connection.unique_name().map(|name| name.to_string())
    }

    async fn listen_for_response(
        &self,
        request_path: &str,
    ) -> Result<Box<dyn ResponseSubscription>> {
        let rule = MatchRule::builder()
            .msg_type(MessageType::Signal)
            .interface(REQUEST_INTERFACE)?
            .member("Response")?
            .path(request_path.to_string())?
            .build();
        let stream = MessageStream::for_match_rule(rule, &self.connection, None)
            .await
            .with_context(|| format!("Failed to subscribe to {}", request_path))?;
        Ok(Box::new(ZbusResponseSubscription { stream }))
    }

    async fn call(&self, call: PortalCall) -> Result<()> {
        match call {
            PortalCall::CreateSession {
                interface,
                handle_token,
                session_handle_token,
            } => {
                let options = token_options(&[
                    ("handle_token", handle_token.as_str()),
                    ("session_handle_token", session_handle_token.as_str()),
                ]);
                self.call_portal(interface, "CreateSession", &(options,)).await
            }
            PortalCall::SelectDevices {
                session,
                handle_token,
                types,
            } => {
                let mut options = token_options(&[("handle_token", handle_token.as_str())]);
                options.insert("types", Value::from(types));
                let session = ObjectPath::try_from(session.as_str())?;
                self.call_portal(REMOTE_DESKTOP_INTERFACE, "SelectDevices", &(session, options))
                    .await
            }
            PortalCall::Start {
                session,
                handle_token,
            } => {
                let options = token_options(&[("handle_token", handle_token.as_str())]);
                let session = ObjectPath::try_from(session.as_str())?;
                self.call_portal(REMOTE_DESKTOP_INTERFACE, "Start", &(session, "", options))
                    .await
            }
            PortalCall::NotifyPointerMotion { session, dx, dy } => {
                let session = ObjectPath::try_from(session.as_str())?;
                let options: HashMap<&str, Value<'_>> = HashMap::new();
                self.call_portal(
                    REMOTE_DESKTOP_INTERFACE,
                    "NotifyPointerMotion",
                    &(session, options, dx, dy),
                )
                .await
            }
            PortalCall::NotifyKeyboardKeycode {
                session,
                keycode,
                state,
            } => {
                let session = ObjectPath::try_from(session.as_str())?;
                let options: HashMap<&str, Value<'_>> = HashMap::new();
                self.call_portal(
                    REMOTE_DESKTOP_INTERFACE,
                    "NotifyKeyboardKeycode",
                    &(session, options, keycode, state),
                )
                .await
            }
            PortalCall::ListShortcuts {
                session,
                handle_token,
            } => {
                let options = token_options(&[("handle_token", handle_token.as_str())]);
                let session = ObjectPath::try_from(session.as_str())?;
                self.call_portal(GLOBAL_SHORTCUTS_INTERFACE, "ListShortcuts", &(session, options))
                    .await
            }
            PortalCall::BindShortcuts {
                session,
                shortcuts,
                handle_token,
            } => {
                let shortcuts: Vec<(&str, HashMap<&str, Value<'_>>)> = shortcuts
                    .iter()
                    .map(|(id, description)| {
                        (
                            id.as_str(),
                            HashMap::from([("description", Value::from(description.as_str()))]),
                        )
                    })
                    .collect();
                let options = token_options(&[("handle_token", handle_token.as_str())]);
                let session = ObjectPath::try_from(session.as_str())?;
                self.call_portal(
                    GLOBAL_SHORTCUTS_INTERFACE,
                    "BindShortcuts",
                    &(session, shortcuts, "", options),
                )
                .await
            }
        }
    }

    async fn interface_version(&self, interface: &str) -> Result<u32> {
        let properties = zbus::fdo::PropertiesProxy::builder(&self.connection)
            .destination(PORTAL_BUS_NAME)?
            .path(PORTAL_OBJECT_PATH)?
            .build()
            .await?;
        let value = properties
            .get(InterfaceName::try_from(interface)?, "version")
            .await
            .with_context(|| format!("Failed to read the version of {}", interface))?;
        Ok(u32::try_from(value)?)
    }

    async fn shortcut_activations(&self, session: &str) -> Result<Box<dyn ActivationSubscription>> {
        let rule = MatchRule::builder()
            .msg_type(MessageType::Signal)
            .interface(GLOBAL_SHORTCUTS_INTERFACE)?
            .member("Activated")?
            .build();
        let stream = MessageStream::for_match_rule(rule, &self.connection, None)
            .await
            .context("Failed to subscribe to GlobalShortcuts.Activated")?;
        Ok(Box::new(ZbusActivationSubscription {
            stream,
            session: session.to_string(),
        }))
    }
}

struct ZbusResponseSubscription {
    stream: MessageStream,
}

#[async_trait]
impl ResponseSubscription for ZbusResponseSubscription {
    async fn next_response(&mut self) -> Option<PortalResponse> {
        while let Some(message) = self.stream.next().await {
            let message = match message {
                Ok(message) => message,
                Err(e) => {
                    tracing::warn!("Error on portal response stream: {}", e);
                    continue;
                }
            };
            match message
                .body()
                .deserialize::<(u32, HashMap<String, OwnedValue>)>()
            {
                Ok((code, results)) => return Some(PortalResponse { code, results }),
                Err(e) => tracing::warn!("Malformed portal response: {}", e),
            }
        }
        None
    }
}

struct ZbusActivationSubscription {
    stream: MessageStream,
    session: String,
}

#[async_trait]
impl ActivationSubscription for ZbusActivationSubscription {
    async fn next_activation(&mut self) -> Option<String> {
        while let Some(message) = self.stream.next().await {
            let Ok(message) = message else { continue };
            let body = message
                .body()
                .deserialize::<(OwnedObjectPath, String, u64, HashMap<String, OwnedValue>)>();
            match body {
                Ok((session, id, _timestamp, _options)) if session.as_str() == self.session => {
                    return Some(id);
                }
                Ok(_) => {}
                Err(e) => tracing::warn!("Malformed Activated signal: {}", e),
            }
        }
        None
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use std::sync::Mutex;
    use tokio::sync::mpsc;

    type Listeners = Arc<Mutex<HashMap<String, mpsc::UnboundedSender<PortalResponse>>>>;

    /// In-memory portal that answers every request call with the configured response code.
    pub struct MockPortalBus {
        pub calls: Mutex<Vec<PortalCall>>,
        listeners: Listeners,
        activations: Mutex<Option<mpsc::UnboundedSender<String>>>,
        pub response_code: Mutex<u32>,
        pub version: Option<u32>,
        pub fail_calls: bool,
    }

    impl MockPortalBus {
        pub fn new() -> Self {
            Self {
                calls: Mutex::new(Vec::new()),
                listeners: Arc::new(Mutex::new(HashMap::new())),
                activations: Mutex::new(None),
                response_code: Mutex::new(0),
                version: Some(1),
                fail_calls: false,
            }
        }

        /// A portal that is not running at all.
        pub fn unavailable() -> Self {
            Self {
                version: None,
                fail_calls: true,
                ..Self::new()
            }
        }

        pub fn calls(&self) -> Vec<PortalCall> {
            self.calls.lock().unwrap().clone()
        }

        pub fn count(&self, predicate: impl Fn(&PortalCall) -> bool) -> usize {
            self.calls.lock().unwrap().iter().filter(|c| predicate(c)).count()
        }

        pub fn listener_count(&self) -> usize {
            self.listeners.lock().unwrap().len()
        }

        /// Delivers a Response signal. Without a listener it is lost, as on a real bus.
        pub fn emit_response(&self, path: &str, response: PortalResponse) -> bool {
            match self.listeners.lock().unwrap().get(path) {
                Some(sender) => sender.send(response).is_ok(),
                None => false,
            }
        }

        pub fn activate(&self, id: &str) {
            if let Some(sender) = self.activations.lock().unwrap().as_ref() {
                let _ = sender.send(id.to_string());
            }
        }

        fn request_path(&self, token: &str) -> String {
            format!("{}/request/1_42/{}", PORTAL_OBJECT_PATH, token)
        }
    }

    struct MockSubscription {
        path: String,
        receiver: mpsc::UnboundedReceiver<PortalResponse>,
        listeners: Listeners,
    }

    impl Drop for MockSubscription {
        fn drop(&mut self) {
            self.listeners.lock().unwrap().remove(&self.path);
        }
    }

    #[async_trait]
    impl ResponseSubscription for MockSubscription {
        async fn next_response(&mut self) -> Option<PortalResponse> {
            self.receiver.recv().await
        }
    }

    struct MockActivations {
        receiver: mpsc::UnboundedReceiver<String>,
    }

    #[async_trait]
    impl ActivationSubscription for MockActivations {
        async fn next_activation(&mut self) -> Option<String> {
            self.receiver.recv().await
        }
    }

    #[async_trait]
    impl PortalBus for MockPortalBus {
        fn unique_name(&self) -> Option<String> {
            Some(":1.42".to_string())
        }

        async fn listen_for_response(
            &self,
            request_path: &str,
        ) -> Result<Box<dyn ResponseSubscription>> {
            let (sender, receiver) = mpsc::unbounded_channel();
            self.listeners
                .lock()
                .unwrap()
                .insert(request_path.to_string(), sender);
            Ok(Box::new(MockSubscription {
                path: request_path.to_string(),
                receiver,
                listeners: self.listeners.clone(),
            }))
        }

        async fn call(&self, call: PortalCall) -> Result<()> {
            // Let concurrent callers interleave, as a real round trip would.
            tokio::task::yield_now().await;
            self.calls.lock().unwrap().push(call.clone());
            if self.fail_calls {
                anyhow::bail!("org.freedesktop.DBus.Error.ServiceUnknown");
            }

            // Answer in the same tick as the call.
            if let Some(token) = call.handle_token() {
                let code = *self.response_code.lock().unwrap();
                self.emit_response(
                    &self.request_path(token),
                    PortalResponse {
                        code,
                        results: HashMap::new(),
                    },
                );
            }
            Ok(())
        }

        async fn interface_version(&self, interface: &str) -> Result<u32> {
            self.version
                .ok_or_else(|| anyhow!("No such interface '{}'", interface))
        }

        async fn shortcut_activations(
            &self,
            _session: &str,
        ) -> Result<Box<dyn ActivationSubscription>> {
            let (sender, receiver) = mpsc::unbounded_channel();
            *self.activations.lock().unwrap() = Some(sender);
            Ok(Box::new(MockActivations { receiver }))
        }
    }
}
