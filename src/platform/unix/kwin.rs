// ABOUTME: KWin scripting client: writes small JS files, loads them into KWin and waits for callbacks
// ABOUTME: Scripts report window info and shortcut triggers back through a D-Bus object we export

use crate::error::BackendError;
use crate::platform::unix::cli::host_command;
use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{Mutex as TokioMutex, oneshot};
use zbus::Connection;

const KWIN_BUS_NAME: &str = "org.kde.KWin";
const SCRIPTING_PATH: &str = "/Scripting";
const SCRIPTING_INTERFACE: &str = "org.kde.kwin.Scripting";
const SCRIPT_INTERFACE: &str = "org.kde.kwin.Script";

/// Interface name of the object scripts call back into.
pub const CALLBACK_INTERFACE: &str = "io.github.PieBackend";

/// Load/run/stop control over the compositor's script engine.
#[async_trait]
pub trait ScriptHost: Send + Sync {
    async fn load(&self, path: &Path) -> Result<i32>;
    async fn run(&self, id: i32) -> Result<()>;
    async fn stop(&self, id: i32) -> Result<()>;
}

/// `ScriptHost` backed by KWin's `org.kde.kwin.Scripting` D-Bus API.
pub struct KwinScriptHost {
    connection: Connection,
    major_version: u32,
}

impl KwinScriptHost {
    pub fn new(connection: Connection, major_version: u32) -> Self {
        Self {
            connection,
            major_version,
        }
    }

    fn script_object_path(&self, id: i32) -> String {
        if self.major_version >= 6 {
            format!("/Scripting/Script{}", id)
        } else {
            format!("/{}", id)
        }
    }

    async fn call_script(&self, id: i32, method: &str) -> Result<()> {
        let path = self.script_object_path(id);
        self.connection
            .call_method(Some(KWIN_BUS_NAME), path.as_str(), Some(SCRIPT_INTERFACE), method, &())
            .await
            .with_context(|| format!("Failed to {} KWin script {}", method, id))?;
        Ok(())
    }
}

#[async_trait]
impl ScriptHost for KwinScriptHost {
    async fn load(&self, path: &Path) -> Result<i32> {
        let path = path.to_string_lossy().into_owned();
        let reply = self
            .connection
            .call_method(
                Some(KWIN_BUS_NAME),
                SCRIPTING_PATH,
                Some(SCRIPTING_INTERFACE),
                "loadScript",
                &(path.as_str(),),
            )
            .await
            .with_context(|| format!("Failed to load KWin script {}", path))?;
        let id: i32 = reply.body().deserialize()?;
        if id < 0 {
            return Err(anyhow!("KWin refused to load script {}", path));
        }
        tracing::debug!("Loaded KWin script {} as {}", path, id);
        Ok(id)
    }

    async fn run(&self, id: i32) -> Result<()> {
        self.call_script(id, "run").await
    }

    async fn stop(&self, id: i32) -> Result<()> {
        self.call_script(id, "stop").await
    }
}

/// Parses the major version from `kwin_wayland --version` output such as `kwin 6.0.5`.
pub fn parse_kwin_major_version(output: &str) -> Option<u32> {
    output
        .split_whitespace()
        .nth(1)?
        .split('.')
        .next()?
        .parse()
        .ok()
}

/// Asks the host's `kwin_wayland` for its major version, assuming 6 if that fails.
pub async fn detect_kwin_major_version() -> u32 {
    let output = host_command("kwin_wayland", &["--version"]).output().await;
    match output {
        Ok(output) if output.status.success() => {
            let text = String::from_utf8_lossy(&output.stdout);
            parse_kwin_major_version(&text).unwrap_or_else(|| {
                tracing::warn!("Unexpected kwin_wayland --version output: {}", text.trim());
                6
            })
        }
        Ok(output) => {
            tracing::warn!("kwin_wayland --version exited with {}", output.status);
            6
        }
        Err(e) => {
            tracing::warn!("Failed to run kwin_wayland --version: {}", e);
            6
        }
    }
}

/// What the query script reports back.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScriptWmInfo {
    pub window_name: String,
    pub app_name: String,
    pub pointer_x: i32,
    pub pointer_y: i32,
}

pub type TriggerHandler = Arc<dyn Fn(String) + Send + Sync>;

/// Dispatch point for calls arriving from running scripts.
#[derive(Default)]
pub struct ScriptCallbacks {
    pending_query: Mutex<Option<oneshot::Sender<ScriptWmInfo>>>,
    trigger_handler: Mutex<Option<TriggerHandler>>,
}

impl ScriptCallbacks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Arms the slot for the next window-info report.
    pub fn expect_wm_info(&self) -> oneshot::Receiver<ScriptWmInfo> {
        let (sender, receiver) = oneshot::channel();
        *self.pending_query.lock().unwrap_or_else(|p| p.into_inner()) = Some(sender);
        receiver
    }

    pub fn report_wm_info(&self, info: ScriptWmInfo) {
        let sender = self
            .pending_query
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .take();
        match sender {
            Some(sender) => {
                let _ = sender.send(info);
            }
            None => tracing::debug!("Dropping window info nobody asked for"),
        }
    }

    pub fn set_trigger_handler(&self, handler: TriggerHandler) {
        *self.trigger_handler.lock().unwrap_or_else(|p| p.into_inner()) = Some(handler);
    }

    pub fn report_trigger(&self, id: String) {
        let handler = self
            .trigger_handler
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .clone();
        if let Some(handler) = handler {
            handler(id);
        }
    }
}

/// The D-Bus object scripts call via `callDBus`.
struct CallbackService {
    callbacks: Arc<ScriptCallbacks>,
}

#[zbus::interface(name = "io.github.PieBackend")]
impl CallbackService {
    #[zbus(name = "sendWMInfo")]
    async fn send_wm_info(&self, window_name: String, app_name: String, pointer_x: i32, pointer_y: i32) {
        self.callbacks.report_wm_info(ScriptWmInfo {
            window_name,
            app_name,
            pointer_x,
            pointer_y,
        });
    }

    #[zbus(name = "trigger")]
    async fn trigger(&self, shortcut_id: String) {
        self.callbacks.report_trigger(shortcut_id);
    }
}

/// Exports the callback object and claims `bus_name` so scripts can reach it.
pub async fn serve_callbacks(
    connection: &Connection,
    bus_name: &str,
    object_path: &str,
    callbacks: Arc<ScriptCallbacks>,
) -> Result<()> {
    connection
        .object_server()
        .at(object_path, CallbackService { callbacks })
        .await
        .with_context(|| format!("Failed to export {}", object_path))?;
    connection
        .request_name(bus_name)
        .await
        .with_context(|| format!("Failed to own bus name {}", bus_name))?;
    Ok(())
}

#[derive(Debug, Clone)]
pub struct ScriptSettings {
    pub script_dir: PathBuf,
    pub bus_name: String,
    pub object_path: String,
    pub kwin_major_version: u32,
    pub query_timeout: Duration,
    /// Prefix for shortcut names shown in KDE's settings.
    pub app_name: String,
}

#[derive(Default)]
struct ShortcutScript {
    // id -> description
    desired: BTreeMap<String, String>,
    running: Option<i32>,
}

pub struct ScriptingClient {
    host: Arc<dyn ScriptHost>,
    callbacks: Arc<ScriptCallbacks>,
    settings: ScriptSettings,
    query_lock: TokioMutex<()>,
    shortcuts: TokioMutex<ShortcutScript>,
}

impl ScriptingClient {
    pub fn new(host: Arc<dyn ScriptHost>, callbacks: Arc<ScriptCallbacks>, settings: ScriptSettings) -> Self {
        Self {
            host,
            callbacks,
            settings,
            query_lock: TokioMutex::new(()),
            shortcuts: TokioMutex::new(ShortcutScript::default()),
        }
    }

    pub fn callbacks(&self) -> &Arc<ScriptCallbacks> {
        &self.callbacks
    }

    fn store_script(&self, name: &str, body: &str) -> Result<PathBuf> {
        fs::create_dir_all(&self.settings.script_dir).with_context(|| {
            format!("Failed to create script directory: {}", self.settings.script_dir.display())
        })?;
        let path = self.settings.script_dir.join(name);
        fs::write(&path, body)
            .with_context(|| format!("Failed to write script: {}", path.display()))?;
        Ok(path)
    }

    fn call_dbus(&self, method: &str, args: &str) -> String {
        format!(
            "callDBus('{}', '{}', '{}', '{}', {})",
            escape_js(&self.settings.bus_name),
            escape_js(&self.settings.object_path),
            CALLBACK_INTERFACE,
            method,
            args
        )
    }

    fn wm_info_script(&self) -> String {
        let window = if self.settings.kwin_major_version >= 6 {
            "workspace.activeWindow"
        } else {
            "workspace.activeClient"
        };
        let args = format!(
            "{w} ? {w}.caption : '', {w} ? {w}.resourceClass : '', workspace.cursorPos.x, workspace.cursorPos.y",
            w = window
        );
        format!("{};\n", self.call_dbus("sendWMInfo", &args))
    }

    fn shortcut_script(&self, desired: &BTreeMap<String, String>) -> String {
        desired
            .iter()
            .map(|(id, description)| {
                let id = escape_js(id);
                let title = escape_js(&format!("{} - {}", self.settings.app_name, description));
                format!(
                    "if (!registerShortcut('{id}', '{title}', '', () => {{ {call}; }})) {{\n  console.log('Failed to register shortcut {id}');\n}}\n",
                    id = id,
                    title = title,
                    call = self.call_dbus("trigger", &format!("'{}'", id)),
                )
            })
            .collect()
    }

    /// Runs the query script and waits for its report.
    ///
    /// The script is always stopped afterwards, whether the report arrived or not.
    pub async fn query_wm_info(&self) -> Result<ScriptWmInfo> {
        let _guard = self.query_lock.lock().await;

        let path = self.store_script("get-wm-info.js", &self.wm_info_script())?;
        let receiver = self.callbacks.expect_wm_info();
        let id = self.host.load(&path).await?;

        let outcome = self.run_and_wait(id, receiver).await;
        if let Err(e) = self.host.stop(id).await {
            tracing::warn!("Failed to stop KWin query script {}: {:#}", id, e);
        }
        outcome
    }

    async fn run_and_wait(&self, id: i32, receiver: oneshot::Receiver<ScriptWmInfo>) -> Result<ScriptWmInfo> {
        self.host.run(id).await?;
        match tokio::time::timeout(self.settings.query_timeout, receiver).await {
            Ok(Ok(info)) => Ok(info),
            Ok(Err(_)) => Err(anyhow!("Window info request was superseded")),
            Err(_) => Err(BackendError::ScriptTimeout {
                millis: self.settings.query_timeout.as_millis() as u64,
            }
            .into()),
        }
    }

    pub async fn bind_shortcut(&self, id: &str, description: &str) -> Result<()> {
        let mut script = self.shortcuts.lock().await;
        let previous = script.desired.clone();
        script.desired.insert(id.to_string(), description.to_string());
        self.apply(&mut script, previous).await
    }

    pub async fn unbind_shortcut(&self, id: &str) -> Result<()> {
        let mut script = self.shortcuts.lock().await;
        let previous = script.desired.clone();
        if script.desired.remove(id).is_none() {
            return Ok(());
        }
        self.apply(&mut script, previous).await
    }

    pub async fn unbind_all_shortcuts(&self) -> Result<()> {
        let mut script = self.shortcuts.lock().await;
        if script.desired.is_empty() && script.running.is_none() {
            return Ok(());
        }
        let previous = std::mem::take(&mut script.desired);
        self.apply(&mut script, previous).await
    }

    /// Reloads the registration script. On failure `desired` goes back to `previous`, and
    /// if the old script was already stopped it is started again.
    async fn apply(&self, script: &mut ShortcutScript, previous: BTreeMap<String, String>) -> Result<()> {
        let Err(e) = self.reload(script).await else {
            return Ok(());
        };
        script.desired = previous;
        if script.running.is_none() && !script.desired.is_empty() {
            if let Err(restore) = self.reload(script).await {
                tracing::warn!("Failed to restore the previous KWin shortcut script: {:#}", restore);
            }
        }
        Err(e)
    }

    /// Id of the running registration script, if any.
    pub async fn running_script(&self) -> Option<i32> {
        self.shortcuts.lock().await.running
    }

    async fn reload(&self, script: &mut ShortcutScript) -> Result<()> {
        if let Some(old) = script.running {
            self.host.stop(old).await?;
            script.running = None;
        }
        if script.desired.is_empty() {
            return Ok(());
        }

        let path = self.store_script("global-shortcuts.js", &self.shortcut_script(&script.desired))?;
        let id = self.host.load(&path).await?;
        if let Err(e) = self.host.run(id).await {
            let _ = self.host.stop(id).await;
            return Err(e);
        }
        script.running = Some(id);
        tracing::debug!("Shortcut script {} registers {} shortcuts", id, script.desired.len());
        Ok(())
    }
}

/// Escapes text for a single-quoted JavaScript string.
fn escape_js(text: &str) -> String {
    text.replace('\\', "\\\\")
        .replace('\'', "\\'")
        .replace('\n', "\\n")
        .replace('\r', "\\r")
        .replace('\u{2028}', "\\u2028")
        .replace('\u{2029}', "\\u2029")
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;

    /// Records calls and reports whatever `respond` returns when a script is run.
    #[derive(Default)]
    pub struct MockScriptHost {
        pub loaded: Mutex<Vec<(i32, String)>>,
        pub running: Mutex<Vec<i32>>,
        pub stops: Mutex<Vec<i32>>,
        next_id: Mutex<i32>,
        callbacks: Option<Arc<ScriptCallbacks>>,
        respond: Option<ScriptWmInfo>,
        failing_loads: Mutex<u32>,
        failing_stops: Mutex<u32>,
    }
    impl MockScriptHost {
        /// A host whose query scripts never call back.
        pub fn silent() -> Self {
            Self::default()
        }

        /// A host whose query scripts immediately report `info`.
        pub fn responding(callbacks: Arc<ScriptCallbacks>, info: ScriptWmInfo) -> Self {
            Self {
                callbacks: Some(callbacks),
                respond: Some(info),
                ..Self::default()
            }
        }

        /// Makes the next `load` call fail.
        pub fn fail_next_load(&self) {
            *self.failing_loads.lock().unwrap() += 1;
        }

        /// Makes the next `stop` call fail without stopping anything.
        pub fn fail_next_stop(&self) {
            *self.failing_stops.lock().unwrap() += 1;
        }

        pub fn stop_count(&self) -> usize {
            self.stops.lock().unwrap().len()
        }

        pub fn running(&self) -> Vec<i32> {
            self.running.lock().unwrap().clone()
        }

        pub fn last_script(&self) -> Option<String> {
            self.loaded.lock().unwrap().last().map(|(_, body)| body.clone())
        }
    }

    #[async_trait]
    impl ScriptHost for MockScriptHost {
        async fn load(&self, path: &Path) -> Result<i32> {
            if take_failure(&self.failing_loads) {
                return Err(anyhow!("loadScript failed"));
            }
            let body = fs::read_to_string(path)?;
            let mut next = self.next_id.lock().unwrap();
            *next += 1;
            self.loaded.lock().unwrap().push((*next, body));
            Ok(*next)
        }

        async fn run(&self, id: i32) -> Result<()> {
            self.running.lock().unwrap().push(id);
            let body = self
                .loaded
                .lock()
                .unwrap()
                .iter()
                .find(|(loaded, _)| *loaded == id)
                .map(|(_, body)| body.clone())
                .unwrap_or_default();
            if body.contains("sendWMInfo") {
                if let (Some(callbacks), Some(info)) = (&self.callbacks, &self.respond) {
                    callbacks.report_wm_info(info.clone());
                }
            }
            Ok(())
        }

        async fn stop(&self, id: i32) -> Result<()> {
            if take_failure(&self.failing_stops) {
                return Err(anyhow!("stop failed for script {}", id));
            }
            self.stops.lock().unwrap().push(id);
            self.running.lock().unwrap().retain(|running| *running != id);
            Ok(())
        }
    }

    fn take_failure(counter: &Mutex<u32>) -> bool {
        let mut remaining = counter.lock().unwrap();
        if *remaining == 0 {
            return false;
        }
        *remaining -= 1;
        true
    }

    pub fn settings(dir: &Path) -> ScriptSettings {
        ScriptSettings {
            script_dir: dir.to_path_buf(),
            bus_name: "io.github.PieBackend".to_string(),
            object_path: "/io/github/PieBackend".to_string(),
            kwin_major_version: 6,
            query_timeout: Duration::from_millis(1000),
            app_name: "Pie Backend".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::{MockScriptHost, settings};
    use super::*;
    use crate::error::backend_error;
    use tempfile::TempDir;

    fn client(host: Arc<MockScriptHost>, callbacks: Arc<ScriptCallbacks>, dir: &TempDir) -> ScriptingClient {
        ScriptingClient::new(host, callbacks, settings(dir.path()))
    }

    #[test]
    fn test_parse_kwin_version() {
        assert_eq!(parse_kwin_major_version("kwin 6.0.5\n"), Some(6));
        assert_eq!(parse_kwin_major_version("kwin 5.27.11"), Some(5));
        assert_eq!(parse_kwin_major_version("garbage"), None);
    }

    #[test]
    fn test_escape_js() {
        assert_eq!(escape_js(r"it's a\b"), r"it\'s a\\b");
        assert_eq!(escape_js("a\r\nb"), r"a\r\nb");
        assert_eq!(escape_js("x\u{2028}y\u{2029}"), r"x\u2028y\u2029");
    }

    #[tokio::test(start_paused = true)]
    async fn test_query_timeout_stops_script_once() {
        let dir = TempDir::new().unwrap();
        let host = Arc::new(MockScriptHost::silent());
        let client = client(host.clone(), Arc::new(ScriptCallbacks::new()), &dir);

        let error = client.query_wm_info().await.unwrap_err();

        assert_eq!(
            backend_error(&error),
            Some(&BackendError::ScriptTimeout { millis: 1000 })
        );
        assert_eq!(host.stop_count(), 1);
        assert!(host.running().is_empty());
    }

    #[tokio::test]
    async fn test_query_returns_reported_info() {
        let dir = TempDir::new().unwrap();
        let callbacks = Arc::new(ScriptCallbacks::new());
        let info = ScriptWmInfo {
            window_name: "Konsole".to_string(),
            app_name: "org.kde.konsole".to_string(),
            pointer_x: 10,
            pointer_y: 20,
        };
        let host = Arc::new(MockScriptHost::responding(callbacks.clone(), info.clone()));
        let client = client(host.clone(), callbacks, &dir);

        assert_eq!(client.query_wm_info().await.unwrap(), info);
        assert_eq!(host.stop_count(), 1);

        let script = host.last_script().unwrap();
        assert!(script.contains("workspace.activeWindow"));
        assert!(script.contains("'sendWMInfo'"));
    }

    #[tokio::test]
    async fn test_kwin5_query_uses_active_client() {
        let dir = TempDir::new().unwrap();
        let mut settings = settings(dir.path());
        settings.kwin_major_version = 5;
        let client = ScriptingClient::new(
            Arc::new(MockScriptHost::silent()),
            Arc::new(ScriptCallbacks::new()),
            settings,
        );
        assert!(client.wm_info_script().contains("workspace.activeClient"));
    }

    #[tokio::test]
    async fn test_bind_then_unbind_leaves_no_script() {
        let dir = TempDir::new().unwrap();
        let host = Arc::new(MockScriptHost::silent());
        let client = client(host.clone(), Arc::new(ScriptCallbacks::new()), &dir);

        client.bind_shortcut("menu-1", "Open menu 1").await.unwrap();
        assert_eq!(host.running().len(), 1);

        client.unbind_shortcut("menu-1").await.unwrap();
        assert!(host.running().is_empty());
        assert!(client.running_script().await.is_none());
    }

    #[tokio::test]
    async fn test_each_change_regenerates_the_script() {
        let dir = TempDir::new().unwrap();
        let host = Arc::new(MockScriptHost::silent());
        let client = client(host.clone(), Arc::new(ScriptCallbacks::new()), &dir);

        client.bind_shortcut("a", "First").await.unwrap();
        client.bind_shortcut("it's", "Second").await.unwrap();

        let script = host.last_script().unwrap();
        assert!(script.contains("registerShortcut('a', 'Pie Backend - First'"));
        assert!(script.contains(r"registerShortcut('it\'s'"));
        assert_eq!(host.running().len(), 1);
        assert_eq!(host.stop_count(), 1);

        client.unbind_all_shortcuts().await.unwrap();
        assert!(host.running().is_empty());

        // Nothing bound, nothing to do.
        client.unbind_all_shortcuts().await.unwrap();
        assert_eq!(host.stop_count(), 2);
    }

    #[tokio::test]
    async fn test_failed_bind_is_not_registered_later() {
        let dir = TempDir::new().unwrap();
        let host = Arc::new(MockScriptHost::silent());
        let client = client(host.clone(), Arc::new(ScriptCallbacks::new()), &dir);

        client.bind_shortcut("menu-1", "First").await.unwrap();
        host.fail_next_load();
        assert!(client.bind_shortcut("menu-2", "Second").await.is_err());

        // The previous set is running again.
        assert_eq!(host.running().len(), 1);
        let script = host.last_script().unwrap();
        assert!(script.contains("'menu-1'"));
        assert!(!script.contains("'menu-2'"));

        client.bind_shortcut("menu-3", "Third").await.unwrap();
        let script = host.last_script().unwrap();
        assert!(script.contains("'menu-1'"));
        assert!(script.contains("'menu-3'"));
        assert!(!script.contains("'menu-2'"));
    }

    #[tokio::test]
    async fn test_failed_stop_keeps_tracking_the_running_script() {
        let dir = TempDir::new().unwrap();
        let host = Arc::new(MockScriptHost::silent());
        let client = client(host.clone(), Arc::new(ScriptCallbacks::new()), &dir);

        client.bind_shortcut("a", "First").await.unwrap();
        let first = client.running_script().await;
        assert!(first.is_some());

        host.fail_next_stop();
        assert!(client.bind_shortcut("b", "Second").await.is_err());
        assert_eq!(client.running_script().await, first);
        assert_eq!(host.running(), vec![first.unwrap()]);

        client.bind_shortcut("b", "Second").await.unwrap();
        let running = host.running();
        assert_eq!(running.len(), 1);
        assert_ne!(Some(running[0]), first);
        assert!(host.last_script().unwrap().contains("'b'"));
    }

    #[test]
    fn test_trigger_reaches_handler() {
        let callbacks = ScriptCallbacks::new();
        let (sender, receiver) = std::sync::mpsc::channel();
        callbacks.set_trigger_handler(Arc::new(move |id| {
            let _ = sender.send(id);
        }));

        callbacks.report_trigger("menu-1".to_string());
        assert_eq!(receiver.recv().unwrap(), "menu-1");
    }
}
