// ABOUTME: RemoteDesktop portal client used to inject pointer motion and key presses
// ABOUTME: The session is created on first use, once, even when several callers race for it

use super::{PortalBus, PortalCall, REMOTE_DESKTOP_INTERFACE, RequestCorrelator};
use crate::error::BackendError;
use anyhow::Result;
use std::sync::Arc;
use tokio::sync::OnceCell;

// Device types bitmask: 1 = keyboard, 2 = pointer.
const DEVICE_TYPES: u32 = 1 | 2;

// Keycodes handed to this client are X11 keycodes; the portal expects evdev codes.
const X11_KEYCODE_OFFSET: i32 = 8;

pub struct RemoteDesktop {
    correlator: RequestCorrelator,
    // Holds the session path, or the message of the attempt that failed.
    session: OnceCell<std::result::Result<String, String>>,
}

impl RemoteDesktop {
    pub fn new(bus: Arc<dyn PortalBus>, app_id: &str) -> Self {
        Self {
            correlator: RequestCorrelator::new(bus, app_id),
            session: OnceCell::new(),
        }
    }

    /// Creates, configures and starts the session on first call. Later and concurrent
    /// callers share that one attempt. A failure is final for the life of the process.
    pub async fn connect(&self) -> Result<String> {
        let outcome = self
            .session
            .get_or_init(|| async {
                match self.open_session().await {
                    Ok(path) => {
                        tracing::info!("Remote desktop session started at {}", path);
                        Ok(path)
                    }
                    Err(e) => {
                        tracing::error!("Failed to start remote desktop session: {:#}", e);
                        Err(format!("{:#}", e))
                    }
                }
            })
            .await;

        match outcome {
            Ok(path) => Ok(path.clone()),
            Err(message) => Err(BackendError::PortalUnavailable(message.clone()).into()),
        }
    }

    async fn open_session(&self) -> Result<String> {
        let bus = self.correlator.bus().clone();
        let session = self.correlator.session_handle()?;

        let session_token = session.token.clone();
        let create = bus.clone();
        let response = self
            .correlator
            .make_request(move |request| async move {
                create
                    .call(PortalCall::CreateSession {
                        interface: REMOTE_DESKTOP_INTERFACE,
                        handle_token: request.token,
                        session_handle_token: session_token,
                    })
                    .await
            })
            .await?;
        let session_path = response
            .string_result("session_handle")
            .unwrap_or(session.path);

        let select = bus.clone();
        let path = session_path.clone();
        self.correlator
            .make_request(move |request| async move {
                select
                    .call(PortalCall::SelectDevices {
                        session: path,
                        handle_token: request.token,
                        types: DEVICE_TYPES,
                    })
                    .await
            })
            .await?;

        let start = bus.clone();
        let path = session_path.clone();
        self.correlator
            .make_request(move |request| async move {
                start
                    .call(PortalCall::Start {
                        session: path,
                        handle_token: request.token,
                    })
                    .await
            })
            .await?;

        Ok(session_path)
    }

    pub async fn move_pointer(&self, dx: i32, dy: i32) -> Result<()> {
        let session = self.connect().await?;
        self.correlator
            .bus()
            .call(PortalCall::NotifyPointerMotion {
                session,
                dx: f64::from(dx),
                dy: f64::from(dy),
            })
            .await
    }

    /// Presses or releases an X11 keycode.
    pub async fn simulate_key(&self, keycode: u32, down: bool) -> Result<()> {
        let session = self.connect().await?;
        self.correlator
            .bus()
            .call(PortalCall::NotifyKeyboardKeycode {
                session,
                keycode: keycode as i32 - X11_KEYCODE_OFFSET,
                state: u32::from(down),
            })
            .await
    }
}
