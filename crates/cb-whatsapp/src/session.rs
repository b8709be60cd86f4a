//! WhatsApp session management
//!
//! The protocol connection itself lives in the sidecar. This module owns the
//! lifecycle policy for the single configured session: request a connection,
//! surface pairing QR codes, track state, and reconnect unless logged out.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::watch;
use tracing::{debug, info, warn};

use cb_core::WhatsAppConfig;

use crate::error::{Result, WhatsAppError};
use crate::events::{next_backoff, INITIAL_BACKOFF_MS};
use crate::qr::show_qr;
use crate::sidecar::SidecarClient;
use crate::types::{ConnectionState, InboundMessage, SessionEvent, SessionStatus};

/// What both relays need from a messaging session
#[async_trait]
pub trait MessagingSession: Send + Sync {
    /// Identifier of the session
    fn session_id(&self) -> &str;

    /// Current connection state
    fn state(&self) -> ConnectionState;

    /// When the current state was entered, if tracked
    fn state_since(&self) -> Option<DateTime<Utc>> {
        None
    }

    /// Whether messages can be sent right now
    fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Open
    }

    /// Send a text message to a chat (one attempt)
    async fn send_text(&self, to: &str, text: &str) -> Result<()>;
}

/// Connection state with the time it was entered
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StateSnapshot {
    pub state: ConnectionState,
    pub since: DateTime<Utc>,
}

impl StateSnapshot {
    fn now(state: ConnectionState) -> Self {
        Self {
            state,
            since: Utc::now(),
        }
    }
}

/// Follow-up work a session event asks of the dispatcher
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionAction {
    /// Hand the message to the inbound relay
    Relay(InboundMessage),
    /// The connection dropped and should be re-opened
    Reconnect,
}

struct InProgress<'a>(&'a AtomicBool);

impl Drop for InProgress<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// The bridge's WhatsApp session, driven through the sidecar
pub struct WhatsAppSession {
    sidecar: SidecarClient,
    auth_dir: String,
    state: watch::Sender<StateSnapshot>,
    connecting: AtomicBool,
}

impl WhatsAppSession {
    /// Create a session from configuration
    pub fn new(config: &WhatsAppConfig) -> Result<Self> {
        if config.session_id.trim().is_empty() {
            return Err(WhatsAppError::Config("session id must not be empty".to_string()));
        }
        let sidecar = SidecarClient::new(&config.sidecar_url, &config.session_id)?;
        Ok(Self::with_sidecar(sidecar, config.auth_dir()))
    }

    /// Create a session around an existing sidecar client
    pub fn with_sidecar(sidecar: SidecarClient, auth_dir: impl Into<String>) -> Self {
        let (state, _) = watch::channel(StateSnapshot::now(ConnectionState::Connecting));
        Self {
            sidecar,
            auth_dir: auth_dir.into(),
            state,
            connecting: AtomicBool::new(false),
        }
    }

    /// The sidecar client this session uses
    pub fn sidecar(&self) -> &SidecarClient {
        &self.sidecar
    }

    /// Watch state changes
    pub fn subscribe(&self) -> watch::Receiver<StateSnapshot> {
        self.state.subscribe()
    }

    fn set_state(&self, state: ConnectionState) {
        self.state.send_if_modified(|current| {
            if current.state == state {
                return false;
            }
            *current = StateSnapshot::now(state);
            true
        });
    }

    /// Ask the sidecar to open the session with this bridge's credential directory
    pub async fn connect(&self) -> Result<()> {
        self.set_state(ConnectionState::Connecting);
        let status = self.sidecar.connect(&self.auth_dir).await?;
        self.apply_status(&status);
        Ok(())
    }

    /// Request a connection until the sidecar accepts one.
    ///
    /// Covers a sidecar that comes up after the bridge, and a reconnect
    /// request that fails. Returns immediately if another call is already
    /// in flight, and gives up once the session is logged out.
    pub async fn connect_until_accepted(&self) {
        if self.connecting.swap(true, Ordering::SeqCst) {
            debug!("connect already in progress for {}", self.session_id());
            return;
        }
        // Cleared on every exit, including task abort
        let _in_progress = InProgress(&self.connecting);

        let mut backoff_ms = INITIAL_BACKOFF_MS;
        loop {
            match self.connect().await {
                Ok(()) => break,
                Err(e) => {
                    if self.state() == ConnectionState::LoggedOut {
                        break;
                    }
                    self.set_state(ConnectionState::Closed);
                    warn!(error = %e, backoff_ms, "connect request failed, retrying");
                    tokio::time::sleep(Duration::from_millis(backoff_ms)).await;
                    backoff_ms = next_backoff(backoff_ms);
                }
            }
        }
    }

    fn apply_status(&self, status: &SessionStatus) {
        if let Some(code) = &status.qr {
            show_qr(code);
        }
        if status.state == ConnectionState::Open {
            info!("WhatsApp connected: {}", self.session_id());
        }
        self.set_state(status.state);
    }

    /// Apply a lifecycle event.
    ///
    /// State changes happen here; anything that needs network work or the
    /// relay is returned to the caller so the event loop never blocks on it.
    pub fn handle_event(&self, event: SessionEvent) -> Option<SessionAction> {
        match event {
            SessionEvent::Qr { code } => {
                show_qr(&code);
                self.set_state(ConnectionState::AwaitingQr);
                None
            }
            SessionEvent::Connected => {
                self.set_state(ConnectionState::Open);
                info!("WhatsApp connected: {}", self.session_id());
                None
            }
            SessionEvent::Disconnected { reason, logged_out } => {
                let should_reconnect = !logged_out;
                info!(
                    reason = reason.as_deref().unwrap_or("unknown"),
                    "Connection closed. Reconnecting... {}", should_reconnect
                );

                if logged_out {
                    self.set_state(ConnectionState::LoggedOut);
                    warn!(
                        "Session {} was logged out; remove {} and restart to pair again",
                        self.session_id(),
                        self.auth_dir
                    );
                    None
                } else {
                    self.set_state(ConnectionState::Closed);
                    Some(SessionAction::Reconnect)
                }
            }
            SessionEvent::Message(message) => Some(SessionAction::Relay(message)),
        }
    }
}

#[async_trait]
impl MessagingSession for WhatsAppSession {
    fn session_id(&self) -> &str {
        self.sidecar.session_id()
    }

    fn state(&self) -> ConnectionState {
        self.state.borrow().state
    }

    fn state_since(&self) -> Option<DateTime<Utc>> {
        Some(self.state.borrow().since)
    }

    async fn send_text(&self, to: &str, text: &str) -> Result<()> {
        self.sidecar.send_text(to, text).await?;
        Ok(())
    }
}
