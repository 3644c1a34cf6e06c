//! Connection management and reload coordination.
//!
//! A single task owns the tracked agent connection and the throttle state and
//! consumes every event that can touch them: new connections, inbound frames,
//! build-completed triggers and backoff completions. Nothing outside this task
//! mutates that state, so transitions never interleave.

use tokio::sync::mpsc;
use tokio::time::{Duration, Instant};

use relo_protocol::{AgentMessage, ReloadCommand};

use crate::throttle::{BACKOFF_SECS, LinkState, ReloadDecision, ReloadThrottle};

/// Capacity of the manager's event channel.
const EVENT_CHANNEL_SIZE: usize = 32;

/// Capacity of a connection's outbound frame channel.
const OUTBOUND_CHANNEL_SIZE: usize = 16;

/// Events consumed by the manager task.
#[derive(Debug)]
pub(crate) enum ManagerEvent {
    /// A new agent connection was accepted.
    Connected(ConnectionHandle),
    /// A text frame arrived from the connected agent.
    Inbound(String),
    /// The build pipeline finished a build.
    BuildCompleted,
    /// The backoff countdown ran out.
    BackoffFinished,
}

/// Write half of the tracked agent connection.
///
/// The socket task holds the matching receiver; once it exits, the sender
/// reports closed and the connection counts as lost.
#[derive(Debug)]
pub(crate) struct ConnectionHandle {
    outbound: mpsc::Sender<String>,
}

impl ConnectionHandle {
    /// Create the handle plus the receiver the socket task pumps from.
    pub(crate) fn new() -> (Self, mpsc::Receiver<String>) {
        let (outbound, rx) = mpsc::channel(OUTBOUND_CHANNEL_SIZE);
        (Self { outbound }, rx)
    }

    fn is_open(&self) -> bool {
        !self.outbound.is_closed()
    }

    fn send(&self, frame: String) -> bool {
        self.outbound.try_send(frame).is_ok()
    }
}

/// Owner of the tracked connection and throttle state.
pub(crate) struct ConnectionManager {
    events: mpsc::Receiver<ManagerEvent>,
    /// Handle for tasks that report back into this manager (backoff countdown).
    self_tx: mpsc::Sender<ManagerEvent>,
    /// The single tracked connection; replaced wholesale on every new one.
    connection: Option<ConnectionHandle>,
    /// Display name the agent announced.
    peer_name: Option<String>,
    /// Whether the handshake has been consumed. Transitions exactly once per
    /// manager lifetime, regardless of connection replacement.
    has_seen_first_contact: bool,
    throttle: ReloadThrottle,
    /// A request was redirected into backoff and is owed one retry.
    retry_pending: bool,
    /// Command kind sent on every trigger.
    command: ReloadCommand,
}

impl ConnectionManager {
    /// Create a manager and the sender used to feed it events.
    pub(crate) fn new(command: ReloadCommand) -> (Self, mpsc::Sender<ManagerEvent>) {
        let (tx, rx) = mpsc::channel(EVENT_CHANNEL_SIZE);
        let manager = Self {
            events: rx,
            self_tx: tx.clone(),
            connection: None,
            peer_name: None,
            has_seen_first_contact: false,
            throttle: ReloadThrottle::new(),
            retry_pending: false,
            command,
        };
        (manager, tx)
    }

    /// Consume events until every sender is gone.
    pub(crate) async fn run(mut self) {
        while let Some(event) = self.events.recv().await {
            self.handle_event(event);
        }
    }

    fn handle_event(&mut self, event: ManagerEvent) {
        match event {
            ManagerEvent::Connected(handle) => self.on_connected(handle),
            ManagerEvent::Inbound(raw) => self.on_message(&raw),
            ManagerEvent::BuildCompleted => self.request_reload(),
            ManagerEvent::BackoffFinished => self.on_backoff_finished(),
        }
    }

    /// Replace the tracked connection with the new one.
    ///
    /// Dropping the previous handle closes the superseded socket task's
    /// outbound channel, which ends that task.
    fn on_connected(&mut self, handle: ConnectionHandle) {
        tracing::debug!("agent channel opened");
        self.connection = Some(handle);
    }

    /// Classify an inbound frame as handshake or acknowledgment.
    ///
    /// Frames that don't parse are dropped without comment; a malformed
    /// message must never take the server down mid-build.
    fn on_message(&mut self, raw: &str) {
        let Ok(AgentMessage::Reloaded(name)) = AgentMessage::decode(raw) else {
            tracing::debug!(frame = raw, "ignoring malformed agent message");
            return;
        };

        if self.has_seen_first_contact {
            self.throttle.record_ack(Instant::now());
            tracing::info!(
                extension = self.peer_name.as_deref().unwrap_or("extension"),
                reloads = self.throttle.reload_count(),
                "extension reloaded"
            );
        } else {
            self.has_seen_first_contact = true;
            self.peer_name = Some(name.clone());
            tracing::info!(extension = %name, "connected; extension will reload on change");
        }
    }

    /// Ask the throttle whether a reload may go out now, and act on it.
    fn request_reload(&mut self) {
        let link = match &self.connection {
            None => LinkState::NeverConnected,
            Some(conn) if conn.is_open() => LinkState::Open,
            Some(_) => LinkState::Closed,
        };

        match self.throttle.decide(link, Instant::now()) {
            ReloadDecision::Skip => {}
            ReloadDecision::NoConnection => {
                tracing::warn!("no extension connected; reload dropped");
            }
            ReloadDecision::StaleConnection => {
                tracing::warn!(
                    extension = self.peer_name.as_deref().unwrap_or("extension"),
                    "connection lost; the extension may need a manual reload"
                );
            }
            ReloadDecision::Send => self.send_command(),
            ReloadDecision::Backoff => self.enter_backoff(),
        }
    }

    fn send_command(&self) {
        let Some(conn) = &self.connection else {
            return;
        };
        if conn.send(self.command.as_str().to_owned()) {
            tracing::debug!(command = %self.command, "reload command sent");
        } else {
            tracing::warn!(command = %self.command, "channel closed before command was written");
        }
    }

    /// Redirect the current request into a countdown and owe it one retry.
    ///
    /// The countdown has no cancel point: once started it always runs to
    /// completion. State stays in this task; the spawned task only sleeps,
    /// logs the remaining seconds and posts `BackoffFinished`.
    fn enter_backoff(&mut self) {
        // decide() already swallows requests while waiting; this guard keeps
        // a second countdown from ever starting regardless of call path.
        if self.throttle.is_waiting() {
            return;
        }
        self.throttle.begin_backoff();
        self.retry_pending = true;

        tracing::warn!(
            extension = self.peer_name.as_deref().unwrap_or("extension"),
            seconds = BACKOFF_SECS,
            "reload limit reached; delaying so the extension is not disabled"
        );

        let done = self.self_tx.clone();
        tokio::spawn(async move {
            let mut remaining = BACKOFF_SECS;
            while remaining > 0 {
                tokio::time::sleep(Duration::from_secs(1)).await;
                remaining -= 1;
                tracing::info!(remaining, "reloading soon");
            }
            let _ = done.send(ManagerEvent::BackoffFinished).await;
        });
    }

    /// A completed countdown retries the request that started it, exactly once.
    fn on_backoff_finished(&mut self) {
        self.throttle.finish_backoff();
        if self.retry_pending {
            self.retry_pending = false;
            self.request_reload();
        }
    }
}
