//! Long-lived extension agent.
//!
//! Owns the channel to the build process. Announces itself on every
//! successful connect, dispatches inbound reload commands to the host, and
//! after any loss of the channel retries on a fixed interval until the server
//! is back, forever.

use std::sync::Arc;

use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::time::Duration;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};

use relo_protocol::{AgentMessage, ReloadCommand};

use crate::error::AgentError;
use crate::host::{ExtensionHost, PageBus};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Default delay between reconnect attempts.
const DEFAULT_RECONNECT_INTERVAL: Duration = Duration::from_secs(2);

/// Connection lifecycle of the agent. There is no terminal state.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum AgentState {
    Disconnected,
    Connecting,
    Connected,
    Reconnecting,
}

/// Agent configuration.
#[derive(Clone, Debug)]
pub struct AgentConfig {
    /// WebSocket endpoint of the reload server.
    pub url: String,
    /// Display name announced on every connect.
    pub name: String,
    /// Delay between reconnect attempts.
    pub reconnect_interval: Duration,
}

impl AgentConfig {
    /// Configuration for a server on the given host and port.
    #[must_use]
    pub fn new(host: &str, port: u16, name: impl Into<String>) -> Self {
        Self {
            url: format!("ws://{host}:{port}/"),
            name: name.into(),
            reconnect_interval: DEFAULT_RECONNECT_INTERVAL,
        }
    }
}

/// Long-lived role: holds the channel, dispatches commands, reconnects.
pub struct ReloadAgent {
    config: AgentConfig,
    host: Arc<dyn ExtensionHost>,
    pages: PageBus,
    state: AgentState,
}

impl ReloadAgent {
    #[must_use]
    pub fn new(config: AgentConfig, host: Arc<dyn ExtensionHost>, pages: PageBus) -> Self {
        Self {
            config,
            host,
            pages,
            state: AgentState::Disconnected,
        }
    }

    /// Run the connect/dispatch/reconnect loop. Does not return.
    pub async fn run(mut self) {
        let mut stream = self.initial_connect().await;

        loop {
            while let Some(frame) = stream.next().await {
                match frame {
                    Ok(Message::Text(text)) => self.dispatch(text.as_str()),
                    Ok(_) => {}
                    Err(err) => {
                        tracing::debug!(error = %err, "channel error");
                        break;
                    }
                }
            }

            self.set_state(AgentState::Reconnecting);
            stream = self.reconnect().await;
        }
    }

    /// First connection attempt. A failure here is no different from a lost
    /// channel: the agent drops straight into the reconnect loop.
    async fn initial_connect(&mut self) -> WsStream {
        self.set_state(AgentState::Connecting);
        match self.try_connect().await {
            Ok(mut stream) => {
                self.set_state(AgentState::Connected);
                tracing::info!(name = %self.config.name, "extension will auto reload");
                self.announce(&mut stream).await;
                stream
            }
            Err(err) => {
                tracing::debug!(error = %err, "initial connect failed");
                self.set_state(AgentState::Reconnecting);
                self.reconnect().await
            }
        }
    }

    /// Poll for the server on a fixed interval until a connection opens.
    ///
    /// Attempt errors are swallowed; the next tick retries. The loop has a
    /// single exit: a successful open, which also restarts everything locally
    /// (once per outage, not once per failed attempt) so the extension picks
    /// up whatever the rebuilt server is serving.
    async fn reconnect(&mut self) -> WsStream {
        loop {
            tokio::time::sleep(self.config.reconnect_interval).await;

            match self.try_connect().await {
                Ok(mut stream) => {
                    self.set_state(AgentState::Connected);
                    tracing::info!(name = %self.config.name, "reconnected to reload server");
                    self.reload_all();
                    self.announce(&mut stream).await;
                    return stream;
                }
                Err(err) => {
                    tracing::debug!(error = %err, "reconnect attempt failed");
                }
            }
        }
    }

    async fn try_connect(&self) -> Result<WsStream, AgentError> {
        let (stream, _response) = connect_async(self.config.url.as_str()).await?;
        Ok(stream)
    }

    /// Identify ourselves. The server decides whether this is the initial
    /// handshake or a reload acknowledgment.
    async fn announce(&self, stream: &mut WsStream) {
        let message = AgentMessage::Reloaded(self.config.name.clone());
        let Ok(encoded) = message.encode() else {
            return;
        };
        if let Err(err) = stream.send(Message::text(encoded)).await {
            // The dispatch loop will notice the broken stream and reconnect.
            tracing::debug!(error = %err, "failed to announce");
        }
    }

    /// Act on a command frame from the server.
    fn dispatch(&self, frame: &str) {
        match frame.parse::<ReloadCommand>() {
            Ok(ReloadCommand::ExtensionOnly) => {
                tracing::info!("reloading extension runtime");
                self.host.reload_runtime();
            }
            Ok(ReloadCommand::All) => self.reload_all(),
            Err(err) => {
                tracing::debug!(error = %err, "ignoring unknown command");
            }
        }
    }

    /// Reload every page, then the runtime. Pages go first: the runtime
    /// teardown closes the bus they are listening on.
    fn reload_all(&self) {
        let pages = self.pages.notify_reload();
        tracing::info!(pages, "reloading extension and open pages");
        self.host.reload_runtime();
    }

    fn set_state(&mut self, next: AgentState) {
        if self.state != next {
            tracing::debug!(from = ?self.state, to = ?next, "agent state changed");
            self.state = next;
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use pretty_assertions::assert_eq;
    use tokio::net::TcpListener;

    use super::*;

    struct CountingHost {
        runtime_reloads: AtomicUsize,
    }

    impl CountingHost {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                runtime_reloads: AtomicUsize::new(0),
            })
        }

        fn count(&self) -> usize {
            self.runtime_reloads.load(Ordering::SeqCst)
        }
    }

    impl ExtensionHost for CountingHost {
        fn reload_runtime(&self) {
            self.runtime_reloads.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn agent_with_host(
        url: String,
        host: Arc<CountingHost>,
        bus: &PageBus,
    ) -> ReloadAgent {
        let config = AgentConfig {
            url,
            name: "Test Extension".to_owned(),
            reconnect_interval: Duration::from_millis(20),
        };
        ReloadAgent::new(config, host, bus.clone())
    }

    /// Accept one agent connection and return the message it announces with.
    async fn accept_and_read_announce(listener: &TcpListener) -> AgentMessage {
        let (socket, _) = listener.accept().await.unwrap();
        let mut ws = tokio_tungstenite::accept_async(socket).await.unwrap();
        loop {
            match ws.next().await.unwrap().unwrap() {
                Message::Text(text) => return AgentMessage::decode(text.as_str()).unwrap(),
                _ => continue,
            }
        }
    }

    #[tokio::test]
    async fn test_dispatch_reload_extension_only() {
        let host = CountingHost::new();
        let bus = PageBus::new();
        let mut page_rx = bus.subscribe();
        let agent = agent_with_host("ws://unused/".to_owned(), Arc::clone(&host), &bus);

        agent.dispatch("RELOAD_EXTENSION");

        assert_eq!(host.count(), 1);
        assert!(page_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_dispatch_reload_all_notifies_pages() {
        let host = CountingHost::new();
        let bus = PageBus::new();
        let mut page_rx = bus.subscribe();
        let agent = agent_with_host("ws://unused/".to_owned(), Arc::clone(&host), &bus);

        agent.dispatch("RELOAD_ALL");

        assert_eq!(host.count(), 1);
        assert_eq!(page_rx.try_recv().unwrap(), crate::host::PageCommand::Reload);
    }

    #[tokio::test]
    async fn test_dispatch_ignores_unknown_commands() {
        let host = CountingHost::new();
        let bus = PageBus::new();
        let agent = agent_with_host("ws://unused/".to_owned(), Arc::clone(&host), &bus);

        agent.dispatch("SELF_DESTRUCT");
        agent.dispatch("");

        assert_eq!(host.count(), 0);
    }

    #[tokio::test]
    async fn test_announces_on_connect_without_reloading() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("ws://{}/", listener.local_addr().unwrap());

        let host = CountingHost::new();
        let bus = PageBus::new();
        let agent = agent_with_host(url, Arc::clone(&host), &bus);
        let task = tokio::spawn(agent.run());

        let announce = accept_and_read_announce(&listener).await;
        assert_eq!(
            announce,
            AgentMessage::Reloaded("Test Extension".to_owned())
        );
        // A clean first connect is not an outage; nothing reloads.
        assert_eq!(host.count(), 0);

        task.abort();
    }

    #[tokio::test]
    async fn test_reconnects_and_reloads_once_after_loss() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("ws://{}/", listener.local_addr().unwrap());

        let host = CountingHost::new();
        let bus = PageBus::new();
        let agent = agent_with_host(url, Arc::clone(&host), &bus);
        let task = tokio::spawn(agent.run());

        // First connection: accept, then drop it.
        let (socket, _) = listener.accept().await.unwrap();
        let ws = tokio_tungstenite::accept_async(socket).await.unwrap();
        drop(ws);

        // The agent comes back on its own and announces again.
        let announce = accept_and_read_announce(&listener).await;
        assert_eq!(
            announce,
            AgentMessage::Reloaded("Test Extension".to_owned())
        );

        // The reconnect restarted everything locally, exactly once.
        assert_eq!(host.count(), 1);

        task.abort();
    }

    #[tokio::test]
    async fn test_survives_server_starting_late() {
        // Reserve a port, then free it so the first attempts fail.
        let placeholder = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = placeholder.local_addr().unwrap();
        drop(placeholder);

        let host = CountingHost::new();
        let bus = PageBus::new();
        let agent = agent_with_host(format!("ws://{addr}/"), Arc::clone(&host), &bus);
        let task = tokio::spawn(agent.run());

        // Let a few attempts fail before the server shows up.
        tokio::time::sleep(Duration::from_millis(70)).await;
        let listener = TcpListener::bind(addr).await.unwrap();

        let announce = accept_and_read_announce(&listener).await;
        assert_eq!(
            announce,
            AgentMessage::Reloaded("Test Extension".to_owned())
        );

        // One local restart for the whole outage, not one per attempt.
        assert_eq!(host.count(), 1);

        task.abort();
    }
}
