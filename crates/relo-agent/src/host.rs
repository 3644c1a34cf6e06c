//! Host abstractions the agent drives.
//!
//! The agent itself knows nothing about browsers. The embedding provides the
//! runtime surface through [`ExtensionHost`], and pages receive instructions
//! over the [`PageBus`], the in-process stand-in for the extension's internal
//! messaging channel.

use tokio::sync::broadcast;

/// Capacity of the page fan-out channel.
const PAGE_BUS_SIZE: usize = 16;

/// Surface of the extension runtime the agent can restart.
pub trait ExtensionHost: Send + Sync {
    /// Tear down and restart the extension runtime.
    fn reload_runtime(&self);
}

/// Instruction delivered to page-scoped agents.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PageCommand {
    /// Reload this page.
    Reload,
}

/// Fan-out channel from the long-lived agent to every page-scoped agent.
#[derive(Clone, Debug)]
pub struct PageBus {
    tx: broadcast::Sender<PageCommand>,
}

impl PageBus {
    #[must_use]
    pub fn new() -> Self {
        let (tx, _rx) = broadcast::channel(PAGE_BUS_SIZE);
        Self { tx }
    }

    /// Subscribe a page-scoped agent.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<PageCommand> {
        self.tx.subscribe()
    }

    /// Instruct every attached page to reload. Returns how many were reached.
    pub fn notify_reload(&self) -> usize {
        self.tx.send(PageCommand::Reload).unwrap_or(0)
    }
}

impl Default for PageBus {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_notify_reaches_every_subscriber() {
        let bus = PageBus::new();
        let mut rx1 = bus.subscribe();
        let mut rx2 = bus.subscribe();

        assert_eq!(bus.notify_reload(), 2);
        assert_eq!(rx1.recv().await.unwrap(), PageCommand::Reload);
        assert_eq!(rx2.recv().await.unwrap(), PageCommand::Reload);
    }

    #[tokio::test]
    async fn test_notify_without_subscribers_is_harmless() {
        let bus = PageBus::new();
        assert_eq!(bus.notify_reload(), 0);
    }
}
