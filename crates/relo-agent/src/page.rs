//! Page-scoped reload agent.

use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::broadcast;

use crate::host::{PageBus, PageCommand};

/// Reloads one page when instructed over the page bus.
///
/// Mirrors a content script: it may be initialized more than once for the
/// same page, and it may run before the extension's messaging surface exists.
/// `attach` therefore subscribes at most once and simply reports failure when
/// there is no bus yet, leaving the caller free to try again.
pub struct PageAgent {
    attached: AtomicBool,
}

impl PageAgent {
    #[must_use]
    pub fn new() -> Self {
        Self {
            attached: AtomicBool::new(false),
        }
    }

    /// Subscribe to reload instructions, invoking `reload` on each one.
    ///
    /// Returns `true` when a subscription is in place (from this call or an
    /// earlier one), `false` when no bus is available yet.
    pub fn attach<F>(&self, bus: Option<&PageBus>, reload: F) -> bool
    where
        F: Fn() + Send + 'static,
    {
        let Some(bus) = bus else {
            return false;
        };

        // Second init of the same page keeps the original subscription.
        if self.attached.swap(true, Ordering::SeqCst) {
            return true;
        }

        let mut rx = bus.subscribe();
        tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(PageCommand::Reload) => reload(),
                    Err(broadcast::error::RecvError::Lagged(_)) => {}
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        });

        true
    }

    /// Whether this page is subscribed.
    #[must_use]
    pub fn is_attached(&self) -> bool {
        self.attached.load(Ordering::SeqCst)
    }
}

impl Default for PageAgent {
    fn default() -> Self {
        Self::new()
    }
}
