//! Reload rate limiting.
//!
//! Browsers disable an extension that is reloaded too many times in a short
//! burst. The throttle gates outgoing reload commands on the number of
//! *acknowledged* reload cycles inside a sliding window, and redirects
//! over-limit requests into a fixed-length backoff instead of sending them.

use std::time::Duration;

use tokio::time::Instant;

/// Idle window after which the acknowledged-reload counter resets.
pub(crate) const RELOAD_WINDOW: Duration = Duration::from_secs(10);

/// Acknowledged reloads allowed inside one window before backoff.
pub(crate) const MAX_RELOADS_PER_WINDOW: u32 = 5;

/// Length of the backoff countdown, in one-second steps.
pub(crate) const BACKOFF_SECS: u64 = 10;

/// Channel state as observed by the manager at decision time.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum LinkState {
    /// No agent has ever connected.
    NeverConnected,
    /// An agent connected previously but the channel is no longer open.
    Closed,
    /// The tracked channel is open.
    Open,
}

/// Outcome of a reload request.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum ReloadDecision {
    /// A backoff countdown is running; the request is dropped silently.
    Skip,
    /// Drop with a "no client connected" diagnostic.
    NoConnection,
    /// Drop with a "connection lost" diagnostic.
    StaleConnection,
    /// Safe to send the command now.
    Send,
    /// Limit reached; enter backoff.
    Backoff,
}

/// Throttle state. Owned by the manager task and mutated only there; survives
/// connection replacement.
#[derive(Debug)]
pub(crate) struct ReloadThrottle {
    /// Acknowledged reload cycles inside the current window.
    reload_count: u32,
    /// When the last acknowledgment arrived.
    last_reload_at: Option<Instant>,
    /// A backoff countdown is in progress.
    is_waiting: bool,
}

impl ReloadThrottle {
    pub(crate) fn new() -> Self {
        Self {
            reload_count: 0,
            last_reload_at: None,
            is_waiting: false,
        }
    }

    /// Decide what to do with a reload request arriving now.
    ///
    /// Checks run in a fixed order: an active backoff swallows the request
    /// before the channel is even looked at; then channel presence and
    /// openness; then the idle reset; then the window gate.
    ///
    /// The counter tracks completed reload cycles, not sent commands, so a
    /// burst of triggers racing ahead of their acknowledgments is not capped
    /// here.
    pub(crate) fn decide(&mut self, link: LinkState, now: Instant) -> ReloadDecision {
        if self.is_waiting {
            return ReloadDecision::Skip;
        }

        match link {
            LinkState::NeverConnected => return ReloadDecision::NoConnection,
            LinkState::Closed => return ReloadDecision::StaleConnection,
            LinkState::Open => {}
        }

        // A quiet stretch means the platform's burst window has passed and
        // the counter can start over.
        if let Some(last) = self.last_reload_at
            && now.duration_since(last) > RELOAD_WINDOW
        {
            self.reload_count = 0;
        }

        if self.reload_count < MAX_RELOADS_PER_WINDOW {
            ReloadDecision::Send
        } else {
            ReloadDecision::Backoff
        }
    }

    /// Record an acknowledged reload cycle.
    pub(crate) fn record_ack(&mut self, now: Instant) {
        self.last_reload_at = Some(now);
        self.reload_count += 1;
    }

    /// Mark the start of a backoff countdown.
    ///
    /// Idempotent: a countdown that is already running is never restarted.
    pub(crate) fn begin_backoff(&mut self) {
        self.is_waiting = true;
    }

    /// Mark a completed backoff countdown: sending is allowed again and the
    /// window counter starts over.
    pub(crate) fn finish_backoff(&mut self) {
        self.is_waiting = false;
        self.reload_count = 0;
    }

    pub(crate) fn is_waiting(&self) -> bool {
        self.is_waiting
    }

    pub(crate) fn reload_count(&self) -> u32 {
        self.reload_count
    }
}
