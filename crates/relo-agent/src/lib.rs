//! Extension-side reload agent.
//!
//! The extension half of relo, split the way a real extension is:
//!
//! - [`ReloadAgent`] is the long-lived role. It owns the WebSocket channel to
//!   the build process, announces itself on every connect, dispatches reload
//!   commands, and reconnects forever after a loss.
//! - [`PageAgent`] is the page-scoped role. One per open page, it listens on
//!   the [`PageBus`] and reloads its page when told to.
//!
//! The embedding supplies the runtime surface via [`ExtensionHost`]; the
//! crate never touches a browser API itself, which also makes the whole loop
//! testable in-process.

mod agent;
mod error;
mod host;
mod page;

pub use agent::{AgentConfig, ReloadAgent};
pub use error::AgentError;
pub use host::{ExtensionHost, PageBus, PageCommand};
pub use page::PageAgent;
