//! Wire protocol shared by the relo server and extension agents.
//!
//! The channel carries two kinds of traffic:
//!
//! - Server → agent: a plain text command, [`ReloadCommand`].
//! - Agent → server: a JSON message, [`AgentMessage`]. The same shape is sent
//!   on every connect; the server decides whether it is the initial handshake
//!   or a reload acknowledgment.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Default port the reload server listens on.
pub const DEFAULT_PORT: u16 = 1337;

/// Default host the reload server binds to.
pub const DEFAULT_HOST: &str = "127.0.0.1";

/// Command sent from the server to the extension agent.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReloadCommand {
    /// Reload the extension runtime and every open page.
    All,
    /// Reload the extension runtime only.
    ExtensionOnly,
}

impl ReloadCommand {
    /// Wire representation of the command.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::All => "RELOAD_ALL",
            Self::ExtensionOnly => "RELOAD_EXTENSION",
        }
    }
}

impl fmt::Display for ReloadCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when an inbound frame is not a known command.
#[derive(Debug, thiserror::Error)]
#[error("unknown reload command: {0:?}")]
pub struct UnknownCommand(String);

impl FromStr for ReloadCommand {
    type Err = UnknownCommand;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "RELOAD_ALL" => Ok(Self::All),
            "RELOAD_EXTENSION" => Ok(Self::ExtensionOnly),
            other => Err(UnknownCommand(other.to_owned())),
        }
    }
}

/// Message sent from the extension agent to the server.
///
/// Serializes as `{"type": "RELOADED", "payload": "<name>"}`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload")]
pub enum AgentMessage {
    /// The agent (re)started and is listening for commands. Carries the
    /// extension's display name.
    #[serde(rename = "RELOADED")]
    Reloaded(String),
}

impl AgentMessage {
    /// Encode for the wire.
    ///
    /// # Errors
    ///
    /// Returns an error if JSON serialization fails.
    pub fn encode(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Decode an inbound frame.
    ///
    /// # Errors
    ///
    /// Returns an error if the frame is not a known message shape.
    pub fn decode(raw: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(raw)
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn test_command_wire_strings() {
        assert_eq!(ReloadCommand::All.as_str(), "RELOAD_ALL");
        assert_eq!(ReloadCommand::ExtensionOnly.as_str(), "RELOAD_EXTENSION");
    }

    #[test]
    fn test_command_round_trip() {
        assert_eq!(
            "RELOAD_ALL".parse::<ReloadCommand>().unwrap(),
            ReloadCommand::All
        );
        assert_eq!(
            "RELOAD_EXTENSION".parse::<ReloadCommand>().unwrap(),
            ReloadCommand::ExtensionOnly
        );
    }

    #[test]
    fn test_unknown_command_rejected() {
        assert!("RELOAD".parse::<ReloadCommand>().is_err());
        assert!("".parse::<ReloadCommand>().is_err());
    }

    #[test]
    fn test_agent_message_serialization() {
        let msg = AgentMessage::Reloaded("My Extension".to_owned());
        let json: serde_json::Value =
            serde_json::from_str(&msg.encode().unwrap()).unwrap();

        assert_eq!(json["type"], "RELOADED");
        assert_eq!(json["payload"], "My Extension");
    }

    #[test]
    fn test_agent_message_decode() {
        let msg =
            AgentMessage::decode(r#"{"type":"RELOADED","payload":"Ext"}"#).unwrap();
        assert_eq!(msg, AgentMessage::Reloaded("Ext".to_owned()));
    }

    #[test]
    fn test_agent_message_decode_rejects_unknown_type() {
        assert!(AgentMessage::decode(r#"{"type":"PING","payload":"x"}"#).is_err());
        assert!(AgentMessage::decode("not json").is_err());
    }
}
