use std::{fmt::Display, str::FromStr};

use serde::{Deserialize, Serialize};
use snafu::prelude::*;

/// Message kinds carried by an [Envelope](super::Envelope)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageType {
    /// task progress update
    Progress,
    /// task log line
    Log,
    /// task status change, also used for control messages
    Status,
    /// task or backend error
    Error,
    /// task finished
    Complete,
    /// keep-alive
    Heartbeat,
}

impl MessageType {
    /// get type name as on the wire
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Progress => "progress",
            Self::Log => "log",
            Self::Status => "status",
            Self::Error => "error",
            Self::Complete => "complete",
            Self::Heartbeat => "heartbeat",
        }
    }
}

impl Display for MessageType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Parse string as [MessageType] error
#[derive(Debug, Snafu)]
#[snafu(display("unknown message type {name}"))]
pub struct UnknownMessageType {
    /// the string be parsed
    pub name: String,
}

impl FromStr for MessageType {
    type Err = UnknownMessageType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "progress" => Self::Progress,
            "log" => Self::Log,
            "status" => Self::Status,
            "error" => Self::Error,
            "complete" => Self::Complete,
            "heartbeat" => Self::Heartbeat,
            _ => return UnknownMessageTypeSnafu { name: s }.fail(),
        })
    }
}

/// Action of a control message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ControlAction {
    /// start receiving events of a task
    Subscribe,
    /// stop receiving events of a task
    Unsubscribe,
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_type_name_matches_serde() {
        for t in [
            MessageType::Progress,
            MessageType::Log,
            MessageType::Status,
            MessageType::Error,
            MessageType::Complete,
            MessageType::Heartbeat,
        ] {
            let json = serde_json::to_string(&t).unwrap();
            assert_eq!(json, format!("\"{}\"", t));
            assert_eq!(t.as_str().parse::<MessageType>().unwrap(), t);
        }
    }

    #[test]
    fn test_unknown_type_name() {
        let err = "PROGRESS".parse::<MessageType>().unwrap_err();
        assert_eq!(err.name, "PROGRESS");
    }
}
