//! Daemon lifecycle events and initial-connect progress.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use crate::ClientName;

/// Value emitted on the readiness channel once the initial connect phase
/// has finished for every known client.
pub const CLIENT_INIT_DONE: &str = "Client_Init_Done";

/// A status string that is not one of `up`, `stopped`, `restarting`.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("unknown daemon status: {0}")]
pub struct UnknownStatus(pub String);

/// Lifecycle status reported for a subsystem daemon.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DaemonStatus {
    /// The daemon is up and accepting connections.
    Up,
    /// The daemon has stopped.
    Stopped,
    /// The daemon is restarting; its connection is about to go away.
    Restarting,
}

impl DaemonStatus {
    /// Returns true if a client connection should be torn down.
    #[must_use]
    pub fn is_down(self) -> bool {
        matches!(self, Self::Stopped | Self::Restarting)
    }
}

impl fmt::Display for DaemonStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Up => write!(f, "up"),
            Self::Stopped => write!(f, "stopped"),
            Self::Restarting => write!(f, "restarting"),
        }
    }
}

impl FromStr for DaemonStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "up" => Ok(Self::Up),
            "stopped" => Ok(Self::Stopped),
            "restarting" => Ok(Self::Restarting),
            other => Err(UnknownStatus(other.to_string())),
        }
    }
}

/// A lifecycle event for a named daemon.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusEvent {
    pub name: ClientName,
    pub status: DaemonStatus,
}

impl StatusEvent {
    pub fn new(name: impl Into<ClientName>, status: DaemonStatus) -> Self {
        Self {
            name: name.into(),
            status,
        }
    }
}

/// Progress reported on the readiness channel during bulk connect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadinessEvent {
    /// The named client has connected.
    Connected(ClientName),
    /// Every known client is connected; the registry is ready.
    InitDone,
}

impl ReadinessEvent {
    /// Returns true for the terminating sentinel.
    #[must_use]
    pub fn is_init_done(&self) -> bool {
        matches!(self, Self::InitDone)
    }
}

impl fmt::Display for ReadinessEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Connected(name) => write!(f, "{name}"),
            Self::InitDone => write!(f, "{CLIENT_INIT_DONE}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_daemon_status_from_str_is_case_insensitive() {
        assert_eq!("UP".parse::<DaemonStatus>().unwrap(), DaemonStatus::Up);
        assert_eq!(
            " Stopped ".parse::<DaemonStatus>().unwrap(),
            DaemonStatus::Stopped
        );
        assert_eq!(
            "restarting".parse::<DaemonStatus>().unwrap(),
            DaemonStatus::Restarting
        );
        assert!("crashed".parse::<DaemonStatus>().is_err());
    }

    #[test]
    fn test_daemon_status_is_down() {
        assert!(!DaemonStatus::Up.is_down());
        assert!(DaemonStatus::Stopped.is_down());
        assert!(DaemonStatus::Restarting.is_down());
    }

    #[test]
    fn test_readiness_event_display() {
        let connected = ReadinessEvent::Connected(ClientName::new("bgpd"));
        assert_eq!(connected.to_string(), "bgpd");
        assert!(!connected.is_init_done());

        assert_eq!(ReadinessEvent::InitDone.to_string(), "Client_Init_Done");
        assert!(ReadinessEvent::InitDone.is_init_done());
    }

    #[test]
    fn test_status_event_serde() {
        let event: StatusEvent =
            serde_json::from_str(r#"{"name":"vland","status":"restarting"}"#).unwrap();
        assert_eq!(event, StatusEvent::new("vland", DaemonStatus::Restarting));
    }
}
