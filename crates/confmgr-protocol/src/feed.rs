//! Status feed line format.
//!
//! The process supervisor reports daemon lifecycle changes as
//! newline-delimited JSON:
//!
//! ```json
//! {"name": "bgpd", "status": "up"}
//! {"Name": "vland", "Status": "Restarting"}
//! ```

use confmgr_core::{ClientName, DaemonStatus, StatusEvent, UnknownStatus};
use serde::Deserialize;
use thiserror::Error;

/// Longest status line accepted (bytes).
pub const MAX_STATUS_LINE: usize = 4096;

/// Errors parsing a status feed line.
#[derive(Debug, Error)]
pub enum FeedParseError {
    #[error("status line too long ({len} bytes, max {max})")]
    TooLong { len: usize, max: usize },

    #[error("invalid status line JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Status(#[from] UnknownStatus),

    #[error("status line has an empty daemon name")]
    EmptyName,
}

/// A status line as it appears on the wire.
#[derive(Debug, Clone, Deserialize)]
pub struct RawStatusMessage {
    #[serde(alias = "Name")]
    pub name: String,
    #[serde(alias = "Status")]
    pub status: String,
}

impl RawStatusMessage {
    /// Converts the wire message to a domain event.
    pub fn into_event(self) -> Result<StatusEvent, FeedParseError> {
        let name = self.name.trim();
        if name.is_empty() {
            return Err(FeedParseError::EmptyName);
        }
        let status: DaemonStatus = self.status.parse()?;
        Ok(StatusEvent::new(ClientName::new(name), status))
    }
}

/// Parses one line of the status feed.
pub fn parse_status_line(line: &str) -> Result<StatusEvent, FeedParseError> {
    if line.len() > MAX_STATUS_LINE {
        return Err(FeedParseError::TooLong {
            len: line.len(),
            max: MAX_STATUS_LINE,
        });
    }
    let raw: RawStatusMessage = serde_json::from_str(line.trim())?;
    raw.into_event()
}
