//! Errors surfaced by subsystem client operations.

use thiserror::Error;

/// Errors a `ConnectionCapability` may return from a forwarded operation.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ClientError {
    /// The client is not connected to its daemon.
    #[error("client {client} is not connected")]
    NotConnected { client: String },

    /// The client does not implement the requested operation.
    #[error("client {client} does not support {operation}")]
    Unsupported {
        client: String,
        operation: &'static str,
    },

    /// The daemon rejected the request.
    #[error("client {client} rejected request: {reason}")]
    Rejected { client: String, reason: String },

    /// The transport to the daemon failed.
    #[error("transport error: {0}")]
    Transport(String),
}

/// Result type for forwarded client operations.
pub type ClientResult<T> = Result<T, ClientError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_error_display() {
        let err = ClientError::NotConnected {
            client: "bgpd".to_string(),
        };
        assert_eq!(err.to_string(), "client bgpd is not connected");

        let err = ClientError::Unsupported {
            client: "vland".to_string(),
            operation: "bulk_get",
        };
        assert_eq!(err.to_string(), "client vland does not support bulk_get");
    }
}
