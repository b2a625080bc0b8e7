//! Typed errors for resource discovery.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ResourceError {
    /// The management call could not be issued or the transport failed.
    #[error("management call to {endpoint} failed: {message}")]
    Connection { endpoint: String, message: String },

    /// The response rows were malformed or missing expected columns.
    #[error("malformed management response: {0}")]
    Decode(String),

    /// Queried before any refresh ever succeeded.
    #[error("no ingestion resources available for {endpoint}")]
    NoResourcesAvailable {
        endpoint: String,
        #[source]
        cause: Option<Box<ResourceError>>,
    },

    /// Timeout or caller cancellation fired mid-refresh.
    #[error("refresh of {endpoint} was cancelled")]
    Cancelled { endpoint: String },
}

impl ResourceError {
    pub fn connection(endpoint: &str, error: &anyhow::Error) -> Self {
        Self::Connection {
            endpoint: endpoint.to_string(),
            // Alternate formatting keeps the context chain on one line
            message: format!("{:#}", error),
        }
    }

    pub fn decode(message: impl Into<String>) -> Self {
        Self::Decode(message.into())
    }

    pub fn cancelled(endpoint: &str) -> Self {
        Self::Cancelled {
            endpoint: endpoint.to_string(),
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled { .. })
    }
}

pub type Result<T, E = ResourceError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn test_connection_keeps_context_chain() {
        let err = anyhow::anyhow!("connection refused").context("Failed to send request");
        let err = ResourceError::connection("https://a.kusto.windows.net", &err);
        assert_eq!(
            err.to_string(),
            "management call to https://a.kusto.windows.net failed: Failed to send request: connection refused"
        );
    }

    #[test]
    fn test_no_resources_exposes_cause() {
        let err = ResourceError::NoResourcesAvailable {
            endpoint: "https://a".to_string(),
            cause: Some(Box::new(ResourceError::decode("missing column"))),
        };
        let source = err.source().expect("cause should be the source");
        assert_eq!(
            source.to_string(),
            "malformed management response: missing column"
        );
    }
}
