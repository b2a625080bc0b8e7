//! Scripted in-memory client
//!
//! Answers management commands from per-command response queues. The last
//! queued response for a command is sticky, so a single scripted answer
//! serves every call.

use super::auth::Authorization;
use super::client::ManagementClient;
use super::rows::RowSet;
use crate::error::{ResourceError, Result};
use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::Duration;

#[derive(Default)]
struct Script {
    responses: HashMap<String, VecDeque<Result<RowSet>>>,
    calls: HashMap<String, usize>,
    delay: Option<Duration>,
}

pub struct MockClient {
    endpoint: String,
    auth: Authorization,
    script: Mutex<Script>,
}

impl MockClient {
    pub fn new(endpoint: &str) -> Self {
        Self::with_auth(endpoint, Authorization::anonymous())
    }

    pub fn with_auth(endpoint: &str, auth: Authorization) -> Self {
        Self {
            endpoint: endpoint.to_string(),
            auth,
            script: Mutex::new(Script::default()),
        }
    }

    /// Simulate a slow backend
    pub fn with_delay(self, delay: Duration) -> Self {
        self.set_delay(Some(delay));
        self
    }

    /// Change the simulated latency of subsequent calls
    pub fn set_delay(&self, delay: Option<Duration>) {
        self.lock().delay = delay;
    }

    /// Queue a response for `command`
    pub fn respond(&self, command: &str, response: Result<RowSet>) -> &Self {
        let mut script = self.lock();
        script
            .responses
            .entry(command.to_string())
            .or_default()
            .push_back(response);
        self
    }

    /// Queue a successful all-string table for `command`
    pub fn respond_rows(&self, command: &str, columns: &[&str], rows: &[&[&str]]) -> &Self {
        self.respond(command, Ok(RowSet::from_strings(columns, rows)))
    }

    /// Queue a transport failure for `command`
    pub fn respond_error(&self, command: &str, message: &str) -> &Self {
        let error = ResourceError::Connection {
            endpoint: self.endpoint.clone(),
            message: message.to_string(),
        };
        self.respond(command, Err(error))
    }

    /// Number of times `command` has been issued
    pub fn calls(&self, command: &str) -> usize {
        self.lock().calls.get(command).copied().unwrap_or(0)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Script> {
        self.script
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    fn next_response(&self, command: &str) -> (Result<RowSet>, Option<Duration>) {
        let mut script = self.lock();
        *script.calls.entry(command.to_string()).or_default() += 1;
        let delay = script.delay;

        let Some(queue) = script.responses.get_mut(command) else {
            let err = ResourceError::Connection {
                endpoint: self.endpoint.clone(),
                message: format!("no scripted response for '{}'", command),
            };
            return (Err(err), delay);
        };

        let response = if queue.len() > 1 {
            queue.pop_front().unwrap_or_else(|| Ok(RowSet::default()))
        } else {
            queue.front().cloned().unwrap_or_else(|| Ok(RowSet::default()))
        };
        (response, delay)
    }
}

#[async_trait]
impl ManagementClient for MockClient {
    fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn auth(&self) -> &Authorization {
        &self.auth
    }

    async fn mgmt(&self, _database: &str, command: &str) -> Result<RowSet> {
        // Count the call before sleeping so concurrent callers are visible
        let (response, delay) = self.next_response(command);
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_last_response_is_sticky() {
        let client = MockClient::new("https://a");
        client
            .respond_rows(".cmd", &["A"], &[&["1"]])
            .respond_error(".cmd", "down");

        assert!(client.mgmt("db", ".cmd").await.is_ok());
        assert!(client.mgmt("db", ".cmd").await.is_err());
        assert!(client.mgmt("db", ".cmd").await.is_err());
        assert_eq!(client.calls(".cmd"), 3);
    }

    #[tokio::test]
    async fn test_unscripted_command_fails() {
        let client = MockClient::new("https://a");
        let err = client.mgmt("db", ".other").await.unwrap_err();
        assert!(matches!(err, ResourceError::Connection { .. }));
        assert_eq!(client.calls(".other"), 1);
    }

    #[tokio::test]
    async fn test_delay_can_be_changed() {
        let client = MockClient::new("https://a").with_delay(Duration::from_secs(5));
        client.respond_rows(".cmd", &["A"], &[&["1"]]);
        client.set_delay(None);

        let rows = tokio::time::timeout(Duration::from_millis(500), client.mgmt("db", ".cmd"))
            .await
            .expect("undelayed call should be quick")
            .unwrap();
        assert_eq!(rows.len(), 1);
    }
}
