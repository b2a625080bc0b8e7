//! HTTP utilities for the cluster REST API

use anyhow::{Context, Result};
use reqwest::Client;
use serde_json::Value;
use uuid::Uuid;

/// Maximum length of response body to log (to avoid logging sensitive data)
const MAX_LOG_BODY_LENGTH: usize = 200;

/// Application name reported to the cluster
const APP_NAME: &str = "ingest-resources";

/// Sanitize response body for logging
/// Truncates long responses and strips non-printable characters
fn sanitize_for_log(body: &str) -> String {
    let truncated = if body.len() > MAX_LOG_BODY_LENGTH {
        let mut end = MAX_LOG_BODY_LENGTH;
        while !body.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}... [truncated, {} bytes total]", &body[..end], body.len())
    } else {
        body.to_string()
    };

    truncated.replace(|c: char| !c.is_ascii_graphic() && c != ' ', "")
}

/// Client request id in the `<app>;<uuid>` form the cluster traces by
pub fn client_request_id() -> String {
    format!("{};{}", APP_NAME, Uuid::new_v4())
}

/// HTTP client wrapper for management calls
#[derive(Clone)]
pub struct KustoHttpClient {
    client: Client,
}

impl KustoHttpClient {
    pub fn new() -> Result<Self> {
        let client = Client::builder()
            .user_agent(concat!("ingest-resources/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self { client })
    }

    /// POST a management command and return the raw JSON response
    pub async fn post_mgmt(
        &self,
        url: &str,
        token: Option<&str>,
        database: &str,
        command: &str,
    ) -> Result<Value> {
        let request_id = client_request_id();
        tracing::debug!("POST {} [{}] {}", url, request_id, command);

        let body = serde_json::json!({
            "db": database,
            "csl": command,
        });

        let mut request = self
            .client
            .post(url)
            .header("x-ms-client-request-id", &request_id)
            .header("x-ms-app", APP_NAME)
            .json(&body);

        if let Some(token) = token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await.context("Failed to send request")?;

        let status = response.status();
        let response_body = response
            .text()
            .await
            .context("Failed to read response body")?;

        if !status.is_success() {
            // Only log sanitized/truncated error body to avoid leaking sensitive data
            tracing::error!("API error: {} - {}", status, sanitize_for_log(&response_body));
            return Err(anyhow::anyhow!("API request failed: {}", status));
        }

        serde_json::from_str(&response_body).context("Failed to parse response JSON")
    }
}
