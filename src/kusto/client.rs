//! Cluster Client
//!
//! The [`ManagementClient`] trait is the seam between resource discovery and
//! whatever actually talks to the cluster. [`KustoClient`] is the REST
//! implementation.

use super::auth::Authorization;
use super::http::KustoHttpClient;
use super::rows::RowSet;
use crate::error::{ResourceError, Result};
use async_trait::async_trait;

/// Anything that can run management commands against one cluster endpoint
#[async_trait]
pub trait ManagementClient: Send + Sync {
    fn endpoint(&self) -> &str;

    fn auth(&self) -> &Authorization;

    /// Run a management command and return its primary result table
    async fn mgmt(&self, database: &str, command: &str) -> Result<RowSet>;
}

/// REST client for a single cluster
#[derive(Clone)]
pub struct KustoClient {
    endpoint: String,
    auth: Authorization,
    http: KustoHttpClient,
}

impl KustoClient {
    pub fn new(endpoint: &str, auth: Authorization) -> anyhow::Result<Self> {
        let http = KustoHttpClient::new()?;

        Ok(Self {
            endpoint: endpoint.trim_end_matches('/').to_string(),
            auth,
            http,
        })
    }

    /// Build the management API URL
    pub fn mgmt_url(&self) -> String {
        format!("{}/v1/rest/mgmt", self.endpoint)
    }
}

#[async_trait]
impl ManagementClient for KustoClient {
    fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn auth(&self) -> &Authorization {
        &self.auth
    }

    async fn mgmt(&self, database: &str, command: &str) -> Result<RowSet> {
        let token = self
            .auth
            .get_token()
            .await
            .map_err(|e| ResourceError::connection(&self.endpoint, &e))?;

        let response = self
            .http
            .post_mgmt(&self.mgmt_url(), token.as_deref(), database, command)
            .await
            .map_err(|e| ResourceError::connection(&self.endpoint, &e))?;

        RowSet::from_v1_response(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_urls_strip_trailing_slash() {
        let client = KustoClient::new(
            "https://ingest-test.westus.kusto.windows.net/",
            Authorization::anonymous(),
        )
        .unwrap();

        assert_eq!(client.endpoint(), "https://ingest-test.westus.kusto.windows.net");
        assert_eq!(
            client.mgmt_url(),
            "https://ingest-test.westus.kusto.windows.net/v1/rest/mgmt"
        );
    }
}
