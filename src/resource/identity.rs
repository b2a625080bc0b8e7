//! Registry keys
//!
//! Endpoints are normalized by URL parsing: scheme and host are lowercased,
//! default ports dropped and trailing slashes removed. Path case is kept.
//! Whether credentials split managers is an explicit [`IdentityPolicy`].

use crate::kusto::{Authorization, ManagementClient};
use serde::{Deserialize, Serialize};
use std::fmt;
use url::Url;

/// What distinguishes one manager from another
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IdentityPolicy {
    /// One manager per cluster endpoint; the resource set is cluster-wide
    #[default]
    #[serde(alias = "endpoint_only")]
    Endpoint,
    /// One manager per endpoint and credential
    EndpointAndCredential,
}

impl IdentityPolicy {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "endpoint" | "endpoint_only" => Some(Self::Endpoint),
            "endpoint_and_credential" => Some(Self::EndpointAndCredential),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Endpoint => "endpoint",
            Self::EndpointAndCredential => "endpoint_and_credential",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Identity {
    endpoint: String,
    credential: Option<String>,
}

impl Identity {
    pub fn new(endpoint: &str, auth: &Authorization, policy: IdentityPolicy) -> Self {
        let credential = match policy {
            IdentityPolicy::Endpoint => None,
            IdentityPolicy::EndpointAndCredential => Some(auth.fingerprint()),
        };

        Self {
            endpoint: normalize_endpoint(endpoint),
            credential,
        }
    }

    pub fn for_client(client: &dyn ManagementClient, policy: IdentityPolicy) -> Self {
        Self::new(client.endpoint(), client.auth(), policy)
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn credential(&self) -> Option<&str> {
        self.credential.as_deref()
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.credential {
            Some(credential) => write!(f, "{} [{}]", self.endpoint, credential),
            None => f.write_str(&self.endpoint),
        }
    }
}

/// Canonical form of a cluster endpoint
pub fn normalize_endpoint(endpoint: &str) -> String {
    let trimmed = endpoint.trim();

    match Url::parse(trimmed) {
        Ok(url) if url.has_host() => {
            // Url already lowercases scheme and host and drops default ports
            let mut normalized = format!("{}://{}", url.scheme(), url.host_str().unwrap_or_default());
            if let Some(port) = url.port() {
                normalized.push_str(&format!(":{}", port));
            }
            normalized.push_str(url.path().trim_end_matches('/'));
            normalized
        }
        _ => trimmed.trim_end_matches('/').to_lowercase(),
    }
}
