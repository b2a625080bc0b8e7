//! Ingestion resource values and row decoding

use crate::error::{ResourceError, Result};
use crate::kusto::RowSet;
use indexmap::IndexMap;
use std::fmt;
use url::Url;

/// Management command listing the current ingestion resources
pub const INGESTION_RESOURCES_COMMAND: &str = ".get ingestion resources";

/// Management command returning the ingestion identity token
pub const IDENTITY_TOKEN_COMMAND: &str = ".get kusto identity token";

/// Database management commands are issued against
pub const MGMT_DATABASE: &str = "NetDefaultDB";

pub const KIND_COLUMN: &str = "ResourceTypeName";
pub const URI_COLUMN: &str = "StorageRoot";
pub const AUTH_CONTEXT_COLUMN: &str = "AuthorizationContext";

/// Resource kinds the backend is known to hand out
pub mod kind {
    pub const SECURED_READY_FOR_AGGREGATION_QUEUE: &str = "SecuredReadyForAggregationQueue";
    pub const TEMP_STORAGE: &str = "TempStorage";
    pub const SUCCESSFUL_INGESTIONS_QUEUE: &str = "SuccessfulIngestionsQueue";
    pub const FAILED_INGESTIONS_QUEUE: &str = "FailedIngestionsQueue";
    pub const INGESTIONS_STATUS_TABLE: &str = "IngestionsStatusTable";
}

/// A backend-designated transport endpoint
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Resource {
    kind: String,
    uri: String,
}

impl Resource {
    pub fn new(kind: impl Into<String>, uri: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            uri: uri.into(),
        }
    }

    pub fn kind(&self) -> &str {
        &self.kind
    }

    pub fn uri(&self) -> &str {
        &self.uri
    }

    /// Parse the URI as an Azure storage address
    pub fn storage_uri(&self) -> Result<StorageUri> {
        StorageUri::parse(&self.uri)
    }
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.uri)
    }
}

/// Storage service a resource URI points at
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageService {
    Queue,
    Blob,
    Table,
    Other(String),
}

impl StorageService {
    fn from_label(label: &str) -> Self {
        match label {
            "queue" => Self::Queue,
            "blob" => Self::Blob,
            "table" => Self::Table,
            other => Self::Other(other.to_string()),
        }
    }
}

/// Parsed view of `https://<account>.<service>.<suffix>/<object>?<sas>`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageUri {
    pub account: String,
    pub service: StorageService,
    pub object_name: String,
    pub sas: Option<String>,
}

impl StorageUri {
    pub fn parse(raw: &str) -> Result<Self> {
        let url = Url::parse(raw)
            .map_err(|e| ResourceError::decode(format!("invalid resource URI: {}", e)))?;

        let host = url
            .host_str()
            .ok_or_else(|| ResourceError::decode("resource URI has no host"))?;

        let mut labels = host.split('.');
        let account = labels.next().unwrap_or_default();
        let Some(service) = labels.next() else {
            return Err(ResourceError::decode(format!(
                "resource host '{}' has no service label",
                host
            )));
        };

        let object_name = url.path().trim_matches('/').to_string();
        if object_name.is_empty() {
            return Err(ResourceError::decode("resource URI has no object name"));
        }

        Ok(Self {
            account: account.to_string(),
            service: StorageService::from_label(service),
            object_name,
            sas: url.query().filter(|q| !q.is_empty()).map(str::to_string),
        })
    }
}

/// Group management rows by resource kind, keeping encounter order
pub fn decode_resources(rows: &RowSet) -> Result<IndexMap<String, Vec<Resource>>> {
    let kind_col = rows.require_column(KIND_COLUMN)?;
    let uri_col = rows.require_column(URI_COLUMN)?;

    let mut resources: IndexMap<String, Vec<Resource>> = IndexMap::new();
    for row in 0..rows.len() {
        let kind = rows.string_at(row, kind_col)?;
        let uri = rows.string_at(row, uri_col)?;
        resources
            .entry(kind.to_string())
            .or_default()
            .push(Resource::new(kind, uri));
    }

    Ok(resources)
}

/// Pull the identity token out of a `.get kusto identity token` response
pub fn decode_auth_context(rows: &RowSet) -> Result<String> {
    let col = rows.require_column(AUTH_CONTEXT_COLUMN)?;
    if rows.is_empty() {
        return Err(ResourceError::decode("identity token response has no rows"));
    }
    Ok(rows.string_at(0, col)?.to_string())
}
