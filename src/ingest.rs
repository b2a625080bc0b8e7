//! Ingestion client handle
//!
//! Binds a cluster client to a target database and table. The resource
//! manager behind it is shared with every other handle on the same
//! endpoint; database and table play no part in that sharing.

use crate::error::Result;
use crate::kusto::ManagementClient;
use crate::resource::{Manager, Registry, Resource};
use std::sync::Arc;

#[derive(Clone)]
pub struct Ingestion {
    database: String,
    table: String,
    client: Arc<dyn ManagementClient>,
    mgr: Manager,
}

impl Ingestion {
    /// Create a handle backed by the process-wide registry
    pub fn new(client: Arc<dyn ManagementClient>, database: &str, table: &str) -> Self {
        Self::with_registry(client, database, table, Registry::global())
    }

    /// Create a handle backed by an explicit registry
    pub fn with_registry(
        client: Arc<dyn ManagementClient>,
        database: &str,
        table: &str,
        registry: &Registry,
    ) -> Self {
        let mgr = registry.get_or_create(client.clone());
        tracing::debug!(
            "Ingestion into {}.{} via {}",
            database,
            table,
            mgr.identity()
        );

        Self {
            database: database.to_string(),
            table: table.to_string(),
            client,
            mgr,
        }
    }

    pub fn database(&self) -> &str {
        &self.database
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn endpoint(&self) -> &str {
        self.client.endpoint()
    }

    pub fn manager(&self) -> &Manager {
        &self.mgr
    }

    /// Current resources of `kind` for this handle's cluster
    pub async fn resources(&self, kind: &str) -> Result<Vec<Resource>> {
        self.mgr.get(kind).await
    }
}

impl std::fmt::Debug for Ingestion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Ingestion")
            .field("database", &self.database)
            .field("table", &self.table)
            .field("manager", &self.mgr)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ManagerConfig;
    use crate::kusto::MockClient;
    use crate::resource::{INGESTION_RESOURCES_COMMAND, KIND_COLUMN, URI_COLUMN};

    #[tokio::test]
    async fn test_handles_share_manager_and_resources() {
        let registry = Registry::new(ManagerConfig::default().without_background_refresh());
        let client = Arc::new(MockClient::new("https://test.kusto.windows.net"));
        client.respond_rows(
            INGESTION_RESOURCES_COMMAND,
            &[KIND_COLUMN, URI_COLUMN],
            &[&["TempStorage", "https://acct.blob.core.windows.net/c1"]],
        );

        let first = Ingestion::with_registry(client.clone(), "db1", "t1", &registry);
        let second = Ingestion::with_registry(client.clone(), "db2", "t2", &registry);

        assert!(Manager::ptr_eq(first.manager(), second.manager()));
        assert_eq!(first.database(), "db1");
        assert_eq!(second.table(), "t2");

        assert_eq!(first.resources("TempStorage").await.unwrap().len(), 1);
        assert_eq!(second.resources("TempStorage").await.unwrap().len(), 1);
        assert_eq!(client.calls(INGESTION_RESOURCES_COMMAND), 1);
    }
}
