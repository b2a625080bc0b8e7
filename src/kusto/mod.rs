//! Cluster interaction module
//!
//! Everything resource discovery needs from the cluster: a credential
//! reference, a way to run management commands, and the decoded result
//! tables those commands return.
//!
//! # Module Structure
//!
//! - [`auth`] - Opaque authorization with token caching
//! - [`client`] - The [`ManagementClient`] seam and the REST [`KustoClient`]
//! - [`http`] - HTTP utilities for management calls
//! - [`rows`] - Result-table decoding
//! - `mock` - Scripted client for tests (`mock` feature)
//!
//! # Example
//!
//! ```ignore
//! use ingest_resources::kusto::{Authorization, KustoClient, ManagementClient};
//!
//! async fn example() -> anyhow::Result<()> {
//!     let client = KustoClient::new(
//!         "https://ingest-mycluster.westus.kusto.windows.net",
//!         Authorization::bearer("token"),
//!     )?;
//!     let rows = client.mgmt("NetDefaultDB", ".get ingestion resources").await?;
//!     Ok(())
//! }
//! ```

pub mod auth;
pub mod client;
pub mod http;
#[cfg(any(test, feature = "mock"))]
pub mod mock;
pub mod rows;

pub use auth::{Authorization, StaticToken, TokenProvider};
pub use client::{KustoClient, ManagementClient};
#[cfg(any(test, feature = "mock"))]
pub use mock::MockClient;
pub use rows::{Column, RowSet};
