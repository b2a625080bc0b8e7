//! Ingestion resource discovery for Kusto-style clusters.
//!
//! Before data can be queued for ingestion, a client needs the queues and
//! storage containers the cluster currently designates for it. This crate
//! fetches that list with a management command, caches it per endpoint,
//! refreshes it in the background and shares one cache between all client
//! handles pointing at the same cluster.

pub mod config;
pub mod error;
pub mod ingest;
pub mod kusto;
pub mod resource;

pub use config::{Config, ManagerConfig};
pub use error::{ResourceError, Result};
pub use ingest::Ingestion;
pub use kusto::{Authorization, KustoClient, ManagementClient};
#[cfg(any(test, feature = "mock"))]
pub use kusto::MockClient;
pub use resource::{kind, Identity, IdentityPolicy, Manager, Registry, Resource, ResourceSnapshot};
