//! Ingestion resource layer
//!
//! Discovers the queues and storage containers a cluster designates for
//! ingestion and keeps that view fresh, sharing one manager per endpoint.
//!
//! # Architecture
//!
//! - [`model`] - Resource values and decoding of management rows
//! - [`snapshot`] - Immutable, timestamped view of all resources
//! - [`identity`] - Registry keys and the endpoint normalization policy
//! - [`manager`] - Cached, periodically refreshed resources for one endpoint
//! - [`registry`] - Deduplicates managers by identity
//!
//! # Example
//!
//! ```ignore
//! use ingest_resources::resource::{kind, Registry};
//!
//! async fn queues(registry: &Registry, client: Arc<dyn ManagementClient>) -> anyhow::Result<()> {
//!     let manager = registry.get_or_create(client);
//!     let queues = manager.get(kind::SECURED_READY_FOR_AGGREGATION_QUEUE).await?;
//!     Ok(())
//! }
//! ```

pub mod identity;
pub mod manager;
pub mod model;
pub mod registry;
pub mod snapshot;

pub use identity::{normalize_endpoint, Identity, IdentityPolicy};
pub use manager::Manager;
pub use model::{
    decode_auth_context, decode_resources, kind, Resource, StorageService, StorageUri,
    AUTH_CONTEXT_COLUMN, IDENTITY_TOKEN_COMMAND, INGESTION_RESOURCES_COMMAND, KIND_COLUMN,
    MGMT_DATABASE, URI_COLUMN,
};
pub use registry::Registry;
pub use snapshot::ResourceSnapshot;
