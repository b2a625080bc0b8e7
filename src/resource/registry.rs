//! Manager Registry - one manager per cluster identity
//!
//! Client handles pointing at the same endpoint share a [`Manager`] and its
//! background refresh. Lookups take a read lock; creation re-checks under
//! the write lock so exactly one caller creates and starts each manager.

use super::identity::Identity;
use super::manager::Manager;
use crate::config::ManagerConfig;
use crate::kusto::ManagementClient;
use std::collections::HashMap;
use std::sync::{Arc, OnceLock, PoisonError, RwLock};

pub struct Registry {
    config: ManagerConfig,
    managers: RwLock<HashMap<Identity, Manager>>,
}

/// Process-wide registry used by [`crate::Ingestion::new`]
static GLOBAL: OnceLock<Registry> = OnceLock::new();

impl Registry {
    pub fn new(config: ManagerConfig) -> Self {
        Self {
            config,
            managers: RwLock::new(HashMap::new()),
        }
    }

    /// Get the process-wide registry (created with default settings on first access)
    pub fn global() -> &'static Registry {
        GLOBAL.get_or_init(|| Registry::new(ManagerConfig::default()))
    }

    pub fn config(&self) -> &ManagerConfig {
        &self.config
    }

    /// Existing manager for the client's identity, or a new started one
    ///
    /// Never fails: the first refresh happens in the background and its
    /// outcome is recorded on the manager.
    pub fn get_or_create(&self, client: Arc<dyn ManagementClient>) -> Manager {
        let identity = Identity::for_client(client.as_ref(), self.config.identity_policy);

        if let Some(manager) = self.get(&identity) {
            return manager;
        }

        let mut managers = self
            .managers
            .write()
            .unwrap_or_else(PoisonError::into_inner);

        if let Some(manager) = managers.get(&identity) {
            return manager.clone();
        }

        tracing::info!("Creating resource manager for {}", identity);
        let manager = Manager::new(identity.clone(), client, self.config.clone());
        if self.config.background_refresh {
            manager.start();
        }
        managers.insert(identity, manager.clone());
        manager
    }

    pub fn get(&self, identity: &Identity) -> Option<Manager> {
        self.managers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(identity)
            .cloned()
    }

    /// All managers currently registered
    pub fn managers(&self) -> Vec<Manager> {
        self.managers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.managers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Stop every manager and forget them
    pub fn shutdown(&self) {
        let drained: Vec<Manager> = self
            .managers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .drain()
            .map(|(_, manager)| manager)
            .collect();

        for manager in &drained {
            manager.stop();
        }
        tracing::info!("Registry shut down, stopped {} managers", drained.len());
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new(ManagerConfig::default())
    }
}
