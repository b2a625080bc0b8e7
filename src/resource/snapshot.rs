//! Immutable, timestamped view of all known resources

use super::model::Resource;
use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use std::time::{Duration, Instant};

#[derive(Debug, Clone)]
pub struct ResourceSnapshot {
    resources: IndexMap<String, Vec<Resource>>,
    fetched_at: DateTime<Utc>,
    /// Monotonic twin of `fetched_at`, used for staleness
    fetched: Instant,
}

impl ResourceSnapshot {
    pub fn new(resources: IndexMap<String, Vec<Resource>>) -> Self {
        Self {
            resources,
            fetched_at: Utc::now(),
            fetched: Instant::now(),
        }
    }

    /// Resources of `kind`, empty if the backend listed none
    pub fn get(&self, kind: &str) -> &[Resource] {
        self.resources.get(kind).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Kinds in the order the backend listed them
    pub fn kinds(&self) -> impl Iterator<Item = &str> {
        self.resources.keys().map(String::as_str)
    }

    pub fn resources(&self) -> &IndexMap<String, Vec<Resource>> {
        &self.resources
    }

    /// Total number of resources across all kinds
    pub fn len(&self) -> usize {
        self.resources.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn fetched_at(&self) -> DateTime<Utc> {
        self.fetched_at
    }

    pub fn age(&self) -> Duration {
        self.fetched.elapsed()
    }

    pub fn is_stale(&self, threshold: Duration) -> bool {
        self.age() >= threshold
    }

    /// Same kinds and resources, ignoring fetch time
    pub fn same_resources(&self, other: &ResourceSnapshot) -> bool {
        self.resources == other.resources
    }
}
