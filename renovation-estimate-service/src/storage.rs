use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;

use crate::models::EstimateResponse;

/// A produced estimate, as kept for later retrieval
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EstimateRecord {
    pub id: String,
    pub created_at: DateTime<Utc>,
    pub response: EstimateResponse,
}

impl EstimateRecord {
    pub fn new(response: EstimateResponse) -> Self {
        Self {
            id: response.estimate_id.clone(),
            created_at: Utc::now(),
            response,
        }
    }
}

/// Trait for storing and retrieving estimates
#[async_trait]
pub trait EstimateStore: Send + Sync {
    async fn save(&self, record: EstimateRecord) -> anyhow::Result<()>;
    async fn get(&self, id: &str) -> anyhow::Result<Option<EstimateRecord>>;
    async fn delete(&self, id: &str) -> anyhow::Result<()>;
}

/// Default number of estimates the in-memory store keeps.
pub const DEFAULT_STORE_CAPACITY: usize = 10_000;

/// In-memory implementation of EstimateStore.
///
/// Holds at most `capacity` records; saving a new record into a full store
/// evicts the oldest one by `created_at`.
pub struct InMemoryEstimateStore {
    records: Arc<DashMap<String, EstimateRecord>>,
    capacity: usize,
}

impl Default for InMemoryEstimateStore {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_STORE_CAPACITY)
    }
}

impl InMemoryEstimateStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            records: Arc::new(DashMap::new()),
            capacity: capacity.max(1),
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    fn evict_oldest(&self) {
        let oldest = self
            .records
            .iter()
            .min_by_key(|entry| entry.created_at)
            .map(|entry| entry.key().clone());
        if let Some(id) = oldest {
            self.records.remove(&id);
            debug!(estimate_id = %id, "Evicted oldest stored estimate");
        }
    }
}

#[async_trait]
impl EstimateStore for InMemoryEstimateStore {
    async fn save(&self, record: EstimateRecord) -> anyhow::Result<()> {
        if !self.records.contains_key(&record.id) {
            while self.records.len() >= self.capacity {
                self.evict_oldest();
            }
        }
        self.records.insert(record.id.clone(), record);
        Ok(())
    }

    async fn get(&self, id: &str) -> anyhow::Result<Option<EstimateRecord>> {
        Ok(self.records.get(id).map(|entry| entry.clone()))
    }

    async fn delete(&self, id: &str) -> anyhow::Result<()> {
        self.records.remove(id);
        Ok(())
    }
}
