use std::collections::HashMap;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::RwLock;

use crate::drift::DriftResult;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("drift result not found: {0}")]
    NotFound(String),
    #[error("no drift results for resource: {0}")]
    ResourceNotFound(String),
    #[error("storage error: {0}")]
    Storage(String),
}

/// Append-only history of drift results.
///
/// Implementations serialize their own writes; concurrent saves must not lose entries.
#[async_trait]
pub trait DriftRepository: Send + Sync {
    /// Stores `result` keyed by its id. Saving an existing id overwrites it.
    async fn save_drift_result(&self, result: &DriftResult) -> Result<(), RepositoryError>;

    async fn get_drift_result(&self, id: &str) -> Result<DriftResult, RepositoryError>;

    /// All results recorded for `resource_id`, oldest first.
    async fn get_drift_results_by_instance_id(
        &self,
        resource_id: &str,
    ) -> Result<Vec<DriftResult>, RepositoryError>;

    async fn list_drift_results(&self) -> Result<Vec<DriftResult>, RepositoryError>;

    /// Clearing capability, when the backend offers one.
    fn as_clearable(&self) -> Option<&dyn ClearableRepository> {
        None
    }
}

#[async_trait]
pub trait ClearableRepository: Send + Sync {
    async fn clear(&self) -> Result<(), RepositoryError>;
}

#[derive(Debug, Default)]
struct Records {
    results: HashMap<String, DriftResult>,
    by_resource: HashMap<String, Vec<String>>,
}

#[derive(Debug, Default)]
pub struct InMemoryDriftRepository {
    records: RwLock<Records>,
}

impl InMemoryDriftRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

fn oldest_first(mut results: Vec<DriftResult>) -> Vec<DriftResult> {
    results.sort_by_key(|r| r.timestamp());
    results
}

#[async_trait]
impl DriftRepository for InMemoryDriftRepository {
    async fn save_drift_result(&self, result: &DriftResult) -> Result<(), RepositoryError> {
        let mut records = self.records.write().await;
        let id = result.id().to_string();

        if let Some(previous) = records.results.insert(id.clone(), result.clone()) {
            if previous.resource_id() != result.resource_id() {
                if let Some(ids) = records.by_resource.get_mut(previous.resource_id()) {
                    ids.retain(|existing| existing != &id);
                }
            }
        }

        let ids = records
            .by_resource
            .entry(result.resource_id().to_string())
            .or_default();
        if !ids.contains(&id) {
            ids.push(id);
        }

        Ok(())
    }

    async fn get_drift_result(&self, id: &str) -> Result<DriftResult, RepositoryError> {
        self.records
            .read()
            .await
            .results
            .get(id)
            .cloned()
            .ok_or_else(|| RepositoryError::NotFound(id.to_string()))
    }

    async fn get_drift_results_by_instance_id(
        &self,
        resource_id: &str,
    ) -> Result<Vec<DriftResult>, RepositoryError> {
        let records = self.records.read().await;

        let results: Vec<DriftResult> = records
            .by_resource
            .get(resource_id)
            .map(|ids| {
                ids.iter()
                    .filter_map(|id| records.results.get(id).cloned())
                    .collect()
            })
            .unwrap_or_default();

        if results.is_empty() {
            return Err(RepositoryError::ResourceNotFound(resource_id.to_string()));
        }

        Ok(oldest_first(results))
    }

    async fn list_drift_results(&self) -> Result<Vec<DriftResult>, RepositoryError> {
        let records = self.records.read().await;
        Ok(oldest_first(records.results.values().cloned().collect()))
    }

    fn as_clearable(&self) -> Option<&dyn ClearableRepository> {
        Some(self)
    }
}

#[async_trait]
impl ClearableRepository for InMemoryDriftRepository {
    async fn clear(&self) -> Result<(), RepositoryError> {
        let mut records = self.records.write().await;
        records.results.clear();
        records.by_resource.clear();
        Ok(())
    }
}
