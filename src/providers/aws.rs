mod types;

pub use types::{DescribeInstancesOutput, Ec2Instance};

use std::path::{Path, PathBuf};

use async_trait::async_trait;

use super::{InstanceProvider, ProviderError};
use crate::instance::{Instance, Origin};

/// Live instances captured with `aws ec2 describe-instances --output json`.
///
/// The snapshot is re-read on every call so scheduled runs see refreshed captures.
#[derive(Debug, Clone)]
pub struct AwsSnapshotProvider {
    path: PathBuf,
}

impl AwsSnapshotProvider {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn load(&self) -> Result<DescribeInstancesOutput, ProviderError> {
        let display = self.path.display().to_string();

        let content = tokio::fs::read_to_string(&self.path)
            .await
            .map_err(|source| ProviderError::Io {
                path: display.clone(),
                source,
            })?;

        serde_json::from_str(&content).map_err(|e| ProviderError::Parse {
            what: display,
            message: e.to_string(),
        })
    }
}

#[async_trait]
impl InstanceProvider for AwsSnapshotProvider {
    fn name(&self) -> &str {
        "aws"
    }

    fn origin(&self) -> Origin {
        Origin::Aws
    }

    async fn list_instances(&self) -> Result<Vec<Instance>, ProviderError> {
        let output = self.load().await?;

        let instances: Vec<Instance> = output
            .into_instances()
            .filter(|instance| !instance.is_terminated())
            .map(Ec2Instance::into_instance)
            .collect();

        tracing::debug!(
            path = %self.path.display(),
            count = instances.len(),
            "AWS instances loaded"
        );

        Ok(instances)
    }
}
