pub mod aws;
pub mod memory;
pub mod terraform;

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use crate::config::Config;
use crate::instance::{Instance, Origin};

pub use aws::AwsSnapshotProvider;
pub use memory::StaticProvider;
pub use terraform::TerraformStateProvider;

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("instance not found: {0}")]
    NotFound(String),
    #[error("provider not configured: {0}")]
    NotConfigured(String),
    #[error("provider unavailable: {0}")]
    Unavailable(String),
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse {what}: {message}")]
    Parse { what: String, message: String },
    #[error("terraform state error: {0}")]
    Terraform(String),
}

/// Source of instances for one origin.
#[async_trait]
pub trait InstanceProvider: Send + Sync {
    fn name(&self) -> &str;

    fn origin(&self) -> Origin;

    async fn list_instances(&self) -> Result<Vec<Instance>, ProviderError>;

    /// Looks up one instance. The default scans [`InstanceProvider::list_instances`].
    async fn get_instance(&self, id: &str) -> Result<Instance, ProviderError> {
        self.list_instances()
            .await?
            .into_iter()
            .find(|instance| instance.id() == id)
            .ok_or_else(|| ProviderError::NotFound(id.to_string()))
    }
}

/// Builds the configured provider for `origin`.
pub fn get_provider(
    origin: Origin,
    config: &Config,
) -> Result<Arc<dyn InstanceProvider>, ProviderError> {
    match origin {
        Origin::Aws => {
            let path = config.aws.snapshot_path.clone().ok_or_else(|| {
                ProviderError::NotConfigured(
                    "No AWS snapshot provided. Set DRIFTWATCH_AWS_SNAPSHOT or use --aws-snapshot flag"
                        .to_string(),
                )
            })?;
            Ok(Arc::new(AwsSnapshotProvider::new(path)))
        }
        Origin::Terraform => {
            let terraform = &config.terraform;
            if let Some(url) = &terraform.state_url {
                let provider =
                    TerraformStateProvider::from_http(url.clone(), terraform.state_token.clone())?;
                return Ok(Arc::new(provider));
            }

            let path = terraform.state_path.clone().ok_or_else(|| {
                ProviderError::NotConfigured(
                    "No Terraform state provided. Set DRIFTWATCH_STATE_FILE or use --state flag"
                        .to_string(),
                )
            })?;
            Ok(Arc::new(TerraformStateProvider::from_file(path)))
        }
    }
}
