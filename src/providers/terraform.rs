use std::path::PathBuf;

use async_trait::async_trait;

use super::{InstanceProvider, ProviderError};
use crate::instance::{Instance, Origin};
use crate::terraform::{StateClient, StateError, TerraformState};

#[derive(Debug, Clone)]
pub enum StateSource {
    File(PathBuf),
    Http(StateClient),
}

/// Declared instances read from Terraform state.
///
/// State is reloaded on every call; it may change between scheduled runs.
#[derive(Debug, Clone)]
pub struct TerraformStateProvider {
    source: StateSource,
}

impl TerraformStateProvider {
    pub fn from_file(path: impl Into<PathBuf>) -> Self {
        Self {
            source: StateSource::File(path.into()),
        }
    }

    pub fn from_http(address: String, token: Option<String>) -> Result<Self, ProviderError> {
        let client = StateClient::new(address, token)?;
        Ok(Self {
            source: StateSource::Http(client),
        })
    }

    pub fn source(&self) -> &StateSource {
        &self.source
    }

    async fn load_state(&self) -> Result<TerraformState, StateError> {
        match &self.source {
            StateSource::File(path) => {
                let content = tokio::fs::read_to_string(path).await?;
                TerraformState::parse(&content)
            }
            StateSource::Http(client) => client.fetch_state().await,
        }
    }
}

#[async_trait]
impl InstanceProvider for TerraformStateProvider {
    fn name(&self) -> &str {
        "terraform"
    }

    fn origin(&self) -> Origin {
        Origin::Terraform
    }

    async fn list_instances(&self) -> Result<Vec<Instance>, ProviderError> {
        let state = self.load_state().await?;
        let instances = state.instances();

        tracing::debug!(
            serial = state.serial,
            count = instances.len(),
            "Terraform instances loaded"
        );

        Ok(instances)
    }
}
