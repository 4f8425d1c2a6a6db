use async_trait::async_trait;

use super::{InstanceProvider, ProviderError};
use crate::instance::{Instance, Origin};

/// Provider over a fixed set of instances.
#[derive(Debug, Clone)]
pub struct StaticProvider {
    origin: Origin,
    instances: Vec<Instance>,
}

impl StaticProvider {
    pub fn new(origin: Origin, instances: Vec<Instance>) -> Self {
        Self { origin, instances }
    }
}

#[async_trait]
impl InstanceProvider for StaticProvider {
    fn name(&self) -> &str {
        "static"
    }

    fn origin(&self) -> Origin {
        self.origin
    }

    async fn list_instances(&self) -> Result<Vec<Instance>, ProviderError> {
        Ok(self.instances.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_static_provider_lookup() {
        let provider = StaticProvider::new(
            Origin::Terraform,
            vec![
                Instance::from_value("i-1", Origin::Terraform, json!({ "ami": "ami-1" })),
                Instance::from_value("i-2", Origin::Terraform, json!({ "ami": "ami-2" })),
            ],
        );

        assert_eq!(provider.list_instances().await.unwrap().len(), 2);
        let found = provider.get_instance("i-2").await.unwrap();
        assert_eq!(found.attribute("ami"), Some(&json!("ami-2")));
    }
}
