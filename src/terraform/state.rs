use serde::Deserialize;
use serde_json::{Map, Value};

use super::StateError;
use crate::instance::{EC2_RESOURCE_TYPE, Instance, Origin};

pub const SUPPORTED_STATE_VERSION: u32 = 4;
const MANAGED_MODE: &str = "managed";

/// Terraform state parser for drift detection.
///
/// Parses tfstate v4 files and extracts `aws_instance` resources for comparison.
#[derive(Debug, Deserialize)]
pub struct TerraformState {
    pub version: u32,
    #[serde(default)]
    pub terraform_version: Option<String>,
    #[serde(default)]
    pub serial: u64,
    #[serde(default)]
    pub lineage: Option<String>,
    #[serde(default)]
    pub resources: Vec<StateResource>,
}

#[derive(Debug, Deserialize)]
pub struct StateResource {
    #[serde(default)]
    pub module: Option<String>,
    pub mode: String,
    #[serde(rename = "type")]
    pub type_: String,
    pub name: String,
    #[serde(default)]
    pub instances: Vec<StateInstance>,
}

#[derive(Debug, Deserialize)]
pub struct StateInstance {
    #[serde(default)]
    pub index_key: Option<Value>,
    #[serde(default)]
    pub attributes: Option<Map<String, Value>>,
}

impl TerraformState {
    pub fn parse(content: &str) -> Result<Self, StateError> {
        let state: TerraformState = serde_json::from_str(content)?;

        if state.version != SUPPORTED_STATE_VERSION {
            return Err(StateError::UnsupportedVersion(state.version));
        }

        Ok(state)
    }

    /// State with no resources, as returned by a backend that has not stored anything yet.
    pub fn empty() -> Self {
        Self {
            version: SUPPORTED_STATE_VERSION,
            terraform_version: None,
            serial: 0,
            lineage: None,
            resources: Vec::new(),
        }
    }

    /// Managed `aws_instance` resources as Terraform-origin instances.
    pub fn instances(&self) -> Vec<Instance> {
        self.resources
            .iter()
            .filter(|r| r.mode == MANAGED_MODE && r.type_ == EC2_RESOURCE_TYPE)
            .flat_map(|resource| {
                resource
                    .instances
                    .iter()
                    .map(move |instance| instance.to_instance(resource))
            })
            .collect()
    }
}

impl StateResource {
    /// Resource address such as `module.app.aws_instance.web[0]`.
    pub fn address(&self, index_key: Option<&Value>) -> String {
        let mut address = match &self.module {
            Some(module) => format!("{}.{}.{}", module, self.type_, self.name),
            None => format!("{}.{}", self.type_, self.name),
        };

        match index_key {
            Some(Value::String(key)) => address.push_str(&format!("[\"{}\"]", key)),
            Some(Value::Number(n)) => address.push_str(&format!("[{}]", n)),
            _ => {}
        }

        address
    }
}

impl StateInstance {
    fn to_instance(&self, resource: &StateResource) -> Instance {
        let mut attributes = self.attributes.clone().unwrap_or_default();

        // NOTE: Not-yet-applied resources have no id; the address stands in for it
        let id = attributes
            .get("id")
            .and_then(Value::as_str)
            .filter(|id| !id.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| resource.address(self.index_key.as_ref()));

        if !attributes.contains_key("placement") {
            let mut placement = Map::new();
            for key in ["availability_zone", "tenancy"] {
                if let Some(value) = attributes.get(key).filter(|v| !v.is_null()) {
                    placement.insert(key.to_string(), value.clone());
                }
            }
            if !placement.is_empty() {
                attributes.insert("placement".to_string(), Value::Object(placement));
            }
        }

        Instance::new(id, Origin::Terraform, attributes)
    }
}
