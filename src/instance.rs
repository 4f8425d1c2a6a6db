use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Terraform resource type every compared instance maps to.
pub const EC2_RESOURCE_TYPE: &str = "aws_instance";

/// Attribute paths compared when the caller supplies none.
pub const DEFAULT_ATTRIBUTE_PATHS: &[&str] = &[
    "instance_type",
    "ami",
    "subnet_id",
    "vpc_security_group_ids",
    "tags",
];

pub fn default_attribute_paths() -> Vec<String> {
    DEFAULT_ATTRIBUTE_PATHS
        .iter()
        .map(|p| p.to_string())
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum Origin {
    Aws,
    Terraform,
}

impl Origin {
    pub fn as_str(&self) -> &'static str {
        match self {
            Origin::Aws => "aws",
            Origin::Terraform => "terraform",
        }
    }

    pub fn opposite(&self) -> Origin {
        match self {
            Origin::Aws => Origin::Terraform,
            Origin::Terraform => Origin::Aws,
        }
    }
}

impl fmt::Display for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One resource's observed (AWS) or declared (Terraform) configuration.
///
/// Attributes are owned by the instance and never change after construction.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Instance {
    id: String,
    origin: Origin,
    attributes: Map<String, Value>,
}

impl Instance {
    pub fn new(id: impl Into<String>, origin: Origin, attributes: Map<String, Value>) -> Self {
        Self {
            id: id.into(),
            origin,
            attributes,
        }
    }

    /// Builds an instance from a JSON object; any other value yields no attributes.
    pub fn from_value(id: impl Into<String>, origin: Origin, attributes: Value) -> Self {
        let attributes = match attributes {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        Self::new(id, origin, attributes)
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn origin(&self) -> Origin {
        self.origin
    }

    pub fn attributes(&self) -> &Map<String, Value> {
        &self.attributes
    }

    /// Resolves a dot-notation path through nested maps.
    ///
    /// Returns `None` when a segment is missing, when traversal hits a non-map, or when the
    /// resolved value is `null`.
    pub fn attribute(&self, path: &str) -> Option<&Value> {
        resolve_path(&self.attributes, path)
    }
}

pub(crate) fn resolve_path<'a>(attributes: &'a Map<String, Value>, path: &str) -> Option<&'a Value> {
    let mut segments = path.split('.');
    let first = segments.next()?;
    let mut current = attributes.get(first)?;

    for segment in segments {
        current = current.as_object()?.get(segment)?;
    }

    // NOTE: Terraform state records unset attributes as null
    if current.is_null() { None } else { Some(current) }
}
