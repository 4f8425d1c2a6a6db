use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use uuid::Uuid;

use crate::instance::{EC2_RESOURCE_TYPE, Origin};

/// Attribute path used for resources present under only one origin.
pub const EXISTENCE_ATTRIBUTE: &str = "existence";
pub const EXISTS: &str = "exists";
pub const NOT_EXISTS: &str = "not_exists";

/// One detected difference at a dot-notation path. `None` marks the side where the value is absent.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct AttributeDrift {
    pub path: String,
    pub source_value: Option<Value>,
    pub target_value: Option<Value>,
    pub changed: bool,
}

impl AttributeDrift {
    pub fn new(
        path: impl Into<String>,
        source_value: Option<Value>,
        target_value: Option<Value>,
    ) -> Self {
        Self {
            path: path.into(),
            source_value,
            target_value,
            changed: true,
        }
    }
}

pub type DriftMap = BTreeMap<String, AttributeDrift>;

/// Outcome of comparing one resource's two instances during one detection run.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct DriftResult {
    id: String,
    resource_id: String,
    resource_type: String,
    source_type: Origin,
    timestamp: DateTime<Utc>,
    has_drift: bool,
    drifted_attributes: DriftMap,
}

impl DriftResult {
    pub fn new(resource_id: impl Into<String>, source_type: Origin) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            resource_id: resource_id.into(),
            resource_type: EC2_RESOURCE_TYPE.to_string(),
            source_type,
            timestamp: Utc::now(),
            has_drift: false,
            drifted_attributes: DriftMap::new(),
        }
    }

    /// Result for a resource that exists under only one origin.
    ///
    /// `exists_in` is the origin holding the resource; values are oriented by `source_type`.
    pub fn existence(resource_id: impl Into<String>, source_type: Origin, exists_in: Origin) -> Self {
        let (source, target) = if exists_in == source_type {
            (EXISTS, NOT_EXISTS)
        } else {
            (NOT_EXISTS, EXISTS)
        };

        let mut result = Self::new(resource_id, source_type);
        result.add_drift(AttributeDrift::new(
            EXISTENCE_ATTRIBUTE,
            Some(Value::from(source)),
            Some(Value::from(target)),
        ));
        result
    }

    pub fn with_drifts(mut self, drifts: DriftMap) -> Self {
        self.set_drifted_attributes(drifts);
        self
    }

    pub fn set_drifted_attributes(&mut self, drifts: DriftMap) {
        self.drifted_attributes = drifts;
        self.has_drift = !self.drifted_attributes.is_empty();
    }

    pub fn add_drift(&mut self, drift: AttributeDrift) {
        self.drifted_attributes.insert(drift.path.clone(), drift);
        self.has_drift = true;
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn resource_id(&self) -> &str {
        &self.resource_id
    }

    pub fn resource_type(&self) -> &str {
        &self.resource_type
    }

    pub fn source_type(&self) -> Origin {
        self.source_type
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    pub fn has_drift(&self) -> bool {
        self.has_drift
    }

    pub fn drifted_attributes(&self) -> &DriftMap {
        &self.drifted_attributes
    }

    pub fn is_existence_drift(&self) -> bool {
        self.drifted_attributes.contains_key(EXISTENCE_ATTRIBUTE)
    }
}
