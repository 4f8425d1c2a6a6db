use serde::Deserialize;
use serde_json::{Map, Value};

use crate::instance::{Instance, Origin};

pub const TERMINATED_STATE: &str = "terminated";

/// Output of `aws ec2 describe-instances --output json`.
#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "PascalCase")]
pub struct DescribeInstancesOutput {
    #[serde(default)]
    pub reservations: Vec<Reservation>,
}

impl DescribeInstancesOutput {
    pub fn into_instances(self) -> impl Iterator<Item = Ec2Instance> {
        self.reservations
            .into_iter()
            .flat_map(|reservation| reservation.instances)
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Reservation {
    #[serde(default)]
    pub instances: Vec<Ec2Instance>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Ec2Instance {
    pub instance_id: String,
    pub instance_type: Option<String>,
    pub image_id: Option<String>,
    pub subnet_id: Option<String>,
    pub vpc_id: Option<String>,
    pub key_name: Option<String>,
    pub private_ip_address: Option<String>,
    pub public_ip_address: Option<String>,
    pub ebs_optimized: Option<bool>,
    pub monitoring: Option<Monitoring>,
    pub state: Option<InstanceState>,
    pub placement: Option<Placement>,
    #[serde(default)]
    pub security_groups: Vec<GroupIdentifier>,
    #[serde(default)]
    pub tags: Vec<Tag>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Monitoring {
    pub state: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct InstanceState {
    pub name: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Placement {
    pub availability_zone: Option<String>,
    pub tenancy: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct GroupIdentifier {
    pub group_id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Tag {
    pub key: String,
    #[serde(default)]
    pub value: String,
}

impl Ec2Instance {
    pub fn is_terminated(&self) -> bool {
        self.state
            .as_ref()
            .and_then(|s| s.name.as_deref())
            .is_some_and(|name| name == TERMINATED_STATE)
    }

    /// Normalizes the API shape to Terraform `aws_instance` attribute names.
    pub fn into_instance(self) -> Instance {
        let mut attributes = Map::new();
        attributes.insert("id".to_string(), Value::String(self.instance_id.clone()));

        put(&mut attributes, "instance_type", self.instance_type);
        put(&mut attributes, "ami", self.image_id);
        put(&mut attributes, "subnet_id", self.subnet_id);
        put(&mut attributes, "vpc_id", self.vpc_id);
        put(&mut attributes, "key_name", self.key_name);
        put(&mut attributes, "private_ip", self.private_ip_address);
        put(&mut attributes, "public_ip", self.public_ip_address);
        put(&mut attributes, "ebs_optimized", self.ebs_optimized);
        put(
            &mut attributes,
            "monitoring",
            self.monitoring
                .and_then(|m| m.state)
                .map(|state| state == "enabled"),
        );
        put(
            &mut attributes,
            "instance_state",
            self.state.and_then(|s| s.name),
        );

        if let Some(placement) = self.placement {
            put(
                &mut attributes,
                "availability_zone",
                placement.availability_zone.clone(),
            );

            let mut nested = Map::new();
            put(&mut nested, "availability_zone", placement.availability_zone);
            put(&mut nested, "tenancy", placement.tenancy);
            attributes.insert("placement".to_string(), Value::Object(nested));
        }

        // Terraform records an untagged instance as `tags: null`, so empty collections are omitted
        if !self.security_groups.is_empty() {
            let group_ids: Vec<Value> = self
                .security_groups
                .into_iter()
                .map(|group| Value::String(group.group_id))
                .collect();
            attributes.insert("vpc_security_group_ids".to_string(), Value::Array(group_ids));
        }

        if !self.tags.is_empty() {
            let tags: Map<String, Value> = self
                .tags
                .into_iter()
                .map(|tag| (tag.key, Value::String(tag.value)))
                .collect();
            attributes.insert("tags".to_string(), Value::Object(tags));
        }

        Instance::new(self.instance_id, Origin::Aws, attributes)
    }
}

fn put<T: Into<Value>>(attributes: &mut Map<String, Value>, key: &str, value: Option<T>) {
    if let Some(value) = value {
        attributes.insert(key.to_string(), value.into());
    }
}
