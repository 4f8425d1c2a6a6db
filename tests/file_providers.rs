use std::sync::Arc;

use driftwatch::config::Config;
use driftwatch::drift::EXISTENCE_ATTRIBUTE;
use driftwatch::{
    DetectionSettings, DriftOrchestrator, DriftRepository, InMemoryDriftRepository, Origin,
    providers,
};
use serde_json::json;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

fn write_fixtures(dir: &TempDir) -> Config {
    let snapshot = dir.path().join("instances.json");
    let state = dir.path().join("terraform.tfstate");

    std::fs::write(
        &snapshot,
        serde_json::to_string(&json!({
            "Reservations": [
                {
                    "Instances": [
                        {
                            "InstanceId": "i-web",
                            "InstanceType": "t3.large",
                            "ImageId": "ami-123",
                            "SubnetId": "subnet-1",
                            "State": { "Name": "running" },
                            "Placement": { "AvailabilityZone": "us-east-1a", "Tenancy": "default" },
                            "SecurityGroups": [
                                { "GroupId": "sg-2", "GroupName": "ssh" },
                                { "GroupId": "sg-1", "GroupName": "web" }
                            ],
                            "Tags": [{ "Key": "Name", "Value": "web" }]
                        },
                        {
                            "InstanceId": "i-manual",
                            "InstanceType": "t3.micro",
                            "State": { "Name": "running" }
                        },
                        {
                            "InstanceId": "i-gone",
                            "InstanceType": "t3.micro",
                            "State": { "Name": "terminated" }
                        }
                    ]
                }
            ]
        }))
        .unwrap(),
    )
    .unwrap();

    std::fs::write(
        &state,
        serde_json::to_string(&json!({
            "version": 4,
            "serial": 3,
            "resources": [
                {
                    "mode": "managed",
                    "type": "aws_instance",
                    "name": "web",
                    "instances": [
                        {
                            "attributes": {
                                "id": "i-web",
                                "instance_type": "t3.micro",
                                "ami": "ami-123",
                                "subnet_id": "subnet-1",
                                "availability_zone": "us-east-1a",
                                "tenancy": "default",
                                "vpc_security_group_ids": ["sg-1", "sg-2"],
                                "tags": { "Name": "web" }
                            }
                        }
                    ]
                }
            ]
        }))
        .unwrap(),
    )
    .unwrap();

    let mut config = Config::default();
    config.aws.snapshot_path = Some(snapshot);
    config.terraform.state_path = Some(state);
    config
}

fn orchestrator(config: &Config, repository: Arc<InMemoryDriftRepository>) -> DriftOrchestrator {
    DriftOrchestrator::new(
        providers::get_provider(Origin::Aws, config).unwrap(),
        providers::get_provider(Origin::Terraform, config).unwrap(),
        repository,
        DetectionSettings::from(&config.detection),
    )
}

#[tokio::test]
async fn test_snapshot_against_state_file() {
    let dir = TempDir::new().unwrap();
    let config = write_fixtures(&dir);
    let repository = Arc::new(InMemoryDriftRepository::new());
    let orchestrator = orchestrator(&config, repository.clone());

    let mut results = orchestrator
        .detect_drift_for_all(&CancellationToken::new(), &[])
        .await
        .unwrap();
    results.sort_by(|a, b| a.resource_id().cmp(b.resource_id()));

    let ids: Vec<&str> = results.iter().map(|r| r.resource_id()).collect();
    assert_eq!(ids, vec!["i-manual", "i-web"]);

    assert!(results[0].drifted_attributes().contains_key(EXISTENCE_ATTRIBUTE));

    let web = &results[1];
    assert_eq!(
        web.drifted_attributes().keys().collect::<Vec<_>>(),
        vec!["instance_type"]
    );
    assert_eq!(
        web.drifted_attributes()["instance_type"].source_value,
        Some(json!("t3.large"))
    );

    assert_eq!(repository.list_drift_results().await.unwrap().len(), 2);
}

#[tokio::test]
async fn test_nested_placement_path() {
    let dir = TempDir::new().unwrap();
    let config = write_fixtures(&dir);
    let orchestrator = orchestrator(&config, Arc::new(InMemoryDriftRepository::new()));

    let result = orchestrator
        .detect_drift_by_id(
            &CancellationToken::new(),
            "i-web",
            &[
                "placement.availability_zone".to_string(),
                "placement.tenancy".to_string(),
            ],
        )
        .await
        .unwrap();

    assert!(!result.has_drift());
}

#[tokio::test]
async fn test_missing_snapshot_file() {
    let dir = TempDir::new().unwrap();
    let mut config = write_fixtures(&dir);
    config.aws.snapshot_path = Some(dir.path().join("missing.json"));
    let orchestrator = orchestrator(&config, Arc::new(InMemoryDriftRepository::new()));

    let err = orchestrator
        .detect_drift_for_all(&CancellationToken::new(), &[])
        .await
        .unwrap_err();

    assert!(err.to_string().contains("missing.json"));
}

#[tokio::test]
async fn test_untagged_instance_has_no_drift() {
    let dir = TempDir::new().unwrap();
    let snapshot = dir.path().join("instances.json");
    let state = dir.path().join("terraform.tfstate");

    std::fs::write(
        &snapshot,
        serde_json::to_string(&json!({
            "Reservations": [{
                "Instances": [{
                    "InstanceId": "i-bare",
                    "InstanceType": "t3.micro",
                    "ImageId": "ami-123",
                    "SubnetId": "subnet-1",
                    "State": { "Name": "running" }
                }]
            }]
        }))
        .unwrap(),
    )
    .unwrap();

    std::fs::write(
        &state,
        serde_json::to_string(&json!({
            "version": 4,
            "serial": 1,
            "resources": [{
                "mode": "managed",
                "type": "aws_instance",
                "name": "bare",
                "instances": [{
                    "attributes": {
                        "id": "i-bare",
                        "instance_type": "t3.micro",
                        "ami": "ami-123",
                        "subnet_id": "subnet-1",
                        "vpc_security_group_ids": [],
                        "tags": null,
                        "tags_all": {}
                    }
                }]
            }]
        }))
        .unwrap(),
    )
    .unwrap();

    let mut config = Config::default();
    config.aws.snapshot_path = Some(snapshot);
    config.terraform.state_path = Some(state);
    let orchestrator = orchestrator(&config, Arc::new(InMemoryDriftRepository::new()));

    let result = orchestrator
        .detect_drift_by_id(&CancellationToken::new(), "i-bare", &[])
        .await
        .unwrap();

    assert!(!result.has_drift(), "unexpected drift: {:?}", result.drifted_attributes());
}
