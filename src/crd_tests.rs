// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for `crd.rs`

#[cfg(test)]
mod tests {
    use super::super::{
        ClusterManager, ClusterManagerSpec, DeployOption, FeatureGate, FeatureGateMode,
        InstallMode, WorkConfiguration,
    };
    use kube::{CustomResourceExt, Resource};

    #[test]
    fn test_cluster_manager_is_cluster_scoped() {
        let crd = ClusterManager::crd();
        assert_eq!(crd.spec.scope, "Cluster");
        assert_eq!(crd.spec.group, "operator.open-cluster-management.io");
        assert_eq!(crd.spec.names.kind, "ClusterManager");
    }

    #[test]
    fn test_api_version() {
        assert_eq!(
            ClusterManager::api_version(&()),
            "operator.open-cluster-management.io/v1"
        );
    }

    #[test]
    fn test_spec_roundtrip_camel_case() {
        let spec = ClusterManagerSpec {
            registration_image_pull_spec: Some("img:latest".to_string()),
            deploy_option: DeployOption {
                mode: InstallMode::Hosted,
            },
            work_configuration: Some(WorkConfiguration {
                work_driver: Some("grpc".to_string()),
                feature_gates: vec![FeatureGate {
                    feature: "ManifestWorkReplicaSet".to_string(),
                    mode: FeatureGateMode::Disable,
                }],
            }),
            ..Default::default()
        };

        let value = serde_json::to_value(&spec).unwrap();
        assert_eq!(value["registrationImagePullSpec"], "img:latest");
        assert_eq!(value["deployOption"]["mode"], "Hosted");
        assert_eq!(value["workConfiguration"]["workDriver"], "grpc");
        assert_eq!(
            value["workConfiguration"]["featureGates"][0]["feature"],
            "ManifestWorkReplicaSet"
        );

        let parsed: ClusterManagerSpec = serde_json::from_value(value).unwrap();
        assert_eq!(parsed.deploy_option.mode, InstallMode::Hosted);
    }

    #[test]
    fn test_defaults_on_empty_spec() {
        let spec: ClusterManagerSpec = serde_json::from_value(serde_json::json!({})).unwrap();

        assert_eq!(spec.deploy_option.mode, InstallMode::Default);
        assert!(spec.registration_configuration.is_none());
        assert!(spec.work_configuration.is_none());
        assert!(spec.add_on_manager_configuration.is_none());
        assert!(spec.node_placement.is_none());
    }

    #[test]
    fn test_feature_gate_mode_defaults_to_enable() {
        let gate: FeatureGate =
            serde_json::from_value(serde_json::json!({"feature": "DefaultClusterSet"})).unwrap();
        assert_eq!(gate.mode, FeatureGateMode::Enable);
    }

    #[test]
    fn test_status_serializes_related_resources() {
        use super::super::{ClusterManagerStatus, RelatedResource};

        let status = ClusterManagerStatus {
            observed_generation: Some(2),
            related_resources: vec![RelatedResource {
                group: "apps".to_string(),
                version: "v1".to_string(),
                resource: "deployments".to_string(),
                namespace: "open-cluster-management-hub".to_string(),
                name: "cluster-manager-registration-controller".to_string(),
            }],
            ..Default::default()
        };

        let value = serde_json::to_value(&status).unwrap();
        assert_eq!(value["observedGeneration"], 2);
        assert_eq!(value["relatedResources"][0]["resource"], "deployments");
    }
}
