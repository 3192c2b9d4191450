// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Custom Resource Definition types for the hubmgr operator.
//!
//! The operator is driven by a single cluster-scoped `ClusterManager`
//! resource describing the desired hub: deployment mode, per-component
//! feature gates, the work delivery backend, node placement constraints and
//! user labels. The operator owns the `status` sub-object exclusively and
//! converges the cluster toward the spec.
//!
//! # Example
//!
//! ```yaml
//! apiVersion: operator.open-cluster-management.io/v1
//! kind: ClusterManager
//! metadata:
//!   name: cluster-manager
//! spec:
//!   registrationImagePullSpec: quay.io/open-cluster-management/registration:latest
//!   workImagePullSpec: quay.io/open-cluster-management/work:latest
//!   placementImagePullSpec: quay.io/open-cluster-management/placement:latest
//!   addOnManagerImagePullSpec: quay.io/open-cluster-management/addon-manager:latest
//!   deployOption:
//!     mode: Default
//!   workConfiguration:
//!     workDriver: kube
//!     featureGates:
//!       - feature: ManifestWorkReplicaSet
//!         mode: Enable
//! ```

use k8s_openapi::api::core::v1::Toleration;
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Deployment mode of the hub control plane.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub enum InstallMode {
    /// All hub components run in the cluster the operator manages.
    #[default]
    Default,
    /// Hub components run split from the managed control plane and reach it
    /// through an external kubeconfig.
    Hosted,
}

/// How the hub is deployed.
#[derive(Clone, Debug, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct DeployOption {
    /// Install mode, `Default` or `Hosted`.
    #[serde(default)]
    pub mode: InstallMode,
}

/// Requested mode of a single feature gate.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub enum FeatureGateMode {
    /// Turn the feature on.
    #[default]
    Enable,
    /// Turn the feature off.
    Disable,
}

/// A named, independently toggleable optional capability.
///
/// Unknown feature names are rejected during validation and surfaced on the
/// `ValidFeatureGates` condition; they are never silently ignored.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct FeatureGate {
    /// Feature name, e.g. `ManifestWorkReplicaSet`.
    pub feature: String,
    /// Requested mode. Overrides the operator default for the feature.
    #[serde(default)]
    pub mode: FeatureGateMode,
}

/// Per-auth-type registration driver configuration.
#[derive(Clone, Debug, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct RegistrationDriver {
    /// Authentication type of the driver, e.g. `csr`.
    pub auth_type: String,
    /// CSR driver parameters, present when `authType` is `csr`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub csr: Option<CSRConfig>,
}

/// Parameters of the `csr` registration driver.
#[derive(Clone, Debug, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct CSRConfig {
    /// Identities whose certificate signing requests are auto approved.
    #[serde(default)]
    pub auto_approved_identities: Vec<String>,
}

/// Registration subsystem configuration.
#[derive(Clone, Debug, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct RegistrationConfiguration {
    /// Users whose cluster join requests are approved without intervention.
    #[serde(default)]
    pub auto_approve_users: Vec<String>,

    /// Per-auth-type driver configurations.
    #[serde(default)]
    pub registration_drivers: Vec<RegistrationDriver>,

    /// Feature gates of the registration subsystem.
    #[serde(default)]
    pub feature_gates: Vec<FeatureGate>,
}

/// Work subsystem configuration.
#[derive(Clone, Debug, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct WorkConfiguration {
    /// Work delivery backend: `kube` (default), `grpc` or `mqtt`.
    ///
    /// Selecting a non-default driver requires the `CloudEventsDrivers`
    /// feature gate and a `work-driver-config` secret in the operator
    /// namespace holding the connection configuration.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub work_driver: Option<String>,

    /// Feature gates of the work subsystem.
    #[serde(default)]
    pub feature_gates: Vec<FeatureGate>,
}

/// AddOn manager subsystem configuration.
#[derive(Clone, Debug, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct AddOnManagerConfiguration {
    /// Feature gates of the addon manager subsystem.
    #[serde(default)]
    pub feature_gates: Vec<FeatureGate>,
}

/// Node placement constraints applied verbatim to every hub workload.
#[derive(Clone, Debug, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct NodePlacement {
    /// Node selector copied onto every pod template.
    #[serde(default)]
    pub node_selector: BTreeMap<String, String>,

    /// Tolerations copied onto every pod template.
    #[serde(default)]
    pub tolerations: Vec<Toleration>,
}

/// `ClusterManager` describes a multi-component control-plane hub.
///
/// The operator resolves this spec plus the effective feature gates into a
/// set of managed resources, converges the cluster toward it and reports
/// aggregated health through `status.conditions`.
#[derive(CustomResource, Clone, Debug, Default, Serialize, Deserialize, JsonSchema)]
#[kube(
    group = "operator.open-cluster-management.io",
    version = "v1",
    kind = "ClusterManager",
    doc = "ClusterManager configures the hub control plane: deployment mode, feature gates, work delivery backend, node placement and component images."
)]
#[kube(status = "ClusterManagerStatus")]
#[serde(rename_all = "camelCase")]
pub struct ClusterManagerSpec {
    /// Image pull spec of the registration controller and webhook.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub registration_image_pull_spec: Option<String>,

    /// Image pull spec of the work webhook and work controller.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub work_image_pull_spec: Option<String>,

    /// Image pull spec of the placement controller.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub placement_image_pull_spec: Option<String>,

    /// Image pull spec of the addon manager controller.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub add_on_manager_image_pull_spec: Option<String>,

    /// Deployment mode of the hub.
    #[serde(default)]
    pub deploy_option: DeployOption,

    /// Registration subsystem configuration. Absent means registry defaults.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub registration_configuration: Option<RegistrationConfiguration>,

    /// Work subsystem configuration. Absent means registry defaults.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub work_configuration: Option<WorkConfiguration>,

    /// AddOn manager subsystem configuration. Absent means registry defaults.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub add_on_manager_configuration: Option<AddOnManagerConfiguration>,

    /// Node placement constraints for every hub workload.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node_placement: Option<NodePlacement>,
}

/// Status condition following the Kubernetes conventions.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Condition {
    /// Condition type, e.g. `Applied`, `Progressing`.
    pub r#type: String,
    /// `True`, `False` or `Unknown`.
    pub status: String,
    /// Programmatic `CamelCase` identifier of the last transition.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    /// Human-readable explanation.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// RFC3339 timestamp of the last status flip.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_transition_time: Option<String>,
}

/// Identity of a resource currently managed on behalf of a `ClusterManager`.
///
/// The count and membership of `status.relatedResources` are part of the
/// observable contract: toggling a feature gate changes the count by exactly
/// the number of resources that feature owns.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct RelatedResource {
    /// API group of the resource, empty for the core group.
    #[serde(default)]
    pub group: String,
    /// API version of the resource.
    pub version: String,
    /// Lowercase plural resource name, e.g. `deployments`.
    pub resource: String,
    /// Namespace, empty for cluster-scoped resources.
    #[serde(default)]
    pub namespace: String,
    /// Resource name.
    pub name: String,
}

/// Last reconciled generation of a managed workload.
///
/// Used to detect externally-caused drift independent of spec changes: once
/// convergence completes, `lastGeneration` matches the generation on the
/// live object.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct GenerationStatus {
    /// API group of the tracked resource.
    #[serde(default)]
    pub group: String,
    /// API version of the tracked resource.
    pub version: String,
    /// Lowercase plural resource name.
    pub resource: String,
    /// Namespace of the tracked resource.
    #[serde(default)]
    pub namespace: String,
    /// Name of the tracked resource.
    pub name: String,
    /// Generation observed at apply time.
    pub last_generation: i64,
}

/// Status of a `ClusterManager`, owned exclusively by the operator.
#[derive(Clone, Debug, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ClusterManagerStatus {
    /// Spec generation most recently fully reconciled.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub observed_generation: Option<i64>,

    /// Typed health and progress conditions.
    #[serde(default)]
    pub conditions: Vec<Condition>,

    /// Inventory of every resource currently managed for this hub.
    #[serde(default)]
    pub related_resources: Vec<RelatedResource>,

    /// Per-workload generation bookkeeping.
    #[serde(default)]
    pub generations: Vec<GenerationStatus>,
}

#[cfg(test)]
#[path = "crd_tests.rs"]
mod crd_tests;
