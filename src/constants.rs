// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Global constants for the hubmgr operator.
//!
//! This module contains the stable identifiers of the hub: component names,
//! secret and configmap names, command-line argument names and status
//! condition vocabulary. Several of these are byte-compatible contracts with
//! the workloads that consume them; change them only with a migration plan.

// ============================================================================
// API Constants
// ============================================================================

/// API group for the `ClusterManager` CRD
pub const API_GROUP: &str = "operator.open-cluster-management.io";

/// API version for the `ClusterManager` CRD
pub const API_VERSION: &str = "v1";

/// Kind name for the `ClusterManager` resource
pub const KIND_CLUSTER_MANAGER: &str = "ClusterManager";

/// Field manager used for server-side apply
pub const FIELD_MANAGER: &str = "hubmgr";

// ============================================================================
// Hub Topology
// ============================================================================

/// Namespace all namespaced hub resources live in
pub const HUB_NAMESPACE: &str = "open-cluster-management-hub";

/// Prefix for the hub's cluster-scoped RBAC object names
pub const RBAC_NAME_PREFIX: &str = "open-cluster-management";

/// Deployment name suffix for the registration controller
pub const SUFFIX_REGISTRATION_CONTROLLER: &str = "registration-controller";

/// Deployment name suffix for the registration webhook server
pub const SUFFIX_REGISTRATION_WEBHOOK: &str = "registration-webhook";

/// Deployment name suffix for the work webhook server
pub const SUFFIX_WORK_WEBHOOK: &str = "work-webhook";

/// Deployment name suffix for the placement controller
pub const SUFFIX_PLACEMENT_CONTROLLER: &str = "placement-controller";

/// Deployment name suffix for the work (manifestwork replicaset) controller
pub const SUFFIX_WORK_CONTROLLER: &str = "work-controller";

/// Deployment name suffix for the addon manager controller
pub const SUFFIX_ADDON_MANAGER: &str = "addon-manager-controller";

/// Service account for the registration controller
pub const SA_REGISTRATION_CONTROLLER: &str = "registration-controller-sa";

/// Service account for the registration webhook
pub const SA_REGISTRATION_WEBHOOK: &str = "registration-webhook-sa";

/// Service account for the work webhook
pub const SA_WORK_WEBHOOK: &str = "work-webhook-sa";

/// Service account for the placement controller
pub const SA_PLACEMENT_CONTROLLER: &str = "placement-controller-sa";

/// Service account for the work controller
pub const SA_WORK_CONTROLLER: &str = "work-controller-sa";

/// Service account for the addon manager controller
pub const SA_ADDON_MANAGER: &str = "addon-manager-controller-sa";

// ============================================================================
// Webhook Registration
// ============================================================================

/// Validating webhook configuration guarding managed cluster objects
pub const WEBHOOK_CLUSTER_VALIDATING: &str =
    "managedclustervalidators.admission.cluster.open-cluster-management.io";

/// Mutating webhook configuration defaulting managed cluster objects
pub const WEBHOOK_CLUSTER_MUTATING: &str =
    "managedclustermutators.admission.cluster.open-cluster-management.io";

/// Validating webhook configuration guarding manifest work objects
pub const WEBHOOK_WORK_VALIDATING: &str =
    "manifestworkvalidators.admission.work.open-cluster-management.io";

/// Container port webhook servers listen on
pub const WEBHOOK_CONTAINER_PORT: i32 = 9443;

/// Service port webhook clients connect to
pub const WEBHOOK_SERVICE_PORT: i32 = 443;

// ============================================================================
// Certificate Material
// ============================================================================

/// Secret holding the signing CA key pair
pub const SIGNER_SECRET: &str = "signer-secret";

/// Serving cert secret for the registration webhook endpoint
pub const REGISTRATION_WEBHOOK_SERVING_CERT: &str = "registration-webhook-serving-cert";

/// Serving cert secret for the work webhook endpoint
pub const WORK_WEBHOOK_SERVING_CERT: &str = "work-webhook-serving-cert";

/// ConfigMap publishing the aggregated CA trust bundle
pub const CA_BUNDLE_CONFIGMAP: &str = "ca-bundle-configmap";

/// Key of the concatenated PEM bundle inside [`CA_BUNDLE_CONFIGMAP`]
pub const CA_BUNDLE_KEY: &str = "ca-bundle.crt";

/// Secret data key for a PEM certificate
pub const TLS_CERT_KEY: &str = "tls.crt";

/// Secret data key for a PEM private key
pub const TLS_PRIVATE_KEY_KEY: &str = "tls.key";

/// Common-name prefix stamped on every signing CA (`<prefix>@<epoch>`)
pub const SIGNER_NAME_PREFIX: &str = "cluster-manager-webhook-signer";

// ============================================================================
// Work Driver
// ============================================================================

/// The default work delivery backend
pub const WORK_DRIVER_KUBE: &str = "kube";

/// Secret carrying connection configuration for a non-default work driver.
///
/// Provided by the user in the operator namespace; mirrored into the hub
/// namespace and mounted on the work controller.
pub const WORK_DRIVER_CONFIG_SECRET: &str = "work-driver-config";

/// Volume name for the mirrored work driver config secret
pub const WORK_DRIVER_CONFIG_VOLUME: &str = "workdriverconfig";

/// Mount path of the work driver config volume
pub const WORK_DRIVER_CONFIG_MOUNT_PATH: &str = "/var/run/secrets/work/config";

// ============================================================================
// Hosted Mode
// ============================================================================

/// Secret holding the external hub kubeconfig in Hosted mode
pub const EXTERNAL_HUB_KUBECONFIG_SECRET: &str = "external-hub-kubeconfig";

/// Volume name for the external hub kubeconfig
pub const EXTERNAL_HUB_KUBECONFIG_VOLUME: &str = "kubeconfig";

/// Mount path of the external hub kubeconfig volume
pub const EXTERNAL_HUB_KUBECONFIG_MOUNT_PATH: &str = "/var/run/secrets/hub";

// ============================================================================
// Workload Command-Line Contract
// ============================================================================

/// Selects the work delivery backend on the work controller
pub const ARG_WORK_DRIVER: &str = "--work-driver";

/// CSV user list whose cluster join requests are auto approved
pub const ARG_AUTO_APPROVAL_USERS: &str = "--cluster-auto-approval-users";

/// CSV identity list whose CSRs are auto approved (csr driver only)
pub const ARG_AUTO_APPROVED_CSR_USERS: &str = "--auto-approved-csr-users";

/// Agent image reference handed to the cluster importer
pub const ARG_AGENT_IMAGE: &str = "--agent-image";

/// Serialized user label set propagated to hub-created resources
pub const ARG_LABELS: &str = "--labels";

/// Feature gate toggle, one occurrence per gate
pub const ARG_FEATURE_GATES: &str = "--feature-gates";

/// Kubeconfig path argument used in Hosted mode
pub const ARG_KUBECONFIG: &str = "--kubeconfig";

// ============================================================================
// Status Conditions
// ============================================================================

/// Condition type: every required resource applied without error
pub const CONDITION_APPLIED: &str = "Applied";

/// Reason on [`CONDITION_APPLIED`] when the apply pass completed
pub const REASON_APPLIED: &str = "ClusterManagerApplied";

/// Condition type: rollout convergence across subsystems
pub const CONDITION_PROGRESSING: &str = "Progressing";

/// Reason on [`CONDITION_PROGRESSING`] while any deployment is rolling
pub const REASON_DEPLOYMENT_ROLLING: &str = "ClusterManagerDeploymentRolling";

/// Reason on [`CONDITION_PROGRESSING`] when every deployment converged
pub const REASON_UP_TO_DATE: &str = "ClusterManagerUpToDate";

/// Condition type: requested feature gate names were all known
pub const CONDITION_FEATURE_GATES_VALID: &str = "ValidFeatureGates";

/// Reason on [`CONDITION_FEATURE_GATES_VALID`] when all names validated
pub const REASON_FEATURE_GATES_ALL_VALID: &str = "FeatureGatesAllValid";

/// Reason on [`CONDITION_FEATURE_GATES_VALID`] when unknown names were seen
pub const REASON_FEATURE_GATES_INVALID: &str = "InvalidFeatureGatesExisting";

/// Condition status string for a true condition
pub const STATUS_TRUE: &str = "True";

/// Condition status string for a false condition
pub const STATUS_FALSE: &str = "False";
