// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! RBAC builders for the hub components.
//!
//! Cluster role names follow the stable
//! `open-cluster-management:<cm>-<component>:<kind>` scheme; each binding
//! carries the same name as its role. Feature gates may extend a shared
//! role's rule set (`ClusterProfile`, `ClusterImporter`) without adding new
//! objects.

use crate::constants::{RBAC_NAME_PREFIX, SA_ADDON_MANAGER};
use crate::feature_gates::{
    is_enabled, EffectiveGates, FEATURE_CLUSTER_IMPORTER, FEATURE_CLUSTER_PROFILE,
};
use crate::hub_resources::HubNames;
use crate::labels;
use k8s_openapi::api::core::v1::ServiceAccount;
use k8s_openapi::api::rbac::v1::{
    ClusterRole, ClusterRoleBinding, PolicyRule, RoleBinding, RoleRef, Subject,
};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use std::collections::BTreeMap;

/// Stable cluster role name: `open-cluster-management:<cm>-<component>:<kind>`.
#[must_use]
pub fn role_name(names: &HubNames, component: &str, kind: &str) -> String {
    format!(
        "{RBAC_NAME_PREFIX}:{}-{component}:{kind}",
        names.cluster_manager
    )
}

/// A hub service account in the hub namespace.
#[must_use]
pub fn service_account(
    names: &HubNames,
    name: &str,
    user_labels: &BTreeMap<String, String>,
) -> ServiceAccount {
    ServiceAccount {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            namespace: Some(names.namespace.clone()),
            labels: Some(labels::merge(name, &names.cluster_manager, user_labels)),
            ..Default::default()
        },
        ..Default::default()
    }
}

fn rule(api_groups: &[&str], resources: &[&str], verbs: &[&str]) -> PolicyRule {
    PolicyRule {
        api_groups: Some(api_groups.iter().map(ToString::to_string).collect()),
        resources: Some(resources.iter().map(ToString::to_string).collect()),
        verbs: verbs.iter().map(ToString::to_string).collect(),
        ..Default::default()
    }
}

fn cluster_role(
    names: &HubNames,
    name: String,
    user_labels: &BTreeMap<String, String>,
    rules: Vec<PolicyRule>,
) -> ClusterRole {
    ClusterRole {
        metadata: ObjectMeta {
            name: Some(name.clone()),
            labels: Some(labels::merge(&name, &names.cluster_manager, user_labels)),
            ..Default::default()
        },
        rules: Some(rules),
        ..Default::default()
    }
}

fn cluster_role_binding(
    names: &HubNames,
    name: String,
    service_account: &str,
    user_labels: &BTreeMap<String, String>,
) -> ClusterRoleBinding {
    ClusterRoleBinding {
        metadata: ObjectMeta {
            name: Some(name.clone()),
            labels: Some(labels::merge(&name, &names.cluster_manager, user_labels)),
            ..Default::default()
        },
        role_ref: RoleRef {
            api_group: "rbac.authorization.k8s.io".to_string(),
            kind: "ClusterRole".to_string(),
            name,
        },
        subjects: Some(vec![Subject {
            kind: "ServiceAccount".to_string(),
            name: service_account.to_string(),
            namespace: Some(names.namespace.clone()),
            ..Default::default()
        }]),
    }
}

/// Registration controller cluster role.
///
/// The `ClusterProfile` and `ClusterImporter` gates extend the rule set with
/// their API groups; disabling a gate removes the rules again.
#[must_use]
pub fn registration_controller_role(
    names: &HubNames,
    user_labels: &BTreeMap<String, String>,
    gates: &EffectiveGates,
) -> ClusterRole {
    let mut rules = vec![
        rule(&[""], &["configmaps", "namespaces", "serviceaccounts"], &["get", "list", "watch", "create", "update", "delete"]),
        rule(&[""], &["events"], &["create", "patch", "update"]),
        rule(&["coordination.k8s.io"], &["leases"], &["get", "create", "update"]),
        rule(
            &["certificates.k8s.io"],
            &["certificatesigningrequests", "certificatesigningrequests/approval"],
            &["get", "list", "watch", "update"],
        ),
        rule(
            &["cluster.open-cluster-management.io"],
            &["managedclusters", "managedclusters/status", "managedclustersets", "managedclustersetbindings"],
            &["get", "list", "watch", "create", "update", "patch", "delete"],
        ),
        rule(
            &["addon.open-cluster-management.io"],
            &["managedclusteraddons", "managedclusteraddons/status"],
            &["get", "list", "watch", "update", "patch"],
        ),
    ];

    if is_enabled(gates, FEATURE_CLUSTER_PROFILE) {
        rules.push(rule(
            &["multicluster.x-k8s.io"],
            &["clusterprofiles", "clusterprofiles/status"],
            &["get", "list", "watch", "create", "update", "patch", "delete"],
        ));
    }
    if is_enabled(gates, FEATURE_CLUSTER_IMPORTER) {
        rules.push(rule(
            &["cluster.x-k8s.io"],
            &["clusters", "machines"],
            &["get", "list", "watch"],
        ));
    }

    cluster_role(
        names,
        role_name(names, "registration", "controller"),
        user_labels,
        rules,
    )
}

/// Registration controller cluster role binding.
#[must_use]
pub fn registration_controller_binding(
    names: &HubNames,
    user_labels: &BTreeMap<String, String>,
) -> ClusterRoleBinding {
    cluster_role_binding(
        names,
        role_name(names, "registration", "controller"),
        crate::constants::SA_REGISTRATION_CONTROLLER,
        user_labels,
    )
}

/// Registration webhook cluster role.
#[must_use]
pub fn registration_webhook_role(
    names: &HubNames,
    user_labels: &BTreeMap<String, String>,
) -> ClusterRole {
    cluster_role(
        names,
        role_name(names, "registration", "webhook"),
        user_labels,
        vec![
            rule(&[""], &["configmaps"], &["get", "list", "watch"]),
            rule(
                &["cluster.open-cluster-management.io"],
                &["managedclusters", "managedclustersets"],
                &["get", "list", "watch"],
            ),
            rule(
                &["authorization.k8s.io"],
                &["subjectaccessreviews"],
                &["create"],
            ),
        ],
    )
}

/// Registration webhook cluster role binding.
#[must_use]
pub fn registration_webhook_binding(
    names: &HubNames,
    user_labels: &BTreeMap<String, String>,
) -> ClusterRoleBinding {
    cluster_role_binding(
        names,
        role_name(names, "registration", "webhook"),
        crate::constants::SA_REGISTRATION_WEBHOOK,
        user_labels,
    )
}

/// Work webhook cluster role.
#[must_use]
pub fn work_webhook_role(
    names: &HubNames,
    user_labels: &BTreeMap<String, String>,
) -> ClusterRole {
    cluster_role(
        names,
        role_name(names, "work", "webhook"),
        user_labels,
        vec![
            rule(&[""], &["configmaps"], &["get", "list", "watch"]),
            rule(
                &["work.open-cluster-management.io"],
                &["manifestworks"],
                &["get", "list", "watch"],
            ),
            rule(
                &["authorization.k8s.io"],
                &["subjectaccessreviews"],
                &["create"],
            ),
        ],
    )
}

/// Work webhook cluster role binding.
#[must_use]
pub fn work_webhook_binding(
    names: &HubNames,
    user_labels: &BTreeMap<String, String>,
) -> ClusterRoleBinding {
    cluster_role_binding(
        names,
        role_name(names, "work", "webhook"),
        crate::constants::SA_WORK_WEBHOOK,
        user_labels,
    )
}

/// Placement controller cluster role.
#[must_use]
pub fn placement_controller_role(
    names: &HubNames,
    user_labels: &BTreeMap<String, String>,
) -> ClusterRole {
    cluster_role(
        names,
        role_name(names, "placement", "controller"),
        user_labels,
        vec![
            rule(&[""], &["events"], &["create", "patch", "update"]),
            rule(&["coordination.k8s.io"], &["leases"], &["get", "create", "update"]),
            rule(
                &["cluster.open-cluster-management.io"],
                &[
                    "managedclusters",
                    "managedclustersets",
                    "placements",
                    "placements/status",
                    "placementdecisions",
                    "placementdecisions/status",
                ],
                &["get", "list", "watch", "create", "update", "patch", "delete"],
            ),
        ],
    )
}

/// Placement controller cluster role binding.
#[must_use]
pub fn placement_controller_binding(
    names: &HubNames,
    user_labels: &BTreeMap<String, String>,
) -> ClusterRoleBinding {
    cluster_role_binding(
        names,
        role_name(names, "placement", "controller"),
        crate::constants::SA_PLACEMENT_CONTROLLER,
        user_labels,
    )
}

/// Work controller cluster role (owned by the `ManifestWorkReplicaSet` gate).
#[must_use]
pub fn work_controller_role(
    names: &HubNames,
    user_labels: &BTreeMap<String, String>,
) -> ClusterRole {
    cluster_role(
        names,
        role_name(names, "work", "controller"),
        user_labels,
        vec![
            rule(&[""], &["events"], &["create", "patch", "update"]),
            rule(&["coordination.k8s.io"], &["leases"], &["get", "create", "update"]),
            rule(
                &["work.open-cluster-management.io"],
                &[
                    "manifestworks",
                    "manifestworks/status",
                    "manifestworkreplicasets",
                    "manifestworkreplicasets/status",
                ],
                &["get", "list", "watch", "create", "update", "patch", "delete"],
            ),
            rule(
                &["cluster.open-cluster-management.io"],
                &["placements", "placementdecisions"],
                &["get", "list", "watch"],
            ),
        ],
    )
}

/// Work controller cluster role binding.
#[must_use]
pub fn work_controller_binding(
    names: &HubNames,
    user_labels: &BTreeMap<String, String>,
) -> ClusterRoleBinding {
    cluster_role_binding(
        names,
        role_name(names, "work", "controller"),
        crate::constants::SA_WORK_CONTROLLER,
        user_labels,
    )
}

/// AddOn manager cluster role (owned by the `AddonManagement` gate).
#[must_use]
pub fn addon_manager_role(
    names: &HubNames,
    user_labels: &BTreeMap<String, String>,
) -> ClusterRole {
    cluster_role(
        names,
        role_name(names, "addon-manager", "controller"),
        user_labels,
        vec![
            rule(&[""], &["configmaps", "events"], &["get", "list", "watch", "create", "update", "patch"]),
            rule(&["coordination.k8s.io"], &["leases"], &["get", "create", "update"]),
            rule(
                &["addon.open-cluster-management.io"],
                &[
                    "clustermanagementaddons",
                    "clustermanagementaddons/status",
                    "managedclusteraddons",
                    "managedclusteraddons/status",
                    "addondeploymentconfigs",
                ],
                &["get", "list", "watch", "create", "update", "patch", "delete"],
            ),
            rule(
                &["work.open-cluster-management.io"],
                &["manifestworks"],
                &["get", "list", "watch", "create", "update", "delete"],
            ),
        ],
    )
}

/// AddOn manager cluster role binding.
#[must_use]
pub fn addon_manager_binding(
    names: &HubNames,
    user_labels: &BTreeMap<String, String>,
) -> ClusterRoleBinding {
    cluster_role_binding(
        names,
        role_name(names, "addon-manager", "controller"),
        SA_ADDON_MANAGER,
        user_labels,
    )
}

/// Grants the addon manager read access to the API aggregation client CA.
///
/// Lives in `kube-system`, where the `extension-apiserver-authentication-reader`
/// role is defined.
#[must_use]
pub fn addon_manager_auth_reader_binding(
    names: &HubNames,
    user_labels: &BTreeMap<String, String>,
) -> RoleBinding {
    let name = format!("{}-addon-manager-auth-reader", names.cluster_manager);
    RoleBinding {
        metadata: ObjectMeta {
            name: Some(name.clone()),
            namespace: Some("kube-system".to_string()),
            labels: Some(labels::merge(&name, &names.cluster_manager, user_labels)),
            ..Default::default()
        },
        role_ref: RoleRef {
            api_group: "rbac.authorization.k8s.io".to_string(),
            kind: "Role".to_string(),
            name: "extension-apiserver-authentication-reader".to_string(),
        },
        subjects: Some(vec![Subject {
            kind: "ServiceAccount".to_string(),
            name: SA_ADDON_MANAGER.to_string(),
            namespace: Some(names.namespace.clone()),
            ..Default::default()
        }]),
    }
}

#[cfg(test)]
#[path = "rbac_tests.rs"]
mod rbac_tests;
