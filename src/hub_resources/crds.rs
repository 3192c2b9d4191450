// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Hub API surface: the CustomResourceDefinitions the hub workloads serve.
//!
//! The manifests are opaque parameterized data from the operator's point of
//! view; they are embedded at compile time and applied as part of the
//! required resource set. The set is static: feature gates own workloads and
//! RBAC, never CRDs.

use anyhow::{Context, Result};
use k8s_openapi::apiextensions_apiserver::pkg::apis::apiextensions::v1::CustomResourceDefinition;

// Embed the CRD manifests at compile time
const HUB_CRD_MANIFESTS: &[(&str, &str)] = &[
    (
        "managedclusters",
        include_str!("../../manifests/hub-crds/managedclusters.yaml"),
    ),
    (
        "managedclustersets",
        include_str!("../../manifests/hub-crds/managedclustersets.yaml"),
    ),
    (
        "managedclustersetbindings",
        include_str!("../../manifests/hub-crds/managedclustersetbindings.yaml"),
    ),
    (
        "placements",
        include_str!("../../manifests/hub-crds/placements.yaml"),
    ),
    (
        "placementdecisions",
        include_str!("../../manifests/hub-crds/placementdecisions.yaml"),
    ),
    (
        "manifestworks",
        include_str!("../../manifests/hub-crds/manifestworks.yaml"),
    ),
    (
        "manifestworkreplicasets",
        include_str!("../../manifests/hub-crds/manifestworkreplicasets.yaml"),
    ),
    (
        "addondeploymentconfigs",
        include_str!("../../manifests/hub-crds/addondeploymentconfigs.yaml"),
    ),
    (
        "clustermanagementaddons",
        include_str!("../../manifests/hub-crds/clustermanagementaddons.yaml"),
    ),
    (
        "managedclusteraddons",
        include_str!("../../manifests/hub-crds/managedclusteraddons.yaml"),
    ),
];

/// Parse the embedded hub CRD manifests, in manifest order.
pub fn hub_crds() -> Result<Vec<CustomResourceDefinition>> {
    HUB_CRD_MANIFESTS
        .iter()
        .map(|(name, manifest)| {
            serde_yaml::from_str(manifest)
                .with_context(|| format!("embedded CRD manifest {name} failed to parse"))
        })
        .collect()
}
