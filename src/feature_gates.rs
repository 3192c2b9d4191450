// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Feature gate registry and validation.
//!
//! Each hub subsystem (registration, work, addon manager) exposes a fixed
//! set of named feature gates. A gate has two defaults: the *operator*
//! default (whether the hub turns it on when the spec says nothing) and the
//! *component* default (what the workload binary compiles in). A
//! `--feature-gates=<Name>=<bool>` argument is rendered only when the
//! effective enablement differs from the component default; everything else
//! would be a no-op flag.
//!
//! Validation is pure: unknown names are collected and reported, never
//! silently dropped, and the requesting spec keeps working on registry
//! defaults for the invalid portion.

use crate::constants::ARG_FEATURE_GATES;
use crate::crd::{FeatureGate, FeatureGateMode};
use std::collections::BTreeMap;

// ============================================================================
// Known Feature Names
// ============================================================================

/// Registration: create a default cluster set grouping all managed clusters
pub const FEATURE_DEFAULT_CLUSTER_SET: &str = "DefaultClusterSet";

/// Registration: publish ClusterProfile API objects for managed clusters
pub const FEATURE_CLUSTER_PROFILE: &str = "ClusterProfile";

/// Registration: import clusters through the cluster-api provider
pub const FEATURE_CLUSTER_IMPORTER: &str = "ClusterImporter";

/// Registration: approve returning managed clusters automatically
pub const FEATURE_MANAGED_CLUSTER_AUTO_APPROVAL: &str = "ManagedClusterAutoApproval";

/// Work: run the manifestwork replicaset controller
pub const FEATURE_MANIFESTWORK_REPLICA_SET: &str = "ManifestWorkReplicaSet";

/// Work: validate manifest works with a nil executor
pub const FEATURE_NIL_EXECUTOR_VALIDATING: &str = "NilExecutorValidating";

/// Work: allow cloudevents-based work delivery backends
pub const FEATURE_CLOUD_EVENTS_DRIVERS: &str = "CloudEventsDrivers";

/// AddOnManager: manage addon lifecycle from the hub
pub const FEATURE_ADDON_MANAGEMENT: &str = "AddonManagement";

/// Subsystem a feature gate list is validated against.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GateContext {
    /// Registration controller and webhook gates
    Registration,
    /// Work webhook and work controller gates
    Work,
    /// AddOn manager gates
    AddOnManager,
}

/// One registry entry: a feature known to a subsystem.
#[derive(Clone, Copy, Debug)]
pub struct GateSpec {
    /// Feature name as it appears in specs and arguments
    pub name: &'static str,
    /// Subsystem the gate belongs to
    pub context: GateContext,
    /// Whether the operator enables the gate when the spec says nothing
    pub operator_default: FeatureGateMode,
    /// Whether the workload binary enables the gate on its own
    pub component_default: bool,
}

/// The static feature gate registry.
pub const REGISTRY: &[GateSpec] = &[
    GateSpec {
        name: FEATURE_DEFAULT_CLUSTER_SET,
        context: GateContext::Registration,
        operator_default: FeatureGateMode::Enable,
        component_default: true,
    },
    GateSpec {
        name: FEATURE_CLUSTER_PROFILE,
        context: GateContext::Registration,
        operator_default: FeatureGateMode::Disable,
        component_default: false,
    },
    GateSpec {
        name: FEATURE_CLUSTER_IMPORTER,
        context: GateContext::Registration,
        operator_default: FeatureGateMode::Disable,
        component_default: false,
    },
    GateSpec {
        name: FEATURE_MANAGED_CLUSTER_AUTO_APPROVAL,
        context: GateContext::Registration,
        operator_default: FeatureGateMode::Disable,
        component_default: false,
    },
    GateSpec {
        name: FEATURE_MANIFESTWORK_REPLICA_SET,
        context: GateContext::Work,
        operator_default: FeatureGateMode::Enable,
        component_default: false,
    },
    GateSpec {
        name: FEATURE_NIL_EXECUTOR_VALIDATING,
        context: GateContext::Work,
        operator_default: FeatureGateMode::Enable,
        component_default: false,
    },
    GateSpec {
        name: FEATURE_CLOUD_EVENTS_DRIVERS,
        context: GateContext::Work,
        operator_default: FeatureGateMode::Disable,
        component_default: false,
    },
    GateSpec {
        name: FEATURE_ADDON_MANAGEMENT,
        context: GateContext::AddOnManager,
        operator_default: FeatureGateMode::Enable,
        component_default: true,
    },
];

/// Effective enablement per feature name for one subsystem.
pub type EffectiveGates = BTreeMap<String, bool>;

fn registry_for(context: GateContext) -> impl Iterator<Item = &'static GateSpec> {
    REGISTRY.iter().filter(move |gate| gate.context == context)
}

/// Validate a requested feature gate list against the registry.
///
/// The effective map starts from the operator defaults of every gate the
/// subsystem knows; each valid requested entry overrides its default, with
/// duplicate names resolved last-wins. Unknown names are returned in request
/// order (deduplicated) and excluded from the effective map.
///
/// An absent configuration block is equivalent to an empty request.
#[must_use]
pub fn validate(requested: &[FeatureGate], context: GateContext) -> (EffectiveGates, Vec<String>) {
    let mut effective: EffectiveGates = registry_for(context)
        .map(|gate| {
            (
                gate.name.to_string(),
                gate.operator_default == FeatureGateMode::Enable,
            )
        })
        .collect();

    let mut invalid = Vec::new();
    for gate in requested {
        if effective.contains_key(&gate.feature) {
            effective.insert(gate.feature.clone(), gate.mode == FeatureGateMode::Enable);
        } else if !invalid.contains(&gate.feature) {
            invalid.push(gate.feature.clone());
        }
    }

    (effective, invalid)
}

/// Whether a feature is enabled in an effective map.
#[must_use]
pub fn is_enabled(effective: &EffectiveGates, feature: &str) -> bool {
    effective.get(feature).copied().unwrap_or(false)
}

/// Render the `--feature-gates` arguments for one subsystem.
///
/// One argument per gate whose effective enablement differs from the
/// component default, sorted by feature name.
#[must_use]
pub fn feature_gate_args(effective: &EffectiveGates, context: GateContext) -> Vec<String> {
    let mut args: Vec<String> = registry_for(context)
        .filter_map(|gate| {
            let enabled = is_enabled(effective, gate.name);
            if enabled == gate.component_default {
                return None;
            }
            Some(format!("{ARG_FEATURE_GATES}={}={enabled}", gate.name))
        })
        .collect();
    args.sort();
    args
}

#[cfg(test)]
#[path = "feature_gates_tests.rs"]
mod feature_gates_tests;
