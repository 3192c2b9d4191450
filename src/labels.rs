// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Label propagation for hub-managed resources.
//!
//! User labels on the `ClusterManager` are stamped onto every managed
//! resource, except for a small reserved set the operator always computes
//! itself. The same user label set is also serialized into a single
//! `--labels` command-line argument on the registration controller, so the
//! stamped set and the argument-encoded set always agree.

use std::collections::BTreeMap;

// ============================================================================
// Reserved Labels
// ============================================================================

/// Identity label; always the name of the specific managed resource.
pub const APP_LABEL_KEY: &str = "app";

/// Ownership label; always the name of the owning `ClusterManager`.
pub const HUB_LABEL_KEY: &str = "createdByClusterManager";

/// Operator-internal label namespace; user keys under it are not propagated.
pub const LABEL_PREFIX: &str = "open-cluster-management.io";

/// Whether a user-supplied label key is reserved or operator-internal.
#[must_use]
pub fn is_reserved_key(key: &str) -> bool {
    key == APP_LABEL_KEY
        || key == HUB_LABEL_KEY
        || key == LABEL_PREFIX
        || key.starts_with(&format!("{LABEL_PREFIX}/"))
}

/// Build the effective label set for one managed resource.
///
/// Reserved keys take the operator-computed value regardless of user input;
/// every other user key passes through unchanged.
///
/// # Arguments
///
/// * `app` - Identity value for the `app` label (e.g. the deployment name)
/// * `cluster_manager_name` - Name of the owning `ClusterManager`
/// * `user_labels` - Labels found on the `ClusterManager` metadata
#[must_use]
pub fn merge(
    app: &str,
    cluster_manager_name: &str,
    user_labels: &BTreeMap<String, String>,
) -> BTreeMap<String, String> {
    let mut labels = propagated(user_labels);
    labels.insert(APP_LABEL_KEY.into(), app.into());
    labels.insert(HUB_LABEL_KEY.into(), cluster_manager_name.into());
    labels
}

/// The user labels that propagate: everything except reserved keys.
#[must_use]
pub fn propagated(user_labels: &BTreeMap<String, String>) -> BTreeMap<String, String> {
    user_labels
        .iter()
        .filter(|(key, _)| !is_reserved_key(key))
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect()
}

/// Serialize the propagated user labels as sorted, comma-joined `key=value`
/// pairs, the format of the `--labels` argument.
///
/// Returns `None` when nothing propagates, so callers can omit the argument
/// entirely instead of rendering `--labels=`.
#[must_use]
pub fn to_arg_value(user_labels: &BTreeMap<String, String>) -> Option<String> {
    let filtered = propagated(user_labels);
    if filtered.is_empty() {
        return None;
    }
    // BTreeMap iteration is already key-sorted
    Some(
        filtered
            .iter()
            .map(|(key, value)| format!("{key}={value}"))
            .collect::<Vec<_>>()
            .join(","),
    )
}

#[cfg(test)]
#[path = "labels_tests.rs"]
mod labels_tests;
