// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Status condition helpers for the `ClusterManager` resource.
//!
//! Conditions follow the standard Kubernetes format: `type`, `status`
//! (`True`/`False`/`Unknown`), a `CamelCase` `reason`, a human message and
//! `lastTransitionTime`. The transition time only moves when the boolean
//! status actually flips, so a condition that merely refreshes its message
//! does not look like a state change to consumers.

use crate::crd::{ClusterManager, ClusterManagerStatus, Condition};
use anyhow::Result;
use chrono::Utc;
use kube::api::{Patch, PatchParams};
use kube::{Api, Client};
use serde_json::json;
use tracing::debug;

/// Create a new condition with the current timestamp.
///
/// # Arguments
///
/// * `condition_type` - The type of condition (e.g., "Applied", "Progressing")
/// * `status` - The status: "True", "False", or "Unknown"
/// * `reason` - A programmatic identifier in `CamelCase`
/// * `message` - A human-readable explanation
#[must_use]
pub fn create_condition(
    condition_type: &str,
    status: &str,
    reason: &str,
    message: &str,
) -> Condition {
    Condition {
        r#type: condition_type.to_string(),
        status: status.to_string(),
        reason: Some(reason.to_string()),
        message: Some(message.to_string()),
        last_transition_time: Some(Utc::now().to_rfc3339()),
    }
}

/// Find a condition by type.
#[must_use]
pub fn find_condition<'a>(conditions: &'a [Condition], condition_type: &str) -> Option<&'a Condition> {
    conditions
        .iter()
        .find(|condition| condition.r#type == condition_type)
}

/// Insert or update a condition in place.
///
/// When a condition of the same type already exists with the same boolean
/// status, its `lastTransitionTime` is preserved; only a real `True`/`False`
/// flip moves the timestamp.
pub fn set_condition(conditions: &mut Vec<Condition>, mut new_condition: Condition) {
    if let Some(existing) = conditions
        .iter_mut()
        .find(|condition| condition.r#type == new_condition.r#type)
    {
        if existing.status == new_condition.status {
            new_condition.last_transition_time = existing.last_transition_time.clone();
        }
        *existing = new_condition;
    } else {
        conditions.push(new_condition);
    }
}

/// Compare two condition sets ignoring `lastTransitionTime`.
///
/// Used to skip no-op status writes: a status update that only refreshes
/// timestamps would trigger another watch event for nothing.
#[must_use]
pub fn conditions_equal(current: &[Condition], new: &[Condition]) -> bool {
    if current.len() != new.len() {
        return false;
    }
    current.iter().zip(new.iter()).all(|(a, b)| {
        a.r#type == b.r#type && a.status == b.status && a.reason == b.reason && a.message == b.message
    })
}

/// Whether a freshly computed status differs from the one on the object.
///
/// Compares everything except condition timestamps.
#[must_use]
pub fn status_changed(current: Option<&ClusterManagerStatus>, new: &ClusterManagerStatus) -> bool {
    let Some(current) = current else {
        return true;
    };
    current.observed_generation != new.observed_generation
        || current.related_resources != new.related_resources
        || current.generations != new.generations
        || !conditions_equal(&current.conditions, &new.conditions)
}

/// Patch the status subresource of a `ClusterManager`.
///
/// # Errors
///
/// Returns an error when the API server rejects the patch.
pub async fn apply_status(
    client: &Client,
    name: &str,
    status: &ClusterManagerStatus,
) -> Result<()> {
    let api: Api<ClusterManager> = Api::all(client.clone());

    debug!(name = %name, "Patching ClusterManager status");
    api.patch_status(
        name,
        &PatchParams::default(),
        &Patch::Merge(json!({ "status": status })),
    )
    .await?;

    Ok(())
}

#[cfg(test)]
#[path = "status_tests.rs"]
mod status_tests;
