// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! The top-level `ClusterManager` reconciliation pass.
//!
//! One pass: validate feature gates, observe webhook backends, resolve the
//! desired resource set, converge the cluster, aggregate conditions and
//! publish status. Every step is deterministic for a given spec and
//! observation snapshot, so an aborted pass is repaired by simply running
//! the next one.

use crate::constants::{
    CONDITION_APPLIED, REASON_APPLIED, STATUS_FALSE, STATUS_TRUE, WORK_DRIVER_CONFIG_SECRET,
    WORK_DRIVER_KUBE,
};
use crate::context::Context;
use crate::crd::{ClusterManager, ClusterManagerStatus};
use crate::feature_gates::{
    is_enabled, validate, GateContext, FEATURE_ADDON_MANAGEMENT, FEATURE_CLOUD_EVENTS_DRIVERS,
    FEATURE_MANIFESTWORK_REPLICA_SET,
};
use crate::hub_resources::{resolve, HubNames, ResolveParams, WebhookReadiness};
use crate::metrics;
use crate::reconcilers::apply::{reconcile_resources, ClusterState};
use crate::reconcilers::conditions::{
    degraded_condition, feature_gates_condition, progressing_condition, subsystem_state,
    DeploymentRollout, Subsystem, SubsystemObservation, SubsystemState,
};
use crate::reconcilers::status::{create_condition, set_condition, status_changed};
use anyhow::Result;
use kube::runtime::controller::Action;
use kube::ResourceExt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{info, warn};

/// Reason set on `Applied` when a pass aborts.
const REASON_APPLY_FAILED: &str = "ClusterManagerApplyFailed";

/// Per-process reconciliation options.
#[derive(Clone, Debug)]
pub struct ReconcileOptions {
    /// Namespace the operator itself runs in; source of the user's
    /// `work-driver-config` secret.
    pub operator_namespace: String,
    /// Agent image handed to the cluster importer when its gate is on.
    pub agent_image: Option<String>,
}

impl Default for ReconcileOptions {
    fn default() -> Self {
        ReconcileOptions {
            operator_namespace: "open-cluster-management".to_string(),
            agent_image: None,
        }
    }
}

/// Run one reconciliation pass and return the status that was published.
///
/// # Errors
///
/// Apply errors abort the pass after recording `Applied=False`; the caller
/// requeues and the next pass starts from a clean snapshot.
pub async fn reconcile_cluster_manager(
    state: &(impl ClusterState + ?Sized),
    cluster_manager: &ClusterManager,
    options: &ReconcileOptions,
) -> Result<ClusterManagerStatus> {
    let name = cluster_manager.name_any();
    let names = HubNames::new(&name);
    let spec = &cluster_manager.spec;

    // Feature gate validation; the invalid portion falls back to registry
    // defaults and is reported on the ValidFeatureGates condition.
    let empty = Vec::new();
    let (registration_gates, mut invalid_gates) = validate(
        spec.registration_configuration
            .as_ref()
            .map_or(&empty, |config| &config.feature_gates),
        GateContext::Registration,
    );
    let (work_gates, invalid_work) = validate(
        spec.work_configuration
            .as_ref()
            .map_or(&empty, |config| &config.feature_gates),
        GateContext::Work,
    );
    let (addon_gates, invalid_addon) = validate(
        spec.add_on_manager_configuration
            .as_ref()
            .map_or(&empty, |config| &config.feature_gates),
        GateContext::AddOnManager,
    );
    invalid_gates.extend(invalid_work);
    invalid_gates.extend(invalid_addon);

    // Webhook configurations are only created against Functional backends;
    // an unreadable rollout status counts as not ready, never as an error.
    // Only non-existence is gated: a configuration that already exists stays
    // in the desired set through readiness regressions.
    let webhook_ready = WebhookReadiness {
        registration: observe_rollout(state, &names.namespace, &names.registration_webhook())
            .await
            .is_some_and(|rollout| subsystem_state(Some(&rollout)) == SubsystemState::Functional)
            || webhook_config_exists(state, crate::constants::WEBHOOK_CLUSTER_VALIDATING).await,
        work: observe_rollout(state, &names.namespace, &names.work_webhook())
            .await
            .is_some_and(|rollout| subsystem_state(Some(&rollout)) == SubsystemState::Functional)
            || webhook_config_exists(state, crate::constants::WEBHOOK_WORK_VALIDATING).await,
    };

    // A non-default work driver mirrors the user's config secret into the
    // hub namespace.
    let work_driver = spec
        .work_configuration
        .as_ref()
        .and_then(|work| work.work_driver.as_deref())
        .unwrap_or(WORK_DRIVER_KUBE);
    let work_driver_config = if work_driver != WORK_DRIVER_KUBE
        && is_enabled(&work_gates, FEATURE_CLOUD_EVENTS_DRIVERS)
    {
        match state
            .secret_data(&options.operator_namespace, WORK_DRIVER_CONFIG_SECRET)
            .await
        {
            Ok(data) => data,
            Err(error) => {
                warn!(%error, "Work driver config secret unreadable, leaving mirror alone");
                None
            }
        }
    } else {
        None
    };

    let desired = resolve(&ResolveParams {
        cluster_manager,
        registration_gates: &registration_gates,
        work_gates: &work_gates,
        addon_gates: &addon_gates,
        webhook_ready,
        agent_image: options.agent_image.as_deref(),
        work_driver_config: work_driver_config.as_ref(),
    })?;

    let mut conditions = cluster_manager
        .status
        .as_ref()
        .map(|status| status.conditions.clone())
        .unwrap_or_default();

    let outcome = match reconcile_resources(state, &desired).await {
        Ok(outcome) => outcome,
        Err(error) => {
            set_condition(
                &mut conditions,
                create_condition(
                    CONDITION_APPLIED,
                    STATUS_FALSE,
                    REASON_APPLY_FAILED,
                    &format!("apply aborted: {error:#}"),
                ),
            );
            let status = ClusterManagerStatus {
                observed_generation: cluster_manager
                    .status
                    .as_ref()
                    .and_then(|status| status.observed_generation),
                conditions,
                related_resources: cluster_manager
                    .status
                    .as_ref()
                    .map(|status| status.related_resources.clone())
                    .unwrap_or_default(),
                generations: cluster_manager
                    .status
                    .as_ref()
                    .map(|status| status.generations.clone())
                    .unwrap_or_default(),
            };
            if status_changed(cluster_manager.status.as_ref(), &status) {
                state.update_status(&name, &status).await?;
            }
            return Err(error);
        }
    };

    if outcome.applied > 0 || outcome.deleted > 0 {
        info!(
            applied = outcome.applied,
            deleted = outcome.deleted,
            related = outcome.related_resources.len(),
            "Converged hub resources"
        );
    }

    set_condition(
        &mut conditions,
        create_condition(
            CONDITION_APPLIED,
            STATUS_TRUE,
            REASON_APPLIED,
            "every required hub resource was applied",
        ),
    );
    set_condition(&mut conditions, feature_gates_condition(&invalid_gates));

    // Fresh rollout observations drive the per-subsystem state machines.
    let mut observations = vec![
        (Subsystem::Registration, names.registration_controller()),
        (Subsystem::RegistrationWebhook, names.registration_webhook()),
        (Subsystem::WorkWebhook, names.work_webhook()),
        (Subsystem::Placement, names.placement_controller()),
    ];
    if is_enabled(&work_gates, FEATURE_MANIFESTWORK_REPLICA_SET) {
        observations.push((Subsystem::WorkController, names.work_controller()));
    }
    if is_enabled(&addon_gates, FEATURE_ADDON_MANAGEMENT) {
        observations.push((Subsystem::AddOnManager, names.addon_manager()));
    }

    let mut observed = Vec::with_capacity(observations.len());
    for (subsystem, deployment) in observations {
        let rollout = observe_rollout(state, &names.namespace, &deployment).await;
        observed.push(SubsystemObservation {
            subsystem,
            deployment,
            rollout,
        });
    }

    // Disabled subsystems must not leave a stale degraded condition behind.
    let active_types: Vec<&str> = observed
        .iter()
        .map(|observation| observation.subsystem.degraded_condition_type())
        .collect();
    conditions.retain(|condition| {
        !condition.r#type.starts_with("Hub") || active_types.contains(&condition.r#type.as_str())
    });

    for observation in &observed {
        set_condition(&mut conditions, degraded_condition(observation));
    }
    set_condition(&mut conditions, progressing_condition(&observed));

    let status = ClusterManagerStatus {
        observed_generation: cluster_manager.metadata.generation,
        conditions,
        related_resources: outcome.related_resources,
        generations: outcome.generations,
    };

    if status_changed(cluster_manager.status.as_ref(), &status) {
        state.update_status(&name, &status).await?;
    }

    Ok(status)
}

async fn webhook_config_exists(state: &(impl ClusterState + ?Sized), name: &str) -> bool {
    let id = crate::hub_resources::ResourceId {
        group: "admissionregistration.k8s.io".to_string(),
        resource: "validatingwebhookconfigurations".to_string(),
        namespace: String::new(),
        name: name.to_string(),
    };
    matches!(state.get(&id).await, Ok(Some(_)))
}

async fn observe_rollout(
    state: &(impl ClusterState + ?Sized),
    namespace: &str,
    name: &str,
) -> Option<DeploymentRollout> {
    match state.rollout(namespace, name).await {
        Ok(rollout) => rollout,
        Err(error) => {
            warn!(deployment = %name, %error, "Rollout status unreadable, treating as unavailable");
            None
        }
    }
}

/// Error wrapper for the kube runtime controller.
#[derive(Debug, thiserror::Error)]
#[error(transparent)]
pub struct ReconcileError(#[from] anyhow::Error);

/// Controller entry point: one watched `ClusterManager` event.
pub async fn reconcile(
    cluster_manager: Arc<ClusterManager>,
    ctx: Arc<Context>,
) -> Result<Action, ReconcileError> {
    let started = Instant::now();
    let result =
        reconcile_cluster_manager(&ctx.cluster_state, &cluster_manager, &ctx.options).await;

    match result {
        Ok(_) => {
            metrics::record_reconciliation("success", started.elapsed());
            Ok(Action::requeue(Duration::from_secs(300)))
        }
        Err(error) => {
            metrics::record_reconciliation("error", started.elapsed());
            Err(ReconcileError(error))
        }
    }
}

/// Requeue policy on reconcile errors.
#[must_use]
pub fn error_policy(
    cluster_manager: Arc<ClusterManager>,
    error: &ReconcileError,
    _ctx: Arc<Context>,
) -> Action {
    warn!(
        cluster_manager = %cluster_manager.name_any(),
        %error,
        "Reconciliation failed, requeueing"
    );
    Action::requeue(Duration::from_secs(30))
}
