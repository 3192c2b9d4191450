// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Rollout state machine and condition aggregation.
//!
//! Each hub subsystem moves through an explicit three-state machine driven
//! purely by its deployment's observed rollout numbers:
//!
//! ```text
//! Unavailable -> RolloutInProgress -> Functional
//! ```
//!
//! - `Unavailable`: no ready replicas observed (or status unreadable)
//! - `RolloutInProgress`: ready replicas exist but the rollout has not
//!   converged (ready < desired, or the controller has not observed the
//!   current generation)
//! - `Functional`: at least one ready replica and the observed generation
//!   matches
//!
//! The transitions are pure functions of the observation, so the machine is
//! unit-testable without a cluster. Aggregation turns the per-subsystem
//! states into the `Progressing` and `Hub<X>Degraded` conditions;
//! `ValidFeatureGates` is derived from gate validation alone.

use crate::constants::{
    CONDITION_FEATURE_GATES_VALID, CONDITION_PROGRESSING, REASON_DEPLOYMENT_ROLLING,
    REASON_FEATURE_GATES_ALL_VALID, REASON_FEATURE_GATES_INVALID, REASON_UP_TO_DATE, STATUS_FALSE,
    STATUS_TRUE,
};
use crate::crd::Condition;
use crate::reconcilers::status::create_condition;

/// Observed rollout numbers of one deployment.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DeploymentRollout {
    /// Replicas the deployment asks for
    pub desired_replicas: i32,
    /// Replicas currently ready
    pub ready_replicas: i32,
    /// `metadata.generation` of the deployment
    pub generation: Option<i64>,
    /// `status.observedGeneration` reported by the deployment controller
    pub observed_generation: Option<i64>,
}

/// Rollout state of one subsystem.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SubsystemState {
    /// No ready replicas observed yet
    Unavailable,
    /// Replicas exist but readiness or generation has not converged
    RolloutInProgress,
    /// Ready replicas >= 1 and the observed generation matches
    Functional,
}

/// Compute the state of a subsystem from its rollout observation.
///
/// An unreadable status (`None`) is treated as not-yet-functional, never as
/// an error.
#[must_use]
pub fn subsystem_state(rollout: Option<&DeploymentRollout>) -> SubsystemState {
    let Some(rollout) = rollout else {
        return SubsystemState::Unavailable;
    };

    if rollout.ready_replicas == 0 {
        return SubsystemState::Unavailable;
    }

    let generation_converged = match (rollout.generation, rollout.observed_generation) {
        (Some(generation), Some(observed)) => observed >= generation,
        // A deployment that has never reported an observed generation is
        // still rolling out.
        (Some(_), None) => false,
        _ => true,
    };

    if !generation_converged || rollout.ready_replicas < rollout.desired_replicas {
        return SubsystemState::RolloutInProgress;
    }

    SubsystemState::Functional
}

/// The hub subsystems that contribute to the aggregate conditions.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Subsystem {
    Registration,
    RegistrationWebhook,
    WorkWebhook,
    Placement,
    WorkController,
    AddOnManager,
}

impl Subsystem {
    /// Condition type reported for this subsystem.
    #[must_use]
    pub fn degraded_condition_type(self) -> &'static str {
        match self {
            Subsystem::Registration => "HubRegistrationDegraded",
            Subsystem::RegistrationWebhook => "HubRegistrationWebhookDegraded",
            Subsystem::WorkWebhook => "HubWorkWebhookDegraded",
            Subsystem::Placement => "HubPlacementDegraded",
            Subsystem::WorkController => "HubWorkControllerDegraded",
            Subsystem::AddOnManager => "HubAddOnManagerDegraded",
        }
    }

    /// Reason while the subsystem has no ready pods.
    #[must_use]
    pub fn unavailable_reason(self) -> &'static str {
        match self {
            Subsystem::Registration => "UnavailableRegistrationPod",
            Subsystem::RegistrationWebhook => "UnavailableRegistrationWebhookPod",
            Subsystem::WorkWebhook => "UnavailableWorkWebhookPod",
            Subsystem::Placement => "UnavailablePlacementPod",
            Subsystem::WorkController => "UnavailableWorkControllerPod",
            Subsystem::AddOnManager => "UnavailableAddOnManagerPod",
        }
    }

    /// Reason once the subsystem is functional.
    #[must_use]
    pub fn functional_reason(self) -> &'static str {
        match self {
            Subsystem::Registration => "RegistrationFunctional",
            Subsystem::RegistrationWebhook => "RegistrationWebhookFunctional",
            Subsystem::WorkWebhook => "WorkWebhookFunctional",
            Subsystem::Placement => "PlacementFunctional",
            Subsystem::WorkController => "WorkControllerFunctional",
            Subsystem::AddOnManager => "AddOnManagerFunctional",
        }
    }
}

/// One subsystem's observation for an aggregation pass.
#[derive(Clone, Debug)]
pub struct SubsystemObservation {
    /// Which subsystem was observed
    pub subsystem: Subsystem,
    /// Name of the backing deployment, used in condition messages
    pub deployment: String,
    /// The rollout numbers, `None` when unreadable
    pub rollout: Option<DeploymentRollout>,
}

impl SubsystemObservation {
    /// State of this observation.
    #[must_use]
    pub fn state(&self) -> SubsystemState {
        subsystem_state(self.rollout.as_ref())
    }
}

/// Compute the degraded condition for one subsystem.
///
/// `True` while the subsystem is `Unavailable`, naming the pod set that is
/// missing; `False` with a functional reason otherwise. `RolloutInProgress`
/// is not degraded: replicas exist and are converging.
#[must_use]
pub fn degraded_condition(observation: &SubsystemObservation) -> Condition {
    let subsystem = observation.subsystem;
    match observation.state() {
        SubsystemState::Unavailable => create_condition(
            subsystem.degraded_condition_type(),
            STATUS_TRUE,
            subsystem.unavailable_reason(),
            &format!(
                "no ready pods for deployment {}",
                observation.deployment
            ),
        ),
        SubsystemState::RolloutInProgress | SubsystemState::Functional => create_condition(
            subsystem.degraded_condition_type(),
            STATUS_FALSE,
            subsystem.functional_reason(),
            &format!("deployment {} has ready pods", observation.deployment),
        ),
    }
}

/// Compute the aggregate `Progressing` condition.
///
/// `True` with a rolling reason while any subsystem is not yet `Functional`;
/// `False` with an up-to-date reason once every subsystem converged.
#[must_use]
pub fn progressing_condition(observations: &[SubsystemObservation]) -> Condition {
    let rolling: Vec<&str> = observations
        .iter()
        .filter(|observation| observation.state() != SubsystemState::Functional)
        .map(|observation| observation.deployment.as_str())
        .collect();

    if rolling.is_empty() {
        create_condition(
            CONDITION_PROGRESSING,
            STATUS_FALSE,
            REASON_UP_TO_DATE,
            "every hub deployment is up to date",
        )
    } else {
        create_condition(
            CONDITION_PROGRESSING,
            STATUS_TRUE,
            REASON_DEPLOYMENT_ROLLING,
            &format!("deployments still rolling out: {}", rolling.join(", ")),
        )
    }
}

/// Compute the `ValidFeatureGates` condition from the validation output.
///
/// Independent of workload state: an invalid gate name is a spec problem,
/// not a rollout problem.
#[must_use]
pub fn feature_gates_condition(invalid: &[String]) -> Condition {
    if invalid.is_empty() {
        create_condition(
            CONDITION_FEATURE_GATES_VALID,
            STATUS_TRUE,
            REASON_FEATURE_GATES_ALL_VALID,
            "all requested feature gates are known",
        )
    } else {
        create_condition(
            CONDITION_FEATURE_GATES_VALID,
            STATUS_FALSE,
            REASON_FEATURE_GATES_INVALID,
            &format!("unknown feature gates: {}", invalid.join(", ")),
        )
    }
}

#[cfg(test)]
#[path = "conditions_tests.rs"]
mod conditions_tests;
