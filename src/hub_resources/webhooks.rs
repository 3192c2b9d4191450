// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Webhook services and admission registration builders.
//!
//! The webhook configuration objects start intercepting API requests the
//! moment they exist, so the resolver only emits them once the backing
//! deployment is Functional; the builders themselves are unconditional.

use crate::constants::{
    WEBHOOK_CLUSTER_MUTATING, WEBHOOK_CLUSTER_VALIDATING, WEBHOOK_CONTAINER_PORT,
    WEBHOOK_SERVICE_PORT, WEBHOOK_WORK_VALIDATING,
};
use crate::hub_resources::HubNames;
use crate::labels;
use k8s_openapi::api::admissionregistration::v1::{
    MutatingWebhook, MutatingWebhookConfiguration, RuleWithOperations, ServiceReference,
    ValidatingWebhook, ValidatingWebhookConfiguration, WebhookClientConfig,
};
use k8s_openapi::api::core::v1::{Service, ServicePort, ServiceSpec};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;
use std::collections::BTreeMap;

/// ClusterIP service in front of a webhook server deployment.
#[must_use]
pub fn webhook_service(
    names: &HubNames,
    deployment_name: &str,
    user_labels: &BTreeMap<String, String>,
) -> Service {
    let mut selector = BTreeMap::new();
    selector.insert(labels::APP_LABEL_KEY.to_string(), deployment_name.to_string());

    Service {
        metadata: ObjectMeta {
            name: Some(deployment_name.to_string()),
            namespace: Some(names.namespace.clone()),
            labels: Some(labels::merge(
                deployment_name,
                &names.cluster_manager,
                user_labels,
            )),
            ..Default::default()
        },
        spec: Some(ServiceSpec {
            selector: Some(selector),
            ports: Some(vec![ServicePort {
                name: Some("webhook".to_string()),
                port: WEBHOOK_SERVICE_PORT,
                target_port: Some(IntOrString::Int(WEBHOOK_CONTAINER_PORT)),
                protocol: Some("TCP".to_string()),
                ..Default::default()
            }]),
            ..Default::default()
        }),
        ..Default::default()
    }
}

fn client_config(names: &HubNames, service_name: &str, path: &str) -> WebhookClientConfig {
    WebhookClientConfig {
        service: Some(ServiceReference {
            name: service_name.to_string(),
            namespace: names.namespace.clone(),
            path: Some(path.to_string()),
            port: Some(WEBHOOK_SERVICE_PORT),
        }),
        ..Default::default()
    }
}

fn admission_rule(api_group: &str, resources: &[&str]) -> RuleWithOperations {
    RuleWithOperations {
        api_groups: Some(vec![api_group.to_string()]),
        api_versions: Some(vec!["v1".to_string()]),
        operations: Some(vec!["CREATE".to_string(), "UPDATE".to_string()]),
        resources: Some(resources.iter().map(ToString::to_string).collect()),
        ..Default::default()
    }
}

/// Validating webhook configuration for managed cluster objects.
#[must_use]
pub fn cluster_validating_webhook(
    names: &HubNames,
    user_labels: &BTreeMap<String, String>,
) -> ValidatingWebhookConfiguration {
    ValidatingWebhookConfiguration {
        metadata: ObjectMeta {
            name: Some(WEBHOOK_CLUSTER_VALIDATING.to_string()),
            labels: Some(labels::merge(
                WEBHOOK_CLUSTER_VALIDATING,
                &names.cluster_manager,
                user_labels,
            )),
            ..Default::default()
        },
        webhooks: Some(vec![ValidatingWebhook {
            name: WEBHOOK_CLUSTER_VALIDATING.to_string(),
            admission_review_versions: vec!["v1".to_string()],
            client_config: client_config(
                names,
                &names.registration_webhook(),
                "/validate-managedcluster",
            ),
            rules: Some(vec![admission_rule(
                "cluster.open-cluster-management.io",
                &["managedclusters"],
            )]),
            side_effects: "None".to_string(),
            failure_policy: Some("Fail".to_string()),
            timeout_seconds: Some(10),
            ..Default::default()
        }]),
    }
}

/// Mutating webhook configuration defaulting managed cluster objects.
#[must_use]
pub fn cluster_mutating_webhook(
    names: &HubNames,
    user_labels: &BTreeMap<String, String>,
) -> MutatingWebhookConfiguration {
    MutatingWebhookConfiguration {
        metadata: ObjectMeta {
            name: Some(WEBHOOK_CLUSTER_MUTATING.to_string()),
            labels: Some(labels::merge(
                WEBHOOK_CLUSTER_MUTATING,
                &names.cluster_manager,
                user_labels,
            )),
            ..Default::default()
        },
        webhooks: Some(vec![MutatingWebhook {
            name: WEBHOOK_CLUSTER_MUTATING.to_string(),
            admission_review_versions: vec!["v1".to_string()],
            client_config: client_config(
                names,
                &names.registration_webhook(),
                "/mutate-managedcluster",
            ),
            rules: Some(vec![admission_rule(
                "cluster.open-cluster-management.io",
                &["managedclusters"],
            )]),
            side_effects: "None".to_string(),
            failure_policy: Some("Fail".to_string()),
            timeout_seconds: Some(10),
            ..Default::default()
        }]),
    }
}

/// Validating webhook configuration for manifest work objects.
#[must_use]
pub fn work_validating_webhook(
    names: &HubNames,
    user_labels: &BTreeMap<String, String>,
) -> ValidatingWebhookConfiguration {
    ValidatingWebhookConfiguration {
        metadata: ObjectMeta {
            name: Some(WEBHOOK_WORK_VALIDATING.to_string()),
            labels: Some(labels::merge(
                WEBHOOK_WORK_VALIDATING,
                &names.cluster_manager,
                user_labels,
            )),
            ..Default::default()
        },
        webhooks: Some(vec![ValidatingWebhook {
            name: WEBHOOK_WORK_VALIDATING.to_string(),
            admission_review_versions: vec!["v1".to_string()],
            client_config: client_config(names, &names.work_webhook(), "/validate-manifestwork"),
            rules: Some(vec![admission_rule(
                "work.open-cluster-management.io",
                &["manifestworks"],
            )]),
            side_effects: "None".to_string(),
            failure_policy: Some("Fail".to_string()),
            timeout_seconds: Some(10),
            ..Default::default()
        }]),
    }
}

#[cfg(test)]
#[path = "webhooks_tests.rs"]
mod webhooks_tests;
