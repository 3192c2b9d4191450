// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Deployment builders for the hub workloads.
//!
//! All functions are pure: they render a `Deployment` from the
//! `ClusterManager` spec and the effective feature gates. The command-line
//! argument sets rendered here are a stable contract with the workload
//! binaries (`--labels`, `--feature-gates`, `--work-driver`,
//! `--cluster-auto-approval-users`, `--auto-approved-csr-users`,
//! `--agent-image`).

use crate::constants::{
    ARG_AGENT_IMAGE, ARG_AUTO_APPROVAL_USERS, ARG_AUTO_APPROVED_CSR_USERS, ARG_KUBECONFIG,
    ARG_LABELS, ARG_WORK_DRIVER, EXTERNAL_HUB_KUBECONFIG_MOUNT_PATH,
    EXTERNAL_HUB_KUBECONFIG_SECRET, EXTERNAL_HUB_KUBECONFIG_VOLUME,
    REGISTRATION_WEBHOOK_SERVING_CERT, SA_ADDON_MANAGER, SA_PLACEMENT_CONTROLLER,
    SA_REGISTRATION_CONTROLLER, SA_REGISTRATION_WEBHOOK, SA_WORK_CONTROLLER, SA_WORK_WEBHOOK,
    WEBHOOK_CONTAINER_PORT, WORK_DRIVER_CONFIG_MOUNT_PATH, WORK_DRIVER_CONFIG_SECRET,
    WORK_DRIVER_CONFIG_VOLUME, WORK_WEBHOOK_SERVING_CERT,
};
use crate::crd::{ClusterManager, InstallMode, NodePlacement};
use crate::feature_gates::{feature_gate_args, EffectiveGates, GateContext};
use crate::hub_resources::HubNames;
use crate::labels;
use k8s_openapi::api::apps::v1::{Deployment, DeploymentSpec};
use k8s_openapi::api::core::v1::{
    Capabilities, Container, ContainerPort, PodSecurityContext, PodSpec, PodTemplateSpec, Probe,
    SecretVolumeSource, SecurityContext, TCPSocketAction, Volume, VolumeMount,
};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{LabelSelector, ObjectMeta};
use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;
use std::collections::BTreeMap;

// Fallback images when the spec leaves a pull spec empty
const DEFAULT_REGISTRATION_IMAGE: &str = "quay.io/open-cluster-management/registration:latest";
const DEFAULT_WORK_IMAGE: &str = "quay.io/open-cluster-management/work:latest";
const DEFAULT_PLACEMENT_IMAGE: &str = "quay.io/open-cluster-management/placement:latest";
const DEFAULT_ADDON_MANAGER_IMAGE: &str = "quay.io/open-cluster-management/addon-manager:latest";

// Serving cert mount used by the webhook servers
const SERVING_CERT_VOLUME: &str = "serving-cert";
const SERVING_CERT_MOUNT_PATH: &str = "/var/run/secrets/serving-cert";

/// Everything that varies between the hub workloads.
struct Workload<'a> {
    name: String,
    service_account: &'a str,
    image: String,
    args: Vec<String>,
    volumes: Vec<Volume>,
    volume_mounts: Vec<VolumeMount>,
    readiness_port: Option<i32>,
}

/// Registration controller deployment.
#[must_use]
pub fn registration_controller(
    names: &HubNames,
    user_labels: &BTreeMap<String, String>,
    mode: InstallMode,
    cluster_manager: &ClusterManager,
    gates: &EffectiveGates,
    agent_image: Option<&str>,
) -> Deployment {
    let spec = &cluster_manager.spec;
    let mut args = vec!["controller".to_string()];
    args.extend(feature_gate_args(gates, GateContext::Registration));

    if let Some(registration) = &spec.registration_configuration {
        if !registration.auto_approve_users.is_empty() {
            args.push(format!(
                "{ARG_AUTO_APPROVAL_USERS}={}",
                registration.auto_approve_users.join(",")
            ));
        }
        for driver in &registration.registration_drivers {
            let Some(csr) = &driver.csr else { continue };
            if driver.auth_type == "csr" && !csr.auto_approved_identities.is_empty() {
                args.push(format!(
                    "{ARG_AUTO_APPROVED_CSR_USERS}={}",
                    csr.auto_approved_identities.join(",")
                ));
            }
        }
    }

    if crate::feature_gates::is_enabled(gates, crate::feature_gates::FEATURE_CLUSTER_IMPORTER) {
        if let Some(image) = agent_image {
            args.push(format!("{ARG_AGENT_IMAGE}={image}"));
        }
    }

    if let Some(label_arg) = labels::to_arg_value(user_labels) {
        args.push(format!("{ARG_LABELS}={label_arg}"));
    }

    build(
        names,
        user_labels,
        mode,
        spec.node_placement.as_ref(),
        Workload {
            name: names.registration_controller(),
            service_account: SA_REGISTRATION_CONTROLLER,
            image: image_or(&spec.registration_image_pull_spec, DEFAULT_REGISTRATION_IMAGE),
            args,
            volumes: Vec::new(),
            volume_mounts: Vec::new(),
            readiness_port: None,
        },
    )
}

/// Registration webhook server deployment.
#[must_use]
pub fn registration_webhook(
    names: &HubNames,
    user_labels: &BTreeMap<String, String>,
    mode: InstallMode,
    cluster_manager: &ClusterManager,
    gates: &EffectiveGates,
) -> Deployment {
    webhook_server(
        names,
        user_labels,
        mode,
        cluster_manager,
        names.registration_webhook(),
        SA_REGISTRATION_WEBHOOK,
        image_or(
            &cluster_manager.spec.registration_image_pull_spec,
            DEFAULT_REGISTRATION_IMAGE,
        ),
        REGISTRATION_WEBHOOK_SERVING_CERT,
        feature_gate_args(gates, GateContext::Registration),
    )
}

/// Work webhook server deployment.
#[must_use]
pub fn work_webhook(
    names: &HubNames,
    user_labels: &BTreeMap<String, String>,
    mode: InstallMode,
    cluster_manager: &ClusterManager,
    gates: &EffectiveGates,
) -> Deployment {
    webhook_server(
        names,
        user_labels,
        mode,
        cluster_manager,
        names.work_webhook(),
        SA_WORK_WEBHOOK,
        image_or(&cluster_manager.spec.work_image_pull_spec, DEFAULT_WORK_IMAGE),
        WORK_WEBHOOK_SERVING_CERT,
        feature_gate_args(gates, GateContext::Work),
    )
}

/// Placement controller deployment.
#[must_use]
pub fn placement_controller(
    names: &HubNames,
    user_labels: &BTreeMap<String, String>,
    mode: InstallMode,
    cluster_manager: &ClusterManager,
) -> Deployment {
    build(
        names,
        user_labels,
        mode,
        cluster_manager.spec.node_placement.as_ref(),
        Workload {
            name: names.placement_controller(),
            service_account: SA_PLACEMENT_CONTROLLER,
            image: image_or(
                &cluster_manager.spec.placement_image_pull_spec,
                DEFAULT_PLACEMENT_IMAGE,
            ),
            args: vec!["controller".to_string()],
            volumes: Vec::new(),
            volume_mounts: Vec::new(),
            readiness_port: None,
        },
    )
}

/// Work controller deployment.
///
/// With a non-default work driver active, the deployment carries the
/// `--work-driver` argument and mounts the mirrored `work-driver-config`
/// secret; switching back to `kube` removes both.
#[must_use]
pub fn work_controller(
    names: &HubNames,
    user_labels: &BTreeMap<String, String>,
    mode: InstallMode,
    cluster_manager: &ClusterManager,
    gates: &EffectiveGates,
    cloudevents_driver: bool,
) -> Deployment {
    let mut args = vec!["manager".to_string()];
    args.extend(feature_gate_args(gates, GateContext::Work));

    let mut volumes = Vec::new();
    let mut volume_mounts = Vec::new();
    if cloudevents_driver {
        let driver = cluster_manager
            .spec
            .work_configuration
            .as_ref()
            .and_then(|work| work.work_driver.clone())
            .unwrap_or_default();
        args.push(format!("{ARG_WORK_DRIVER}={driver}"));
        volumes.push(Volume {
            name: WORK_DRIVER_CONFIG_VOLUME.to_string(),
            secret: Some(SecretVolumeSource {
                secret_name: Some(WORK_DRIVER_CONFIG_SECRET.to_string()),
                ..Default::default()
            }),
            ..Default::default()
        });
        volume_mounts.push(VolumeMount {
            name: WORK_DRIVER_CONFIG_VOLUME.to_string(),
            mount_path: WORK_DRIVER_CONFIG_MOUNT_PATH.to_string(),
            read_only: Some(true),
            ..Default::default()
        });
    }

    build(
        names,
        user_labels,
        mode,
        cluster_manager.spec.node_placement.as_ref(),
        Workload {
            name: names.work_controller(),
            service_account: SA_WORK_CONTROLLER,
            image: image_or(&cluster_manager.spec.work_image_pull_spec, DEFAULT_WORK_IMAGE),
            args,
            volumes,
            volume_mounts,
            readiness_port: None,
        },
    )
}

/// AddOn manager controller deployment.
#[must_use]
pub fn addon_manager(
    names: &HubNames,
    user_labels: &BTreeMap<String, String>,
    mode: InstallMode,
    cluster_manager: &ClusterManager,
) -> Deployment {
    build(
        names,
        user_labels,
        mode,
        cluster_manager.spec.node_placement.as_ref(),
        Workload {
            name: names.addon_manager(),
            service_account: SA_ADDON_MANAGER,
            image: image_or(
                &cluster_manager.spec.add_on_manager_image_pull_spec,
                DEFAULT_ADDON_MANAGER_IMAGE,
            ),
            args: vec!["manager".to_string()],
            volumes: Vec::new(),
            volume_mounts: Vec::new(),
            readiness_port: None,
        },
    )
}

#[allow(clippy::too_many_arguments)]
fn webhook_server(
    names: &HubNames,
    user_labels: &BTreeMap<String, String>,
    mode: InstallMode,
    cluster_manager: &ClusterManager,
    name: String,
    service_account: &str,
    image: String,
    serving_cert_secret: &str,
    gate_args: Vec<String>,
) -> Deployment {
    let mut args = vec![
        "webhook-server".to_string(),
        format!("--port={WEBHOOK_CONTAINER_PORT}"),
        format!("--tls-cert-file={SERVING_CERT_MOUNT_PATH}/tls.crt"),
        format!("--tls-private-key-file={SERVING_CERT_MOUNT_PATH}/tls.key"),
    ];
    args.extend(gate_args);

    build(
        names,
        user_labels,
        mode,
        cluster_manager.spec.node_placement.as_ref(),
        Workload {
            name,
            service_account,
            image,
            args,
            volumes: vec![Volume {
                name: SERVING_CERT_VOLUME.to_string(),
                secret: Some(SecretVolumeSource {
                    secret_name: Some(serving_cert_secret.to_string()),
                    ..Default::default()
                }),
                ..Default::default()
            }],
            volume_mounts: vec![VolumeMount {
                name: SERVING_CERT_VOLUME.to_string(),
                mount_path: SERVING_CERT_MOUNT_PATH.to_string(),
                read_only: Some(true),
                ..Default::default()
            }],
            readiness_port: Some(WEBHOOK_CONTAINER_PORT),
        },
    )
}

fn image_or(pull_spec: &Option<String>, fallback: &str) -> String {
    pull_spec
        .as_deref()
        .filter(|image| !image.is_empty())
        .unwrap_or(fallback)
        .to_string()
}

fn build(
    names: &HubNames,
    user_labels: &BTreeMap<String, String>,
    mode: InstallMode,
    node_placement: Option<&NodePlacement>,
    mut workload: Workload<'_>,
) -> Deployment {
    let merged_labels = labels::merge(&workload.name, &names.cluster_manager, user_labels);
    let mut selector_labels = BTreeMap::new();
    selector_labels.insert(labels::APP_LABEL_KEY.to_string(), workload.name.clone());

    // Hosted mode: every workload talks to the managed control plane through
    // the external hub kubeconfig.
    if mode == InstallMode::Hosted {
        workload.args.push(format!(
            "{ARG_KUBECONFIG}={EXTERNAL_HUB_KUBECONFIG_MOUNT_PATH}/kubeconfig"
        ));
        workload.volumes.push(Volume {
            name: EXTERNAL_HUB_KUBECONFIG_VOLUME.to_string(),
            secret: Some(SecretVolumeSource {
                secret_name: Some(EXTERNAL_HUB_KUBECONFIG_SECRET.to_string()),
                ..Default::default()
            }),
            ..Default::default()
        });
        workload.volume_mounts.push(VolumeMount {
            name: EXTERNAL_HUB_KUBECONFIG_VOLUME.to_string(),
            mount_path: EXTERNAL_HUB_KUBECONFIG_MOUNT_PATH.to_string(),
            read_only: Some(true),
            ..Default::default()
        });
    }

    let readiness_probe = workload.readiness_port.map(|port| Probe {
        tcp_socket: Some(TCPSocketAction {
            port: IntOrString::Int(port),
            ..Default::default()
        }),
        initial_delay_seconds: Some(2),
        period_seconds: Some(10),
        ..Default::default()
    });

    let ports = workload.readiness_port.map(|port| {
        vec![ContainerPort {
            container_port: port,
            name: Some("webhook".to_string()),
            protocol: Some("TCP".to_string()),
            ..Default::default()
        }]
    });

    let container = Container {
        name: workload.name.clone(),
        image: Some(workload.image),
        args: Some(workload.args),
        ports,
        readiness_probe,
        volume_mounts: if workload.volume_mounts.is_empty() {
            None
        } else {
            Some(workload.volume_mounts)
        },
        security_context: Some(SecurityContext {
            allow_privilege_escalation: Some(false),
            read_only_root_filesystem: Some(true),
            capabilities: Some(Capabilities {
                drop: Some(vec!["ALL".to_string()]),
                ..Default::default()
            }),
            ..Default::default()
        }),
        ..Default::default()
    };

    Deployment {
        metadata: ObjectMeta {
            name: Some(workload.name.clone()),
            namespace: Some(names.namespace.clone()),
            labels: Some(merged_labels.clone()),
            ..Default::default()
        },
        spec: Some(DeploymentSpec {
            replicas: Some(1),
            selector: LabelSelector {
                match_labels: Some(selector_labels),
                ..Default::default()
            },
            template: PodTemplateSpec {
                metadata: Some(ObjectMeta {
                    labels: Some(merged_labels),
                    ..Default::default()
                }),
                spec: Some(PodSpec {
                    service_account_name: Some(workload.service_account.to_string()),
                    containers: vec![container],
                    node_selector: node_placement
                        .filter(|placement| !placement.node_selector.is_empty())
                        .map(|placement| placement.node_selector.clone()),
                    tolerations: node_placement
                        .filter(|placement| !placement.tolerations.is_empty())
                        .map(|placement| placement.tolerations.clone()),
                    volumes: if workload.volumes.is_empty() {
                        None
                    } else {
                        Some(workload.volumes)
                    },
                    security_context: Some(PodSecurityContext {
                        run_as_non_root: Some(true),
                        ..Default::default()
                    }),
                    ..Default::default()
                }),
            },
            ..Default::default()
        }),
        ..Default::default()
    }
}

#[cfg(test)]
#[path = "deployments_tests.rs"]
mod deployments_tests;
