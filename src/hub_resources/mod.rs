// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Hub resource model and the desired-set resolver.
//!
//! Everything the operator manages is expressed as a [`HubResource`], a
//! tagged variant over the concrete Kubernetes kinds with a uniform identity
//! surface. [`resolve`] is the pure function from (spec, effective feature
//! gates, rollout observations) to the ordered list of
//! [`ResourceDescriptor`]s for one reconciliation pass.
//!
//! Descriptors come in two flavors:
//!
//! - `required = true`: the resource must exist with the rendered content;
//!   the set of required descriptors is exactly `status.relatedResources`.
//! - `required = false`: a tombstone. The resource belonged to a capability
//!   that is now disabled and must be hard-deleted if still present.
//!
//! A resource that is neither required nor tombstoned is simply left alone;
//! this is how admission webhook configurations survive readiness
//! regressions without being recreated prematurely.

use crate::constants::{
    CA_BUNDLE_CONFIGMAP, HUB_NAMESPACE,
    REGISTRATION_WEBHOOK_SERVING_CERT, SIGNER_SECRET, SUFFIX_ADDON_MANAGER,
    SUFFIX_PLACEMENT_CONTROLLER, SUFFIX_REGISTRATION_CONTROLLER, SUFFIX_REGISTRATION_WEBHOOK,
    SUFFIX_WORK_CONTROLLER, SUFFIX_WORK_WEBHOOK, WORK_DRIVER_CONFIG_SECRET, WORK_DRIVER_KUBE,
    WORK_WEBHOOK_SERVING_CERT,
};
use crate::crd::{ClusterManager, InstallMode, RelatedResource};
use crate::feature_gates::{
    is_enabled, EffectiveGates, FEATURE_ADDON_MANAGEMENT, FEATURE_CLOUD_EVENTS_DRIVERS,
    FEATURE_MANIFESTWORK_REPLICA_SET,
};
use anyhow::Result;
use k8s_openapi::api::admissionregistration::v1::{
    MutatingWebhookConfiguration, ValidatingWebhookConfiguration,
};
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::{ConfigMap, Namespace, Secret, Service, ServiceAccount};
use k8s_openapi::api::rbac::v1::{ClusterRole, ClusterRoleBinding, RoleBinding};
use k8s_openapi::apiextensions_apiserver::pkg::apis::apiextensions::v1::CustomResourceDefinition;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use k8s_openapi::ByteString;
use kube::ResourceExt;
use std::collections::BTreeMap;

pub mod crds;
pub mod deployments;
pub mod rbac;
pub mod webhooks;

#[cfg(test)]
mod mod_tests;

/// A managed resource, tagged by kind.
#[derive(Clone, Debug)]
pub enum HubResource {
    Namespace(Namespace),
    CustomResourceDefinition(Box<CustomResourceDefinition>),
    ServiceAccount(ServiceAccount),
    ClusterRole(ClusterRole),
    ClusterRoleBinding(ClusterRoleBinding),
    RoleBinding(RoleBinding),
    Deployment(Box<Deployment>),
    Service(Service),
    Secret(Secret),
    ConfigMap(ConfigMap),
    ValidatingWebhook(ValidatingWebhookConfiguration),
    MutatingWebhook(MutatingWebhookConfiguration),
}

/// Identity of a [`HubResource`], usable as a map key.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct ResourceId {
    /// API group, empty for the core group
    pub group: String,
    /// Lowercase plural resource name
    pub resource: String,
    /// Namespace, empty for cluster-scoped resources
    pub namespace: String,
    /// Object name
    pub name: String,
}

impl std::fmt::Display for ResourceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.namespace.is_empty() {
            write!(f, "{}/{}", self.resource, self.name)
        } else {
            write!(f, "{}/{}/{}", self.resource, self.namespace, self.name)
        }
    }
}

impl HubResource {
    /// (group, version, plural) coordinates of the variant.
    #[must_use]
    pub fn gvr(&self) -> (&'static str, &'static str, &'static str) {
        match self {
            HubResource::Namespace(_) => ("", "v1", "namespaces"),
            HubResource::CustomResourceDefinition(_) => {
                ("apiextensions.k8s.io", "v1", "customresourcedefinitions")
            }
            HubResource::ServiceAccount(_) => ("", "v1", "serviceaccounts"),
            HubResource::ClusterRole(_) => ("rbac.authorization.k8s.io", "v1", "clusterroles"),
            HubResource::ClusterRoleBinding(_) => {
                ("rbac.authorization.k8s.io", "v1", "clusterrolebindings")
            }
            HubResource::RoleBinding(_) => ("rbac.authorization.k8s.io", "v1", "rolebindings"),
            HubResource::Deployment(_) => ("apps", "v1", "deployments"),
            HubResource::Service(_) => ("", "v1", "services"),
            HubResource::Secret(_) => ("", "v1", "secrets"),
            HubResource::ConfigMap(_) => ("", "v1", "configmaps"),
            HubResource::ValidatingWebhook(_) => (
                "admissionregistration.k8s.io",
                "v1",
                "validatingwebhookconfigurations",
            ),
            HubResource::MutatingWebhook(_) => (
                "admissionregistration.k8s.io",
                "v1",
                "mutatingwebhookconfigurations",
            ),
        }
    }

    fn meta(&self) -> &ObjectMeta {
        match self {
            HubResource::Namespace(o) => &o.metadata,
            HubResource::CustomResourceDefinition(o) => &o.metadata,
            HubResource::ServiceAccount(o) => &o.metadata,
            HubResource::ClusterRole(o) => &o.metadata,
            HubResource::ClusterRoleBinding(o) => &o.metadata,
            HubResource::RoleBinding(o) => &o.metadata,
            HubResource::Deployment(o) => &o.metadata,
            HubResource::Service(o) => &o.metadata,
            HubResource::Secret(o) => &o.metadata,
            HubResource::ConfigMap(o) => &o.metadata,
            HubResource::ValidatingWebhook(o) => &o.metadata,
            HubResource::MutatingWebhook(o) => &o.metadata,
        }
    }

    /// Object name.
    #[must_use]
    pub fn name(&self) -> String {
        self.meta().name.clone().unwrap_or_default()
    }

    /// Namespace, `None` for cluster-scoped kinds.
    #[must_use]
    pub fn namespace(&self) -> Option<String> {
        self.meta().namespace.clone()
    }

    /// Identity of this resource.
    #[must_use]
    pub fn id(&self) -> ResourceId {
        let (group, _, resource) = self.gvr();
        ResourceId {
            group: group.to_string(),
            resource: resource.to_string(),
            namespace: self.namespace().unwrap_or_default(),
            name: self.name(),
        }
    }

    /// The `status.relatedResources` record for this resource.
    #[must_use]
    pub fn related_resource(&self) -> RelatedResource {
        let (group, version, resource) = self.gvr();
        RelatedResource {
            group: group.to_string(),
            version: version.to_string(),
            resource: resource.to_string(),
            namespace: self.namespace().unwrap_or_default(),
            name: self.name(),
        }
    }

    /// Whether per-resource generation bookkeeping applies to this kind.
    #[must_use]
    pub fn tracks_generation(&self) -> bool {
        matches!(self, HubResource::Deployment(_))
    }

    /// Serialize the rendered content for drift comparison and apply.
    pub fn to_value(&self) -> Result<serde_json::Value> {
        let value = match self {
            HubResource::Namespace(o) => serde_json::to_value(o)?,
            HubResource::CustomResourceDefinition(o) => serde_json::to_value(o)?,
            HubResource::ServiceAccount(o) => serde_json::to_value(o)?,
            HubResource::ClusterRole(o) => serde_json::to_value(o)?,
            HubResource::ClusterRoleBinding(o) => serde_json::to_value(o)?,
            HubResource::RoleBinding(o) => serde_json::to_value(o)?,
            HubResource::Deployment(o) => serde_json::to_value(o)?,
            HubResource::Service(o) => serde_json::to_value(o)?,
            HubResource::Secret(o) => serde_json::to_value(o)?,
            HubResource::ConfigMap(o) => serde_json::to_value(o)?,
            HubResource::ValidatingWebhook(o) => serde_json::to_value(o)?,
            HubResource::MutatingWebhook(o) => serde_json::to_value(o)?,
        };
        Ok(value)
    }
}

/// One entry of the resolved desired set.
#[derive(Clone, Debug)]
pub struct ResourceDescriptor {
    /// The rendered resource.
    pub resource: HubResource,
    /// `true` to converge toward existence, `false` to delete if present.
    pub required: bool,
}

impl ResourceDescriptor {
    fn required(resource: HubResource) -> Self {
        ResourceDescriptor {
            resource,
            required: true,
        }
    }

    fn tombstone(resource: HubResource) -> Self {
        ResourceDescriptor {
            resource,
            required: false,
        }
    }
}

/// Stable names of everything belonging to one `ClusterManager`.
#[derive(Clone, Debug)]
pub struct HubNames {
    /// Name of the owning `ClusterManager`
    pub cluster_manager: String,
    /// Namespace the namespaced hub resources live in
    pub namespace: String,
}

impl HubNames {
    /// Names for a `ClusterManager` deployed into the default hub namespace.
    #[must_use]
    pub fn new(cluster_manager: &str) -> Self {
        HubNames {
            cluster_manager: cluster_manager.to_string(),
            namespace: HUB_NAMESPACE.to_string(),
        }
    }

    /// Deployment name of a component, `<cm>-<suffix>`.
    #[must_use]
    pub fn deployment(&self, suffix: &str) -> String {
        format!("{}-{suffix}", self.cluster_manager)
    }

    /// Registration controller deployment name.
    #[must_use]
    pub fn registration_controller(&self) -> String {
        self.deployment(SUFFIX_REGISTRATION_CONTROLLER)
    }

    /// Registration webhook deployment and service name.
    #[must_use]
    pub fn registration_webhook(&self) -> String {
        self.deployment(SUFFIX_REGISTRATION_WEBHOOK)
    }

    /// Work webhook deployment and service name.
    #[must_use]
    pub fn work_webhook(&self) -> String {
        self.deployment(SUFFIX_WORK_WEBHOOK)
    }

    /// Placement controller deployment name.
    #[must_use]
    pub fn placement_controller(&self) -> String {
        self.deployment(SUFFIX_PLACEMENT_CONTROLLER)
    }

    /// Work controller deployment name.
    #[must_use]
    pub fn work_controller(&self) -> String {
        self.deployment(SUFFIX_WORK_CONTROLLER)
    }

    /// AddOn manager deployment name.
    #[must_use]
    pub fn addon_manager(&self) -> String {
        self.deployment(SUFFIX_ADDON_MANAGER)
    }
}

/// Observed readiness of the webhook-backing deployments.
///
/// Drives the asymmetric gating of admission webhook configurations: a
/// webhook configuration is only ever *created* against a Functional
/// backend.
#[derive(Clone, Copy, Debug, Default)]
pub struct WebhookReadiness {
    /// The registration webhook deployment is Functional.
    pub registration: bool,
    /// The work webhook deployment is Functional.
    pub work: bool,
}

/// Inputs of one resolution pass.
pub struct ResolveParams<'a> {
    /// The desired-state object.
    pub cluster_manager: &'a ClusterManager,
    /// Effective registration gates (validated).
    pub registration_gates: &'a EffectiveGates,
    /// Effective work gates (validated).
    pub work_gates: &'a EffectiveGates,
    /// Effective addon manager gates (validated).
    pub addon_gates: &'a EffectiveGates,
    /// Rollout state of the webhook backends.
    pub webhook_ready: WebhookReadiness,
    /// Agent image handed to the cluster importer, when configured.
    pub agent_image: Option<&'a str>,
    /// Data of the user's work driver config secret in the operator
    /// namespace, when a non-default driver is selected and the secret
    /// exists.
    pub work_driver_config: Option<&'a BTreeMap<String, ByteString>>,
}

impl ResolveParams<'_> {
    fn mode(&self) -> InstallMode {
        self.cluster_manager.spec.deploy_option.mode
    }

    fn user_labels(&self) -> BTreeMap<String, String> {
        self.cluster_manager.labels().clone()
    }

    fn work_driver(&self) -> &str {
        self.cluster_manager
            .spec
            .work_configuration
            .as_ref()
            .and_then(|work| work.work_driver.as_deref())
            .unwrap_or(WORK_DRIVER_KUBE)
    }

    /// A non-default work driver is in effect.
    fn cloudevents_driver_active(&self) -> bool {
        self.work_driver() != WORK_DRIVER_KUBE
            && is_enabled(self.work_gates, FEATURE_CLOUD_EVENTS_DRIVERS)
    }
}

/// Resolve the desired resource set for one reconciliation pass.
///
/// Deterministic: the same inputs always produce the same descriptors in the
/// same order, so an aborted pass is safely retried from scratch. The order
/// is only load-bearing for human-readable diffing of
/// `status.relatedResources`.
pub fn resolve(params: &ResolveParams<'_>) -> Result<Vec<ResourceDescriptor>> {
    let names = HubNames::new(&params.cluster_manager.name_any());
    let labels = params.user_labels();
    let mode = params.mode();
    let mut out = Vec::new();

    // Hub namespace and the API surface come first: everything else lands
    // inside them.
    out.push(ResourceDescriptor::required(HubResource::Namespace(
        namespace(&names, &labels),
    )));
    for crd in crds::hub_crds()? {
        out.push(ResourceDescriptor::required(
            HubResource::CustomResourceDefinition(Box::new(crd)),
        ));
    }

    // Registration controller
    out.push(ResourceDescriptor::required(HubResource::ClusterRole(
        rbac::registration_controller_role(&names, &labels, params.registration_gates),
    )));
    out.push(ResourceDescriptor::required(
        HubResource::ClusterRoleBinding(rbac::registration_controller_binding(&names, &labels)),
    ));
    out.push(ResourceDescriptor::required(HubResource::ServiceAccount(
        rbac::service_account(
            &names,
            crate::constants::SA_REGISTRATION_CONTROLLER,
            &labels,
        ),
    )));
    out.push(ResourceDescriptor::required(HubResource::Deployment(
        Box::new(deployments::registration_controller(
            &names,
            &labels,
            mode,
            params.cluster_manager,
            params.registration_gates,
            params.agent_image,
        )),
    )));

    // Registration webhook
    out.push(ResourceDescriptor::required(HubResource::ClusterRole(
        rbac::registration_webhook_role(&names, &labels),
    )));
    out.push(ResourceDescriptor::required(
        HubResource::ClusterRoleBinding(rbac::registration_webhook_binding(&names, &labels)),
    ));
    out.push(ResourceDescriptor::required(HubResource::ServiceAccount(
        rbac::service_account(&names, crate::constants::SA_REGISTRATION_WEBHOOK, &labels),
    )));
    out.push(ResourceDescriptor::required(HubResource::Deployment(
        Box::new(deployments::registration_webhook(
            &names,
            &labels,
            mode,
            params.cluster_manager,
            params.registration_gates,
        )),
    )));
    out.push(ResourceDescriptor::required(HubResource::Service(
        webhooks::webhook_service(&names, &names.registration_webhook(), &labels),
    )));
    if params.webhook_ready.registration {
        out.push(ResourceDescriptor::required(
            HubResource::ValidatingWebhook(webhooks::cluster_validating_webhook(&names, &labels)),
        ));
        out.push(ResourceDescriptor::required(HubResource::MutatingWebhook(
            webhooks::cluster_mutating_webhook(&names, &labels),
        )));
    }

    // Work webhook
    out.push(ResourceDescriptor::required(HubResource::ClusterRole(
        rbac::work_webhook_role(&names, &labels),
    )));
    out.push(ResourceDescriptor::required(
        HubResource::ClusterRoleBinding(rbac::work_webhook_binding(&names, &labels)),
    ));
    out.push(ResourceDescriptor::required(HubResource::ServiceAccount(
        rbac::service_account(&names, crate::constants::SA_WORK_WEBHOOK, &labels),
    )));
    out.push(ResourceDescriptor::required(HubResource::Deployment(
        Box::new(deployments::work_webhook(
            &names,
            &labels,
            mode,
            params.cluster_manager,
            params.work_gates,
        )),
    )));
    out.push(ResourceDescriptor::required(HubResource::Service(
        webhooks::webhook_service(&names, &names.work_webhook(), &labels),
    )));
    if params.webhook_ready.work {
        out.push(ResourceDescriptor::required(
            HubResource::ValidatingWebhook(webhooks::work_validating_webhook(&names, &labels)),
        ));
    }

    // Placement controller
    out.push(ResourceDescriptor::required(HubResource::ClusterRole(
        rbac::placement_controller_role(&names, &labels),
    )));
    out.push(ResourceDescriptor::required(
        HubResource::ClusterRoleBinding(rbac::placement_controller_binding(&names, &labels)),
    ));
    out.push(ResourceDescriptor::required(HubResource::ServiceAccount(
        rbac::service_account(&names, crate::constants::SA_PLACEMENT_CONTROLLER, &labels),
    )));
    out.push(ResourceDescriptor::required(HubResource::Deployment(
        Box::new(deployments::placement_controller(
            &names,
            &labels,
            mode,
            params.cluster_manager,
        )),
    )));

    // Work controller, owned by the ManifestWorkReplicaSet gate. Disabling
    // the gate tombstones all four resources: access-control objects must
    // not linger when the capability is off.
    let work_controller = [
        HubResource::ClusterRole(rbac::work_controller_role(&names, &labels)),
        HubResource::ClusterRoleBinding(rbac::work_controller_binding(&names, &labels)),
        HubResource::ServiceAccount(rbac::service_account(
            &names,
            crate::constants::SA_WORK_CONTROLLER,
            &labels,
        )),
        HubResource::Deployment(Box::new(deployments::work_controller(
            &names,
            &labels,
            mode,
            params.cluster_manager,
            params.work_gates,
            params.cloudevents_driver_active(),
        ))),
    ];
    let work_enabled = is_enabled(params.work_gates, FEATURE_MANIFESTWORK_REPLICA_SET);
    for resource in work_controller {
        out.push(if work_enabled {
            ResourceDescriptor::required(resource)
        } else {
            ResourceDescriptor::tombstone(resource)
        });
    }

    // AddOn manager, owned by the AddonManagement gate.
    let addon_manager = [
        HubResource::ClusterRole(rbac::addon_manager_role(&names, &labels)),
        HubResource::ClusterRoleBinding(rbac::addon_manager_binding(&names, &labels)),
        HubResource::RoleBinding(rbac::addon_manager_auth_reader_binding(&names, &labels)),
        HubResource::ServiceAccount(rbac::service_account(
            &names,
            crate::constants::SA_ADDON_MANAGER,
            &labels,
        )),
        HubResource::Deployment(Box::new(deployments::addon_manager(
            &names,
            &labels,
            mode,
            params.cluster_manager,
        ))),
    ];
    let addon_enabled = is_enabled(params.addon_gates, FEATURE_ADDON_MANAGEMENT);
    for resource in addon_manager {
        out.push(if addon_enabled {
            ResourceDescriptor::required(resource)
        } else {
            ResourceDescriptor::tombstone(resource)
        });
    }

    // Certificate material placeholders. The rotation controller fills them
    // in on its own timer; creating them here lets consuming workloads mount
    // the secrets before any certificate exists.
    for secret_name in [
        SIGNER_SECRET,
        REGISTRATION_WEBHOOK_SERVING_CERT,
        WORK_WEBHOOK_SERVING_CERT,
    ] {
        out.push(ResourceDescriptor::required(HubResource::Secret(
            placeholder_secret(&names, secret_name, &labels),
        )));
    }
    out.push(ResourceDescriptor::required(HubResource::ConfigMap(
        placeholder_configmap(&names, CA_BUNDLE_CONFIGMAP, &labels),
    )));

    // Mirror of the user's work driver config, only while a non-default
    // driver is active.
    let driver_secret = HubResource::Secret(work_driver_config_secret(
        &names,
        &labels,
        params.work_driver_config,
    ));
    out.push(if params.cloudevents_driver_active() && params.work_driver_config.is_some() {
        ResourceDescriptor::required(driver_secret)
    } else {
        ResourceDescriptor::tombstone(driver_secret)
    });

    Ok(out)
}

fn namespace(names: &HubNames, user_labels: &BTreeMap<String, String>) -> Namespace {
    Namespace {
        metadata: ObjectMeta {
            name: Some(names.namespace.clone()),
            labels: Some(crate::labels::merge(
                &names.namespace,
                &names.cluster_manager,
                user_labels,
            )),
            ..Default::default()
        },
        ..Default::default()
    }
}

fn placeholder_secret(
    names: &HubNames,
    name: &str,
    user_labels: &BTreeMap<String, String>,
) -> Secret {
    Secret {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            namespace: Some(names.namespace.clone()),
            labels: Some(crate::labels::merge(
                name,
                &names.cluster_manager,
                user_labels,
            )),
            ..Default::default()
        },
        ..Default::default()
    }
}

fn placeholder_configmap(
    names: &HubNames,
    name: &str,
    user_labels: &BTreeMap<String, String>,
) -> ConfigMap {
    ConfigMap {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            namespace: Some(names.namespace.clone()),
            labels: Some(crate::labels::merge(
                name,
                &names.cluster_manager,
                user_labels,
            )),
            ..Default::default()
        },
        ..Default::default()
    }
}

fn work_driver_config_secret(
    names: &HubNames,
    user_labels: &BTreeMap<String, String>,
    data: Option<&BTreeMap<String, ByteString>>,
) -> Secret {
    Secret {
        metadata: ObjectMeta {
            name: Some(WORK_DRIVER_CONFIG_SECRET.to_string()),
            namespace: Some(names.namespace.clone()),
            labels: Some(crate::labels::merge(
                WORK_DRIVER_CONFIG_SECRET,
                &names.cluster_manager,
                user_labels,
            )),
            ..Default::default()
        },
        data: data.cloned(),
        ..Default::default()
    }
}
