// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Generic resource convergence against a cluster-state boundary.
//!
//! The apply/delete primitives are external collaborators; this module
//! defines them as the [`ClusterState`] trait and implements the resolved
//! desired-set convergence on top:
//!
//! - required + absent: create
//! - required + drifted: update in place (server-side apply keeps
//!   externally-owned fields intact)
//! - tombstone + present: delete
//!
//! A converged set produces zero write operations, so resync ticks are free.
//! The first error aborts the pass and is surfaced; resolution being
//! deterministic, the next event retries from a clean snapshot.

use crate::constants::FIELD_MANAGER;
use crate::crd::{ClusterManagerStatus, GenerationStatus};
use crate::hub_resources::{HubResource, ResourceDescriptor, ResourceId};
use crate::reconcilers::conditions::DeploymentRollout;
use crate::reconcilers::retry::retry_api_call;
use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use k8s_openapi::ByteString;
use kube::api::{Api, ApiResource, DeleteParams, DynamicObject, GroupVersionKind, Patch, PatchParams};
use kube::Client;
use std::collections::BTreeMap;
use tracing::{debug, info};

/// A live resource as seen at the boundary.
#[derive(Clone, Debug)]
pub struct LiveResource {
    /// Full object content
    pub content: serde_json::Value,
    /// `metadata.generation`, when the kind carries one
    pub generation: Option<i64>,
}

/// The cluster-state boundary the reconcilers operate through.
///
/// The production implementation wraps a [`kube::Client`]; tests use an
/// in-memory store. Every call is expected to be individually atomic and
/// bounded; ordering and idempotent retry are this crate's responsibility.
#[async_trait]
pub trait ClusterState: Send + Sync {
    /// Read a resource, `None` when absent.
    async fn get(&self, id: &ResourceId) -> Result<Option<LiveResource>>;

    /// Create-or-update a resource, returning the post-apply state.
    async fn apply(&self, resource: &HubResource) -> Result<LiveResource>;

    /// Delete a resource; absence is not an error.
    async fn delete(&self, id: &ResourceId) -> Result<()>;

    /// Patch the status subresource of a `ClusterManager`.
    async fn update_status(&self, name: &str, status: &ClusterManagerStatus) -> Result<()>;

    /// Rollout numbers of a deployment, `None` when absent.
    async fn rollout(&self, namespace: &str, name: &str) -> Result<Option<DeploymentRollout>> {
        let id = ResourceId {
            group: "apps".to_string(),
            resource: "deployments".to_string(),
            namespace: namespace.to_string(),
            name: name.to_string(),
        };
        let Some(live) = self.get(&id).await? else {
            return Ok(None);
        };

        let content = &live.content;
        Ok(Some(DeploymentRollout {
            desired_replicas: content
                .pointer("/spec/replicas")
                .and_then(serde_json::Value::as_i64)
                .unwrap_or(1) as i32,
            ready_replicas: content
                .pointer("/status/readyReplicas")
                .and_then(serde_json::Value::as_i64)
                .unwrap_or(0) as i32,
            generation: live
                .generation
                .or_else(|| content.pointer("/metadata/generation").and_then(serde_json::Value::as_i64)),
            observed_generation: content
                .pointer("/status/observedGeneration")
                .and_then(serde_json::Value::as_i64),
        }))
    }

    /// Data of a secret, `None` when the secret is absent.
    async fn secret_data(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<BTreeMap<String, ByteString>>> {
        let id = ResourceId {
            group: String::new(),
            resource: "secrets".to_string(),
            namespace: namespace.to_string(),
            name: name.to_string(),
        };
        let Some(live) = self.get(&id).await? else {
            return Ok(None);
        };
        match live.content.get("data") {
            None | Some(serde_json::Value::Null) => Ok(Some(BTreeMap::new())),
            Some(data) => Ok(Some(serde_json::from_value(data.clone())?)),
        }
    }
}

#[async_trait]
impl<T: ClusterState + ?Sized> ClusterState for std::sync::Arc<T> {
    async fn get(&self, id: &ResourceId) -> Result<Option<LiveResource>> {
        (**self).get(id).await
    }

    async fn apply(&self, resource: &HubResource) -> Result<LiveResource> {
        (**self).apply(resource).await
    }

    async fn delete(&self, id: &ResourceId) -> Result<()> {
        (**self).delete(id).await
    }

    async fn update_status(&self, name: &str, status: &ClusterManagerStatus) -> Result<()> {
        (**self).update_status(name, status).await
    }
}

/// Outcome of one convergence pass.
#[derive(Clone, Debug, Default)]
pub struct ApplyOutcome {
    /// Exactly the required descriptors, in resolve order.
    pub related_resources: Vec<crate::crd::RelatedResource>,
    /// Post-apply generation per workload resource.
    pub generations: Vec<GenerationStatus>,
    /// Resources written this pass (created or updated).
    pub applied: usize,
    /// Resources deleted this pass.
    pub deleted: usize,
}

/// Converge the cluster toward a resolved desired set.
///
/// # Errors
///
/// The first failing operation aborts the pass; nothing is rolled back
/// because a rerun converges from whatever state was left behind.
pub async fn reconcile_resources(
    state: &(impl ClusterState + ?Sized),
    desired: &[ResourceDescriptor],
) -> Result<ApplyOutcome> {
    let mut outcome = ApplyOutcome::default();

    for descriptor in desired {
        let id = descriptor.resource.id();

        if !descriptor.required {
            let present = state
                .get(&id)
                .await
                .with_context(|| format!("reading {id}"))?
                .is_some();
            if present {
                info!(resource = %id, "Deleting resource no longer in the desired set");
                state
                    .delete(&id)
                    .await
                    .with_context(|| format!("deleting {id}"))?;
                outcome.deleted += 1;
            }
            continue;
        }

        let rendered = descriptor.resource.to_value()?;
        let live = state
            .get(&id)
            .await
            .with_context(|| format!("reading {id}"))?;

        let generation = match live {
            Some(live) if json_subset(&rendered, &live.content) => {
                debug!(resource = %id, "Resource already converged");
                live.generation
            }
            live => {
                if live.is_none() {
                    info!(resource = %id, "Creating resource");
                } else {
                    info!(resource = %id, "Updating drifted resource");
                }
                let applied = state
                    .apply(&descriptor.resource)
                    .await
                    .with_context(|| format!("applying {id}"))?;
                outcome.applied += 1;
                applied.generation
            }
        };

        outcome
            .related_resources
            .push(descriptor.resource.related_resource());

        if descriptor.resource.tracks_generation() {
            let (group, version, resource) = descriptor.resource.gvr();
            outcome.generations.push(GenerationStatus {
                group: group.to_string(),
                version: version.to_string(),
                resource: resource.to_string(),
                namespace: id.namespace.clone(),
                name: id.name.clone(),
                last_generation: generation.unwrap_or(0),
            });
        }
    }

    Ok(outcome)
}

/// Whether every field the operator renders matches the live object.
///
/// Fields the operator does not render are ignored, which is what keeps
/// externally-set fields (defaulted values, other field managers) from
/// counting as drift. Arrays compare element-wise: order is meaningful for
/// args, volumes and rule lists.
#[must_use]
pub fn json_subset(rendered: &serde_json::Value, live: &serde_json::Value) -> bool {
    match (rendered, live) {
        (serde_json::Value::Null, _) => true,
        (serde_json::Value::Object(expected), serde_json::Value::Object(actual)) => {
            expected.iter().all(|(key, value)| {
                if value.is_null() {
                    return true;
                }
                actual
                    .get(key)
                    .is_some_and(|actual_value| json_subset(value, actual_value))
            })
        }
        (serde_json::Value::Array(expected), serde_json::Value::Array(actual)) => {
            expected.len() == actual.len()
                && expected
                    .iter()
                    .zip(actual.iter())
                    .all(|(e, a)| json_subset(e, a))
        }
        (expected, actual) => expected == actual,
    }
}

/// [`ClusterState`] implementation backed by the Kubernetes API.
#[derive(Clone)]
pub struct KubeClusterState {
    client: Client,
}

impl KubeClusterState {
    /// Wrap a client.
    #[must_use]
    pub fn new(client: Client) -> Self {
        KubeClusterState { client }
    }

    fn dynamic_api(&self, id: &ResourceId) -> Result<Api<DynamicObject>> {
        let (kind, version) = kind_for_plural(&id.resource)?;
        let gvk = GroupVersionKind::gvk(&id.group, version, kind);
        let resource = ApiResource::from_gvk_with_plural(&gvk, &id.resource);
        Ok(if id.namespace.is_empty() {
            Api::all_with(self.client.clone(), &resource)
        } else {
            Api::namespaced_with(self.client.clone(), &id.namespace, &resource)
        })
    }
}

fn kind_for_plural(plural: &str) -> Result<(&'static str, &'static str)> {
    Ok(match plural {
        "namespaces" => ("Namespace", "v1"),
        "serviceaccounts" => ("ServiceAccount", "v1"),
        "services" => ("Service", "v1"),
        "secrets" => ("Secret", "v1"),
        "configmaps" => ("ConfigMap", "v1"),
        "deployments" => ("Deployment", "v1"),
        "clusterroles" => ("ClusterRole", "v1"),
        "clusterrolebindings" => ("ClusterRoleBinding", "v1"),
        "rolebindings" => ("RoleBinding", "v1"),
        "validatingwebhookconfigurations" => ("ValidatingWebhookConfiguration", "v1"),
        "mutatingwebhookconfigurations" => ("MutatingWebhookConfiguration", "v1"),
        "customresourcedefinitions" => ("CustomResourceDefinition", "v1"),
        other => bail!("unmanaged resource kind: {other}"),
    })
}

#[async_trait]
impl ClusterState for KubeClusterState {
    async fn get(&self, id: &ResourceId) -> Result<Option<LiveResource>> {
        let api = self.dynamic_api(id)?;
        let object = retry_api_call(|| api.get_opt(&id.name), &format!("get {id}")).await?;
        match object {
            Some(object) => Ok(Some(LiveResource {
                generation: object.metadata.generation,
                content: serde_json::to_value(&object)?,
            })),
            None => Ok(None),
        }
    }

    async fn apply(&self, resource: &HubResource) -> Result<LiveResource> {
        let id = resource.id();
        let api = self.dynamic_api(&id)?;
        let value = resource.to_value()?;
        let params = PatchParams::apply(FIELD_MANAGER).force();
        let patch = Patch::Apply(&value);
        let object = retry_api_call(
            || api.patch(&id.name, &params, &patch),
            &format!("apply {id}"),
        )
        .await?;
        Ok(LiveResource {
            generation: object.metadata.generation,
            content: serde_json::to_value(&object)?,
        })
    }

    async fn delete(&self, id: &ResourceId) -> Result<()> {
        let api = self.dynamic_api(id)?;
        let result = retry_api_call(
            || async {
                match api.delete(&id.name, &DeleteParams::default()).await {
                    Ok(_) => Ok(()),
                    Err(kube::Error::Api(err)) if err.code == 404 => Ok(()),
                    Err(err) => Err(err),
                }
            },
            &format!("delete {id}"),
        )
        .await;
        result
    }

    async fn update_status(&self, name: &str, status: &ClusterManagerStatus) -> Result<()> {
        crate::reconcilers::status::apply_status(&self.client, name, status).await
    }
}

#[cfg(test)]
#[path = "apply_tests.rs"]
mod apply_tests;
