// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Shared test helpers for the reconcilers: an in-memory cluster state and
//! `ClusterManager` fixtures.

use crate::crd::{ClusterManager, ClusterManagerSpec, ClusterManagerStatus};
use crate::hub_resources::{HubResource, ResourceId};
use crate::reconcilers::apply::{ClusterState, LiveResource};
use anyhow::Result;
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

/// In-memory [`ClusterState`] with operation counters.
///
/// `apply` bumps the stored generation only when content actually changes,
/// mirroring how the API server treats spec-identical writes.
#[derive(Default)]
pub(crate) struct FakeCluster {
    objects: Mutex<BTreeMap<ResourceId, LiveResource>>,
    statuses: Mutex<BTreeMap<String, ClusterManagerStatus>>,
    applies: AtomicUsize,
    deletes: AtomicUsize,
}

impl FakeCluster {
    pub fn new() -> Self {
        FakeCluster::default()
    }

    pub fn contains(&self, id: &ResourceId) -> bool {
        self.objects.lock().unwrap().contains_key(id)
    }

    pub fn object_count(&self) -> usize {
        self.objects.lock().unwrap().len()
    }

    pub fn content(&self, id: &ResourceId) -> Option<serde_json::Value> {
        self.objects
            .lock()
            .unwrap()
            .get(id)
            .map(|live| live.content.clone())
    }

    pub fn generation(&self, id: &ResourceId) -> Option<i64> {
        self.objects.lock().unwrap().get(id).and_then(|live| live.generation)
    }

    pub fn status(&self, name: &str) -> Option<ClusterManagerStatus> {
        self.statuses.lock().unwrap().get(name).cloned()
    }

    pub fn apply_count(&self) -> usize {
        self.applies.load(Ordering::SeqCst)
    }

    pub fn delete_count(&self) -> usize {
        self.deletes.load(Ordering::SeqCst)
    }

    /// Simulate the deployment controller converging a rollout.
    pub fn set_deployment_ready(&self, namespace: &str, name: &str) {
        let id = deployment_id(namespace, name);
        let mut objects = self.objects.lock().unwrap();
        if let Some(live) = objects.get_mut(&id) {
            let generation = live.generation.unwrap_or(1);
            let replicas = live
                .content
                .pointer("/spec/replicas")
                .and_then(serde_json::Value::as_i64)
                .unwrap_or(1);
            live.content["status"] = serde_json::json!({
                "readyReplicas": replicas,
                "observedGeneration": generation,
            });
        }
    }

    /// Simulate a crashed rollout: replicas exist but none are ready.
    pub fn set_deployment_unready(&self, namespace: &str, name: &str) {
        let id = deployment_id(namespace, name);
        let mut objects = self.objects.lock().unwrap();
        if let Some(live) = objects.get_mut(&id) {
            let generation = live.generation.unwrap_or(1);
            live.content["status"] = serde_json::json!({
                "readyReplicas": 0,
                "observedGeneration": generation,
            });
        }
    }

    /// Mark every stored deployment as converged.
    pub fn set_all_deployments_ready(&self) {
        let ids: Vec<ResourceId> = self
            .objects
            .lock()
            .unwrap()
            .keys()
            .filter(|id| id.resource == "deployments")
            .cloned()
            .collect();
        for id in ids {
            self.set_deployment_ready(&id.namespace, &id.name);
        }
    }

    /// Simulate an out-of-band edit, bumping the generation like a spec
    /// change would.
    pub fn edit_out_of_band(&self, id: &ResourceId, mutate: impl FnOnce(&mut serde_json::Value)) {
        let mut objects = self.objects.lock().unwrap();
        let live = objects.get_mut(id).expect("resource must exist to edit");
        mutate(&mut live.content);
        live.generation = Some(live.generation.unwrap_or(1) + 1);
    }

    /// Seed a raw object, e.g. a user-provided secret.
    pub fn seed(&self, id: ResourceId, content: serde_json::Value) {
        self.objects.lock().unwrap().insert(
            id,
            LiveResource {
                content,
                generation: Some(1),
            },
        );
    }
}

#[async_trait]
impl ClusterState for FakeCluster {
    async fn get(&self, id: &ResourceId) -> Result<Option<LiveResource>> {
        Ok(self.objects.lock().unwrap().get(id).cloned())
    }

    async fn apply(&self, resource: &HubResource) -> Result<LiveResource> {
        let id = resource.id();
        let content = resource.to_value()?;
        self.applies.fetch_add(1, Ordering::SeqCst);

        let mut objects = self.objects.lock().unwrap();
        let generation = match objects.get(&id) {
            Some(existing) if existing.content == content => existing.generation,
            Some(existing) => Some(existing.generation.unwrap_or(1) + 1),
            None => Some(1),
        };
        let live = LiveResource {
            content,
            generation,
        };
        objects.insert(id, live.clone());
        Ok(live)
    }

    async fn delete(&self, id: &ResourceId) -> Result<()> {
        self.deletes.fetch_add(1, Ordering::SeqCst);
        self.objects.lock().unwrap().remove(id);
        Ok(())
    }

    async fn update_status(&self, name: &str, status: &ClusterManagerStatus) -> Result<()> {
        self.statuses
            .lock()
            .unwrap()
            .insert(name.to_string(), status.clone());
        Ok(())
    }
}

/// Identity of a deployment in the fake store.
pub(crate) fn deployment_id(namespace: &str, name: &str) -> ResourceId {
    ResourceId {
        group: "apps".to_string(),
        resource: "deployments".to_string(),
        namespace: namespace.to_string(),
        name: name.to_string(),
    }
}

/// Identity of a namespaced core-group resource.
pub(crate) fn core_id(resource: &str, namespace: &str, name: &str) -> ResourceId {
    ResourceId {
        group: String::new(),
        resource: resource.to_string(),
        namespace: namespace.to_string(),
        name: name.to_string(),
    }
}

/// A `ClusterManager` fixture with generation 1 and a test image.
pub(crate) fn test_cluster_manager(name: &str) -> ClusterManager {
    let mut cluster_manager = ClusterManager::new(
        name,
        ClusterManagerSpec {
            registration_image_pull_spec: Some("testimage:latest".to_string()),
            work_image_pull_spec: Some("testimage:latest".to_string()),
            placement_image_pull_spec: Some("testimage:latest".to_string()),
            add_on_manager_image_pull_spec: Some("testimage:latest".to_string()),
            ..Default::default()
        },
    );
    cluster_manager.metadata.generation = Some(1);
    cluster_manager
}
