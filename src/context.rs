// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Shared context for the controllers.
//!
//! Every controller task receives an `Arc<Context>` carrying the Kubernetes
//! client, the cluster-state boundary the reconcilers operate through and
//! the per-process options. Nothing in here is mutable; per-object state
//! lives on the `ClusterManager` status.

use crate::reconcilers::{KubeClusterState, ReconcileOptions};
use kube::Client;

/// Shared context passed to all controllers.
#[derive(Clone)]
pub struct Context {
    /// Kubernetes client for API operations
    pub client: Client,

    /// Cluster-state boundary used by the reconcilers
    pub cluster_state: KubeClusterState,

    /// Per-process reconciliation options
    pub options: ReconcileOptions,
}

impl Context {
    /// Build a context from a client and options.
    #[must_use]
    pub fn new(client: Client, options: ReconcileOptions) -> Self {
        Context {
            cluster_state: KubeClusterState::new(client.clone()),
            client,
            options,
        }
    }
}
