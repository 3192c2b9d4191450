// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for the desired-set resolver.

#[cfg(test)]
mod tests {
    use crate::crd::{ClusterManager, ClusterManagerSpec, FeatureGate, FeatureGateMode, WorkConfiguration};
    use crate::feature_gates::{validate, EffectiveGates, GateContext, FEATURE_ADDON_MANAGEMENT, FEATURE_CLOUD_EVENTS_DRIVERS, FEATURE_MANIFESTWORK_REPLICA_SET};
    use crate::hub_resources::{resolve, ResolveParams, ResourceDescriptor, WebhookReadiness};
    use k8s_openapi::ByteString;
    use std::collections::BTreeMap;

    fn cluster_manager() -> ClusterManager {
        let mut cluster_manager =
            ClusterManager::new("cluster-manager", ClusterManagerSpec::default());
        cluster_manager.metadata.generation = Some(1);
        cluster_manager
    }

    fn default_gates(context: GateContext) -> EffectiveGates {
        validate(&[], context).0
    }

    fn gates_with(
        context: GateContext,
        feature: &str,
        mode: FeatureGateMode,
    ) -> EffectiveGates {
        validate(
            &[FeatureGate {
                feature: feature.to_string(),
                mode,
            }],
            context,
        )
        .0
    }

    struct Fixture {
        cluster_manager: ClusterManager,
        registration: EffectiveGates,
        work: EffectiveGates,
        addon: EffectiveGates,
        ready: WebhookReadiness,
        driver_data: Option<BTreeMap<String, ByteString>>,
    }

    impl Fixture {
        fn new() -> Self {
            Fixture {
                cluster_manager: cluster_manager(),
                registration: default_gates(GateContext::Registration),
                work: default_gates(GateContext::Work),
                addon: default_gates(GateContext::AddOnManager),
                ready: WebhookReadiness {
                    registration: true,
                    work: true,
                },
                driver_data: None,
            }
        }

        fn resolve(&self) -> Vec<ResourceDescriptor> {
            resolve(&ResolveParams {
                cluster_manager: &self.cluster_manager,
                registration_gates: &self.registration,
                work_gates: &self.work,
                addon_gates: &self.addon,
                webhook_ready: self.ready,
                agent_image: None,
                work_driver_config: self.driver_data.as_ref(),
            })
            .unwrap()
        }

        fn required_count(&self) -> usize {
            self.resolve().iter().filter(|d| d.required).count()
        }

        fn required_ids(&self) -> Vec<String> {
            self.resolve()
                .iter()
                .filter(|d| d.required)
                .map(|d| d.resource.id().to_string())
                .collect()
        }
    }

    #[test]
    fn test_baseline_is_45_required_resources() {
        assert_eq!(Fixture::new().required_count(), 45);
    }

    #[test]
    fn test_unready_webhooks_are_omitted_not_tombstoned() {
        let mut fixture = Fixture::new();
        fixture.ready = WebhookReadiness::default();

        let descriptors = fixture.resolve();
        let required = descriptors.iter().filter(|d| d.required).count();
        assert_eq!(required, 42);

        // omitted entirely: no tombstone may ever delete a registered webhook
        assert!(!descriptors
            .iter()
            .any(|d| d.resource.id().resource == "validatingwebhookconfigurations"));
        assert!(!descriptors
            .iter()
            .any(|d| d.resource.id().resource == "mutatingwebhookconfigurations"));
    }

    #[test]
    fn test_work_gate_owns_exactly_four_resources() {
        let mut fixture = Fixture::new();
        fixture.work = gates_with(
            GateContext::Work,
            FEATURE_MANIFESTWORK_REPLICA_SET,
            FeatureGateMode::Disable,
        );

        let descriptors = fixture.resolve();
        let required = descriptors.iter().filter(|d| d.required).count();
        let tombstones: Vec<_> = descriptors.iter().filter(|d| !d.required).collect();

        assert_eq!(required, 41);
        // 4 work-controller resources + the inactive driver mirror
        assert_eq!(tombstones.len(), 5);
        let tombstoned_work: Vec<String> = tombstones
            .iter()
            .map(|d| d.resource.id().to_string())
            .filter(|id| id.contains("work-controller") || id.contains("work:controller"))
            .collect();
        assert_eq!(tombstoned_work.len(), 4);
    }

    #[test]
    fn test_addon_gate_owns_exactly_five_resources() {
        let mut fixture = Fixture::new();
        fixture.addon = gates_with(
            GateContext::AddOnManager,
            FEATURE_ADDON_MANAGEMENT,
            FeatureGateMode::Disable,
        );

        assert_eq!(fixture.required_count(), 40);
    }

    #[test]
    fn test_reenabling_restores_identical_set() {
        let baseline = Fixture::new().required_ids();

        // a disable followed by an enable resolves to the baseline exactly;
        // the resolver has no memory of the intermediate state
        let mut toggled = Fixture::new();
        toggled.work = gates_with(
            GateContext::Work,
            FEATURE_MANIFESTWORK_REPLICA_SET,
            FeatureGateMode::Disable,
        );
        assert_ne!(toggled.required_ids(), baseline);

        toggled.work = gates_with(
            GateContext::Work,
            FEATURE_MANIFESTWORK_REPLICA_SET,
            FeatureGateMode::Enable,
        );
        assert_eq!(toggled.required_ids(), baseline);
    }

    #[test]
    fn test_resolution_is_deterministic() {
        let fixture = Fixture::new();
        assert_eq!(fixture.required_ids(), fixture.required_ids());
    }

    #[test]
    fn test_work_driver_mirror_requires_gate_and_source_data() {
        let mut fixture = Fixture::new();
        fixture.cluster_manager.spec.work_configuration = Some(WorkConfiguration {
            work_driver: Some("grpc".to_string()),
            feature_gates: Vec::new(),
        });

        // driver set but gate disabled: no mirror
        assert_eq!(fixture.required_count(), 45);

        fixture.work = gates_with(
            GateContext::Work,
            FEATURE_CLOUD_EVENTS_DRIVERS,
            FeatureGateMode::Enable,
        );
        // gate on but no source secret yet: still no mirror
        assert_eq!(fixture.required_count(), 45);

        let mut data = BTreeMap::new();
        data.insert("config.yaml".to_string(), ByteString(b"url: x".to_vec()));
        fixture.driver_data = Some(data);
        assert_eq!(fixture.required_count(), 46);

        let descriptors = fixture.resolve();
        let mirror = descriptors
            .iter()
            .find(|d| d.required && d.resource.id().name == "work-driver-config")
            .unwrap();
        assert_eq!(
            mirror.resource.id().namespace,
            "open-cluster-management-hub"
        );
    }

    #[test]
    fn test_related_resource_records_have_gvr_coordinates() {
        for descriptor in Fixture::new().resolve() {
            if !descriptor.required {
                continue;
            }
            let related = descriptor.resource.related_resource();
            assert!(!related.version.is_empty());
            assert!(!related.resource.is_empty());
            assert!(!related.name.is_empty());
        }
    }

    #[test]
    fn test_only_deployments_track_generations() {
        let tracked: Vec<_> = Fixture::new()
            .resolve()
            .into_iter()
            .filter(|d| d.resource.tracks_generation())
            .map(|d| d.resource.id().to_string())
            .collect();

        assert_eq!(tracked.len(), 6);
        assert!(tracked.iter().all(|id| id.starts_with("deployments/")));
    }
}
