// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for `feature_gates.rs`

#[cfg(test)]
mod tests {
    use crate::crd::{FeatureGate, FeatureGateMode};
    use crate::feature_gates::{
        feature_gate_args, is_enabled, validate, GateContext, FEATURE_ADDON_MANAGEMENT,
        FEATURE_CLOUD_EVENTS_DRIVERS, FEATURE_DEFAULT_CLUSTER_SET,
        FEATURE_MANIFESTWORK_REPLICA_SET, FEATURE_NIL_EXECUTOR_VALIDATING,
    };

    fn gate(feature: &str, mode: FeatureGateMode) -> FeatureGate {
        FeatureGate {
            feature: feature.to_string(),
            mode,
        }
    }

    #[test]
    fn test_empty_request_uses_operator_defaults() {
        let (effective, invalid) = validate(&[], GateContext::Work);

        assert!(invalid.is_empty());
        assert!(is_enabled(&effective, FEATURE_MANIFESTWORK_REPLICA_SET));
        assert!(is_enabled(&effective, FEATURE_NIL_EXECUTOR_VALIDATING));
        assert!(!is_enabled(&effective, FEATURE_CLOUD_EVENTS_DRIVERS));
    }

    #[test]
    fn test_request_overrides_default() {
        let (effective, invalid) = validate(
            &[gate(FEATURE_MANIFESTWORK_REPLICA_SET, FeatureGateMode::Disable)],
            GateContext::Work,
        );

        assert!(invalid.is_empty());
        assert!(!is_enabled(&effective, FEATURE_MANIFESTWORK_REPLICA_SET));
    }

    #[test]
    fn test_duplicate_entries_last_wins() {
        let (effective, _) = validate(
            &[
                gate(FEATURE_CLOUD_EVENTS_DRIVERS, FeatureGateMode::Enable),
                gate(FEATURE_CLOUD_EVENTS_DRIVERS, FeatureGateMode::Disable),
            ],
            GateContext::Work,
        );

        assert!(!is_enabled(&effective, FEATURE_CLOUD_EVENTS_DRIVERS));
    }

    #[test]
    fn test_unknown_names_are_invalid_not_dropped() {
        let (effective, invalid) = validate(
            &[
                gate("NoSuchFeature", FeatureGateMode::Enable),
                gate(FEATURE_NIL_EXECUTOR_VALIDATING, FeatureGateMode::Disable),
                gate("NoSuchFeature", FeatureGateMode::Disable),
            ],
            GateContext::Work,
        );

        assert_eq!(invalid, vec!["NoSuchFeature".to_string()]);
        assert!(!effective.contains_key("NoSuchFeature"));
        // valid portion still applied
        assert!(!is_enabled(&effective, FEATURE_NIL_EXECUTOR_VALIDATING));
    }

    #[test]
    fn test_gate_from_wrong_context_is_invalid() {
        let (_, invalid) = validate(
            &[gate(FEATURE_ADDON_MANAGEMENT, FeatureGateMode::Enable)],
            GateContext::Work,
        );

        assert_eq!(invalid, vec![FEATURE_ADDON_MANAGEMENT.to_string()]);
    }

    #[test]
    fn test_applying_mode_twice_equals_final_mode() {
        // enable then disable == disable directly
        let (twice, _) = validate(
            &[
                gate(FEATURE_MANIFESTWORK_REPLICA_SET, FeatureGateMode::Enable),
                gate(FEATURE_MANIFESTWORK_REPLICA_SET, FeatureGateMode::Disable),
            ],
            GateContext::Work,
        );
        let (direct, _) = validate(
            &[gate(FEATURE_MANIFESTWORK_REPLICA_SET, FeatureGateMode::Disable)],
            GateContext::Work,
        );

        assert_eq!(twice, direct);
    }

    #[test]
    fn test_args_skip_component_defaults() {
        // DefaultClusterSet is on in both the operator and the component, so
        // no argument should be rendered for it at defaults.
        let (effective, _) = validate(&[], GateContext::Registration);
        let args = feature_gate_args(&effective, GateContext::Registration);

        assert!(!args
            .iter()
            .any(|arg| arg.contains(FEATURE_DEFAULT_CLUSTER_SET)));
    }

    #[test]
    fn test_args_render_operator_enabled_gates() {
        let (effective, _) = validate(&[], GateContext::Work);
        let args = feature_gate_args(&effective, GateContext::Work);

        assert!(args.contains(&"--feature-gates=ManifestWorkReplicaSet=true".to_string()));
        assert!(args.contains(&"--feature-gates=NilExecutorValidating=true".to_string()));
        assert!(!args
            .iter()
            .any(|arg| arg.contains(FEATURE_CLOUD_EVENTS_DRIVERS)));
    }

    #[test]
    fn test_args_render_explicit_disable_of_component_on_gate() {
        let (effective, _) = validate(
            &[gate(FEATURE_DEFAULT_CLUSTER_SET, FeatureGateMode::Disable)],
            GateContext::Registration,
        );
        let args = feature_gate_args(&effective, GateContext::Registration);

        assert!(args.contains(&"--feature-gates=DefaultClusterSet=false".to_string()));
    }
}
