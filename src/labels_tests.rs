// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for `labels.rs`

#[cfg(test)]
mod tests {
    use crate::labels::{is_reserved_key, merge, propagated, to_arg_value};
    use std::collections::BTreeMap;

    fn user_labels(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect()
    }

    #[test]
    fn test_reserved_keys() {
        assert!(is_reserved_key("app"));
        assert!(is_reserved_key("createdByClusterManager"));
        assert!(is_reserved_key("open-cluster-management.io/cluster-name"));
        assert!(!is_reserved_key("team"));
        assert!(!is_reserved_key("open-cluster-management"));
    }

    #[test]
    fn test_merge_forces_reserved_values() {
        let labels = user_labels(&[
            ("app", "clustermanager"),
            ("createdByClusterManager", "hub"),
            ("test-label", "test-value"),
        ]);

        let merged = merge("cluster-manager-registration-controller", "cluster-manager", &labels);

        assert_eq!(
            merged.get("app").map(String::as_str),
            Some("cluster-manager-registration-controller")
        );
        assert_eq!(
            merged.get("createdByClusterManager").map(String::as_str),
            Some("cluster-manager")
        );
        assert_eq!(merged.get("test-label").map(String::as_str), Some("test-value"));
    }

    #[test]
    fn test_merge_drops_prefixed_keys() {
        let labels = user_labels(&[
            ("open-cluster-management.io/cluster-name", "test"),
            ("test-label", "test-value"),
        ]);

        let merged = merge("deploy", "cluster-manager", &labels);

        assert!(!merged.contains_key("open-cluster-management.io/cluster-name"));
        assert!(merged.contains_key("test-label"));
    }

    #[test]
    fn test_propagated_excludes_only_reserved() {
        let labels = user_labels(&[
            ("app", "override-attempt"),
            ("test-label", "test-value"),
            ("test-label2", "test-value2"),
        ]);

        let filtered = propagated(&labels);

        assert_eq!(filtered.len(), 2);
        assert!(!filtered.contains_key("app"));
    }

    #[test]
    fn test_arg_value_sorted_csv() {
        let labels = user_labels(&[
            ("test-label2", "test-value2"),
            ("test-label", "test-value"),
            ("app", "ignored"),
        ]);

        assert_eq!(
            to_arg_value(&labels).as_deref(),
            Some("test-label=test-value,test-label2=test-value2")
        );
    }

    #[test]
    fn test_arg_value_empty_when_nothing_propagates() {
        assert_eq!(to_arg_value(&BTreeMap::new()), None);

        let only_reserved = user_labels(&[("app", "x"), ("createdByClusterManager", "y")]);
        assert_eq!(to_arg_value(&only_reserved), None);
    }

    #[test]
    fn test_arg_value_agrees_with_merged_set() {
        let labels = user_labels(&[("team", "sre"), ("env", "prod")]);

        let merged = merge("deploy", "cm", &labels);
        let arg = to_arg_value(&labels).unwrap();

        for pair in arg.split(',') {
            let (key, value) = pair.split_once('=').unwrap();
            assert_eq!(merged.get(key).map(String::as_str), Some(value));
        }
    }
}
