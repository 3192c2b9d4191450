// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for `status.rs`

#[cfg(test)]
mod tests {
    use super::super::{
        conditions_equal, create_condition, find_condition, set_condition, status_changed,
    };
    use crate::crd::ClusterManagerStatus;

    #[test]
    fn test_create_condition_basic() {
        let condition = create_condition("Applied", "True", "ClusterManagerApplied", "all applied");

        assert_eq!(condition.r#type, "Applied");
        assert_eq!(condition.status, "True");
        assert_eq!(condition.reason.as_deref(), Some("ClusterManagerApplied"));
        assert_eq!(condition.message.as_deref(), Some("all applied"));
        assert!(condition.last_transition_time.is_some());
    }

    #[test]
    fn test_find_condition() {
        let conditions = vec![
            create_condition("Applied", "True", "A", "a"),
            create_condition("Progressing", "False", "B", "b"),
        ];

        assert!(find_condition(&conditions, "Progressing").is_some());
        assert!(find_condition(&conditions, "Degraded").is_none());
    }

    #[test]
    fn test_set_condition_preserves_transition_time_when_status_same() {
        let mut conditions = Vec::new();
        let mut first = create_condition("Applied", "True", "A", "first");
        first.last_transition_time = Some("2026-01-01T00:00:00Z".to_string());
        set_condition(&mut conditions, first);

        set_condition(
            &mut conditions,
            create_condition("Applied", "True", "A", "second message"),
        );

        assert_eq!(conditions.len(), 1);
        assert_eq!(conditions[0].message.as_deref(), Some("second message"));
        assert_eq!(
            conditions[0].last_transition_time.as_deref(),
            Some("2026-01-01T00:00:00Z")
        );
    }

    #[test]
    fn test_set_condition_moves_transition_time_on_flip() {
        let mut conditions = Vec::new();
        let mut first = create_condition("Applied", "False", "Failed", "boom");
        first.last_transition_time = Some("2026-01-01T00:00:00Z".to_string());
        set_condition(&mut conditions, first);

        set_condition(
            &mut conditions,
            create_condition("Applied", "True", "Applied", "ok"),
        );

        assert_eq!(conditions.len(), 1);
        assert_ne!(
            conditions[0].last_transition_time.as_deref(),
            Some("2026-01-01T00:00:00Z")
        );
    }

    #[test]
    fn test_conditions_equal_ignores_timestamps() {
        let mut a = create_condition("Applied", "True", "A", "same");
        let mut b = create_condition("Applied", "True", "A", "same");
        a.last_transition_time = Some("2026-01-01T00:00:00Z".to_string());
        b.last_transition_time = Some("2026-06-30T00:00:00Z".to_string());

        assert!(conditions_equal(&[a.clone()], &[b.clone()]));

        b.status = "False".to_string();
        assert!(!conditions_equal(&[a], &[b]));
    }

    #[test]
    fn test_status_changed() {
        let mut current = ClusterManagerStatus {
            observed_generation: Some(2),
            conditions: vec![create_condition("Applied", "True", "A", "a")],
            ..Default::default()
        };

        let mut new_status = current.clone();
        new_status.conditions[0].last_transition_time = Some("1999-01-01T00:00:00Z".to_string());
        assert!(!status_changed(Some(&current), &new_status));

        new_status.observed_generation = Some(3);
        assert!(status_changed(Some(&current), &new_status));

        assert!(status_changed(None, &current));

        current.related_resources.clear();
        let mut with_related = current.clone();
        with_related.related_resources.push(crate::crd::RelatedResource {
            group: "apps".to_string(),
            version: "v1".to_string(),
            resource: "deployments".to_string(),
            namespace: "ns".to_string(),
            name: "deploy".to_string(),
        });
        assert!(status_changed(Some(&current), &with_related));
    }
}
