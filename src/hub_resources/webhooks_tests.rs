// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for the webhook builders.

#[cfg(test)]
mod tests {
    use crate::hub_resources::{webhooks, HubNames};
    use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;
    use std::collections::BTreeMap;

    fn names() -> HubNames {
        HubNames::new("cluster-manager")
    }

    #[test]
    fn test_webhook_service_fronts_deployment() {
        let service = webhooks::webhook_service(
            &names(),
            "cluster-manager-registration-webhook",
            &BTreeMap::new(),
        );

        assert_eq!(
            service.metadata.name.as_deref(),
            Some("cluster-manager-registration-webhook")
        );
        let spec = service.spec.as_ref().unwrap();
        assert_eq!(
            spec.selector.as_ref().unwrap().get("app").map(String::as_str),
            Some("cluster-manager-registration-webhook")
        );
        let port = &spec.ports.as_ref().unwrap()[0];
        assert_eq!(port.port, 443);
        assert_eq!(port.target_port, Some(IntOrString::Int(9443)));
    }

    #[test]
    fn test_cluster_validating_webhook_wiring() {
        let config = webhooks::cluster_validating_webhook(&names(), &BTreeMap::new());

        assert_eq!(
            config.metadata.name.as_deref(),
            Some("managedclustervalidators.admission.cluster.open-cluster-management.io")
        );
        let webhook = &config.webhooks.as_ref().unwrap()[0];
        let service = webhook.client_config.service.as_ref().unwrap();
        assert_eq!(service.name, "cluster-manager-registration-webhook");
        assert_eq!(service.namespace, "open-cluster-management-hub");
        assert_eq!(service.path.as_deref(), Some("/validate-managedcluster"));

        let rule = &webhook.rules.as_ref().unwrap()[0];
        assert_eq!(
            rule.api_groups.as_ref().unwrap()[0],
            "cluster.open-cluster-management.io"
        );
        assert_eq!(rule.resources.as_ref().unwrap()[0], "managedclusters");
    }

    #[test]
    fn test_work_validating_webhook_targets_work_service() {
        let config = webhooks::work_validating_webhook(&names(), &BTreeMap::new());

        let webhook = &config.webhooks.as_ref().unwrap()[0];
        let service = webhook.client_config.service.as_ref().unwrap();
        assert_eq!(service.name, "cluster-manager-work-webhook");
        assert_eq!(service.path.as_deref(), Some("/validate-manifestwork"));

        let rule = &webhook.rules.as_ref().unwrap()[0];
        assert_eq!(rule.resources.as_ref().unwrap()[0], "manifestworks");
    }

    #[test]
    fn test_mutating_webhook_pairs_with_validating() {
        let config = webhooks::cluster_mutating_webhook(&names(), &BTreeMap::new());

        assert_eq!(
            config.metadata.name.as_deref(),
            Some("managedclustermutators.admission.cluster.open-cluster-management.io")
        );
        let webhook = &config.webhooks.as_ref().unwrap()[0];
        assert_eq!(webhook.side_effects, "None");
        assert_eq!(webhook.admission_review_versions, vec!["v1".to_string()]);
    }
}
