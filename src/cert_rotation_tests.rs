// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for `cert_rotation.rs`
//!
//! Shortened validity windows make rotations observable without waiting;
//! the ticks drive an in-memory cluster state.

#[cfg(test)]
mod tests {
    use super::super::{CertRotationConfig, CertRotationController, RotationSummary};
    use crate::certs::{bundle_certs, cert_info};
    use crate::constants::{
        CA_BUNDLE_CONFIGMAP, CA_BUNDLE_KEY, HUB_NAMESPACE, REGISTRATION_WEBHOOK_SERVING_CERT,
        SIGNER_SECRET, TLS_CERT_KEY, TLS_PRIVATE_KEY_KEY, WORK_WEBHOOK_SERVING_CERT,
    };
    use crate::hub_resources::HubNames;
    use crate::reconcilers::tests::{core_id, FakeCluster};
    use crate::reconcilers::ClusterState;
    use std::time::Duration;
    use time::OffsetDateTime;

    const T0: i64 = 1_700_000_000;

    fn at(seconds: i64) -> OffsetDateTime {
        OffsetDateTime::from_unix_timestamp(T0 + seconds).unwrap()
    }

    fn controller(
        fake: std::sync::Arc<FakeCluster>,
        signing_secs: u64,
        target_secs: u64,
    ) -> CertRotationController<std::sync::Arc<FakeCluster>> {
        CertRotationController::new(
            fake,
            HubNames::new("cluster-manager"),
            CertRotationConfig {
                resync_interval: Duration::from_secs(1),
                signing_validity: Duration::from_secs(signing_secs),
                target_validity: Duration::from_secs(target_secs),
            },
        )
    }

    async fn secret_cert(fake: &FakeCluster, name: &str) -> String {
        let data = fake
            .secret_data(HUB_NAMESPACE, name)
            .await
            .unwrap()
            .unwrap();
        String::from_utf8(data.get(TLS_CERT_KEY).unwrap().0.clone()).unwrap()
    }

    async fn bundle(fake: &FakeCluster) -> String {
        let content = fake
            .content(&core_id("configmaps", HUB_NAMESPACE, CA_BUNDLE_CONFIGMAP))
            .unwrap();
        content["data"][CA_BUNDLE_KEY].as_str().unwrap().to_string()
    }

    #[tokio::test]
    async fn test_first_tick_provisions_everything() {
        let fake = std::sync::Arc::new(FakeCluster::new());
        let controller = controller(fake.clone(), 1000, 100);

        let summary = controller.tick(at(0)).await.unwrap();

        assert!(summary.signer_rotated);
        assert_eq!(summary.serving_rotated, 2);
        assert!(summary.bundle_republished);

        for name in [
            SIGNER_SECRET,
            REGISTRATION_WEBHOOK_SERVING_CERT,
            WORK_WEBHOOK_SERVING_CERT,
        ] {
            let data = fake.secret_data(HUB_NAMESPACE, name).await.unwrap().unwrap();
            assert!(data.contains_key(TLS_CERT_KEY), "{name} missing tls.crt");
            assert!(data.contains_key(TLS_PRIVATE_KEY_KEY), "{name} missing tls.key");
        }
        assert!(!bundle(&fake).await.is_empty());
    }

    #[tokio::test]
    async fn test_second_tick_is_a_noop() {
        let fake = std::sync::Arc::new(FakeCluster::new());
        let controller = controller(fake.clone(), 1000, 100);

        controller.tick(at(0)).await.unwrap();
        let summary = controller.tick(at(1)).await.unwrap();

        assert_eq!(summary, RotationSummary::default());
    }

    #[tokio::test]
    async fn test_serving_cert_renewed_before_expiry() {
        let fake = std::sync::Arc::new(FakeCluster::new());
        let controller = controller(fake.clone(), 10_000, 100);

        controller.tick(at(0)).await.unwrap();
        let first = secret_cert(&fake, REGISTRATION_WEBHOOK_SERVING_CERT).await;

        // inside the renewal threshold (less than a fifth remaining)
        let summary = controller.tick(at(85)).await.unwrap();
        assert!(!summary.signer_rotated);
        assert_eq!(summary.serving_rotated, 2);

        let second = secret_cert(&fake, REGISTRATION_WEBHOOK_SERVING_CERT).await;
        assert_ne!(first, second);
        let info = cert_info(&second).unwrap();
        assert!(info.is_valid_at(T0 + 85));
    }

    #[tokio::test]
    async fn test_signer_rotation_keeps_prior_ca_until_unreferenced() {
        let fake = std::sync::Arc::new(FakeCluster::new());
        // serving certs outlive the signer renewal point
        let controller = controller(fake.clone(), 100, 90);

        controller.tick(at(0)).await.unwrap();
        let old_signer_cn = cert_info(&secret_cert(&fake, SIGNER_SECRET).await)
            .unwrap()
            .subject_cn;

        // signer within threshold at t=85; serving certs still live
        let summary = controller.tick(at(85)).await.unwrap();
        assert!(summary.signer_rotated);
        let new_signer_cn = cert_info(&secret_cert(&fake, SIGNER_SECRET).await)
            .unwrap()
            .subject_cn;
        assert_ne!(old_signer_cn, new_signer_cn);

        // overlap: both CAs in the bundle while old-signed certs were live
        // at the instant the bundle was computed
        let cns: Vec<String> = bundle_certs(&bundle(&fake).await)
            .into_iter()
            .map(|(_, info)| info.subject_cn)
            .collect();
        assert!(cns.contains(&old_signer_cn));
        assert!(cns.contains(&new_signer_cn));

        // servings were reissued against the new signer in the same tick
        assert_eq!(summary.serving_rotated, 2);
        let info = cert_info(&secret_cert(&fake, WORK_WEBHOOK_SERVING_CERT).await).unwrap();
        assert_eq!(info.issuer_cn, new_signer_cn);

        // next tick: nothing references the old CA anymore, it is pruned
        let summary = controller.tick(at(86)).await.unwrap();
        assert!(summary.bundle_republished);
        let cns: Vec<String> = bundle_certs(&bundle(&fake).await)
            .into_iter()
            .map(|(_, info)| info.subject_cn)
            .collect();
        assert_eq!(cns, vec![new_signer_cn]);
    }

    #[tokio::test]
    async fn test_validity_invariants_hold_across_rotations() {
        let fake = std::sync::Arc::new(FakeCluster::new());
        let controller = controller(fake.clone(), 50, 20);

        // a window long enough to force several signer and serving rotations
        for step in 0..40 {
            let now = step * 5;
            controller.tick(at(now)).await.unwrap();

            let bundle_infos: Vec<_> = bundle_certs(&bundle(&fake).await)
                .into_iter()
                .map(|(_, info)| info)
                .collect();

            for name in [
                SIGNER_SECRET,
                REGISTRATION_WEBHOOK_SERVING_CERT,
                WORK_WEBHOOK_SERVING_CERT,
            ] {
                let info = cert_info(&secret_cert(&fake, name).await).unwrap();
                assert!(
                    info.is_valid_at(T0 + now),
                    "{name} invalid at t+{now}: {info:?}"
                );

                if name == SIGNER_SECRET {
                    continue;
                }
                // every serving cert's issuer is in the bundle and valid
                let issuer = bundle_infos
                    .iter()
                    .find(|ca| ca.subject_cn == info.issuer_cn)
                    .unwrap_or_else(|| panic!("{name} issuer missing from bundle at t+{now}"));
                assert!(issuer.is_valid_at(T0 + now));
            }
        }
    }

    #[tokio::test]
    async fn test_rotation_preserves_placeholder_labels() {
        let fake = std::sync::Arc::new(FakeCluster::new());

        // the apply reconciler created the placeholder with labels
        fake.seed(
            core_id("secrets", HUB_NAMESPACE, SIGNER_SECRET),
            serde_json::json!({
                "apiVersion": "v1",
                "kind": "Secret",
                "metadata": {
                    "name": SIGNER_SECRET,
                    "namespace": HUB_NAMESPACE,
                    "labels": {"app": SIGNER_SECRET, "createdByClusterManager": "cluster-manager"},
                },
            }),
        );

        let controller = controller(fake.clone(), 1000, 100);
        controller.tick(at(0)).await.unwrap();

        let content = fake
            .content(&core_id("secrets", HUB_NAMESPACE, SIGNER_SECRET))
            .unwrap();
        assert_eq!(content["metadata"]["labels"]["app"], SIGNER_SECRET);
        assert!(content["data"][TLS_CERT_KEY].is_string());
    }
}
