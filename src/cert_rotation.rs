// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Time-driven certificate rotation for the webhook serving stack.
//!
//! Two nested cycles share one invariant: no consumer ever observes an
//! expired certificate, and no serving certificate is presented whose
//! issuing CA is absent from the trust bundle.
//!
//! - **Signer cycle**: load or create the signing CA in `signer-secret`;
//!   rotate it in place when it nears expiry. A superseded CA stays in the
//!   bundle until no live serving certificate references it.
//! - **Serving cycle**: after the signer and bundle are settled, reissue
//!   each endpoint's leaf certificate when it is absent, expired, nearing
//!   expiry or signed by a CA that is no longer current. Key and cert are
//!   written together in one secret update.
//!
//! Ticks are idempotent: invoking the controller far more often than
//! rotation is due produces no writes, and missed ticks are caught up on
//! the next one. A failing tick leaves existing valid material untouched.

use crate::certs::{
    cert_info, generate_signing_cert, issue_serving_cert, merge_trust_bundle, CertKeyPair,
};
use crate::constants::{
    CA_BUNDLE_CONFIGMAP, CA_BUNDLE_KEY, REGISTRATION_WEBHOOK_SERVING_CERT, SIGNER_NAME_PREFIX,
    SIGNER_SECRET, TLS_CERT_KEY, TLS_PRIVATE_KEY_KEY, WORK_WEBHOOK_SERVING_CERT,
};
use crate::hub_resources::{HubNames, HubResource, ResourceId};
use crate::metrics;
use crate::reconcilers::ClusterState;
use anyhow::{Context as _, Result};
use k8s_openapi::api::core::v1::{ConfigMap, Secret};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use k8s_openapi::ByteString;
use std::collections::BTreeMap;
use time::OffsetDateTime;
use tracing::{info, warn};

/// Explicit rotation tunables.
///
/// Passed into the constructor so independent instances (and tests with
/// shortened windows) never interfere through shared process state.
#[derive(Clone, Copy, Debug)]
pub struct CertRotationConfig {
    /// How often the rotation loop ticks.
    pub resync_interval: std::time::Duration,
    /// Validity window of the signing CA.
    pub signing_validity: std::time::Duration,
    /// Validity window of serving certificates; effectively clamped to the
    /// signer's remaining validity at issuance.
    pub target_validity: std::time::Duration,
}

impl Default for CertRotationConfig {
    fn default() -> Self {
        CertRotationConfig {
            resync_interval: std::time::Duration::from_secs(600),
            signing_validity: std::time::Duration::from_secs(365 * 24 * 3600),
            target_validity: std::time::Duration::from_secs(30 * 24 * 3600),
        }
    }
}

/// One webhook endpoint whose serving certificate is managed.
#[derive(Clone, Debug)]
pub struct ServingEndpoint {
    /// Secret the leaf certificate and key are stored in.
    pub secret_name: String,
    /// DNS names the certificate must cover.
    pub hosts: Vec<String>,
}

/// What one tick actually did.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RotationSummary {
    /// The signing CA was created or rotated.
    pub signer_rotated: bool,
    /// Number of serving certificates reissued.
    pub serving_rotated: usize,
    /// The trust bundle configmap was republished.
    pub bundle_republished: bool,
}

impl RotationSummary {
    fn is_noop(&self) -> bool {
        !self.signer_rotated && self.serving_rotated == 0 && !self.bundle_republished
    }
}

/// The rotation controller. Runs on its own timer, decoupled from spec
/// reconciliation.
pub struct CertRotationController<S> {
    state: S,
    names: HubNames,
    config: CertRotationConfig,
    endpoints: Vec<ServingEndpoint>,
}

impl<S: ClusterState> CertRotationController<S> {
    /// Build a controller for the standard webhook endpoints of a hub.
    #[must_use]
    pub fn new(state: S, names: HubNames, config: CertRotationConfig) -> Self {
        let service_hosts = |service: String| {
            vec![
                format!("{service}.{}.svc", names.namespace),
                format!("{service}.{}.svc.cluster.local", names.namespace),
            ]
        };
        let endpoints = vec![
            ServingEndpoint {
                secret_name: REGISTRATION_WEBHOOK_SERVING_CERT.to_string(),
                hosts: service_hosts(names.registration_webhook()),
            },
            ServingEndpoint {
                secret_name: WORK_WEBHOOK_SERVING_CERT.to_string(),
                hosts: service_hosts(names.work_webhook()),
            },
        ];
        CertRotationController {
            state,
            names,
            config,
            endpoints,
        }
    }

    /// Run the rotation loop until the process shuts down.
    ///
    /// Missed ticks are delayed, not burst: catching up means running one
    /// tick late, which the idempotent tick handles like any other.
    pub async fn run(&self) {
        let mut interval = tokio::time::interval(self.config.resync_interval);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            interval.tick().await;
            match self.tick(OffsetDateTime::now_utc()).await {
                Ok(summary) if summary.is_noop() => metrics::record_cert_rotation("noop"),
                Ok(summary) => {
                    info!(
                        signer_rotated = summary.signer_rotated,
                        serving_rotated = summary.serving_rotated,
                        bundle_republished = summary.bundle_republished,
                        "Certificate rotation tick completed"
                    );
                    metrics::record_cert_rotation("rotated");
                }
                Err(error) => {
                    // existing valid material stays in place; retry next tick
                    warn!(%error, "Certificate rotation tick failed");
                    metrics::record_cert_rotation("error");
                }
            }
        }
    }

    /// Run one rotation tick at `now`.
    ///
    /// Ordering is load-bearing: the signer cycle fully completes, including
    /// the bundle update, before any serving certificate is reissued against
    /// the new signer.
    pub async fn tick(&self, now: OffsetDateTime) -> Result<RotationSummary> {
        let mut summary = RotationSummary::default();
        let now_ts = now.unix_timestamp();

        // Signer cycle. An undecodable signer counts as due for rotation.
        let current_signer_usable = |signer: &CertKeyPair| {
            cert_info(&signer.cert_pem)
                .map(|info| !info.needs_rotation(now_ts))
                .unwrap_or(false)
        };
        let signer = match self.load_signer().await? {
            Some(signer) if current_signer_usable(&signer) => signer,
            previous => {
                let signer = generate_signing_cert(
                    SIGNER_NAME_PREFIX,
                    self.config.signing_validity,
                    now,
                )?;
                self.write_secret(
                    SIGNER_SECRET,
                    &[
                        (TLS_CERT_KEY, signer.cert_pem.as_bytes()),
                        (TLS_PRIVATE_KEY_KEY, signer.key_pem.as_bytes()),
                    ],
                )
                .await
                .context("writing signer secret")?;
                info!(
                    created = previous.is_none(),
                    "Signing certificate rotated"
                );
                summary.signer_rotated = true;
                signer
            }
        };
        let signer_cn = cert_info(&signer.cert_pem)?.subject_cn;

        // Bundle maintenance: retain prior CAs that still vouch for a live
        // serving certificate, drop everything expired, publish on change.
        let mut live_issuers = Vec::new();
        for endpoint in &self.endpoints {
            if let Some(info) = self.serving_cert_info(endpoint).await? {
                if info.is_valid_at(now_ts) {
                    live_issuers.push(info.issuer_cn);
                }
            }
        }

        let existing_bundle = self.read_bundle().await?;
        let (bundle, changed) =
            merge_trust_bundle(&existing_bundle, &signer.cert_pem, &live_issuers, now_ts)?;
        if changed {
            self.write_bundle(&bundle).await.context("writing CA bundle")?;
            summary.bundle_republished = true;
        }

        // Serving cycle
        for endpoint in &self.endpoints {
            let reissue = match self.serving_cert_info(endpoint).await? {
                None => true,
                Some(info) => info.needs_rotation(now_ts) || info.issuer_cn != signer_cn,
            };
            if !reissue {
                continue;
            }

            let leaf =
                issue_serving_cert(&signer, &endpoint.hosts, self.config.target_validity, now)?;
            self.write_secret(
                &endpoint.secret_name,
                &[
                    (TLS_CERT_KEY, leaf.cert_pem.as_bytes()),
                    (TLS_PRIVATE_KEY_KEY, leaf.key_pem.as_bytes()),
                ],
            )
            .await
            .with_context(|| format!("writing serving cert {}", endpoint.secret_name))?;
            info!(secret = %endpoint.secret_name, "Serving certificate reissued");
            summary.serving_rotated += 1;
        }

        Ok(summary)
    }

    async fn load_signer(&self) -> Result<Option<CertKeyPair>> {
        let Some(data) = self
            .state
            .secret_data(&self.names.namespace, SIGNER_SECRET)
            .await?
        else {
            return Ok(None);
        };
        Ok(key_pair_from_data(&data))
    }

    async fn serving_cert_info(
        &self,
        endpoint: &ServingEndpoint,
    ) -> Result<Option<crate::certs::CertInfo>> {
        let Some(data) = self
            .state
            .secret_data(&self.names.namespace, &endpoint.secret_name)
            .await?
        else {
            return Ok(None);
        };
        let Some(pair) = key_pair_from_data(&data) else {
            return Ok(None);
        };
        // an undecodable certificate is treated as absent and reissued
        Ok(cert_info(&pair.cert_pem).ok())
    }

    async fn read_bundle(&self) -> Result<String> {
        let id = ResourceId {
            group: String::new(),
            resource: "configmaps".to_string(),
            namespace: self.names.namespace.clone(),
            name: CA_BUNDLE_CONFIGMAP.to_string(),
        };
        let Some(live) = self.state.get(&id).await? else {
            return Ok(String::new());
        };
        Ok(live
            .content
            .get("data")
            .and_then(|data| data.get(CA_BUNDLE_KEY))
            .and_then(serde_json::Value::as_str)
            .unwrap_or_default()
            .to_string())
    }

    async fn write_bundle(&self, bundle: &str) -> Result<()> {
        let id = ResourceId {
            group: String::new(),
            resource: "configmaps".to_string(),
            namespace: self.names.namespace.clone(),
            name: CA_BUNDLE_CONFIGMAP.to_string(),
        };
        let mut configmap: ConfigMap = match self.state.get(&id).await? {
            Some(live) => serde_json::from_value(live.content)?,
            None => ConfigMap {
                metadata: ObjectMeta {
                    name: Some(CA_BUNDLE_CONFIGMAP.to_string()),
                    namespace: Some(self.names.namespace.clone()),
                    ..Default::default()
                },
                ..Default::default()
            },
        };
        configmap
            .data
            .get_or_insert_with(BTreeMap::new)
            .insert(CA_BUNDLE_KEY.to_string(), bundle.to_string());
        self.state.apply(&HubResource::ConfigMap(configmap)).await?;
        Ok(())
    }

    async fn write_secret(&self, name: &str, entries: &[(&str, &[u8])]) -> Result<()> {
        let id = ResourceId {
            group: String::new(),
            resource: "secrets".to_string(),
            namespace: self.names.namespace.clone(),
            name: name.to_string(),
        };
        let mut secret: Secret = match self.state.get(&id).await? {
            Some(live) => serde_json::from_value(live.content)?,
            None => Secret {
                metadata: ObjectMeta {
                    name: Some(name.to_string()),
                    namespace: Some(self.names.namespace.clone()),
                    ..Default::default()
                },
                ..Default::default()
            },
        };
        let data = secret.data.get_or_insert_with(BTreeMap::new);
        for (key, value) in entries {
            data.insert((*key).to_string(), ByteString(value.to_vec()));
        }
        self.state.apply(&HubResource::Secret(secret)).await?;
        Ok(())
    }
}

fn key_pair_from_data(data: &BTreeMap<String, ByteString>) -> Option<CertKeyPair> {
    let cert = data.get(TLS_CERT_KEY)?;
    let key = data.get(TLS_PRIVATE_KEY_KEY)?;
    if cert.0.is_empty() || key.0.is_empty() {
        return None;
    }
    Some(CertKeyPair {
        cert_pem: String::from_utf8(cert.0.clone()).ok()?,
        key_pem: String::from_utf8(key.0.clone()).ok()?,
    })
}

#[cfg(test)]
#[path = "cert_rotation_tests.rs"]
mod cert_rotation_tests;
