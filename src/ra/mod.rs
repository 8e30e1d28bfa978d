//! The Registration Authority core (§4.6): order creation, validation
//! dispatch, and finalization. Collaborators (VA, CA signer, CT publisher)
//! are held as `Arc<dyn Trait>` and called in-process — there is no network
//! transport in this crate; a front-end that speaks ACME or a gRPC shim
//! sits above it and a VA/CA/CT implementation sits below.

pub mod csr;

use crate::authz::AuthorizationAuthority;
use crate::config::Config;
use crate::crypto::{Base64Encoding, Sha256Hash};
use crate::error::{RaError, Result};
use crate::limiter::{LimitName, Limiter, RateLimitOutcome};
use crate::metrics::{AuditEvent, EventAuditor, SharedMetrics};
use crate::model::{
    reverse_dns_name, Authorization, AuthorizationStatus, Certificate, CertificateStatus, IssuedName, OcspStatus,
    Order, Precertificate, Registration, RevokedCertificate,
};
use crate::order_status::{compute_order_status, OrderStatus};
use crate::policy::PolicyAuthority;
use crate::storage::StorageAuthority;
use crate::types::{
    AuthorizationId, ChallengeType, Identifier, IdentifierType, OrderId, RegistrationId, RevocationReason, Sct, ValidationRecord,
};
use async_trait::async_trait;
use ipnet::Ipv6Net;
use jiff::{Span, Timestamp};
use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;

/// Bounded retry budget for finalization steps that run after a
/// precertificate already exists (§4.6 "Failure handling mid-pipeline"): a
/// dangling precertificate must not be abandoned on the first CT/CA hiccup.
const FINALIZE_MAX_ATTEMPTS: u32 = 5;
const FINALIZE_BASE_BACKOFF_MS: u64 = 200;

/// The Validation Authority collaborator: attempts one challenge against one
/// identifier from (ideally) several independent network perspectives.
#[async_trait]
pub trait Va: Send + Sync {
    async fn validate(&self, identifier: &Identifier, challenge_type: ChallengeType, token: &str) -> Result<Vec<ValidationRecord>>;
}

/// The CA signer collaborator: turns an approved CSR into a precertificate
/// and, later, a final certificate once SCTs are embedded.
#[async_trait]
pub trait CaSigner: Send + Sync {
    async fn issue_precertificate(&self, csr_der: &[u8], identifiers: &[Identifier]) -> Result<Precertificate>;
    async fn issue_final_certificate(&self, precert: &Precertificate, scts: &[Sct]) -> Result<Certificate>;
}

/// The CT log fan-out collaborator: submits a precertificate to a set of
/// logs and returns the SCTs collected so far.
#[async_trait]
pub trait CtPublisher: Send + Sync {
    async fn submit_precertificate(&self, precert: &Precertificate) -> Result<Vec<Sct>>;
}

pub struct RegistrationAuthority {
    storage: Arc<dyn StorageAuthority>,
    policy: PolicyAuthority,
    limiter: Arc<Limiter>,
    authz: AuthorizationAuthority,
    va: Arc<dyn Va>,
    ca: Arc<dyn CaSigner>,
    ct: Arc<dyn CtPublisher>,
    config: Config,
    metrics: SharedMetrics,
}

impl RegistrationAuthority {
    pub fn new(
        storage: Arc<dyn StorageAuthority>,
        policy: PolicyAuthority,
        limiter: Arc<Limiter>,
        va: Arc<dyn Va>,
        ca: Arc<dyn CaSigner>,
        ct: Arc<dyn CtPublisher>,
        config: Config,
        metrics: SharedMetrics,
    ) -> Self {
        let authz = AuthorizationAuthority::new(storage.clone(), limiter.clone(), config.features.clone());
        Self {
            storage,
            policy,
            limiter,
            authz,
            va,
            ca,
            ct,
            config,
            metrics,
        }
    }

    /// `NewOrder`: validates identifiers against policy, checks and spends
    /// rate limits, reuses still-valid authorizations where permitted, and
    /// creates pending authorizations for the rest.
    pub async fn new_order(
        &self,
        registration_id: RegistrationId,
        identifiers: Vec<Identifier>,
        profile_name: &str,
        replaces: Option<String>,
        now: Timestamp,
    ) -> Result<(Order, Vec<Authorization>)> {
        let profile = self.config.profile(profile_name)?;
        if identifiers.len() as u32 > profile.max_names {
            return Err(RaError::malformed(format!(
                "order names {} exceeds profile limit of {}",
                identifiers.len(),
                profile.max_names
            )));
        }

        self.policy.willing_to_issue(&identifiers)?;

        if let Some(source_serial) = &replaces {
            self.check_replacement(source_serial, now).await?;
        }

        // §4.6 step 4: a single transactional check-and-spend over the new
        // order itself plus, per identifier, its domain and the FQDN set as a
        // whole. Each group below unwinds every earlier group's spend before
        // returning a denial, so a rejected order never leaves a lingering
        // partial charge.
        let new_order_keys: Vec<String> = identifiers
            .iter()
            .map(|i| format!("{registration_id}:{}", i.value))
            .collect();
        if let RateLimitOutcome::Denied { retry_after } = self
            .limiter
            .batch_check_and_spend(LimitName::NewOrdersPerAccountPerDomain, &new_order_keys, now)
            .await?
        {
            return Err(self.rate_limit_denied("NewOrdersPerAccountPerDomain", &new_order_keys, retry_after));
        }

        let domain_keys: Vec<String> = identifiers
            .iter()
            .map(|i| match i.id_type {
                IdentifierType::Dns => i.base_domain().to_string(),
                IdentifierType::Ip => i.value.clone(),
            })
            .collect();
        if let RateLimitOutcome::Denied { retry_after } = self
            .limiter
            .batch_check_and_spend(LimitName::CertificatesPerDomain, &domain_keys, now)
            .await?
        {
            self.refund_all(LimitName::NewOrdersPerAccountPerDomain, &new_order_keys, now).await;
            return Err(self.rate_limit_denied("CertificatesPerDomain", &domain_keys, retry_after));
        }

        let fqdn_set_keys = vec![Sha256Hash::fqdn_set_hex(&identifiers.iter().map(|i| i.value.clone()).collect::<Vec<_>>())?];
        if let RateLimitOutcome::Denied { retry_after } = self
            .limiter
            .batch_check_and_spend(LimitName::CertificatesPerFqdnSet, &fqdn_set_keys, now)
            .await?
        {
            self.refund_all(LimitName::NewOrdersPerAccountPerDomain, &new_order_keys, now).await;
            self.refund_all(LimitName::CertificatesPerDomain, &domain_keys, now).await;
            return Err(self.rate_limit_denied("CertificatesPerFqdnSet", &fqdn_set_keys, retry_after));
        }

        let mut authzs = Vec::with_capacity(identifiers.len());
        for identifier in &identifiers {
            if self.storage.is_account_paused(registration_id, &identifier.value).await? {
                return Err(RaError::unauthorized(format!(
                    "account is paused for identifier {}",
                    identifier.value
                )));
            }

            if let Some(reused) = self.authz.find_reusable(registration_id, identifier, now).await? {
                authzs.push(reused);
                continue;
            }

            authzs.push(self.new_pending_authorization(registration_id, identifier.clone(), profile_name, now)?);
        }

        let order = Order {
            id: OrderId(0),
            registration_id,
            created_at: now,
            expires: now.checked_add(Span::new().seconds(profile.order_lifetime_secs as i64)).unwrap_or(now),
            identifiers,
            authorization_ids: vec![],
            profile_name: profile_name.to_string(),
            replaces,
            began_processing: false,
            certificate_serial: String::new(),
            error: None,
        };

        let (order, authzs) = match self.storage.new_order_and_authzs(order, authzs).await {
            Ok(v) => v,
            Err(e) => {
                self.refund_all(LimitName::NewOrdersPerAccountPerDomain, &new_order_keys, now).await;
                self.refund_all(LimitName::CertificatesPerDomain, &domain_keys, now).await;
                self.refund_all(LimitName::CertificatesPerFqdnSet, &fqdn_set_keys, now).await;
                return Err(e);
            }
        };

        self.metrics.orders_created_total.inc();
        EventAuditor::track_event(AuditEvent::OrderCreated {
            order_id: order.id.0,
            registration_id: registration_id.0,
            identifiers: order.identifiers.iter().map(|i| i.value.clone()).collect(),
        });

        Ok((order, authzs))
    }

    fn new_pending_authorization(&self, registration_id: RegistrationId, identifier: Identifier, profile_name: &str, now: Timestamp) -> Result<Authorization> {
        let profile = self.config.profile(profile_name)?;
        let offered_challenges = self.policy.challenge_types_for(&identifier);
        Ok(Authorization {
            id: AuthorizationId(0),
            registration_id,
            identifier,
            expires: now
                .checked_add(Span::new().seconds(profile.pending_authz_lifetime_secs as i64))
                .unwrap_or(now),
            status: AuthorizationStatus::Pending,
            profile_name: profile_name.to_string(),
            offered_challenges,
            token: Base64Encoding::encode(&rand::random::<[u8; 32]>()),
            attempt: None,
            validation_records: vec![],
        })
    }

    fn rate_limit_denied(&self, limit: &'static str, bucket_keys: &[String], retry_after: Duration) -> RaError {
        EventAuditor::track_event(AuditEvent::RateLimitDenied {
            limit: limit.to_string(),
            bucket_key: bucket_keys.join(","),
        });
        self.metrics.rate_limit_denials_total.with_label_values(&[limit]).inc();
        RaError::rate_limit(format!("rate limit {limit} exceeded"), retry_after)
    }

    async fn refund_all(&self, limit: LimitName, keys: &[String], now: Timestamp) {
        for key in keys {
            self.limiter.refund(limit, key, now).await;
        }
    }

    async fn check_replacement(&self, source_serial: &str, now: Timestamp) -> Result<()> {
        let status = self.storage.get_certificate_status(source_serial).await?;
        if status.revoked_at.is_some() {
            return Err(RaError::conflict(format!("certificate {source_serial} is already revoked; cannot replace")));
        }
        if status.is_expired(now) {
            return Err(RaError::conflict(format!("certificate {source_serial} has already expired")));
        }
        if let Some(existing) = self.storage.get_replacement_order(source_serial).await? {
            if !existing.replaced {
                return Err(RaError::duplicate(format!(
                    "certificate {source_serial} already has an outstanding replacement order"
                )));
            }
        }
        Ok(())
    }

    /// `PerformValidation`: dispatches one challenge attempt for a pending
    /// authorization through the VA collaborator and records the outcome.
    pub async fn perform_validation(&self, authz: Authorization, challenge_type: ChallengeType, now: Timestamp) -> Result<Authorization> {
        if authz.status != AuthorizationStatus::Pending {
            return Err(RaError::conflict(format!("authorization {} is not pending", authz.id)));
        }
        self.policy.check_authz_challenges(&authz_with_attempted(&authz, challenge_type))?;

        let outcome = self.va.validate(&authz.identifier, challenge_type, &authz.token).await;
        let (succeeded, error_detail, records) = match outcome {
            Ok(records) => (true, None, records),
            Err(e) => (false, Some(e.detail), vec![]),
        };

        let mut authz = authz;
        authz.validation_records.extend(records);

        self.authz
            .record_attempt(authz, challenge_type, succeeded, error_detail, now)
            .await
    }

    /// `FinalizeOrder`: validates the CSR against the order, issues a
    /// precertificate, collects an SCT quorum, issues the final
    /// certificate, and records issued-name rows for rate accounting.
    pub async fn finalize_order(&self, order: &Order, csr_der: &[u8], now: Timestamp) -> Result<Certificate> {
        if order.is_finalized() {
            return Err(RaError::conflict(format!("order {} was already finalized", order.id)));
        }

        let authzs = self.storage.get_authorizations(&order.authorization_ids).await?;
        let status = compute_order_status(order, &authzs, now)?;
        if status != OrderStatus::Ready {
            return Err(RaError::order_not_ready(format!("order {} is not ready to finalize", order.id)));
        }

        let parsed = csr::parse_csr(csr_der)?;
        csr::csr_identifiers_subset_of_order(&parsed.identifiers, &order.identifiers)?;
        if self.storage.is_key_blocked(&parsed.public_key_sha256).await? {
            return Err(RaError::bad_public_key("certificate public key has been administratively blocked"));
        }

        self.storage.set_order_processing(order.id).await?;

        let precert = match self.ca.issue_precertificate(&parsed.der, &parsed.identifiers).await {
            Ok(p) => p,
            Err(e) => {
                self.storage.set_order_error(order.id, e.clone()).await?;
                return Err(e);
            }
        };
        self.storage.put_precertificate(precert.clone()).await?;
        EventAuditor::track_event(AuditEvent::PrecertificateIssued {
            order_id: order.id.0,
            serial: precert.serial.clone(),
        });

        // A precertificate now exists and must not be abandoned: CT/CA
        // failures from here on are retried with bounded backoff rather than
        // immediately marking the order errored. Until an attempt either
        // succeeds or the budget is exhausted, `order.error` stays unset and
        // `began_processing` stays true, so `compute_order_status` reports
        // the order as `Processing` rather than failed.
        let mut attempt = 0;
        loop {
            match self.finalize_from_precertificate(order, &precert, now).await {
                Ok(cert) => return Ok(cert),
                Err(e) if attempt + 1 < FINALIZE_MAX_ATTEMPTS => {
                    attempt += 1;
                    EventAuditor::track_event(AuditEvent::FinalizationRetrying {
                        order_id: order.id.0,
                        attempt,
                        detail: e.detail.clone(),
                    });
                    tokio::time::sleep(Duration::from_millis(FINALIZE_BASE_BACKOFF_MS * 2u64.pow(attempt - 1))).await;
                }
                Err(e) => {
                    self.storage.set_order_error(order.id, e.clone()).await?;
                    return Err(e);
                }
            }
        }
    }

    /// Steps 4-7 of finalization: SCT quorum collection, final certificate
    /// issuance, and the bookkeeping that follows it. Safe to retry — every
    /// storage write here is idempotent against an identical precertificate.
    async fn finalize_from_precertificate(&self, order: &Order, precert: &Precertificate, now: Timestamp) -> Result<Certificate> {
        let scts = self.ct.submit_precertificate(precert).await?;
        if scts.len() < self.config.ct_logs.sct_quorum as usize {
            return Err(RaError::missing_scts(format!(
                "collected {} SCTs, need {}",
                scts.len(),
                self.config.ct_logs.sct_quorum
            )));
        }
        self.storage.add_scts(&precert.serial, scts.clone()).await?;
        EventAuditor::track_event(AuditEvent::SctQuorumReached {
            order_id: order.id.0,
            sct_count: scts.len(),
        });

        let cert = self.ca.issue_final_certificate(precert, &scts).await?;
        let cert_status = CertificateStatus {
            serial: cert.serial.clone(),
            ocsp_status: OcspStatus::Good,
            revoked_at: None,
            revoked_reason: None,
            not_after: cert.expires,
            issuer_id: cert.issuer_id.clone(),
        };
        self.storage.put_certificate(cert.clone(), cert_status).await?;
        self.storage.finalize_order(order.id, &cert.serial).await?;

        let issued_names: Vec<IssuedName> = order
            .identifiers
            .iter()
            .map(|ident| IssuedName {
                reversed_name_or_ip: reverse_dns_name(&ident.value),
                serial: cert.serial.clone(),
                not_before_day: now,
                is_renewal: order.replaces.is_some(),
            })
            .collect();
        self.storage.add_issued_names(issued_names).await?;

        if let Some(source_serial) = &order.replaces {
            self.storage.mark_replacement_fulfilled(source_serial).await?;
        }

        self.metrics.orders_finalized_total.inc();
        self.metrics.certificates_issued_total.inc();
        EventAuditor::track_event(AuditEvent::OrderFinalized {
            order_id: order.id.0,
            serial: cert.serial.clone(),
        });

        Ok(cert)
    }

    /// `RevokeCertificate` (§4.7): only an escalation in revocation reason
    /// is permitted for an already-revoked certificate (which is itself
    /// rejected here — re-revocation is a distinct, unsupported operation).
    pub async fn revoke_certificate(&self, serial: &str, reason: RevocationReason, key_sha256: Option<&str>, now: Timestamp) -> Result<()> {
        let shard = RevokedCertificate {
            serial: serial.to_string(),
            shard_idx: crate::model::shard_for_not_after(now, 128),
            reason,
            revoked_at: now,
        };
        self.storage.revoke_certificate(serial, reason, now, shard).await?;

        if reason == RevocationReason::KeyCompromise {
            if let Some(key_sha256) = key_sha256 {
                self.storage
                    .block_key(crate::model::BlockedKey {
                        key_sha256: key_sha256.to_string(),
                        added_at: now,
                    })
                    .await?;
            }
        }

        self.metrics.certificates_revoked_total.inc();
        EventAuditor::track_event(AuditEvent::CertificateRevoked {
            serial: serial.to_string(),
            reason: reason.as_u8(),
        });
        Ok(())
    }

    /// `Register`: admits a new account key, rate-limited per source IP and,
    /// for IPv6, per /48 range — a single client can otherwise be handed an
    /// effectively unlimited number of /128s out of one /48.
    pub async fn register(&self, key_sha256: String, contacts: Vec<String>, client_ip: IpAddr, now: Timestamp) -> Result<Registration> {
        if contacts.len() as u32 > self.config.max_contacts_per_registration {
            return Err(RaError::malformed("too many contacts for a single registration"));
        }
        if self.storage.get_registration_by_key_hash(&key_sha256).await?.is_some() {
            return Err(RaError::duplicate("an account already exists for this key"));
        }

        let ip_key = client_ip.to_string();
        if let RateLimitOutcome::Denied { retry_after } = self.limiter.spend(LimitName::NewRegistrationsPerIp, &ip_key, now).await? {
            return Err(self.rate_limit_denied("NewRegistrationsPerIp", &[ip_key], retry_after));
        }

        let range_key = match client_ip {
            IpAddr::V6(v6) => Some(
                Ipv6Net::new(v6, 48)
                    .map(|n| n.network().to_string())
                    .unwrap_or_else(|_| v6.to_string()),
            ),
            IpAddr::V4(_) => None,
        };
        if let Some(range_key) = &range_key {
            if let RateLimitOutcome::Denied { retry_after } = self
                .limiter
                .spend(LimitName::NewRegistrationsPerIpv6Range, range_key, now)
                .await?
            {
                self.limiter.refund(LimitName::NewRegistrationsPerIp, &ip_key, now).await;
                return Err(self.rate_limit_denied("NewRegistrationsPerIpv6Range", std::slice::from_ref(range_key), retry_after));
            }
        }

        let reg = match self
            .storage
            .new_registration(Registration {
                id: RegistrationId(0),
                key_sha256,
                agreement_url: None,
                contacts,
                created_at: now,
                status: crate::model::RegistrationStatus::Valid,
            })
            .await
        {
            Ok(reg) => reg,
            Err(e) => {
                self.limiter.refund(LimitName::NewRegistrationsPerIp, &ip_key, now).await;
                if let Some(range_key) = &range_key {
                    self.limiter.refund(LimitName::NewRegistrationsPerIpv6Range, range_key, now).await;
                }
                return Err(e);
            }
        };

        EventAuditor::track_event(AuditEvent::RegistrationCreated { registration_id: reg.id.0 });
        Ok(reg)
    }
}

/// Returns a copy of `authz` with a synthetic attempt recorded so
/// `PolicyAuthority::check_authz_challenges` can validate a challenge type
/// before it has actually been attempted.
fn authz_with_attempted(authz: &Authorization, challenge_type: ChallengeType) -> Authorization {
    let mut copy = authz.clone();
    copy.attempt = Some(crate::model::Attempt {
        challenge_type,
        attempted_at: authz.expires,
        succeeded: false,
        error_detail: None,
    });
    copy
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::limiter::MemoryLimiterStore;
    use crate::storage::InMemoryStorageAuthority;
    use std::collections::HashMap;

    struct AlwaysValidVa;
    #[async_trait]
    impl Va for AlwaysValidVa {
        async fn validate(&self, identifier: &Identifier, _challenge_type: ChallengeType, _token: &str) -> Result<Vec<ValidationRecord>> {
            Ok(vec![ValidationRecord {
                perspective: "test-perspective".into(),
                hostname: identifier.value.clone(),
                port: Some(80),
                address_used: None,
                url: None,
                resolver_addrs: vec![],
            }])
        }
    }

    struct FakeCa;
    #[async_trait]
    impl CaSigner for FakeCa {
        async fn issue_precertificate(&self, _csr_der: &[u8], _identifiers: &[Identifier]) -> Result<Precertificate> {
            Ok(Precertificate {
                serial: "0a1b".into(),
                der: vec![1, 2, 3],
                cert_profile_hash: "default".into(),
                order_id: OrderId(1),
                issued_at: Timestamp::from_second(1_700_000_000).unwrap(),
                scts: vec![],
            })
        }

        async fn issue_final_certificate(&self, precert: &Precertificate, _scts: &[Sct]) -> Result<Certificate> {
            Ok(Certificate {
                serial: precert.serial.clone(),
                der: vec![9, 9, 9],
                issued_at: Timestamp::from_second(1_700_000_000).unwrap(),
                expires: Timestamp::from_second(1_800_000_000).unwrap(),
                registration_id: RegistrationId(1),
                issuer_id: "test-ca".into(),
                digest: "deadbeef".into(),
            })
        }
    }

    struct FakeCt;
    #[async_trait]
    impl CtPublisher for FakeCt {
        async fn submit_precertificate(&self, _precert: &Precertificate) -> Result<Vec<Sct>> {
            Ok(vec![
                Sct {
                    log_id: "log-a".into(),
                    timestamp: 1_700_000_000,
                    signature: vec![1],
                },
                Sct {
                    log_id: "log-b".into(),
                    timestamp: 1_700_000_000,
                    signature: vec![2],
                },
            ])
        }
    }

    fn ra() -> RegistrationAuthority {
        let storage: Arc<dyn StorageAuthority> = Arc::new(InMemoryStorageAuthority::new());
        let policy = PolicyAuthority::new_unblocked();
        let mut limit_configs = HashMap::new();
        let permissive = crate::limiter::LimitConfig {
            count: 100,
            burst: 100,
            period: std::time::Duration::from_secs(3600),
            failure_mode: crate::limiter::FailureMode::Closed,
        };
        limit_configs.insert(LimitName::NewOrdersPerAccountPerDomain, permissive);
        limit_configs.insert(LimitName::CertificatesPerDomain, permissive);
        limit_configs.insert(LimitName::CertificatesPerFqdnSet, permissive);
        limit_configs.insert(LimitName::NewRegistrationsPerIp, permissive);
        limit_configs.insert(LimitName::NewRegistrationsPerIpv6Range, permissive);
        let limiter = Arc::new(Limiter::new(limit_configs, Arc::new(MemoryLimiterStore::new())));
        RegistrationAuthority::new(storage, policy, limiter, Arc::new(AlwaysValidVa), Arc::new(FakeCa), Arc::new(FakeCt), Config::default(), Arc::new(crate::metrics::MetricsRegistry::new()))
    }

    #[tokio::test]
    async fn happy_path_creates_validates_and_finalizes_an_order() {
        let ra = ra();
        let now = Timestamp::from_second(1_700_000_000).unwrap();

        let (order, authzs) = ra
            .new_order(RegistrationId(1), vec![Identifier::dns("example.com")], "default", None, now)
            .await
            .unwrap();
        assert_eq!(authzs.len(), 1);

        let validated = ra.perform_validation(authzs[0].clone(), ChallengeType::Dns01, now).await.unwrap();
        assert_eq!(validated.status, AuthorizationStatus::Valid);

        use rcgen::{CertificateParams, KeyPair};
        let params = CertificateParams::new(vec!["example.com".to_string()]).unwrap();
        let key_pair = KeyPair::generate().unwrap();
        let csr_der = params.serialize_request(&key_pair).unwrap().der().to_vec();

        let cert = ra.finalize_order(&order, &csr_der, now).await.unwrap();
        assert_eq!(cert.serial, "0a1b");
    }

    #[tokio::test]
    async fn finalize_rejects_a_csr_naming_an_unauthorized_domain() {
        let ra = ra();
        let now = Timestamp::from_second(1_700_000_000).unwrap();
        let (order, authzs) = ra
            .new_order(RegistrationId(1), vec![Identifier::dns("example.com")], "default", None, now)
            .await
            .unwrap();
        ra.perform_validation(authzs[0].clone(), ChallengeType::Dns01, now).await.unwrap();

        use rcgen::{CertificateParams, KeyPair};
        let params = CertificateParams::new(vec!["evil.example.com".to_string()]).unwrap();
        let key_pair = KeyPair::generate().unwrap();
        let csr_der = params.serialize_request(&key_pair).unwrap().der().to_vec();

        assert!(ra.finalize_order(&order, &csr_der, now).await.is_err());
    }
}
