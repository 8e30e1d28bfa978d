//! Authorization lifecycle logic (§4.4): reuse of still-valid authorizations
//! across orders, recording validation attempts, and zombie-client
//! auto-pause when an (account, identifier) pair keeps failing validation.

use crate::config::FeatureFlags;
use crate::error::Result;
use crate::limiter::{LimitName, Limiter};
use crate::metrics::{AuditEvent, EventAuditor};
use crate::model::{Attempt, Authorization, AuthorizationStatus, PausedAccount};
use crate::storage::StorageAuthority;
use crate::types::{ChallengeType, Identifier, RegistrationId};
use jiff::{Span, Timestamp};
use std::sync::Arc;

/// Business logic layered over the Storage Authority for authorization
/// creation, reuse, and the zombie-client auto-pause feature.
pub struct AuthorizationAuthority {
    storage: Arc<dyn StorageAuthority>,
    limiter: Arc<Limiter>,
    features: FeatureFlags,
}

impl AuthorizationAuthority {
    pub fn new(storage: Arc<dyn StorageAuthority>, limiter: Arc<Limiter>, features: FeatureFlags) -> Self {
        Self { storage, limiter, features }
    }

    /// Returns a reusable authorization for `(registration_id, identifier)`
    /// if one exists and `NoPendingAuthzReuse` doesn't forbid reusing a
    /// pending (not yet validated) one.
    pub async fn find_reusable(
        &self,
        registration_id: RegistrationId,
        identifier: &Identifier,
        now: Timestamp,
    ) -> Result<Option<Authorization>> {
        let found = self
            .storage
            .find_reusable_authorization(registration_id, &identifier.value, now)
            .await?;

        Ok(found.filter(|a| !(self.features.no_pending_authz_reuse && a.status == AuthorizationStatus::Pending)))
    }

    /// Records the outcome of a challenge attempt, deactivating the
    /// authorization's further validation when it fails, and evaluates the
    /// account for zombie-client auto-pause if enabled.
    pub async fn record_attempt(
        &self,
        mut authz: Authorization,
        challenge_type: ChallengeType,
        succeeded: bool,
        error_detail: Option<String>,
        now: Timestamp,
    ) -> Result<Authorization> {
        authz.attempt = Some(Attempt {
            challenge_type,
            attempted_at: now,
            succeeded,
            error_detail,
        });
        authz.status = if succeeded {
            AuthorizationStatus::Valid
        } else {
            AuthorizationStatus::Invalid
        };

        self.storage.record_validation_attempt(authz.clone()).await?;

        EventAuditor::track_event(AuditEvent::ValidationAttempted {
            authorization_id: authz.id.0,
            challenge_type: challenge_type.to_string(),
            succeeded,
        });

        if !succeeded {
            let bucket_key = format!("{}:{}", authz.registration_id, authz.identifier.value);
            let _ = self
                .limiter
                .spend(LimitName::FailedAuthorizationsPerAccountPerDomain, &bucket_key, now)
                .await;

            if self.features.automatically_pause_zombie_clients {
                self.maybe_pause_zombie_client(authz.registration_id, &authz.identifier, now).await?;
            }
        }

        Ok(authz)
    }

    async fn maybe_pause_zombie_client(&self, registration_id: RegistrationId, identifier: &Identifier, now: Timestamp) -> Result<()> {
        if self.storage.is_account_paused(registration_id, &identifier.value).await? {
            return Ok(());
        }

        let window_start = now.checked_sub(Span::new().hours(24)).unwrap_or(now);
        let failures = self
            .storage
            .count_recent_failed_validations(registration_id, &identifier.value, window_start)
            .await?;

        if failures >= self.features.zombie_threshold {
            self.storage
                .pause_account(PausedAccount {
                    registration_id,
                    identifier: identifier.value.clone(),
                    paused_at: now,
                    unpaused_at: None,
                })
                .await?;

            EventAuditor::track_event(AuditEvent::ZombieClientPaused {
                registration_id: registration_id.0,
                identifier: identifier.value.clone(),
            });
        }

        Ok(())
    }

    pub async fn deactivate(&self, authz: &Authorization) -> Result<()> {
        self.storage.deactivate_authorization(authz.id).await?;
        EventAuditor::track_event(AuditEvent::AuthorizationDeactivated {
            authorization_id: authz.id.0,
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::limiter::MemoryLimiterStore;
    use crate::storage::InMemoryStorageAuthority;
    use crate::types::{AuthorizationId, OrderId};
    use std::collections::HashMap;

    fn ts(secs: i64) -> Timestamp {
        Timestamp::from_second(secs).unwrap()
    }

    fn test_limiter() -> Arc<Limiter> {
        Arc::new(Limiter::new(HashMap::new(), Arc::new(MemoryLimiterStore::new())))
    }

    fn base_authz(id: u64, reg: u64) -> Authorization {
        Authorization {
            id: AuthorizationId(id),
            registration_id: RegistrationId(reg),
            identifier: Identifier::dns("example.com"),
            expires: ts(10_000_000),
            status: AuthorizationStatus::Pending,
            profile_name: "default".into(),
            offered_challenges: vec![ChallengeType::Dns01],
            token: "tok".into(),
            attempt: None,
            validation_records: vec![],
        }
    }

    #[tokio::test]
    async fn pending_authz_reuse_is_forbidden_under_the_feature_flag() {
        let storage: Arc<dyn StorageAuthority> = Arc::new(InMemoryStorageAuthority::new());
        let order = crate::model::Order {
            id: OrderId(0),
            registration_id: RegistrationId(1),
            created_at: ts(1_000),
            expires: ts(10_000_000),
            identifiers: vec![Identifier::dns("example.com")],
            authorization_ids: vec![],
            profile_name: "default".into(),
            replaces: None,
            began_processing: false,
            certificate_serial: String::new(),
            error: None,
        };
        let (_, authzs) = storage.new_order_and_authzs(order, vec![base_authz(0, 1)]).await.unwrap();
        assert_eq!(authzs[0].status, AuthorizationStatus::Pending);

        let mut features = FeatureFlags::default();
        features.no_pending_authz_reuse = true;
        let aa = AuthorizationAuthority::new(storage.clone(), test_limiter(), features);

        let reused = aa
            .find_reusable(RegistrationId(1), &Identifier::dns("example.com"), ts(2_000))
            .await
            .unwrap();
        assert!(reused.is_none());
    }

    #[tokio::test]
    async fn zombie_client_is_paused_after_threshold_failures() {
        let storage: Arc<dyn StorageAuthority> = Arc::new(InMemoryStorageAuthority::new());
        let mut features = FeatureFlags::default();
        features.automatically_pause_zombie_clients = true;
        features.zombie_threshold = 2;
        let aa = AuthorizationAuthority::new(storage.clone(), test_limiter(), features);

        let order = crate::model::Order {
            id: OrderId(0),
            registration_id: RegistrationId(1),
            created_at: ts(1_000),
            expires: ts(10_000_000),
            identifiers: vec![Identifier::dns("example.com"), Identifier::dns("example.com")],
            authorization_ids: vec![],
            profile_name: "default".into(),
            replaces: None,
            began_processing: false,
            certificate_serial: String::new(),
            error: None,
        };
        let (_, authzs) = storage.new_order_and_authzs(order, vec![base_authz(0, 1), base_authz(0, 1)]).await.unwrap();

        aa.record_attempt(authzs[0].clone(), ChallengeType::Dns01, false, Some("nxdomain".into()), ts(2_000))
            .await
            .unwrap();
        assert!(!storage.is_account_paused(RegistrationId(1), "example.com").await.unwrap());

        aa.record_attempt(authzs[1].clone(), ChallengeType::Dns01, false, Some("nxdomain".into()), ts(3_000))
            .await
            .unwrap();
        assert!(storage.is_account_paused(RegistrationId(1), "example.com").await.unwrap());
    }
}
