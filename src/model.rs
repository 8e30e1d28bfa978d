//! Relational entities persisted by the Storage Authority (§3). These are
//! the in-memory Rust shapes of the tables the SA interface (§4.8) operates
//! on; integer IDs are the handles used to avoid a cyclic ownership graph
//! (§9).

use crate::types::{AuthorizationId, ChallengeType, Identifier, OrderId, RegistrationId, Sct, ValidationRecord};
use jiff::Timestamp;

/// Registration status (§3): mutated only through account update or
/// deactivation, never deleted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RegistrationStatus {
    Valid,
    Deactivated,
    Revoked,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct Registration {
    pub id: RegistrationId,
    /// SHA-256 fingerprint of the account's JWK; unique across live accounts.
    pub key_sha256: String,
    pub agreement_url: Option<String>,
    pub contacts: Vec<String>,
    pub created_at: Timestamp,
    pub status: RegistrationStatus,
}

/// Authorization status (§4.4). `Expired` is never stored — it is derived
/// from `expires < now` at read time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthorizationStatus {
    Pending,
    Valid,
    Invalid,
    Deactivated,
    Revoked,
}

/// The outcome of an attempted challenge, recorded once an attempt has been
/// made. At most one challenge per authorization may ever be attempted.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct Attempt {
    pub challenge_type: ChallengeType,
    pub attempted_at: Timestamp,
    pub succeeded: bool,
    pub error_detail: Option<String>,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct Authorization {
    pub id: AuthorizationId,
    pub registration_id: RegistrationId,
    pub identifier: Identifier,
    pub expires: Timestamp,
    pub status: AuthorizationStatus,
    pub profile_name: String,
    /// The set of challenge types offered for this authorization (§9: a
    /// bitmap is an implementation choice; a plain set is equally valid).
    pub offered_challenges: Vec<ChallengeType>,
    /// Shared across all offered challenges; URL-safe base64, no padding.
    pub token: String,
    pub attempt: Option<Attempt>,
    pub validation_records: Vec<ValidationRecord>,
}

impl Authorization {
    /// Live status considering expiry — `Expired` is virtual, never stored.
    pub fn effective_status(&self, now: Timestamp) -> AuthorizationStatus {
        if self.expires < now && self.status == AuthorizationStatus::Pending {
            // Expired pending authorizations behave like Invalid for order
            // status purposes; `Expired` proper only applies to Valid ones
            // that have lapsed, tracked via `is_expired`.
            return AuthorizationStatus::Invalid;
        }
        self.status
    }

    pub fn is_expired(&self, now: Timestamp) -> bool {
        self.expires < now
    }

    pub fn is_reusable(&self, now: Timestamp) -> bool {
        !self.is_expired(now)
            && matches!(self.status, AuthorizationStatus::Valid | AuthorizationStatus::Pending)
    }
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub registration_id: RegistrationId,
    pub created_at: Timestamp,
    pub expires: Timestamp,
    pub identifiers: Vec<Identifier>,
    pub authorization_ids: Vec<AuthorizationId>,
    pub profile_name: String,
    pub replaces: Option<String>,
    pub began_processing: bool,
    pub certificate_serial: String,
    pub error: Option<crate::error::RaError>,
}

impl Order {
    pub fn is_finalized(&self) -> bool {
        !self.certificate_serial.is_empty()
    }
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct Certificate {
    pub serial: String,
    pub der: Vec<u8>,
    pub issued_at: Timestamp,
    pub expires: Timestamp,
    pub registration_id: RegistrationId,
    pub issuer_id: String,
    pub digest: String,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct Precertificate {
    pub serial: String,
    pub der: Vec<u8>,
    pub cert_profile_hash: String,
    pub order_id: OrderId,
    pub issued_at: Timestamp,
    pub scts: Vec<Sct>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OcspStatus {
    Good,
    Revoked,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct CertificateStatus {
    pub serial: String,
    pub ocsp_status: OcspStatus,
    pub revoked_at: Option<Timestamp>,
    pub revoked_reason: Option<crate::types::RevocationReason>,
    pub not_after: Timestamp,
    pub issuer_id: String,
}

impl CertificateStatus {
    pub fn is_expired(&self, now: Timestamp) -> bool {
        self.not_after < now
    }
}

/// One row per identifier on a certificate, supporting "per registered
/// domain" rate accounting. DNS values are stored reversed to turn suffix
/// queries into prefix queries (§4.8); IP values are stored as-is.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct IssuedName {
    pub reversed_name_or_ip: String,
    pub serial: String,
    pub not_before_day: Timestamp,
    pub is_renewal: bool,
}

pub fn reverse_dns_name(name: &str) -> String {
    name.split('.').rev().collect::<Vec<_>>().join(".")
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct ReplacementOrder {
    pub source_serial: String,
    pub order_id: OrderId,
    pub order_expires: Timestamp,
    pub replaced: bool,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct RateLimitOverride {
    pub limit_enum: String,
    pub bucket_key: String,
    pub count: u64,
    pub burst: u64,
    pub period_nanos: u64,
    pub comment: String,
    pub enabled: bool,
    pub updated_at: Timestamp,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct RevokedCertificate {
    pub serial: String,
    pub shard_idx: u32,
    pub reason: crate::types::RevocationReason,
    pub revoked_at: Timestamp,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct CrlShard {
    pub shard_idx: u32,
    pub leased_until: Option<Timestamp>,
    pub this_update: Timestamp,
    pub next_update: Timestamp,
}

/// Assigns a certificate's revoked-certificate row to a shard by the
/// certificate's notAfter hour, matching §4.7.
pub fn shard_for_not_after(not_after: Timestamp, shard_count: u32) -> u32 {
    let hour = not_after.as_second() / 3600;
    (hour.rem_euclid(shard_count as i64)) as u32
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct BlockedKey {
    pub key_sha256: String,
    pub added_at: Timestamp,
}

/// A paused `(account, identifier)` pair (§4.4 zombie-client auto-pause).
/// `unpaused_at == None` means the pause is still in effect.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct PausedAccount {
    pub registration_id: RegistrationId,
    pub identifier: String,
    pub paused_at: Timestamp,
    pub unpaused_at: Option<Timestamp>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reverse_dns_name_reverses_labels() {
        assert_eq!(reverse_dns_name("www.example.com"), "com.example.www");
    }

    #[test]
    fn shard_assignment_is_deterministic() {
        let ts = Timestamp::from_second(1_700_000_000).unwrap();
        let a = shard_for_not_after(ts, 16);
        let b = shard_for_not_after(ts, 16);
        assert_eq!(a, b);
        assert!(a < 16);
    }

    #[test]
    fn authorization_reusability_respects_expiry() {
        let now = Timestamp::from_second(1_700_000_000).unwrap();
        let later = Timestamp::from_second(1_700_100_000).unwrap();
        let authz = Authorization {
            id: AuthorizationId(1),
            registration_id: RegistrationId(1),
            identifier: Identifier::dns("example.com"),
            expires: now,
            status: AuthorizationStatus::Valid,
            profile_name: "default".into(),
            offered_challenges: vec![ChallengeType::Dns01],
            token: "tok".into(),
            attempt: None,
            validation_records: vec![],
        };
        assert!(authz.is_reusable(now));
        assert!(!authz.is_reusable(later));
    }
}
