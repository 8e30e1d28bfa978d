//! Structured error taxonomy shared by every RA/PA/SA collaborator.
//!
//! A single [`RaError`] value crosses every RPC boundary in this crate. Its
//! [`ErrorKind`] is a closed enumeration that collaborators recover exactly,
//! and maps onto one of a small number of RPC status categories.

use std::time::Duration;

/// The fixed set of error kinds that partition every outcome the core can
/// report. Each kind maps to exactly one [`RpcStatus`] category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ErrorKind {
    Malformed,
    Unauthorized,
    NotFound,
    RateLimit,
    RejectedIdentifier,
    InvalidEmail,
    ConnectionFailure,
    Caa,
    MissingScts,
    Duplicate,
    OrderNotReady,
    Dns,
    BadPublicKey,
    BadCsr,
    AlreadyRevoked,
    BadRevocationReason,
    UnsupportedContact,
    UnknownSerial,
    Conflict,
    InvalidProfile,
    AlreadyReplaced,
    /// Invariant violations, missing rows that should be present, unexpected
    /// enum values. Never surfaced to a client verbatim.
    Internal,
}

/// RPC status categories that collaborators route on. Several [`ErrorKind`]s
/// share a category; the category is what a transport layer (gRPC, HTTP)
/// would map onto its own status codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RpcStatus {
    InvalidArgument,
    PermissionDenied,
    NotFound,
    AlreadyExists,
    FailedPrecondition,
    Unavailable,
    Internal,
    Unknown,
}

impl ErrorKind {
    /// The single RPC status category this kind maps onto.
    pub fn rpc_status(&self) -> RpcStatus {
        use ErrorKind::*;
        match self {
            Malformed | InvalidEmail | Dns | BadPublicKey | BadCsr | UnsupportedContact
            | InvalidProfile | RejectedIdentifier => RpcStatus::InvalidArgument,
            Unauthorized | Caa => RpcStatus::PermissionDenied,
            NotFound | UnknownSerial => RpcStatus::NotFound,
            Duplicate | AlreadyRevoked | AlreadyReplaced => RpcStatus::AlreadyExists,
            RateLimit | OrderNotReady | BadRevocationReason | Conflict => {
                RpcStatus::FailedPrecondition
            }
            ConnectionFailure | MissingScts => RpcStatus::Unavailable,
            Internal => RpcStatus::Internal,
        }
    }
}

/// A per-identifier sub-error, used when `NewOrder` finds several invalid
/// identifiers at once: the top-level kind is `RejectedIdentifier` and each
/// offending identifier gets its own kind and detail.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct SubProblem {
    pub identifier: String,
    pub kind: ErrorKind,
    pub detail: String,
}

/// The structured error value carried across every RPC boundary in this
/// crate.
#[derive(Debug, Clone, thiserror::Error, serde::Serialize, serde::Deserialize)]
#[error("{kind:?}: {detail}")]
pub struct RaError {
    pub kind: ErrorKind,
    pub detail: String,
    #[serde(default)]
    pub subproblems: Vec<SubProblem>,
    #[serde(default, with = "retry_after_serde")]
    pub retry_after: Option<Duration>,
}

mod retry_after_serde {
    use super::Duration;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S: Serializer>(v: &Option<Duration>, s: S) -> Result<S::Ok, S::Error> {
        v.map(|d| d.as_secs_f64()).serialize(s)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Duration>, D::Error> {
        let secs: Option<f64> = Option::deserialize(d)?;
        Ok(secs.map(Duration::from_secs_f64))
    }
}

pub type Result<T> = std::result::Result<T, RaError>;

impl RaError {
    pub fn new(kind: ErrorKind, detail: impl Into<String>) -> Self {
        Self {
            kind,
            detail: detail.into(),
            subproblems: Vec::new(),
            retry_after: None,
        }
    }

    pub fn with_subproblems(mut self, subproblems: Vec<SubProblem>) -> Self {
        self.subproblems = subproblems;
        self
    }

    pub fn with_retry_after(mut self, retry_after: Duration) -> Self {
        self.retry_after = Some(retry_after);
        self
    }

    pub fn malformed(detail: impl Into<String>) -> Self {
        Self::new(ErrorKind::Malformed, detail)
    }

    pub fn unauthorized(detail: impl Into<String>) -> Self {
        Self::new(ErrorKind::Unauthorized, detail)
    }

    pub fn not_found(detail: impl Into<String>) -> Self {
        Self::new(ErrorKind::NotFound, detail)
    }

    pub fn rate_limit(detail: impl Into<String>, retry_after: Duration) -> Self {
        Self::new(ErrorKind::RateLimit, detail).with_retry_after(retry_after)
    }

    pub fn rejected_identifier(detail: impl Into<String>, subproblems: Vec<SubProblem>) -> Self {
        Self::new(ErrorKind::RejectedIdentifier, detail).with_subproblems(subproblems)
    }

    pub fn order_not_ready(detail: impl Into<String>) -> Self {
        Self::new(ErrorKind::OrderNotReady, detail)
    }

    pub fn bad_csr(detail: impl Into<String>) -> Self {
        Self::new(ErrorKind::BadCsr, detail)
    }

    pub fn bad_public_key(detail: impl Into<String>) -> Self {
        Self::new(ErrorKind::BadPublicKey, detail)
    }

    pub fn connection_failure(detail: impl Into<String>) -> Self {
        Self::new(ErrorKind::ConnectionFailure, detail)
    }

    pub fn internal(detail: impl Into<String>) -> Self {
        Self::new(ErrorKind::Internal, detail)
    }

    pub fn conflict(detail: impl Into<String>) -> Self {
        Self::new(ErrorKind::Conflict, detail)
    }

    pub fn already_revoked(detail: impl Into<String>) -> Self {
        Self::new(ErrorKind::AlreadyRevoked, detail)
    }

    pub fn bad_revocation_reason(detail: impl Into<String>) -> Self {
        Self::new(ErrorKind::BadRevocationReason, detail)
    }

    pub fn unknown_serial(detail: impl Into<String>) -> Self {
        Self::new(ErrorKind::UnknownSerial, detail)
    }

    pub fn already_replaced(detail: impl Into<String>) -> Self {
        Self::new(ErrorKind::AlreadyReplaced, detail)
    }

    pub fn invalid_profile(detail: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidProfile, detail)
    }

    pub fn missing_scts(detail: impl Into<String>) -> Self {
        Self::new(ErrorKind::MissingScts, detail)
    }

    pub fn duplicate(detail: impl Into<String>) -> Self {
        Self::new(ErrorKind::Duplicate, detail)
    }
}

impl From<serde_json::Error> for RaError {
    fn from(e: serde_json::Error) -> Self {
        RaError::internal(format!("json: {e}"))
    }
}

impl From<std::io::Error> for RaError {
    fn from(e: std::io::Error) -> Self {
        RaError::internal(format!("io: {e}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rpc_status_mapping_is_total_and_stable() {
        assert_eq!(ErrorKind::RateLimit.rpc_status(), RpcStatus::FailedPrecondition);
        assert_eq!(ErrorKind::NotFound.rpc_status(), RpcStatus::NotFound);
        assert_eq!(ErrorKind::Internal.rpc_status(), RpcStatus::Internal);
        assert_eq!(ErrorKind::Duplicate.rpc_status(), RpcStatus::AlreadyExists);
    }

    #[test]
    fn rate_limit_error_carries_retry_after() {
        let err = RaError::rate_limit("too many orders", Duration::from_secs(30));
        assert_eq!(err.retry_after, Some(Duration::from_secs(30)));
        assert_eq!(err.kind, ErrorKind::RateLimit);
    }

    #[test]
    fn rejected_identifier_carries_subproblems() {
        let err = RaError::rejected_identifier(
            "2 identifiers rejected",
            vec![SubProblem {
                identifier: "evil.example.com".into(),
                kind: ErrorKind::Malformed,
                detail: "blocked".into(),
            }],
        );
        assert_eq!(err.subproblems.len(), 1);
    }

    #[test]
    fn roundtrips_through_json() {
        let err = RaError::rate_limit("slow down", Duration::from_secs(5));
        let json = serde_json::to_string(&err).unwrap();
        let back: RaError = serde_json::from_str(&json).unwrap();
        assert_eq!(back.kind, err.kind);
        assert_eq!(back.retry_after, err.retry_after);
    }
}
