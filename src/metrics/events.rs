use serde::Serialize;
use tracing::info;

/// Significant RA/PA/SA events, tracked for audit purposes.
#[derive(Debug, Serialize)]
pub enum AuditEvent {
    RegistrationCreated {
        registration_id: u64,
    },
    OrderCreated {
        order_id: u64,
        registration_id: u64,
        identifiers: Vec<String>,
    },
    ValidationAttempted {
        authorization_id: u64,
        challenge_type: String,
        succeeded: bool,
    },
    AuthorizationDeactivated {
        authorization_id: u64,
    },
    ZombieClientPaused {
        registration_id: u64,
        identifier: String,
    },
    OrderFinalized {
        order_id: u64,
        serial: String,
    },
    PrecertificateIssued {
        order_id: u64,
        serial: String,
    },
    SctQuorumReached {
        order_id: u64,
        sct_count: usize,
    },
    FinalizationRetrying {
        order_id: u64,
        attempt: u32,
        detail: String,
    },
    CertificateRevoked {
        serial: String,
        reason: u8,
    },
    RateLimitDenied {
        limit: String,
        bucket_key: String,
    },
}

/// Audit logger: serializes events to JSON and logs them at a dedicated
/// `tracing` target so they can be routed independently of general logs.
pub struct EventAuditor;

impl EventAuditor {
    pub fn track_event(event: AuditEvent) {
        let event_json = serde_json::to_string(&event).unwrap_or_default();
        info!(target: "ra_audit", event = %event_json, "RA event occurred");
    }
}
