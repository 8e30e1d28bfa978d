//! Core wire-adjacent value types shared across the RA, PA, rate-limit engine
//! and storage model: identifiers, IDs, challenge types, revocation reasons.

use std::fmt;
use std::net::IpAddr;
use std::str::FromStr;

macro_rules! id_newtype {
    ($name:ident) => {
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize,
        )]
        pub struct $name(pub u64);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<u64> for $name {
            fn from(v: u64) -> Self {
                Self(v)
            }
        }
    };
}

id_newtype!(RegistrationId);
id_newtype!(OrderId);
id_newtype!(AuthorizationId);

/// Identifier type, per §3: only DNS names and IP addresses are recognized.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IdentifierType {
    Dns,
    Ip,
}

impl fmt::Display for IdentifierType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IdentifierType::Dns => write!(f, "dns"),
            IdentifierType::Ip => write!(f, "ip"),
        }
    }
}

/// A tagged identifier value. DNS values are stored lowercase; IP values are
/// stored in RFC 5952 canonical text form.
#[derive(Debug, Clone, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct Identifier {
    #[serde(rename = "type")]
    pub id_type: IdentifierType,
    pub value: String,
}

impl Identifier {
    pub fn dns(value: impl Into<String>) -> Self {
        Self {
            id_type: IdentifierType::Dns,
            value: value.into().to_lowercase(),
        }
    }

    pub fn ip(addr: IpAddr) -> Self {
        Self {
            id_type: IdentifierType::Ip,
            value: addr.to_string(),
        }
    }

    /// True if this is a DNS identifier whose leftmost label is `*`.
    pub fn is_wildcard(&self) -> bool {
        self.id_type == IdentifierType::Dns && self.value.starts_with("*.")
    }

    /// The identifier with a leading `*.` stripped, if it was a wildcard.
    pub fn base_domain(&self) -> &str {
        self.value.strip_prefix("*.").unwrap_or(&self.value)
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.value)
    }
}

/// Challenge type, per §3: a fourth type beyond the classic ACME three.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ChallengeType {
    Http01,
    Dns01,
    TlsAlpn01,
    DnsAccount01,
}

impl ChallengeType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChallengeType::Http01 => "http-01",
            ChallengeType::Dns01 => "dns-01",
            ChallengeType::TlsAlpn01 => "tls-alpn-01",
            ChallengeType::DnsAccount01 => "dns-account-01",
        }
    }
}

impl fmt::Display for ChallengeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for ChallengeType {
    type Err = crate::error::RaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "http-01" => Ok(ChallengeType::Http01),
            "dns-01" => Ok(ChallengeType::Dns01),
            "tls-alpn-01" => Ok(ChallengeType::TlsAlpn01),
            "dns-account-01" => Ok(ChallengeType::DnsAccount01),
            other => Err(crate::error::RaError::malformed(format!(
                "unknown challenge type: {other}"
            ))),
        }
    }
}

/// Revocation reason codes, matching RFC 5280 CRL reason codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[repr(u8)]
pub enum RevocationReason {
    Unspecified = 0,
    KeyCompromise = 1,
    CaCompromise = 2,
    AffiliationChanged = 3,
    Superseded = 4,
    CessationOfOperation = 5,
    CertificateHold = 6,
    RemoveFromCrl = 8,
    PrivilegeWithdrawn = 9,
    AaCompromise = 10,
}

impl RevocationReason {
    pub fn as_u8(&self) -> u8 {
        *self as u8
    }

    pub fn from_u8(v: u8) -> Option<Self> {
        use RevocationReason::*;
        match v {
            0 => Some(Unspecified),
            1 => Some(KeyCompromise),
            2 => Some(CaCompromise),
            3 => Some(AffiliationChanged),
            4 => Some(Superseded),
            5 => Some(CessationOfOperation),
            6 => Some(CertificateHold),
            8 => Some(RemoveFromCrl),
            9 => Some(PrivilegeWithdrawn),
            10 => Some(AaCompromise),
            _ => None,
        }
    }
}

/// One network perspective's record of a validation attempt, appended to an
/// authorization's validation record array on every `PerformValidation` call.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct ValidationRecord {
    pub perspective: String,
    pub hostname: String,
    pub port: Option<u16>,
    pub address_used: Option<IpAddr>,
    pub url: Option<String>,
    pub resolver_addrs: Vec<String>,
}

/// A Signed Certificate Timestamp collected from a CT log during finalization.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct Sct {
    pub log_id: String,
    pub timestamp: u64,
    pub signature: Vec<u8>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identifier_lowercases_dns_values() {
        let id = Identifier::dns("Example.COM");
        assert_eq!(id.value, "example.com");
    }

    #[test]
    fn wildcard_detection_and_base_domain() {
        let id = Identifier::dns("*.example.com");
        assert!(id.is_wildcard());
        assert_eq!(id.base_domain(), "example.com");

        let plain = Identifier::dns("example.com");
        assert!(!plain.is_wildcard());
        assert_eq!(plain.base_domain(), "example.com");
    }

    #[test]
    fn challenge_type_round_trips_through_display_and_from_str() {
        for ct in [
            ChallengeType::Http01,
            ChallengeType::Dns01,
            ChallengeType::TlsAlpn01,
            ChallengeType::DnsAccount01,
        ] {
            let s = ct.to_string();
            assert_eq!(ChallengeType::from_str(&s).unwrap(), ct);
        }
    }

    #[test]
    fn revocation_reason_numeric_mapping() {
        assert_eq!(RevocationReason::KeyCompromise.as_u8(), 1);
        assert_eq!(RevocationReason::from_u8(1), Some(RevocationReason::KeyCompromise));
        assert_eq!(RevocationReason::from_u8(7), None);
    }

    #[test]
    fn id_newtypes_display_their_inner_value() {
        let id = OrderId(42);
        assert_eq!(id.to_string(), "42");
    }
}
