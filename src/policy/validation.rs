//! Identifier well-formedness rules (§4.2): DNS label/length/charset rules,
//! IETF-reserved IP exclusion, and public-suffix handling.

use crate::error::{RaError, Result};
use std::net::IpAddr;

const MAX_DNS_LENGTH: usize = 253;
const MAX_LABEL_LENGTH: usize = 63;

/// A short, conservative list of public suffixes that must never be issued
/// for directly (only as a parent of at least one additional label). This is
/// not a full PSL; it exists to reject the handful of names that would
/// otherwise look structurally valid but are registries, not registrants.
const BARE_PUBLIC_SUFFIXES: &[&str] = &["com", "net", "org", "co.uk", "github.io"];

/// `WellFormedIdentifiers` for a single DNS identifier.
pub fn is_valid_dns_identifier(value: &str) -> Result<()> {
    let name = value.strip_prefix("*.").unwrap_or(value);

    if value.is_empty() || value.len() > MAX_DNS_LENGTH {
        return Err(RaError::malformed("DNS identifier length out of bounds"));
    }

    if value.matches('*').count() > 1 || (value.contains('*') && !value.starts_with("*.")) {
        return Err(RaError::malformed(
            "wildcard identifiers may only have a single leading `*.` label",
        ));
    }

    let labels: Vec<&str> = name.split('.').collect();
    if labels.len() < 2 {
        return Err(RaError::malformed("DNS identifier must have at least two labels"));
    }

    for label in &labels {
        validate_label(label)?;
    }

    if BARE_PUBLIC_SUFFIXES.contains(&name) {
        return Err(RaError::rejected_identifier(
            format!("{name} is a public suffix, not a registrable name"),
            vec![],
        ));
    }

    Ok(())
}

fn validate_label(label: &str) -> Result<()> {
    if label.is_empty() || label.len() > MAX_LABEL_LENGTH {
        return Err(RaError::malformed(format!("DNS label '{label}' has invalid length")));
    }
    if label.starts_with('-') || label.ends_with('-') {
        return Err(RaError::malformed(format!(
            "DNS label '{label}' may not start or end with a hyphen"
        )));
    }
    if label.starts_with("xn--") {
        // Punycode label: validated as an ASCII A-label; NFC normalization of
        // the decoded U-label is the caller's responsibility upstream of this
        // check, since this RA operates on wire-form identifiers only.
        if !label.chars().all(|c| c.is_ascii_alphanumeric() || c == '-') {
            return Err(RaError::malformed(format!("malformed punycode label '{label}'")));
        }
        return Ok(());
    }
    if !label.chars().all(|c| c.is_ascii_alphanumeric() || c == '-') {
        return Err(RaError::malformed(format!(
            "DNS label '{label}' contains disallowed characters"
        )));
    }
    Ok(())
}

/// `WellFormedIdentifiers` for a single IP identifier: the value must parse,
/// round-trip to the same canonical text form (rejecting non-canonical
/// input such as leading zeros or alternate IPv6 compression), carry no
/// zone ID, and must not fall within an IANA special-purpose range.
pub fn is_valid_ip_identifier(value: &str) -> Result<()> {
    if value.contains('%') {
        return Err(RaError::malformed("IP identifiers may not carry a zone ID"));
    }

    let addr: IpAddr = value
        .parse()
        .map_err(|_| RaError::malformed(format!("'{value}' is not a valid IP address")))?;

    if addr.to_string() != value {
        return Err(RaError::malformed(format!(
            "'{value}' is not in canonical form (expected '{addr}')"
        )));
    }

    if is_special_purpose(&addr) {
        return Err(RaError::rejected_identifier(
            format!("{value} falls within an IANA special-purpose address range"),
            vec![],
        ));
    }

    Ok(())
}

fn is_special_purpose(addr: &IpAddr) -> bool {
    match addr {
        IpAddr::V4(v4) => {
            v4.is_private()
                || v4.is_loopback()
                || v4.is_link_local()
                || v4.is_broadcast()
                || v4.is_documentation()
                || v4.is_unspecified()
                || v4.is_multicast()
        }
        IpAddr::V6(v6) => {
            v6.is_loopback() || v6.is_unspecified() || v6.is_multicast() || v6.is_unique_local() || v6.is_unicast_link_local()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_ordinary_domain() {
        assert!(is_valid_dns_identifier("www.example.com").is_ok());
    }

    #[test]
    fn accepts_single_leading_wildcard() {
        assert!(is_valid_dns_identifier("*.example.com").is_ok());
    }

    #[test]
    fn rejects_wildcard_in_non_leftmost_label() {
        assert!(is_valid_dns_identifier("www.*.example.com").is_err());
    }

    #[test]
    fn rejects_bare_public_suffix() {
        assert!(is_valid_dns_identifier("com").is_err());
    }

    #[test]
    fn rejects_label_with_leading_hyphen() {
        assert!(is_valid_dns_identifier("-bad.example.com").is_err());
    }

    #[test]
    fn accepts_canonical_ip() {
        assert!(is_valid_ip_identifier("203.0.113.5").is_ok());
    }

    #[test]
    fn rejects_non_canonical_ip_text() {
        assert!(is_valid_ip_identifier("203.000.113.005").is_err());
    }

    #[test]
    fn rejects_private_ip_range() {
        assert!(is_valid_ip_identifier("10.0.0.1").is_err());
    }

    #[test]
    fn rejects_ip_with_zone_id() {
        assert!(is_valid_ip_identifier("fe80::1%eth0").is_err());
    }
}
