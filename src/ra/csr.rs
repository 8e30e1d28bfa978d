//! CSR intake: parses a DER-encoded PKCS#10 request and extracts the
//! identifiers and public key that must match the order being finalized.

use crate::crypto::Sha256Hash;
use crate::error::{RaError, Result};
use crate::types::Identifier;
use x509_parser::certification_request::X509CertificationRequest;
use x509_parser::extensions::{GeneralName, ParsedExtension};

/// The identifiers and public-key fingerprint pulled out of a CSR.
pub struct ParsedCsr {
    pub identifiers: Vec<Identifier>,
    pub public_key_sha256: String,
    pub der: Vec<u8>,
}

/// Parses a DER-encoded CSR, validates its self-signature, and extracts the
/// subjectAltName DNS/IP entries that become the certificate's identifier
/// set (§4.6: the CSR's names must be a subset of the order's identifiers).
pub fn parse_csr(der: &[u8]) -> Result<ParsedCsr> {
    let (_, csr) = X509CertificationRequest::from_der(der).map_err(|e| RaError::bad_csr(format!("malformed CSR: {e}")))?;

    csr.verify_signature()
        .map_err(|_| RaError::bad_csr("CSR signature does not verify against its own public key"))?;

    let mut identifiers = Vec::new();
    for ext in csr.requested_extensions() {
        if let ParsedExtension::SubjectAlternativeName(san) = ext {
            for name in &san.general_names {
                match name {
                    GeneralName::DNSName(dns) => identifiers.push(Identifier::dns(*dns)),
                    GeneralName::IPAddress(bytes) => {
                        if let Some(addr) = ip_from_bytes(bytes) {
                            identifiers.push(Identifier::ip(addr));
                        }
                    }
                    _ => {}
                }
            }
        }
    }

    if identifiers.is_empty() {
        return Err(RaError::bad_csr("CSR carries no subjectAltName DNS or IP entries"));
    }

    let public_key_der = csr.certification_request_info.subject_pki.raw;
    let public_key_sha256 = Sha256Hash::hash_hex(public_key_der);

    Ok(ParsedCsr {
        identifiers,
        public_key_sha256,
        der: der.to_vec(),
    })
}

fn ip_from_bytes(bytes: &[u8]) -> Option<std::net::IpAddr> {
    match bytes.len() {
        4 => Some(std::net::IpAddr::from(<[u8; 4]>::try_from(bytes).ok()?)),
        16 => Some(std::net::IpAddr::from(<[u8; 16]>::try_from(bytes).ok()?)),
        _ => None,
    }
}

/// Confirms every identifier the CSR names is present in the order's
/// identifier set (case-insensitively for DNS names); extra order
/// identifiers not present in the CSR are permitted (the client may narrow
/// at finalization time), but the CSR may never broaden.
pub fn csr_identifiers_subset_of_order(csr_identifiers: &[Identifier], order_identifiers: &[Identifier]) -> Result<()> {
    for csr_ident in csr_identifiers {
        if !order_identifiers.iter().any(|o| o.id_type == csr_ident.id_type && o.value == csr_ident.value) {
            return Err(RaError::unauthorized(format!(
                "CSR names {} which is not among the order's authorized identifiers",
                csr_ident.value
            )));
        }
    }
    Ok(())
}
