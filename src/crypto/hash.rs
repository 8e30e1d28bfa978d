//! SHA-256 hashing used for key fingerprints, FQDN-set digests, and blocked
//! keys. The core only ever hashes with SHA-256; the other digests supported
//! here exist for completeness at the edges (e.g. reading foreign PEM data).

use crate::error::Result;
use sha2::{Digest, Sha256};

/// SHA-256 hashing.
pub struct Sha256Hash;

impl Sha256Hash {
    pub fn hash(data: &[u8]) -> Vec<u8> {
        let mut hasher = Sha256::new();
        hasher.update(data);
        hasher.finalize().to_vec()
    }

    pub fn hash_hex(data: &[u8]) -> String {
        super::encoding::HexEncoding::encode(&Self::hash(data))
    }

    /// SHA-256 of the sorted, comma-joined, lowercased identifier values of a
    /// certificate or order — the FQDN-set hash of §3.
    pub fn fqdn_set(identifiers: &[String]) -> Result<[u8; 32]> {
        let mut values: Vec<String> = identifiers.iter().map(|s| s.to_lowercase()).collect();
        values.sort();
        values.dedup();
        let joined = values.join(",");
        let digest = Self::hash(joined.as_bytes());
        digest
            .try_into()
            .map_err(|_| crate::error::RaError::internal("sha256 digest was not 32 bytes"))
    }

    pub fn fqdn_set_hex(identifiers: &[String]) -> Result<String> {
        Ok(super::encoding::HexEncoding::encode(&Self::fqdn_set(identifiers)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_hex_is_stable() {
        let hash = Sha256Hash::hash_hex(b"test data");
        assert_eq!(
            hash,
            "916f0027a575074ce72a331777c3478d6513f786a591bd892da1a577bf2335f"
        );
    }

    #[test]
    fn fqdn_set_is_invariant_under_permutation_and_case() {
        let a = Sha256Hash::fqdn_set_hex(&["Example.com".into(), "www.example.com".into()]).unwrap();
        let b = Sha256Hash::fqdn_set_hex(&["www.EXAMPLE.com".into(), "example.COM".into()]).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn fqdn_set_differs_for_different_sets() {
        let a = Sha256Hash::fqdn_set_hex(&["a.example.com".into()]).unwrap();
        let b = Sha256Hash::fqdn_set_hex(&["b.example.com".into()]).unwrap();
        assert_ne!(a, b);
    }
}
