//! Base64, hex and PEM encoding helpers used when rendering tokens, key
//! fingerprints, and parsing CSR/certificate PEM bundles.

use crate::error::{RaError, Result};
use base64::Engine;

/// URL-safe, unpadded base64 — the encoding ACME uses for tokens and key
/// authorizations.
pub struct Base64Encoding;

impl Base64Encoding {
    pub fn encode(data: &[u8]) -> String {
        base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(data)
    }

    pub fn decode(data: &str) -> Result<Vec<u8>> {
        base64::engine::general_purpose::URL_SAFE_NO_PAD
            .decode(data)
            .map_err(|e| RaError::malformed(format!("base64 decode error: {e}")))
    }
}

/// PEM encoding, used to unwrap client-submitted CSRs that arrive PEM-wrapped
/// rather than raw DER.
pub struct PemEncoding;

impl PemEncoding {
    pub fn decode(pem_data: &str) -> Result<(String, Vec<u8>)> {
        let parsed =
            pem::parse(pem_data).map_err(|e| RaError::malformed(format!("PEM parse error: {e}")))?;
        Ok((parsed.tag().to_string(), parsed.contents().to_vec()))
    }

    pub fn is_valid(data: &str) -> bool {
        pem::parse(data).is_ok()
    }
}

/// Hex encoding used for certificate serials and digests.
pub struct HexEncoding;

impl HexEncoding {
    pub fn encode(data: &[u8]) -> String {
        hex::encode(data)
    }

    pub fn decode(hex_str: &str) -> Result<Vec<u8>> {
        hex::decode(hex_str).map_err(|e| RaError::malformed(format!("hex decode error: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base64_url_safe_round_trip() {
        let data = b"\xfb\xff\xfe";
        let encoded = Base64Encoding::encode(data);
        assert!(!encoded.contains('+'));
        assert!(!encoded.contains('/'));
        assert_eq!(Base64Encoding::decode(&encoded).unwrap(), data);
    }

    #[test]
    fn hex_round_trip() {
        let data = b"test";
        let hex = HexEncoding::encode(data);
        assert_eq!(HexEncoding::decode(&hex).unwrap(), data);
    }

    #[test]
    fn odd_length_hex_is_rejected() {
        assert!(HexEncoding::decode("abc").is_err());
    }
}
