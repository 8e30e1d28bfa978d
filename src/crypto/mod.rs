//! Cryptographic primitives used by the core: hashing for key fingerprints,
//! FQDN-set digests, and blocked-key lookups, plus base64/hex/PEM encoding
//! helpers.

pub mod encoding;
pub mod hash;

pub use encoding::{Base64Encoding, HexEncoding, PemEncoding};
pub use hash::Sha256Hash;
