//! Content fingerprints and the oracle that computes them.

use crate::error::Result;
use sha2::{Digest, Sha256};
use std::fmt;

/// Length in bytes of every [`Fingerprint`].
pub const FINGERPRINT_LEN: usize = 32;

/// A fixed-length content identity.
///
/// Two byte strings with identical content always produce equal fingerprints.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Fingerprint([u8; FINGERPRINT_LEN]);

impl Fingerprint {
    pub const fn new(bytes: [u8; FINGERPRINT_LEN]) -> Self {
        Self(bytes)
    }

    pub const fn as_bytes(&self) -> &[u8; FINGERPRINT_LEN] {
        &self.0
    }

    /// Parses a fingerprint from its hex form.
    pub fn from_hex(s: &str) -> std::result::Result<Self, hex::FromHexError> {
        let mut bytes = [0u8; FINGERPRINT_LEN];
        hex::decode_to_slice(s, &mut bytes)?;
        Ok(Self(bytes))
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl From<[u8; FINGERPRINT_LEN]> for Fingerprint {
    fn from(bytes: [u8; FINGERPRINT_LEN]) -> Self {
        Self(bytes)
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Fingerprint({})", &self.to_hex()[..16])
    }
}

///
/// Computes the fingerprint of a chunk or of a whole object.
///
/// Implementations must be deterministic. A failure to produce a digest is reported
/// as [`DedupError::DigestFailure`](crate::DedupError::DigestFailure) and never as
/// an empty or zeroed fingerprint.
///
pub trait FingerprintOracle: Send + Sync {
    fn hash(&self, data: &[u8]) -> Result<Fingerprint>;
}

impl<F> FingerprintOracle for F
where
    F: Fn(&[u8]) -> Result<Fingerprint> + Send + Sync,
{
    fn hash(&self, data: &[u8]) -> Result<Fingerprint> {
        self(data)
    }
}

/// SHA-256 fingerprints.
#[derive(Debug, Clone, Copy, Default)]
pub struct Sha256Oracle;

impl FingerprintOracle for Sha256Oracle {
    #[inline]
    fn hash(&self, data: &[u8]) -> Result<Fingerprint> {
        Ok(Fingerprint(Sha256::digest(data).into()))
    }
}
