//! Stable fingerprints for compiled requests.
//!
//! Two compilations of the same query must produce the same fingerprint, so
//! executors can key caches and manifests on it.

use blake3::Hasher;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct Fingerprint(pub [u8; 32]);

impl Fingerprint {
    pub fn to_hex(&self) -> String {
        blake3::Hash::from(self.0).to_hex().to_string()
    }

    /// First 12 hex chars; enough to tell requests apart in logs.
    pub fn short(&self) -> String {
        let mut hex = self.to_hex();
        hex.truncate(12);
        hex
    }
}

impl std::fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

pub fn fingerprint_bytes(bytes: &[u8]) -> Fingerprint {
    let mut h = Hasher::new();
    h.update(bytes);
    Fingerprint(h.finalize().into())
}

/// Fingerprint a table name plus any serde-serializable compiled body.
///
/// serde_json maps are ordered (no `preserve_order`), so equal documents
/// always serialize to equal bytes.
pub fn fingerprint_request<T: Serialize>(
    table: &str,
    body: &T,
) -> Result<Fingerprint, crate::error::Error> {
    let bytes = serde_json::to_vec(body).map_err(|e| crate::error::Error::Hash(e.to_string()))?;
    let mut h = Hasher::new();
    h.update(table.as_bytes());
    h.update(&[0]);
    h.update(&bytes);
    Ok(Fingerprint(h.finalize().into()))
}
