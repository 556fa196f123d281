// Content fingerprints used both as the dedup key and as the value notarized on the ledger.

use sha2::{Digest, Sha256};
use std::io::{self, Read};

const READ_CHUNK: usize = 64 * 1024;

/// Produces a stable digest of a byte stream.
///
/// The digest is a lowercase hex string so it can be stored verbatim in the
/// `documents.doc_hash` column and passed as a `string` argument to the contract.
pub trait ContentHasher: Send + Sync {
    fn hash(&self, input: &mut dyn Read) -> io::Result<String>;

    fn hash_bytes(&self, bytes: &[u8]) -> io::Result<String> {
        let mut reader = bytes;
        self.hash(&mut reader)
    }
}

/// SHA-256 over the raw bytes, with no domain separation.
#[derive(Debug, Default, Clone, Copy)]
pub struct Sha256Hasher;

impl ContentHasher for Sha256Hasher {
    fn hash(&self, input: &mut dyn Read) -> io::Result<String> {
        let mut hasher = Sha256::new();
        let mut buf = vec![0u8; READ_CHUNK];
        let mut total: u64 = 0;
        loop {
            let n = match input.read(&mut buf) {
                Ok(0) => break,
                Ok(n) => n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            };
            hasher.update(&buf[..n]);
            total += n as u64;
        }
        let out = hex::encode(hasher.finalize());
        tracing::debug!(bytes_hashed = total, hash = %out, "sha256 hash generated");
        Ok(out)
    }
}

/// Fingerprint of an owner identity. The email is hashed exactly as supplied, so
/// submit and verify must pass the same string.
pub fn owner_fingerprint(hasher: &dyn ContentHasher, email: &str) -> io::Result<String> {
    hasher.hash_bytes(email.as_bytes())
}
