//! Crypto primitives for the RKE wire protocol and fragment checksums.
//!
//! `stream_xor` is deliberately NOT a strong cipher (see spec.md §9): it
//! is the legacy "CTR-style" placeholder the encryption-coin protocol
//! uses today, and must be preserved byte-for-byte for interoperability
//! with peers running the original scheme. It should be treated as
//! replaceable behind this module's boundary, not inlined at call sites.

use crate::errors::{Result, RkeError};
use rand::RngCore;
use sha2::{Digest, Sha256};

/// Applies the legacy keyed XOR stream to `buf` in place.
///
/// `buf[i] ^= key[i % 16] ^ nonce[i % 16]`. Involutive: calling this twice
/// with the same key/nonce restores the original bytes.
pub fn stream_xor(key: &[u8; 16], nonce: &[u8; 16], buf: &mut [u8]) {
    for (i, b) in buf.iter_mut().enumerate() {
        *b ^= key[i % 16] ^ nonce[i % 16];
    }
}

/// Computes a 32-byte SHA-256 digest of `bytes`.
pub fn content_hash(bytes: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hasher.finalize().into()
}

/// Constant-time comparison of two digests.
pub fn digests_equal(a: &[u8; 32], b: &[u8; 32]) -> bool {
    let mut diff = 0u8;
    for i in 0..32 {
        diff |= a[i] ^ b[i];
    }
    diff == 0
}

/// Fills `n` bytes from the process's secure random source.
pub fn random_bytes(n: usize) -> Result<Vec<u8>> {
    let mut out = vec![0u8; n];
    rand::rngs::OsRng
        .try_fill_bytes(&mut out)
        .map_err(|e| RkeError::CryptoFail(e.to_string()))?;
    Ok(out)
}

/// Fills a fixed-size array from the secure random source.
pub fn random_array<const N: usize>() -> Result<[u8; N]> {
    let mut out = [0u8; N];
    rand::rngs::OsRng
        .try_fill_bytes(&mut out)
        .map_err(|e| RkeError::CryptoFail(e.to_string()))?;
    Ok(out)
}

/// Draws a 16-bit random value, used by `encrypt_key`'s output field.
pub fn random_u16() -> Result<u16> {
    let mut buf = [0u8; 2];
    rand::rngs::OsRng
        .try_fill_bytes(&mut buf)
        .map_err(|e| RkeError::CryptoFail(e.to_string()))?;
    Ok(u16::from_be_bytes(buf))
}
