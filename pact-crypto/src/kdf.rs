#![forbid(unsafe_code)]

use hkdf::Hkdf;
use sha2::{Digest, Sha256};

/// SHA-256 of `data`.
pub fn sha256(data: &[u8]) -> [u8; 32] {
    let mut d = Sha256::new();
    d.update(data);
    d.finalize().into()
}

/// SHA-256 over the concatenation of two byte strings.
pub fn sha256_pair(a: &[u8], b: &[u8]) -> [u8; 32] {
    let mut d = Sha256::new();
    d.update(a);
    d.update(b);
    d.finalize().into()
}

/// HKDF-SHA256 with `salt` and `ikm`, expanded with empty info into `out`.
/// The Noise chain never asks for more than three 32-byte blocks, so the
/// expand bound cannot be exceeded.
pub fn hkdf_chain(salt: &[u8], ikm: &[u8], out: &mut [u8]) {
    let hk = Hkdf::<Sha256>::new(Some(salt), ikm);
    #[allow(clippy::expect_used)]
    hk.expand(&[], out).expect("hkdf output length");
}

/// One chained 32-byte output.
pub fn hkdf_one(salt: &[u8], ikm: &[u8]) -> [u8; 32] {
    let mut out = [0u8; 32];
    hkdf_chain(salt, ikm, &mut out);
    out
}

/// Two chained 32-byte outputs.
pub fn hkdf_two(salt: &[u8], ikm: &[u8]) -> ([u8; 32], [u8; 32]) {
    let mut out = [0u8; 64];
    hkdf_chain(salt, ikm, &mut out);
    let mut a = [0u8; 32];
    let mut b = [0u8; 32];
    a.copy_from_slice(&out[..32]);
    b.copy_from_slice(&out[32..]);
    (a, b)
}

/// Three chained 32-byte outputs.
pub fn hkdf_three(salt: &[u8], ikm: &[u8]) -> ([u8; 32], [u8; 32], [u8; 32]) {
    let mut out = [0u8; 96];
    hkdf_chain(salt, ikm, &mut out);
    let mut a = [0u8; 32];
    let mut b = [0u8; 32];
    let mut c = [0u8; 32];
    a.copy_from_slice(&out[..32]);
    b.copy_from_slice(&out[32..64]);
    c.copy_from_slice(&out[64..]);
    (a, b, c)
}

/// Commitment to a public key: `SHA-256(pk || r)` where `r` is 32 bytes of
/// fresh randomness revealed later to open the commitment.
pub fn commit_public_key(pk: &[u8; 32], r: &[u8; 32]) -> [u8; 32] {
    sha256_pair(pk, r)
}
