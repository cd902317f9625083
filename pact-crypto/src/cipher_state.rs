#![forbid(unsafe_code)]

use zeroize::Zeroize;

use crate::aead::{AeadCipher, AeadKey};
use crate::nonce::Nonce;
use crate::Result;

/// AEAD state: a 32-byte key (all-zero means "no key yet") and the message
/// counter. Encrypts and authenticates handshake payloads and, after the
/// split, every message on one direction of the secure channel.
#[derive(Clone)]
pub struct CipherState {
    k: [u8; 32],
    n: Nonce,
}

impl Default for CipherState {
    fn default() -> Self {
        Self::new()
    }
}

impl CipherState {
    /// Empty-key state; encrypt/decrypt pass data through unchanged.
    pub fn new() -> Self {
        Self {
            k: [0u8; 32],
            n: Nonce::new(),
        }
    }

    pub fn with_key(k: [u8; 32]) -> Self {
        Self { k, n: Nonce::new() }
    }

    /// All-zero keys are the "empty" sentinel.
    pub fn has_key(&self) -> bool {
        self.k != [0u8; 32]
    }

    pub fn key(&self) -> &[u8; 32] {
        &self.k
    }

    pub fn nonce(&self) -> Nonce {
        self.n
    }

    /// Restore an explicit counter (state resumption and exhaustion tests).
    pub fn set_nonce(&mut self, n: Nonce) {
        self.n = n;
    }

    /// AEAD-encrypt `plaintext` with `ad`, advancing the nonce on success.
    /// With no key this is the identity and the nonce does not move.
    pub fn encrypt_with_ad(&mut self, ad: &[u8], plaintext: &[u8]) -> Result<Vec<u8>> {
        if !self.has_key() {
            return Ok(plaintext.to_vec());
        }
        self.n.assert_valid()?;
        let ct = AeadCipher::new(AeadKey(self.k)).seal(self.n.to_bytes(), ad, plaintext)?;
        self.n.increment();
        Ok(ct)
    }

    /// AEAD-decrypt, advancing the nonce only on success; a failed tag check
    /// leaves the counter untouched so the state is not burned by garbage.
    pub fn decrypt_with_ad(&mut self, ad: &[u8], ciphertext: &[u8]) -> Result<Vec<u8>> {
        if !self.has_key() {
            return Ok(ciphertext.to_vec());
        }
        self.n.assert_valid()?;
        let pt = AeadCipher::new(AeadKey(self.k)).open(self.n.to_bytes(), ad, ciphertext)?;
        self.n.increment();
        Ok(pt)
    }
}

impl Drop for CipherState {
    fn drop(&mut self) {
        self.k.zeroize();
    }
}

impl core::fmt::Debug for CipherState {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("CipherState")
            .field("has_key", &self.has_key())
            .field("nonce", &self.n.value())
            .finish()
    }
}
