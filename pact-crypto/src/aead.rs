#![forbid(unsafe_code)]

use chacha20poly1305::aead::{Aead, NewAead, Payload};
use chacha20poly1305::{ChaCha20Poly1305, Key, Nonce};
use zeroize::Zeroize;

use crate::{Error, Result};

/// Poly1305 tag length appended to every ciphertext.
pub const TAG_LEN: usize = 16;

/// AEAD key (zeroized on drop)
#[derive(Clone)]
pub struct AeadKey(pub [u8; 32]);

impl Drop for AeadKey {
    fn drop(&mut self) {
        self.0.zeroize();
    }
}

/// ChaCha20-Poly1305 (IETF) wrapper used by every cipher state.
pub struct AeadCipher {
    key: AeadKey,
}

impl AeadCipher {
    pub fn new(key: AeadKey) -> Self {
        Self { key }
    }

    /// Encrypt `plaintext` under `nonce`/`aad`; returns ciphertext || tag.
    pub fn seal(&self, nonce: [u8; 12], aad: &[u8], plaintext: &[u8]) -> Result<Vec<u8>> {
        let cipher = ChaCha20Poly1305::new(Key::from_slice(&self.key.0));
        cipher
            .encrypt(
                Nonce::from_slice(&nonce),
                Payload {
                    msg: plaintext,
                    aad,
                },
            )
            .map_err(|_| Error::AuthenticationFailure)
    }

    /// Decrypt `ciphertext || tag`; any tag mismatch surfaces as
    /// [`Error::AuthenticationFailure`].
    pub fn open(&self, nonce: [u8; 12], aad: &[u8], ciphertext: &[u8]) -> Result<Vec<u8>> {
        let cipher = ChaCha20Poly1305::new(Key::from_slice(&self.key.0));
        cipher
            .decrypt(
                Nonce::from_slice(&nonce),
                Payload {
                    msg: ciphertext,
                    aad,
                },
            )
            .map_err(|_| Error::AuthenticationFailure)
    }
}
