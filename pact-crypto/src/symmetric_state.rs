#![forbid(unsafe_code)]

use zeroize::Zeroize;

use crate::cipher_state::CipherState;
use crate::kdf::{hkdf_one, hkdf_three, hkdf_two, sha256, sha256_pair};
use crate::Result;

/// Chaining key + transcript hash + embedded cipher state. Every public
/// byte of the handshake is mixed into `h`; every DH output is ratcheted
/// into `ck`.
pub struct SymmetricState {
    ck: [u8; 32],
    h: [u8; 32],
    cs: CipherState,
}

impl SymmetricState {
    /// Initialize from the full protocol name: names up to 32 bytes are
    /// zero-padded into `h`, longer ones hashed; `ck` starts equal to `h`.
    pub fn new(protocol_name: &str) -> Self {
        let name = protocol_name.as_bytes();
        let h = if name.len() <= 32 {
            let mut padded = [0u8; 32];
            padded[..name.len()].copy_from_slice(name);
            padded
        } else {
            sha256(name)
        };
        Self {
            ck: h,
            h,
            cs: CipherState::new(),
        }
    }

    /// Ratchet a DH output (or other keying material) into the chain and
    /// install the derived key in a fresh cipher state.
    pub fn mix_key(&mut self, ikm: &[u8]) {
        let (ck, temp_k) = hkdf_two(&self.ck, ikm);
        self.ck = ck;
        self.cs = CipherState::with_key(temp_k);
    }

    /// Absorb public data into the transcript hash.
    pub fn mix_hash(&mut self, data: &[u8]) {
        self.h = sha256_pair(&self.h, data);
    }

    /// PSK rule: one HKDF call feeds the chain, the transcript, and a fresh
    /// cipher state at once.
    pub fn mix_key_and_hash(&mut self, ikm: &[u8]) {
        let (ck, temp_h, temp_k) = hkdf_three(&self.ck, ikm);
        self.ck = ck;
        self.mix_hash(&temp_h);
        self.cs = CipherState::with_key(temp_k);
    }

    /// Encrypt with `h || extra_ad` as associated data, then mix the
    /// ciphertext into the transcript.
    pub fn encrypt_and_hash(&mut self, plaintext: &[u8], extra_ad: &[u8]) -> Result<Vec<u8>> {
        let ad = [self.h.as_slice(), extra_ad].concat();
        let ct = self.cs.encrypt_with_ad(&ad, plaintext)?;
        self.mix_hash(&ct);
        Ok(ct)
    }

    /// Mirror of [`Self::encrypt_and_hash`]; the ciphertext (not the
    /// recovered plaintext) is what the transcript absorbs.
    pub fn decrypt_and_hash(&mut self, ciphertext: &[u8], extra_ad: &[u8]) -> Result<Vec<u8>> {
        let ad = [self.h.as_slice(), extra_ad].concat();
        let pt = self.cs.decrypt_with_ad(&ad, ciphertext)?;
        self.mix_hash(ciphertext);
        Ok(pt)
    }

    /// Derive the two directional cipher states of the finished channel,
    /// both starting at nonce 0.
    pub fn split(&self) -> (CipherState, CipherState) {
        let (k1, k2) = hkdf_two(&self.ck, &[]);
        (CipherState::with_key(k1), CipherState::with_key(k2))
    }

    /// 16-byte nametag snapshot of the current chain/transcript, used to
    /// address the next handshake message.
    pub fn to_message_nametag(&self) -> [u8; 16] {
        let out = hkdf_one(&self.ck, &self.h);
        let mut tag = [0u8; 16];
        tag.copy_from_slice(&out[..16]);
        tag
    }

    pub fn chaining_key(&self) -> &[u8; 32] {
        &self.ck
    }

    pub fn handshake_hash(&self) -> &[u8; 32] {
        &self.h
    }

    pub fn cipher_state(&self) -> &CipherState {
        &self.cs
    }
}

impl Drop for SymmetricState {
    fn drop(&mut self) {
        self.ck.zeroize();
    }
}

impl core::fmt::Debug for SymmetricState {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("SymmetricState")
            .field("h", &hex::encode(self.h))
            .field("cs", &self.cs)
            .finish()
    }
}
