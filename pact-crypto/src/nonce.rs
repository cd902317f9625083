#![forbid(unsafe_code)]

use crate::{Error, Result};

/// Wire length of a ChaCha20-Poly1305 (IETF) nonce.
pub const NONCE_LEN: usize = 12;

/// First counter value that is no longer usable. The cap is a protocol
/// choice carried over from the wire format: the counter is serialized as a
/// 32-bit little-endian value, so 2^32 messages exhaust a cipher state.
pub const NONCE_MAX: u64 = 1 << 32;

/// 64-bit message counter with a hard 2^32 cap.
///
/// Counter values `0..NONCE_MAX` are usable; once the counter reaches
/// `NONCE_MAX` every subsequent use fails with [`Error::NonceExhausted`]
/// and the state stays stable across repeated failures.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Nonce(u64);

impl Nonce {
    pub fn new() -> Self {
        Self(0)
    }

    /// Seed an explicit counter value (used to restore state and by the
    /// exhaustion tests).
    pub fn from_counter(n: u64) -> Self {
        Self(n)
    }

    pub fn value(&self) -> u64 {
        self.0
    }

    /// Fails once the counter has reached the cap.
    pub fn assert_valid(&self) -> Result<()> {
        if self.0 >= NONCE_MAX {
            return Err(Error::NonceExhausted);
        }
        Ok(())
    }

    pub fn increment(&mut self) {
        self.0 = self.0.saturating_add(1);
    }

    /// 12-byte wire form: the 4 low counter bytes little-endian, then 8
    /// zero bytes (IETF construction with the 32-bit block counter zeroed).
    pub fn to_bytes(self) -> [u8; NONCE_LEN] {
        let mut out = [0u8; NONCE_LEN];
        out[..4].copy_from_slice(&(self.0 as u32).to_le_bytes());
        out
    }
}
