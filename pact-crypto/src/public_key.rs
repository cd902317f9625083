#![forbid(unsafe_code)]

use crate::aead::TAG_LEN;
use crate::dh::KEY_LEN;
use crate::{Error, Result};

/// Serialized length of a plaintext public key (without the flag byte).
pub const PLAIN_KEY_LEN: usize = KEY_LEN;
/// Serialized length of an AEAD-encrypted public key (without the flag).
pub const ENCRYPTED_KEY_LEN: usize = KEY_LEN + TAG_LEN;

/// A public key as it travels inside a handshake message: either the raw
/// 32-byte X coordinate (`flag = 0`) or its AEAD ciphertext plus tag
/// (`flag = 1`, 48 bytes).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NoisePublicKey {
    pub flag: u8,
    pub bytes: Vec<u8>,
}

impl NoisePublicKey {
    pub fn plaintext(pk: [u8; KEY_LEN]) -> Self {
        Self {
            flag: 0,
            bytes: pk.to_vec(),
        }
    }

    pub fn encrypted(ciphertext: Vec<u8>) -> Self {
        Self {
            flag: 1,
            bytes: ciphertext,
        }
    }

    pub fn is_encrypted(&self) -> bool {
        self.flag == 1
    }

    /// Flag byte followed by the key bytes.
    pub fn serialize(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(1 + self.bytes.len());
        out.push(self.flag);
        out.extend_from_slice(&self.bytes);
        out
    }

    pub fn serialized_len(&self) -> usize {
        1 + self.bytes.len()
    }

    /// Parse a whole serialized key, rejecting unknown flags and lengths
    /// inconsistent with the flag.
    pub fn deserialize(data: &[u8]) -> Result<Self> {
        let (&flag, rest) = data
            .split_first()
            .ok_or_else(|| Error::InvalidKey("empty public key".into()))?;
        let expected = match flag {
            0 => PLAIN_KEY_LEN,
            1 => ENCRYPTED_KEY_LEN,
            other => return Err(Error::InvalidKey(format!("unknown key flag {other}"))),
        };
        if rest.len() != expected {
            return Err(Error::InvalidKey(format!(
                "key length {} does not match flag {flag}",
                rest.len()
            )));
        }
        Ok(Self {
            flag,
            bytes: rest.to_vec(),
        })
    }
}
