#![forbid(unsafe_code)]

use bytes::Buf;
use pact_crypto::public_key::{ENCRYPTED_KEY_LEN, PLAIN_KEY_LEN};
use pact_crypto::NoisePublicKey;

use crate::nametag::{MessageNametag, MESSAGE_NAMETAG_LEN};
use crate::{Error, Result};

/// Hard cap on the serialized handshake-key section: its length travels in
/// a single byte.
pub const MAX_HANDSHAKE_KEYS_LEN: usize = 255;

/// Versioned wire envelope for both handshake and post-handshake traffic.
///
/// Layout: nametag (16) | protocol id (1) | key-section length (1) |
/// serialized keys | transport length (8, LE) | transport message.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PayloadV2 {
    pub message_nametag: MessageNametag,
    pub protocol_id: u8,
    pub handshake_keys: Vec<NoisePublicKey>,
    pub transport_message: Vec<u8>,
}

impl PayloadV2 {
    /// Envelope without handshake keys, as used post-handshake.
    pub fn transport_only(message_nametag: MessageNametag, transport_message: Vec<u8>) -> Self {
        Self {
            message_nametag,
            protocol_id: 0,
            handshake_keys: Vec::new(),
            transport_message,
        }
    }

    fn keys_len(&self) -> usize {
        self.handshake_keys
            .iter()
            .map(NoisePublicKey::serialized_len)
            .sum()
    }

    pub fn serialize(&self) -> Result<Vec<u8>> {
        let keys_len = self.keys_len();
        if keys_len > MAX_HANDSHAKE_KEYS_LEN {
            return Err(Error::HandshakeTooLarge);
        }
        let mut out = Vec::with_capacity(
            MESSAGE_NAMETAG_LEN + 2 + keys_len + 8 + self.transport_message.len(),
        );
        out.extend_from_slice(&self.message_nametag);
        out.push(self.protocol_id);
        out.push(keys_len as u8);
        for key in &self.handshake_keys {
            out.extend_from_slice(&key.serialize());
        }
        out.extend_from_slice(&(self.transport_message.len() as u64).to_le_bytes());
        out.extend_from_slice(&self.transport_message);
        Ok(out)
    }

    /// Parse a whole wire envelope, validating every key flag and that all
    /// declared lengths fit the input exactly.
    pub fn deserialize(data: &[u8]) -> Result<Self> {
        let mut buf = data;
        if buf.remaining() < MESSAGE_NAMETAG_LEN + 2 {
            return Err(Error::malformed("header truncated"));
        }
        let mut message_nametag = [0u8; MESSAGE_NAMETAG_LEN];
        buf.copy_to_slice(&mut message_nametag);
        let protocol_id = buf.get_u8();
        let keys_len = buf.get_u8() as usize;
        if buf.remaining() < keys_len {
            return Err(Error::malformed("key section truncated"));
        }
        let mut keys_section = &buf[..keys_len];
        buf.advance(keys_len);
        let mut handshake_keys = Vec::new();
        while keys_section.has_remaining() {
            let body_len = match keys_section[0] {
                0 => PLAIN_KEY_LEN,
                1 => ENCRYPTED_KEY_LEN,
                other => {
                    return Err(Error::Crypto(pact_crypto::Error::InvalidKey(format!(
                        "unknown key flag {other}"
                    ))))
                }
            };
            if keys_section.remaining() < 1 + body_len {
                return Err(Error::malformed("handshake key truncated"));
            }
            handshake_keys.push(NoisePublicKey::deserialize(&keys_section[..1 + body_len])?);
            keys_section.advance(1 + body_len);
        }
        if buf.remaining() < 8 {
            return Err(Error::malformed("transport length truncated"));
        }
        let transport_len = buf.get_u64_le() as usize;
        if buf.remaining() != transport_len {
            return Err(Error::malformed("transport message length mismatch"));
        }
        let transport_message = buf[..transport_len].to_vec();
        Ok(Self {
            message_nametag,
            protocol_id,
            handshake_keys,
            transport_message,
        })
    }
}
