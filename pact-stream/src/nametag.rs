#![forbid(unsafe_code)]

use std::collections::VecDeque;

use hkdf::Hkdf;
use sha2::Sha256;
use zeroize::Zeroize;

use crate::{Error, Result};

/// Length of a per-message nametag.
pub const MESSAGE_NAMETAG_LEN: usize = 16;

/// 16-byte tag addressing one message on the lossy transport.
pub type MessageNametag = [u8; MESSAGE_NAMETAG_LEN];

/// How many upcoming nametags each side keeps expectable at once.
pub const MESSAGE_NAMETAG_BUFFER_SIZE: usize = 50;

/// Truncate or zero-extend arbitrary bytes into a nametag (handshake
/// messages address themselves with externally chosen tags).
pub fn to_message_nametag(bytes: &[u8]) -> MessageNametag {
    let mut tag = [0u8; MESSAGE_NAMETAG_LEN];
    let n = bytes.len().min(MESSAGE_NAMETAG_LEN);
    tag[..n].copy_from_slice(&bytes[..n]);
    tag
}

/// Sliding window of expected per-message nametags.
///
/// Tags are derived from a post-handshake secret and a monotonically
/// increasing counter, so both ends can regenerate the same sequence
/// independently. The head is the next tag the owner expects inbound (or
/// emits outbound). Without a secret the buffer is inert: it pops all-zero
/// tags and matches nothing, which is only legal before finalization.
pub struct MessageNametagBuffer {
    buffer: VecDeque<MessageNametag>,
    counter: u64,
    secret: Option<[u8; 32]>,
}

impl MessageNametagBuffer {
    pub fn new(secret: Option<[u8; 32]>) -> Self {
        let mut buf = Self {
            buffer: VecDeque::with_capacity(MESSAGE_NAMETAG_BUFFER_SIZE),
            counter: 0,
            secret,
        };
        if buf.secret.is_some() {
            for _ in 0..MESSAGE_NAMETAG_BUFFER_SIZE {
                let tag = buf.derive_next();
                buf.buffer.push_back(tag);
            }
        } else {
            buf.buffer
                .resize(MESSAGE_NAMETAG_BUFFER_SIZE, [0u8; MESSAGE_NAMETAG_LEN]);
        }
        buf
    }

    /// Tag number `counter` is `HKDF-SHA256(salt = secret, ikm = counter
    /// as 8-byte LE)` truncated to 16 bytes.
    fn derive_next(&mut self) -> MessageNametag {
        let mut tag = [0u8; MESSAGE_NAMETAG_LEN];
        if let Some(secret) = &self.secret {
            let hk = Hkdf::<Sha256>::new(Some(secret), &self.counter.to_le_bytes());
            #[allow(clippy::expect_used)]
            hk.expand(&[], &mut tag).expect("hkdf output length");
        }
        self.counter += 1;
        tag
    }

    /// Head tag as it would be popped next.
    pub fn first(&self) -> MessageNametag {
        self.buffer.front().copied().unwrap_or_default()
    }

    /// Take the head tag, slide the window and grow one fresh tail entry.
    /// Senders call this right before transmitting; receivers right after
    /// a successful decrypt.
    pub fn pop(&mut self) -> MessageNametag {
        let head = self.buffer.pop_front().unwrap_or_default();
        let tail = if self.secret.is_some() {
            self.derive_next()
        } else {
            [0u8; MESSAGE_NAMETAG_LEN]
        };
        self.buffer.push_back(tail);
        head
    }

    /// Locate `tag` in the window: position 0 is in-order delivery, a
    /// positive position means earlier messages were lost or reordered.
    pub fn check_nametag(&self, tag: &MessageNametag) -> Result<()> {
        if self.secret.is_none() {
            return Err(Error::NametagNotFound);
        }
        match self.buffer.iter().position(|t| t == tag) {
            None => Err(Error::NametagNotFound),
            Some(0) => Ok(()),
            Some(skipped) => Err(Error::NametagOutOfOrder { skipped }),
        }
    }

    /// Drop `n` entries from the head (giving up on those messages) and
    /// regenerate `n` fresh tail entries.
    pub fn delete(&mut self, n: usize) {
        for _ in 0..n {
            let _ = self.pop();
        }
    }
}

impl Drop for MessageNametagBuffer {
    fn drop(&mut self) {
        if let Some(secret) = &mut self.secret {
            secret.zeroize();
        }
    }
}

impl core::fmt::Debug for MessageNametagBuffer {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("MessageNametagBuffer")
            .field("counter", &self.counter)
            .field("has_secret", &self.secret.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn both_sides_derive_the_same_sequence() {
        let mut a = MessageNametagBuffer::new(Some([7u8; 32]));
        let mut b = MessageNametagBuffer::new(Some([7u8; 32]));
        for _ in 0..(3 * MESSAGE_NAMETAG_BUFFER_SIZE) {
            assert_eq!(a.pop(), b.pop());
        }
    }

    #[test]
    fn in_order_tags_match_at_the_head() {
        let mut tx = MessageNametagBuffer::new(Some([1u8; 32]));
        let rx = MessageNametagBuffer::new(Some([1u8; 32]));
        let tag = tx.pop();
        assert!(rx.check_nametag(&tag).is_ok());
    }

    #[test]
    fn skipped_tags_report_their_distance() {
        let mut tx = MessageNametagBuffer::new(Some([2u8; 32]));
        let mut rx = MessageNametagBuffer::new(Some([2u8; 32]));
        let _m1 = tx.pop();
        let m2 = tx.pop();
        assert!(matches!(
            rx.check_nametag(&m2),
            Err(Error::NametagOutOfOrder { skipped: 1 })
        ));
        // Resynchronize past the lost message.
        rx.delete(1);
        assert!(rx.check_nametag(&m2).is_ok());
    }

    #[test]
    fn window_overrun_is_not_found() {
        let mut tx = MessageNametagBuffer::new(Some([3u8; 32]));
        let rx = MessageNametagBuffer::new(Some([3u8; 32]));
        for _ in 0..MESSAGE_NAMETAG_BUFFER_SIZE {
            let _ = tx.pop();
        }
        let beyond = tx.pop();
        assert!(matches!(
            rx.check_nametag(&beyond),
            Err(Error::NametagNotFound)
        ));
    }

    #[test]
    fn secretless_buffer_is_inert() {
        let mut buf = MessageNametagBuffer::new(None);
        let zero = buf.pop();
        assert_eq!(zero, [0u8; MESSAGE_NAMETAG_LEN]);
        // Even the all-zero tag must not match.
        assert!(matches!(
            buf.check_nametag(&zero),
            Err(Error::NametagNotFound)
        ));
    }
}
