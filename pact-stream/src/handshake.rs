#![forbid(unsafe_code)]

use tracing::debug;
use zeroize::Zeroize;

use pact_crypto::kdf::hkdf_two;
use pact_crypto::pattern::HandshakePattern;
use pact_crypto::{CipherState, HandshakeState, Keypair, NoisePublicKey};

use crate::nametag::{MessageNametag, MessageNametagBuffer};
use crate::padding::{pad, unpad};
use crate::payload::PayloadV2;
use crate::{Error, Result};

/// Salt label for deriving the two directional nametag secrets at
/// finalization. Wire constant: both ends must agree.
const NAMETAG_SECRETS_IKM: &[u8] = b"nametag-secrets";

/// Step-by-step handshake driver.
///
/// Wraps the token interpreter with everything a transport message needs:
/// protocol-id stamping, PKCS#7 padding of the application payload, the
/// per-step nametag as extra associated data, and the final split into the
/// secure channel. One call to [`Handshake::write_step`] or
/// [`Handshake::read_step`] per declared pattern message.
pub struct Handshake {
    state: HandshakeState,
}

impl Handshake {
    pub fn new(
        pattern: HandshakePattern,
        initiator: bool,
        static_key: Option<Keypair>,
        ephemeral_key: Option<Keypair>,
        psk: Vec<u8>,
        pre_message_keys: &[NoisePublicKey],
    ) -> Result<Self> {
        let state = HandshakeState::new(
            pattern,
            initiator,
            static_key,
            ephemeral_key,
            psk,
            pre_message_keys,
        )?;
        Ok(Self { state })
    }

    /// All declared messages processed.
    pub fn is_complete(&self) -> bool {
        self.state.message_index() >= self.state.message_count()
    }

    pub fn is_writing(&self) -> bool {
        self.state.is_writing()
    }

    /// Nametag both sides expect on the *next* handshake message, derived
    /// from the current chain/transcript snapshot.
    pub fn next_nametag(&self) -> MessageNametag {
        self.state.to_message_nametag()
    }

    /// Produce the payload for the current (writing) step. Returns `None`
    /// once the pattern is exhausted; calling again is harmless.
    pub fn write_step(
        &mut self,
        nametag: MessageNametag,
        transport_message: &[u8],
    ) -> Result<Option<PayloadV2>> {
        if self.is_complete() {
            debug!("write_step called after completion");
            return Ok(None);
        }
        if !self.state.is_writing() {
            return Err(Error::handshake("not our turn to write"));
        }
        let protocol_id = self.state.pattern().protocol_id()?.as_u8();
        let handshake_keys = self.state.write_tokens()?;
        let padded = pad(transport_message);
        let ciphertext = self.state.encrypt_transport(&padded, &nametag)?;
        self.state.advance();
        Ok(Some(PayloadV2 {
            message_nametag: nametag,
            protocol_id,
            handshake_keys,
            transport_message: ciphertext,
        }))
    }

    /// Consume the peer's payload for the current (reading) step and
    /// recover its application message.
    ///
    /// A nametag mismatch is reported before any state is touched, so the
    /// caller may keep waiting for the right message and retry.
    pub fn read_step(
        &mut self,
        expected_nametag: MessageNametag,
        payload: &PayloadV2,
    ) -> Result<Option<Vec<u8>>> {
        if self.is_complete() {
            debug!("read_step called after completion");
            return Ok(None);
        }
        if self.state.is_writing() {
            return Err(Error::handshake("not our turn to read"));
        }
        if payload.message_nametag != expected_nametag {
            return Err(Error::NametagMismatch {
                expected: expected_nametag,
                actual: payload.message_nametag,
            });
        }
        self.state.read_tokens(&payload.handshake_keys)?;
        let padded = self
            .state
            .decrypt_transport(&payload.transport_message, &expected_nametag)?;
        let message = unpad(&padded)?;
        self.state.advance();
        Ok(Some(message))
    }

    /// Short confirmation string both parties display once the transcript
    /// is bound (after the second message): the first 8 bytes of `h` as a
    /// big-endian integer, zero-padded to 20 decimal digits, first 5 kept.
    pub fn authcode(&self) -> String {
        let h = self.state.handshake_hash();
        let mut prefix = [0u8; 8];
        prefix.copy_from_slice(&h[..8]);
        let digits = format!("{:020}", u64::from_be_bytes(prefix));
        digits[..5].to_string()
    }

    /// Handshake hash snapshot for channel binding.
    pub fn handshake_hash(&self) -> [u8; 32] {
        *self.state.handshake_hash()
    }

    /// Peer static key, once a pattern message has carried it.
    pub fn remote_static(&self) -> Option<[u8; 32]> {
        self.state.remote_static()
    }

    /// Consume the completed handshake into the secure channel: two
    /// directional cipher states and two nametag windows seeded from
    /// direction-specific secrets.
    pub fn finalize(self) -> Result<HandshakeResult> {
        if !self.is_complete() {
            return Err(Error::handshake("pattern messages still pending"));
        }
        let (cs1, cs2) = self.state.split();
        let (mut nms1, mut nms2) = hkdf_two(self.state.chaining_key(), NAMETAG_SECRETS_IKM);
        let rs = self
            .state
            .remote_static()
            .ok_or_else(|| Error::handshake("remote static never learned"))?;
        let h = *self.state.handshake_hash();

        // The initiator transmits on the first split half and tags its
        // messages with the second secret; the responder mirrors this.
        let result = if self.state.initiator() {
            HandshakeResult {
                cs_outbound: cs1,
                cs_inbound: cs2,
                nametags_outbound: MessageNametagBuffer::new(Some(nms2)),
                nametags_inbound: MessageNametagBuffer::new(Some(nms1)),
                rs,
                h,
            }
        } else {
            HandshakeResult {
                cs_outbound: cs2,
                cs_inbound: cs1,
                nametags_outbound: MessageNametagBuffer::new(Some(nms1)),
                nametags_inbound: MessageNametagBuffer::new(Some(nms2)),
                rs,
                h,
            }
        };
        nms1.zeroize();
        nms2.zeroize();
        debug!(initiator = self.state.initiator(), "handshake finalized");
        Ok(result)
    }
}

impl core::fmt::Debug for Handshake {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Handshake").field("state", &self.state).finish()
    }
}

/// The secure channel produced by [`Handshake::finalize`].
///
/// Each direction advances its cipher-state nonce and its nametag counter
/// in lockstep: message number `k` carries nametag `k` and is sealed with
/// nonce `k`. That invariant is what lets a receiver that skips lost
/// messages jump its nonce forward and keep decrypting.
pub struct HandshakeResult {
    pub cs_outbound: CipherState,
    pub cs_inbound: CipherState,
    pub nametags_outbound: MessageNametagBuffer,
    pub nametags_inbound: MessageNametagBuffer,
    /// Peer's long-term static key, for out-of-band channel binding.
    pub rs: [u8; 32],
    /// Final handshake hash, for out-of-band channel binding.
    pub h: [u8; 32],
}

impl HandshakeResult {
    /// Seal an application message for the peer: pop the next outbound
    /// nametag, use it as associated data, and wrap the ciphertext in a
    /// transport-only envelope (protocol id 0).
    pub fn write_message(&mut self, data: &[u8]) -> Result<PayloadV2> {
        // Peek first: a failed seal (e.g. nonce exhaustion) must not burn
        // the tag, so repeated failures leave the channel state stable.
        let nametag = self.nametags_outbound.first();
        let ciphertext = self.cs_outbound.encrypt_with_ad(&nametag, data)?;
        let _ = self.nametags_outbound.pop();
        Ok(PayloadV2::transport_only(nametag, ciphertext))
    }

    /// Open an inbound envelope.
    ///
    /// The nametag is checked first: `NametagNotFound` and
    /// `NametagOutOfOrder` surface untouched so the caller can wait or
    /// resynchronize with [`Self::skip_inbound`]. Only a successful
    /// decrypt advances the window and the nonce.
    pub fn read_message(&mut self, payload: &PayloadV2) -> Result<Vec<u8>> {
        self.nametags_inbound.check_nametag(&payload.message_nametag)?;
        let plaintext = self
            .cs_inbound
            .decrypt_with_ad(&payload.message_nametag, &payload.transport_message)?;
        let _ = self.nametags_inbound.pop();
        Ok(plaintext)
    }

    /// Give up on `n` lost inbound messages: slide the nametag window and
    /// advance the inbound nonce by the same amount, restoring the
    /// nametag/nonce lockstep for the next message.
    pub fn skip_inbound(&mut self, n: usize) {
        self.nametags_inbound.delete(n);
        let mut nonce = self.cs_inbound.nonce();
        for _ in 0..n {
            nonce.increment();
        }
        self.cs_inbound.set_nonce(nonce);
    }
}

impl core::fmt::Debug for HandshakeResult {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("HandshakeResult")
            .field("cs_outbound", &self.cs_outbound)
            .field("cs_inbound", &self.cs_inbound)
            .field("rs", &hex::encode(self.rs))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nametag::to_message_nametag;
    use pact_crypto::pattern::{WAKU_PAIRING, XX};

    fn pair(pattern: HandshakePattern) -> Result<(Handshake, Handshake)> {
        match pattern.name {
            n if n == WAKU_PAIRING.name => {
                let bob_e = Keypair::generate();
                let pre = [NoisePublicKey::plaintext(bob_e.public())];
                let a = Handshake::new(
                    pattern,
                    true,
                    Some(Keypair::generate()),
                    None,
                    Vec::new(),
                    &pre,
                )?;
                let b = Handshake::new(
                    pattern,
                    false,
                    Some(Keypair::generate()),
                    Some(bob_e),
                    Vec::new(),
                    &pre,
                )?;
                Ok((a, b))
            }
            _ => {
                let a = Handshake::new(
                    pattern,
                    true,
                    Some(Keypair::generate()),
                    None,
                    Vec::new(),
                    &[],
                )?;
                let b = Handshake::new(
                    pattern,
                    false,
                    Some(Keypair::generate()),
                    None,
                    Vec::new(),
                    &[],
                )?;
                Ok((a, b))
            }
        }
    }

    fn complete(a: &mut Handshake, b: &mut Handshake, first_tag: MessageNametag) -> Result<()> {
        let mut tag = first_tag;
        while !a.is_complete() || !b.is_complete() {
            let (w, r) = if a.is_writing() { (&mut *a, &mut *b) } else { (&mut *b, &mut *a) };
            let payload = w
                .write_step(tag, b"payload")?
                .ok_or_else(|| Error::handshake("unexpected completion"))?;
            let got = r
                .read_step(tag, &payload)?
                .ok_or_else(|| Error::handshake("unexpected completion"))?;
            assert_eq!(got, b"payload");
            if !a.is_complete() {
                tag = a.next_nametag();
                assert_eq!(tag, b.next_nametag());
            }
        }
        Ok(())
    }

    #[test]
    fn pairing_driver_reaches_secure_channel() -> Result<()> {
        let (mut a, mut b) = pair(WAKU_PAIRING)?;
        complete(&mut a, &mut b, to_message_nametag(b"qr-nametag"))?;
        assert_eq!(a.authcode(), b.authcode());
        let mut ra = a.finalize()?;
        let mut rb = b.finalize()?;
        assert_eq!(ra.h, rb.h);

        // Both directions carry traffic.
        let env = ra.write_message(b"from-alice")?;
        assert_eq!(rb.read_message(&env)?, b"from-alice");
        let env = rb.write_message(b"from-bob")?;
        assert_eq!(ra.read_message(&env)?, b"from-bob");
        Ok(())
    }

    #[test]
    fn nametag_mismatch_is_recoverable() -> Result<()> {
        let (mut a, mut b) = pair(XX)?;
        let tag = to_message_nametag(b"expected");
        let payload = a
            .write_step(tag, b"hello")?
            .ok_or_else(|| Error::handshake("missing payload"))?;
        let wrong = to_message_nametag(b"something-else");
        assert!(matches!(
            b.read_step(wrong, &payload),
            Err(Error::NametagMismatch { .. })
        ));
        // The same payload is accepted once the expectation matches.
        let got = b.read_step(tag, &payload)?;
        assert_eq!(got.as_deref(), Some(&b"hello"[..]));
        Ok(())
    }

    #[test]
    fn dropped_messages_are_skippable() -> Result<()> {
        let (mut a, mut b) = pair(WAKU_PAIRING)?;
        complete(&mut a, &mut b, to_message_nametag(b"t"))?;
        let mut ra = a.finalize()?;
        let mut rb = b.finalize()?;

        let _lost = ra.write_message(b"m1")?;
        let m2 = ra.write_message(b"m2")?;
        match rb.read_message(&m2) {
            Err(Error::NametagOutOfOrder { skipped }) => {
                assert_eq!(skipped, 1);
                rb.skip_inbound(skipped);
            }
            other => panic!("expected out-of-order, got {other:?}"),
        }
        assert_eq!(rb.read_message(&m2)?, b"m2");
        Ok(())
    }

    #[test]
    fn finalize_requires_completion() -> Result<()> {
        let (a, _b) = pair(XX)?;
        assert!(matches!(a.finalize(), Err(Error::Handshake(_))));
        Ok(())
    }

    #[test]
    fn steps_after_completion_are_inert() -> Result<()> {
        let (mut a, mut b) = pair(XX)?;
        complete(&mut a, &mut b, to_message_nametag(b""))?;
        assert!(a.write_step(to_message_nametag(b""), b"late")?.is_none());
        let empty = PayloadV2::transport_only(to_message_nametag(b""), Vec::new());
        assert!(b.read_step(to_message_nametag(b""), &empty)?.is_none());
        Ok(())
    }
}
