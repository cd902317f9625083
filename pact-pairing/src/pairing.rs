#![forbid(unsafe_code)]

//! The pairing choreography over `Noise_WakuPairing_25519_ChaChaPoly_SHA256`.
//!
//! The responder shows a QR carrying its ephemeral key and a commitment to
//! its static key; three messages later both sides have opened each other's
//! commitments, confirmed a short authcode out of band, and hold a secure
//! channel. The whole exchange runs under one wall-clock timeout.

use async_trait::async_trait;
use rand::RngCore;
use tracing::{debug, info, trace, warn};

use pact_crypto::kdf::commit_public_key;
use pact_crypto::pattern::WAKU_PAIRING;
use pact_crypto::{Keypair, NoisePublicKey};
use pact_stream::nametag::MessageNametag;
use pact_stream::{Handshake, HandshakeResult, PayloadV2};

use crate::config::PairingConfig;
use crate::qr::PairingQr;
use crate::transport::{MessageReceiver, MessageSender, Subscription};
use crate::{Error, Result};

/// Everything the initiator needs out of band: the QR value itself plus
/// the random nametag addressing the first handshake message. The QR
/// proper stays at exactly 5 fields, so the nametag travels next to it.
#[derive(Clone, Debug)]
pub struct PairingInfo {
    pub qr: PairingQr,
    pub qr_message_nametag: MessageNametag,
}

/// Programmatic yes/no contract for the displayed authcode; the
/// human-interface flow behind it is out of scope.
#[async_trait]
pub trait AuthcodeConfirmer: Send + Sync {
    async fn confirm(&self, authcode: &str) -> bool;
}

/// Fixed answer, for demos and tests.
pub struct AutoConfirm(pub bool);

#[async_trait]
impl AuthcodeConfirmer for AutoConfirm {
    async fn confirm(&self, _authcode: &str) -> bool {
        self.0
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Role {
    Initiator,
    Responder,
}

/// One side of a device pairing in progress.
pub struct Pairing {
    role: Role,
    handshake: Handshake,
    config: PairingConfig,
    content_topic: String,
    qr_message_nametag: MessageNametag,
    /// Our 32-byte commitment randomness, revealed to open our commitment.
    opener: [u8; 32],
    /// `commit(our static, opener)`; the initiator transmits it in message 1.
    own_commitment: [u8; 32],
    /// The peer's commitment: from the QR (initiator) or message 1 (responder).
    peer_commitment: Option<[u8; 32]>,
}

fn random_bytes<const N: usize>() -> [u8; N] {
    let mut out = [0u8; N];
    rand::rngs::OsRng.fill_bytes(&mut out);
    out
}

impl Pairing {
    /// Responder side: mint the ephemeral key, commit to the static key,
    /// and produce the out-of-band [`PairingInfo`] to display as a QR.
    pub fn new_responder(
        config: PairingConfig,
        static_key: Keypair,
    ) -> Result<(Self, PairingInfo)> {
        let ephemeral = Keypair::generate();
        let opener = random_bytes::<32>();
        let own_commitment = commit_public_key(&static_key.public(), &opener);
        let qr = PairingQr {
            application_name: config.application_name.clone(),
            application_version: config.application_version.clone(),
            shard_id: config.shard_id.clone(),
            ephemeral_public_key: ephemeral.public(),
            committed_static_key: own_commitment,
        };
        let info = PairingInfo {
            qr: qr.clone(),
            qr_message_nametag: random_bytes::<16>(),
        };
        let pre = [NoisePublicKey::plaintext(ephemeral.public())];
        let handshake = Handshake::new(
            WAKU_PAIRING,
            false,
            Some(static_key),
            Some(ephemeral),
            Vec::new(),
            &pre,
        )?;
        let content_topic = qr.content_topic();
        debug!(topic = %content_topic, "responder pairing ready");
        Ok((
            Self {
                role: Role::Responder,
                handshake,
                config,
                content_topic,
                qr_message_nametag: info.qr_message_nametag,
                opener,
                own_commitment,
                peer_commitment: None,
            },
            info,
        ))
    }

    /// Initiator side: bootstrap from a scanned [`PairingInfo`].
    pub fn new_initiator(
        config: PairingConfig,
        static_key: Keypair,
        info: PairingInfo,
    ) -> Result<Self> {
        let opener = random_bytes::<32>();
        let own_commitment = commit_public_key(&static_key.public(), &opener);
        let pre = [NoisePublicKey::plaintext(info.qr.ephemeral_public_key)];
        let handshake = Handshake::new(
            WAKU_PAIRING,
            true,
            Some(static_key),
            None,
            Vec::new(),
            &pre,
        )?;
        let content_topic = info.qr.content_topic();
        debug!(topic = %content_topic, "initiator pairing ready");
        Ok(Self {
            role: Role::Initiator,
            handshake,
            config,
            content_topic,
            qr_message_nametag: info.qr_message_nametag,
            opener,
            own_commitment,
            peer_commitment: Some(info.qr.committed_static_key),
        })
    }

    /// Run the exchange to completion under the configured timeout.
    pub async fn execute(
        self,
        sender: &dyn MessageSender,
        receiver: &dyn MessageReceiver,
        confirmer: &dyn AuthcodeConfirmer,
    ) -> Result<PairedChannel> {
        let budget = self.config.timeout();
        match tokio::time::timeout(budget, self.run(sender, receiver, confirmer)).await {
            Ok(outcome) => outcome,
            Err(_) => Err(Error::PairingTimeout),
        }
    }

    async fn run(
        self,
        sender: &dyn MessageSender,
        receiver: &dyn MessageReceiver,
        confirmer: &dyn AuthcodeConfirmer,
    ) -> Result<PairedChannel> {
        let mut sub = receiver.subscribe(&self.content_topic).await?;
        match self.role {
            Role::Initiator => self.initiate(sender, &mut sub, confirmer).await,
            Role::Responder => self.respond(sender, &mut sub, confirmer).await,
        }
    }

    async fn initiate(
        mut self,
        sender: &dyn MessageSender,
        sub: &mut Subscription,
        confirmer: &dyn AuthcodeConfirmer,
    ) -> Result<PairedChannel> {
        // -> e, ee carrying our committed static key.
        self.write_and_send(sender, self.qr_message_nametag, self.own_commitment)
            .await?;

        // <- s, es carrying the responder's commitment opener.
        let tag2 = self.handshake.next_nametag();
        let opener = commitment_value(self.await_step(sub, tag2).await?)?;
        self.verify_peer_commitment(&opener)?;

        self.confirm_authcode(confirmer).await?;

        // -> s, se, ss revealing our own opener.
        let tag3 = self.handshake.next_nametag();
        self.write_and_send(sender, tag3, self.opener).await?;

        self.finish()
    }

    async fn respond(
        mut self,
        sender: &dyn MessageSender,
        sub: &mut Subscription,
        confirmer: &dyn AuthcodeConfirmer,
    ) -> Result<PairedChannel> {
        // -> e, ee: the transport message is the initiator's commitment.
        let commitment = commitment_value(self.await_step(sub, self.qr_message_nametag).await?)?;
        self.peer_commitment = Some(commitment);

        // <- s, es revealing our opener.
        let tag2 = self.handshake.next_nametag();
        self.write_and_send(sender, tag2, self.opener).await?;

        self.confirm_authcode(confirmer).await?;

        // -> s, se, ss: the initiator opens its commitment.
        let tag3 = self.handshake.next_nametag();
        let opener = commitment_value(self.await_step(sub, tag3).await?)?;
        self.verify_peer_commitment(&opener)?;

        self.finish()
    }

    async fn write_and_send(
        &mut self,
        sender: &dyn MessageSender,
        nametag: MessageNametag,
        transport_message: [u8; 32],
    ) -> Result<()> {
        let payload = self
            .handshake
            .write_step(nametag, &transport_message)?
            .ok_or_else(|| Error::protocol("pattern already exhausted"))?;
        sender
            .send(&self.content_topic, payload.serialize()?)
            .await
    }

    /// Wait for the step's message: undecodable envelopes and foreign
    /// nametags (including our own echoes on the shared topic) are skipped,
    /// everything else is fatal.
    async fn await_step(
        &mut self,
        sub: &mut Subscription,
        expected: MessageNametag,
    ) -> Result<Vec<u8>> {
        loop {
            let wire = sub.recv().await?;
            let payload = match PayloadV2::deserialize(&wire) {
                Ok(p) => p,
                Err(e) => {
                    warn!(error = %e, "dropping undecodable pairing message");
                    continue;
                }
            };
            match self.handshake.read_step(expected, &payload) {
                Ok(Some(message)) => return Ok(message),
                Ok(None) => return Err(Error::protocol("handshake already complete")),
                Err(pact_stream::Error::NametagMismatch { .. }) => {
                    trace!("foreign nametag, keep waiting");
                    continue;
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    fn verify_peer_commitment(&self, opener: &[u8; 32]) -> Result<()> {
        let rs = self
            .handshake
            .remote_static()
            .ok_or_else(|| Error::protocol("peer static not yet received"))?;
        let expected = self
            .peer_commitment
            .ok_or_else(|| Error::protocol("peer commitment not yet received"))?;
        if commit_public_key(&rs, opener) != expected {
            return Err(Error::CommitmentMismatch);
        }
        Ok(())
    }

    async fn confirm_authcode(&self, confirmer: &dyn AuthcodeConfirmer) -> Result<()> {
        let code = self.handshake.authcode();
        info!(role = ?self.role, code = %code, "awaiting authcode confirmation");
        if !confirmer.confirm(&code).await {
            return Err(Error::AuthcodeRejected);
        }
        Ok(())
    }

    fn finish(self) -> Result<PairedChannel> {
        let result = self.handshake.finalize()?;
        info!(role = ?self.role, topic = %self.content_topic, "pairing complete");
        Ok(PairedChannel {
            result,
            content_topic: self.content_topic,
        })
    }
}

fn commitment_value(message: Vec<u8>) -> Result<[u8; 32]> {
    message
        .try_into()
        .map_err(|_| Error::protocol("commitment value must be 32 bytes"))
}

/// The secure channel a finished pairing yields, bound to its content
/// topic. Encoding pops outbound nametags; decoding enforces the inbound
/// window.
pub struct PairedChannel {
    result: HandshakeResult,
    content_topic: String,
}

impl PairedChannel {
    pub fn content_topic(&self) -> &str {
        &self.content_topic
    }

    /// Peer's static key for out-of-band channel binding.
    pub fn remote_static(&self) -> [u8; 32] {
        self.result.rs
    }

    /// Final handshake hash for out-of-band channel binding.
    pub fn handshake_hash(&self) -> [u8; 32] {
        self.result.h
    }

    /// Seal `data` into wire bytes for this channel's topic.
    pub fn encode(&mut self, data: &[u8]) -> Result<Vec<u8>> {
        let payload = self.result.write_message(data)?;
        Ok(payload.serialize()?)
    }

    pub async fn send(&mut self, sender: &dyn MessageSender, data: &[u8]) -> Result<()> {
        let wire = self.encode(data)?;
        sender.send(&self.content_topic, wire).await
    }

    /// Strict decode: nametag diagnostics (`NametagNotFound`,
    /// `NametagOutOfOrder`) surface to the caller, who may wait or
    /// resynchronize with [`Self::skip_inbound`].
    pub fn decode(&mut self, wire: &[u8]) -> Result<Vec<u8>> {
        let payload = PayloadV2::deserialize(wire)?;
        Ok(self.result.read_message(&payload)?)
    }

    /// Suppressing decode for subscription loops: failures (our own
    /// echoes, replays, garbage) are logged and swallowed so the channel
    /// never becomes a decryption oracle.
    pub fn try_decode(&mut self, wire: &[u8]) -> Option<Vec<u8>> {
        match self.decode(wire) {
            Ok(message) => Some(message),
            Err(e) => {
                debug!(error = %e, "suppressing undecodable channel message");
                None
            }
        }
    }

    /// Abandon `n` lost inbound messages and realign the window.
    pub fn skip_inbound(&mut self, n: usize) {
        self.result.skip_inbound(n);
    }

    /// Next message on `sub` that this channel can address and decrypt;
    /// everything else (echoes, replays, garbage) is dropped quietly.
    pub async fn recv(&mut self, sub: &mut Subscription) -> Result<Vec<u8>> {
        loop {
            let wire = sub.recv().await?;
            if let Some(message) = self.try_decode(&wire) {
                return Ok(message);
            }
        }
    }
}

impl core::fmt::Debug for PairedChannel {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("PairedChannel")
            .field("content_topic", &self.content_topic)
            .finish()
    }
}
