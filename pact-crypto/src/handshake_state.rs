#![forbid(unsafe_code)]

use tracing::warn;
use zeroize::Zeroize;

use crate::cipher_state::CipherState;
use crate::dh::{Keypair, KEY_LEN};
use crate::pattern::{HandshakePattern, MessageDirection, Token};
use crate::public_key::NoisePublicKey;
use crate::symmetric_state::SymmetricState;
use crate::{Error, Result};

/// Pattern interpreter. Walks the declared (pre-)message token runs,
/// drives DH and key derivation through the embedded [`SymmetricState`],
/// and produces/consumes the [`NoisePublicKey`] lists that travel inside
/// handshake payloads.
///
/// Any token-level failure (missing key, bad flag, AEAD failure on an
/// encrypted key) poisons the state: all later calls are rejected.
pub struct HandshakeState {
    s: Option<Keypair>,
    e: Option<Keypair>,
    rs: Option<[u8; KEY_LEN]>,
    re: Option<[u8; KEY_LEN]>,
    ss: SymmetricState,
    initiator: bool,
    pattern: HandshakePattern,
    msg_idx: usize,
    psk: Vec<u8>,
    poisoned: bool,
}

impl HandshakeState {
    /// Build the state and process the pattern's pre-messages.
    ///
    /// `pre_message_keys` lists the out-of-band public keys in declaration
    /// order; the side that owns a pre-message key checks it against its own
    /// keypair, the other side adopts it as the remote key. Only `e` and `s`
    /// tokens are legal in pre-messages.
    pub fn new(
        pattern: HandshakePattern,
        initiator: bool,
        static_key: Option<Keypair>,
        ephemeral_key: Option<Keypair>,
        psk: Vec<u8>,
        pre_message_keys: &[NoisePublicKey],
    ) -> Result<Self> {
        let mut hs = Self {
            s: static_key,
            e: ephemeral_key,
            rs: None,
            re: None,
            ss: SymmetricState::new(pattern.name),
            initiator,
            pattern,
            msg_idx: 0,
            psk,
            poisoned: false,
        };
        hs.process_pre_messages(pre_message_keys)?;
        Ok(hs)
    }

    fn process_pre_messages(&mut self, keys: &[NoisePublicKey]) -> Result<()> {
        let mut supplied = keys.iter();
        for pre in self.pattern.pre_messages {
            // The writer of a pre-message is the party that owns the key.
            let local = match pre.direction {
                MessageDirection::Right => self.initiator,
                MessageDirection::Left => !self.initiator,
            };
            for token in pre.tokens {
                let pk = supplied
                    .next()
                    .ok_or_else(|| Error::InvalidPattern("missing pre-message key".into()))?;
                if pk.flag != 0 || pk.bytes.len() != KEY_LEN {
                    return Err(Error::InvalidKey("pre-message key must be plaintext".into()));
                }
                let mut raw = [0u8; KEY_LEN];
                raw.copy_from_slice(&pk.bytes);
                match token {
                    Token::E => {
                        if local {
                            let own = self.local_e()?.public();
                            if own != raw {
                                return Err(Error::InvalidKey(
                                    "pre-message ephemeral does not match own key".into(),
                                ));
                            }
                        } else {
                            self.re = Some(raw);
                        }
                    }
                    Token::S => {
                        if local {
                            let own = self.local_s()?.public();
                            if own != raw {
                                return Err(Error::InvalidKey(
                                    "pre-message static does not match own key".into(),
                                ));
                            }
                        } else {
                            self.rs = Some(raw);
                        }
                    }
                    other => {
                        return Err(Error::InvalidPattern(format!(
                            "token {other:?} not allowed in pre-message"
                        )))
                    }
                }
                self.ss.mix_hash(&raw);
                if self.pattern.is_psk() {
                    self.ss.mix_key(&raw);
                }
            }
        }
        if supplied.next().is_some() {
            return Err(Error::InvalidPattern("unused pre-message key".into()));
        }
        Ok(())
    }

    /// Whether the local party writes the message at the current index.
    pub fn is_writing(&self) -> bool {
        match self.current_direction() {
            Some(MessageDirection::Right) => self.initiator,
            Some(MessageDirection::Left) => !self.initiator,
            None => false,
        }
    }

    fn current_direction(&self) -> Option<MessageDirection> {
        self.pattern.messages.get(self.msg_idx).map(|m| m.direction)
    }

    pub fn message_index(&self) -> usize {
        self.msg_idx
    }

    pub fn message_count(&self) -> usize {
        self.pattern.messages.len()
    }

    pub fn pattern(&self) -> &HandshakePattern {
        &self.pattern
    }

    pub fn initiator(&self) -> bool {
        self.initiator
    }

    pub fn remote_static(&self) -> Option<[u8; KEY_LEN]> {
        self.rs
    }

    /// Advance to the next declared message. Called by the driver once the
    /// whole step (tokens + transport payload) has been processed.
    pub fn advance(&mut self) {
        self.msg_idx += 1;
    }

    /// Run the writing side of the current message pattern, producing the
    /// key list to place in the outgoing payload.
    pub fn write_tokens(&mut self) -> Result<Vec<NoisePublicKey>> {
        self.guard()?;
        match self.write_tokens_inner() {
            Ok(keys) => Ok(keys),
            Err(e) => Err(self.poison(e)),
        }
    }

    fn write_tokens_inner(&mut self) -> Result<Vec<NoisePublicKey>> {
        let tokens = self.current_tokens()?;
        let mut out = Vec::new();
        for token in tokens {
            match token {
                Token::E => {
                    let fresh = Keypair::generate();
                    let pub_bytes = fresh.public();
                    self.e = Some(fresh);
                    self.ss.mix_hash(&pub_bytes);
                    if self.pattern.is_psk() {
                        self.ss.mix_key(&pub_bytes);
                    }
                    out.push(NoisePublicKey::plaintext(pub_bytes));
                }
                Token::S => {
                    let pub_bytes = self.local_s()?.public();
                    let enc = self.ss.encrypt_and_hash(&pub_bytes, &[])?;
                    out.push(if enc.len() > KEY_LEN {
                        NoisePublicKey::encrypted(enc)
                    } else {
                        // Cipher state had no key yet; the bytes are plain.
                        NoisePublicKey::plaintext(pub_bytes)
                    });
                }
                dh => self.mix_dh_token(dh)?,
            }
        }
        Ok(out)
    }

    /// Run the reading side of the current message pattern, consuming the
    /// peer's key list head to tail.
    pub fn read_tokens(&mut self, keys: &[NoisePublicKey]) -> Result<()> {
        self.guard()?;
        match self.read_tokens_inner(keys) {
            Ok(()) => Ok(()),
            Err(e) => Err(self.poison(e)),
        }
    }

    fn read_tokens_inner(&mut self, keys: &[NoisePublicKey]) -> Result<()> {
        let tokens = self.current_tokens()?;
        let mut supplied = keys.iter();
        for token in tokens {
            match token {
                Token::E => {
                    let pk = Self::next_key(&mut supplied)?;
                    let raw = self.recover_key(pk)?;
                    if pk.flag == 0 {
                        self.ss.mix_hash(&raw);
                    }
                    self.re = Some(raw);
                    if self.pattern.is_psk() {
                        self.ss.mix_key(&raw);
                    }
                }
                Token::S => {
                    let pk = Self::next_key(&mut supplied)?;
                    // decrypt_and_hash degrades to mix_hash for plain keys.
                    let pt = self.ss.decrypt_and_hash(&pk.bytes, &[])?;
                    if pt.len() != KEY_LEN {
                        return Err(Error::InvalidKey("static key length".into()));
                    }
                    let mut raw = [0u8; KEY_LEN];
                    raw.copy_from_slice(&pt);
                    self.rs = Some(raw);
                }
                dh => self.mix_dh_token(dh)?,
            }
        }
        Ok(())
    }

    fn next_key<'a>(
        supplied: &mut core::slice::Iter<'a, NoisePublicKey>,
    ) -> Result<&'a NoisePublicKey> {
        supplied
            .next()
            .ok_or_else(|| Error::InvalidKey("handshake message is missing a key".into()))
    }

    /// Plain keys are used as-is; encrypted ones are opened through the
    /// transcript (accepted for `e` as an extension of the framework).
    fn recover_key(&mut self, pk: &NoisePublicKey) -> Result<[u8; KEY_LEN]> {
        let bytes = match pk.flag {
            0 => pk.bytes.clone(),
            1 => self.ss.decrypt_and_hash(&pk.bytes, &[])?,
            other => return Err(Error::InvalidKey(format!("unknown key flag {other}"))),
        };
        if bytes.len() != KEY_LEN {
            return Err(Error::InvalidKey("public key length".into()));
        }
        let mut raw = [0u8; KEY_LEN];
        raw.copy_from_slice(&bytes);
        Ok(raw)
    }

    fn mix_dh_token(&mut self, token: &Token) -> Result<()> {
        let shared = match token {
            Token::Ee => self.local_e()?.dh(&self.remote_e()?),
            Token::Es => {
                if self.initiator {
                    self.local_e()?.dh(&self.remote_s()?)
                } else {
                    self.local_s()?.dh(&self.remote_e()?)
                }
            }
            Token::Se => {
                if self.initiator {
                    self.local_s()?.dh(&self.remote_e()?)
                } else {
                    self.local_e()?.dh(&self.remote_s()?)
                }
            }
            Token::Ss => self.local_s()?.dh(&self.remote_s()?),
            Token::Psk => {
                if self.psk.len() != KEY_LEN {
                    return Err(Error::InvalidKey("psk must be 32 bytes".into()));
                }
                let psk = self.psk.clone();
                self.ss.mix_key_and_hash(&psk);
                return Ok(());
            }
            Token::E | Token::S => {
                return Err(Error::InvalidPattern("key token in DH position".into()))
            }
        };
        self.ss.mix_key(&shared);
        Ok(())
    }

    fn local_e(&self) -> Result<&Keypair> {
        self.e
            .as_ref()
            .ok_or_else(|| Error::InvalidKey("ephemeral key not set".into()))
    }

    fn local_s(&self) -> Result<&Keypair> {
        self.s
            .as_ref()
            .ok_or_else(|| Error::InvalidKey("static key not set".into()))
    }

    fn remote_e(&self) -> Result<[u8; KEY_LEN]> {
        self.re
            .ok_or_else(|| Error::InvalidKey("remote ephemeral not known".into()))
    }

    fn remote_s(&self) -> Result<[u8; KEY_LEN]> {
        self.rs
            .ok_or_else(|| Error::InvalidKey("remote static not known".into()))
    }

    fn current_tokens(&self) -> Result<&'static [Token]> {
        self.pattern
            .messages
            .get(self.msg_idx)
            .map(|m| m.tokens)
            .ok_or_else(|| Error::InvalidPattern("no message left in pattern".into()))
    }

    /// Encrypt the step's transport payload; `extra_ad` is appended to the
    /// transcript hash in the associated data.
    pub fn encrypt_transport(&mut self, plaintext: &[u8], extra_ad: &[u8]) -> Result<Vec<u8>> {
        self.guard()?;
        match self.ss.encrypt_and_hash(plaintext, extra_ad) {
            Ok(ct) => Ok(ct),
            Err(e) => Err(self.poison(e)),
        }
    }

    pub fn decrypt_transport(&mut self, ciphertext: &[u8], extra_ad: &[u8]) -> Result<Vec<u8>> {
        self.guard()?;
        match self.ss.decrypt_and_hash(ciphertext, extra_ad) {
            Ok(pt) => Ok(pt),
            Err(e) => Err(self.poison(e)),
        }
    }

    /// Nametag snapshot for the next handshake message.
    pub fn to_message_nametag(&self) -> [u8; 16] {
        self.ss.to_message_nametag()
    }

    pub fn chaining_key(&self) -> &[u8; 32] {
        self.ss.chaining_key()
    }

    pub fn handshake_hash(&self) -> &[u8; 32] {
        self.ss.handshake_hash()
    }

    /// Directional cipher states of the finished channel.
    pub fn split(&self) -> (CipherState, CipherState) {
        self.ss.split()
    }

    fn guard(&self) -> Result<()> {
        if self.poisoned {
            return Err(Error::HandshakeAborted);
        }
        Ok(())
    }

    fn poison(&mut self, e: Error) -> Error {
        warn!(pattern = self.pattern.name, msg_idx = self.msg_idx, error = %e,
              "handshake poisoned");
        self.poisoned = true;
        e
    }
}

impl Drop for HandshakeState {
    fn drop(&mut self) {
        self.psk.zeroize();
    }
}

impl core::fmt::Debug for HandshakeState {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("HandshakeState")
            .field("pattern", &self.pattern.name)
            .field("initiator", &self.initiator)
            .field("msg_idx", &self.msg_idx)
            .field("poisoned", &self.poisoned)
            .finish()
    }
}
