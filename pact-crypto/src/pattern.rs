#![forbid(unsafe_code)]

use crate::{Error, Result};

/// Handshake tokens as defined by the Noise framework.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Token {
    E,
    S,
    Ee,
    Es,
    Se,
    Ss,
    Psk,
}

/// Message direction: `Right` flows initiator → responder.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MessageDirection {
    Right,
    Left,
}

/// One (pre-)message of a pattern: a direction plus an ordered token run.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MessagePattern {
    pub direction: MessageDirection,
    pub tokens: &'static [Token],
}

const fn msg(direction: MessageDirection, tokens: &'static [Token]) -> MessagePattern {
    MessagePattern { direction, tokens }
}

/// A named handshake pattern: pre-messages (keys known out of band) and the
/// declared message sequence interpreted by the handshake state.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct HandshakePattern {
    pub name: &'static str,
    pub pre_messages: &'static [MessagePattern],
    pub messages: &'static [MessagePattern],
}

use MessageDirection::{Left, Right};
use Token::{Ee, Es, Psk, Se, Ss, E, S};

/// K1K1: both static keys known beforehand.
pub const K1K1: HandshakePattern = HandshakePattern {
    name: "Noise_K1K1_25519_ChaChaPoly_SHA256",
    pre_messages: &[msg(Right, &[S]), msg(Left, &[S])],
    messages: &[
        msg(Right, &[E]),
        msg(Left, &[E, Ee, Es]),
        msg(Right, &[Se]),
    ],
};

/// XK1: the responder's static key known beforehand.
pub const XK1: HandshakePattern = HandshakePattern {
    name: "Noise_XK1_25519_ChaChaPoly_SHA256",
    pre_messages: &[msg(Left, &[S])],
    messages: &[
        msg(Right, &[E]),
        msg(Left, &[E, Ee, Es]),
        msg(Right, &[S, Se]),
    ],
};

/// XX: both statics transmitted during the handshake.
pub const XX: HandshakePattern = HandshakePattern {
    name: "Noise_XX_25519_ChaChaPoly_SHA256",
    pre_messages: &[],
    messages: &[
        msg(Right, &[E]),
        msg(Left, &[E, Ee, S, Es]),
        msg(Right, &[S, Se]),
    ],
};

/// XX with a pre-shared key mixed at position 0.
pub const XXPSK0: HandshakePattern = HandshakePattern {
    name: "Noise_XXpsk0_25519_ChaChaPoly_SHA256",
    pre_messages: &[],
    messages: &[
        msg(Right, &[Psk, E]),
        msg(Left, &[E, Ee, S, Es]),
        msg(Right, &[S, Se]),
    ],
};

/// Device pairing: the responder's ephemeral key is known to the initiator
/// out of band (QR), statics are exchanged under commitment.
pub const WAKU_PAIRING: HandshakePattern = HandshakePattern {
    name: "Noise_WakuPairing_25519_ChaChaPoly_SHA256",
    pre_messages: &[msg(Left, &[E])],
    messages: &[
        msg(Right, &[E, Ee]),
        msg(Left, &[S, Es]),
        msg(Right, &[S, Se, Ss]),
    ],
};

/// Protocol identifier carried in the payload header (one byte on the wire).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum ProtocolId {
    None = 0,
    K1K1 = 10,
    Xk1 = 11,
    Xx = 12,
    Xxpsk0 = 13,
    WakuPairing = 14,
    /// Reserved for post-handshake traffic; the shipped channel uses 0.
    ChaChaPoly = 30,
}

impl ProtocolId {
    pub fn as_u8(self) -> u8 {
        self as u8
    }
}

impl HandshakePattern {
    /// Wire protocol id for this pattern.
    pub fn protocol_id(&self) -> Result<ProtocolId> {
        match self.name {
            n if n == K1K1.name => Ok(ProtocolId::K1K1),
            n if n == XK1.name => Ok(ProtocolId::Xk1),
            n if n == XX.name => Ok(ProtocolId::Xx),
            n if n == XXPSK0.name => Ok(ProtocolId::Xxpsk0),
            n if n == WAKU_PAIRING.name => Ok(ProtocolId::WakuPairing),
            other => Err(Error::InvalidPattern(format!("unknown pattern {other}"))),
        }
    }

    /// PSK variants mix every pre-message key into the chain as well.
    pub fn is_psk(&self) -> bool {
        self.name.contains("psk")
    }
}
