#![forbid(unsafe_code)]

use crate::nametag::MessageNametag;

pub type Result<T, E = Error> = core::result::Result<T, E>;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// Cryptographic error from pact-crypto
    #[error("crypto: {0}")]
    Crypto(#[from] pact_crypto::Error),
    /// PKCS#7 validation failed on a handshake transport payload.
    #[error("invalid padding")]
    InvalidPadding,
    /// The serialized handshake-key section would not fit its length byte.
    #[error("handshake key section exceeds 255 bytes")]
    HandshakeTooLarge,
    #[error("malformed payload: {0}")]
    MalformedPayload(String),
    /// Recoverable during handshake reads: the peer message carried a
    /// different nametag than the step expected.
    #[error("nametag mismatch: expected {}, got {}", hex::encode(expected), hex::encode(actual))]
    NametagMismatch {
        expected: MessageNametag,
        actual: MessageNametag,
    },
    /// The tag is not inside the expected window; the message is either a
    /// replay or more than a window size ahead.
    #[error("nametag not found in the expected window")]
    NametagNotFound,
    /// The tag sits `skipped` positions ahead of the window head; callers
    /// resynchronize by dropping the skipped entries.
    #[error("nametag found {skipped} positions ahead")]
    NametagOutOfOrder { skipped: usize },
    /// Driver misuse or premature finalization.
    #[error("handshake: {0}")]
    Handshake(String),
}

impl Error {
    pub fn handshake(msg: impl Into<String>) -> Self {
        Self::Handshake(msg.into())
    }

    pub fn malformed(msg: impl Into<String>) -> Self {
        Self::MalformedPayload(msg.into())
    }
}
