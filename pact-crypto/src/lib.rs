//! Pact cryptography engine (unsafe-forbid).
//! - AEAD: ChaCha20-Poly1305 wrapper with zeroizing keys
//! - KDF: HKDF-SHA256 chaining, SHA-256 helpers, public-key commitments
//! - DH: X25519 keypairs and shared-secret computation
//! - Noise framework: Nonce, CipherState, SymmetricState, HandshakeState
//!   and the static handshake pattern tables they interpret
#![forbid(unsafe_code)]

pub mod aead;
pub mod cipher_state;
pub mod dh;
pub mod handshake_state;
pub mod kdf;
pub mod nonce;
pub mod pattern;
pub mod public_key;
pub mod symmetric_state;

pub use cipher_state::CipherState;
pub use dh::Keypair;
pub use handshake_state::HandshakeState;
pub use nonce::Nonce;
pub use pattern::{HandshakePattern, MessageDirection, MessagePattern, Token};
pub use public_key::NoisePublicKey;
pub use symmetric_state::SymmetricState;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// AEAD tag mismatch; the cipher state is left untouched.
    #[error("authentication failure")]
    AuthenticationFailure,
    /// The nonce counter reached its cap; the session must be terminated.
    #[error("nonce exhausted")]
    NonceExhausted,
    #[error("invalid pattern: {0}")]
    InvalidPattern(String),
    #[error("invalid key: {0}")]
    InvalidKey(String),
    /// A previous fatal error left the handshake unusable.
    #[error("handshake aborted by previous failure")]
    HandshakeAborted,
}

pub type Result<T, E = Error> = core::result::Result<T, E>;
