//! Pact secure channel layer.
//! - PKCS#7 handshake-payload padding (fixed 248-byte blocks)
//! - PayloadV2 wire framing (nametag, protocol id, key section, ciphertext)
//! - MessageNametagBuffer: per-message tags over a lossy pub/sub transport
//! - Handshake driver: step-by-step pattern execution, authcode derivation,
//!   finalization into the post-handshake secure channel
#![forbid(unsafe_code)]

pub mod errors;
pub mod handshake;
pub mod nametag;
pub mod padding;
pub mod payload;

pub use errors::{Error, Result};
pub use handshake::{Handshake, HandshakeResult};
pub use nametag::{MessageNametag, MessageNametagBuffer, MESSAGE_NAMETAG_LEN};
pub use payload::PayloadV2;
