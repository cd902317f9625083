//! Pact device pairing.
//! - QR bootstrap value: 5-field colon/base64url serialization plus the
//!   out-of-band first-message nametag
//! - Content-topic derivation for the pairing's pub/sub channel
//! - Transport collaborator contracts and an in-memory topic bus
//! - The pairing choreography: commitment exchange, authcode confirmation,
//!   timeout, and finalization into the secure channel
#![forbid(unsafe_code)]

pub mod config;
pub mod errors;
pub mod pairing;
pub mod qr;
pub mod transport;

pub use config::PairingConfig;
pub use errors::{Error, Result};
pub use pairing::{AuthcodeConfirmer, AutoConfirm, PairedChannel, Pairing, PairingInfo};
pub use qr::PairingQr;
pub use transport::{MemoryTransport, MessageReceiver, MessageSender, Subscription};
