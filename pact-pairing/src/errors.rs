#![forbid(unsafe_code)]

pub type Result<T, E = Error> = core::result::Result<T, E>;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// Secure-channel layer error from pact-stream
    #[error("stream: {0}")]
    Stream(#[from] pact_stream::Error),
    /// Cryptographic error from pact-crypto
    #[error("crypto: {0}")]
    Crypto(#[from] pact_crypto::Error),
    #[error("invalid qr: {0}")]
    InvalidQr(String),
    /// A static-key commitment failed to open; the pairing is aborted.
    #[error("commitment mismatch")]
    CommitmentMismatch,
    /// The user declined the displayed authcode.
    #[error("authcode rejected")]
    AuthcodeRejected,
    #[error("pairing timed out")]
    PairingTimeout,
    #[error("transport: {0}")]
    Transport(String),
    #[error("config: {0}")]
    Config(String),
    /// Peer deviated from the pairing choreography.
    #[error("pairing protocol: {0}")]
    Protocol(String),
}

impl Error {
    pub fn invalid_qr(msg: impl Into<String>) -> Self {
        Self::InvalidQr(msg.into())
    }

    pub fn transport(msg: impl Into<String>) -> Self {
        Self::Transport(msg.into())
    }

    pub fn protocol(msg: impl Into<String>) -> Self {
        Self::Protocol(msg.into())
    }
}

// Map TOML deserialization errors into the config error domain without
// adding a new variant
impl From<toml::de::Error> for Error {
    fn from(e: toml::de::Error) -> Self {
        Error::Config(e.to_string())
    }
}
