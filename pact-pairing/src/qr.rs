#![forbid(unsafe_code)]

use base64::engine::general_purpose::URL_SAFE;
use base64::Engine;

use crate::{Error, Result};

/// The value carried by the pairing QR code: application coordinates, the
/// responder's ephemeral key, and its commitment to the static key it will
/// reveal during the handshake.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PairingQr {
    pub application_name: String,
    pub application_version: String,
    pub shard_id: String,
    pub ephemeral_public_key: [u8; 32],
    pub committed_static_key: [u8; 32],
}

impl PairingQr {
    /// Colon-separated, each field base64url with padding.
    pub fn serialize(&self) -> String {
        [
            URL_SAFE.encode(self.application_name.as_bytes()),
            URL_SAFE.encode(self.application_version.as_bytes()),
            URL_SAFE.encode(self.shard_id.as_bytes()),
            URL_SAFE.encode(self.ephemeral_public_key),
            URL_SAFE.encode(self.committed_static_key),
        ]
        .join(":")
    }

    /// Parse a scanned string; anything but exactly 5 well-formed fields
    /// is rejected.
    pub fn deserialize(input: &str) -> Result<Self> {
        let fields: Vec<&str> = input.split(':').collect();
        if fields.len() != 5 {
            return Err(Error::invalid_qr(format!(
                "expected 5 fields, got {}",
                fields.len()
            )));
        }
        let text = |idx: usize, what: &str| -> Result<String> {
            let raw = URL_SAFE
                .decode(fields[idx])
                .map_err(|e| Error::invalid_qr(format!("{what}: {e}")))?;
            String::from_utf8(raw).map_err(|_| Error::invalid_qr(format!("{what}: not utf-8")))
        };
        let key = |idx: usize, what: &str| -> Result<[u8; 32]> {
            let raw = URL_SAFE
                .decode(fields[idx])
                .map_err(|e| Error::invalid_qr(format!("{what}: {e}")))?;
            raw.try_into()
                .map_err(|_| Error::invalid_qr(format!("{what}: not 32 bytes")))
        };
        Ok(Self {
            application_name: text(0, "application name")?,
            application_version: text(1, "application version")?,
            shard_id: text(2, "shard id")?,
            ephemeral_public_key: key(3, "ephemeral key")?,
            committed_static_key: key(4, "committed static key")?,
        })
    }

    /// Pub/sub channel this pairing meets on.
    pub fn content_topic(&self) -> String {
        format!(
            "/{}/{}/{}/proto",
            self.application_name, self.application_version, self.shard_id
        )
    }
}
