#![forbid(unsafe_code)]

use rand::RngCore;
use x25519_dalek::{PublicKey as XPublic, StaticSecret as XSecret};
use zeroize::Zeroize;

/// X25519 key length (public and secret).
pub const KEY_LEN: usize = 32;

/// X25519 keypair. The secret half never leaves this type; shared secrets
/// are computed through [`Keypair::dh`].
#[derive(Clone)]
pub struct Keypair {
    public: [u8; KEY_LEN],
    secret: [u8; KEY_LEN],
}

impl Keypair {
    pub fn generate() -> Self {
        let mut seed = [0u8; KEY_LEN];
        rand::rngs::OsRng.fill_bytes(&mut seed);
        Self::from_seed(seed)
    }

    pub fn from_seed(seed: [u8; KEY_LEN]) -> Self {
        let sk = XSecret::from(seed);
        let pk = XPublic::from(&sk);
        Self {
            public: pk.to_bytes(),
            secret: sk.to_bytes(),
        }
    }

    pub fn public(&self) -> [u8; KEY_LEN] {
        self.public
    }

    /// X25519 between our secret and `peer`. A low-order peer point yields
    /// the all-zero output, which feeds the chain without panicking.
    pub fn dh(&self, peer: &[u8; KEY_LEN]) -> [u8; KEY_LEN] {
        let sk = XSecret::from(self.secret);
        sk.diffie_hellman(&XPublic::from(*peer)).to_bytes()
    }
}

impl Drop for Keypair {
    fn drop(&mut self) {
        self.secret.zeroize();
    }
}

impl core::fmt::Debug for Keypair {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Keypair")
            .field("public", &hex::encode(self.public))
            .finish()
    }
}
