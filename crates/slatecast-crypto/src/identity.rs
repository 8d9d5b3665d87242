//! Messaging identity keys
//!
//! Each wallet owns one long-term Ed25519 keypair used as its pub-sub
//! identity: the public half is the address counterparties encrypt to,
//! the secret half signs every published event. Public keys travel as
//! 64-char lowercase hex; the secret half is hex-encoded only to pass
//! through the vault's authenticated encryption.

use ed25519_dalek::{Signature, Signer, SigningKey, Verifier as _, VerifyingKey};
use rand::rngs::OsRng;
use zeroize::ZeroizeOnDrop;

use crate::error::CryptoError;

/// 32-byte Ed25519 public key, lowercase hex on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct IdentityPublicKey(pub [u8; 32]);

impl IdentityPublicKey {
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    pub fn from_hex(s: &str) -> Result<Self, CryptoError> {
        let bytes = hex::decode(s)?;
        let arr: [u8; 32] = bytes
            .try_into()
            .map_err(|_| CryptoError::InvalidKey("public key must be 32 bytes".into()))?;
        Ok(Self(arr))
    }

    /// Verify a 64-byte Ed25519 signature over `msg`.
    pub fn verify(&self, msg: &[u8], sig_bytes: &[u8]) -> Result<(), CryptoError> {
        let vk = VerifyingKey::from_bytes(&self.0)
            .map_err(|e| CryptoError::InvalidKey(e.to_string()))?;
        let sig = Signature::from_bytes(
            sig_bytes
                .try_into()
                .map_err(|_| CryptoError::InvalidKey("signature must be 64 bytes".into()))?,
        );
        vk.verify(msg, &sig)
            .map_err(|_| CryptoError::SignatureVerification)
    }
}

/// Long-term identity signing key.  Drop clears memory via ZeroizeOnDrop.
#[derive(ZeroizeOnDrop)]
pub struct IdentityKeypair {
    #[zeroize(skip)]
    public: IdentityPublicKey,
    secret_bytes: [u8; 32],
}

impl IdentityKeypair {
    /// Generate a fresh random keypair from the OS RNG.
    pub fn generate() -> Self {
        let signing_key = SigningKey::generate(&mut OsRng);
        let public = IdentityPublicKey(signing_key.verifying_key().to_bytes());
        Self {
            public,
            secret_bytes: signing_key.to_bytes(),
        }
    }

    /// Reconstruct a keypair from the hex-encoded secret stored in the vault.
    /// The public half is always re-derived, never stored independently.
    pub fn from_secret_hex(s: &str) -> Result<Self, CryptoError> {
        let bytes = hex::decode(s.trim())?;
        let arr: [u8; 32] = bytes
            .try_into()
            .map_err(|_| CryptoError::InvalidKey("secret key must be 32 bytes".into()))?;
        let signing_key = SigningKey::from_bytes(&arr);
        let public = IdentityPublicKey(signing_key.verifying_key().to_bytes());
        Ok(Self {
            public,
            secret_bytes: arr,
        })
    }

    /// Hex encoding of the secret half — the plaintext the vault protects.
    pub fn secret_hex(&self) -> String {
        hex::encode(self.secret_bytes)
    }

    pub fn secret_bytes(&self) -> &[u8; 32] {
        &self.secret_bytes
    }

    pub fn public(&self) -> &IdentityPublicKey {
        &self.public
    }

    /// Sign arbitrary bytes; returns the 64-byte raw Ed25519 signature.
    pub fn sign(&self, msg: &[u8]) -> [u8; 64] {
        SigningKey::from_bytes(&self.secret_bytes)
            .sign(msg)
            .to_bytes()
    }
}
