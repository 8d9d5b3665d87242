//! ECDH conversation keys between two messaging identities.
//!
//! References:
//!   - RFC 7748 (X25519): <https://datatracker.ietf.org/doc/html/rfc7748>
//!   - RFC 5869 (HKDF):  <https://datatracker.ietf.org/doc/html/rfc5869>
//!
//! The identity keys are Ed25519; for Diffie-Hellman they are converted to
//! X25519 (secret: clamped SHA-512 expansion, mirroring what ed25519-dalek
//! does internally; public: birational map to Curve25519). The raw shared
//! point then goes through HKDF-SHA256 with a domain-separation label.
//!
//! Symmetry invariant: conversation_key(A_secret, B_public) equals
//! conversation_key(B_secret, A_public) — both directions of a direct
//! message use the same key.

use hkdf::Hkdf;
use sha2::Sha256;
use x25519_dalek::{PublicKey as X25519Public, StaticSecret};
use zeroize::Zeroize;

use crate::error::CryptoError;
use crate::identity::{IdentityKeypair, IdentityPublicKey};

/// Convert an Ed25519 signing key (32 bytes) to an X25519 static secret.
pub fn ed25519_secret_to_x25519(ed_secret: &[u8; 32]) -> StaticSecret {
    use sha2::{Digest, Sha512};
    let mut h = Sha512::digest(ed_secret);
    // Clamp as per RFC 7748 §5
    h[0] &= 248;
    h[31] &= 127;
    h[31] |= 64;
    let mut key = [0u8; 32];
    key.copy_from_slice(&h[..32]);
    h.as_mut_slice().zeroize();
    StaticSecret::from(key)
}

/// Convert an Ed25519 verifying key (public, 32 bytes) to an X25519 public key.
pub fn ed25519_pub_to_x25519(ed_pub: &[u8; 32]) -> Result<X25519Public, CryptoError> {
    use curve25519_dalek::edwards::CompressedEdwardsY;
    let compressed = CompressedEdwardsY::from_slice(ed_pub)
        .map_err(|_| CryptoError::InvalidKey("invalid Ed25519 public key".into()))?;
    let point = compressed
        .decompress()
        .ok_or_else(|| CryptoError::InvalidKey("Ed25519 public key decompression failed".into()))?;
    Ok(X25519Public::from(point.to_montgomery().to_bytes()))
}

/// Derive the 32-byte symmetric key shared by `local` and `remote`.
pub fn conversation_key(
    local: &IdentityKeypair,
    remote: &IdentityPublicKey,
) -> Result<[u8; 32], CryptoError> {
    let secret = ed25519_secret_to_x25519(local.secret_bytes());
    let public = ed25519_pub_to_x25519(&remote.0)?;
    let shared = secret.diffie_hellman(&public);

    let hk = Hkdf::<Sha256>::new(Some(b"slatecast-dm-v1"), shared.as_bytes());
    let mut key = [0u8; 32];
    hk.expand(b"conversation-key", &mut key)
        .map_err(|e| CryptoError::KeyDerivation(e.to_string()))?;
    Ok(key)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conversation_key_is_symmetric() {
        let alice = IdentityKeypair::generate();
        let bob = IdentityKeypair::generate();
        let k_ab = conversation_key(&alice, bob.public()).unwrap();
        let k_ba = conversation_key(&bob, alice.public()).unwrap();
        assert_eq!(k_ab, k_ba);
    }

    #[test]
    fn distinct_pairs_get_distinct_keys() {
        let alice = IdentityKeypair::generate();
        let bob = IdentityKeypair::generate();
        let carol = IdentityKeypair::generate();
        let k_ab = conversation_key(&alice, bob.public()).unwrap();
        let k_ac = conversation_key(&alice, carol.public()).unwrap();
        assert_ne!(k_ab, k_ac);
    }
}
