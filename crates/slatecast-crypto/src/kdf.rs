//! Key derivation
//!
//! `vault_key_from_passphrase` — Argon2id, derives the 32-byte key that
//! encrypts the on-disk vault files (session token, relay identity).
//!
//! The parameters are fixed: the same (passphrase, salt) pair must produce
//! the same key for the lifetime of a wallet's files.

use argon2::{Argon2, Params, Version};
use zeroize::ZeroizeOnDrop;

use crate::error::CryptoError;

pub const SALT_LEN: usize = 16;
pub const KEY_LEN: usize = 32;

/// 32-byte vault key derived from a wallet passphrase. Zeroized on drop.
#[derive(ZeroizeOnDrop)]
pub struct DerivedKey(pub [u8; KEY_LEN]);

/// Argon2id parameters — tuned for interactive (CLI) use.
fn argon2_params() -> Params {
    Params::new(
        64 * 1024,     // m_cost: 64 MiB
        3,             // t_cost: 3 iterations
        1,             // p_cost: 1 thread
        Some(KEY_LEN), // output len
    )
    .expect("Static Argon2 params are always valid")
}

/// Derive a vault key from a passphrase + 16-byte salt.
/// The salt is stored alongside the vault files (not secret).
pub fn vault_key_from_passphrase(
    passphrase: &[u8],
    salt: &[u8; SALT_LEN],
) -> Result<DerivedKey, CryptoError> {
    let argon2 = Argon2::new(argon2::Algorithm::Argon2id, Version::V0x13, argon2_params());
    let mut output = [0u8; KEY_LEN];
    argon2
        .hash_password_into(passphrase, salt, &mut output)
        .map_err(|e| CryptoError::KeyDerivation(e.to_string()))?;
    Ok(DerivedKey(output))
}

/// Generate a fresh random 16-byte salt (call once on first run; persist it).
pub fn generate_salt() -> [u8; SALT_LEN] {
    use rand::RngCore;
    let mut salt = [0u8; SALT_LEN];
    rand::rngs::OsRng.fill_bytes(&mut salt);
    salt
}
