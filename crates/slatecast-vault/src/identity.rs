//! Relay identity persistence.
//!
//! Each wallet owns exactly one messaging keypair, sealed to
//! `<dataDir>/<wallet>.nostr` under a key derived from
//! wallet name + slatepack address + password.
//!
//! Historically a blob that failed to decrypt was silently replaced with a
//! brand-new identity, which conflates "first use" with "wrong password"
//! and can destroy a live identity. `load` therefore reports the failure
//! modes distinctly, and `load_or_create` — which keeps the
//! always-return-a-usable-identity behavior — tells the caller *why* it
//! minted a new keypair via [`IdentityOrigin`], so the replacement is a
//! visible event rather than a silent one.

use slatecast_crypto::identity::IdentityKeypair;
use slatecast_crypto::kdf::{vault_key_from_passphrase, DerivedKey};

use crate::error::VaultError;
use crate::paths::DataDir;
use crate::salt;
use crate::vault::{self, Purpose};

/// How `load_or_create` obtained the identity it returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdentityOrigin {
    /// The stored blob decrypted cleanly.
    Opened,
    /// No blob existed yet; a fresh identity was minted.
    Created,
    /// A blob existed but could not be used; it was REPLACED.
    Regenerated(RegenerateReason),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegenerateReason {
    /// Authentication failure: wrong password, or the blob was tampered
    /// with / truncated. Indistinguishable by construction.
    BadDecrypt,
    /// The blob decrypted but did not contain a valid secret key encoding.
    BadEncoding,
}

fn identity_key(
    dir: &DataDir,
    wallet: &str,
    address: &str,
    password: &str,
) -> Result<DerivedKey, VaultError> {
    let salt = salt::load_or_create(dir)?;
    let passphrase = format!("{wallet}{address}{password}");
    Ok(vault_key_from_passphrase(passphrase.as_bytes(), &salt)?)
}

/// Load the stored identity, reporting every failure mode distinctly:
/// `MissingSecret` (never created), `Authentication` (wrong key /
/// tampering), `Malformed` (decrypted but undecodable).
pub fn load(
    dir: &DataDir,
    wallet: &str,
    address: &str,
    password: &str,
) -> Result<IdentityKeypair, VaultError> {
    let key = identity_key(dir, wallet, address, password)?;
    let plaintext = vault::open(dir, wallet, Purpose::RelayIdentity, &key)?;
    let encoded = std::str::from_utf8(&plaintext)
        .map_err(|_| VaultError::Malformed("identity blob is not UTF-8".into()))?;
    IdentityKeypair::from_secret_hex(encoded)
        .map_err(|e| VaultError::Malformed(format!("identity secret: {e}")))
}

/// Load the wallet's identity, minting and persisting a new one when the
/// stored blob is missing or unusable. Always returns a usable identity;
/// the origin says whether an existing blob was replaced.
///
/// I/O errors still propagate — regeneration only answers for the blob
/// being absent or unreadable, not for the disk being gone.
pub fn load_or_create(
    dir: &DataDir,
    wallet: &str,
    address: &str,
    password: &str,
) -> Result<(IdentityKeypair, IdentityOrigin), VaultError> {
    let key = identity_key(dir, wallet, address, password)?;
    let origin = match vault::open(dir, wallet, Purpose::RelayIdentity, &key) {
        Ok(plaintext) => {
            let decoded = std::str::from_utf8(&plaintext)
                .ok()
                .and_then(|s| IdentityKeypair::from_secret_hex(s).ok());
            match decoded {
                Some(pair) => return Ok((pair, IdentityOrigin::Opened)),
                None => IdentityOrigin::Regenerated(RegenerateReason::BadEncoding),
            }
        }
        Err(VaultError::MissingSecret(_)) => IdentityOrigin::Created,
        Err(VaultError::Authentication) => {
            IdentityOrigin::Regenerated(RegenerateReason::BadDecrypt)
        }
        Err(err) => return Err(err),
    };

    if let IdentityOrigin::Regenerated(reason) = origin {
        tracing::warn!(
            wallet,
            ?reason,
            "stored relay identity is unusable; replacing it with a new keypair"
        );
    }

    let pair = IdentityKeypair::generate();
    vault::seal(
        dir,
        wallet,
        Purpose::RelayIdentity,
        &key,
        pair.secret_hex().as_bytes(),
    )?;
    Ok((pair, origin))
}
