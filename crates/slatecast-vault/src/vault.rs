//! Sealed blob persistence — one file per (wallet, purpose).
//!
//! A blob is the AEAD wire format from slatecast-crypto (nonce || ct+tag);
//! the purpose string doubles as the file suffix and as associated data,
//! so a `.token` blob cannot be replayed as a `.nostr` blob even under the
//! same key.
//!
//! Writes are whole-file overwrites. A crash mid-write can corrupt the
//! blob; the read side detects that as an authentication failure.
//! TODO: write to a temp file and rename into place.

use std::fs;

use slatecast_crypto::aead;
use slatecast_crypto::kdf::DerivedKey;
use zeroize::Zeroizing;

use crate::error::VaultError;
use crate::paths::DataDir;

/// What a sealed file protects. Determines the file suffix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Purpose {
    /// API session token — `<wallet>.token`
    SessionToken,
    /// Relay identity secret key — `<wallet>.nostr`
    RelayIdentity,
}

impl Purpose {
    pub fn suffix(self) -> &'static str {
        match self {
            Purpose::SessionToken => "token",
            Purpose::RelayIdentity => "nostr",
        }
    }
}

/// Encrypt `plaintext` under `key` and persist it, replacing any previous
/// blob for this (wallet, purpose).
pub fn seal(
    dir: &DataDir,
    wallet: &str,
    purpose: Purpose,
    key: &DerivedKey,
    plaintext: &[u8],
) -> Result<(), VaultError> {
    let blob = aead::encrypt(&key.0, plaintext, purpose.suffix().as_bytes())?;
    let path = dir.wallet_file(wallet, purpose.suffix());
    fs::write(&path, blob)?;
    tracing::debug!(path = %path.display(), "sealed vault blob");
    Ok(())
}

/// Read and decrypt the blob for this (wallet, purpose).
///
/// A missing file is `MissingSecret`; a wrong key, truncated file, or any
/// tampering is `Authentication`.
pub fn open(
    dir: &DataDir,
    wallet: &str,
    purpose: Purpose,
    key: &DerivedKey,
) -> Result<Zeroizing<Vec<u8>>, VaultError> {
    let path = dir.wallet_file(wallet, purpose.suffix());
    let blob = match fs::read(&path) {
        Ok(blob) => blob,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            return Err(VaultError::MissingSecret(path.display().to_string()));
        }
        Err(err) => return Err(err.into()),
    };
    Ok(aead::decrypt(&key.0, &blob, purpose.suffix().as_bytes())?)
}

pub fn exists(dir: &DataDir, wallet: &str, purpose: Purpose) -> bool {
    dir.wallet_file(wallet, purpose.suffix()).exists()
}
