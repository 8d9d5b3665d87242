//! Session token storage.
//!
//! After a wallet is opened over RPC, the API hands back a session token
//! that authorises every subsequent call. The token is sealed under a key
//! derived from wallet name + password, so it can only be read back by
//! someone who knows the wallet password.
//!
//! This is the one place a wrong password is surfaced directly: callers
//! should treat `VaultError::Authentication` from `load_token` as
//! "invalid password".

use zeroize::Zeroizing;

use slatecast_crypto::kdf::{vault_key_from_passphrase, DerivedKey};

use crate::error::VaultError;
use crate::paths::DataDir;
use crate::salt;
use crate::vault::{self, Purpose};

fn session_key(dir: &DataDir, wallet: &str, password: &str) -> Result<DerivedKey, VaultError> {
    let salt = salt::load_or_create(dir)?;
    let passphrase = format!("{wallet}{password}");
    Ok(vault_key_from_passphrase(passphrase.as_bytes(), &salt)?)
}

/// Seal the session token to `<dataDir>/<wallet>.token`.
pub fn store_token(
    dir: &DataDir,
    wallet: &str,
    password: &str,
    token: &str,
) -> Result<(), VaultError> {
    let key = session_key(dir, wallet, password)?;
    vault::seal(dir, wallet, Purpose::SessionToken, &key, token.as_bytes())
}

/// Load and decrypt the stored session token.
pub fn load_token(
    dir: &DataDir,
    wallet: &str,
    password: &str,
) -> Result<Zeroizing<String>, VaultError> {
    let key = session_key(dir, wallet, password)?;
    let plaintext = vault::open(dir, wallet, Purpose::SessionToken, &key)?;
    let token = std::str::from_utf8(&plaintext)
        .map_err(|_| VaultError::Malformed("session token is not UTF-8".into()))?;
    Ok(Zeroizing::new(token.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn store_then_load() {
        let tmp = tempdir().unwrap();
        let dir = DataDir::at(tmp.path()).unwrap();
        store_token(&dir, "alice", "pw1", "session-xyz").unwrap();
        let token = load_token(&dir, "alice", "pw1").unwrap();
        assert_eq!(&**token, "session-xyz");
    }

    #[test]
    fn wrong_password_surfaces_authentication() {
        let tmp = tempdir().unwrap();
        let dir = DataDir::at(tmp.path()).unwrap();
        store_token(&dir, "alice", "pw1", "session-xyz").unwrap();
        assert!(matches!(
            load_token(&dir, "alice", "wrong"),
            Err(VaultError::Authentication)
        ));
    }

    #[test]
    fn tokens_are_per_wallet() {
        let tmp = tempdir().unwrap();
        let dir = DataDir::at(tmp.path()).unwrap();
        store_token(&dir, "alice", "pw", "tok-a").unwrap();
        store_token(&dir, "bob", "pw", "tok-b").unwrap();
        assert_eq!(&**load_token(&dir, "alice", "pw").unwrap(), "tok-a");
        assert_eq!(&**load_token(&dir, "bob", "pw").unwrap(), "tok-b");
    }
}
