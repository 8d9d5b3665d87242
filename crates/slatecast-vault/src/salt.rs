//! The single persistent KDF salt.
//!
//! Generated once per data directory, 16 cryptographically-random bytes,
//! written with exclusive-create semantics so an existing salt is never
//! overwritten — every sealed file in the directory depends on it.

use std::fs;
use std::io::Write;

use slatecast_crypto::kdf::{generate_salt, SALT_LEN};

use crate::error::VaultError;
use crate::paths::DataDir;

/// Read the stored salt, generating and persisting it on first use.
pub fn load_or_create(dir: &DataDir) -> Result<[u8; SALT_LEN], VaultError> {
    let path = dir.salt_path();
    match fs::read(&path) {
        Ok(bytes) => bytes.as_slice().try_into().map_err(|_| {
            VaultError::Malformed(format!(
                "salt file {} holds {} bytes, expected {}",
                path.display(),
                bytes.len(),
                SALT_LEN
            ))
        }),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            let salt = generate_salt();
            // create_new: if another process won the race, fall back to
            // reading what it wrote rather than clobbering it.
            match fs::OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&path)
            {
                Ok(mut file) => {
                    file.write_all(&salt)?;
                    Ok(salt)
                }
                Err(err) if err.kind() == std::io::ErrorKind::AlreadyExists => {
                    load_or_create(dir)
                }
                Err(err) => Err(err.into()),
            }
        }
        Err(err) => Err(err.into()),
    }
}
