use slatecast_crypto::CryptoError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum VaultError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Authentication failed — wrong password or corrupted vault file")]
    Authentication,

    #[error("No stored secret at {0}")]
    MissingSecret(String),

    #[error("Stored secret is malformed: {0}")]
    Malformed(String),

    #[error("Cannot determine home directory")]
    NoHomeDir,

    #[error("Crypto error: {0}")]
    Crypto(CryptoError),
}

impl From<CryptoError> for VaultError {
    fn from(err: CryptoError) -> Self {
        match err {
            // The AEAD tag mismatch is the only signal a caller gets that the
            // password was wrong; everything else is an internal failure.
            CryptoError::AeadDecrypt => VaultError::Authentication,
            other => VaultError::Crypto(other),
        }
    }
}
