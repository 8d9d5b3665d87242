use slatecast_crypto::CryptoError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RelayError {
    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Timed out waiting for {0}")]
    Timeout(&'static str),

    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("Message decryption failed (wrong key pair, tampered content, or malformed ciphertext)")]
    Decryption,

    #[error("Relay rejected event: {0}")]
    PolicyRejection(String),

    #[error("Every configured relay failed or is excluded")]
    AllRelaysFailed,
}

impl From<tokio_tungstenite::tungstenite::Error> for RelayError {
    fn from(err: tokio_tungstenite::tungstenite::Error) -> Self {
        RelayError::Connection(err.to_string())
    }
}

impl From<serde_json::Error> for RelayError {
    fn from(err: serde_json::Error) -> Self {
        RelayError::Protocol(err.to_string())
    }
}

impl From<CryptoError> for RelayError {
    fn from(err: CryptoError) -> Self {
        match err {
            CryptoError::AeadDecrypt => RelayError::Decryption,
            CryptoError::SignatureVerification => {
                RelayError::Protocol("invalid event signature".into())
            }
            other => RelayError::Protocol(other.to_string()),
        }
    }
}
