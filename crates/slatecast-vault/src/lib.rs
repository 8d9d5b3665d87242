//! slatecast-vault — encrypted on-disk secrets for slatecast wallets
//!
//! Everything a wallet persists locally goes through this crate: the key
//! derivation salt, the API session token, and the relay identity key.
//! Secrets are sealed with XChaCha20-Poly1305 under an Argon2id key derived
//! from wallet-identifying material plus the user's password, so a wrong
//! password is always a detectable authentication failure, never garbage.
//!
//! Files are opened, fully read or written, and closed per access — there
//! are no long-lived handles and no cross-process locking. Two processes
//! writing the same wallet's files race as last-writer-wins.
//!
//! # Module layout
//! - `paths`    — explicit data-directory handle (env override, `~/.slatecast`)
//! - `salt`     — the single persistent KDF salt
//! - `vault`    — sealed blob persistence, one file per (wallet, purpose)
//! - `session`  — session token store/load
//! - `identity` — relay identity load / load-or-create
//! - `error`    — unified error type

pub mod error;
pub mod identity;
pub mod paths;
pub mod salt;
pub mod session;
pub mod vault;

pub use error::VaultError;
pub use identity::IdentityOrigin;
pub use paths::DataDir;
