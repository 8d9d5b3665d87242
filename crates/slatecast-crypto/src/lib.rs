//! slatecast-crypto — cryptographic primitives for the slatecast wallet client
//!
//! # Design principles
//! - NO custom crypto; all primitives come from audited Rust crates.
//! - Zeroize all secret material on drop.
//! - Public APIs return opaque newtypes to prevent accidental misuse.
//!
//! # Module layout
//! - `kdf`      — Argon2id password → vault key derivation
//! - `aead`     — XChaCha20-Poly1305 encrypt/decrypt helpers
//! - `identity` — long-term Ed25519 messaging identity keys
//! - `exchange` — Ed25519 → X25519 conversion + ECDH conversation keys
//! - `error`    — unified error type

pub mod aead;
pub mod error;
pub mod exchange;
pub mod identity;
pub mod kdf;

pub use error::CryptoError;
