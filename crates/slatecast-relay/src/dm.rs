//! Encrypted direct messages.
//!
//! A direct message is sealed for exactly one recipient: the cleartext is
//! encrypted under the ECDH conversation key of the two identities, the
//! ciphertext becomes the `content` (base64) of a kind-4 event tagged with
//! the recipient's pubkey and an expiration 48 hours out, and the event is
//! signed by the sender.
//!
//! Opening verifies the event's signature and kind BEFORE touching the
//! ciphertext; an event that fails either check never reaches decryption.
//! Expired events are opened normally — honoring the expiration tag is the
//! caller's responsibility.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use chrono::Utc;

use slatecast_crypto::aead;
use slatecast_crypto::exchange::conversation_key;
use slatecast_crypto::identity::{IdentityKeypair, IdentityPublicKey};

use crate::error::RelayError;
use crate::event::{Event, KIND_ENCRYPTED_DM, TAG_EVENT_REF, TAG_EXPIRATION, TAG_PUBKEY_REF};

/// Messages expire 48 hours after sealing.
pub const MESSAGE_TTL_SECS: i64 = 48 * 60 * 60;

/// Links a reply back to the message it answers.
#[derive(Debug, Clone)]
pub struct ReplyRefs {
    /// Id of the originating event.
    pub event_id: String,
    /// Pubkey of the originating sender.
    pub sender_pubkey: String,
}

/// Seal `cleartext` for `recipient` into a signed, expiring kind-4 event.
pub fn seal_message(
    identity: &IdentityKeypair,
    recipient: &IdentityPublicKey,
    cleartext: &str,
    reply_to: Option<&ReplyRefs>,
) -> Result<Event, RelayError> {
    let key = conversation_key(identity, recipient)?;
    let ciphertext = aead::encrypt(&key, cleartext.as_bytes(), b"")?;
    let content = BASE64.encode(ciphertext);

    let now = Utc::now().timestamp();
    let mut tags = vec![vec![TAG_PUBKEY_REF.to_string(), recipient.to_hex()]];
    if let Some(refs) = reply_to {
        tags.push(vec![TAG_EVENT_REF.to_string(), refs.event_id.clone()]);
        tags.push(vec![TAG_PUBKEY_REF.to_string(), refs.sender_pubkey.clone()]);
    }
    tags.push(vec![
        TAG_EXPIRATION.to_string(),
        (now + MESSAGE_TTL_SECS).to_string(),
    ]);

    Event::build_signed(identity, KIND_ENCRYPTED_DM, tags, content, now)
}

/// Open a received direct message with our identity.
///
/// Fails with `Protocol` when the event is not a validly-signed kind-4
/// event, and with `Decryption` when the ciphertext does not authenticate
/// under the recomputed conversation key.
pub fn open_message(identity: &IdentityKeypair, event: &Event) -> Result<String, RelayError> {
    if event.kind != KIND_ENCRYPTED_DM {
        return Err(RelayError::Protocol(format!(
            "expected kind {KIND_ENCRYPTED_DM} event, got {}",
            event.kind
        )));
    }
    event.verify()?;

    let sender = IdentityPublicKey::from_hex(&event.pubkey)?;
    let key = conversation_key(identity, &sender)?;
    let ciphertext = BASE64
        .decode(&event.content)
        .map_err(|_| RelayError::Decryption)?;
    let plaintext = aead::decrypt(&key, &ciphertext, b"").map_err(RelayError::from)?;
    String::from_utf8(plaintext.to_vec()).map_err(|_| RelayError::Decryption)
}
