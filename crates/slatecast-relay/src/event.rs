//! Signed, content-addressed relay events.
//!
//! An event's `id` is the SHA-256 of the canonical JSON serialization
//! `[0, pubkey, created_at, kind, tags, content]`, hex-encoded; the
//! signature is Ed25519 over the 32 raw id bytes. Any mutation of a signed
//! event changes its id and breaks the signature, so events are immutable
//! once signed. Two implementations must agree byte-for-byte on the
//! canonical form or signatures will not verify across them.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use slatecast_crypto::identity::{IdentityKeypair, IdentityPublicKey};

use crate::error::RelayError;

/// Reserved kind for end-to-end encrypted direct messages.
pub const KIND_ENCRYPTED_DM: u16 = 4;

pub const TAG_PUBKEY_REF: &str = "p";
pub const TAG_EVENT_REF: &str = "e";
pub const TAG_EXPIRATION: &str = "expiration";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    pub id: String,
    pub pubkey: String,
    pub created_at: i64,
    pub kind: u16,
    pub tags: Vec<Vec<String>>,
    pub content: String,
    pub sig: String,
}

fn compute_id(
    pubkey: &str,
    created_at: i64,
    kind: u16,
    tags: &[Vec<String>],
    content: &str,
) -> Result<String, RelayError> {
    let canonical = serde_json::to_vec(&(0, pubkey, created_at, kind, tags, content))?;
    Ok(hex::encode(Sha256::digest(&canonical)))
}

impl Event {
    /// Build and sign an event in one step; the id and signature are
    /// derived, never supplied.
    pub fn build_signed(
        keypair: &IdentityKeypair,
        kind: u16,
        tags: Vec<Vec<String>>,
        content: String,
        created_at: i64,
    ) -> Result<Self, RelayError> {
        let pubkey = keypair.public().to_hex();
        let id = compute_id(&pubkey, created_at, kind, &tags, &content)?;
        let id_bytes = hex::decode(&id).expect("compute_id emits valid hex");
        let sig = hex::encode(keypair.sign(&id_bytes));
        Ok(Event {
            id,
            pubkey,
            created_at,
            kind,
            tags,
            content,
            sig,
        })
    }

    /// Check that the id matches the content and the signature verifies
    /// against the event's own `pubkey` field.
    pub fn verify(&self) -> Result<(), RelayError> {
        let expected =
            compute_id(&self.pubkey, self.created_at, self.kind, &self.tags, &self.content)?;
        if expected != self.id {
            return Err(RelayError::Protocol("event id does not match content".into()));
        }
        let public = IdentityPublicKey::from_hex(&self.pubkey)?;
        let id_bytes =
            hex::decode(&self.id).map_err(|_| RelayError::Protocol("event id is not hex".into()))?;
        let sig = hex::decode(&self.sig)
            .map_err(|_| RelayError::Protocol("event signature is not hex".into()))?;
        public.verify(&id_bytes, &sig)?;
        Ok(())
    }

    /// First value of the first tag named `name`, if any.
    pub fn tag_value(&self, name: &str) -> Option<&str> {
        self.tags
            .iter()
            .find(|tag| tag.first().map(String::as_str) == Some(name))
            .and_then(|tag| tag.get(1))
            .map(String::as_str)
    }

    /// Expiration timestamp from the `expiration` tag. Written and read
    /// faithfully; ignoring expired events is the application's call.
    pub fn expiration(&self) -> Option<i64> {
        self.tag_value(TAG_EXPIRATION)?.parse().ok()
    }

    /// All `p` tag values (pubkey references).
    pub fn pubkey_refs(&self) -> impl Iterator<Item = &str> {
        self.tags
            .iter()
            .filter(|tag| tag.first().map(String::as_str) == Some(TAG_PUBKEY_REF))
            .filter_map(|tag| tag.get(1))
            .map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn signed_event(keypair: &IdentityKeypair) -> Event {
        Event::build_signed(
            keypair,
            KIND_ENCRYPTED_DM,
            vec![vec![TAG_PUBKEY_REF.into(), "ab".repeat(32)]],
            "ciphertext".into(),
            1_700_000_000,
        )
        .unwrap()
    }

    #[test]
    fn id_is_deterministic_for_same_fields() {
        let keypair = IdentityKeypair::generate();
        let a = signed_event(&keypair);
        let b = signed_event(&keypair);
        assert_eq!(a.id, b.id);
    }

    #[test]
    fn build_then_verify() {
        let keypair = IdentityKeypair::generate();
        signed_event(&keypair).verify().unwrap();
    }

    #[test]
    fn any_mutation_breaks_verification() {
        let keypair = IdentityKeypair::generate();

        let mut tampered = signed_event(&keypair);
        tampered.content = "ciphertexT".into();
        assert!(tampered.verify().is_err());

        let mut tampered = signed_event(&keypair);
        tampered.created_at += 1;
        assert!(tampered.verify().is_err());

        let mut tampered = signed_event(&keypair);
        tampered.tags.push(vec![TAG_EXPIRATION.into(), "0".into()]);
        assert!(tampered.verify().is_err());
    }

    #[test]
    fn signature_from_other_key_is_rejected() {
        let keypair = IdentityKeypair::generate();
        let other = IdentityKeypair::generate();
        let mut event = signed_event(&keypair);
        // Re-sign with the wrong key but keep the claimed pubkey.
        let id_bytes = hex::decode(&event.id).unwrap();
        event.sig = hex::encode(other.sign(&id_bytes));
        assert!(event.verify().is_err());
    }

    #[test]
    fn expiration_tag_roundtrip() {
        let keypair = IdentityKeypair::generate();
        let event = Event::build_signed(
            &keypair,
            KIND_ENCRYPTED_DM,
            vec![vec![TAG_EXPIRATION.into(), "1700172800".into()]],
            "x".into(),
            1_700_000_000,
        )
        .unwrap();
        assert_eq!(event.expiration(), Some(1_700_172_800));
    }
}
