//! Subscription filters.
//!
//! A filter selects which stored and live events a relay sends back for a
//! subscription: by kind, by creation time, and by `p` (pubkey reference)
//! tag. The relay applies the filter server-side; `matches` re-checks it
//! client-side so a noisy or malicious relay cannot widen a subscription.

use serde::{Deserialize, Serialize};

use crate::event::{Event, TAG_PUBKEY_REF};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Filter {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kinds: Option<Vec<u16>>,

    /// Only events created at or before this unix timestamp.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub until: Option<i64>,

    /// Only events carrying a `p` tag naming one of these pubkeys.
    #[serde(rename = "#p", skip_serializing_if = "Option::is_none")]
    pub pubkey_refs: Option<Vec<String>>,
}

impl Filter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn kinds(mut self, kinds: Vec<u16>) -> Self {
        self.kinds = Some(kinds);
        self
    }

    pub fn until(mut self, timestamp: i64) -> Self {
        self.until = Some(timestamp);
        self
    }

    pub fn pubkey_ref(mut self, pubkey_hex: String) -> Self {
        self.pubkey_refs.get_or_insert_with(Vec::new).push(pubkey_hex);
        self
    }

    /// Every present criterion must hold; an absent criterion matches all.
    pub fn matches(&self, event: &Event) -> bool {
        if let Some(kinds) = &self.kinds {
            if !kinds.contains(&event.kind) {
                return false;
            }
        }
        if let Some(until) = self.until {
            if event.created_at > until {
                return false;
            }
        }
        if let Some(refs) = &self.pubkey_refs {
            if !event
                .pubkey_refs()
                .any(|tagged| refs.iter().any(|wanted| wanted == tagged))
            {
                return false;
            }
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::KIND_ENCRYPTED_DM;

    fn event(kind: u16, created_at: i64, tags: Vec<Vec<String>>) -> Event {
        Event {
            id: "00".repeat(32),
            pubkey: "11".repeat(32),
            created_at,
            kind,
            tags,
            content: String::new(),
            sig: "22".repeat(64),
        }
    }

    #[test]
    fn kind_and_pubkey_ref_must_both_match() {
        let me = "aa".repeat(32);
        let filter = Filter::new()
            .kinds(vec![KIND_ENCRYPTED_DM])
            .pubkey_ref(me.clone());

        let dm_to_me = event(
            KIND_ENCRYPTED_DM,
            10,
            vec![vec![TAG_PUBKEY_REF.into(), me.clone()]],
        );
        assert!(filter.matches(&dm_to_me));

        let wrong_kind = event(1, 10, vec![vec![TAG_PUBKEY_REF.into(), me.clone()]]);
        assert!(!filter.matches(&wrong_kind));

        let wrong_recipient = event(
            KIND_ENCRYPTED_DM,
            10,
            vec![vec![TAG_PUBKEY_REF.into(), "bb".repeat(32)]],
        );
        assert!(!filter.matches(&wrong_recipient));

        let no_refs = event(KIND_ENCRYPTED_DM, 10, vec![]);
        assert!(!filter.matches(&no_refs));
    }

    #[test]
    fn until_excludes_newer_events() {
        let filter = Filter::new().until(100);
        assert!(filter.matches(&event(1, 100, vec![])));
        assert!(!filter.matches(&event(1, 101, vec![])));
    }

    #[test]
    fn serializes_with_sharp_p_key() {
        let filter = Filter::new()
            .kinds(vec![4])
            .until(99)
            .pubkey_ref("ab".repeat(32));
        let json = serde_json::to_value(&filter).unwrap();
        assert_eq!(json["kinds"], serde_json::json!([4]));
        assert_eq!(json["until"], serde_json::json!(99));
        assert_eq!(json["#p"], serde_json::json!(["ab".repeat(32)]));
    }
}
