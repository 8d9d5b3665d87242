//! Client ⇄ relay frames.
//!
//! Frames are JSON arrays whose first element names the frame type:
//!
//! Outbound: `["REQ", subId, filter]`, `["EVENT", event]`, `["CLOSE", subId]`
//! Inbound:  `["EVENT", subId, event]`, `["OK", eventId, accepted, message]`,
//!           `["NOTICE", message]`, `["EOSE", subId]`
//!
//! Parsing is strict per frame but failures are scoped to that frame: the
//! caller skips a malformed frame and keeps the connection.

use serde_json::{json, Value};

use crate::error::RelayError;
use crate::event::Event;
use crate::filter::Filter;

/// Frames this client sends.
#[derive(Debug, Clone)]
pub enum ClientFrame {
    Req {
        subscription_id: String,
        filter: Filter,
    },
    Event(Event),
    Close {
        subscription_id: String,
    },
}

impl ClientFrame {
    pub fn to_json(&self) -> Result<String, RelayError> {
        let value = match self {
            ClientFrame::Req {
                subscription_id,
                filter,
            } => json!(["REQ", subscription_id, filter]),
            ClientFrame::Event(event) => json!(["EVENT", event]),
            ClientFrame::Close { subscription_id } => json!(["CLOSE", subscription_id]),
        };
        Ok(serde_json::to_string(&value)?)
    }
}

/// Frames a relay sends back.
#[derive(Debug, Clone)]
pub enum RelayFrame {
    Event {
        subscription_id: String,
        event: Event,
    },
    Ok {
        event_id: String,
        accepted: bool,
        message: String,
    },
    Notice {
        message: String,
    },
    Eose {
        subscription_id: String,
    },
}

fn str_at(frame: &[Value], idx: usize, what: &str) -> Result<String, RelayError> {
    frame
        .get(idx)
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| RelayError::Protocol(format!("frame missing {what}")))
}

impl RelayFrame {
    pub fn parse(text: &str) -> Result<Self, RelayError> {
        let value: Value = serde_json::from_str(text)?;
        let frame = value
            .as_array()
            .ok_or_else(|| RelayError::Protocol("frame is not a JSON array".into()))?;
        let frame_type = frame
            .first()
            .and_then(Value::as_str)
            .ok_or_else(|| RelayError::Protocol("frame missing type".into()))?;

        match frame_type {
            "EVENT" => {
                let subscription_id = str_at(frame, 1, "subscription id")?;
                let event_value = frame
                    .get(2)
                    .cloned()
                    .ok_or_else(|| RelayError::Protocol("EVENT frame missing event".into()))?;
                let event: Event = serde_json::from_value(event_value)?;
                Ok(RelayFrame::Event {
                    subscription_id,
                    event,
                })
            }
            "OK" => {
                let event_id = str_at(frame, 1, "event id")?;
                let accepted = frame
                    .get(2)
                    .and_then(Value::as_bool)
                    .ok_or_else(|| RelayError::Protocol("OK frame missing status".into()))?;
                // The human-readable message is optional on the wire.
                let message = frame
                    .get(3)
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string();
                Ok(RelayFrame::Ok {
                    event_id,
                    accepted,
                    message,
                })
            }
            "NOTICE" => Ok(RelayFrame::Notice {
                message: str_at(frame, 1, "notice message")?,
            }),
            "EOSE" => Ok(RelayFrame::Eose {
                subscription_id: str_at(frame, 1, "subscription id")?,
            }),
            other => Err(RelayError::Protocol(format!("unknown frame type {other:?}"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::KIND_ENCRYPTED_DM;
    use slatecast_crypto::identity::IdentityKeypair;

    #[test]
    fn req_frame_shape() {
        let frame = ClientFrame::Req {
            subscription_id: "sub1".into(),
            filter: Filter::new().kinds(vec![4]).until(50),
        };
        let value: Value = serde_json::from_str(&frame.to_json().unwrap()).unwrap();
        assert_eq!(value[0], "REQ");
        assert_eq!(value[1], "sub1");
        assert_eq!(value[2]["kinds"], json!([4]));
    }

    #[test]
    fn event_frame_roundtrips_through_parse() {
        let keypair = IdentityKeypair::generate();
        let event = Event::build_signed(&keypair, KIND_ENCRYPTED_DM, vec![], "ct".into(), 42)
            .unwrap();
        let outbound = ClientFrame::Event(event.clone()).to_json().unwrap();

        // A relay echoes the same event object inside an inbound frame.
        let outbound_value: Value = serde_json::from_str(&outbound).unwrap();
        let inbound = json!(["EVENT", "subX", outbound_value[1]]).to_string();
        match RelayFrame::parse(&inbound).unwrap() {
            RelayFrame::Event {
                subscription_id,
                event: parsed,
            } => {
                assert_eq!(subscription_id, "subX");
                assert_eq!(parsed, event);
                parsed.verify().unwrap();
            }
            other => panic!("expected EVENT frame, got {other:?}"),
        }
    }

    #[test]
    fn ok_frame_with_and_without_message() {
        match RelayFrame::parse(r#"["OK","abcd",true,"stored"]"#).unwrap() {
            RelayFrame::Ok {
                event_id,
                accepted,
                message,
            } => {
                assert_eq!(event_id, "abcd");
                assert!(accepted);
                assert_eq!(message, "stored");
            }
            other => panic!("unexpected {other:?}"),
        }
        match RelayFrame::parse(r#"["OK","abcd",false]"#).unwrap() {
            RelayFrame::Ok {
                accepted, message, ..
            } => {
                assert!(!accepted);
                assert!(message.is_empty());
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn malformed_frames_are_protocol_errors() {
        assert!(matches!(
            RelayFrame::parse("not json"),
            Err(RelayError::Protocol(_))
        ));
        assert!(matches!(
            RelayFrame::parse(r#"{"type":"EVENT"}"#),
            Err(RelayError::Protocol(_))
        ));
        assert!(matches!(
            RelayFrame::parse(r#"["AUTH","challenge"]"#),
            Err(RelayError::Protocol(_))
        ));
        assert!(matches!(
            RelayFrame::parse(r#"["EOSE"]"#),
            Err(RelayError::Protocol(_))
        ));
    }
}
