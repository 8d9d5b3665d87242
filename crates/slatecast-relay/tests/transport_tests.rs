//! Transport tests against an in-process mock relay.
//!
//! Each test binds a local websocket server that plays one scripted relay
//! role: acknowledge, reject, go silent, or stream a stored-event backlog
//! followed by EOSE.

use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use serde_json::json;
use tokio::net::TcpListener;
use tokio_tungstenite::tungstenite::Message;

use slatecast_crypto::identity::IdentityKeypair;
use slatecast_relay::dm::{self, ReplyRefs};
use slatecast_relay::event::{Event, KIND_ENCRYPTED_DM};
use slatecast_relay::{Filter, RelayError, RelayTransport, SubscribeOptions};

const SHORT: Duration = Duration::from_secs(5);

fn sample_dm(sender: &IdentityKeypair, recipient: &IdentityKeypair) -> Event {
    dm::seal_message(sender, recipient.public(), "armored slatepack", None).unwrap()
}

async fn bind_relay() -> (TcpListener, String) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("ws://{}", listener.local_addr().unwrap());
    (listener, url)
}

#[tokio::test]
async fn publish_resolves_on_matching_ok() {
    let (listener, url) = bind_relay().await;
    tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let mut ws = tokio_tungstenite::accept_async(stream).await.unwrap();
        while let Some(Ok(msg)) = ws.next().await {
            if let Message::Text(text) = msg {
                let frame: serde_json::Value = serde_json::from_str(&text).unwrap();
                if frame[0] == "EVENT" {
                    let id = frame[1]["id"].as_str().unwrap();
                    // Unrelated OK first — the client must keep waiting.
                    let other = json!(["OK", "ff".repeat(32), true, ""]).to_string();
                    ws.send(Message::Text(other)).await.unwrap();
                    let ack = json!(["OK", id, true, "stored"]).to_string();
                    ws.send(Message::Text(ack)).await.unwrap();
                    break;
                }
            }
        }
    });

    let alice = IdentityKeypair::generate();
    let bob = IdentityKeypair::generate();
    let mut transport = RelayTransport::new([url]);
    transport
        .publish(&sample_dm(&alice, &bob), SHORT)
        .await
        .unwrap();
}

#[tokio::test]
async fn publish_surfaces_policy_rejection() {
    let (listener, url) = bind_relay().await;
    tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let mut ws = tokio_tungstenite::accept_async(stream).await.unwrap();
        while let Some(Ok(msg)) = ws.next().await {
            if let Message::Text(text) = msg {
                let frame: serde_json::Value = serde_json::from_str(&text).unwrap();
                if frame[0] == "EVENT" {
                    let id = frame[1]["id"].as_str().unwrap();
                    let nack = json!(["OK", id, false, "blocked: pubkey not allowed"]);
                    ws.send(Message::Text(nack.to_string())).await.unwrap();
                    break;
                }
            }
        }
    });

    let alice = IdentityKeypair::generate();
    let bob = IdentityKeypair::generate();
    let mut transport = RelayTransport::new([url]);
    let err = transport
        .publish(&sample_dm(&alice, &bob), SHORT)
        .await
        .unwrap_err();
    match err {
        RelayError::PolicyRejection(message) => assert!(message.contains("blocked")),
        other => panic!("expected policy rejection, got {other:?}"),
    }
}

#[tokio::test]
async fn publish_treats_blocked_notice_as_terminal() {
    let (listener, url) = bind_relay().await;
    tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let mut ws = tokio_tungstenite::accept_async(stream).await.unwrap();
        while let Some(Ok(msg)) = ws.next().await {
            if let Message::Text(_) = msg {
                let notice = json!(["NOTICE", "blocked: write access restricted"]);
                ws.send(Message::Text(notice.to_string())).await.unwrap();
                break;
            }
        }
    });

    let alice = IdentityKeypair::generate();
    let bob = IdentityKeypair::generate();
    let mut transport = RelayTransport::new([url]);
    assert!(matches!(
        transport.publish(&sample_dm(&alice, &bob), SHORT).await,
        Err(RelayError::PolicyRejection(_))
    ));
}

#[tokio::test]
async fn publish_times_out_without_acknowledgment() {
    let (listener, url) = bind_relay().await;
    tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let mut ws = tokio_tungstenite::accept_async(stream).await.unwrap();
        // Swallow everything, never acknowledge.
        while let Some(Ok(_)) = ws.next().await {}
    });

    let alice = IdentityKeypair::generate();
    let bob = IdentityKeypair::generate();
    let mut transport = RelayTransport::new([url]);
    assert!(matches!(
        transport
            .publish(&sample_dm(&alice, &bob), Duration::from_millis(300))
            .await,
        Err(RelayError::Timeout(_))
    ));
}

#[tokio::test]
async fn subscription_buffers_matching_events_until_eose() {
    let alice = IdentityKeypair::generate();
    let bob = IdentityKeypair::generate();
    let carol = IdentityKeypair::generate();

    let dm_for_bob = sample_dm(&alice, &bob);
    let dm_for_carol = sample_dm(&alice, &carol);
    let mut forged = sample_dm(&alice, &bob);
    forged.content = "tampered".into();

    let (listener, url) = bind_relay().await;
    tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let mut ws = tokio_tungstenite::accept_async(stream).await.unwrap();
        while let Some(Ok(msg)) = ws.next().await {
            if let Message::Text(text) = msg {
                let frame: serde_json::Value = serde_json::from_str(&text).unwrap();
                if frame[0] == "REQ" {
                    let sid = frame[1].as_str().unwrap();
                    for event in [&dm_for_bob, &dm_for_carol, &forged] {
                        let msg = json!(["EVENT", sid, event]).to_string();
                        ws.send(Message::Text(msg)).await.unwrap();
                    }
                    // Duplicate delivery of the valid event.
                    let dup = json!(["EVENT", sid, &dm_for_bob]).to_string();
                    ws.send(Message::Text(dup)).await.unwrap();
                    // Garbage the client must skip without dropping the line.
                    ws.send(Message::Text("{not a frame".into())).await.unwrap();
                    let eose = json!(["EOSE", sid]).to_string();
                    ws.send(Message::Text(eose)).await.unwrap();
                    break;
                }
            }
        }
    });

    let filter = Filter::new()
        .kinds(vec![KIND_ENCRYPTED_DM])
        .pubkey_ref(bob.public().to_hex());
    let mut transport = RelayTransport::new([url]);
    let events = transport
        .subscribe(&filter, &SubscribeOptions::default())
        .await
        .unwrap();

    // Only the untampered DM addressed to bob survives: the forged copy
    // fails signature verification, carol's DM fails the #p filter, and
    // the duplicate is collapsed by id.
    assert_eq!(events.len(), 1);
    assert_eq!(
        dm::open_message(&bob, &events[0]).unwrap(),
        "armored slatepack"
    );
}

#[tokio::test]
async fn relay_is_excluded_after_repeated_failures() {
    // Bind then drop to get a port with nothing listening.
    let url = {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        format!("ws://{}", listener.local_addr().unwrap())
    };

    let alice = IdentityKeypair::generate();
    let bob = IdentityKeypair::generate();
    let event = sample_dm(&alice, &bob);
    let mut transport = RelayTransport::new([url]);

    for _ in 0..3 {
        assert!(matches!(
            transport.publish(&event, SHORT).await,
            Err(RelayError::Connection(_))
        ));
    }
    // Threshold reached: the relay is no longer attempted at all.
    assert!(matches!(
        transport.publish(&event, SHORT).await,
        Err(RelayError::AllRelaysFailed)
    ));
}

#[tokio::test]
async fn end_to_end_reply_roundtrip_through_codec() {
    // The full send/reply exchange without a live relay: alice sends, bob replies with
    // reference tags, both sides decrypt exactly what was sealed.
    let alice = IdentityKeypair::generate();
    let bob = IdentityKeypair::generate();

    let request = dm::seal_message(&alice, bob.public(), "hello", None).unwrap();
    assert_eq!(dm::open_message(&bob, &request).unwrap(), "hello");

    let refs = ReplyRefs {
        event_id: request.id.clone(),
        sender_pubkey: request.pubkey.clone(),
    };
    let reply = dm::seal_message(&bob, alice.public(), "signed: hello", Some(&refs)).unwrap();
    assert_eq!(dm::open_message(&alice, &reply).unwrap(), "signed: hello");
    assert_eq!(reply.tag_value("e"), Some(request.id.as_str()));
}
