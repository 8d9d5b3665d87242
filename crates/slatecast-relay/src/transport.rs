//! Relay connections and the publish/subscribe loops.
//!
//! Every operation drives an explicit state machine over a websocket:
//!
//! ```text
//! Disconnected → Connecting → Open → (Publishing | Subscribing) → Closing → Closed
//! ```
//!
//! Inbound frames are consumed by a synchronous poll loop — there are no
//! callbacks and no re-entrancy. A publish stays on the wire until the
//! relay acknowledges or rejects the event id, or the deadline passes; a
//! subscription buffers matching events until EOSE (in close-on-EOSE mode)
//! or its deadline. Frames are FIFO within one connection only; nothing is
//! ordered across connections.
//!
//! Per-relay failures increment an error counter; a relay that reaches the
//! threshold is excluded for the remainder of the run. Errors are scoped
//! to one connection and never abort attempts against other relays.

use std::collections::HashSet;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::time::Instant;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

use crate::error::RelayError;
use crate::event::Event;
use crate::filter::Filter;
use crate::frame::{ClientFrame, RelayFrame};

pub const DEFAULT_ERROR_THRESHOLD: u32 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Open,
    Publishing,
    Subscribing,
    Closing,
    Closed,
}

/// One websocket connection to one relay. Ephemeral: created for a single
/// publish or subscription, then closed.
pub struct RelayConnection {
    url: String,
    state: ConnectionState,
    socket: Option<WebSocketStream<MaybeTlsStream<TcpStream>>>,
}

impl RelayConnection {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            state: ConnectionState::Disconnected,
            socket: None,
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub async fn connect(&mut self) -> Result<(), RelayError> {
        self.state = ConnectionState::Connecting;
        match connect_async(&self.url).await {
            Ok((socket, _response)) => {
                tracing::debug!(url = %self.url, "relay connection open");
                self.socket = Some(socket);
                self.state = ConnectionState::Open;
                Ok(())
            }
            Err(err) => {
                self.state = ConnectionState::Disconnected;
                Err(err.into())
            }
        }
    }

    async fn send(&mut self, frame: &ClientFrame) -> Result<(), RelayError> {
        let text = frame.to_json()?;
        let socket = self
            .socket
            .as_mut()
            .ok_or_else(|| RelayError::Connection("connection is not open".into()))?;
        socket.send(Message::Text(text)).await?;
        Ok(())
    }

    /// Next parsed relay frame. `Ok(None)` means the relay closed cleanly.
    /// A malformed frame is an `Err(Protocol)` scoped to that frame — the
    /// connection stays usable and the caller may keep polling.
    async fn next_frame(&mut self) -> Result<Option<RelayFrame>, RelayError> {
        let socket = self
            .socket
            .as_mut()
            .ok_or_else(|| RelayError::Connection("connection is not open".into()))?;
        while let Some(message) = socket.next().await {
            match message? {
                Message::Text(text) => return RelayFrame::parse(&text).map(Some),
                Message::Ping(data) => socket.send(Message::Pong(data)).await?,
                Message::Close(_) => return Ok(None),
                _ => {}
            }
        }
        Ok(None)
    }

    /// Close the connection. Idempotent and safe in every state; never
    /// errors once closed.
    pub async fn close(&mut self) {
        if self.state == ConnectionState::Closed {
            return;
        }
        self.state = ConnectionState::Closing;
        if let Some(mut socket) = self.socket.take() {
            let _ = socket.close(None).await;
        }
        self.state = ConnectionState::Closed;
        tracing::debug!(url = %self.url, "relay connection closed");
    }
}

#[derive(Debug)]
struct RelayEndpoint {
    url: String,
    errors: u32,
    excluded: bool,
}

/// How a subscription decides it is done.
#[derive(Debug, Clone)]
pub struct SubscribeOptions {
    /// Stop once the relay signals end-of-stored-events.
    pub close_on_eose: bool,
    /// Hard deadline for the whole subscription on one relay.
    pub timeout: Duration,
}

impl Default for SubscribeOptions {
    fn default() -> Self {
        Self {
            close_on_eose: true,
            timeout: Duration::from_secs(30),
        }
    }
}

/// Publishes and subscribes across a set of relays, excluding relays that
/// keep failing. Relays are tried sequentially — at most one round-trip is
/// in flight at a time.
pub struct RelayTransport {
    relays: Vec<RelayEndpoint>,
    error_threshold: u32,
}

impl RelayTransport {
    pub fn new<I, S>(urls: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            relays: urls
                .into_iter()
                .map(|url| RelayEndpoint {
                    url: url.into(),
                    errors: 0,
                    excluded: false,
                })
                .collect(),
            error_threshold: DEFAULT_ERROR_THRESHOLD,
        }
    }

    pub fn with_error_threshold(mut self, threshold: u32) -> Self {
        self.error_threshold = threshold;
        self
    }

    fn record_error(&mut self, idx: usize, err: &RelayError) {
        let relay = &mut self.relays[idx];
        relay.errors += 1;
        tracing::warn!(url = %relay.url, error = %err, count = relay.errors, "relay error");
        if relay.errors >= self.error_threshold && !relay.excluded {
            relay.excluded = true;
            tracing::warn!(url = %relay.url, "relay excluded for the rest of this run");
        }
    }

    fn active_urls(&self) -> Vec<(usize, String)> {
        self.relays
            .iter()
            .enumerate()
            .filter(|(_, r)| !r.excluded)
            .map(|(idx, r)| (idx, r.url.clone()))
            .collect()
    }

    /// Publish `event`, waiting for an acknowledgment or rejection from the
    /// first relay that accepts the connection.
    ///
    /// A policy rejection is terminal — it is the relay's answer, not a
    /// transport failure, so no further relay is tried. Everything else
    /// moves on to the next configured relay.
    pub async fn publish(&mut self, event: &Event, timeout: Duration) -> Result<(), RelayError> {
        let candidates = self.active_urls();
        if candidates.is_empty() {
            return Err(RelayError::AllRelaysFailed);
        }
        let mut last_err = None;
        for (idx, url) in candidates {
            match publish_one(&url, event, timeout).await {
                Ok(()) => return Ok(()),
                Err(RelayError::PolicyRejection(message)) => {
                    return Err(RelayError::PolicyRejection(message));
                }
                Err(err) => {
                    self.record_error(idx, &err);
                    last_err = Some(err);
                }
            }
        }
        Err(last_err.unwrap_or(RelayError::AllRelaysFailed))
    }

    /// Run `filter` as a subscription on every active relay, sequentially,
    /// and return the buffered events (deduplicated by id).
    ///
    /// Events that fail signature verification or do not match the filter
    /// are discarded quietly — relay noise, not an error. Fails only when
    /// no relay could serve the subscription at all.
    pub async fn subscribe(
        &mut self,
        filter: &Filter,
        options: &SubscribeOptions,
    ) -> Result<Vec<Event>, RelayError> {
        let candidates = self.active_urls();
        if candidates.is_empty() {
            return Err(RelayError::AllRelaysFailed);
        }
        let mut events = Vec::new();
        let mut seen = HashSet::new();
        let mut any_served = false;
        for (idx, url) in candidates {
            match subscribe_one(&url, filter, options, &mut events, &mut seen).await {
                Ok(()) => any_served = true,
                Err(err) => self.record_error(idx, &err),
            }
        }
        if !any_served {
            return Err(RelayError::AllRelaysFailed);
        }
        Ok(events)
    }
}

async fn publish_one(url: &str, event: &Event, timeout: Duration) -> Result<(), RelayError> {
    let mut conn = RelayConnection::new(url);
    conn.connect().await?;
    conn.state = ConnectionState::Publishing;
    let result = publish_loop(&mut conn, event, timeout).await;
    conn.close().await;
    result
}

async fn publish_loop(
    conn: &mut RelayConnection,
    event: &Event,
    timeout: Duration,
) -> Result<(), RelayError> {
    conn.send(&ClientFrame::Event(event.clone())).await?;
    let deadline = Instant::now() + timeout;
    loop {
        let Some(remaining) = deadline.checked_duration_since(Instant::now()) else {
            return Err(RelayError::Timeout("publish acknowledgment"));
        };
        let frame = match tokio::time::timeout(remaining, conn.next_frame()).await {
            Err(_) => return Err(RelayError::Timeout("publish acknowledgment")),
            Ok(Err(RelayError::Protocol(detail))) => {
                tracing::debug!(%detail, "skipping malformed frame");
                continue;
            }
            Ok(Err(err)) => return Err(err),
            Ok(Ok(None)) => {
                return Err(RelayError::Connection(
                    "relay closed before acknowledging the event".into(),
                ));
            }
            Ok(Ok(Some(frame))) => frame,
        };
        match frame {
            RelayFrame::Ok {
                event_id,
                accepted,
                message,
            } if event_id == event.id => {
                return if accepted {
                    Ok(())
                } else {
                    Err(RelayError::PolicyRejection(message))
                };
            }
            RelayFrame::Notice { message } if is_policy_block(&message) => {
                return Err(RelayError::PolicyRejection(message));
            }
            RelayFrame::Notice { message } => {
                tracing::warn!(%message, "relay notice while awaiting acknowledgment");
            }
            _ => {}
        }
    }
}

/// Keywords a relay uses to say "this event is refused by policy" inside a
/// NOTICE — terminal for the publish, not worth retrying.
fn is_policy_block(message: &str) -> bool {
    let lowered = message.to_lowercase();
    lowered.contains("blocked") || lowered.contains("restricted")
}

async fn subscribe_one(
    url: &str,
    filter: &Filter,
    options: &SubscribeOptions,
    events: &mut Vec<Event>,
    seen: &mut HashSet<String>,
) -> Result<(), RelayError> {
    let mut conn = RelayConnection::new(url);
    conn.connect().await?;
    conn.state = ConnectionState::Subscribing;

    // Fresh random id per subscription; never reused.
    let subscription_id = uuid::Uuid::new_v4().simple().to_string();
    let result = subscribe_loop(&mut conn, filter, options, &subscription_id, events, seen).await;

    // Best-effort unsubscribe; the close right after is what must not fail.
    let _ = conn
        .send(&ClientFrame::Close {
            subscription_id: subscription_id.clone(),
        })
        .await;
    conn.close().await;
    result
}

async fn subscribe_loop(
    conn: &mut RelayConnection,
    filter: &Filter,
    options: &SubscribeOptions,
    subscription_id: &str,
    events: &mut Vec<Event>,
    seen: &mut HashSet<String>,
) -> Result<(), RelayError> {
    conn.send(&ClientFrame::Req {
        subscription_id: subscription_id.to_string(),
        filter: filter.clone(),
    })
    .await?;

    let deadline = Instant::now() + options.timeout;
    loop {
        let Some(remaining) = deadline.checked_duration_since(Instant::now()) else {
            // Running out the clock is a normal way for a subscription to end.
            return Ok(());
        };
        let frame = match tokio::time::timeout(remaining, conn.next_frame()).await {
            Err(_) => return Ok(()),
            Ok(Err(RelayError::Protocol(detail))) => {
                tracing::debug!(%detail, "skipping malformed frame");
                continue;
            }
            Ok(Err(err)) => {
                // Mid-stream connection failure: keep what was buffered,
                // report the failure for this relay's error count.
                return Err(err);
            }
            Ok(Ok(None)) => return Ok(()),
            Ok(Ok(Some(frame))) => frame,
        };
        match frame {
            RelayFrame::Event {
                subscription_id: sid,
                event,
            } if sid == subscription_id => {
                if event.verify().is_err() {
                    tracing::debug!(id = %event.id, "discarding event with bad signature");
                    continue;
                }
                if !filter.matches(&event) {
                    tracing::debug!(id = %event.id, "discarding event outside filter");
                    continue;
                }
                if seen.insert(event.id.clone()) {
                    events.push(event);
                }
            }
            RelayFrame::Eose {
                subscription_id: sid,
            } if sid == subscription_id && options.close_on_eose => {
                return Ok(());
            }
            RelayFrame::Notice { message } => {
                tracing::debug!(%message, "relay notice during subscription");
            }
            _ => {}
        }
    }
}
