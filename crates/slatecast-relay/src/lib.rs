//! slatecast-relay — pub-sub relay protocol for exchanging slatepacks
//!
//! Wallets have no direct network path to each other; they meet at public
//! relays speaking a small JSON frame protocol. Every payload that crosses
//! a relay is an end-to-end encrypted direct message event: content-
//! addressed, signed by the sender's identity key, expiring after 48 hours.
//!
//! # Module layout
//! - `event`     — signed, content-addressed events and their tags
//! - `filter`    — subscription filters (kinds / until / `#p`)
//! - `frame`     — client ⇄ relay JSON array frames
//! - `dm`        — sealing/opening encrypted direct messages
//! - `transport` — connection state machine, publish + subscribe loops
//! - `error`     — unified error type

pub mod dm;
pub mod error;
pub mod event;
pub mod filter;
pub mod frame;
pub mod transport;

pub use error::RelayError;
pub use event::Event;
pub use filter::Filter;
pub use transport::{RelayTransport, SubscribeOptions};
