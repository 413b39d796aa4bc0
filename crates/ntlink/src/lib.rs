//! # ntlink
//!
//! Client for a lightweight pub/sub protocol that discovers and streams
//! named, typed values from a real-time server.
//!
//! A [`Client`] keeps one WebSocket link to the server, mirrors the
//! server's topic namespace, multiplexes any number of subscriptions over
//! the link, publishes topics of its own and keeps an estimate of the
//! server clock. Consumers hear about topics and values through the
//! [`TopicListener`] trait.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use ntlink::prelude::*;
//!
//! struct Printer;
//!
//! impl TopicListener for Printer {
//!     fn on_value(&self, topic: &Topic, timestamp_us: i64, value: &Value) {
//!         println!("{} @ {timestamp_us}: {value:?}", topic.name);
//!     }
//! }
//!
//! # async fn demo() -> Result<(), NtError> {
//! let client = Client::new(ClientConfig::builder().host("10.0.0.2").build());
//! client.set_listener(Printer);
//! client.subscribe_periodic(&["/Signals/"], 0.1, None)?;
//! client.start();
//! # Ok(())
//! # }
//! ```
//!
//! ## Layers
//!
//! | Crate | Role |
//! |---|---|
//! | `ntlink-transport` | connections, frames, link state |
//! | `ntlink-protocol` | control messages, value records, type table |
//! | `ntlink-topics` | topic registry, subscriptions |
//! | `ntlink-clock` | server clock offset |
//! | `ntlink` | [`ClientCore`] state machine and the async [`Client`] |

mod calibration;
mod client;
mod client_core;
mod config;
mod error;
mod listener;

pub use calibration::{Calibration, CalibrationTracker};
pub use client::Client;
pub use config::{ClientConfig, ClientConfigBuilder, generate_client_name};
pub use client_core::{ClientCore, Dispatch, Event, SampleTarget};
pub use error::NtError;
pub use listener::{SharedListener, TopicListener};

pub use ntlink_clock::{LocalClock, ManualClock, SystemClock};
pub use ntlink_protocol::{
    Properties, ProtocolError, PubUid, SubUid, SubscribeOptions, TopicId, Value, ValueType,
};
pub use ntlink_topics::{PublishedTopic, Topic, TopicError};
pub use ntlink_transport::{LinkState, TransportError};

/// The types most consumers need.
pub mod prelude {
    pub use crate::{
        CalibrationTracker, Client, ClientConfig, NtError, PublishedTopic, SharedListener,
        SubUid, SubscribeOptions, Topic, TopicListener, Value, ValueType,
    };
}
