//! Wire protocol for ntlink.
//!
//! This crate defines the two encodings that share one connection:
//!
//! - **Control plane** ([`ClientMessage`], [`ServerMessage`]): JSON arrays
//!   of `{method, params}` objects for topic and subscription lifecycle.
//! - **Value plane** ([`ValueRecord`]): packed MessagePack tuples
//!   `[id, timestamp_us, type_index, value]`, several per binary frame.
//! - **Types** ([`ValueType`], [`Value`], [`TopicId`], ...): the type
//!   table and the identities both planes refer to.
//! - **Codecs** ([`Codec`], [`JsonCodec`], [`MsgPackCodec`]).
//!
//! # Architecture
//!
//! The protocol layer sits between transport (frames) and the topic layer
//! (registry and subscriptions). It knows nothing about connections.
//!
//! ```text
//! Transport (Frame) → Protocol (ServerMessage / ValueRecord) → Topics
//! ```

mod codec;
mod control;
mod error;
mod record;
mod types;
mod value;

pub use codec::{Codec, JsonCodec, MsgPackCodec};
pub use control::{
    ClientMessage, Properties, ServerMessage, SubscribeOptions, decode_control,
    encode_control,
};
pub use error::ProtocolError;
pub use record::{ValueRecord, decode_records, encode_records};
pub use types::{PubUid, SubUid, TopicId, ValueType};
pub use value::Value;
