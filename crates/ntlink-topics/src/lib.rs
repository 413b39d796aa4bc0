//! Topic namespace and subscription bookkeeping.
//!
//! - [`TopicRegistry`] holds server-announced topics (by id, with a name
//!   index) and the topics this client publishes (by name).
//! - [`SubscriptionManager`] holds the subscriptions the client wants, so
//!   they can be replayed after a reconnect.
//!
//! Neither type does any I/O. They produce the [`ClientMessage`]s a caller
//! should send and answer routing questions for incoming traffic.
//!
//! [`ClientMessage`]: ntlink_protocol::ClientMessage

mod error;
mod registry;
mod subscription;
mod topic;

pub use error::TopicError;
pub use registry::{Announced, TopicRegistry};
pub use subscription::{Subscription, SubscriptionManager};
pub use topic::{PublishedTopic, Topic};
