//! Error types for the topic layer.

use ntlink_protocol::ValueType;

/// Errors that can occur while resolving or mutating topics.
#[derive(Debug, thiserror::Error)]
pub enum TopicError {
    /// No announced server topic has this name. Samples may only be added
    /// to topics the server itself announced.
    #[error("no announced topic named {0:?}")]
    UnknownTopic(String),

    /// The client does not hold a published topic with this name.
    #[error("topic {0:?} is not published by this client")]
    NotPublished(String),

    /// The sample's value does not match the topic's declared type.
    #[error("topic {name:?} has type {expected}, got a {found} value")]
    TypeMismatch {
        name: String,
        expected: ValueType,
        found: ValueType,
    },
}
