//! Unified error type for the ntlink client.

use ntlink_protocol::ProtocolError;
use ntlink_topics::TopicError;
use ntlink_transport::TransportError;

/// Top-level error that wraps all crate-specific errors.
///
/// The `#[from]` attribute on each variant lets `?` convert sub-crate
/// errors automatically.
#[derive(Debug, thiserror::Error)]
pub enum NtError {
    /// A transport-level error (connect, send, recv, link state).
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A protocol-level error (encode, decode, invalid message).
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// A topic-level error (unknown name, not published, type mismatch).
    #[error(transparent)]
    Topic(#[from] TopicError),
}

#[cfg(test)]
mod tests {
    use ntlink_protocol::ValueType;
    use ntlink_transport::LinkState;

    use super::*;

    #[test]
    fn test_from_transport_error() {
        let err = TransportError::SendFailed(std::io::Error::new(
            std::io::ErrorKind::BrokenPipe,
            "gone",
        ));
        let nt_err: NtError = err.into();
        assert!(matches!(nt_err, NtError::Transport(_)));
        assert!(nt_err.to_string().contains("gone"));
    }

    #[test]
    fn test_from_protocol_error() {
        let err = ProtocolError::InvalidMessage("bad".into());
        let nt_err: NtError = err.into();
        assert!(matches!(nt_err, NtError::Protocol(_)));
    }

    #[test]
    fn test_from_topic_error() {
        let err = TopicError::TypeMismatch {
            name: "/a".into(),
            expected: ValueType::Double,
            found: ValueType::String,
        };
        let nt_err: NtError = err.into();
        assert!(matches!(nt_err, NtError::Topic(_)));
        assert!(nt_err.to_string().contains("double"));
    }

    #[test]
    fn test_invalid_transition_message_names_states() {
        let err: NtError = TransportError::InvalidTransition {
            from: LinkState::Active,
            to: LinkState::Connecting,
        }
        .into();
        assert!(err.to_string().contains("Active"));
    }
}
