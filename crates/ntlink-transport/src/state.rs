//! The link state machine.
//!
//! A client owns exactly one link to the server, and that link is always in
//! exactly one of three states:
//!
//! ```text
//!   Disconnected ──(begin_connect)──→ Connecting ──(activate)──→ Active
//!        ↑                                │                        │
//!        └──────────────(drop_link)───────┴────────────────────────┘
//! ```
//!
//! Every transition goes through a method on [`LinkState`], so there is no
//! combination of flags that could describe a state outside this diagram.

use crate::TransportError;

/// The lifecycle state of the client's single server link.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LinkState {
    /// No connection, and no attempt in flight.
    #[default]
    Disconnected,

    /// A connection attempt is in flight.
    Connecting,

    /// The connection is open and traffic flows.
    Active,
}

impl LinkState {
    /// `Disconnected → Connecting`.
    ///
    /// # Errors
    /// Returns [`TransportError::InvalidTransition`] from any other state.
    pub fn begin_connect(&mut self) -> Result<(), TransportError> {
        self.transition(LinkState::Disconnected, LinkState::Connecting)
    }

    /// `Connecting → Active`.
    ///
    /// # Errors
    /// Returns [`TransportError::InvalidTransition`] from any other state.
    pub fn activate(&mut self) -> Result<(), TransportError> {
        self.transition(LinkState::Connecting, LinkState::Active)
    }

    /// Any state `→ Disconnected`. Returns the state that was left, so the
    /// caller can tell a lost link (`Active`) from a failed attempt.
    pub fn drop_link(&mut self) -> LinkState {
        std::mem::replace(self, LinkState::Disconnected)
    }

    /// Returns `true` while traffic can be sent.
    pub fn is_active(&self) -> bool {
        matches!(self, LinkState::Active)
    }

    fn transition(
        &mut self,
        from: LinkState,
        to: LinkState,
    ) -> Result<(), TransportError> {
        if *self != from {
            return Err(TransportError::InvalidTransition { from: *self, to });
        }
        tracing::trace!(?from, ?to, "link transition");
        *self = to;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_disconnected() {
        assert_eq!(LinkState::default(), LinkState::Disconnected);
    }

    #[test]
    fn test_full_cycle_returns_to_disconnected() {
        let mut state = LinkState::default();
        state.begin_connect().unwrap();
        assert_eq!(state, LinkState::Connecting);
        state.activate().unwrap();
        assert!(state.is_active());
        assert_eq!(state.drop_link(), LinkState::Active);
        assert_eq!(state, LinkState::Disconnected);
    }

    #[test]
    fn test_activate_from_disconnected_returns_error() {
        let mut state = LinkState::Disconnected;
        let err = state.activate().unwrap_err();
        assert!(matches!(
            err,
            TransportError::InvalidTransition {
                from: LinkState::Disconnected,
                to: LinkState::Active,
            }
        ));
        assert_eq!(state, LinkState::Disconnected);
    }

    #[test]
    fn test_begin_connect_while_active_returns_error() {
        let mut state = LinkState::Active;
        assert!(state.begin_connect().is_err());
        assert!(state.is_active());
    }

    #[test]
    fn test_drop_link_from_connecting_reports_connecting() {
        // A failed attempt is not a lost link.
        let mut state = LinkState::Connecting;
        assert_eq!(state.drop_link(), LinkState::Connecting);
        assert!(!state.is_active());
    }
}
