use crate::types::{ConnectionState, ConnectionStatus, TransportStatus};

/// Reducer from transport signals to observable connection state.
#[derive(Debug, Clone, Default)]
pub struct ConnectionStateMachine {
    state: ConnectionState,
    has_connected: bool,
}

impl ConnectionStateMachine {
    /// Last state produced by `apply`.
    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Whether the subscription has reached `Connected` at least once.
    pub fn has_connected(&self) -> bool {
        self.has_connected
    }

    /// Apply one transport signal.
    ///
    /// Returns the new state only when it differs from the previous one.
    pub fn apply(&mut self, status: TransportStatus) -> Option<ConnectionState> {
        let next = match ConnectionStatus::from(status) {
            ConnectionStatus::Connecting => {
                ConnectionState::new(ConnectionStatus::Connecting, self.has_connected)
            }
            ConnectionStatus::Connected => {
                self.has_connected = true;
                ConnectionState::new(ConnectionStatus::Connected, false)
            }
            ConnectionStatus::Disconnected => {
                ConnectionState::new(ConnectionStatus::Disconnected, false)
            }
        };

        if next == self.state {
            return None;
        }
        self.state = next;
        Some(next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::TransportStatus::*;

    fn connecting(reconnecting: bool) -> ConnectionState {
        ConnectionState::new(ConnectionStatus::Connecting, reconnecting)
    }

    fn connected() -> ConnectionState {
        ConnectionState::new(ConnectionStatus::Connected, false)
    }

    fn disconnected() -> ConnectionState {
        ConnectionState::new(ConnectionStatus::Disconnected, false)
    }

    #[test]
    fn flags_second_connect_as_reconnecting() {
        let mut sm = ConnectionStateMachine::default();
        let observed = [Joining, Joined, Closed, Joining, Joined]
            .into_iter()
            .filter_map(|status| sm.apply(status))
            .collect::<Vec<_>>();

        assert_eq!(
            observed,
            vec![
                connecting(false),
                connected(),
                disconnected(),
                connecting(true),
                connected()
            ]
        );
    }

    #[test]
    fn reconnects_directly_from_connected() {
        let mut sm = ConnectionStateMachine::default();
        sm.apply(Joining);
        sm.apply(Joined);

        assert_eq!(sm.apply(Joining), Some(connecting(true)));
        assert_eq!(sm.apply(Joined), Some(connected()));
    }

    #[test]
    fn failed_first_attempt_is_not_a_reconnect() {
        let mut sm = ConnectionStateMachine::default();
        sm.apply(Joining);
        assert_eq!(sm.apply(Errored), Some(disconnected()));
        assert_eq!(sm.apply(Joining), Some(connecting(false)));
        assert!(!sm.has_connected());
    }

    #[test]
    fn absorbs_duplicate_signals() {
        let mut sm = ConnectionStateMachine::default();
        assert_eq!(sm.apply(Closed), None);
        assert_eq!(sm.apply(Joined), Some(connected()));
        assert_eq!(sm.apply(Joined), None);
        assert_eq!(sm.apply(Errored), Some(disconnected()));
        assert_eq!(sm.apply(Closed), None);
        assert_eq!(sm.state(), disconnected());
    }
}
