use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Lifecycle signal emitted by the realtime transport for one channel subscription.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum TransportStatus {
    /// The transport is (re)joining the channel.
    Joining,
    /// The channel subscription is live.
    Joined,
    /// The channel was closed, either by the provider or by the client.
    Closed,
    /// The channel failed (provider error or join timeout).
    Errored,
}

/// Error returned when a provider signal has no known mapping.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown transport status '{0}'")]
pub struct UnknownStatus(pub String);

impl FromStr for TransportStatus {
    type Err = UnknownStatus;

    /// Accepts both the abstract names and the provider's channel signals.
    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_uppercase().as_str() {
            "JOINING" | "CONNECTING" => Ok(Self::Joining),
            "JOINED" | "SUBSCRIBED" => Ok(Self::Joined),
            "CLOSED" => Ok(Self::Closed),
            "ERRORED" | "CHANNEL_ERROR" | "TIMED_OUT" => Ok(Self::Errored),
            _ => Err(UnknownStatus(value.to_owned())),
        }
    }
}

/// Supervised connection status derived from transport signals.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
pub enum ConnectionStatus {
    /// No live subscription.
    #[default]
    Disconnected,
    /// A connection attempt is in flight.
    Connecting,
    /// The subscription is live.
    Connected,
}

impl From<TransportStatus> for ConnectionStatus {
    fn from(status: TransportStatus) -> Self {
        match status {
            TransportStatus::Joining => Self::Connecting,
            TransportStatus::Joined => Self::Connected,
            TransportStatus::Closed | TransportStatus::Errored => Self::Disconnected,
        }
    }
}

/// Observable connection state published by the supervisor.
///
/// `is_reconnecting` is only ever true together with `Connecting`, and only once the
/// supervised subscription has reached `Connected` at least once.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
pub struct ConnectionState {
    /// Current supervised status.
    pub status: ConnectionStatus,
    /// Distinguishes recovery from the very first connection attempt.
    pub is_reconnecting: bool,
}

impl ConnectionState {
    /// Build a state; the reconnect flag is dropped unless `status` is `Connecting`.
    pub fn new(status: ConnectionStatus, is_reconnecting: bool) -> Self {
        Self {
            status,
            is_reconnecting: is_reconnecting && status == ConnectionStatus::Connecting,
        }
    }

    pub fn is_connected(&self) -> bool {
        self.status == ConnectionStatus::Connected
    }

    /// Presentation variant for connection indicators.
    pub fn indicator(&self) -> ConnectionIndicator {
        match (self.status, self.is_reconnecting) {
            (ConnectionStatus::Connected, _) => ConnectionIndicator::Online,
            (ConnectionStatus::Connecting, false) => ConnectionIndicator::Connecting,
            (ConnectionStatus::Connecting, true) => ConnectionIndicator::Reconnecting,
            (ConnectionStatus::Disconnected, _) => ConnectionIndicator::Offline,
        }
    }
}

/// What a connection badge should show.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum ConnectionIndicator {
    Online,
    Connecting,
    Reconnecting,
    Offline,
}

impl ConnectionIndicator {
    /// Short user-facing label.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Online => "Connected",
            Self::Connecting => "Connecting",
            Self::Reconnecting => "Reconnecting",
            Self::Offline => "Offline",
        }
    }
}

/// Optional runtime tuning overrides.
///
/// `None` fields fall back to component defaults.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct SyncTuning {
    /// Cache time-to-live in milliseconds.
    pub cache_ttl_ms: Option<u64>,
    /// Boot gate polling interval in milliseconds.
    pub boot_poll_interval_ms: Option<u64>,
    /// Default deadline for readiness waits in milliseconds.
    pub boot_timeout_ms: Option<u64>,
    /// Maximum invocations per retried operation.
    pub retry_max_attempts: Option<u32>,
    /// Delay between attempts in milliseconds.
    pub retry_base_delay_ms: Option<u64>,
    /// When set, the delay doubles per attempt up to this cap.
    pub retry_max_delay_ms: Option<u64>,
    /// Error codes that are never retried.
    pub non_retryable_codes: Vec<String>,
    /// Drop all cached entries once a reconnection completes.
    pub clear_cache_on_reconnect: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_provider_channel_signals() {
        assert_eq!("SUBSCRIBED".parse(), Ok(TransportStatus::Joined));
        assert_eq!("joining".parse(), Ok(TransportStatus::Joining));
        assert_eq!("CLOSED".parse(), Ok(TransportStatus::Closed));
        assert_eq!("CHANNEL_ERROR".parse(), Ok(TransportStatus::Errored));
        assert_eq!("TIMED_OUT".parse(), Ok(TransportStatus::Errored));

        let err = "presence_diff"
            .parse::<TransportStatus>()
            .expect_err("unknown signal should not map");
        assert_eq!(err, UnknownStatus("presence_diff".into()));
        assert_eq!(err.to_string(), "unknown transport status 'presence_diff'");
    }

    #[test]
    fn maps_transport_status_onto_supervised_status() {
        assert_eq!(
            ConnectionStatus::from(TransportStatus::Joining),
            ConnectionStatus::Connecting
        );
        assert_eq!(
            ConnectionStatus::from(TransportStatus::Joined),
            ConnectionStatus::Connected
        );
        assert_eq!(
            ConnectionStatus::from(TransportStatus::Errored),
            ConnectionStatus::Disconnected
        );
    }

    #[test]
    fn reconnecting_flag_only_survives_with_connecting() {
        let state = ConnectionState::new(ConnectionStatus::Connected, true);
        assert!(!state.is_reconnecting);

        let state = ConnectionState::new(ConnectionStatus::Connecting, true);
        assert!(state.is_reconnecting);
        assert_eq!(state.indicator(), ConnectionIndicator::Reconnecting);
        assert_eq!(state.indicator().label(), "Reconnecting");
    }

    #[test]
    fn default_state_is_offline() {
        let state = ConnectionState::default();
        assert!(!state.is_connected());
        assert_eq!(state.indicator(), ConnectionIndicator::Offline);
    }
}
