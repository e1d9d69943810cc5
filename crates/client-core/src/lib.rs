//! Core sync primitives shared by the client runtime and UI bridge layers.
//!
//! This crate provides the readiness gate, the TTL cache, the retry executor, and the
//! connection supervisor that reflects realtime transport state, together with the
//! error taxonomy they share.

/// One-shot readiness latch.
pub mod boot_gate;
/// Shared-TTL key/value cache.
pub mod cache;
/// Transport status feed primitives.
pub mod channel;
/// Connection supervisor publishing observable state.
pub mod connection;
/// Tagged operation errors and sync failure taxonomy.
pub mod error;
/// Provider signal and failure normalization.
pub mod normalization;
/// Retry policy and executor.
pub mod retry;
/// Transport signal reducer.
pub mod state_machine;
/// Connection state, status and tuning types.
pub mod types;

pub use boot_gate::BootGate;
pub use cache::{TtlCache, cache_key};
pub use channel::{FeedError, StatusFeed, StatusStream};
pub use connection::{ConnectionSupervisor, ConnectionWatch, TransitionStream};
pub use error::{ClientError, ErrorCategory, SyncError, classify_http_status};
pub use normalization::{
    AUTH_DENIED, PERMISSION_DENIED, normalize_backend_failure, normalize_provider_status,
};
pub use retry::{BackoffGrowth, RetryPolicy};
pub use state_machine::ConnectionStateMachine;
pub use types::{
    ConnectionIndicator, ConnectionState, ConnectionStatus, SyncTuning, TransportStatus,
    UnknownStatus,
};
