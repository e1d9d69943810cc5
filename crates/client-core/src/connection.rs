use std::sync::Arc;

use tokio::{
    sync::{
        Mutex,
        broadcast::{self, error::RecvError},
        watch,
    },
    task::JoinHandle,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::{
    channel::{FeedError, StatusStream},
    error::SyncError,
    state_machine::ConnectionStateMachine,
    types::{ConnectionState, TransportStatus},
};

/// Receiver handed to connection observers.
pub type ConnectionWatch = watch::Receiver<ConnectionState>;

/// Ordered, uncoalesced stream of published states.
pub type TransitionStream = broadcast::Receiver<ConnectionState>;

const TRANSITION_BUFFER: usize = 64;

#[derive(Debug)]
struct RunningSubscription {
    stop: CancellationToken,
    task: JoinHandle<()>,
}

/// Sole writer of the observable connection state.
///
/// The supervisor only reflects what the transport reports; reconnecting is the
/// transport's job.
#[derive(Debug)]
pub struct ConnectionSupervisor {
    publisher: Arc<StatePublisher>,
    subscription: Mutex<Option<RunningSubscription>>,
}

impl Default for ConnectionSupervisor {
    fn default() -> Self {
        Self::new()
    }
}

impl ConnectionSupervisor {
    /// Create a detached supervisor reporting `Disconnected`.
    pub fn new() -> Self {
        Self {
            publisher: Arc::new(StatePublisher::new()),
            subscription: Mutex::new(None),
        }
    }

    /// Current state, read synchronously.
    pub fn state(&self) -> ConnectionState {
        *self.publisher.state_tx.borrow()
    }

    /// Subscribe to the latest state; intermediate states may be coalesced.
    pub fn watch(&self) -> ConnectionWatch {
        self.publisher.state_tx.subscribe()
    }

    /// Subscribe to every state change in order.
    pub fn transitions(&self) -> TransitionStream {
        self.publisher.transitions_tx.subscribe()
    }

    /// Gate for operations that need a live subscription.
    pub fn require_connected(&self) -> Result<(), SyncError> {
        let state = self.state();
        if state.is_connected() {
            Ok(())
        } else {
            Err(SyncError::NotConnected { state })
        }
    }

    /// Whether a transport subscription is currently running.
    pub async fn is_attached(&self) -> bool {
        self.subscription.lock().await.is_some()
    }

    /// Start reflecting `stream` into the published state.
    pub async fn attach(&self, mut stream: StatusStream) -> Result<(), SyncError> {
        let mut guard = self.subscription.lock().await;
        if guard.is_some() {
            return Err(FeedError::AlreadyAttached.into());
        }

        self.publisher.reset();

        let stop = CancellationToken::new();
        let stop_child = stop.child_token();
        let publisher = Arc::clone(&self.publisher);
        let task = tokio::spawn(async move {
            let mut machine = ConnectionStateMachine::default();
            loop {
                tokio::select! {
                    _ = stop_child.cancelled() => break,
                    received = stream.recv() => match received {
                        Ok(status) => publisher.apply(&mut machine, status),
                        Err(RecvError::Lagged(skipped)) => {
                            warn!(skipped, "status subscription lagged; continuing with newest signals");
                        }
                        Err(RecvError::Closed) => {
                            debug!("status feed closed");
                            publisher.apply(&mut machine, TransportStatus::Closed);
                            break;
                        }
                    }
                }
            }
            debug!("status subscription released");
        });

        info!("status subscription attached");
        *guard = Some(RunningSubscription { stop, task });
        Ok(())
    }

    /// Release the transport subscription. Safe to call when not attached.
    pub async fn teardown(&self) {
        let running = {
            let mut guard = self.subscription.lock().await;
            guard.take()
        };

        let Some(running) = running else {
            return;
        };

        running.stop.cancel();
        let _ = running.task.await;
        self.publisher.reset();
        info!("status subscription torn down");
    }
}

impl Drop for ConnectionSupervisor {
    fn drop(&mut self) {
        if let Some(running) = self.subscription.get_mut().take() {
            running.stop.cancel();
        }
    }
}

#[derive(Debug)]
struct StatePublisher {
    state_tx: watch::Sender<ConnectionState>,
    transitions_tx: broadcast::Sender<ConnectionState>,
}

impl StatePublisher {
    fn new() -> Self {
        let (state_tx, _) = watch::channel(ConnectionState::default());
        let (transitions_tx, _) = broadcast::channel(TRANSITION_BUFFER);
        Self {
            state_tx,
            transitions_tx,
        }
    }

    fn apply(&self, machine: &mut ConnectionStateMachine, status: TransportStatus) {
        if let Some(next) = machine.apply(status) {
            debug!(
                ?status,
                state = ?next.status,
                reconnecting = next.is_reconnecting,
                "connection state changed"
            );
            self.publish(next);
        }
    }

    fn reset(&self) {
        if *self.state_tx.borrow() != ConnectionState::default() {
            self.publish(ConnectionState::default());
        }
    }

    fn publish(&self, next: ConnectionState) {
        self.state_tx.send_replace(next);
        let _ = self.transitions_tx.send(next);
    }
}
