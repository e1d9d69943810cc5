use std::{future::Future, sync::Arc, time::Duration};

use client_core::{
    BackoffGrowth, BootGate, ClientError, ConnectionState, ConnectionSupervisor, RetryPolicy,
    StatusStream, SyncError, SyncTuning, TransitionStream, TtlCache,
};
use serde_json::Value;
use tokio::{
    sync::{Mutex, broadcast::error::RecvError},
    task::JoinHandle,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

const DEFAULT_CACHE_TTL_MS: u64 = 30_000;
const DEFAULT_BOOT_POLL_INTERVAL_MS: u64 = 50;
const DEFAULT_BOOT_TIMEOUT_MS: u64 = 5_000;
const DEFAULT_RETRY_MAX_ATTEMPTS: u32 = 3;
const DEFAULT_RETRY_BASE_DELAY_MS: u64 = 1_000;

/// Resolved runtime settings after applying tuning overrides to defaults.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncRuntimeConfig {
    /// Lifetime of every cached response.
    pub cache_ttl: Duration,
    pub boot_poll_interval: Duration,
    /// Deadline used by `wait_until_ready`.
    pub boot_timeout: Duration,
    /// Policy shared by readiness tasks and cached fetches.
    pub retry_policy: RetryPolicy,
    /// Drop the cache whenever the transport returns to `Connected` after a gap.
    pub clear_cache_on_reconnect: bool,
}

impl SyncRuntimeConfig {
    /// Fill unset tuning fields with defaults.
    pub fn from_tuning(tuning: &SyncTuning) -> Self {
        let growth = match tuning.retry_max_delay_ms {
            Some(max_delay_ms) => BackoffGrowth::Exponential { max_delay_ms },
            None => BackoffGrowth::Constant,
        };
        let retry_policy = RetryPolicy::new(
            tuning
                .retry_max_attempts
                .unwrap_or(DEFAULT_RETRY_MAX_ATTEMPTS),
            tuning
                .retry_base_delay_ms
                .unwrap_or(DEFAULT_RETRY_BASE_DELAY_MS),
        )
        .with_growth(growth)
        .with_non_retryable_codes(tuning.non_retryable_codes.iter().cloned());

        Self {
            cache_ttl: Duration::from_millis(tuning.cache_ttl_ms.unwrap_or(DEFAULT_CACHE_TTL_MS)),
            boot_poll_interval: Duration::from_millis(
                tuning
                    .boot_poll_interval_ms
                    .unwrap_or(DEFAULT_BOOT_POLL_INTERVAL_MS),
            ),
            boot_timeout: Duration::from_millis(
                tuning.boot_timeout_ms.unwrap_or(DEFAULT_BOOT_TIMEOUT_MS),
            ),
            retry_policy,
            clear_cache_on_reconnect: tuning.clear_cache_on_reconnect,
        }
    }
}

impl Default for SyncRuntimeConfig {
    fn default() -> Self {
        Self::from_tuning(&SyncTuning::default())
    }
}

#[derive(Debug)]
struct RunningWatcher {
    stop: CancellationToken,
    task: JoinHandle<()>,
}

/// Process-lifetime sync context.
///
/// Owns the readiness gate, the shared cache and the connection supervisor, and is
/// passed explicitly to every consumer that needs them.
#[derive(Debug)]
pub struct SyncRuntime {
    boot_gate: Arc<BootGate>,
    cache: Arc<TtlCache<Value>>,
    connection: Arc<ConnectionSupervisor>,
    retry_policy: RetryPolicy,
    boot_timeout: Duration,
    clear_cache_on_reconnect: bool,
    reconnect_watcher: Mutex<Option<RunningWatcher>>,
}

impl SyncRuntime {
    /// Build a runtime from optional tuning overrides.
    pub fn new(tuning: &SyncTuning) -> Self {
        Self::with_config(SyncRuntimeConfig::from_tuning(tuning))
    }

    /// Build a runtime from fully resolved settings.
    pub fn with_config(config: SyncRuntimeConfig) -> Self {
        Self {
            boot_gate: Arc::new(BootGate::with_poll_interval(config.boot_poll_interval)),
            cache: Arc::new(TtlCache::new(config.cache_ttl)),
            connection: Arc::new(ConnectionSupervisor::new()),
            retry_policy: config.retry_policy,
            boot_timeout: config.boot_timeout,
            clear_cache_on_reconnect: config.clear_cache_on_reconnect,
            reconnect_watcher: Mutex::new(None),
        }
    }

    /// Shared readiness gate.
    pub fn boot_gate(&self) -> Arc<BootGate> {
        Arc::clone(&self.boot_gate)
    }

    /// Shared response cache.
    pub fn cache(&self) -> Arc<TtlCache<Value>> {
        Arc::clone(&self.cache)
    }

    /// Shared connection supervisor.
    pub fn connection(&self) -> Arc<ConnectionSupervisor> {
        Arc::clone(&self.connection)
    }

    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry_policy
    }

    /// Current connection state, read synchronously.
    pub fn connection_state(&self) -> ConnectionState {
        self.connection.state()
    }

    /// Start supervising a transport's status signals.
    pub async fn attach_transport(&self, stream: StatusStream) -> Result<(), SyncError> {
        // Subscribe before attaching so no transition is missed.
        let transitions = self
            .clear_cache_on_reconnect
            .then(|| self.connection.transitions());
        self.connection.attach(stream).await?;
        if let Some(transitions) = transitions {
            self.start_reconnect_watcher(transitions).await;
        }
        Ok(())
    }

    /// Run one-time startup work under the retry policy, then open the boot gate.
    ///
    /// The gate opens even when the work fails so dependents proceed degraded; the
    /// work's own result is available through the returned handle.
    pub fn spawn_readiness_task<T, F, Fut>(
        &self,
        name: &'static str,
        task: F,
    ) -> JoinHandle<Result<T, SyncError>>
    where
        T: Send + 'static,
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = Result<T, ClientError>> + Send,
    {
        let gate = Arc::clone(&self.boot_gate);
        let policy = self.retry_policy.clone();
        tokio::spawn(async move {
            let result = policy.execute(task).await;
            match &result {
                Ok(_) => debug!(task = name, "readiness task finished"),
                Err(err) => warn!(task = name, code = err.code(), %err, "readiness task failed"),
            }
            gate.mark_complete();
            result
        })
    }

    /// Wait for the boot gate using the configured deadline.
    pub async fn wait_until_ready(&self) -> Result<Duration, SyncError> {
        self.boot_gate.wait_for_complete(self.boot_timeout).await
    }

    /// Serve `key` from cache, or fetch it through the retry policy when connected.
    pub async fn fetch_cached<F, Fut>(&self, key: &str, operation: F) -> Result<Value, SyncError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<Value, ClientError>>,
    {
        if let Some(value) = self.cache.get(key) {
            debug!(key, "cache hit");
            return Ok(value);
        }

        self.connection.require_connected()?;
        let value = self.retry_policy.execute(operation).await?;
        self.cache.set(key, value.clone());
        debug!(key, "cache filled");
        Ok(value)
    }

    /// Drop one cached entry; returns whether a live entry was removed.
    pub fn invalidate(&self, key: &str) -> bool {
        self.cache.remove(key).is_some()
    }

    /// Release the transport subscription and background watchers.
    pub async fn shutdown(&self) {
        let running = {
            let mut guard = self.reconnect_watcher.lock().await;
            guard.take()
        };
        if let Some(running) = running {
            running.stop.cancel();
            let _ = running.task.await;
        }
        self.connection.teardown().await;
    }

    async fn start_reconnect_watcher(&self, transitions: TransitionStream) {
        let mut guard = self.reconnect_watcher.lock().await;
        if guard.is_some() {
            return;
        }

        let stop = CancellationToken::new();
        let task = tokio::spawn(watch_reconnects(
            transitions,
            Arc::clone(&self.cache),
            stop.child_token(),
        ));

        *guard = Some(RunningWatcher { stop, task });
    }
}

/// Clear `cache` whenever the transport completes a reconnect, until `stop` fires or the
/// transition stream closes.
async fn watch_reconnects(
    mut transitions: TransitionStream,
    cache: Arc<TtlCache<Value>>,
    stop: CancellationToken,
) {
    let mut tracker = ReconnectTracker::default();
    loop {
        tokio::select! {
            _ = stop.cancelled() => break,
            received = transitions.recv() => match received {
                Ok(state) => {
                    if tracker.observe(state) {
                        cache.clear();
                        info!("transport reconnected; cache cleared");
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    cache.clear();
                    warn!(skipped, "missed connection transitions; cache cleared");
                }
                Err(RecvError::Closed) => break,
            }
        }
    }
}

/// Detects completed reconnections from ordered state transitions.
#[derive(Debug, Default)]
struct ReconnectTracker {
    previous: ConnectionState,
    has_connected: bool,
}

impl ReconnectTracker {
    /// Returns true when `state` is a return to `Connected` after an earlier connection.
    ///
    /// Any non-connected gap counts: providers can resume straight from an error without
    /// a joining signal.
    fn observe(&mut self, state: ConnectionState) -> bool {
        let reconnected =
            state.is_connected() && self.has_connected && !self.previous.is_connected();
        if state.is_connected() {
            self.has_connected = true;
        }
        self.previous = state;
        reconnected
    }
}
